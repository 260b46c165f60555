//! Application state for the API server.

use std::sync::Arc;
use std::time::Duration;

use salesdesk_core::stats::{RetailTrackerEntry, SalesTeamRow};
use salesdesk_core::{RETAIL_CACHE_MAX_ENTRIES, SALES_CACHE_TTL_SECS};
use salesdesk_db::Database;

use crate::auth::JwtManager;
use crate::cache::TtlCache;
use crate::config::ApiConfig;
use crate::services::ad_insights::{AdInsightsClient, AdInsightsResult};
use crate::services::aggregation::AggregationService;

/// Key of the single sales-team entry.
pub const SALES_TEAM_KEY: &str = "sales_team";

/// Caches behind the live sales-performance and retail-tracker views.
pub struct PerformanceCaches {
    pub sales: TtlCache<String, Vec<SalesTeamRow>>,
    /// Keyed by `"{start|all}_{end|all}"`.
    pub retail: TtlCache<String, Vec<RetailTrackerEntry>>,
}

impl PerformanceCaches {
    pub fn new() -> Self {
        let ttl = Duration::from_secs(SALES_CACHE_TTL_SECS);
        PerformanceCaches {
            sales: TtlCache::new(ttl),
            retail: TtlCache::new(ttl).with_max_entries(RETAIL_CACHE_MAX_ENTRIES),
        }
    }

    pub async fn invalidate_sales(&self) {
        self.sales.invalidate(&SALES_TEAM_KEY.to_string()).await;
    }

    pub async fn invalidate_retail(&self) {
        self.retail.clear().await;
    }
}

impl Default for PerformanceCaches {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<ApiConfig>,
    pub jwt: Arc<JwtManager>,
    pub caches: Arc<PerformanceCaches>,
    pub aggregation: AggregationService,
    pub ad_insights: Arc<AdInsightsClient>,
}

impl AppState {
    /// Fails only when the outbound HTTP client cannot be built.
    pub fn new(db: Database, config: ApiConfig) -> AdInsightsResult<Self> {
        let jwt = Arc::new(JwtManager::new(
            config.auth.jwt_secret.clone(),
            config.auth.jwt_lifetime_secs,
        ));
        let aggregation = AggregationService::new(db.clone(), config.stats.stale_after_mins);
        let ad_insights = Arc::new(AdInsightsClient::new(&config.ads)?);

        Ok(AppState {
            db,
            config: Arc::new(config),
            jwt,
            caches: Arc::new(PerformanceCaches::new()),
            aggregation,
            ad_insights,
        })
    }
}
