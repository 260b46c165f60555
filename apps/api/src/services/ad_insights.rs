//! # Ad Insights Client
//!
//! Reads campaign, ad-set and platform figures from the Graph API insights
//! endpoints. Responses are cached for 30 minutes per (kind, date range).
//!
//! ```text
//! GET {api_base}/me/adaccounts            ── once, when no account is configured
//! GET {api_base}/{account}/insights
//!       ?level=campaign                   ── campaign_insights
//!       ?level=adset[&filtering=campaign] ── adset_insights / impressions_by_ad_set
//!       ?breakdowns=publisher_platform    ── impressions_by_platform
//!       &time_range={"since":..,"until":..}
//! Authorization: Bearer <access_token>
//! ```
//!
//! There is no retry. Callers that only need impressions use the `_or_zero`
//! variants, which log the failure and return zero-filled values.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use salesdesk_core::dates::ist_date;
use salesdesk_core::AD_INSIGHTS_CACHE_TTL_SECS;

use crate::cache::TtlCache;
use crate::config::AdsSection;

/// Days covered when the caller gives no range.
const DEFAULT_RANGE_DAYS: i64 = 30;

const INSIGHT_FIELDS: &str = "impressions,reach,clicks,spend,ctr";

/// Platforms always present in the by-platform breakdown.
const PLATFORMS: [&str; 2] = ["Facebook", "Instagram"];

#[derive(Debug, Error)]
pub enum AdInsightsError {
    #[error("Ad insights are not configured")]
    NotConfigured,

    #[error("Ad insights request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Ad insights API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("No ad account available for this access token")]
    NoAccount,

    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
}

pub type AdInsightsResult<T> = Result<T, AdInsightsError>;

// =============================================================================
// Date Range
// =============================================================================

/// Inclusive IST calendar range sent as `time_range`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsightsRange {
    pub since: NaiveDate,
    pub until: NaiveDate,
}

fn parse_day(value: &str) -> AdInsightsResult<NaiveDate> {
    let day = value.trim().get(..10).unwrap_or(value.trim());
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map_err(|_| AdInsightsError::InvalidDate(value.to_string()))
}

impl InsightsRange {
    /// Missing ends default to the last 30 days up to today (IST).
    pub fn from_query(
        date_from: Option<&str>,
        date_to: Option<&str>,
        now: DateTime<Utc>,
    ) -> AdInsightsResult<Self> {
        let present = |v: &&str| !v.trim().is_empty();
        let until = match date_to.filter(present) {
            Some(v) => parse_day(v)?,
            None => ist_date(&now),
        };
        let since = match date_from.filter(present) {
            Some(v) => parse_day(v)?,
            None => until - chrono::Duration::days(DEFAULT_RANGE_DAYS),
        };
        Ok(InsightsRange { since, until })
    }

    fn time_range(&self) -> String {
        json!({
            "since": self.since.format("%Y-%m-%d").to_string(),
            "until": self.until.format("%Y-%m-%d").to_string(),
        })
        .to_string()
    }

    fn cache_key(&self, kind: &str, extra: Option<&str>) -> String {
        match extra {
            Some(extra) => format!("{kind}_{}_{}_{extra}", self.since, self.until),
            None => format!("{kind}_{}_{}", self.since, self.until),
        }
    }
}

// =============================================================================
// Insight Rows
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightMetrics {
    pub impressions: u64,
    pub reach: u64,
    pub clicks: u64,
    pub spend: f64,
    pub ctr: f64,
}

impl InsightMetrics {
    fn from_row(row: &Value) -> Self {
        InsightMetrics {
            impressions: int_field(row, "impressions"),
            reach: int_field(row, "reach"),
            clicks: int_field(row, "clicks"),
            spend: float_field(row, "spend"),
            ctr: float_field(row, "ctr"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignInsight {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub metrics: InsightMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdSetInsight {
    pub id: String,
    pub name: String,
    pub campaign_id: Option<String>,
    #[serde(flatten)]
    pub metrics: InsightMetrics,
}

/// The Graph API sends numbers as strings.
fn int_field(row: &Value, key: &str) -> u64 {
    match row.get(key) {
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        _ => 0,
    }
}

fn float_field(row: &Value, key: &str) -> f64 {
    match row.get(key) {
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn str_field(row: &Value, key: &str) -> Option<String> {
    row.get(key).and_then(Value::as_str).map(str::to_string)
}

fn platform_label(platform: &str) -> String {
    match platform.to_lowercase().as_str() {
        "facebook" => "Facebook".to_string(),
        "instagram" => "Instagram".to_string(),
        other => {
            let mut chars = other.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => "Unknown".to_string(),
            }
        }
    }
}

/// `{"Facebook": 0, "Instagram": 0}`
pub fn zero_platforms() -> HashMap<String, u64> {
    PLATFORMS.iter().map(|p| (p.to_string(), 0)).collect()
}

/// A value and whether it came from the cache.
#[derive(Debug, Clone)]
pub struct Fetched<T> {
    pub value: T,
    pub cache_age: Option<Duration>,
}

impl<T> Fetched<T> {
    pub fn is_cached(&self) -> bool {
        self.cache_age.is_some()
    }
}

// =============================================================================
// Client
// =============================================================================

pub struct AdInsightsClient {
    http: Client,
    api_base: String,
    access_token: Option<String>,
    configured_account: Option<String>,
    resolved_account: RwLock<Option<String>>,
    campaigns: TtlCache<String, Vec<CampaignInsight>>,
    ad_sets: TtlCache<String, Vec<AdSetInsight>>,
    platforms: TtlCache<String, HashMap<String, u64>>,
}

impl AdInsightsClient {
    pub fn new(config: &AdsSection) -> AdInsightsResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let ttl = Duration::from_secs(AD_INSIGHTS_CACHE_TTL_SECS);

        Ok(AdInsightsClient {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone().filter(|t| !t.trim().is_empty()),
            configured_account: config.account_id.clone().filter(|a| !a.trim().is_empty()),
            resolved_account: RwLock::new(None),
            campaigns: TtlCache::new(ttl),
            ad_sets: TtlCache::new(ttl),
            platforms: TtlCache::new(ttl),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.access_token.is_some()
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> AdInsightsResult<Value> {
        let token = self
            .access_token
            .as_deref()
            .ok_or(AdInsightsError::NotConfigured)?;
        let url = format!("{}/{}", self.api_base, path.trim_start_matches('/'));
        debug!(%url, "Ad insights request");

        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await?;
        let status = response.status();
        let body: Value = response.json().await?;

        if !status.is_success() {
            let message = body
                .pointer("/error/message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            return Err(AdInsightsError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(body)
    }

    async fn rows(&self, path: &str, query: &[(&str, String)]) -> AdInsightsResult<Vec<Value>> {
        let body = self.get(path, query).await?;
        Ok(body
            .get("data")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    /// The configured account, else the token's first active account
    /// (`account_status == 1`), else its first account.
    pub async fn account_id(&self) -> AdInsightsResult<String> {
        if let Some(account) = &self.configured_account {
            return Ok(account.clone());
        }
        if let Some(account) = self.resolved_account.read().await.clone() {
            return Ok(account);
        }

        let accounts = self
            .rows("me/adaccounts", &[("fields", "id,name,account_status".to_string())])
            .await?;
        let active = accounts
            .iter()
            .find(|a| a.get("account_status").and_then(Value::as_i64) == Some(1))
            .or_else(|| accounts.first());
        let account = active
            .and_then(|a| str_field(a, "id"))
            .ok_or(AdInsightsError::NoAccount)?;

        info!(account = %account, "Resolved ad account");
        *self.resolved_account.write().await = Some(account.clone());
        Ok(account)
    }

    pub async fn campaign_insights(
        &self,
        range: &InsightsRange,
    ) -> AdInsightsResult<Fetched<Vec<CampaignInsight>>> {
        let key = range.cache_key("campaigns", None);
        if let Some(hit) = self.campaigns.get(&key).await {
            return Ok(Fetched {
                value: hit.value,
                cache_age: Some(hit.age),
            });
        }

        let account = self.account_id().await?;
        let rows = self
            .rows(
                &format!("{account}/insights"),
                &[
                    ("level", "campaign".to_string()),
                    ("fields", format!("campaign_id,campaign_name,{INSIGHT_FIELDS}")),
                    ("time_range", range.time_range()),
                    ("limit", "500".to_string()),
                ],
            )
            .await?;

        let mut campaigns: Vec<CampaignInsight> = rows
            .iter()
            .map(|row| CampaignInsight {
                id: str_field(row, "campaign_id").unwrap_or_default(),
                name: str_field(row, "campaign_name").unwrap_or_default(),
                metrics: InsightMetrics::from_row(row),
            })
            .collect();
        campaigns.sort_by(|a, b| b.metrics.impressions.cmp(&a.metrics.impressions));

        self.campaigns.set(key, campaigns.clone()).await;
        Ok(Fetched {
            value: campaigns,
            cache_age: None,
        })
    }

    pub async fn adset_insights(
        &self,
        range: &InsightsRange,
        campaign_id: Option<&str>,
    ) -> AdInsightsResult<Fetched<Vec<AdSetInsight>>> {
        let campaign_id = campaign_id.map(str::trim).filter(|c| !c.is_empty());
        let key = range.cache_key("adsets", campaign_id);
        if let Some(hit) = self.ad_sets.get(&key).await {
            return Ok(Fetched {
                value: hit.value,
                cache_age: Some(hit.age),
            });
        }

        let account = self.account_id().await?;
        let mut query = vec![
            ("level", "adset".to_string()),
            (
                "fields",
                format!("adset_id,adset_name,campaign_id,{INSIGHT_FIELDS}"),
            ),
            ("time_range", range.time_range()),
            ("limit", "500".to_string()),
        ];
        if let Some(campaign) = campaign_id {
            query.push((
                "filtering",
                json!([{ "field": "campaign.id", "operator": "EQUAL", "value": campaign }])
                    .to_string(),
            ));
        }
        let rows = self.rows(&format!("{account}/insights"), &query).await?;

        let ad_sets: Vec<AdSetInsight> = rows
            .iter()
            .map(|row| AdSetInsight {
                id: str_field(row, "adset_id").unwrap_or_default(),
                name: str_field(row, "adset_name").unwrap_or_default(),
                campaign_id: str_field(row, "campaign_id"),
                metrics: InsightMetrics::from_row(row),
            })
            .collect();

        self.ad_sets.set(key, ad_sets.clone()).await;
        Ok(Fetched {
            value: ad_sets,
            cache_age: None,
        })
    }

    /// Impressions per publisher platform. Facebook and Instagram are always
    /// present.
    pub async fn impressions_by_platform(
        &self,
        range: &InsightsRange,
    ) -> AdInsightsResult<Fetched<HashMap<String, u64>>> {
        let key = range.cache_key("platforms", None);
        if let Some(hit) = self.platforms.get(&key).await {
            return Ok(Fetched {
                value: hit.value,
                cache_age: Some(hit.age),
            });
        }

        let account = self.account_id().await?;
        let rows = self
            .rows(
                &format!("{account}/insights"),
                &[
                    ("fields", "impressions".to_string()),
                    ("breakdowns", "publisher_platform".to_string()),
                    ("time_range", range.time_range()),
                ],
            )
            .await?;

        let mut platforms = zero_platforms();
        for row in &rows {
            let label = platform_label(&str_field(row, "publisher_platform").unwrap_or_default());
            *platforms.entry(label).or_default() += int_field(row, "impressions");
        }

        self.platforms.set(key, platforms.clone()).await;
        Ok(Fetched {
            value: platforms,
            cache_age: None,
        })
    }

    /// Platform impressions, zero-filled when the API is unavailable.
    pub async fn impressions_by_platform_or_zero(&self, range: &InsightsRange) -> HashMap<String, u64> {
        if !self.is_configured() {
            return zero_platforms();
        }
        match self.impressions_by_platform(range).await {
            Ok(fetched) => fetched.value,
            Err(e) => {
                warn!(error = %e, "Platform impressions unavailable, using zeros");
                zero_platforms()
            }
        }
    }

    /// Impressions keyed by ad-set name, empty when the API is unavailable.
    pub async fn impressions_by_ad_set_or_zero(&self, range: &InsightsRange) -> HashMap<String, u64> {
        if !self.is_configured() {
            return HashMap::new();
        }
        match self.adset_insights(range, None).await {
            Ok(fetched) => {
                let mut by_name: BTreeMap<String, u64> = BTreeMap::new();
                for ad_set in fetched.value {
                    *by_name.entry(ad_set.name).or_default() += ad_set.metrics.impressions;
                }
                by_name.into_iter().collect()
            }
            Err(e) => {
                warn!(error = %e, "Ad-set impressions unavailable, using zeros");
                HashMap::new()
            }
        }
    }

    pub async fn clear_cache(&self) {
        self.campaigns.clear().await;
        self.ad_sets.clear().await;
        self.platforms.clear().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Query, routing::get, Json, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn range() -> InsightsRange {
        InsightsRange {
            since: NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
            until: NaiveDate::from_ymd_opt(2025, 7, 31).unwrap(),
        }
    }

    /// Serves a tiny Graph API on a random local port.
    async fn fake_graph(calls: Arc<AtomicUsize>) -> String {
        let insights = move |Query(q): Query<HashMap<String, String>>| {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                let body = if q.get("breakdowns").map(String::as_str) == Some("publisher_platform") {
                    json!({ "data": [
                        { "publisher_platform": "facebook", "impressions": "1200" },
                        { "publisher_platform": "instagram", "impressions": "800" },
                        { "publisher_platform": "audience_network", "impressions": "5" },
                    ]})
                } else {
                    json!({ "data": [
                        { "adset_id": "1", "adset_name": "Cricket Fans", "campaign_id": "c1",
                          "impressions": "300", "clicks": "12", "spend": "45.50", "ctr": "4.0" },
                        { "adset_id": "2", "adset_name": "Cricket Fans", "campaign_id": "c2",
                          "impressions": "200" },
                    ]})
                };
                Json(body)
            }
        };
        let app = Router::new()
            .route(
                "/me/adaccounts",
                get(|| async {
                    Json(json!({ "data": [
                        { "id": "act_disabled", "account_status": 2 },
                        { "id": "act_live", "account_status": 1 },
                    ]}))
                }),
            )
            .route("/act_live/insights", get(insights));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn client(api_base: String) -> AdInsightsClient {
        AdInsightsClient::new(&AdsSection {
            access_token: Some("token".into()),
            account_id: None,
            api_base,
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_platform_breakdown_is_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let client = client(fake_graph(Arc::clone(&calls)).await);

        let first = client.impressions_by_platform(&range()).await.unwrap();
        assert!(!first.is_cached());
        assert_eq!(first.value["Facebook"], 1200);
        assert_eq!(first.value["Instagram"], 800);
        assert_eq!(first.value["Audience_network"], 5);

        let second = client.impressions_by_platform(&range()).await.unwrap();
        assert!(second.is_cached());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(client.account_id().await.unwrap(), "act_live");
    }

    #[tokio::test]
    async fn test_ad_set_impressions_summed_by_name() {
        let calls = Arc::new(AtomicUsize::new(0));
        let client = client(fake_graph(calls).await);

        let by_name = client.impressions_by_ad_set_or_zero(&range()).await;
        assert_eq!(by_name["Cricket Fans"], 500);

        let ad_sets = client.adset_insights(&range(), None).await.unwrap().value;
        assert_eq!(ad_sets[0].metrics.clicks, 12);
        assert!((ad_sets[0].metrics.spend - 45.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_unreachable_api_falls_back_to_zeros() {
        // Nothing listens on port 9 locally.
        let client = client("http://127.0.0.1:9".into());
        let platforms = client.impressions_by_platform_or_zero(&range()).await;
        assert_eq!(platforms, zero_platforms());
        assert!(client.campaign_insights(&range()).await.is_err());
    }

    #[tokio::test]
    async fn test_unconfigured_client() {
        let client = AdInsightsClient::new(&AdsSection::default()).unwrap();
        assert!(!client.is_configured());
        assert!(matches!(
            client.campaign_insights(&range()).await,
            Err(AdInsightsError::NotConfigured)
        ));
        assert!(client.impressions_by_ad_set_or_zero(&range()).await.is_empty());
    }

    #[test]
    fn test_range_from_query() {
        let now = "2025-07-21T20:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let r = InsightsRange::from_query(None, None, now).unwrap();
        // 20:00 UTC is already the 22nd in IST.
        assert_eq!(r.until, NaiveDate::from_ymd_opt(2025, 7, 22).unwrap());
        assert_eq!(r.since, NaiveDate::from_ymd_opt(2025, 6, 22).unwrap());

        let r = InsightsRange::from_query(Some("2025-07-01T00:00:00Z"), Some("2025-07-10"), now).unwrap();
        assert_eq!(r.since, NaiveDate::from_ymd_opt(2025, 7, 1).unwrap());
        assert!(InsightsRange::from_query(Some("July"), None, now).is_err());
    }
}
