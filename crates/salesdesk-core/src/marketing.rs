//! # Marketing Performance Report
//!
//! Lead funnel grouped by ad set, source or event, joined with ad impressions.
//!
//! ```text
//!   leads ──► date filter (IST bounds on date_of_enquiry)
//!         ──► event / source / ad set filters
//!         ──► group (ad_set > source > event, default source)
//!         ──► counts + percentages + impressions
//! ```
//!
//! Percentages are formatted with two decimals and are `"0.00"` for a group
//! with no touch-based leads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use ts_rs::TS;

use crate::dates::{query_bound, Bound};
use crate::error::CoreResult;
use crate::types::Lead;

// =============================================================================
// Filters
// =============================================================================

/// Query filters. `"all"` and blank values mean no filter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketingFilters {
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub event: Option<String>,
    pub source: Option<String>,
    pub ad_set: Option<String>,
}

fn active(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("all"))
}

/// Report grouping dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    AdSet,
    Source,
    Event,
}

impl MarketingFilters {
    /// The most specific active filter decides the grouping.
    pub fn group_by(&self) -> GroupBy {
        if active(&self.ad_set).is_some() {
            GroupBy::AdSet
        } else if active(&self.source).is_some() {
            GroupBy::Source
        } else if active(&self.event).is_some() {
            GroupBy::Event
        } else {
            GroupBy::Source
        }
    }

    /// Enquiry date window on IST day boundaries.
    pub fn enquiry_bounds(&self) -> CoreResult<(Option<DateTime<Utc>>, Option<DateTime<Utc>>)> {
        let from = active(&self.date_from)
            .map(|v| query_bound(v, Bound::Start))
            .transpose()?;
        let to = active(&self.date_to)
            .map(|v| query_bound(v, Bound::End))
            .transpose()?;
        Ok((from, to))
    }

    pub fn matches(&self, lead: &Lead, bounds: &(Option<DateTime<Utc>>, Option<DateTime<Utc>>)) -> bool {
        if bounds.0.is_some() || bounds.1.is_some() {
            let Some(enquired) = lead.date_of_enquiry else {
                return false;
            };
            if bounds.0.map(|from| enquired < from).unwrap_or(false)
                || bounds.1.map(|to| enquired > to).unwrap_or(false)
            {
                return false;
            }
        }
        if let Some(event) = active(&self.event) {
            let hit = lead.lead_for_event.as_deref() == Some(event)
                || lead.event_name.as_deref() == Some(event);
            if !hit {
                return false;
            }
        }
        if let Some(source) = active(&self.source) {
            if lead.source.as_deref() != Some(source) {
                return false;
            }
        }
        if let Some(ad_set) = active(&self.ad_set) {
            let hit = lead.ad_set.as_deref() == Some(ad_set)
                || lead.adset_name.as_deref() == Some(ad_set);
            if !hit {
                return false;
            }
        }
        true
    }
}

// =============================================================================
// Report
// =============================================================================

fn percent(part: usize, whole: usize) -> String {
    if whole == 0 {
        return "0.00".to_string();
    }
    format!("{:.2}", part as f64 / whole as f64 * 100.0)
}

/// One group row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct MarketingRow {
    pub name: String,
    pub total_leads: usize,
    pub touch_based: usize,
    pub not_touch_based: usize,
    pub qualified: usize,
    pub junk: usize,
    pub dropped: usize,
    pub converted: usize,
    pub impressions: u64,
    pub qualified_percent: String,
    pub converted_percent: String,
    pub junk_percent: String,
}

impl MarketingRow {
    fn new(name: &str) -> Self {
        MarketingRow {
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn count(&mut self, lead: &Lead) {
        self.total_leads += 1;
        if !lead.status.is_marketing_touch_based() {
            self.not_touch_based += 1;
            return;
        }
        self.touch_based += 1;
        use crate::status::LeadStatus::*;
        match lead.status {
            Qualified => self.qualified += 1,
            Junk => self.junk += 1,
            Dropped => self.dropped += 1,
            s if s.is_converted() => self.converted += 1,
            _ => {}
        }
    }

    fn finish(&mut self) {
        self.qualified_percent = percent(self.qualified + self.dropped, self.touch_based);
        self.converted_percent = percent(self.converted, self.touch_based);
        self.junk_percent = percent(self.junk, self.touch_based);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct MarketingTotals {
    pub total_impressions: u64,
    pub total_leads: usize,
    pub touch_based: usize,
    pub not_touch_based: usize,
    pub qualified: usize,
    pub junk: usize,
    pub dropped: usize,
    pub converted: usize,
    pub total_qualified_percent: String,
    pub total_converted_percent: String,
    pub total_junk_percent: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptions {
    pub events: Vec<String>,
    pub sources: Vec<String>,
    pub ad_sets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketingReport {
    pub marketing_data: Vec<MarketingRow>,
    pub totals: MarketingTotals,
    pub filter_options: FilterOptions,
    pub group_by: GroupBy,
}

/// Builds the report from already filtered leads.
///
/// `impressions` is keyed by source name (Facebook / Instagram) or ad set
/// name; groups without an entry get zero.
pub fn build_report(
    leads: &[&Lead],
    group_by: GroupBy,
    impressions: &HashMap<String, u64>,
) -> MarketingReport {
    let mut groups: BTreeMap<String, MarketingRow> = BTreeMap::new();
    let mut events = BTreeSet::new();
    let mut sources = BTreeSet::new();
    let mut ad_sets = BTreeSet::new();

    for lead in leads {
        if let Some(event) = lead.event() {
            events.insert(event.to_string());
        }
        if let Some(source) = lead.source.as_deref() {
            sources.insert(source.to_string());
        }
        if let Some(ad_set) = lead.ad_set_name() {
            ad_sets.insert(ad_set.to_string());
        }

        let key = match group_by {
            GroupBy::Event => lead.event(),
            GroupBy::AdSet => lead.ad_set_name(),
            GroupBy::Source => lead.source.as_deref(),
        }
        .unwrap_or("Unknown");

        groups
            .entry(key.to_string())
            .or_insert_with(|| MarketingRow::new(key))
            .count(lead);
    }

    let mut totals = MarketingTotals::default();
    let marketing_data: Vec<MarketingRow> = groups
        .into_values()
        .map(|mut row| {
            row.impressions = match group_by {
                GroupBy::Source | GroupBy::AdSet => impressions.get(&row.name).copied().unwrap_or(0),
                GroupBy::Event => 0,
            };
            row.finish();

            totals.total_impressions += row.impressions;
            totals.total_leads += row.total_leads;
            totals.touch_based += row.touch_based;
            totals.not_touch_based += row.not_touch_based;
            totals.qualified += row.qualified;
            totals.junk += row.junk;
            totals.dropped += row.dropped;
            totals.converted += row.converted;
            row
        })
        .collect();

    totals.total_qualified_percent = percent(totals.qualified + totals.dropped, totals.touch_based);
    totals.total_converted_percent = percent(totals.converted, totals.touch_based);
    totals.total_junk_percent = percent(totals.junk, totals.touch_based);

    MarketingReport {
        marketing_data,
        totals,
        filter_options: FilterOptions {
            events: events.into_iter().collect(),
            sources: sources.into_iter().collect(),
            ad_sets: ad_sets.into_iter().collect(),
        },
        group_by,
    }
}

/// Filters `leads` and builds the report.
pub fn marketing_report(
    leads: &[Lead],
    filters: &MarketingFilters,
    impressions: &HashMap<String, u64>,
) -> CoreResult<MarketingReport> {
    let bounds = filters.enquiry_bounds()?;
    let selected: Vec<&Lead> = leads.iter().filter(|l| filters.matches(l, &bounds)).collect();
    Ok(build_report(&selected, filters.group_by(), impressions))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::parse_timestamp;
    use crate::status::LeadStatus;

    fn lead(source: &str, status: LeadStatus, enquiry: &str) -> Lead {
        Lead {
            source: Some(source.into()),
            status,
            date_of_enquiry: parse_timestamp(enquiry),
            ..Default::default()
        }
    }

    #[test]
    fn test_group_by_precedence() {
        let mut filters = MarketingFilters {
            event: Some("IPL".into()),
            ..Default::default()
        };
        assert_eq!(filters.group_by(), GroupBy::Event);
        filters.source = Some("all".into());
        assert_eq!(filters.group_by(), GroupBy::Event);
        filters.ad_set = Some("FB_IPL".into());
        assert_eq!(filters.group_by(), GroupBy::AdSet);
        assert_eq!(MarketingFilters::default().group_by(), GroupBy::Source);
    }

    #[test]
    fn test_counts_and_percentages() {
        let leads = vec![
            lead("Facebook", LeadStatus::Qualified, "2025-07-01"),
            lead("Facebook", LeadStatus::Dropped, "2025-07-01"),
            lead("Facebook", LeadStatus::Junk, "2025-07-01"),
            lead("Facebook", LeadStatus::PaymentPostService, "2025-07-01"),
            lead("Facebook", LeadStatus::QuoteRequested, "2025-07-01"),
            lead("Google", LeadStatus::Unassigned, "2025-07-01"),
        ];
        let impressions = HashMap::from([("Facebook".to_string(), 1000u64)]);
        let report = marketing_report(&leads, &MarketingFilters::default(), &impressions).unwrap();

        let fb = &report.marketing_data[0];
        assert_eq!(fb.name, "Facebook");
        assert_eq!(fb.total_leads, 5);
        assert_eq!(fb.touch_based, 4);
        assert_eq!(fb.not_touch_based, 1);
        assert_eq!(fb.qualified_percent, "50.00");
        assert_eq!(fb.converted_percent, "25.00");
        assert_eq!(fb.junk_percent, "25.00");
        assert_eq!(fb.impressions, 1000);

        let google = &report.marketing_data[1];
        assert_eq!(google.qualified_percent, "0.00");
        assert_eq!(google.impressions, 0);

        assert_eq!(report.totals.total_leads, 6);
        assert_eq!(report.totals.total_impressions, 1000);
        assert_eq!(report.filter_options.sources, vec!["Facebook", "Google"]);
    }

    #[test]
    fn test_date_filter_uses_ist_day_boundaries() {
        let leads = vec![
            // 23:00 IST on 20 July
            lead("Facebook", LeadStatus::Hot, "2025-07-20T17:30:00Z"),
            // 00:30 IST on 21 July
            lead("Facebook", LeadStatus::Hot, "2025-07-20T19:00:00Z"),
            lead("Facebook", LeadStatus::Hot, "2025-07-21T18:29:00Z"),
        ];
        let filters = MarketingFilters {
            date_from: Some("2025-07-21".into()),
            date_to: Some("2025-07-21".into()),
            ..Default::default()
        };
        let report = marketing_report(&leads, &filters, &HashMap::new()).unwrap();
        assert_eq!(report.totals.total_leads, 2);
    }

    #[test]
    fn test_ad_set_filter_matches_either_spelling() {
        let mut a = lead("Instagram", LeadStatus::Hot, "2025-07-01");
        a.adset_name = Some("IG_Reels".into());
        let mut b = lead("Instagram", LeadStatus::Hot, "2025-07-01");
        b.ad_set = Some("IG_Story".into());

        let filters = MarketingFilters {
            ad_set: Some("IG_Reels".into()),
            ..Default::default()
        };
        let report = marketing_report(&[a, b], &filters, &HashMap::new()).unwrap();
        assert_eq!(report.group_by, GroupBy::AdSet);
        assert_eq!(report.marketing_data.len(), 1);
        assert_eq!(report.marketing_data[0].name, "IG_Reels");
    }
}
