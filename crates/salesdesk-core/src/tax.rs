//! # GST & TCS
//!
//! Tax computation for orders created from bulk uploads.
//!
//! ## Rules
//! ```text
//! GST applies when: customer is Indian
//!               OR  event is in India
//!               OR  payment is in INR
//!
//! Taxable amount:   "Service Fee" sale ──► service fee only
//!                   any other sale     ──► invoice total + service fee
//!
//! Split:            Haryana and event in India ──► CGST + SGST (half each)
//!                   otherwise                  ──► IGST
//!
//! TCS applies when: not a corporate sale
//!               AND event outside India
//!               AND (customer is Indian OR payment is in INR)
//!                   on invoice total + service fee + GST
//! ```

use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::status::{CustomerType, EventLocation, SaleCategory};

/// State whose intra-state sales are split into CGST and SGST.
pub const HOME_STATE: &str = "Haryana";

/// Sale type taxed on the service fee alone.
pub const SERVICE_FEE_SALE: &str = "Service Fee";

/// Everything the tax computation needs.
#[derive(Debug, Clone)]
pub struct TaxInput {
    /// rate × quantity
    pub invoice_total: Money,
    pub service_fee: Money,
    /// Percent, e.g. 18.0
    pub gst_rate: f64,
    /// Percent, e.g. 5.0
    pub tcs_rate: f64,
    pub customer_type: CustomerType,
    pub event_location: EventLocation,
    pub category: SaleCategory,
    pub type_of_sale: String,
    pub state: Option<String>,
    pub inr_payment: bool,
}

/// Computed taxes. All amounts in the order currency.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaxBreakdown {
    pub gst_applicable: bool,
    pub effective_gst_rate: f64,
    pub taxable_amount: Money,
    pub gst: Money,
    pub cgst: Money,
    pub sgst: Money,
    pub igst: Money,
    pub tcs_applicable: bool,
    pub tcs_rate: f64,
    pub tcs: Money,
    /// invoice total + service fee
    pub total_before_tax: Money,
    pub final_amount: Money,
}

fn bps(percent: f64) -> u32 {
    if !percent.is_finite() || percent <= 0.0 {
        return 0;
    }
    (percent * 100.0).round() as u32
}

impl TaxInput {
    fn outside_india(&self) -> bool {
        self.event_location == EventLocation::OutsideIndia
    }

    fn indian(&self) -> bool {
        self.customer_type == CustomerType::Indian
    }

    pub fn gst_applicable(&self) -> bool {
        self.indian() || !self.outside_india() || self.inr_payment
    }

    pub fn tcs_applicable(&self) -> bool {
        self.category != SaleCategory::Corporate
            && self.outside_india()
            && (self.indian() || self.inr_payment)
    }

    fn intra_state(&self) -> bool {
        !self.outside_india()
            && self
                .state
                .as_deref()
                .map(|s| s.trim().eq_ignore_ascii_case(HOME_STATE))
                .unwrap_or(false)
    }

    /// Computes GST, its split and TCS.
    ///
    /// ## Example
    /// ```rust
    /// use salesdesk_core::tax::TaxInput;
    /// use salesdesk_core::{CustomerType, EventLocation, Money, SaleCategory};
    ///
    /// let input = TaxInput {
    ///     invoice_total: Money::from_rupees(10_000.0),
    ///     service_fee: Money::from_rupees(1_000.0),
    ///     gst_rate: 18.0,
    ///     tcs_rate: 5.0,
    ///     customer_type: CustomerType::Indian,
    ///     event_location: EventLocation::India,
    ///     category: SaleCategory::Retail,
    ///     type_of_sale: "Service Fee".into(),
    ///     state: Some("Haryana".into()),
    ///     inr_payment: true,
    /// };
    /// let tax = input.compute();
    /// assert_eq!(tax.gst.rupees(), 180.0);
    /// assert_eq!(tax.cgst.rupees(), 90.0);
    /// assert_eq!(tax.final_amount.rupees(), 11_180.0);
    /// ```
    pub fn compute(&self) -> TaxBreakdown {
        let gst_applicable = self.gst_applicable();
        let effective_gst_rate = if gst_applicable { self.gst_rate } else { 0.0 };

        let service_fee_only = self.type_of_sale.trim().eq_ignore_ascii_case(SERVICE_FEE_SALE);
        let taxable_amount = if service_fee_only {
            self.service_fee
        } else {
            self.invoice_total + self.service_fee
        };
        let gst = taxable_amount.percent_bps(bps(effective_gst_rate));

        let (cgst, sgst, igst) = if gst.is_zero() {
            (Money::zero(), Money::zero(), Money::zero())
        } else if self.intra_state() {
            let (c, s) = gst.split_half();
            (c, s, Money::zero())
        } else {
            (Money::zero(), Money::zero(), gst)
        };

        let total_before_tax = self.invoice_total + self.service_fee;
        let tcs_applicable = self.tcs_applicable();
        let tcs = if tcs_applicable {
            (total_before_tax + gst).percent_bps(bps(self.tcs_rate))
        } else {
            Money::zero()
        };

        TaxBreakdown {
            gst_applicable,
            effective_gst_rate,
            taxable_amount,
            gst,
            cgst,
            sgst,
            igst,
            tcs_applicable,
            tcs_rate: self.tcs_rate,
            tcs,
            total_before_tax,
            final_amount: total_before_tax + gst + tcs,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> TaxInput {
        TaxInput {
            invoice_total: Money::from_rupees(100_000.0),
            service_fee: Money::from_rupees(10_000.0),
            gst_rate: 18.0,
            tcs_rate: 5.0,
            customer_type: CustomerType::Indian,
            event_location: EventLocation::India,
            category: SaleCategory::Retail,
            type_of_sale: "Tour Package".into(),
            state: Some("Maharashtra".into()),
            inr_payment: true,
        }
    }

    #[test]
    fn test_tour_package_in_india_pays_igst_on_everything() {
        let tax = input().compute();
        assert_eq!(tax.taxable_amount.rupees(), 110_000.0);
        assert_eq!(tax.igst.rupees(), 19_800.0);
        assert!(tax.cgst.is_zero());
        assert!(!tax.tcs_applicable);
        assert_eq!(tax.final_amount.rupees(), 129_800.0);
    }

    #[test]
    fn test_foreign_customer_abroad_paying_in_foreign_currency_has_no_gst() {
        let tax = TaxInput {
            customer_type: CustomerType::Foreign,
            event_location: EventLocation::OutsideIndia,
            inr_payment: false,
            ..input()
        }
        .compute();
        assert!(!tax.gst_applicable);
        assert!(tax.gst.is_zero());
        assert!(!tax.tcs_applicable);
        assert_eq!(tax.final_amount.rupees(), 110_000.0);
    }

    #[test]
    fn test_retail_sale_abroad_collects_tcs() {
        let tax = TaxInput {
            event_location: EventLocation::OutsideIndia,
            state: Some("Haryana".into()),
            ..input()
        }
        .compute();
        // Haryana does not make it intra-state when the event is abroad
        assert_eq!(tax.igst.rupees(), 19_800.0);
        assert!(tax.tcs_applicable);
        assert_eq!(tax.tcs.rupees(), 6_490.0);
        assert_eq!(tax.final_amount.rupees(), 136_290.0);
    }

    #[test]
    fn test_corporate_sales_never_collect_tcs() {
        let tax = TaxInput {
            event_location: EventLocation::OutsideIndia,
            category: SaleCategory::Corporate,
            ..input()
        }
        .compute();
        assert!(!tax.tcs_applicable);
        assert!(tax.tcs.is_zero());
    }

    #[test]
    fn test_intra_state_split_keeps_total() {
        let tax = TaxInput {
            invoice_total: Money::from_paise(1),
            service_fee: Money::from_paise(10_000),
            type_of_sale: SERVICE_FEE_SALE.into(),
            state: Some("haryana".into()),
            ..input()
        }
        .compute();
        assert_eq!(tax.gst.paise(), 1_800);
        assert_eq!(tax.cgst + tax.sgst, tax.gst);
        assert!(tax.igst.is_zero());
    }
}
