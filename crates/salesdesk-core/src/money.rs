//! # Money Module
//!
//! Provides the `Money` type for handling rupee amounts safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  Summing 10,000 order amounts as f64:                                   │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ drift accumulates                │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Paise                                            │
//! │    Documents store rupees as JSON numbers. They are rounded to paise   │
//! │    once, at the boundary, and every sum after that is exact.           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use salesdesk_core::money::Money;
//!
//! let price = Money::from_rupees(1250.50);
//! assert_eq!(price.paise(), 125_050);
//!
//! let total = price * 2 + Money::from_paise(100);
//! assert_eq!(total.rupees(), 2502.0);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use ts_rs::TS;

use crate::CRORE;

// =============================================================================
// Money Type
// =============================================================================

/// A rupee amount in paise (1 rupee = 100 paise).
///
/// ## Design Decisions
/// - **i64 (signed)**: Margins can be negative when buying price exceeds
///   selling price
/// - **Single field tuple struct**: Zero-cost abstraction over i64
/// - **Saturating operators**: amounts come from CSV rows and stored
///   documents, so `+`, `-` and `× qty` clamp at the i64 range instead of
///   overflowing
///
/// ## Where Money is Used
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Order.base_amount × exchange_rate ──► sales (INR)                      │
/// │                                          │                              │
/// │  Σ Allocation.total_buying_price ───────►├──► margin                    │
/// │  Order.buying_price_inclusions ─────────►┘                              │
/// │                                                                         │
/// │  rate × quantity + service fee ──► GST ──► TCS ──► final amount        │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from paise.
    #[inline]
    pub const fn from_paise(paise: i64) -> Self {
        Money(paise)
    }

    /// Creates a Money value from a rupee amount, rounding to the nearest
    /// paisa.
    ///
    /// Non-finite input (NaN, infinity) is treated as zero.
    ///
    /// ## Example
    /// ```rust
    /// use salesdesk_core::money::Money;
    ///
    /// assert_eq!(Money::from_rupees(10.506).paise(), 1051);
    /// assert_eq!(Money::from_rupees(f64::NAN).paise(), 0);
    /// ```
    pub fn from_rupees(rupees: f64) -> Self {
        if !rupees.is_finite() {
            return Money::zero();
        }
        Money((rupees * 100.0).round() as i64)
    }

    /// Returns the value in paise.
    #[inline]
    pub const fn paise(&self) -> i64 {
        self.0
    }

    /// Returns the value in rupees.
    #[inline]
    pub fn rupees(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Returns the value in crores (1 crore = 10,000,000 rupees).
    ///
    /// ## Example
    /// ```rust
    /// use salesdesk_core::money::Money;
    ///
    /// let sales = Money::from_rupees(25_000_000.0);
    /// assert_eq!(sales.crores(), 2.5);
    /// ```
    #[inline]
    pub fn crores(&self) -> f64 {
        self.rupees() / CRORE
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Converts a foreign-currency amount to INR using an exchange rate.
    ///
    /// ## Example
    /// ```rust
    /// use salesdesk_core::money::Money;
    ///
    /// let usd = Money::from_rupees(100.0);
    /// assert_eq!(usd.convert(83.25).rupees(), 8325.0);
    /// ```
    pub fn convert(&self, rate: f64) -> Money {
        if !rate.is_finite() {
            return *self;
        }
        Money((self.0 as f64 * rate).round() as i64)
    }

    /// Calculates a percentage of this amount given in basis points
    /// (1800 = 18%), rounding half up.
    ///
    /// ## Example
    /// ```rust
    /// use salesdesk_core::money::Money;
    ///
    /// let base = Money::from_rupees(1000.0);
    /// assert_eq!(base.percent_bps(1800).rupees(), 180.0);
    /// ```
    pub fn percent_bps(&self, bps: u32) -> Money {
        // i128 prevents overflow on large amounts
        let value = (self.0 as i128 * bps as i128 + 5000) / 10000;
        Money(value.clamp(i64::MIN as i128, i64::MAX as i128) as i64)
    }

    /// Returns `self / total` as a percentage, or 0 when `total` is zero.
    ///
    /// ## Example
    /// ```rust
    /// use salesdesk_core::money::Money;
    ///
    /// let margin = Money::from_rupees(250.0);
    /// let sales = Money::from_rupees(1000.0);
    /// assert_eq!(margin.percentage_of(sales), 25.0);
    /// assert_eq!(margin.percentage_of(Money::zero()), 0.0);
    /// ```
    pub fn percentage_of(&self, total: Money) -> f64 {
        if total.is_zero() {
            return 0.0;
        }
        self.0 as f64 / total.0 as f64 * 100.0
    }

    /// Splits the amount into two halves whose sum is exactly the original.
    /// The first half is rounded down.
    pub fn split_half(&self) -> (Money, Money) {
        let first = Money(self.0.div_euclid(2));
        (first, *self - first)
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.saturating_abs())
    }

    /// Formats with Indian digit grouping, e.g. `₹1,50,000` or `₹1,234.50`.
    /// Paise are shown only when non-zero.
    pub fn format_inr(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        let rupees = (self.0 / 100).unsigned_abs().to_string();
        let paise = (self.0 % 100).unsigned_abs();

        let grouped = if rupees.len() <= 3 {
            rupees
        } else {
            let (head, tail) = rupees.split_at(rupees.len() - 3);
            let mut groups: Vec<&str> = Vec::new();
            let mut rest = head;
            while rest.len() > 2 {
                let (left, right) = rest.split_at(rest.len() - 2);
                groups.push(right);
                rest = left;
            }
            groups.push(rest);
            groups.reverse();
            format!("{},{}", groups.join(","), tail)
        };

        if paise == 0 {
            format!("{sign}₹{grouped}")
        } else {
            format!("{sign}₹{grouped}.{paise:02}")
        }
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display shows rupees with two decimals, e.g. `₹1250.50`.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}₹{}.{:02}", sign, (self.0 / 100).abs(), (self.0 % 100).abs())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0.saturating_add(other.0))
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_add(other.0);
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0.saturating_sub(other.0))
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_sub(other.0);
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(self.0.saturating_neg())
    }
}

/// Multiplication by ticket quantity. Saturates like the other operators.
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0.saturating_mul(qty))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + *m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_inr_uses_lakh_grouping() {
        assert_eq!(Money::from_rupees(150_000.0).format_inr(), "₹1,50,000");
        assert_eq!(Money::from_rupees(12_345_678.5).format_inr(), "₹1,23,45,678.50");
        assert_eq!(Money::from_rupees(999.0).format_inr(), "₹999");
        assert_eq!(Money::from_rupees(-1_000.0).format_inr(), "-₹1,000");
    }

    #[test]
    fn test_from_rupees_rounds_to_paise() {
        assert_eq!(Money::from_rupees(1099.99).paise(), 109_999);
        assert_eq!(Money::from_rupees(0.004).paise(), 0);
        assert_eq!(Money::from_rupees(-5.5).paise(), -550);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_paise(109_999).to_string(), "₹1099.99");
        assert_eq!(Money::from_paise(500).to_string(), "₹5.00");
        assert_eq!(Money::from_paise(-550).to_string(), "-₹5.50");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_rupees(10.0);
        let b = Money::from_rupees(5.0);

        assert_eq!((a + b).rupees(), 15.0);
        assert_eq!((a - b).rupees(), 5.0);
        assert_eq!((b - a).rupees(), -5.0);
        assert_eq!((a * 3).rupees(), 30.0);
        assert_eq!((-a).paise(), -1000);
    }

    #[test]
    fn test_operators_saturate_at_range() {
        let huge = Money::from_paise(i64::MAX - 10);
        assert_eq!(huge + Money::from_paise(100), Money::from_paise(i64::MAX));
        assert_eq!(Money::from_rupees(1e15) * 100_000, Money::from_paise(i64::MAX));
        assert_eq!(-huge - Money::from_paise(100), Money::from_paise(i64::MIN));

        let mut total = huge;
        total += huge;
        assert_eq!(total.paise(), i64::MAX);

        let summed: Money = [huge, huge, huge].iter().sum();
        assert_eq!(summed.paise(), i64::MAX);
        assert_eq!(Money::from_paise(i64::MIN).abs().paise(), i64::MAX);
    }

    #[test]
    fn test_sum() {
        let amounts = vec![
            Money::from_rupees(0.1),
            Money::from_rupees(0.2),
            Money::from_rupees(0.3),
        ];
        let total: Money = amounts.iter().sum();
        assert_eq!(total.paise(), 60);
    }

    #[test]
    fn test_convert_with_exchange_rate() {
        let eur = Money::from_rupees(1500.0);
        assert_eq!(eur.convert(90.5).rupees(), 135_750.0);
        assert_eq!(eur.convert(1.0), eur);
    }

    #[test]
    fn test_split_half_keeps_total() {
        let gst = Money::from_paise(1801);
        let (cgst, sgst) = gst.split_half();
        assert_eq!(cgst.paise(), 900);
        assert_eq!(sgst.paise(), 901);
        assert_eq!(cgst + sgst, gst);
    }

    #[test]
    fn test_crores() {
        assert_eq!(Money::from_rupees(10_000_000.0).crores(), 1.0);
    }
}
