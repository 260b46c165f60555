//! # Document Records
//!
//! Typed views of the documents stored in each collection.
//!
//! ## Record Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Lead ──(lead_id)──► Order ──(order_id / order_number)──► Allocation   │
//! │    │                    │                                     │         │
//! │    │                    ├──► Invoice, Payment                 ▼         │
//! │    ▼                    │                                 Inventory     │
//! │  Reminder               └──► Journey (public token)      └ categories  │
//! │                                                                         │
//! │   User ──► TeamMember (sales / retail) ──► SalesTarget                  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Loose Documents
//! Documents carry no enforced schema. Numbers sometimes arrive as strings,
//! statuses in mixed case, timestamps in several shapes. Every field is
//! therefore read through a lenient deserializer from [`de`], and fields this
//! crate does not know about are kept in `extra` so a read-modify-write never
//! drops them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::status::{
    BusinessType, CustomerType, Department, EventLocation, LeadStatus, MilestoneStatus, OrderStatus,
    Priority, ReminderStatus, Role, SaleCategory, Temperature,
};

// =============================================================================
// Lenient Deserializers
// =============================================================================

/// Field deserializers that accept the shapes found in real documents.
pub mod de {
    use chrono::{DateTime, TimeZone, Utc};
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;
    use std::str::FromStr;

    use crate::dates::parse_timestamp;
    use crate::status::{LeadStatus, OrderStatus};

    /// Number or numeric string (`"1,250.50"`).
    pub fn opt_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        Ok(match Option::<Value>::deserialize(d)? {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().replace(',', "").parse().ok(),
            _ => None,
        })
    }

    /// Integer, float (rounded) or numeric string.
    pub fn opt_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        Ok(match Option::<Value>::deserialize(d)? {
            Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok().map(|f| f.round() as i64),
            _ => None,
        })
    }

    /// Integer defaulting to zero.
    pub fn i64_or_zero<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
        opt_i64(d).map(|v| v.unwrap_or(0))
    }

    /// String, or a number/bool rendered as a string. Blank strings are `None`.
    pub fn opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Option::<Value>::deserialize(d)? {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(Value::Bool(b)) => Some(b.to_string()),
            _ => None,
        })
    }

    /// Any accepted timestamp shape, including `{ "_seconds": .. }` objects
    /// and epoch milliseconds.
    pub fn opt_timestamp<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        Ok(match Option::<Value>::deserialize(d)? {
            Some(Value::String(s)) => parse_timestamp(&s),
            Some(Value::Number(n)) => n
                .as_i64()
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
            Some(Value::Object(obj)) => obj
                .get("_seconds")
                .or_else(|| obj.get("seconds"))
                .and_then(Value::as_i64)
                .and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
            _ => None,
        })
    }

    /// Enum parsed through `FromStr`; unrecognized values become `None`.
    pub fn opt_enum<'de, D, T>(d: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: FromStr,
    {
        Ok(match Option::<Value>::deserialize(d)? {
            Some(Value::String(s)) => s.parse().ok(),
            _ => None,
        })
    }

    /// Enum parsed through `FromStr`, falling back to its default.
    pub fn enum_or_default<'de, D, T>(d: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: FromStr + Default,
    {
        opt_enum(d).map(Option::unwrap_or_default)
    }

    pub fn lead_status<'de, D: Deserializer<'de>>(d: D) -> Result<LeadStatus, D::Error> {
        enum_or_default(d)
    }

    pub fn order_status<'de, D: Deserializer<'de>>(d: D) -> Result<OrderStatus, D::Error> {
        enum_or_default(d)
    }

    /// Bool, `"true"`/`"yes"`, or a non-zero number.
    pub fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        Ok(match Option::<Value>::deserialize(d)? {
            Some(Value::Bool(b)) => b,
            Some(Value::String(s)) => matches!(s.trim().to_lowercase().as_str(), "true" | "yes" | "1"),
            Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
            _ => false,
        })
    }

    /// Array of strings, or a comma separated string.
    pub fn string_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        Ok(match Option::<Value>::deserialize(d)? {
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect(),
            Some(Value::String(s)) => s
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        })
    }
}

/// Loose fields preserved across read-modify-write.
pub type Extra = Map<String, Value>;

fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

// =============================================================================
// Lead
// =============================================================================

/// A sales enquiry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Lead {
    #[serde(default)]
    pub id: String,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub company: Option<String>,
    #[serde(default, deserialize_with = "de::opt_enum")]
    pub business_type: Option<BusinessType>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub source: Option<String>,
    #[serde(default, deserialize_with = "de::opt_timestamp")]
    pub date_of_enquiry: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub lead_for_event: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub event_name: Option<String>,
    #[serde(default, deserialize_with = "de::opt_i64")]
    pub number_of_people: Option<i64>,
    /// Expected deal value in rupees.
    #[serde(default, deserialize_with = "de::opt_f64")]
    pub potential_value: Option<f64>,
    #[serde(default, deserialize_with = "de::lead_status")]
    pub status: LeadStatus,
    #[serde(default, deserialize_with = "de::opt_enum")]
    pub temperature: Option<Temperature>,
    /// Email of the assigned sales person.
    #[serde(default, deserialize_with = "de::opt_string")]
    pub assigned_to: Option<String>,
    #[serde(default, deserialize_with = "de::opt_timestamp")]
    pub assigned_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub campaign_name: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub ad_set: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub adset_name: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub notes: Option<String>,

    // Client grouping (several leads from one phone number)
    #[serde(default, deserialize_with = "de::opt_string")]
    pub client_id: Option<String>,
    #[serde(default, deserialize_with = "de::flag")]
    pub is_primary_lead: bool,
    #[serde(default, deserialize_with = "de::opt_i64")]
    pub client_total_leads: Option<i64>,
    #[serde(default, deserialize_with = "de::string_list")]
    pub client_events: Vec<String>,
    #[serde(default, deserialize_with = "de::flag")]
    pub manual_assignment_override: bool,

    #[serde(default, deserialize_with = "de::opt_timestamp")]
    pub created_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "de::opt_timestamp")]
    pub updated_date: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub extra: Extra,
}

impl Lead {
    /// Business type, defaulting to retail (B2C).
    pub fn business_type(&self) -> BusinessType {
        self.business_type.unwrap_or_default()
    }

    /// Event the lead enquired about.
    pub fn event(&self) -> Option<&str> {
        self.lead_for_event
            .as_deref()
            .or(self.event_name.as_deref())
    }

    /// Ad set the lead came from (either spelling).
    pub fn ad_set_name(&self) -> Option<&str> {
        self.ad_set.as_deref().or(self.adset_name.as_deref())
    }

    pub fn potential_value(&self) -> Money {
        Money::from_rupees(self.potential_value.unwrap_or(0.0))
    }

    /// The lead counts towards pipeline value: hot/warm/cold status, or a
    /// quote stage with a hot/warm/cold temperature.
    pub fn is_pipeline(&self) -> bool {
        match self.status {
            LeadStatus::Hot | LeadStatus::Warm | LeadStatus::Cold => true,
            LeadStatus::QuoteRequested | LeadStatus::QuoteReceived => self.temperature.is_some(),
            _ => false,
        }
    }

    /// Hot or warm status, or a quote stage with a hot/warm temperature.
    pub fn is_hot_warm(&self) -> bool {
        match self.status {
            LeadStatus::Hot | LeadStatus::Warm => true,
            LeadStatus::QuoteRequested | LeadStatus::QuoteReceived => matches!(
                self.temperature,
                Some(Temperature::Hot) | Some(Temperature::Warm)
            ),
            _ => false,
        }
    }

    pub fn is_assigned_to(&self, email: &str) -> bool {
        self.assigned_to
            .as_deref()
            .map(|a| eq_ignore_case(a, email))
            .unwrap_or(false)
    }
}

// =============================================================================
// Order
// =============================================================================

/// An order created from a converted lead.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Order {
    #[serde(default)]
    pub id: String,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub order_number: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub lead_id: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub client_name: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub client_email: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub client_phone: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub event_name: Option<String>,
    #[serde(default, deserialize_with = "de::opt_timestamp")]
    pub event_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "de::order_status")]
    pub status: OrderStatus,

    // Currency
    #[serde(default, deserialize_with = "de::opt_string")]
    pub payment_currency: Option<String>,
    #[serde(default, deserialize_with = "de::opt_f64")]
    pub exchange_rate: Option<f64>,

    // Amounts (order currency unless noted)
    #[serde(default, deserialize_with = "de::opt_f64")]
    pub base_amount: Option<f64>,
    #[serde(default, deserialize_with = "de::opt_f64")]
    pub total_amount: Option<f64>,
    #[serde(default, deserialize_with = "de::opt_f64")]
    pub invoice_total: Option<f64>,
    #[serde(default, deserialize_with = "de::opt_f64")]
    pub service_fee_amount: Option<f64>,
    #[serde(default, deserialize_with = "de::opt_f64")]
    pub gst_rate: Option<f64>,
    #[serde(default, deserialize_with = "de::opt_f64")]
    pub gst_amount: Option<f64>,
    #[serde(default, deserialize_with = "de::opt_f64")]
    pub cgst_amount: Option<f64>,
    #[serde(default, deserialize_with = "de::opt_f64")]
    pub sgst_amount: Option<f64>,
    #[serde(default, deserialize_with = "de::opt_f64")]
    pub igst_amount: Option<f64>,
    #[serde(default, deserialize_with = "de::opt_f64")]
    pub tcs_rate: Option<f64>,
    #[serde(default, deserialize_with = "de::opt_f64")]
    pub tcs_amount: Option<f64>,
    #[serde(default, deserialize_with = "de::opt_f64")]
    pub final_amount: Option<f64>,
    #[serde(default, deserialize_with = "de::opt_f64")]
    pub advance_amount: Option<f64>,
    #[serde(default, deserialize_with = "de::opt_f64")]
    pub total_paid: Option<f64>,
    /// Extra buying cost (hotel, travel) not covered by allocations, in INR.
    #[serde(default, deserialize_with = "de::opt_f64")]
    pub buying_price_inclusions: Option<f64>,

    // Tax context
    #[serde(default, deserialize_with = "de::opt_enum")]
    pub customer_type: Option<CustomerType>,
    #[serde(default, deserialize_with = "de::opt_enum")]
    pub event_location: Option<EventLocation>,
    #[serde(default, deserialize_with = "de::opt_enum")]
    pub category_of_sale: Option<SaleCategory>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub type_of_sale: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub client_state: Option<String>,

    // Payment
    #[serde(default, deserialize_with = "de::opt_string")]
    pub payment_method: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub payment_status: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub invoice_number: Option<String>,

    // Sales attribution
    #[serde(default, deserialize_with = "de::opt_string")]
    pub sales_person: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub sales_person_email: Option<String>,

    #[serde(default, deserialize_with = "de::string_list")]
    pub allocation_ids: Vec<String>,

    // Approval
    #[serde(default, deserialize_with = "de::opt_string")]
    pub approved_by: Option<String>,
    #[serde(default, deserialize_with = "de::opt_timestamp")]
    pub approval_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub approval_notes: Option<String>,

    #[serde(default, deserialize_with = "de::opt_string")]
    pub created_by: Option<String>,
    #[serde(default, deserialize_with = "de::opt_timestamp")]
    pub created_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "de::opt_timestamp")]
    pub updated_date: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub extra: Extra,
}

impl Order {
    pub fn is_inr(&self) -> bool {
        self.payment_currency
            .as_deref()
            .map(|c| eq_ignore_case(c, "INR"))
            .unwrap_or(false)
    }

    /// Exchange rate to INR. Missing or zero rates count as 1.
    pub fn exchange_rate(&self) -> f64 {
        match self.exchange_rate {
            Some(rate) if rate.is_finite() && rate != 0.0 => rate,
            _ => 1.0,
        }
    }

    /// INR-equivalent sales value of the order.
    ///
    /// INR orders use `base_amount`, falling back to `total_amount`. Other
    /// currencies use `base_amount × exchange_rate`.
    ///
    /// ## Example
    /// ```rust
    /// use salesdesk_core::Order;
    ///
    /// let order = Order {
    ///     payment_currency: Some("USD".into()),
    ///     base_amount: Some(1000.0),
    ///     exchange_rate: Some(83.5),
    ///     ..Default::default()
    /// };
    /// assert_eq!(order.sales_amount().rupees(), 83_500.0);
    /// ```
    pub fn sales_amount(&self) -> Money {
        if self.is_inr() {
            let amount = self.base_amount.or(self.total_amount).unwrap_or(0.0);
            Money::from_rupees(amount)
        } else {
            Money::from_rupees(self.base_amount.unwrap_or(0.0)).convert(self.exchange_rate())
        }
    }

    pub fn buying_price_inclusions(&self) -> Money {
        Money::from_rupees(self.buying_price_inclusions.unwrap_or(0.0))
    }

    /// Sales person as recorded on the order (name or email).
    pub fn sales_person(&self) -> Option<&str> {
        self.sales_person
            .as_deref()
            .or(self.sales_person_email.as_deref())
    }
}

// =============================================================================
// Allocation
// =============================================================================

/// Tickets from an inventory item assigned to a lead/order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Allocation {
    #[serde(default)]
    pub id: String,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub lead_id: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub order_id: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub order_number: Option<String>,
    #[serde(default, deserialize_with = "de::string_list")]
    pub order_ids: Vec<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub inventory_id: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub event_name: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub category_name: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub stand_section: Option<String>,
    #[serde(default, deserialize_with = "de::i64_or_zero")]
    pub tickets_allocated: i64,
    /// Per-ticket selling price in rupees.
    #[serde(default, deserialize_with = "de::opt_f64")]
    pub selling_price: Option<f64>,
    /// Per-ticket buying price in rupees.
    #[serde(default, deserialize_with = "de::opt_f64")]
    pub buying_price: Option<f64>,
    #[serde(default, deserialize_with = "de::opt_f64")]
    pub total_buying_price: Option<f64>,
    #[serde(default, deserialize_with = "de::opt_timestamp")]
    pub allocation_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub notes: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub created_by: Option<String>,

    #[serde(flatten)]
    pub extra: Extra,
}

impl Allocation {
    /// Total buying cost: the stored total, or per-ticket price × tickets.
    pub fn buying_cost(&self) -> Money {
        match self.total_buying_price {
            Some(total) => Money::from_rupees(total),
            None => Money::from_rupees(self.buying_price.unwrap_or(0.0)) * self.tickets_allocated,
        }
    }

    /// Every key this allocation can be joined to an order by.
    pub fn order_keys(&self) -> impl Iterator<Item = &str> {
        self.order_id
            .as_deref()
            .into_iter()
            .chain(self.order_number.as_deref())
            .chain(self.order_ids.iter().map(String::as_str))
    }
}

// =============================================================================
// Inventory
// =============================================================================

/// Event-level ticket stock.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Inventory {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub event_name: String,
    #[serde(default, deserialize_with = "de::opt_timestamp")]
    pub event_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub event_type: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub venue: Option<String>,
    #[serde(default, deserialize_with = "de::i64_or_zero")]
    pub available_tickets: i64,
    #[serde(default, deserialize_with = "de::i64_or_zero")]
    pub total_tickets: i64,
    #[serde(default, deserialize_with = "de::opt_f64")]
    pub buying_price: Option<f64>,
    #[serde(default, deserialize_with = "de::opt_f64")]
    pub selling_price: Option<f64>,
    #[serde(default)]
    pub categories: Vec<InventoryCategory>,
    #[serde(rename = "isDeleted", default, deserialize_with = "de::flag")]
    pub is_deleted: bool,
    #[serde(default, deserialize_with = "de::opt_timestamp")]
    pub created_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "de::opt_timestamp")]
    pub updated_date: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub extra: Extra,
}

/// A priced ticket category within an inventory item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InventoryCategory {
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub section: Option<String>,
    #[serde(default, deserialize_with = "de::i64_or_zero")]
    pub total_tickets: i64,
    #[serde(default, deserialize_with = "de::i64_or_zero")]
    pub available_tickets: i64,
    #[serde(default, deserialize_with = "de::opt_f64")]
    pub buying_price: Option<f64>,
    #[serde(default, deserialize_with = "de::opt_f64")]
    pub selling_price: Option<f64>,

    #[serde(flatten)]
    pub extra: Extra,
}

impl Inventory {
    pub fn has_categories(&self) -> bool {
        !self.categories.is_empty()
    }

    /// Finds a category by name and, when given, section (case-insensitive).
    pub fn find_category(&self, name: &str, section: Option<&str>) -> Option<usize> {
        self.categories.iter().position(|c| {
            eq_ignore_case(&c.name, name)
                && match section.filter(|s| !s.trim().is_empty()) {
                    Some(section) => c
                        .section
                        .as_deref()
                        .map(|s| eq_ignore_case(s, section))
                        .unwrap_or(false),
                    None => true,
                }
        })
    }

    /// Removes `quantity` tickets from stock, from the category when one is
    /// given and always from the event total.
    pub fn allocate(&mut self, category: Option<usize>, quantity: i64) -> CoreResult<()> {
        if let Some(idx) = category {
            let cat = self.categories.get_mut(idx).ok_or_else(|| CoreError::CategoryNotFound {
                event: self.event_name.clone(),
                category: idx.to_string(),
            })?;
            if cat.available_tickets < quantity {
                return Err(CoreError::InsufficientInventory {
                    event: self.event_name.clone(),
                    category: Some(cat.name.clone()),
                    available: cat.available_tickets,
                    requested: quantity,
                });
            }
            cat.available_tickets -= quantity;
        } else if self.available_tickets < quantity {
            return Err(CoreError::InsufficientInventory {
                event: self.event_name.clone(),
                category: None,
                available: self.available_tickets,
                requested: quantity,
            });
        }
        self.available_tickets = (self.available_tickets - quantity).max(0);
        Ok(())
    }

    /// Puts `quantity` tickets back into stock.
    pub fn release(&mut self, category: Option<usize>, quantity: i64) {
        if let Some(cat) = category.and_then(|idx| self.categories.get_mut(idx)) {
            cat.available_tickets += quantity;
        }
        self.available_tickets += quantity;
    }
}

// =============================================================================
// Reminder
// =============================================================================

/// A follow-up task tied to a lead.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Reminder {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub lead_id: String,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub lead_name: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub assigned_to: Option<String>,
    #[serde(default = "default_reminder_type")]
    pub reminder_type: String,
    #[serde(default = "default_reminder_title")]
    pub title: String,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "de::opt_timestamp")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "de::enum_or_default")]
    pub status: ReminderStatus,
    #[serde(default, deserialize_with = "de::enum_or_default")]
    pub priority: Priority,
    #[serde(default, deserialize_with = "de::flag")]
    pub is_overdue: bool,
    #[serde(default, deserialize_with = "de::flag")]
    pub auto_generated: bool,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub created_by: Option<String>,
    #[serde(default, deserialize_with = "de::opt_timestamp")]
    pub created_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "de::opt_timestamp")]
    pub updated_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "de::opt_timestamp")]
    pub completed_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub completed_by: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub completion_notes: Option<String>,
    #[serde(default, deserialize_with = "de::opt_timestamp")]
    pub snoozed_until: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "de::i64_or_zero")]
    pub snooze_count: i64,
    #[serde(default, deserialize_with = "de::flag")]
    pub escalated: bool,
    #[serde(default, deserialize_with = "de::opt_timestamp")]
    pub escalated_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub escalated_to: Option<String>,

    #[serde(flatten)]
    pub extra: Extra,
}

fn default_reminder_type() -> String {
    "follow_up".to_string()
}

fn default_reminder_title() -> String {
    "Follow-up required".to_string()
}

// =============================================================================
// Event (calendar)
// =============================================================================

/// An entry in the events calendar.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Event {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub event_name: String,
    #[serde(default, deserialize_with = "de::opt_timestamp")]
    pub event_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "de::opt_timestamp")]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub event_type: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub sport_type: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub venue: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub city: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub country: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub created_by: Option<String>,
    #[serde(default, deserialize_with = "de::opt_timestamp")]
    pub created_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "de::opt_timestamp")]
    pub updated_date: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub extra: Extra,
}

// =============================================================================
// Journey
// =============================================================================

/// Post-sale customer experience tracker, viewable by the customer through
/// a public access token.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Journey {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub order_id: String,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub lead_id: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub client_name: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub event_name: Option<String>,
    #[serde(default, deserialize_with = "de::opt_timestamp")]
    pub event_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub milestones: Vec<Milestone>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub created_by: Option<String>,
    #[serde(default, deserialize_with = "de::opt_timestamp")]
    pub created_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "de::opt_timestamp")]
    pub updated_date: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub extra: Extra,
}

/// One step of a journey.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Milestone {
    pub key: String,
    pub title: String,
    #[serde(default, deserialize_with = "de::enum_or_default")]
    pub status: MilestoneStatus,
    #[serde(default, deserialize_with = "de::opt_timestamp")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub notes: Option<String>,
}

impl Journey {
    /// Milestones every new journey starts with.
    pub fn default_milestones() -> Vec<Milestone> {
        [
            ("booking_confirmed", "Booking confirmed"),
            ("payment_received", "Payment received"),
            ("tickets_allocated", "Tickets allocated"),
            ("travel_arranged", "Travel arranged"),
            ("tickets_delivered", "Tickets delivered"),
            ("event_attended", "Event attended"),
            ("feedback_collected", "Feedback collected"),
        ]
        .into_iter()
        .map(|(key, title)| Milestone {
            key: key.to_string(),
            title: title.to_string(),
            ..Default::default()
        })
        .collect()
    }

    /// Share of milestones completed, 0-100.
    pub fn progress_percent(&self) -> u32 {
        if self.milestones.is_empty() {
            return 0;
        }
        let done = self
            .milestones
            .iter()
            .filter(|m| m.status == MilestoneStatus::Completed)
            .count();
        (done * 100 / self.milestones.len()) as u32
    }
}

// =============================================================================
// Users & Teams
// =============================================================================

/// A CRM user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, deserialize_with = "de::enum_or_default")]
    pub role: Role,
    #[serde(default, deserialize_with = "de::opt_enum")]
    pub department: Option<Department>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "de::opt_timestamp")]
    pub created_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "de::opt_timestamp")]
    pub updated_date: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub extra: Extra,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.status
            .as_deref()
            .map(|s| eq_ignore_case(s, "active"))
            .unwrap_or(true)
    }

    pub fn is_retail(&self) -> bool {
        self.department == Some(Department::Retail)
    }
}

/// A manually added member of the sales-performance or retail-tracker team.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TeamMember {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub added_by: Option<String>,
    #[serde(default, deserialize_with = "de::opt_timestamp")]
    pub added_date: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub extra: Extra,
}

/// A sales person's target, stored in rupees.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SalesTarget {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default, deserialize_with = "de::opt_f64")]
    pub target: Option<f64>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub updated_by: Option<String>,
    #[serde(default, deserialize_with = "de::opt_timestamp")]
    pub updated_date: Option<DateTime<Utc>>,
}

// =============================================================================
// Finance
// =============================================================================

/// A payment received against a lead/order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Payment {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub lead_id: String,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub order_id: Option<String>,
    #[serde(default, deserialize_with = "de::opt_f64")]
    pub amount: Option<f64>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub currency: Option<String>,
    #[serde(default, deserialize_with = "de::opt_timestamp")]
    pub payment_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub payment_mode: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub payment_reference: Option<String>,
    #[serde(default, deserialize_with = "de::string_list")]
    pub invoice_numbers: Vec<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub notes: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub bulk_upload_id: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub created_by: Option<String>,
    #[serde(default, deserialize_with = "de::opt_timestamp")]
    pub created_date: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub extra: Extra,
}

/// An invoice generated for an order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Invoice {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub invoice_number: String,
    #[serde(default)]
    pub order_id: String,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub lead_id: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub client_name: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub event_name: Option<String>,
    #[serde(default, deserialize_with = "de::opt_f64")]
    pub invoice_total: Option<f64>,
    #[serde(default, deserialize_with = "de::opt_f64")]
    pub service_fee_amount: Option<f64>,
    #[serde(default, deserialize_with = "de::opt_f64")]
    pub gst_amount: Option<f64>,
    #[serde(default, deserialize_with = "de::opt_f64")]
    pub tcs_amount: Option<f64>,
    #[serde(default, deserialize_with = "de::opt_f64")]
    pub final_amount: Option<f64>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub created_by: Option<String>,
    #[serde(default, deserialize_with = "de::opt_timestamp")]
    pub created_date: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub extra: Extra,
}

/// Money owed to the business (receivables) or by it (payables).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerEntry {
    #[serde(default)]
    pub id: String,
    #[serde(default, deserialize_with = "de::opt_f64")]
    pub amount: Option<f64>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub order_id: Option<String>,
    #[serde(default, deserialize_with = "de::opt_timestamp")]
    pub due_date: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub extra: Extra,
}

impl LedgerEntry {
    pub fn amount(&self) -> Money {
        Money::from_rupees(self.amount.unwrap_or(0.0))
    }
}

/// Audit trail entry for a lead.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityLog {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub lead_id: String,
    #[serde(default)]
    pub activity_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub performed_by: Option<String>,
    #[serde(default)]
    pub metadata: Value,
    #[serde(default, deserialize_with = "de::opt_timestamp")]
    pub created_date: Option<DateTime<Utc>>,
}

/// Record of one CSV bulk upload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkUploadLog {
    #[serde(default)]
    pub id: String,
    /// `orders`, `payments` or `allocations`
    #[serde(default)]
    pub upload_type: String,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub uploaded_by: Option<String>,
    #[serde(default)]
    pub total_rows: usize,
    #[serde(default)]
    pub success_rows: usize,
    #[serde(default)]
    pub failed_rows: usize,
    /// `completed`, `partial` or `failed`
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub errors: Vec<Value>,
    #[serde(default, deserialize_with = "de::opt_timestamp")]
    pub created_date: Option<DateTime<Utc>>,
}

impl BulkUploadLog {
    pub fn status_for(success_rows: usize, failed_rows: usize) -> &'static str {
        match (success_rows, failed_rows) {
            (_, 0) => "completed",
            (0, _) => "failed",
            _ => "partial",
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lead_reads_loose_document() {
        let lead: Lead = serde_json::from_value(json!({
            "id": "lead-1",
            "name": "Asha",
            "phone": 9876543210u64,
            "status": "Quote_Requested",
            "temperature": "HOT",
            "business_type": "b2b",
            "potential_value": "1,50,000",
            "date_of_enquiry": "2025-07-21",
            "is_primary_lead": "true",
            "client_events": "IPL Final, Wimbledon",
            "utm_medium": "cpc"
        }))
        .unwrap();

        assert_eq!(lead.phone.as_deref(), Some("9876543210"));
        assert_eq!(lead.status, LeadStatus::QuoteRequested);
        assert_eq!(lead.temperature, Some(Temperature::Hot));
        assert_eq!(lead.business_type(), BusinessType::B2b);
        assert_eq!(lead.potential_value, Some(150_000.0));
        assert!(lead.is_primary_lead);
        assert_eq!(lead.client_events, vec!["IPL Final", "Wimbledon"]);
        assert!(lead.is_pipeline());
        assert!(lead.is_hot_warm());

        // Unknown fields survive a round trip
        let back = serde_json::to_value(&lead).unwrap();
        assert_eq!(back["utm_medium"], "cpc");
    }

    #[test]
    fn test_unknown_values_do_not_fail_the_record() {
        let lead: Lead = serde_json::from_value(json!({
            "status": "archived",
            "temperature": "lukewarm",
            "potential_value": "n/a",
            "created_date": {"_seconds": 1_700_000_000, "_nanoseconds": 0}
        }))
        .unwrap();

        assert_eq!(lead.status, LeadStatus::Unknown);
        assert_eq!(lead.temperature, None);
        assert_eq!(lead.potential_value, None);
        assert_eq!(lead.created_date.map(|d| d.timestamp()), Some(1_700_000_000));
        assert_eq!(lead.business_type(), BusinessType::B2c);
    }

    #[test]
    fn test_quote_stage_without_temperature_is_not_pipeline() {
        let lead = Lead {
            status: LeadStatus::QuoteReceived,
            ..Default::default()
        };
        assert!(!lead.is_pipeline());

        let lead = Lead {
            status: LeadStatus::QuoteReceived,
            temperature: Some(Temperature::Cold),
            ..Default::default()
        };
        assert!(lead.is_pipeline());
        assert!(!lead.is_hot_warm());
    }

    #[test]
    fn test_order_sales_amount() {
        let inr = Order {
            payment_currency: Some("INR".into()),
            total_amount: Some(5000.0),
            exchange_rate: Some(90.0),
            ..Default::default()
        };
        assert_eq!(inr.sales_amount().rupees(), 5000.0);

        let no_rate = Order {
            payment_currency: Some("EUR".into()),
            base_amount: Some(200.0),
            ..Default::default()
        };
        assert_eq!(no_rate.sales_amount().rupees(), 200.0);

        let zero_rate = Order {
            payment_currency: Some("EUR".into()),
            base_amount: Some(200.0),
            exchange_rate: Some(0.0),
            ..Default::default()
        };
        assert_eq!(zero_rate.sales_amount().rupees(), 200.0);
    }

    #[test]
    fn test_allocation_buying_cost() {
        let alloc = Allocation {
            tickets_allocated: 4,
            buying_price: Some(2500.0),
            ..Default::default()
        };
        assert_eq!(alloc.buying_cost().rupees(), 10_000.0);

        let alloc = Allocation {
            tickets_allocated: 4,
            buying_price: Some(2500.0),
            total_buying_price: Some(9000.0),
            ..Default::default()
        };
        assert_eq!(alloc.buying_cost().rupees(), 9000.0);
    }

    #[test]
    fn test_inventory_allocate_and_release() {
        let mut inv = Inventory {
            event_name: "IPL Final".into(),
            available_tickets: 10,
            categories: vec![InventoryCategory {
                name: "Gold".into(),
                section: Some("North".into()),
                available_tickets: 4,
                ..Default::default()
            }],
            ..Default::default()
        };

        let idx = inv.find_category("gold", Some("NORTH"));
        assert_eq!(idx, Some(0));
        assert_eq!(inv.find_category("gold", Some("South")), None);
        assert_eq!(inv.find_category("gold", None), Some(0));

        inv.allocate(idx, 3).unwrap();
        assert_eq!(inv.categories[0].available_tickets, 1);
        assert_eq!(inv.available_tickets, 7);

        let err = inv.allocate(idx, 2).unwrap_err();
        assert!(matches!(err, CoreError::InsufficientInventory { available: 1, .. }));

        inv.release(idx, 3);
        assert_eq!(inv.categories[0].available_tickets, 4);
        assert_eq!(inv.available_tickets, 10);
    }

    #[test]
    fn test_inventory_reads_is_deleted_flag() {
        let inv: Inventory = serde_json::from_value(json!({
            "event_name": "Wimbledon",
            "available_tickets": "12",
            "isDeleted": true
        }))
        .unwrap();
        assert!(inv.is_deleted);
        assert_eq!(inv.available_tickets, 12);
    }

    #[test]
    fn test_journey_progress() {
        let mut journey = Journey {
            milestones: Journey::default_milestones(),
            ..Default::default()
        };
        assert_eq!(journey.progress_percent(), 0);
        journey.milestones[0].status = MilestoneStatus::Completed;
        assert_eq!(journey.progress_percent(), 14);
    }
}
