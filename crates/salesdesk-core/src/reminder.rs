//! # Reminder Lifecycle
//!
//! ```text
//!            ┌──────────── snooze ────────────┐
//!            ▼                                │
//!   ┌─────────┐  snoozed_until passes  ┌─────┴───┐
//!   │ SNOOZED │ ─────────────────────► │ PENDING │ ──► due_date passes ──► is_overdue
//!   └─────────┘   (is_overdue = true)  └────┬────┘
//!                                           │ complete
//!                                           ▼
//!                                     ┌───────────┐
//!                                     │ COMPLETED │
//!                                     └───────────┘
//! ```
//!
//! Escalation keeps the status and raises the priority to urgent.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::dates::start_of_ist_day;
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::status::{LeadStatus, Priority, ReminderStatus};
use crate::types::{Lead, Reminder};

// =============================================================================
// Auto-generated Reminders
// =============================================================================

/// Follow-up rule for a lead status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderRule {
    pub days: i64,
    pub priority: Priority,
    pub title: &'static str,
}

/// Follow-up rule for leads entering `status`, if one exists.
pub fn rule_for(status: LeadStatus) -> Option<ReminderRule> {
    use LeadStatus::*;
    let (days, priority, title) = match status {
        Unassigned => (0, Priority::High, "Assign this lead"),
        Assigned => (1, Priority::Medium, "Initial contact required"),
        Contacted => (2, Priority::Medium, "Follow up on initial contact"),
        Attempt1 => (1, Priority::Medium, "Second contact attempt"),
        Attempt2 => (1, Priority::High, "Third contact attempt"),
        Attempt3 => (2, Priority::High, "Final contact attempt"),
        Qualified => (3, Priority::Medium, "Nurture qualified lead"),
        Hot => (1, Priority::Urgent, "Priority follow-up - Hot lead"),
        Warm => (2, Priority::High, "Follow up warm lead"),
        Cold => (7, Priority::Low, "Check in with cold lead"),
        QuoteRequested => (1, Priority::Urgent, "Provide quote"),
        _ => return None,
    };
    Some(ReminderRule {
        days,
        priority,
        title,
    })
}

/// Builds an auto-generated reminder for `lead` using its status rule.
pub fn auto_reminder(
    lead: &Lead,
    assignee: &str,
    created_by: &str,
    now: DateTime<Utc>,
) -> Option<Reminder> {
    let rule = rule_for(lead.status)?;
    Some(build(lead, assignee, created_by, rule, now))
}

/// Reminder created when a lead is assigned. Uses the lead's status rule,
/// falling back to the "assigned" rule.
pub fn follow_up_for_assignment(
    lead: &Lead,
    assignee: &str,
    assigned_by: &str,
    now: DateTime<Utc>,
) -> Reminder {
    let rule = rule_for(lead.status)
        .filter(|r| r.days > 0)
        .or_else(|| rule_for(LeadStatus::Assigned))
        .unwrap_or(ReminderRule {
            days: 1,
            priority: Priority::Medium,
            title: "Initial contact required",
        });
    build(lead, assignee, assigned_by, rule, now)
}

fn build(
    lead: &Lead,
    assignee: &str,
    created_by: &str,
    rule: ReminderRule,
    now: DateTime<Utc>,
) -> Reminder {
    let lead_name = lead.name.clone().unwrap_or_else(|| "lead".to_string());
    Reminder {
        lead_id: lead.id.clone(),
        lead_name: lead.name.clone(),
        assigned_to: Some(assignee.to_string()),
        reminder_type: "follow_up".to_string(),
        title: format!("{} - {}", rule.title, lead_name),
        description: Some(format!(
            "Auto-generated for status {}",
            lead.status.as_str()
        )),
        due_date: Some(now + Duration::days(rule.days)),
        status: ReminderStatus::Pending,
        priority: rule.priority,
        auto_generated: true,
        created_by: Some(created_by.to_string()),
        created_date: Some(now),
        updated_date: Some(now),
        ..Default::default()
    }
}

// =============================================================================
// Transitions
// =============================================================================

pub fn complete(
    reminder: &mut Reminder,
    completed_by: &str,
    notes: Option<String>,
    now: DateTime<Utc>,
) -> CoreResult<()> {
    if reminder.status == ReminderStatus::Completed {
        return Err(CoreError::InvalidState {
            entity: "reminder".into(),
            id: reminder.id.clone(),
            status: reminder.status.to_string(),
        });
    }
    reminder.status = ReminderStatus::Completed;
    reminder.completed_date = Some(now);
    reminder.completed_by = Some(completed_by.to_string());
    reminder.completion_notes = notes;
    reminder.is_overdue = false;
    reminder.updated_date = Some(now);
    Ok(())
}

/// Snoozes until a future time and resets the overdue flag.
pub fn snooze(reminder: &mut Reminder, until: DateTime<Utc>, now: DateTime<Utc>) -> CoreResult<()> {
    if until <= now {
        return Err(ValidationError::InvalidFormat {
            field: "snooze_until".into(),
            reason: "must be a future date".into(),
        }
        .into());
    }
    if reminder.status == ReminderStatus::Completed {
        return Err(CoreError::InvalidState {
            entity: "reminder".into(),
            id: reminder.id.clone(),
            status: reminder.status.to_string(),
        });
    }
    reminder.status = ReminderStatus::Snoozed;
    reminder.snoozed_until = Some(until);
    reminder.snooze_count += 1;
    reminder.is_overdue = false;
    reminder.updated_date = Some(now);
    Ok(())
}

pub fn escalate(reminder: &mut Reminder, escalate_to: &str, reason: &str, now: DateTime<Utc>) {
    reminder.escalated = true;
    reminder.escalated_to = Some(escalate_to.to_string());
    reminder.escalated_date = Some(now);
    reminder.priority = Priority::Urgent;
    reminder.description = Some(if reason.trim().is_empty() {
        "Escalated reminder".to_string()
    } else {
        format!("{}\n\n(Original reminder escalated)", reason.trim())
    });
    reminder.updated_date = Some(now);
}

/// Flags pending reminders past their due date and wakes snoozed reminders
/// past their snooze time. Returns `true` when the reminder changed.
pub fn refresh_overdue(reminder: &mut Reminder, now: DateTime<Utc>) -> bool {
    let check = match reminder.status {
        ReminderStatus::Pending => reminder.due_date,
        ReminderStatus::Snoozed => reminder.snoozed_until,
        _ => return false,
    };
    match check {
        Some(at) if at < now => {
            if reminder.is_overdue && reminder.status == ReminderStatus::Pending {
                return false;
            }
            reminder.is_overdue = true;
            reminder.status = ReminderStatus::Pending;
            reminder.updated_date = Some(now);
            true
        }
        _ => false,
    }
}

// =============================================================================
// Summary
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReminderStats {
    pub total: usize,
    pub pending: usize,
    pub completed: usize,
    pub snoozed: usize,
    pub overdue: usize,
    pub due_today: usize,
    pub by_priority: BTreeMap<String, usize>,
    pub by_type: BTreeMap<String, usize>,
}

pub fn summarize(reminders: &[Reminder], now: DateTime<Utc>) -> ReminderStats {
    let today = start_of_ist_day(&now);
    let tomorrow = today + Duration::days(1);
    let mut stats = ReminderStats {
        total: reminders.len(),
        ..Default::default()
    };
    for priority in [Priority::Urgent, Priority::High, Priority::Medium, Priority::Low] {
        stats.by_priority.insert(priority.to_string(), 0);
    }

    for r in reminders {
        match r.status {
            ReminderStatus::Pending => stats.pending += 1,
            ReminderStatus::Completed => stats.completed += 1,
            ReminderStatus::Snoozed => stats.snoozed += 1,
            _ => {}
        }
        if r.status != ReminderStatus::Pending {
            continue;
        }
        if let Some(due) = r.due_date {
            if due < now {
                stats.overdue += 1;
            }
            if due >= today && due < tomorrow {
                stats.due_today += 1;
            }
        }
        *stats.by_priority.entry(r.priority.to_string()).or_default() += 1;
        *stats.by_type.entry(r.reminder_type.clone()).or_default() += 1;
    }
    stats
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 21, 6, 0, 0).unwrap()
    }

    fn lead(status: LeadStatus) -> Lead {
        Lead {
            id: "lead-1".into(),
            name: Some("Asha".into()),
            status,
            ..Default::default()
        }
    }

    #[test]
    fn test_assignment_reminder_uses_status_rule() {
        let r = follow_up_for_assignment(&lead(LeadStatus::Hot), "s@x.com", "admin@x.com", now());
        assert_eq!(r.priority, Priority::Urgent);
        assert_eq!(r.due_date, Some(now() + Duration::days(1)));
        assert_eq!(r.assigned_to.as_deref(), Some("s@x.com"));
        assert!(r.auto_generated);

        // Unassigned has a same-day rule; assignment falls back to the assigned rule
        let r = follow_up_for_assignment(&lead(LeadStatus::Unassigned), "s@x.com", "a", now());
        assert_eq!(r.priority, Priority::Medium);
        assert!(r.title.starts_with("Initial contact required"));

        let r = follow_up_for_assignment(&lead(LeadStatus::Junk), "s@x.com", "a", now());
        assert_eq!(r.due_date, Some(now() + Duration::days(1)));
    }

    #[test]
    fn test_snooze_requires_future_time() {
        let mut r = Reminder::default();
        assert!(snooze(&mut r, now() - Duration::hours(1), now()).is_err());

        r.is_overdue = true;
        snooze(&mut r, now() + Duration::hours(2), now()).unwrap();
        assert_eq!(r.status, ReminderStatus::Snoozed);
        assert_eq!(r.snooze_count, 1);
        assert!(!r.is_overdue);
    }

    #[test]
    fn test_snoozed_reminder_wakes_up_overdue() {
        let mut r = Reminder::default();
        snooze(&mut r, now() + Duration::hours(1), now()).unwrap();
        assert!(!refresh_overdue(&mut r, now()));
        assert!(refresh_overdue(&mut r, now() + Duration::hours(2)));
        assert_eq!(r.status, ReminderStatus::Pending);
        assert!(r.is_overdue);
        // Already flagged
        assert!(!refresh_overdue(&mut r, now() + Duration::hours(3)));
    }

    #[test]
    fn test_escalate_sets_urgent() {
        let mut r = Reminder::default();
        escalate(&mut r, "head@x.com", "Client waiting", now());
        assert_eq!(r.priority, Priority::Urgent);
        assert!(r.escalated);
        assert_eq!(
            r.description.as_deref(),
            Some("Client waiting\n\n(Original reminder escalated)")
        );

        escalate(&mut r, "head@x.com", "  ", now());
        assert_eq!(r.description.as_deref(), Some("Escalated reminder"));
    }

    #[test]
    fn test_complete_twice_fails() {
        let mut r = Reminder::default();
        complete(&mut r, "s@x.com", None, now()).unwrap();
        assert!(complete(&mut r, "s@x.com", None, now()).is_err());
    }

    #[test]
    fn test_summary_counts_pending_only_for_due_buckets() {
        let pending_overdue = Reminder {
            due_date: Some(now() - Duration::hours(1)),
            priority: Priority::High,
            ..Default::default()
        };
        let pending_later_today = Reminder {
            due_date: Some(now() + Duration::hours(2)),
            ..Default::default()
        };
        let completed = Reminder {
            status: ReminderStatus::Completed,
            due_date: Some(now() - Duration::hours(1)),
            ..Default::default()
        };

        let stats = summarize(&[pending_overdue, pending_later_today, completed], now());
        assert_eq!(stats.total, 3);
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.overdue, 1);
        assert_eq!(stats.due_today, 2);
        assert_eq!(stats.by_priority["high"], 1);
        assert_eq!(stats.by_priority["urgent"], 0);
    }
}
