//! Day-based escalation timeline for open tickets.
//!
//! | days open | stage                           |
//! |-----------|---------------------------------|
//! | >= 5      | Public alert issued             |
//! | 3..5      | Escalated to higher authority   |
//! | 2..3      | Reminder sent                   |
//! | 1..2      | Ticket created                  |
//! | < 1       | (no stage, ticket left alone)   |

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::core::ticket::{TicketId, TicketRegistry};

/// Escalation stages, ordered from earliest to latest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Stage
{
    TicketCreated,
    ReminderSent,
    Escalated,
    PublicAlert,
}

/// Thresholds checked highest first
const TIMELINE: [(i64, Stage); 4] = [
    (5, Stage::PublicAlert),
    (3, Stage::Escalated),
    (2, Stage::ReminderSent),
    (1, Stage::TicketCreated),
];

impl Stage
{
    pub const ALL: [Stage; 4] = [
        Stage::TicketCreated,
        Stage::ReminderSent,
        Stage::Escalated,
        Stage::PublicAlert,
    ];

    pub fn label(self) -> &'static str
    {
        match self
        {
            Stage::TicketCreated => "Ticket created",
            Stage::ReminderSent => "Reminder sent",
            Stage::Escalated => "Escalated to higher authority",
            Stage::PublicAlert => "Public alert issued",
        }
    }

    pub fn from_label(label: &str) -> Option<Stage>
    {
        Self::ALL
            .into_iter()
            .find(|s| s.label() == label)
    }
}

impl fmt::Display for Stage
{
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result
    {
        f.write_str(self.label())
    }
}

/// Stage a ticket should be in after `days_open` whole days
pub fn scheduled_stage(days_open: i64) -> Option<Stage>
{
    TIMELINE
        .iter()
        .find(|(threshold, _)| days_open >= *threshold)
        .map(|&(_, stage)| stage)
}

/// A ticket whose stage changed during a follow-up cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FollowUpUpdate
{
    pub ticket_id: TicketId,
    pub action: String,
}

impl fmt::Display for FollowUpUpdate
{
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result
    {
        write!(f, "{}: {}", self.ticket_id, self.action)
    }
}

/// Move every open ticket to the stage its age calls for.
///
/// Tickets already at their scheduled stage are untouched, so repeating a
/// cycle with the same `now` reports nothing. Updates come back in ticket
/// creation order.
#[instrument(level = "debug", skip(registry))]
pub fn run_follow_up_cycle(
    registry: &mut TicketRegistry,
    now: DateTime<Utc>,
) -> Vec<FollowUpUpdate>
{
    let mut updates = Vec::new();

    for ticket in registry.open_tickets_mut()
    {
        // Whole days, truncated
        let days_open = (now - ticket.created_at).num_days();

        let Some(stage) = scheduled_stage(days_open)
        else
        {
            continue;
        };

        if stage.label() == ticket.last_action
        {
            continue;
        }

        ticket.record_action(now, stage.label());
        debug!(ticket = %ticket.ticket_id, days_open, stage = stage.label(), "escalated");

        updates.push(FollowUpUpdate {
            ticket_id: ticket.ticket_id,
            action: stage
                .label()
                .to_string(),
        });
    }

    updates
}
