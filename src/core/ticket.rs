//! Ticket records and the registry that keeps one open ticket per
//! (ward, issue) key.

use std::{collections::HashMap, fmt, str::FromStr, sync::Arc};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::{
    escalation::Stage,
    ledger::{Complaint, ComplaintLedger, IssueKey},
};

/// Prefix of every ticket id (`TKT-0001`)
pub const TICKET_PREFIX: &str = "TKT-";

/// Action logged when a ticket is closed administratively
pub const RESOLVED_ACTION: &str = "Resolved";

/// Sequential ticket id, rendered as `TKT-` plus a 4-digit counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct TicketId(u32);

impl TicketId
{
    pub fn new(seq: u32) -> Self
    {
        Self(seq)
    }
}

impl fmt::Display for TicketId
{
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result
    {
        write!(f, "{TICKET_PREFIX}{:04}", self.0)
    }
}

impl FromStr for TicketId
{
    type Err = TicketError;

    /// Accepts `TKT-0001` in any letter case
    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        let invalid = || TicketError::InvalidId(s.to_string());

        let digits = s
            .get(..TICKET_PREFIX.len())
            .filter(|p| p.eq_ignore_ascii_case(TICKET_PREFIX))
            .map(|_| &s[TICKET_PREFIX.len()..])
            .ok_or_else(invalid)?;

        if digits.len() < 4
            || !digits
                .bytes()
                .all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }

        digits
            .parse::<u32>()
            .map(TicketId)
            .map_err(|_| invalid())
    }
}

impl From<TicketId> for String
{
    fn from(id: TicketId) -> Self
    {
        id.to_string()
    }
}

impl TryFrom<String> for TicketId
{
    type Error = TicketError;

    fn try_from(value: String) -> Result<Self, Self::Error>
    {
        value.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TicketError
{
    #[error("invalid ticket id: {0}")]
    InvalidId(String),
    #[error("ticket {0} not found")]
    NotFound(TicketId),
    #[error("ticket {0} is already resolved")]
    AlreadyResolved(TicketId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus
{
    Open,
    Resolved,
}

impl fmt::Display for TicketStatus
{
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result
    {
        f.write_str(match self
        {
            TicketStatus::Open => "open",
            TicketStatus::Resolved => "resolved",
        })
    }
}

/// One timestamped entry of a ticket's action log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionEntry
{
    pub at: DateTime<Utc>,
    pub action: String,
}

/// Tracked unit of work for one (ward, issue) key
#[derive(Debug, Clone)]
pub struct Ticket
{
    pub ticket_id: TicketId,
    pub ward: String,
    pub issue_type: String,
    pub complaints: Vec<Arc<Complaint>>,
    pub created_at: DateTime<Utc>,
    pub status: TicketStatus,
    pub last_action: String,
    pub action_log: Vec<ActionEntry>,
}

impl Ticket
{
    fn open(
        ticket_id: TicketId,
        key: &IssueKey,
        complaints: Vec<Arc<Complaint>>,
        created_at: DateTime<Utc>,
    ) -> Self
    {
        let initial = Stage::TicketCreated.label();

        Self {
            ticket_id,
            ward: key
                .ward
                .clone(),
            issue_type: key
                .issue_type
                .clone(),
            complaints,
            created_at,
            status: TicketStatus::Open,
            last_action: initial.to_string(),
            action_log: vec![ActionEntry {
                at: created_at,
                action: initial.to_string(),
            }],
        }
    }

    pub fn key(&self) -> IssueKey
    {
        IssueKey::new(&self.ward, &self.issue_type)
    }

    pub fn is_open(&self) -> bool
    {
        self.status == TicketStatus::Open
    }

    /// Set the current action and append it to the log
    pub(crate) fn record_action(
        &mut self,
        at: DateTime<Utc>,
        action: &str,
    )
    {
        self.last_action = action.to_string();
        self.action_log
            .push(ActionEntry {
                at,
                action: action.to_string(),
            });
    }

    pub fn summary(&self) -> TicketSummary
    {
        TicketSummary {
            ticket_id: self.ticket_id,
            ward: self
                .ward
                .clone(),
            issue_type: self
                .issue_type
                .clone(),
            status: self.status,
            last_action: self
                .last_action
                .clone(),
            complaints: self
                .complaints
                .len(),
            created_at: self.created_at,
        }
    }
}

/// Flat, serialisable view of a ticket for listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TicketSummary
{
    pub ticket_id: TicketId,
    pub ward: String,
    pub issue_type: String,
    pub status: TicketStatus,
    pub last_action: String,
    pub complaints: usize,
    pub created_at: DateTime<Utc>,
}

/// All tickets in creation order, plus a direct index from key to the
/// open ticket for that key.
#[derive(Debug)]
pub struct TicketRegistry
{
    tickets: IndexMap<TicketId, Ticket>,
    open_by_key: HashMap<IssueKey, TicketId>,
    next_seq: u32,
}

impl Default for TicketRegistry
{
    fn default() -> Self
    {
        Self {
            tickets: IndexMap::new(),
            open_by_key: HashMap::new(),
            next_seq: 1,
        }
    }
}

impl TicketRegistry
{
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Return the open ticket for `key`, creating one if none exists.
    ///
    /// An existing ticket receives the latest ledger complaint for the key.
    /// A new ticket is seeded with every complaint the ledger holds for it.
    pub fn ensure_ticket(
        &mut self,
        key: &IssueKey,
        ledger: &ComplaintLedger,
        now: DateTime<Utc>,
    ) -> TicketId
    {
        let open = self
            .open_by_key
            .get(key)
            .copied();
        if let Some(ticket) = open.and_then(|id| {
            self.tickets
                .get_mut(&id)
        })
        {
            if let Some(latest) = ledger.latest(key)
            {
                ticket
                    .complaints
                    .push(Arc::clone(latest));
            }
            debug!(ticket = %ticket.ticket_id, %key, complaints = ticket.complaints.len(), "attached to open ticket");
            return ticket.ticket_id;
        }

        let id = TicketId::new(self.next_seq);
        self.next_seq += 1;

        let ticket = Ticket::open(
            id,
            key,
            ledger
                .complaints(key)
                .to_vec(),
            now,
        );
        self.tickets
            .insert(id, ticket);
        self.open_by_key
            .insert(key.clone(), id);

        info!(ticket = %id, %key, "opened ticket");
        id
    }

    pub fn lookup(
        &self,
        id: TicketId,
    ) -> Option<&Ticket>
    {
        self.tickets
            .get(&id)
    }

    /// Open ticket currently tracking `key`
    pub fn open_ticket_for(
        &self,
        key: &IssueKey,
    ) -> Option<&Ticket>
    {
        self.open_by_key
            .get(key)
            .and_then(|id| {
                self.tickets
                    .get(id)
            })
    }

    /// Close a ticket administratively. The key is released so the next
    /// complaint for it opens a fresh ticket.
    pub fn resolve(
        &mut self,
        id: TicketId,
        now: DateTime<Utc>,
    ) -> Result<&Ticket, TicketError>
    {
        let ticket = self
            .tickets
            .get_mut(&id)
            .ok_or(TicketError::NotFound(id))?;

        if !ticket.is_open()
        {
            return Err(TicketError::AlreadyResolved(id));
        }

        ticket.status = TicketStatus::Resolved;
        ticket.record_action(now, RESOLVED_ACTION);
        self.open_by_key
            .remove(&ticket.key());

        info!(ticket = %id, "resolved ticket");
        Ok(ticket)
    }

    /// All tickets, creation order
    pub fn iter(&self) -> impl Iterator<Item = &Ticket>
    {
        self.tickets
            .values()
    }

    /// Open tickets, creation order
    pub fn open_tickets(&self) -> impl Iterator<Item = &Ticket>
    {
        self.iter()
            .filter(|t| t.is_open())
    }

    pub(crate) fn open_tickets_mut(&mut self) -> impl Iterator<Item = &mut Ticket>
    {
        self.tickets
            .values_mut()
            .filter(|t| t.is_open())
    }

    pub fn len(&self) -> usize
    {
        self.tickets
            .len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.tickets
            .is_empty()
    }
}

#[cfg(test)]
mod tests
{
    use chrono::TimeZone;

    use super::*;

    fn t0() -> DateTime<Utc>
    {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0)
            .unwrap()
    }

    fn file(
        ledger: &mut ComplaintLedger,
        registry: &mut TicketRegistry,
        ward: &str,
        issue: &str,
    ) -> TicketId
    {
        let c = Arc::new(Complaint::new("u", ward, issue, "text", t0()));
        let key = c.key();
        ledger.record(c);
        registry.ensure_ticket(&key, ledger, t0())
    }

    #[test]
    fn id_format_and_parse()
    {
        assert_eq!(TicketId::new(1).to_string(), "TKT-0001");
        assert_eq!(TicketId::new(12345).to_string(), "TKT-12345");
        assert_eq!("tkt-0042".parse::<TicketId>(), Ok(TicketId::new(42)));
        assert!("TKT-42".parse::<TicketId>().is_err());
        assert!("ABC-0042".parse::<TicketId>().is_err());
        assert!("TKT-00x2".parse::<TicketId>().is_err());
        assert!("T".parse::<TicketId>().is_err());
    }

    #[test]
    fn one_open_ticket_per_key()
    {
        let mut ledger = ComplaintLedger::new();
        let mut registry = TicketRegistry::new();

        let a = file(&mut ledger, &mut registry, "12", "Water");
        let b = file(&mut ledger, &mut registry, "12", "Water");
        let c = file(&mut ledger, &mut registry, "12", "Garbage");

        assert_eq!(a, b);
        assert_eq!(a.to_string(), "TKT-0001");
        assert_eq!(c.to_string(), "TKT-0002");
        assert_eq!(registry.len(), 2);

        let ticket = registry
            .lookup(a)
            .unwrap();
        assert_eq!(
            ticket
                .complaints
                .len(),
            2
        );
        assert_eq!(ledger.count(&IssueKey::new("12", "Water")), 2);
    }

    #[test]
    fn new_ticket_is_seeded_from_ledger()
    {
        let mut ledger = ComplaintLedger::new();
        let mut registry = TicketRegistry::new();
        let key = IssueKey::new("7", "Road");

        for _ in 0..3
        {
            ledger.record(Arc::new(Complaint::new("u", "7", "Road", "pothole", t0())));
        }
        let id = registry.ensure_ticket(&key, &ledger, t0());
        let ticket = registry
            .lookup(id)
            .unwrap();

        assert_eq!(
            ticket
                .complaints
                .len(),
            3
        );
        assert_eq!(ticket.status, TicketStatus::Open);
        assert_eq!(ticket.last_action, "Ticket created");
        assert_eq!(
            ticket.action_log,
            vec![ActionEntry {
                at: t0(),
                action: "Ticket created".into()
            }]
        );
    }

    #[test]
    fn resolve_releases_key()
    {
        let mut ledger = ComplaintLedger::new();
        let mut registry = TicketRegistry::new();

        let first = file(&mut ledger, &mut registry, "12", "Water");
        let resolved = registry
            .resolve(first, t0())
            .unwrap();
        assert_eq!(resolved.status, TicketStatus::Resolved);
        assert_eq!(resolved.last_action, RESOLVED_ACTION);

        assert_eq!(
            registry
                .resolve(first, t0())
                .unwrap_err(),
            TicketError::AlreadyResolved(first)
        );
        assert_eq!(
            registry
                .resolve(TicketId::new(99), t0())
                .unwrap_err(),
            TicketError::NotFound(TicketId::new(99))
        );

        let second = file(&mut ledger, &mut registry, "12", "Water");
        assert_eq!(second.to_string(), "TKT-0002");
        assert_eq!(
            registry
                .open_tickets()
                .count(),
            1
        );

        // The new ticket is seeded with the whole bucket, history included
        assert_eq!(
            registry
                .open_ticket_for(&IssueKey::new("12", "Water"))
                .unwrap()
                .complaints
                .len(),
            2
        );
    }
}
