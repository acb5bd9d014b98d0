//! Single-query dispatch: status lookups, complaint registration and the
//! generic fallback, plus the threshold-gated alert texts.
//!
//! # Dispatch order
//!
//! 1. Query mentions `status` and `tkt-` → ticket status (or "not found")
//! 2. Query contains a complaint keyword → register, reply with ticket,
//!    severity, alerts and similar posts
//! 3. Otherwise → related discussions if any, else a prompt for details

use std::sync::{Arc, LazyLock};

use aho_corasick::{AhoCorasick, AhoCorasickBuilder};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::core::{
    analytics::Analytics,
    corpus::{CorpusIndex, RelatedPost},
    escalation::{FollowUpUpdate, run_follow_up_cycle},
    ledger::{Complaint, ComplaintLedger, IssueKey},
    severity::SeverityEstimator,
    ticket::{Ticket, TicketError, TicketId, TicketRegistry, TicketSummary},
};

/// Ticket id inside a status query, any letter case
static TICKET_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)tkt-\d{4}").expect("ticket id regex is valid"));

pub const NOT_FOUND_REPLY: &str = "I could not find that ticket ID.";

pub const PROMPT_REPLY: &str =
    "Please share issue details (what happened + area/ward) and I will create a civic ticket.";

pub const SUGGESTION_HEADER: &str =
    "I did not detect a complaint, but here are related civic discussions:";

pub const DEFAULT_COMPLAINT_KEYWORDS: &[&str] =
    &["complaint", "issue", "problem", "report", "water", "garbage", "road"];

/// Tunables for the composer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotOptions
{
    /// Ledger count at which the predictive alert switches to its warning form
    pub predictive_threshold: usize,
    /// Ledger count at which complaints are reported as auto-escalated
    pub escalation_threshold: usize,
    pub complaint_keywords: Vec<String>,
    pub related_limit: usize,
    pub display_chars: usize,
}

impl Default for BotOptions
{
    fn default() -> Self
    {
        Self {
            predictive_threshold: 5,
            escalation_threshold: 10,
            complaint_keywords: DEFAULT_COMPLAINT_KEYWORDS
                .iter()
                .map(|k| k.to_string())
                .collect(),
            related_limit: 2,
            display_chars: 120,
        }
    }
}

/// Outcome of registering one complaint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Registration
{
    pub ticket: TicketId,
    pub topic: String,
    pub topic_confidence: f64,
    pub severity: f64,
    pub predictive_alert: String,
    pub community_alert: String,
    pub related_context: Vec<RelatedPost>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyKind
{
    Status,
    TicketNotFound,
    Complaint,
    Suggestion,
    Prompt,
}

/// Structured reply to one query; `text` is what a chat user sees
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply
{
    pub kind: ReplyKind,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket: Option<TicketSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration: Option<Registration>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub related: Vec<RelatedPost>,
}

impl Reply
{
    fn plain(
        kind: ReplyKind,
        text: impl Into<String>,
    ) -> Self
    {
        Self {
            kind,
            text: text.into(),
            ticket: None,
            registration: None,
            related: Vec::new(),
        }
    }
}

/// Owns the index, the ledger and the ticket registry for one process.
/// Constructed once at startup and passed by reference.
#[derive(Debug)]
pub struct CivicBot
{
    index: CorpusIndex,
    severity: SeverityEstimator,
    options: BotOptions,
    keywords: AhoCorasick,
    ledger: ComplaintLedger,
    registry: TicketRegistry,
}

impl CivicBot
{
    pub fn new(
        index: CorpusIndex,
        severity: SeverityEstimator,
        options: BotOptions,
    ) -> Result<Self>
    {
        let keywords = AhoCorasickBuilder::new()
            .ascii_case_insensitive(true)
            .build(
                options
                    .complaint_keywords
                    .iter()
                    .filter(|k| {
                        !k.trim()
                            .is_empty()
                    }),
            )
            .context("Failed to build complaint keyword matcher")?;

        Ok(Self {
            index,
            severity,
            options,
            keywords,
            ledger: ComplaintLedger::new(),
            registry: TicketRegistry::new(),
        })
    }

    /// Answer one query as plain text
    pub fn respond(
        &mut self,
        user_id: &str,
        ward: &str,
        query: &str,
        now: DateTime<Utc>,
    ) -> String
    {
        self.handle(user_id, ward, query, now)
            .text
    }

    /// Answer one query with the structured record behind the text
    #[instrument(level = "debug", skip(self))]
    pub fn handle(
        &mut self,
        user_id: &str,
        ward: &str,
        query: &str,
        now: DateTime<Utc>,
    ) -> Reply
    {
        let lower = query.to_lowercase();

        if lower.contains("status") && lower.contains("tkt-")
        {
            return self.status_reply(query);
        }

        if self
            .keywords
            .is_match(&lower)
        {
            let registration = self.register_query(user_id, ward, query, now);
            let text = self.render_registration(&registration);
            let summary = self
                .registry
                .lookup(registration.ticket)
                .map(Ticket::summary);

            return Reply {
                kind: ReplyKind::Complaint,
                text,
                ticket: summary,
                related: registration
                    .related_context
                    .clone(),
                registration: Some(registration),
            };
        }

        let suggestions = self
            .index
            .find_related_posts(query, self.options.related_limit);
        if suggestions.is_empty()
        {
            debug!("no complaint and no related posts");
            return Reply::plain(ReplyKind::Prompt, PROMPT_REPLY);
        }

        let mut lines = vec![SUGGESTION_HEADER.to_string()];
        lines.extend(
            suggestions
                .iter()
                .map(|p| self.bullet(p)),
        );

        Reply {
            kind: ReplyKind::Suggestion,
            text: lines.join("\n"),
            ticket: None,
            registration: None,
            related: suggestions,
        }
    }

    /// Infer the topic of `query` and register it as a complaint
    pub fn register_query(
        &mut self,
        user_id: &str,
        ward: &str,
        query: &str,
        now: DateTime<Utc>,
    ) -> Registration
    {
        let inferred = self
            .index
            .infer_topic(query);
        let complaint = Complaint::new(user_id, ward, inferred.topic, query, now);
        self.register_complaint(complaint, inferred.confidence, now)
    }

    /// Record a complaint, attach it to the open ticket for its key (or
    /// open one) and compute the alerts for the key's new count.
    pub fn register_complaint(
        &mut self,
        complaint: Complaint,
        confidence: f64,
        now: DateTime<Utc>,
    ) -> Registration
    {
        let complaint = Arc::new(complaint);
        let key = complaint.key();

        let count = self
            .ledger
            .record(Arc::clone(&complaint));
        let ticket = self
            .registry
            .ensure_ticket(&key, &self.ledger, now);

        debug!(%ticket, %key, count, "registered complaint");

        Registration {
            ticket,
            topic: key
                .issue_type
                .clone(),
            topic_confidence: confidence,
            severity: self
                .severity
                .estimate(&complaint.description),
            predictive_alert: self.predictive_alert(&key),
            community_alert: self.community_alert(&key),
            related_context: self
                .index
                .find_related_posts(&complaint.description, self.options.related_limit),
        }
    }

    /// Early-warning text; switches form once the key reaches the
    /// predictive threshold.
    pub fn predictive_alert(
        &self,
        key: &IssueKey,
    ) -> String
    {
        let count = self
            .ledger
            .count(key);
        let IssueKey { ward, issue_type } = key;

        if count >= self.options.predictive_threshold
        {
            format!(
                "Predictive Alert: {count} users in ward {ward} reported {issue_type}. \
                 Please take preventive action now."
            )
        }
        else
        {
            format!(
                "Predictive Alert: {count}/{} complaints for {issue_type} in ward {ward}.",
                self.options
                    .predictive_threshold
            )
        }
    }

    /// Community text; reports automatic escalation once the key reaches
    /// the escalation threshold.
    pub fn community_alert(
        &self,
        key: &IssueKey,
    ) -> String
    {
        let count = self
            .ledger
            .count(key);
        let IssueKey { ward, issue_type } = key;

        if count >= self.options.escalation_threshold
        {
            format!(
                "Community Power: {count} users in ward {ward} reported {issue_type}. \
                 Escalated automatically to officials."
            )
        }
        else
        {
            format!(
                "Community Power: {count} users in ward {ward} reported {issue_type}. \
                 Collecting more voices before auto-escalation."
            )
        }
    }

    /// Advance open tickets to the stage their age calls for
    pub fn run_follow_up_cycle(
        &mut self,
        now: DateTime<Utc>,
    ) -> Vec<FollowUpUpdate>
    {
        run_follow_up_cycle(&mut self.registry, now)
    }

    /// Administrative closure of a ticket
    pub fn resolve_ticket(
        &mut self,
        id: TicketId,
        now: DateTime<Utc>,
    ) -> Result<TicketSummary, TicketError>
    {
        self.registry
            .resolve(id, now)
            .map(Ticket::summary)
    }

    pub fn lookup(
        &self,
        id: TicketId,
    ) -> Option<&Ticket>
    {
        self.registry
            .lookup(id)
    }

    pub fn tickets(&self) -> &TicketRegistry
    {
        &self.registry
    }

    pub fn ledger(&self) -> &ComplaintLedger
    {
        &self.ledger
    }

    pub fn index(&self) -> &CorpusIndex
    {
        &self.index
    }

    pub fn options(&self) -> &BotOptions
    {
        &self.options
    }

    /// Complaint and ticket totals for everything handled so far
    pub fn analytics(&self) -> Analytics
    {
        Analytics::collect(&self.index, &self.ledger, &self.registry)
    }

    fn status_reply(
        &self,
        query: &str,
    ) -> Reply
    {
        let ticket = TICKET_ID_RE
            .find(query)
            .and_then(|m| {
                m.as_str()
                    .parse::<TicketId>()
                    .ok()
            })
            .and_then(|id| {
                self.registry
                    .lookup(id)
            });

        match ticket
        {
            Some(t) => Reply {
                kind: ReplyKind::Status,
                text: format!("{} is {}. Last action: {}.", t.ticket_id, t.status, t.last_action),
                ticket: Some(t.summary()),
                registration: None,
                related: Vec::new(),
            },
            None => Reply::plain(ReplyKind::TicketNotFound, NOT_FOUND_REPLY),
        }
    }

    fn render_registration(
        &self,
        reg: &Registration,
    ) -> String
    {
        // `{:?}` keeps a trailing `.0` on whole numbers (1.0, 0.0)
        let mut lines = vec![
            format!(
                "Ticket {} created for topic: {} (confidence={:?}).",
                reg.ticket, reg.topic, reg.topic_confidence
            ),
            format!("Severity: {:?}", reg.severity),
            reg.predictive_alert
                .clone(),
            reg.community_alert
                .clone(),
        ];

        if !reg
            .related_context
            .is_empty()
        {
            lines.push("Similar community posts:".to_string());
            lines.extend(
                reg.related_context
                    .iter()
                    .map(|p| self.bullet(p)),
            );
        }

        lines.join("\n")
    }

    fn bullet(
        &self,
        post: &RelatedPost,
    ) -> String
    {
        format!(
            "- [{}] {}",
            post.source,
            truncate_chars(&post.text, self.options.display_chars)
        )
    }
}

/// First `max` characters of `text`, never splitting a character
pub fn truncate_chars(
    text: &str,
    max: usize,
) -> &str
{
    match text
        .char_indices()
        .nth(max)
    {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests
{
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::core::corpus::{PostRow, TopicRow};

    fn t0() -> DateTime<Utc>
    {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0)
            .unwrap()
    }

    fn bot(
        predictive: usize,
        escalation: usize,
    ) -> CivicBot
    {
        let index = CorpusIndex::from_records(
            vec![
                TopicRow::new("no water supply since morning", "Water"),
                TopicRow::new("garbage not cleared bad smell", "Garbage"),
                TopicRow::new("pothole on the road near school", "Road"),
            ],
            vec![
                PostRow::new("reddit", "Water supply cut in ward 12 again"),
                PostRow::new("bbmp", "Garbage truck skipped our street"),
                PostRow::new("reddit", "Metro construction noise at night"),
            ],
        );

        CivicBot::new(
            index,
            SeverityEstimator::default(),
            BotOptions {
                predictive_threshold: predictive,
                escalation_threshold: escalation,
                ..BotOptions::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn status_for_unknown_ticket()
    {
        let mut bot = bot(3, 5);
        assert_eq!(bot.respond("u", "12", "status of TKT-0001", t0()), NOT_FOUND_REPLY);
        // Malformed id is treated the same way
        assert_eq!(bot.respond("u", "12", "status of tkt-12", t0()), NOT_FOUND_REPLY);
    }

    #[test]
    fn status_for_known_ticket()
    {
        let mut bot = bot(3, 5);
        bot.respond("u", "12", "Water not coming", t0());

        let reply = bot.handle("u", "12", "What is the STATUS of tkt-0001?", t0());
        assert_eq!(reply.kind, ReplyKind::Status);
        assert_eq!(reply.text, "TKT-0001 is open. Last action: Ticket created.");
    }

    #[test]
    fn predictive_alert_switches_at_threshold()
    {
        let mut bot = bot(3, 5);

        let first = bot.register_query("u1", "12", "no water", t0());
        assert_eq!(first.topic, "Water");
        assert_eq!(
            first.predictive_alert,
            "Predictive Alert: 1/3 complaints for Water in ward 12."
        );

        bot.register_query("u2", "12", "no water", t0());
        let third = bot.register_query("u3", "12", "no water", t0());
        assert_eq!(
            third.predictive_alert,
            "Predictive Alert: 3 users in ward 12 reported Water. Please take preventive action now."
        );
        assert!(
            third
                .community_alert
                .ends_with("Collecting more voices before auto-escalation.")
        );
        assert_eq!(first.ticket, third.ticket);
    }

    #[test]
    fn community_alert_escalates_at_threshold()
    {
        let mut bot = bot(1, 2);
        bot.register_query("u1", "9", "pothole on road", t0());
        let second = bot.register_query("u2", "9", "pothole on road", t0());

        assert_eq!(
            second.community_alert,
            "Community Power: 2 users in ward 9 reported Road. Escalated automatically to officials."
        );
    }

    #[test]
    fn ledger_counts_once_per_registration()
    {
        let mut bot = bot(3, 5);
        for _ in 0..4
        {
            bot.register_query("u", "12", "garbage smell", t0());
        }

        let key = IssueKey::new("12", "Garbage");
        assert_eq!(
            bot.ledger()
                .count(&key),
            4
        );
        let ticket = bot
            .tickets()
            .open_ticket_for(&key)
            .unwrap();
        assert_eq!(
            ticket
                .complaints
                .len(),
            4
        );
    }

    #[test]
    fn complaint_reply_layout()
    {
        let mut bot = bot(3, 5);
        let text = bot.respond("u", "12", "Water not coming in my area since morning", t0());

        assert_eq!(
            text,
            "Ticket TKT-0001 created for topic: Water (confidence=0.375).\n\
             Severity: 0.2\n\
             Predictive Alert: 1/3 complaints for Water in ward 12.\n\
             Community Power: 1 users in ward 12 reported Water. Collecting more voices before auto-escalation.\n\
             Similar community posts:\n\
             - [reddit] Water supply cut in ward 12 again"
        );
    }

    #[test]
    fn suggestion_and_prompt_fallbacks()
    {
        let mut bot = bot(3, 5);

        let reply = bot.handle("u", "12", "metro noise", t0());
        assert_eq!(reply.kind, ReplyKind::Suggestion);
        assert_eq!(
            reply.text,
            format!("{SUGGESTION_HEADER}\n- [reddit] Metro construction noise at night")
        );

        assert_eq!(bot.respond("u", "12", "hello there", t0()), PROMPT_REPLY);
        assert_eq!(bot.respond("u", "12", "   ", t0()), PROMPT_REPLY);
        assert!(
            bot.tickets()
                .is_empty()
        );
    }

    #[test]
    fn follow_up_after_five_days()
    {
        let mut bot = bot(3, 5);
        bot.respond("u", "12", "garbage issue near my street", t0());

        let updates = bot.run_follow_up_cycle(t0() + Duration::days(5));
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].to_string(), "TKT-0001: Public alert issued");
        assert!(
            bot.run_follow_up_cycle(t0() + Duration::days(5))
                .is_empty()
        );
    }

    #[test]
    fn analytics_counts_only_registered_complaints()
    {
        let mut bot = bot(3, 5);
        bot.respond("a", "12", "no water supply", t0());
        bot.respond("b", "12", "water problem again", t0());
        bot.respond("c", "7", "garbage not cleared", t0());
        bot.respond("d", "7", "status of TKT-0001", t0());
        bot.respond("e", "7", "metro noise at night", t0());

        let stats = bot.analytics();
        assert_eq!(stats.total_complaints, 3);
        assert_eq!(stats.total_tickets, 2);
        assert_eq!(stats.open_tickets, 2);
        assert_eq!(
            stats
                .by_ward
                .iter()
                .map(|e| (e.label.as_str(), e.count))
                .collect::<Vec<_>>(),
            vec![("12", 2), ("7", 1)]
        );
        assert_eq!(stats.corpus_posts, 3);
    }

    #[test]
    fn truncation_counts_characters()
    {
        assert_eq!(truncate_chars("abcdef", 3), "abc");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("ಕಸ ರಸ್ತೆ", 2), "ಕಸ");
        assert_eq!(truncate_chars("", 0), "");
    }

    #[test]
    fn long_related_posts_are_truncated()
    {
        let long = format!("water {}", "x".repeat(300));
        let index = CorpusIndex::from_records(Vec::new(), vec![PostRow::new("reddit", &long)]);
        let mut bot = CivicBot::new(index, SeverityEstimator::default(), BotOptions::default()).unwrap();

        let text = bot.respond("u", "1", "water problem", t0());
        let bullet = text
            .lines()
            .last()
            .unwrap();
        assert_eq!(bullet.len(), "- [reddit] ".len() + 120);
    }
}
