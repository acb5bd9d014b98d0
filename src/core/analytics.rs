//! Session totals: complaints per issue and per ward, ticket counts and the
//! training topic table.

use indexmap::IndexMap;
use serde::Serialize;

use crate::core::{
    corpus::{CorpusIndex, TopicStat},
    ledger::ComplaintLedger,
    ticket::TicketRegistry,
};

/// One label with its complaint count
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountEntry
{
    pub label: String,
    pub count: usize,
}

/// Snapshot of the bot's state. Groupings keep first-seen order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Analytics
{
    pub total_complaints: usize,
    pub total_tickets: usize,
    pub open_tickets: usize,
    pub by_issue: Vec<CountEntry>,
    pub by_ward: Vec<CountEntry>,
    pub topics: Vec<TopicStat>,
    pub corpus_posts: usize,
}

impl Analytics
{
    pub fn collect(
        index: &CorpusIndex,
        ledger: &ComplaintLedger,
        registry: &TicketRegistry,
    ) -> Self
    {
        let mut by_issue: IndexMap<&str, usize> = IndexMap::new();
        let mut by_ward: IndexMap<&str, usize> = IndexMap::new();
        let mut total_complaints = 0;

        for (key, n) in ledger.counts()
        {
            *by_issue
                .entry(key.issue_type.as_str())
                .or_insert(0) += n;
            *by_ward
                .entry(key.ward.as_str())
                .or_insert(0) += n;
            total_complaints += n;
        }

        Self {
            total_complaints,
            total_tickets: registry.len(),
            open_tickets: registry
                .open_tickets()
                .count(),
            by_issue: entries(by_issue),
            by_ward: entries(by_ward),
            topics: index.topic_stats(),
            corpus_posts: index.post_count(),
        }
    }
}

fn entries(counts: IndexMap<&str, usize>) -> Vec<CountEntry>
{
    counts
        .into_iter()
        .map(|(label, count)| CountEntry {
            label: label.to_string(),
            count,
        })
        .collect()
}
