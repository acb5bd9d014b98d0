//! Complaint records and the per-(ward, issue) ledger that counts them.

use std::{fmt, sync::Arc};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A single citizen complaint. Immutable once created; tickets and the
/// ledger share it through `Arc`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Complaint
{
    pub user_id: String,
    pub ward: String,
    pub issue_type: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl Complaint
{
    pub fn new(
        user_id: impl Into<String>,
        ward: impl Into<String>,
        issue_type: impl Into<String>,
        description: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self
    {
        Self {
            user_id: user_id.into(),
            ward: ward.into(),
            issue_type: issue_type.into(),
            description: description.into(),
            created_at,
        }
    }

    pub fn key(&self) -> IssueKey
    {
        IssueKey::new(&self.ward, &self.issue_type)
    }
}

/// Grouping key for complaints and open tickets
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IssueKey
{
    pub ward: String,
    pub issue_type: String,
}

impl IssueKey
{
    pub fn new(
        ward: impl Into<String>,
        issue_type: impl Into<String>,
    ) -> Self
    {
        Self {
            ward: ward.into(),
            issue_type: issue_type.into(),
        }
    }
}

impl fmt::Display for IssueKey
{
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result
    {
        write!(f, "ward {} / {}", self.ward, self.issue_type)
    }
}

/// Append-only complaint buckets keyed by (ward, issue). Counts never
/// go down, even after a ticket for the key is resolved.
#[derive(Debug, Default)]
pub struct ComplaintLedger
{
    buckets: IndexMap<IssueKey, Vec<Arc<Complaint>>>,
}

impl ComplaintLedger
{
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Append `complaint` to its bucket and return the new bucket size.
    pub fn record(
        &mut self,
        complaint: Arc<Complaint>,
    ) -> usize
    {
        let bucket = self
            .buckets
            .entry(complaint.key())
            .or_default();
        bucket.push(complaint);
        bucket.len()
    }

    pub fn count(
        &self,
        key: &IssueKey,
    ) -> usize
    {
        self.buckets
            .get(key)
            .map_or(0, Vec::len)
    }

    /// Complaints recorded for `key`, oldest first
    pub fn complaints(
        &self,
        key: &IssueKey,
    ) -> &[Arc<Complaint>]
    {
        self.buckets
            .get(key)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Most recent complaint for `key`
    pub fn latest(
        &self,
        key: &IssueKey,
    ) -> Option<&Arc<Complaint>>
    {
        self.complaints(key)
            .last()
    }

    /// Keys with their counts, in first-seen order
    pub fn counts(&self) -> impl Iterator<Item = (&IssueKey, usize)>
    {
        self.buckets
            .iter()
            .map(|(k, v)| (k, v.len()))
    }
}
