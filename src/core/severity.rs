//! Urgency scoring from a fixed list of alarm terms.

use std::collections::HashSet;

use aho_corasick::{AhoCorasick, AhoCorasickBuilder};
use anyhow::{Context, Result};

/// Score every query starts from
pub const BASE_SEVERITY: f64 = 0.2;

/// Added once per distinct urgency term found
pub const TERM_WEIGHT: f64 = 0.12;

pub const DEFAULT_URGENCY_TERMS: &[&str] =
    &["urgent", "danger", "flood", "fire", "accident", "blocked", "no water"];

/// Case-insensitive substring matcher over the urgency terms
#[derive(Debug, Clone)]
pub struct SeverityEstimator
{
    matcher: AhoCorasick,
}

impl SeverityEstimator
{
    pub fn new<I, S>(terms: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let terms: Vec<String> = terms
            .into_iter()
            .map(|t| {
                t.as_ref()
                    .trim()
                    .to_string()
            })
            .filter(|t| !t.is_empty())
            .collect();

        let matcher = AhoCorasickBuilder::new()
            .ascii_case_insensitive(true)
            .build(&terms)
            .context("Failed to build urgency term matcher")?;

        Ok(Self { matcher })
    }

    /// 0.2 plus 0.12 per distinct term contained in `query`, capped at 1.0
    /// and rounded to two decimals.
    pub fn estimate(
        &self,
        query: &str,
    ) -> f64
    {
        let hits: HashSet<usize> = self
            .matcher
            .find_overlapping_iter(query)
            .map(|m| {
                m.pattern()
                    .as_usize()
            })
            .collect();

        let score = (BASE_SEVERITY + TERM_WEIGHT * hits.len() as f64).min(1.0);
        (score * 100.0).round() / 100.0
    }
}

impl Default for SeverityEstimator
{
    fn default() -> Self
    {
        // The built-in term list always compiles
        Self::new(DEFAULT_URGENCY_TERMS).expect("default urgency terms are valid")
    }
}
