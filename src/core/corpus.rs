//! Topic inference and related-post lookup over the historical dataset.
//!
//! Two CSV sources feed the index:
//! - a topic-labelled training set (`text`, `label_topic`)
//! - a mixed-source post corpus (`source`, `text`)
//!
//! Both are loaded once and never mutated afterwards. Topics keep the order
//! in which their label first appears in the training set; that order is the
//! tie-break for equal overlap scores.

use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
};

use indexmap::IndexMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::{
    core::tokenize::{token_set, tokenize},
    infra::io::read_file_smart,
};

/// Topic reported when nothing in the training set overlaps the query
pub const DEFAULT_TOPIC: &str = "General civic issue";

/// Label used for training rows without a topic
pub const UNKNOWN_TOPIC: &str = "Unknown";

/// Label used for corpus rows without a source
pub const UNKNOWN_SOURCE: &str = "unknown";

/// Failure to build the index from its sources. Always fatal: there is no
/// partial load.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError
{
    #[error("cannot read {kind} dataset {}: {reason}", path.display())]
    Unreadable
    {
        kind: &'static str,
        path: PathBuf,
        reason: String,
    },

    #[error("malformed {kind} dataset {}", path.display())]
    Malformed
    {
        kind: &'static str,
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{kind} dataset {} has no `{column}` column", path.display())]
    MissingColumn
    {
        kind: &'static str,
        path: PathBuf,
        column: &'static str,
    },
}

/// One row of the topic-labelled training set
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TopicRow
{
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub label_topic: Option<String>,
}

impl TopicRow
{
    pub fn new(
        text: &str,
        topic: &str,
    ) -> Self
    {
        Self {
            text: Some(text.to_string()),
            label_topic: Some(topic.to_string()),
        }
    }
}

/// One row of the mixed-source post corpus
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostRow
{
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

impl PostRow
{
    pub fn new(
        source: &str,
        text: &str,
    ) -> Self
    {
        Self {
            source: Some(source.to_string()),
            text: Some(text.to_string()),
        }
    }
}

/// Best topic for a query and its overlap ratio (3 decimals)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicMatch
{
    pub topic: String,
    pub confidence: f64,
}

impl TopicMatch
{
    fn general() -> Self
    {
        Self {
            topic: DEFAULT_TOPIC.to_string(),
            confidence: 0.0,
        }
    }
}

/// A corpus post returned by related-post lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelatedPost
{
    pub source: String,
    pub text: String,
}

/// Topic label with the number of training examples behind it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicStat
{
    pub topic: String,
    pub examples: usize,
}

#[derive(Debug, Default)]
struct TopicProfile
{
    examples: usize,
    token_counts: HashMap<String, usize>,
}

#[derive(Debug)]
struct IndexedPost
{
    post: RelatedPost,
    tokens: HashSet<String>,
}

/// Read-only index over the training set and the post corpus
#[derive(Debug, Default)]
pub struct CorpusIndex
{
    topics: IndexMap<String, TopicProfile>,
    posts: Vec<IndexedPost>,
}

impl CorpusIndex
{
    /// Load both CSV sources.
    ///
    /// - Text is trimmed and rows with empty text are skipped.
    /// - Missing topic labels become `Unknown`; missing sources `unknown`.
    /// - Source labels are lowercased.
    #[instrument(level = "debug")]
    pub fn load(
        topics_path: &Path,
        corpus_path: &Path,
    ) -> Result<Self, DataLoadError>
    {
        let topic_rows: Vec<TopicRow> = read_rows("topic", topics_path)?;
        let post_rows: Vec<PostRow> = read_rows("corpus", corpus_path)?;

        let index = Self::from_records(topic_rows, post_rows);

        info!(
            topics = index
                .topics
                .len(),
            posts = index
                .posts
                .len(),
            "loaded civic datasets"
        );

        Ok(index)
    }

    /// Build the index from in-memory rows with the same normalisation as
    /// [`CorpusIndex::load`].
    pub fn from_records(
        topic_rows: impl IntoIterator<Item = TopicRow>,
        post_rows: impl IntoIterator<Item = PostRow>,
    ) -> Self
    {
        let mut topics: IndexMap<String, TopicProfile> = IndexMap::new();

        for row in topic_rows
        {
            let text = non_empty(row.text);
            let Some(text) = text
            else
            {
                continue;
            };

            let topic = non_empty(row.label_topic).unwrap_or_else(|| UNKNOWN_TOPIC.to_string());
            let profile = topics
                .entry(topic)
                .or_default();

            for token in tokenize(&text)
            {
                *profile
                    .token_counts
                    .entry(token)
                    .or_insert(0) += 1;
            }
            profile.examples += 1;
        }

        let posts = post_rows
            .into_iter()
            .filter_map(|row| {
                let text = non_empty(row.text)?;
                let source = non_empty(row.source)
                    .map(|s| s.to_lowercase())
                    .unwrap_or_else(|| UNKNOWN_SOURCE.to_string());

                Some(IndexedPost {
                    tokens: token_set(&text),
                    post: RelatedPost { source, text },
                })
            })
            .collect();

        Self { topics, posts }
    }

    /// Topic whose token counts overlap the query most.
    ///
    /// overlap = Σ min(query count, topic count) over shared tokens, divided
    /// by the query token count. Only a strictly higher score replaces the
    /// current best, so earlier topics win ties.
    pub fn infer_topic(
        &self,
        query: &str,
    ) -> TopicMatch
    {
        let query_tokens = tokenize(query);
        if query_tokens.is_empty()
            || self
                .topics
                .is_empty()
        {
            return TopicMatch::general();
        }

        let mut query_counts: HashMap<&str, usize> = HashMap::new();
        for token in &query_tokens
        {
            *query_counts
                .entry(token.as_str())
                .or_insert(0) += 1;
        }

        let denom = query_tokens
            .len()
            .max(1) as f64;

        let mut best_topic = DEFAULT_TOPIC;
        let mut best_score = 0.0_f64;

        for (topic, profile) in &self.topics
        {
            let overlap: usize = query_counts
                .iter()
                .map(|(token, &n)| {
                    profile
                        .token_counts
                        .get(*token)
                        .map_or(0, |&m| n.min(m))
                })
                .sum();

            let score = overlap as f64 / denom;
            if score > best_score
            {
                best_topic = topic;
                best_score = score;
            }
        }

        debug!(topic = best_topic, score = best_score, "inferred topic");

        TopicMatch {
            topic: best_topic.to_string(),
            confidence: round_to(best_score, 3),
        }
    }

    /// Corpus posts sharing at least one distinct token with the query,
    /// best first. Equal scores keep corpus order.
    pub fn find_related_posts(
        &self,
        query: &str,
        limit: usize,
    ) -> Vec<RelatedPost>
    {
        let query_tokens = token_set(query);
        if query_tokens.is_empty() || limit == 0
        {
            return Vec::new();
        }

        // Parallel collect keeps corpus order, so the stable sort below
        // preserves it for ties
        let mut scored: Vec<(usize, &RelatedPost)> = self
            .posts
            .par_iter()
            .filter_map(|p| {
                let score = p
                    .tokens
                    .intersection(&query_tokens)
                    .count();
                (score > 0).then_some((score, &p.post))
            })
            .collect();

        scored.sort_by(|a, b| {
            b.0.cmp(&a.0)
        });

        scored
            .into_iter()
            .take(limit)
            .map(|(_, post)| post.clone())
            .collect()
    }

    /// Example counts per topic, canonical order
    pub fn topic_stats(&self) -> Vec<TopicStat>
    {
        self.topics
            .iter()
            .map(|(topic, profile)| TopicStat {
                topic: topic.clone(),
                examples: profile.examples,
            })
            .collect()
    }

    pub fn post_count(&self) -> usize
    {
        self.posts
            .len()
    }
}

fn read_rows<T>(
    kind: &'static str,
    path: &Path,
) -> Result<Vec<T>, DataLoadError>
where
    T: for<'de> Deserialize<'de>,
{
    let content = read_file_smart(path).map_err(|e| DataLoadError::Unreadable {
        kind,
        path: path.to_path_buf(),
        reason: format!("{e:#}"),
    })?;

    let malformed = |source: csv::Error| DataLoadError::Malformed {
        kind,
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(content.as_ref());

    let has_text = reader
        .headers()
        .map_err(malformed)?
        .iter()
        .any(|h| h == "text");
    if !has_text
    {
        return Err(DataLoadError::MissingColumn {
            kind,
            path: path.to_path_buf(),
            column: "text",
        });
    }

    let rows = reader
        .deserialize()
        .collect::<Result<Vec<T>, _>>()
        .map_err(malformed)?;

    debug!(kind, rows = rows.len(), path = %path.display(), "read dataset rows");
    Ok(rows)
}

fn non_empty(value: Option<String>) -> Option<String>
{
    value
        .map(|v| {
            v.trim()
                .to_string()
        })
        .filter(|v| !v.is_empty())
}

/// Round half to even on the exact binary value; precision formatting
/// already does this, scaling by a power of ten does not
fn round_to(
    value: f64,
    places: usize,
) -> f64
{
    format!("{value:.places$}")
        .parse()
        .unwrap_or(value)
}
