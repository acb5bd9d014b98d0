use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cli::{AppContext, InitArgs};
use crate::core::composer::BotOptions;
use crate::core::severity::DEFAULT_URGENCY_TERMS;

/// Config file names looked up in the working directory, first match wins
pub const CONFIG_FILES: [&str; 4] = ["civic.toml", "civic.yaml", "civic.json", ".civic.toml"];

/// Environment prefix; nested keys use `__`, e.g. `CIVIC__ALERTS__PREDICTIVE_THRESHOLD`
pub const ENV_PREFIX: &str = "CIVIC";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config
{
    /// Dataset locations
    pub data: DataConfig,

    /// Alert thresholds
    pub alerts: AlertConfig,

    /// Intent detection and related-post display
    pub matching: MatchingConfig,

    /// Urgency scoring
    pub severity: SeverityConfig,

    /// Defaults for CLI sessions
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig
{
    /// Topic-labelled training set (`text`, `label_topic`)
    pub topics_file: String,
    /// Mixed-source post corpus (`source`, `text`)
    pub corpus_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig
{
    pub predictive_threshold: usize,
    pub escalation_threshold: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig
{
    /// Substrings that mark a query as a complaint
    pub complaint_keywords: Vec<String>,
    /// Related posts attached to a reply
    pub related_limit: usize,
    /// Characters of each related post shown in replies
    pub display_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityConfig
{
    pub urgency_terms: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig
{
    pub user: String,
    pub ward: String,
    /// Days ahead simulated by the follow-up cycle after `ask`/`demo`
    pub follow_up_days: i64,
}

impl Default for DataConfig
{
    fn default() -> Self
    {
        Self {
            topics_file: "train_topic_data.csv".to_string(),
            corpus_file: "hf_combined.csv".to_string(),
        }
    }
}

impl Default for AlertConfig
{
    fn default() -> Self
    {
        Self {
            predictive_threshold: 3,
            escalation_threshold: 5,
        }
    }
}

impl Default for MatchingConfig
{
    fn default() -> Self
    {
        let opts = BotOptions::default();
        Self {
            complaint_keywords: opts.complaint_keywords,
            related_limit: opts.related_limit,
            display_chars: opts.display_chars,
        }
    }
}

impl Default for SeverityConfig
{
    fn default() -> Self
    {
        Self {
            urgency_terms: DEFAULT_URGENCY_TERMS
                .iter()
                .map(|t| t.to_string())
                .collect(),
        }
    }
}

impl Default for SessionConfig
{
    fn default() -> Self
    {
        Self {
            user: "demo_user".to_string(),
            ward: "12".to_string(),
            follow_up_days: 5,
        }
    }
}

impl Config
{
    /// Composer options derived from the alert and matching sections
    pub fn bot_options(&self) -> BotOptions
    {
        BotOptions {
            predictive_threshold: self
                .alerts
                .predictive_threshold,
            escalation_threshold: self
                .alerts
                .escalation_threshold,
            complaint_keywords: self
                .matching
                .complaint_keywords
                .clone(),
            related_limit: self
                .matching
                .related_limit,
            display_chars: self
                .matching
                .display_chars,
        }
    }

    /// Dataset paths with `~` and `$VAR` expanded
    pub fn dataset_paths(&self) -> Result<(PathBuf, PathBuf)>
    {
        Ok((
            expand_path(
                &self
                    .data
                    .topics_file,
            )?,
            expand_path(
                &self
                    .data
                    .corpus_file,
            )?,
        ))
    }
}

fn expand_path(raw: &str) -> Result<PathBuf>
{
    let expanded =
        shellexpand::full(raw).with_context(|| format!("Failed to expand path {raw}"))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

/// Load configuration from `explicit` (when given) or the first config
/// file found in the working directory, then overlay `CIVIC__*`
/// environment variables.
pub fn load_config(explicit: Option<&Path>) -> Result<Config>
{
    let mut builder = config::Config::builder();

    if let Some(path) = explicit
    {
        if !path.exists()
        {
            anyhow::bail!("Config file not found: {}", path.display());
        }
        builder = builder.add_source(config::File::from(path));
    }
    else
    {
        for path in &CONFIG_FILES
        {
            if Path::new(path).exists()
            {
                debug!(path, "using config file");
                builder = builder.add_source(config::File::with_name(path));
                break;
            }
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true),
    );

    let cfg = builder
        .build()
        .context("Failed to load configuration")?;
    let parsed: Config = cfg
        .try_deserialize()
        .context("Failed to parse configuration")?;

    Ok(parsed)
}

pub fn init(
    args: InitArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let config_path = args
        .path
        .join("civic.toml");

    if config_path.exists() && !args.force
    {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    let config = Config::default();
    let toml_string =
        toml::to_string_pretty(&config).context("Failed to serialize default config")?;

    std::fs::write(&config_path, toml_string).context("Failed to write config file")?;

    if !ctx.quiet
    {
        println!("Created config file at {}", config_path.display());
    }
    Ok(())
}
