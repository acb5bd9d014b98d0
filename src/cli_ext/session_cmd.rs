//! CLI command handlers for chat sessions and corpus diagnostics.
//!
//! Every handler builds one [`CivicBot`] from the loaded configuration and
//! datasets, then drives it with the wall clock.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use chrono::{DateTime, TimeDelta, Utc};
use owo_colors::OwoColorize;
use serde::Serialize;
use serde_json::json;
use tabled::{Table, Tabled};
use tracing::{info, instrument};

use crate::{
    cli::{AppContext, AskArgs, RelatedArgs, SessionArgs, StatsArgs, TopicArgs},
    core::{
        Analytics, CivicBot, CorpusIndex, CountEntry, FollowUpUpdate, SeverityEstimator, TicketId,
        composer::truncate_chars,
    },
    infra::config::{Config, load_config},
};

/// Queries replayed by `civic demo`
pub const SAMPLE_QUERIES: [&str; 3] = [
    "Water not coming in my area since morning",
    "garbage issue near my street and bad smell",
    "status of TKT-0001",
];

/// Days simulated by the demo follow-up cycle
const DEMO_FOLLOW_UP_DAYS: i64 = 5;

/// Resolved user and ward for a session
#[derive(Debug, Clone)]
struct Identity
{
    user: String,
    ward: String,
}

impl Identity
{
    fn resolve(
        args: SessionArgs,
        cfg: &Config,
    ) -> Self
    {
        Self {
            user: args
                .user
                .unwrap_or_else(|| {
                    cfg.session
                        .user
                        .clone()
                }),
            ward: args
                .ward
                .unwrap_or_else(|| {
                    cfg.session
                        .ward
                        .clone()
                }),
        }
    }
}

#[derive(Tabled)]
struct TicketRow
{
    #[tabled(rename = "Ticket")]
    id: String,
    #[tabled(rename = "Ward")]
    ward: String,
    #[tabled(rename = "Issue")]
    issue: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Complaints")]
    complaints: usize,
    #[tabled(rename = "Last action")]
    last_action: String,
}

#[derive(Tabled)]
struct CountRow
{
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "Count")]
    count: usize,
}

/// Session commands recognised by the chat loop. Anything else is a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChatCommand
{
    Exit,
    Tickets,
    Stats,
    FollowUp(i64),
    Resolve(TicketId),
}

impl ChatCommand
{
    /// Match the whole line against the command grammar
    fn parse(line: &str) -> Option<Self>
    {
        let lower = line.to_lowercase();
        let words: Vec<&str> = lower
            .split_whitespace()
            .collect();

        match words.as_slice()
        {
            ["exit"] | ["quit"] => Some(Self::Exit),
            ["tickets"] => Some(Self::Tickets),
            ["stats"] => Some(Self::Stats),
            ["follow-up"] => Some(Self::FollowUp(DEMO_FOLLOW_UP_DAYS)),
            ["follow-up", days] => days
                .parse()
                .ok()
                .map(Self::FollowUp),
            ["resolve", id] => id
                .parse()
                .ok()
                .map(Self::Resolve),
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct FollowUpReport<'a>
{
    days: i64,
    updates: &'a [FollowUpUpdate],
}

/// Load config and datasets and build the bot
#[instrument(skip(ctx))]
pub fn load_bot(ctx: &AppContext) -> Result<(CivicBot, Config)>
{
    let cfg = load_config(
        ctx.config_path
            .as_deref(),
    )?;
    let (topics_path, corpus_path) = cfg.dataset_paths()?;

    let index = CorpusIndex::load(&topics_path, &corpus_path)
        .context("Failed to load civic datasets")?;
    let severity = SeverityEstimator::new(
        &cfg.severity
            .urgency_terms,
    )?;
    let bot = CivicBot::new(index, severity, cfg.bot_options())?;

    info!(
        topics = %topics_path.display(),
        corpus = %corpus_path.display(),
        "bot ready"
    );
    Ok((bot, cfg))
}

pub fn ask(
    args: AskArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let (mut bot, cfg) = load_bot(ctx)?;
    let who = Identity::resolve(args.session, &cfg);
    let days = args
        .follow_up_days
        .unwrap_or(
            cfg.session
                .follow_up_days,
        );

    let now = Utc::now();
    let reply = bot.handle(&who.user, &who.ward, &args.query, now);
    let updates = bot.run_follow_up_cycle(days_after(now, days)?);

    if ctx.json
    {
        let follow_up = FollowUpReport { days, updates: &updates };
        let out = json!({ "reply": reply, "follow_up": follow_up });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("{}", reply.text);
    print_follow_up(days, &updates, ctx);
    Ok(())
}

pub fn demo(
    args: SessionArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let (mut bot, cfg) = load_bot(ctx)?;
    let who = Identity::resolve(args, &cfg);

    let now = Utc::now();
    let mut replies = Vec::with_capacity(SAMPLE_QUERIES.len());

    for query in SAMPLE_QUERIES
    {
        let reply = bot.handle(&who.user, &who.ward, query, now);
        if !ctx.json
        {
            println!("\n{} {query}", heading("User:", ctx));
            println!("{}", reply.text);
        }
        replies.push(json!({ "query": query, "reply": reply }));
    }

    let updates = bot.run_follow_up_cycle(days_after(now, DEMO_FOLLOW_UP_DAYS)?);

    if ctx.json
    {
        let follow_up = FollowUpReport {
            days: DEMO_FOLLOW_UP_DAYS,
            updates: &updates,
        };
        let out = json!({ "exchanges": replies, "follow_up": follow_up });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    print_follow_up(DEMO_FOLLOW_UP_DAYS, &updates, ctx);
    Ok(())
}

pub fn chat(
    args: SessionArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let (mut bot, cfg) = load_bot(ctx)?;
    let who = Identity::resolve(args, &cfg);

    if !ctx.quiet
    {
        println!("Civic triage bot is ready. Type 'exit' to stop.");
    }

    let stdin = io::stdin();
    let stdout = io::stdout();
    chat_loop(&mut bot, &who, stdin.lock(), stdout.lock(), ctx)
}

/// Read queries until `exit`/`quit` or end of input.
///
/// Lines that are exactly `tickets`, `stats`, `follow-up [days]` or
/// `resolve <ticket id>` run as session commands; every other line goes to
/// the bot.
fn chat_loop<R, W>(
    bot: &mut CivicBot,
    who: &Identity,
    input: R,
    mut out: W,
    ctx: &AppContext,
) -> Result<()>
where
    R: BufRead,
    W: Write,
{
    let mut lines = input.lines();

    loop
    {
        if !ctx.quiet
        {
            write!(out, "> ")?;
            out.flush()?;
        }

        let Some(line) = lines.next()
        else
        {
            break;
        };
        let line = line.context("Failed to read chat input")?;
        let query = line.trim();
        let now = Utc::now();

        let msg = match ChatCommand::parse(query)
        {
            Some(ChatCommand::Exit) => break,
            Some(ChatCommand::Tickets) => render_tickets(bot, ctx)?,
            Some(ChatCommand::Stats) => render_stats(&bot.analytics(), ctx)?,
            Some(ChatCommand::FollowUp(days)) => match days_after(now, days)
            {
                Ok(at) => render_updates(&bot.run_follow_up_cycle(at), ctx)?,
                Err(e) => e.to_string(),
            },
            Some(ChatCommand::Resolve(id)) => match bot.resolve_ticket(id, now)
            {
                Ok(summary) => format!("{} is {}.", summary.ticket_id, summary.status),
                Err(e) => e.to_string(),
            },
            None =>
            {
                let reply = bot.handle(&who.user, &who.ward, query, now);
                if ctx.json
                {
                    serde_json::to_string(&reply)?
                }
                else
                {
                    reply.text
                }
            }
        };
        writeln!(out, "{msg}")?;
    }

    Ok(())
}

pub fn stats(
    args: StatsArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let (mut bot, cfg) = load_bot(ctx)?;
    let who = Identity::resolve(args.session, &cfg);

    let now = Utc::now();
    for query in &args.queries
    {
        bot.handle(&who.user, &who.ward, query, now);
    }

    let analytics = bot.analytics();
    if ctx.json
    {
        println!("{}", serde_json::to_string_pretty(&analytics)?);
        return Ok(());
    }

    println!("{}", render_stats(&analytics, ctx)?);
    Ok(())
}

pub fn topic(
    args: TopicArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let (bot, _) = load_bot(ctx)?;
    let m = bot
        .index()
        .infer_topic(&args.query);

    if ctx.json
    {
        println!("{}", serde_json::to_string_pretty(&m)?);
    }
    else
    {
        println!("{} (confidence={:?})", m.topic, m.confidence);
    }
    Ok(())
}

pub fn related(
    args: RelatedArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let (bot, _) = load_bot(ctx)?;
    let posts = bot
        .index()
        .find_related_posts(&args.query, args.limit);

    if ctx.json
    {
        println!("{}", serde_json::to_string_pretty(&posts)?);
        return Ok(());
    }

    if posts.is_empty()
    {
        if !ctx.quiet
        {
            println!("No related posts.");
        }
        return Ok(());
    }

    let width = bot
        .options()
        .display_chars;
    for p in &posts
    {
        println!("- [{}] {}", p.source, truncate_chars(&p.text, width));
    }
    Ok(())
}

fn days_after(
    now: DateTime<Utc>,
    days: i64,
) -> Result<DateTime<Utc>>
{
    TimeDelta::try_days(days)
        .and_then(|d| now.checked_add_signed(d))
        .with_context(|| format!("Follow-up offset of {days} days is out of range"))
}

fn print_follow_up(
    days: i64,
    updates: &[FollowUpUpdate],
    ctx: &AppContext,
)
{
    println!("{}", heading(&format!("Follow-up cycle (after {days} days):"), ctx));
    if updates.is_empty()
    {
        println!("(no stage changes)");
    }
    for u in updates
    {
        println!("- {u}");
    }
}

fn render_updates(
    updates: &[FollowUpUpdate],
    ctx: &AppContext,
) -> Result<String>
{
    if ctx.json
    {
        return Ok(serde_json::to_string(updates)?);
    }
    if updates.is_empty()
    {
        return Ok("(no stage changes)".to_string());
    }
    Ok(updates
        .iter()
        .map(|u| format!("- {u}"))
        .collect::<Vec<_>>()
        .join("\n"))
}

fn render_tickets(
    bot: &CivicBot,
    ctx: &AppContext,
) -> Result<String>
{
    if ctx.json
    {
        let summaries: Vec<_> = bot
            .tickets()
            .iter()
            .map(|t| t.summary())
            .collect();
        return Ok(serde_json::to_string(&summaries)?);
    }

    if bot
        .tickets()
        .is_empty()
    {
        return Ok("No tickets yet.".to_string());
    }

    let rows: Vec<TicketRow> = bot
        .tickets()
        .iter()
        .map(|t| TicketRow {
            id: t
                .ticket_id
                .to_string(),
            ward: t
                .ward
                .clone(),
            issue: t
                .issue_type
                .clone(),
            status: t
                .status
                .to_string(),
            complaints: t
                .complaints
                .len(),
            last_action: t
                .last_action
                .clone(),
        })
        .collect();

    Ok(Table::new(rows).to_string())
}

fn render_stats(
    stats: &Analytics,
    ctx: &AppContext,
) -> Result<String>
{
    if ctx.json
    {
        return Ok(serde_json::to_string(stats)?);
    }

    let mut sections = vec![format!(
        "Complaints: {}  Tickets: {} ({} open)  Corpus posts: {}",
        stats.total_complaints, stats.total_tickets, stats.open_tickets, stats.corpus_posts
    )];

    for (title, entries) in [("By issue:", &stats.by_issue), ("By ward:", &stats.by_ward)]
    {
        if !entries.is_empty()
        {
            sections.push(format!("{}\n{}", heading(title, ctx), count_table(entries)));
        }
    }

    let topics: Vec<CountRow> = stats
        .topics
        .iter()
        .map(|t| CountRow {
            label: t
                .topic
                .clone(),
            count: t.examples,
        })
        .collect();
    if !topics.is_empty()
    {
        sections.push(format!(
            "{}\n{}",
            heading("Training examples per topic:", ctx),
            Table::new(topics)
        ));
    }

    Ok(sections.join("\n\n"))
}

fn count_table(entries: &[CountEntry]) -> String
{
    let rows: Vec<CountRow> = entries
        .iter()
        .map(|e| CountRow {
            label: e
                .label
                .clone(),
            count: e.count,
        })
        .collect();
    Table::new(rows).to_string()
}

fn heading(
    text: &str,
    ctx: &AppContext,
) -> String
{
    if ctx.no_color
    {
        text.to_string()
    }
    else
    {
        text.bold()
            .to_string()
    }
}
