//! **civictriage** - Civic complaint triage: topic matching, ticketing and escalation
//!
//! Free-text complaints are matched against a historical dataset by token overlap,
//! grouped per (ward, issue) into tickets and advanced along a fixed day-based
//! escalation timeline.

/// Command-line interface with clap integration
pub mod cli;

/// Shell completion generation
pub mod completion;

/// Matching and ticketing engine
pub mod core {
    /// Lowercase word tokenizer
    pub mod tokenize;
    pub use tokenize::tokenize;

    /// Topic inference and related-post lookup over the loaded datasets
    pub mod corpus;
    pub use corpus::{CorpusIndex, DataLoadError, RelatedPost, TopicMatch};

    /// Urgency scoring
    pub mod severity;
    pub use severity::SeverityEstimator;

    /// Complaint records grouped per (ward, issue)
    pub mod ledger;
    pub use ledger::{Complaint, ComplaintLedger, IssueKey};

    /// Ticket records and the one-open-ticket-per-key registry
    pub mod ticket;
    pub use ticket::{Ticket, TicketError, TicketId, TicketRegistry, TicketStatus};

    /// Day-based escalation stages and the follow-up cycle
    pub mod escalation;
    pub use escalation::{FollowUpUpdate, Stage, run_follow_up_cycle, scheduled_stage};

    /// Complaint and ticket totals for a session
    pub mod analytics;
    pub use analytics::{Analytics, CountEntry};

    /// Query dispatch, alerts and reply text
    pub mod composer;
    pub use composer::{BotOptions, CivicBot, Registration, Reply, ReplyKind};
}

/// Infrastructure - configuration and dataset I/O
pub mod infra {
    /// Layered configuration (file + CIVIC__ environment)
    pub mod config;
    pub use config::{Config, init as config_init, load_config};

    /// Size-aware file reading (memory-mapped above 1 MiB)
    pub mod io;
    pub use io::{FileContent, read_file_smart};
}

/// CLI command handlers
pub mod cli_ext {
    /// ask / chat / demo / topic / related / stats
    pub mod session_cmd;
}

// Strategic re-exports for clean CLI interface
pub use cli::{AppContext, Cli, Commands};
pub use infra::{Config, load_config};

// Core types for external consumers
pub use core::{CivicBot, CorpusIndex, Registration, TicketId};
