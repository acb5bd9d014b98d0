use clap::Parser;
use civictriage::cli::{AskArgs, Cli, Commands, RelatedArgs, StatsArgs};

#[test]
fn ask_flag_parsing()
{
    // Given
    let argv = vec![
        "civic",
        "--json",
        "ask",
        "--ward",
        "7",
        "--user",
        "asha",
        "--follow-up-days",
        "3",
        "no water since morning",
    ];

    // When
    let cmd = Cli::parse_from(argv);

    // Then
    assert!(cmd.json);
    match cmd.command
    {
        Commands::Ask(AskArgs { query, session, follow_up_days }) =>
        {
            assert_eq!(query, "no water since morning");
            assert_eq!(session.ward.as_deref(), Some("7"));
            assert_eq!(session.user.as_deref(), Some("asha"));
            assert_eq!(follow_up_days, Some(3));
        }
        _ => panic!("expected Ask command"),
    }
}

#[test]
fn related_defaults_and_global_flags_after_subcommand()
{
    let cmd = Cli::parse_from(["civic", "related", "garbage smell", "--quiet", "--config", "x.toml"]);

    assert!(cmd.quiet);
    assert_eq!(cmd.config.as_deref(), Some(std::path::Path::new("x.toml")));
    match cmd.command
    {
        Commands::Related(RelatedArgs { query, limit }) =>
        {
            assert_eq!(query, "garbage smell");
            assert_eq!(limit, 3);
        }
        _ => panic!("expected Related command"),
    }
}

#[test]
fn stats_takes_any_number_of_queries()
{
    let cmd = Cli::parse_from(["civic", "stats", "no water", "garbage smell", "--ward", "3"]);
    match cmd.command
    {
        Commands::Stats(StatsArgs { queries, session }) =>
        {
            assert_eq!(queries, ["no water", "garbage smell"]);
            assert_eq!(session.ward.as_deref(), Some("3"));
        }
        _ => panic!("expected Stats command"),
    }

    let cmd = Cli::parse_from(["civic", "stats"]);
    assert!(matches!(cmd.command, Commands::Stats(StatsArgs { ref queries, .. }) if queries.is_empty()));
}

#[test]
fn completions_require_destination()
{
    assert!(Cli::try_parse_from(["civic", "completions", "bash"]).is_err());
    assert!(Cli::try_parse_from(["civic", "completions", "bash", "--stdout"]).is_ok());
}
