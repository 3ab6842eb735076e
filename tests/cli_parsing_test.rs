//! Integration tests for clap argument parsing of the `wavework` CLI surface.

use clap::Parser;
use wavework::cli::{Cli, Commands, CheckpointCommands, SessionCommands};

#[test]
fn session_create_parses_title_plan_and_project_path() {
    let cli = Cli::try_parse_from([
        "wavework",
        "session",
        "create",
        "refactor the parser",
        "--plan",
        "plan.json",
        "--project-path",
        "/repo",
    ])
    .unwrap();

    match cli.command {
        Commands::Session(SessionCommands::Create { title, plan, project_path }) => {
            assert_eq!(title, "refactor the parser");
            assert_eq!(plan, std::path::PathBuf::from("plan.json"));
            assert_eq!(project_path, "/repo");
        }
        other => panic!("expected Session::Create, got a different variant: {}", other_name(&other)),
    }
}

#[test]
fn session_create_defaults_project_path_to_cwd() {
    let cli = Cli::try_parse_from(["wavework", "session", "create", "t", "--plan", "plan.json"]).unwrap();

    match cli.command {
        Commands::Session(SessionCommands::Create { project_path, .. }) => assert_eq!(project_path, "."),
        _ => panic!("expected Session::Create"),
    }
}

#[test]
fn session_create_without_plan_is_rejected() {
    let result = Cli::try_parse_from(["wavework", "session", "create", "t"]);
    assert!(result.is_err());
}

#[test]
fn checkpoint_subcommands_parse() {
    let list = Cli::try_parse_from(["wavework", "checkpoint", "list"]).unwrap();
    assert!(matches!(list.command, Commands::Checkpoint(CheckpointCommands::List)));

    let compact = Cli::try_parse_from(["wavework", "checkpoint", "compact"]).unwrap();
    assert!(matches!(compact.command, Commands::Checkpoint(CheckpointCommands::Compact)));
}

#[test]
fn audit_query_parses_optional_filters() {
    let cli = Cli::try_parse_from([
        "wavework",
        "audit",
        "query",
        "--user-id",
        "alice",
        "--outcome",
        "failure",
        "--limit",
        "10",
    ])
    .unwrap();

    match cli.command {
        Commands::Audit(wavework::cli::AuditCommands::Query { user_id, outcome, limit }) => {
            assert_eq!(user_id.as_deref(), Some("alice"));
            assert_eq!(outcome.as_deref(), Some("failure"));
            assert_eq!(limit, Some(10));
        }
        _ => panic!("expected Audit::Query"),
    }
}

#[test]
fn global_json_flag_is_accepted_before_or_after_the_subcommand() {
    let before = Cli::try_parse_from(["wavework", "--json", "checkpoint", "list"]).unwrap();
    assert!(before.json);

    let after = Cli::try_parse_from(["wavework", "checkpoint", "list", "--json"]).unwrap();
    assert!(after.json);
}

#[test]
fn unknown_subcommand_is_rejected() {
    let result = Cli::try_parse_from(["wavework", "bogus"]);
    assert!(result.is_err());
}

fn other_name(commands: &Commands) -> &'static str {
    match commands {
        Commands::Session(_) => "Session",
        Commands::Checkpoint(_) => "Checkpoint",
        Commands::Audit(_) => "Audit",
    }
}
