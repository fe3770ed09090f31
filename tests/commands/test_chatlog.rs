//! Tests for chatlog command

use clap::Parser;
use telegram_tools::commands::chatlog::{ChatlogArgs, LogMode};

#[derive(Parser)]
struct Cli {
    #[command(flatten)]
    args: ChatlogArgs,
}

#[test]
fn test_chatlog_history_mode_flags() {
    let cli = Cli::parse_from([
        "chatlog2graylog",
        "--mode",
        "history",
        "--graylog-host",
        "graylog.local",
        "--since",
        "2024-01-01",
        "--peers",
        "111",
        "222",
    ]);
    assert_eq!(cli.args.mode, LogMode::History);
    assert_eq!(cli.args.graylog_host.as_deref(), Some("graylog.local"));
    assert_eq!(cli.args.peers, vec![111, 222]);
}

#[test]
fn test_chatlog_rejects_non_numeric_port() {
    assert!(Cli::try_parse_from(["chatlog2graylog", "--graylog-port", "gelf"]).is_err());
}
