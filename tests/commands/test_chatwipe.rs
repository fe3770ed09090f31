//! Tests for chatwipe command

use clap::Parser;
use telegram_tools::commands::chatwipe::{ChatwipeArgs, WipeMode};

#[derive(Parser)]
struct Cli {
    #[command(flatten)]
    args: ChatwipeArgs,
}

#[test]
fn test_chatwipe_defaults_to_list_mode() {
    let cli = Cli::parse_from(["chatwipe", "--since", "2024-01-01"]);
    assert_eq!(cli.args.mode, WipeMode::List);
    assert!(cli.args.peer.is_empty());
    assert!(cli.args.until.is_none());
}

#[test]
fn test_chatwipe_accepts_peer_list() {
    let cli = Cli::parse_from(["chatwipe", "--mode", "delete", "--peer", "111,222"]);
    assert_eq!(cli.args.mode, WipeMode::Delete);
    assert_eq!(cli.args.peer, vec![111, 222]);
}

#[test]
fn test_chatwipe_rejects_unknown_mode() {
    assert!(Cli::try_parse_from(["chatwipe", "--mode", "purge"]).is_err());
}

#[tokio::test]
#[ignore] // Requires Telegram connection
async fn test_chatwipe_run_lists_messages() {
    use telegram_tools::commands::chatwipe;
    use telegram_tools::Config;

    let args = ChatwipeArgs {
        since: Some("2024-01-01".to_string()),
        ..Default::default()
    };
    let result = chatwipe::run(&args, &Config::load().unwrap()).await;
    assert!(result.is_ok(), "{:?}", result);
}
