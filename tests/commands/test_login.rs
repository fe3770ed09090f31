//! Tests for login command

use std::io::Cursor;

use telegram_tools::commands::login::confirm;

#[test]
fn test_login_confirmation_yes() {
    let mut out = Vec::new();
    assert!(confirm("+1000", &mut Cursor::new(b"YES\n".to_vec()), &mut out).unwrap());
}

#[test]
fn test_login_confirmation_is_case_sensitive() {
    for answer in ["yes\n", "Yes\n", "no\n", "\n"] {
        let mut out = Vec::new();
        let confirmed = confirm("+1000", &mut Cursor::new(answer.as_bytes().to_vec()), &mut out).unwrap();
        assert!(!confirmed, "{:?} must not confirm", answer);
    }
}

#[test]
fn test_login_confirmation_trims_whitespace() {
    let mut out = Vec::new();
    assert!(confirm("+1000", &mut Cursor::new(b"  YES  \n".to_vec()), &mut out).unwrap());
}

#[tokio::test]
#[ignore] // Requires user interaction
async fn test_login_run() {
    use telegram_tools::commands::login::{run, LoginArgs};
    use telegram_tools::Config;

    let _ = run(&LoginArgs::default(), &Config::load().unwrap()).await;
}
