//! Session initialization command
//!
//! Signs the account in once (login code, then the 2FA password when the
//! account has one) and leaves an authorized session file behind for the
//! other commands.

use std::io::{self, BufRead, Write};

use clap::Args;
use grammers_client::SignInError;
use tracing::info;

use crate::commands::TelegramArgs;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::session::{get_client_for_login, SessionLock};

#[derive(Debug, Clone, Default, Args)]
pub struct LoginArgs {
    #[command(flatten)]
    pub telegram: TelegramArgs,

    /// Skip the confirmation prompt
    #[arg(long, default_value_t = false)]
    pub yes: bool,
}

/// Read one trimmed line after printing `prompt`.
fn ask<R: BufRead, W: Write>(prompt: &str, input: &mut R, output: &mut W) -> Result<String> {
    write!(output, "{}", prompt)?;
    output.flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(answer.trim().to_string())
}

/// Only an exact `YES` proceeds.
pub fn confirm<R: BufRead, W: Write>(phone: &str, input: &mut R, output: &mut W) -> Result<bool> {
    writeln!(
        output,
        "A new Telegram session will be created for {}.\n\
         Other sessions of this account stay active, but this one replaces any \
         existing local session file.",
        phone
    )?;
    let answer = ask("Type 'YES' to continue: ", input, output)?;
    Ok(answer == "YES")
}

pub async fn run(args: &LoginArgs, config: &Config) -> Result<()> {
    let telegram = args.telegram.apply(&config.telegram);
    telegram.validate()?;
    if telegram.phone.trim().is_empty() {
        return Err(Error::Config("telegram.phone is not set".to_string()));
    }

    let mut input = io::BufReader::new(io::stdin());
    let mut output = io::stdout();

    if !args.yes && !confirm(&telegram.phone, &mut input, &mut output)? {
        println!("Cancelled, no session created.");
        return Ok(());
    }

    let _lock = SessionLock::for_session(&telegram)?;
    let client = get_client_for_login(&telegram).await?;

    if client.is_authorized().await? {
        info!(session = %telegram.session_file(), "Session is already authorized");
        return Ok(());
    }

    let token = client
        .request_login_code(&telegram.phone, &telegram.api_hash)
        .await
        .map_err(|e| Error::SignIn(format!("failed to request code: {}", e)))?;

    let code = ask("Enter the code from Telegram: ", &mut input, &mut output)?;

    let user = match client.sign_in(&token, &code).await {
        Ok(user) => user,
        Err(SignInError::PasswordRequired(password_token)) => {
            let hint = password_token.hint().unwrap_or("none").to_string();
            let password = ask(
                &format!("Enter the 2FA password (hint: {}): ", hint),
                &mut input,
                &mut output,
            )?;
            client
                .check_password(password_token, password.trim())
                .await
                .map_err(|e| Error::SignIn(e.to_string()))?
        }
        Err(e) => return Err(Error::SignIn(e.to_string())),
    };

    info!(user_id = user.raw.id(), "Signed in");
    println!(
        "Session created: {}\nKeep this file private, it grants full account access.",
        telegram.session_file()
    );

    Ok(())
}
