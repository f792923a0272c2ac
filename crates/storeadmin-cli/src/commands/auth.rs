//! Authentication commands.

use std::io::{self, Write};

use anyhow::Result;
use storeadmin_core::auth::SESSION_EXPIRED_NOTICE;
use storeadmin_core::LoginError;
use tracing::{error, warn};

use super::{Context, SessionState};
use crate::output::{self, OutputFormat};

/// Login with email and password.
pub async fn login(ctx: &Context, email: Option<String>) -> Result<()> {
    let email = match email
        .or_else(|| std::env::var("STOREADMIN_EMAIL").ok())
        .or_else(|| ctx.config.last_email.clone())
    {
        Some(email) => email,
        None => prompt_email()?,
    };
    if email.is_empty() {
        anyhow::bail!("Email is required");
    }

    let password = match std::env::var("STOREADMIN_PASSWORD") {
        Ok(password) => password,
        Err(_) => rpassword::prompt_password("Password: ")?,
    };
    if password.is_empty() {
        anyhow::bail!("Password is required");
    }

    match ctx.client.login(&email, &password).await {
        Ok(()) => {
            let mut config = ctx.config.clone();
            config.last_email = Some(email.clone());
            if let Err(e) = config.save() {
                warn!(error = %e, "Failed to save config");
            }
            output::print_success(&format!("Logged in as {}", email), ctx.format);
            Ok(())
        }
        Err(e) => {
            if !matches!(e, LoginError::InvalidCredentials) {
                error!(error = %e, "Login failed");
            }
            Err(e.into())
        }
    }
}

fn prompt_email() -> Result<String> {
    print!("Email: ");
    io::stdout().flush()?;

    let mut email = String::new();
    io::stdin().read_line(&mut email)?;
    Ok(email.trim().to_string())
}

/// Logout and clear the stored session.
pub fn logout(ctx: &Context) -> Result<()> {
    ctx.client.logout();
    output::print_success("Logged out", ctx.format);
    Ok(())
}

/// Show session status.
pub fn status(ctx: &Context) -> Result<()> {
    let store = ctx.client.store();
    let session = SessionState::of(store);
    let state = session.label();

    match ctx.format {
        OutputFormat::Text => {
            output::print_row("Session", state);
            output::print_row("API", &ctx.config.base_url());
            output::print_row("Token store", &store.backend());
            if let Some(ref email) = ctx.config.last_email {
                output::print_row("Last email", email);
            }
            if session == SessionState::Expired {
                println!();
                println!("{}", SESSION_EXPIRED_NOTICE);
            }
        }
        OutputFormat::Json => {
            let value = serde_json::json!({
                "session": state,
                "api": ctx.config.base_url(),
                "token_store": store.backend(),
                "last_email": ctx.config.last_email,
            });
            println!("{}", value);
        }
    }
    Ok(())
}

/// Show the logged-in user's profile.
pub async fn whoami(ctx: &Context) -> Result<()> {
    ctx.require_session()?;
    let user = ctx.client.profile().await?;
    output::print_record(
        &user,
        ctx.format,
        &[
            ("Name", user.name.clone()),
            ("Email", user.email.clone()),
            ("Role", user.role_display().to_string()),
            ("ID", user.id.to_string()),
        ],
    );
    Ok(())
}
