use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, Subcommand};
use client::Preferences;
use colored::Colorize;
use rpassword::prompt_password;
use shared::config::Config;
use shared::models::{LoginRequest, LoginResponse};
use url::Url;

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// REST base URL override
    #[arg(long, help = "REST base URL override (e.g. http://localhost:8080/)")]
    pub server: Option<Url>,

    /// Path to the configuration file (optional)
    #[arg(long, short, help = "Path to the configuration file (config.yaml or config.json)")]
    pub config: Option<PathBuf>,
}

/// Authenticated-session operations.
#[derive(Subcommand, Debug)]
pub enum SessionCommand {
    /// Log in and store the bearer token locally
    Login(LoginArgs),
    /// Forget the stored bearer token
    Logout,
    /// Show the stored session state
    Show,
}

pub async fn run(action: SessionCommand) -> Result<()> {
    match action {
        SessionCommand::Login(args) => login(args).await,
        SessionCommand::Logout => logout(),
        SessionCommand::Show => show(),
    }
}

async fn login(args: LoginArgs) -> Result<()> {
    let config = Config::load_config(args.config, args.server)?;
    let api_base = config.api_base().context("invalid server URL")?;

    let email = prompt("Email: ")?;
    let password = prompt_password("Password: ")?;
    if password.trim().is_empty() {
        bail!("password must not be empty");
    }

    let login_url = api_base.join("auth/login").context("invalid login endpoint")?;
    let response = reqwest::Client::new()
        .post(login_url)
        .json(&LoginRequest { email, password })
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        bail!("login failed with {}: {}", status, body);
    }

    let login: LoginResponse = response.json().await?;
    let mut prefs = Preferences::load();
    prefs.auth_token = Some(login.data.token);
    if let Some(user) = &login.data.user {
        prefs.dark_mode = user.is_dark_mode;
    }
    prefs.save().context("failed to persist session")?;

    let who = login
        .data
        .user
        .map_or_else(|| "you".to_string(), |user| user.email);
    println!("{} Logged in as {}.", "✓".green(), who.bold());
    println!("Session stored at {}.", Preferences::path().display());
    Ok(())
}

fn logout() -> Result<()> {
    let mut prefs = Preferences::load();
    if prefs.auth_token.take().is_none() {
        println!("No session to clear.");
        return Ok(());
    }
    prefs.save().context("failed to persist session")?;
    println!("Logged out. The socket will not reconnect without a credential.");
    Ok(())
}

fn show() -> Result<()> {
    let prefs = Preferences::load();
    println!("Preferences file: {}", Preferences::path().display());
    match &prefs.auth_token {
        Some(token) => println!("Session: logged in (token ...{})", mask(token)),
        None => println!("Session: not logged in"),
    }
    println!("Theme: {}", if prefs.dark_mode { "dark" } else { "light" });
    println!("Room sort: {}", prefs.chat_sort);
    Ok(())
}

fn mask(token: &str) -> &str {
    let start = token.len().saturating_sub(6);
    // Slice at a character boundary near the tail.
    let mut cut = start;
    while cut < token.len() && !token.is_char_boundary(cut) {
        cut += 1;
    }
    &token[cut..]
}

fn prompt(message: &str) -> Result<String> {
    print!("{message}");
    io::stdout().flush()?;
    let mut value = String::new();
    io::stdin().read_line(&mut value)?;
    Ok(value.trim().to_string())
}
