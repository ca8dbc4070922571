use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use client::{
    ChatClient, ChatOptions, ChatUpdate, ConnectionConfig, ConnectionManager, Preferences,
    RestHistoryClient,
};
use colored::Colorize;
use shared::config::Config;
use shared::models::{RoomId, Sender, Turn};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{Instant, sleep_until};
use url::Url;

/// Runs the interactive chat loop: stdin lines go out as messages, live
/// events and resolved history pages come back in, and an armed deadline
/// bounds the wait for each reply.
pub async fn run_chat(
    room: Option<String>,
    server: Option<Url>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = Config::load_config(config_path, server)?;
    let prefs = Preferences::load();
    let token = prefs
        .auth_token
        .clone()
        .context("not logged in; run `satchat session login` first")?;

    let history = Arc::new(RestHistoryClient::new(&config, token.clone())?);
    let mut manager = ConnectionManager::new(ConnectionConfig::from(&config));
    manager.ensure_connected(Some(&token));
    let connection = manager
        .connection()
        .context("failed to start the socket connection")?;
    let mut live = connection.subscribe();

    let options = ChatOptions::from(&config);
    let (mut chat, mut fetches) = ChatClient::new(history, connection, &options);

    match room {
        Some(room) => {
            let room = RoomId::from(room);
            println!("{}", format!("Opening room {room}...").dimmed());
            chat.enter_room(room);
        }
        None => {
            println!("{} {}", "Satoshi GPT".bold().blue(), "Your crypto friend.");
            println!("Type a message to start a new chat.");
        }
    }
    println!(
        "{}",
        "Commands: /older /replay /room <id> /home /retry /quit".dimmed()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let deadline = chat.next_deadline();
        let sleep = sleep_until(deadline.unwrap_or_else(|| Instant::now() + Duration::from_secs(60)));

        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read from stdin")? else {
                    break;
                };
                let line = line.trim().to_string();
                if line.is_empty() {
                    continue;
                }
                if let Some(command) = line.strip_prefix('/') {
                    if !handle_command(command, &mut chat) {
                        break;
                    }
                    continue;
                }
                if let Err(error) = chat.send(&line, Instant::now()) {
                    println!("{}", format!("error: {error}").red());
                }
            }
            event = live.recv() => {
                let Some(event) = event else {
                    bail!("socket subscription closed; the connection was torn down");
                };
                match chat.handle_event(event, Instant::now()) {
                    ChatUpdate::AiTurn(turn) => render_turn(&turn),
                    ChatUpdate::RoomCreated(room) => {
                        println!("{}", format!("(room {room} created)").dimmed());
                    }
                    ChatUpdate::Ignored => {}
                }
            }
            outcome = fetches.recv() => {
                let Some(outcome) = outcome else { continue };
                match chat.handle_fetch(outcome) {
                    Ok(Some(count)) if count > 0 => {
                        if chat.session().transcript().len() == count {
                            render_transcript(&chat);
                        } else {
                            println!(
                                "{}",
                                format!("(loaded {count} older messages; /replay to view)").dimmed()
                            );
                        }
                    }
                    Ok(_) => {}
                    Err(error) => println!("{}", format!("error: {error}").red()),
                }
            }
            () = sleep, if deadline.is_some() => {
                if let Some(error) = chat.poll_deadline(Instant::now()) {
                    println!("{}", format!("error: {error}").red());
                }
            }
        }
    }

    manager.disconnect();
    Ok(())
}

/// Handles a `/command` line. Returns `false` when the loop should exit.
fn handle_command(command: &str, chat: &mut ChatClient) -> bool {
    let mut parts = command.split_whitespace();
    match parts.next() {
        Some("quit" | "exit") => return false,
        Some("older") => {
            if chat.scrolled_to_top() {
                println!("{}", "(fetching older messages...)".dimmed());
            } else if chat.session().is_exhausted() {
                println!("{}", "(you have reached the start of this room)".dimmed());
            }
        }
        Some("replay") => render_transcript(chat),
        Some("room") => match parts.next() {
            Some(id) => {
                let room = RoomId::from(id);
                println!("{}", format!("Opening room {room}...").dimmed());
                chat.enter_room(room);
            }
            None => println!("{}", "usage: /room <id>".dimmed()),
        },
        Some("home") => {
            chat.leave_room();
            println!("{}", "(back to the room-less composer)".dimmed());
        }
        Some("retry") => chat.retry_initial_fetch(),
        Some("help") => {
            println!(
                "{}",
                "Commands: /older /replay /room <id> /home /retry /quit".dimmed()
            );
        }
        _ => println!("{}", format!("unknown command: /{command}").dimmed()),
    }
    true
}

fn render_transcript(chat: &ChatClient) {
    if chat.session().transcript().is_empty() {
        println!("{}", "(no messages yet)".dimmed());
        return;
    }
    for turn in chat.session().transcript().turns() {
        render_turn(turn);
    }
}

fn render_turn(turn: &Turn) {
    match turn.sender {
        Sender::User => println!("{} {}", "You:".blue().bold(), turn.message),
        Sender::Ai => println!("{} {}", "Satoshi:".green().bold(), render_text(&turn.message)),
    }
    if let Some(ticker) = &turn.graph {
        println!("  {}", format!("[chart: {ticker}]").dimmed());
    }
    if turn.table.is_some() {
        println!("  {}", "[table attached]".dimmed());
    }
}

/// Strips the backend's lightweight HTML markup for terminal display.
fn render_text(message: &str) -> String {
    let mut out = String::with_capacity(message.len());
    let mut in_tag = false;
    for ch in message.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::render_text;

    #[test]
    fn test_render_text_strips_markup() {
        assert_eq!(render_text("<p>BTC is <b>up</b></p>"), "BTC is up");
        assert_eq!(render_text("plain text"), "plain text");
        assert_eq!(render_text("<ul><li>one</li><li>two</li></ul>"), "one two");
    }
}
