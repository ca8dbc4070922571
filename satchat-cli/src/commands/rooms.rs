use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, Subcommand};
use client::{Preferences, RoomDirectory};
use colored::Colorize;
use shared::config::Config;
use shared::models::{RoomId, SortOrder};
use url::Url;

#[derive(Args, Debug)]
pub struct CommonArgs {
    /// REST base URL override
    #[arg(long, help = "REST base URL override (e.g. http://localhost:8080/)")]
    pub server: Option<Url>,

    /// Path to the configuration file (optional)
    #[arg(long, short, help = "Path to the configuration file (config.yaml or config.json)")]
    pub config: Option<PathBuf>,
}

/// Room directory operations.
#[derive(Subcommand, Debug)]
pub enum RoomsCommand {
    /// List your rooms
    List {
        /// Sort order: newest or oldest. Persisted as the default for next time.
        #[arg(long, help = "Sort order: newest or oldest. Persisted as the default for next time.")]
        sort: Option<String>,

        #[command(flatten)]
        common: CommonArgs,
    },
    /// Rename a room
    Rename {
        /// Room identifier to rename
        #[arg(long)]
        room: String,

        /// New room name
        #[arg()]
        name: String,

        #[command(flatten)]
        common: CommonArgs,
    },
    /// Delete a room
    Delete {
        /// Room identifier to delete
        #[arg(long)]
        room: String,

        #[command(flatten)]
        common: CommonArgs,
    },
}

pub async fn run(action: RoomsCommand) -> Result<()> {
    match action {
        RoomsCommand::List { sort, common } => list(sort, common).await,
        RoomsCommand::Rename { room, name, common } => rename(&room, &name, common).await,
        RoomsCommand::Delete { room, common } => delete(&room, common).await,
    }
}

fn directory(common: &CommonArgs) -> Result<RoomDirectory> {
    let config = Config::load_config(common.config.clone(), common.server.clone())?;
    let token = Preferences::load()
        .auth_token
        .context("not logged in; run `satchat session login` first")?;
    Ok(RoomDirectory::new(&config, token)?)
}

async fn list(sort: Option<String>, common: CommonArgs) -> Result<()> {
    let mut prefs = Preferences::load();
    let sort = match sort {
        Some(value) => {
            let Ok(parsed) = SortOrder::try_from(value.as_str()) else {
                bail!("invalid sort order '{value}'; use 'newest' or 'oldest'");
            };
            // Remember the explicit choice, like the sidebar does.
            if prefs.chat_sort != parsed {
                prefs.chat_sort = parsed;
                if let Err(error) = prefs.save() {
                    eprintln!("warning: failed to persist sort preference: {error}");
                }
            }
            parsed
        }
        None => prefs.chat_sort,
    };

    let directory = directory(&common)?;
    let rooms = directory.list(sort).await?;
    if rooms.is_empty() {
        println!("No rooms yet. Start one with `satchat chat`.");
        return Ok(());
    }

    println!("Rooms ({sort} first):");
    for room in rooms {
        let updated = room
            .updated_at
            .map_or_else(String::new, |at| at.format(" (updated %Y-%m-%d %H:%M)").to_string());
        let name = if room.room_name.is_empty() {
            "(unnamed)".to_string()
        } else {
            room.room_name
        };
        println!("- {} {}{}", room.room_id.to_string().bold(), name, updated.dimmed());
    }
    Ok(())
}

async fn rename(room: &str, name: &str, common: CommonArgs) -> Result<()> {
    let directory = directory(&common)?;
    directory.rename(&RoomId::from(room), name).await?;
    println!("Room {room} renamed to \"{name}\".");
    Ok(())
}

async fn delete(room: &str, common: CommonArgs) -> Result<()> {
    let directory = directory(&common)?;
    directory.delete(&RoomId::from(room)).await?;
    println!("Room {room} deleted.");
    Ok(())
}
