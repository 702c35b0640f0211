//! Skirmish: two players defend a base against walking enemies.
//!
//! ```text
//! cargo run -p skirmish -- server --players 2
//! cargo run -p skirmish -- client
//! cargo run -p skirmish -- client
//! ```
//!
//! Both sides run the same fixed-timestep loop; Ctrl-C stops either one.

mod client;
mod game;
mod server;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use hearthguard::prelude::*;

#[derive(Debug, Parser)]
#[command(name = "skirmish", about = "Two-player base defence over Hearthguard")]
struct Cli {
    /// JSON config file; missing fields use defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Overrides the configured address.
    #[arg(long, global = true)]
    address: Option<String>,

    /// Overrides the configured port.
    #[arg(long, global = true)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Host a lobby and run the round.
    Server {
        /// Players needed before the round starts.
        #[arg(long)]
        players: Option<usize>,
    },
    /// Join a server as a bot player.
    Client {
        /// Chance per tick of taking a random step.
        #[arg(long, default_value_t = 0.1)]
        move_chance: f64,
    },
}

impl Cli {
    fn net_config(&self) -> Result<NetConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => NetConfig::load(path)?,
            None => NetConfig::default(),
        };
        if let Some(address) = &self.address {
            config.address = address.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Command::Server {
            players: Some(players),
        } = self.command
        {
            config.expected_players = players;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = cli.net_config()?;
    init_logging(&config.log_filter);

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("ctrl-c, shutting down");
            on_ctrl_c.cancel();
        }
    });

    match cli.command {
        Command::Server { .. } => server::run(&config, cancel).await?,
        Command::Client { move_chance } => client::run(&config, move_chance, cancel).await?,
    }
    Ok(())
}
