//! Entry point for `story-chain`.
//!
//! Parses CLI arguments and runs either the game host or a player. All
//! networking is delegated to `tandem`; this file owns only process setup
//! (logging, argument parsing).

mod host;
mod message;
mod player;

use std::net::{Ipv4Addr, SocketAddrV4};
use std::process::ExitCode;

use clap::Parser;
use tandem::prelude::*;
use tracing_subscriber::EnvFilter;

/// Word-association story game over TCP or UDP.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Host the game instead of joining one.
    #[arg(long)]
    server: bool,

    /// Use UDP datagrams instead of a TCP stream.
    #[arg(long)]
    udp: bool,

    /// IPv4 address to bind (host) or connect to (player).
    #[arg(short, long, default_value = "127.0.0.1")]
    address: Ipv4Addr,

    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Rounds of turns before the story is told.
    #[arg(long, default_value_t = 3)]
    rounds: u32,

    /// Players to wait for before the game starts.
    #[arg(long, default_value_t = 2)]
    players: usize,

    /// Display name when joining.
    #[arg(short, long, default_value = "player")]
    name: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "story-chain failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), TandemError> {
    let addr = SocketAddrV4::new(cli.address, cli.port);

    if cli.server {
        if cli.players == 0 {
            return Err(TandemError::InvalidState("a game needs at least one player".into()));
        }
        return if cli.udp {
            host::run::<Datagram>(addr, cli.players, cli.rounds).await
        } else {
            host::run::<Stream>(addr, cli.players, cli.rounds).await
        };
    }

    if cli.address.is_unspecified() {
        return Err(TandemError::InvalidAddress {
            addr: addr.to_string(),
            reason: "cannot connect to 0.0.0.0".into(),
        });
    }
    if cli.udp {
        player::run::<Datagram>(addr, &cli.name).await
    } else {
        player::run::<Stream>(addr, &cli.name).await
    }
}
