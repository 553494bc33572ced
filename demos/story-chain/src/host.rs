//! Server side of the game: lobby, turns, and the final story.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddrV4;
use std::time::Duration;

use rand::seq::IndexedRandom;
use tandem::prelude::*;

use crate::message::{Message, Tag};

const LOBBY_POLL: Duration = Duration::from_millis(50);

/// How long a newcomer has to send their name.
const NAME_TIMEOUT: Duration = Duration::from_secs(30);

const SEED_WORDS: &[&str] = &[
    "lantern", "harbor", "clockwork", "meadow", "comet", "violin", "glacier", "orchard",
];

/// Keeps players in the order they connected.
#[derive(Debug, Default)]
pub struct Lobby {
    order: Vec<ClientId>,
}

impl Lobby {
    pub fn order(&self) -> &[ClientId] {
        &self.order
    }
}

impl ClientEvents for Lobby {
    fn on_connect(&mut self, id: ClientId, peer: SocketAddrV4) {
        tracing::info!(%id, %peer, "player connected");
        self.order.push(id);
    }

    fn on_disconnect(&mut self, id: ClientId) {
        tracing::info!(%id, "player left");
        self.order.retain(|p| *p != id);
    }
}

pub async fn run<T: Transport>(
    bind: SocketAddrV4,
    players: usize,
    rounds: u32,
) -> Result<(), TandemError> {
    let mut server = Server::<T>::builder()
        .bind(&bind.to_string())
        .events(Lobby::default())
        .build()
        .await?;
    server.start_accepting()?;
    println!(
        "Waiting for {players} players on {} ({})",
        server.local_addr(),
        T::KIND
    );

    let names = gather_players(&mut server, players).await?;
    server.stop_accepting()?;

    let story = play(&mut server, &names, rounds).await;
    println!("\n{story}");

    for id in server.client_ids() {
        if let Err(e) = server.send_to(id, &Message::new(Tag::Story, story.as_str())).await {
            tracing::warn!(%id, error = %e, "could not deliver the story");
        }
    }
    Ok(())
}

/// Admits players until `players` of them have named themselves.
async fn gather_players<T: Transport>(
    server: &mut Server<T, Lobby>,
    players: usize,
) -> Result<HashMap<ClientId, String>, TandemError> {
    let mut names = HashMap::new();

    while names.len() < players {
        if server.check_new_connections() == 0 {
            server.remove_dead();
            tokio::time::sleep(LOBBY_POLL).await;
            continue;
        }

        let newcomers: Vec<ClientId> = server
            .client_ids()
            .into_iter()
            .filter(|id| !names.contains_key(id))
            .collect();

        for id in newcomers {
            match admit(server, id, NAME_TIMEOUT).await {
                Ok(name) => {
                    println!("{name} joined");
                    names.insert(id, name);
                }
                Err(e) => {
                    tracing::warn!(%id, error = %e, "dropping player without a name");
                    server.remove(id);
                }
            }
        }
        server.remove_dead();
        names.retain(|id, _| server.is_alive(*id));
    }
    Ok(names)
}

/// Reads a newcomer's name and welcomes them. Any failure, including a
/// silent player, means the caller should drop them.
async fn admit<T: Transport>(
    server: &mut Server<T, Lobby>,
    id: ClientId,
    limit: Duration,
) -> Result<String, TandemError> {
    let message: Message = tokio::time::timeout(limit, server.receive_from(id))
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "no name received"))??;

    if message.tag != Tag::Name {
        return Err(TandemError::InvalidState(format!(
            "expected a name, got {:?}",
            message.tag
        )));
    }

    let welcome = format!("Welcome, {}! Waiting for the others.", message.body);
    server.send_to(id, &Message::new(Tag::Welcome, welcome)).await?;
    Ok(message.body)
}

/// Runs `rounds` rounds of turns and returns the assembled story.
async fn play<T: Transport>(
    server: &mut Server<T, Lobby>,
    names: &HashMap<ClientId, String>,
    rounds: u32,
) -> String {
    let seed = SEED_WORDS
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or("once");
    let mut words = vec![seed.to_string()];

    'rounds: for round in 1..=rounds {
        let order = server.registry().events().order().to_vec();
        if order.is_empty() {
            tracing::info!("every player left, ending early");
            break 'rounds;
        }

        for id in order {
            let previous = words.last().cloned().unwrap_or_default();
            match take_turn(server, id, &previous).await {
                Ok(word) => {
                    let name = names.get(&id).map(String::as_str).unwrap_or("?");
                    println!("[round {round}] {name}: {word}");
                    words.push(word);
                }
                Err(e) => tracing::warn!(%id, error = %e, "turn skipped"),
            }
            server.remove_dead();
        }
    }

    words.join(" ")
}

async fn take_turn<T: Transport>(
    server: &mut Server<T, Lobby>,
    id: ClientId,
    previous: &str,
) -> Result<String, TandemError> {
    server.send_to(id, &Message::new(Tag::Turn, previous)).await?;
    let reply: Message = server.receive_from(id).await?;
    match reply.tag {
        Tag::Word => Ok(reply.body.trim().to_string()),
        other => Err(TandemError::InvalidState(format!(
            "expected a word, got {other:?}"
        ))),
    }
}
