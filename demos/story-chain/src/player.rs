//! Client side of the game: name, answer turns from stdin, print the story.

use std::net::SocketAddrV4;

use tandem::prelude::*;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::message::{Message, Tag};

pub async fn run<T: Transport>(server: SocketAddrV4, name: &str) -> Result<(), TandemError> {
    let mut client = Client::<T>::connect(server, &ClientConfig::default()).await?;
    client.send(&Message::new(Tag::Name, name)).await?;

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let message: Message = client.receive().await?;
        match message.tag {
            Tag::Welcome => println!("{}", message.body),
            Tag::Turn => {
                println!("Previous word: {}", message.body);
                println!("Your word:");
                let word = stdin.next_line().await?.unwrap_or_default();
                client.send(&Message::new(Tag::Word, word.trim())).await?;
            }
            Tag::Story => {
                println!("\nThe story so far:\n{}", message.body);
                return Ok(());
            }
            other => tracing::debug!(tag = ?other, "ignoring message"),
        }
    }
}
