//! Game messages: a `u16` tag followed by a `String` body.

use tandem::prelude::*;

/// What a [`Message`] means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    /// Client → server: the player's display name.
    Name,
    /// Server → client: lobby greeting.
    Welcome,
    /// Server → client: the previous word; the player must continue it.
    Turn,
    /// Client → server: the player's continuation.
    Word,
    /// Server → client: the finished story. Last message of a game.
    Story,
    /// A tag this build does not know.
    Unknown(u16),
}

impl Tag {
    pub fn code(self) -> u16 {
        match self {
            Self::Name => 1,
            Self::Welcome => 2,
            Self::Turn => 3,
            Self::Word => 4,
            Self::Story => 5,
            Self::Unknown(code) => code,
        }
    }

    pub fn from_code(code: u16) -> Self {
        match code {
            1 => Self::Name,
            2 => Self::Welcome,
            3 => Self::Turn,
            4 => Self::Word,
            5 => Self::Story,
            other => Self::Unknown(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub tag: Tag,
    pub body: String,
}

impl Message {
    pub fn new(tag: Tag, body: impl Into<String>) -> Self {
        Self {
            tag,
            body: body.into(),
        }
    }
}

impl Wire for Message {
    async fn write<T: Transport>(&self, conn: &mut Connection<T>) -> Result<(), ProtocolError> {
        self.tag.code().write(conn).await?;
        self.body.write(conn).await
    }

    async fn read<T: Transport>(conn: &mut Connection<T>) -> Result<Self, ProtocolError> {
        let tag = Tag::from_code(u16::read(conn).await?);
        let body = String::read(conn).await?;
        Ok(Self { tag, body })
    }
}
