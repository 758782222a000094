//! Command targets: player subsets, ban ids and ban durations, with
//! their word forms.

use std::fmt;

use bfrcon_core::{Argument, RconError};

use crate::list::WordCursor;

// ── PlayerSubset ─────────────────────────────────────────────────

/// Which players a command (or a chat message) addresses.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PlayerSubset {
    #[default]
    All,
    Team(u32),
    Squad { team: u32, squad: u32 },
    Player(String),
}

impl PlayerSubset {
    pub fn to_arguments(&self) -> Vec<Argument> {
        match self {
            Self::All => vec!["all".into()],
            Self::Team(team) => vec!["team".into(), (*team).into()],
            Self::Squad { team, squad } => vec!["squad".into(), (*team).into(), (*squad).into()],
            Self::Player(name) => vec!["player".into(), name.into()],
        }
    }

    /// Read a subset in word form, consuming only the words it needs.
    pub fn read(cursor: &mut WordCursor<'_>) -> Result<Self, RconError> {
        let kind = cursor.text()?;
        match kind.as_str() {
            "all" => Ok(Self::All),
            "team" => Ok(Self::Team(cursor.unsigned()?)),
            "squad" => Ok(Self::Squad {
                team: cursor.unsigned()?,
                squad: cursor.unsigned()?,
            }),
            "player" => Ok(Self::Player(cursor.text()?)),
            other => Err(RconError::Format(format!("unknown player subset {other:?}"))),
        }
    }
}

// ── BanId ────────────────────────────────────────────────────────

/// What a ban is keyed on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BanId {
    Name(String),
    Ip(String),
    Guid(String),
}

impl BanId {
    pub fn to_arguments(&self) -> Vec<Argument> {
        let (kind, id) = match self {
            Self::Name(id) => ("name", id),
            Self::Ip(id) => ("ip", id),
            Self::Guid(id) => ("guid", id),
        };
        vec![kind.into(), id.into()]
    }

    pub(crate) fn read(cursor: &mut WordCursor<'_>) -> Result<Self, RconError> {
        let kind = cursor.text()?;
        let id = cursor.text()?;
        match kind.as_str() {
            "name" => Ok(Self::Name(id)),
            "ip" => Ok(Self::Ip(id)),
            "guid" => Ok(Self::Guid(id)),
            other => Err(RconError::Format(format!("unknown ban id type {other:?}"))),
        }
    }
}

impl fmt::Display for BanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(id) => write!(f, "name {id}"),
            Self::Ip(id) => write!(f, "ip {id}"),
            Self::Guid(id) => write!(f, "guid {id}"),
        }
    }
}

// ── BanTimeout ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BanTimeout {
    #[default]
    Permanent,
    Rounds(u32),
    Seconds(u32),
}

impl BanTimeout {
    pub fn to_arguments(&self) -> Vec<Argument> {
        match self {
            Self::Permanent => vec!["perm".into()],
            Self::Rounds(n) => vec!["rounds".into(), (*n).into()],
            Self::Seconds(n) => vec!["seconds".into(), (*n).into()],
        }
    }
}
