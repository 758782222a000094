//! Error types for the Battlefield client.

use bfrcon_core::RconError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BattlefieldError {
    #[error(transparent)]
    Rcon(#[from] RconError),

    /// `version` named a game this client does not speak.
    #[error("unsupported game {game:?} (build {build})")]
    UnsupportedGame { game: String, build: String },

    /// `login.hashed` returned something that is not a hex salt.
    #[error("server sent an invalid login salt: {0}")]
    InvalidSalt(#[from] hex::FromHexError),

    #[error("could not reconnect after {attempts} attempts")]
    ReconnectFailed { attempts: u32 },

    /// A server event did not have the expected shape.
    #[error("malformed {event} event: {message}")]
    Event { event: String, message: String },
}

pub type Result<T> = std::result::Result<T, BattlefieldError>;
