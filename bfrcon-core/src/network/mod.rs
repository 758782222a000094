//! Socket ownership and request dispatch.

mod connection;

pub use connection::{EventHandler, Lifecycle, Rcon};
