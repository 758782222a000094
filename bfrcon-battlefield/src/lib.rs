//! # bfrcon-battlefield
//!
//! Battlefield 3 / Venice Unleashed admin client built on `bfrcon-core`.
//!
//! - **Client**: `Battlefield`, hashed login on connect, reconnect and the
//!   typed admin command set
//! - **Events**: `GameEvent`, decoded from unsolicited server frames
//! - **Decoding**: `WordCursor` and the player table reader
//! - **Config**: `BattlefieldConfig`, the transport config plus login,
//!   reconnect and event settings

pub mod battlefield;
pub mod config;
pub mod error;
pub mod events;
pub mod info;
pub mod list;
pub mod subset;
pub mod variables;

// ── Re-exports ───────────────────────────────────────────────────

pub use battlefield::{Battlefield, password_hash};
pub use config::{AuthConfig, BattlefieldConfig, EventsConfig, ReconnectConfig};
pub use error::{BattlefieldError, Result};
pub use events::{AddressCache, GameEvent};
pub use info::{
    BanEntry, Game, MapEntry, MapIndices, Rounds, ServerInfo, ServerVersion,
};
pub use list::{PLAYER_FIELDS, Player, TeamScores, WordCursor};
pub use subset::{BanId, BanTimeout, PlayerSubset};
pub use variables::Variables;

pub use bfrcon_core::{Lifecycle, RconConfig, RconError};
