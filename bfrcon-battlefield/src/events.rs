//! Typed server events.
//!
//! Every unsolicited frame becomes at least one [`GameEvent`]. Names this
//! client does not know, and known events whose words do not decode,
//! arrive as [`GameEvent::Unhandled`] so nothing is silently lost.

use std::collections::HashMap;
use std::sync::{LazyLock, Mutex, MutexGuard, PoisonError};

use bfrcon_core::{RconError, Word, words_to_strings};
use regex::Regex;
use tokio::sync::broadcast;
use tracing::warn;

use crate::error::BattlefieldError;
use crate::list::{Player, TeamScores, WordCursor, read_players, read_scores};
use crate::subset::PlayerSubset;

static PB_NEW_CONNECTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"PunkBuster Server: New Connection \(slot #\d+\) (.*):(\d+) \[.*\] "(.*)" \(.*\)"#)
        .expect("Invalid PunkBuster regex")
});

#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    Chat {
        player: String,
        message: String,
        audience: PlayerSubset,
    },
    Spawn {
        player: String,
        team: u32,
    },
    Kill {
        /// `None` for deaths with no killer (falls, suicides).
        killer: Option<String>,
        victim: String,
        weapon: String,
        headshot: bool,
    },
    /// A `punkBuster.*` event; `event` is the part after the prefix.
    PunkBuster {
        event: String,
        messages: Vec<String>,
    },
    PlayerAuthenticated {
        name: String,
    },
    PlayerJoin {
        name: String,
        guid: String,
    },
    PlayerLeave {
        player: Player,
    },
    TeamChange {
        player: String,
        team: u32,
        squad: u32,
    },
    SquadChange {
        player: String,
        team: u32,
        squad: u32,
    },
    MaxPlayerCountChange {
        max_players: u32,
    },
    LevelLoaded {
        map: String,
        mode: String,
        rounds_played: u32,
        rounds_total: u32,
    },
    RoundOver {
        winner: u32,
    },
    RoundOverPlayers {
        players: Vec<Player>,
    },
    RoundOverTeamScores(TeamScores),
    Unhandled {
        event: String,
        words: Vec<String>,
    },
}

// ── PunkBuster address cache ─────────────────────────────────────

/// Player name to IP, learned from PunkBuster connection messages.
#[derive(Debug, Default)]
pub struct AddressCache {
    addresses: Mutex<HashMap<String, String>>,
}

impl AddressCache {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.addresses.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remember the addresses announced in `messages`.
    pub fn record(&self, messages: &[String]) {
        let mut addresses = self.lock();
        for message in messages {
            if let Some(caps) = PB_NEW_CONNECTION.captures(message) {
                addresses.insert(caps[3].to_string(), caps[1].to_string());
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.lock().get(name).cloned()
    }

    /// Fill in missing addresses from the cache.
    pub fn annotate(&self, players: &mut [Player]) {
        let addresses = self.lock();
        for player in players.iter_mut().filter(|p| p.ip.is_none()) {
            player.ip = addresses.get(&player.name).cloned();
        }
    }

    /// Like `annotate`, but the entries are forgotten.
    pub fn take(&self, player: &mut Player) {
        if let Some(ip) = self.lock().remove(&player.name) {
            player.ip.get_or_insert(ip);
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── Decoding ─────────────────────────────────────────────────────

fn malformed(event: &str, err: RconError) -> BattlefieldError {
    BattlefieldError::Event {
        event: event.to_string(),
        message: err.to_string(),
    }
}

/// Decode one server event. Most frames give one event; `player.onLeave`
/// gives one per listed player.
pub fn decode(
    event: &str,
    words: &[Word],
    cache: &AddressCache,
) -> Result<Vec<GameEvent>, BattlefieldError> {
    if let Some(kind) = event.strip_prefix("punkBuster.") {
        let messages = words_to_strings(words);
        cache.record(&messages);
        return Ok(vec![GameEvent::PunkBuster {
            event: kind.to_string(),
            messages,
        }]);
    }
    if event == "player.onLeave" {
        return read_leave(&mut WordCursor::new(words), cache).map_err(|e| malformed(event, e));
    }
    decode_single(event, words)
        .map(|e| vec![e])
        .map_err(|e| malformed(event, e))
}

/// `<name> <player info block>`
fn read_leave(cursor: &mut WordCursor<'_>, cache: &AddressCache) -> Result<Vec<GameEvent>, RconError> {
    cursor.text()?;
    Ok(read_players(cursor)?
        .into_iter()
        .map(|mut player| {
            cache.take(&mut player);
            GameEvent::PlayerLeave { player }
        })
        .collect())
}

fn decode_single(event: &str, words: &[Word]) -> Result<GameEvent, RconError> {
    let cursor = &mut WordCursor::new(words);
    Ok(match event {
        "player.onChat" => GameEvent::Chat {
            player: cursor.text()?,
            message: cursor.text()?,
            audience: if cursor.is_empty() {
                PlayerSubset::All
            } else {
                PlayerSubset::read(cursor)?
            },
        },
        "player.onSpawn" => GameEvent::Spawn {
            player: cursor.text()?,
            team: cursor.unsigned()?,
        },
        "player.onKill" => GameEvent::Kill {
            killer: Some(cursor.text()?).filter(|k| !k.is_empty()),
            victim: cursor.text()?,
            weapon: cursor.text()?,
            headshot: cursor.boolean()?,
        },
        "player.onJoin" => GameEvent::PlayerJoin {
            name: cursor.text()?,
            guid: cursor.text()?,
        },
        "player.onAuthenticated" => GameEvent::PlayerAuthenticated {
            name: cursor.text()?,
        },
        "player.onTeamChange" => GameEvent::TeamChange {
            player: cursor.text()?,
            team: cursor.unsigned()?,
            squad: cursor.unsigned()?,
        },
        "player.onSquadChange" => GameEvent::SquadChange {
            player: cursor.text()?,
            team: cursor.unsigned()?,
            squad: cursor.unsigned()?,
        },
        "server.onMaxPlayerCountChange" => GameEvent::MaxPlayerCountChange {
            max_players: cursor.unsigned()?,
        },
        "server.onLevelLoaded" => GameEvent::LevelLoaded {
            map: cursor.text()?,
            mode: cursor.text()?,
            rounds_played: cursor.unsigned()?,
            rounds_total: cursor.unsigned()?,
        },
        "server.onRoundOver" => GameEvent::RoundOver {
            winner: cursor.unsigned()?,
        },
        "server.onRoundOverPlayers" => GameEvent::RoundOverPlayers {
            players: read_players(cursor)?,
        },
        "server.onRoundOverTeamScores" => GameEvent::RoundOverTeamScores(read_scores(cursor)?),
        _ => GameEvent::Unhandled {
            event: event.to_string(),
            words: words_to_strings(words),
        },
    })
}

/// Decode and publish. Malformed events are logged and published as
/// `Unhandled`.
pub(crate) fn publish(
    event: &str,
    words: &[Word],
    cache: &AddressCache,
    tx: &broadcast::Sender<GameEvent>,
) {
    let events = decode(event, words, cache).unwrap_or_else(|e| {
        warn!("{e}");
        vec![GameEvent::Unhandled {
            event: event.to_string(),
            words: words_to_strings(words),
        }]
    });
    for game_event in events {
        let _ = tx.send(game_event);
    }
}

// ── Tests ────────────────────────────────────────────────────────
