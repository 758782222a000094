//! Typed command results.

use bfrcon_core::{RconError, Word};

use crate::error::BattlefieldError;
use crate::list::{TeamScores, WordCursor, read_scores};
use crate::subset::{BanId, BanTimeout};

// ── Version ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Game {
    Bf3,
    VeniceUnleashed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerVersion {
    pub game: Game,
    pub build: String,
}

impl ServerVersion {
    /// From the `version` result words: `<game> <build>`.
    pub fn parse(game: &str, build: &str) -> Result<Self, BattlefieldError> {
        let game = match game {
            "BF3" => Game::Bf3,
            "VU" => Game::VeniceUnleashed,
            other => {
                return Err(BattlefieldError::UnsupportedGame {
                    game: other.to_string(),
                    build: build.to_string(),
                });
            }
        };
        Ok(Self {
            game,
            build: build.to_string(),
        })
    }
}

// ── serverInfo ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ServerInfo {
    pub name: String,
    pub players: u32,
    pub max_players: u32,
    pub mode: String,
    pub map: String,
    pub rounds_played: u32,
    pub rounds_total: u32,
    pub scores: TeamScores,
    pub online_state: String,
    pub ranked: bool,
    pub punkbuster: bool,
    pub has_password: bool,
    /// Seconds.
    pub uptime: u64,
    /// Seconds.
    pub round_time: u64,
    pub address: String,
    pub punkbuster_version: String,
    pub join_queue_enabled: bool,
    pub region: String,
    pub closest_ping_site: String,
    pub country: String,
    /// Absent on some builds; `false` then.
    pub matchmaking: bool,
}

pub fn parse_server_info(words: &[Word]) -> Result<ServerInfo, RconError> {
    let c = &mut WordCursor::new(words);
    Ok(ServerInfo {
        name: c.text()?,
        players: c.unsigned()?,
        max_players: c.unsigned()?,
        mode: c.text()?,
        map: c.text()?,
        rounds_played: c.unsigned()?,
        rounds_total: c.unsigned()?,
        scores: read_scores(c)?,
        online_state: c.text()?,
        ranked: c.boolean()?,
        punkbuster: c.boolean()?,
        has_password: c.boolean()?,
        uptime: c.integer()?.max(0) as u64,
        round_time: c.integer()?.max(0) as u64,
        address: c.text()?,
        punkbuster_version: c.text()?,
        join_queue_enabled: c.boolean()?,
        region: c.text()?,
        closest_ping_site: c.text()?,
        country: c.text()?,
        matchmaking: if c.is_empty() { false } else { c.boolean()? },
    })
}

// ── Map list ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapEntry {
    pub map: String,
    pub mode: String,
    pub rounds: u32,
    /// Position in the server's map list.
    pub index: u32,
}

/// `<map count> <words per map> (<map> <mode> <rounds> ...)*`
pub fn parse_maps(words: &[Word], offset: u32) -> Result<Vec<MapEntry>, RconError> {
    let c = &mut WordCursor::new(words);
    let count = c.unsigned()?;
    let per_entry = c.unsigned()? as usize;
    if per_entry < 3 {
        return Err(RconError::Format(format!(
            "map entries need 3 words, server sends {per_entry}"
        )));
    }
    (0..count)
        .map(|i| -> Result<MapEntry, RconError> {
            let entry = MapEntry {
                map: c.text()?,
                mode: c.text()?,
                rounds: c.unsigned()?,
                index: offset + i,
            };
            for _ in 3..per_entry {
                c.next_word()?;
            }
            Ok(entry)
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapIndices {
    pub current: u32,
    pub next: u32,
}

/// 1-based current round and the number of rounds per map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rounds {
    pub current: u32,
    pub total: u32,
}

pub fn parse_pair(words: &[Word]) -> Result<(u32, u32), RconError> {
    let c = &mut WordCursor::new(words);
    Ok((c.unsigned()?, c.unsigned()?))
}

// ── Ban list ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BanEntry {
    pub id: BanId,
    /// What is left of the ban.
    pub timeout: BanTimeout,
    pub reason: String,
}

/// `(<id type> <id> <ban type> <seconds left> <rounds left> <reason>)*`
pub fn parse_bans(words: &[Word]) -> Result<Vec<BanEntry>, RconError> {
    let c = &mut WordCursor::new(words);
    let mut bans = Vec::new();
    while !c.is_empty() {
        let id = BanId::read(c)?;
        let kind = c.text()?;
        let seconds = c.unsigned()?;
        let rounds = c.unsigned()?;
        let timeout = match kind.as_str() {
            "perm" => BanTimeout::Permanent,
            "seconds" => BanTimeout::Seconds(seconds),
            "rounds" => BanTimeout::Rounds(rounds),
            other => return Err(RconError::Format(format!("unknown ban type {other:?}"))),
        };
        bans.push(BanEntry {
            id,
            timeout,
            reason: c.text()?,
        });
    }
    Ok(bans)
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn words(items: &[&str]) -> Vec<Word> {
        items.iter().map(|w| Word::from(*w)).collect()
    }

    #[test]
    fn version_games() {
        assert_eq!(ServerVersion::parse("BF3", "1149").unwrap().game, Game::Bf3);
        assert_eq!(
            ServerVersion::parse("VU", "18744").unwrap().game,
            Game::VeniceUnleashed
        );
        assert!(matches!(
            ServerVersion::parse("BF4", "1"),
            Err(BattlefieldError::UnsupportedGame { .. })
        ));
    }

    #[test]
    fn bf3_server_info() {
        let w = words(&[
            "My Server", "5", "64", "ConquestLarge0", "MP_001", "0", "2",
            "2", "300", "289", "0",
            "", "true", "true", "false", "4321", "120", "192.0.2.10:25200",
            "v1.885 | A1390 C2.283", "true", "EU", "ams", "DE", "false",
        ]);
        let info = parse_server_info(&w).unwrap();
        assert_eq!(info.name, "My Server");
        assert_eq!(info.players, 5);
        assert_eq!(info.max_players, 64);
        assert_eq!(info.scores.scores, [300.0, 289.0]);
        assert_eq!(info.online_state, "");
        assert!(info.ranked && info.punkbuster && !info.has_password);
        assert_eq!(info.uptime, 4321);
        assert_eq!(info.address, "192.0.2.10:25200");
        assert_eq!(info.country, "DE");
        assert!(!info.matchmaking);
    }

    #[test]
    fn server_info_without_matchmaking() {
        let w = words(&[
            "S", "0", "16", "TDM0", "MP_011", "1", "1", "0", "0", "", "false", "false", "false",
            "1", "1", "", "", "false", "", "", "",
        ]);
        assert!(!parse_server_info(&w).unwrap().matchmaking);
    }

    #[test]
    fn map_list_with_offset() {
        let w = words(&["2", "3", "MP_001", "ConquestLarge0", "2", "MP_003", "RushLarge0", "1"]);
        let maps = parse_maps(&w, 10).unwrap();
        assert_eq!(maps.len(), 2);
        assert_eq!(maps[1].map, "MP_003");
        assert_eq!(maps[1].rounds, 1);
        assert_eq!(maps[1].index, 11);
    }

    #[test]
    fn ban_list() {
        let w = words(&[
            "guid", "EA_A", "perm", "0", "0", "cheating",
            "name", "Bravo", "rounds", "0", "3", "spam",
        ]);
        let bans = parse_bans(&w).unwrap();
        assert_eq!(bans[0].id, BanId::Guid("EA_A".into()));
        assert_eq!(bans[0].timeout, BanTimeout::Permanent);
        assert_eq!(bans[1].timeout, BanTimeout::Rounds(3));
        assert_eq!(bans[1].reason, "spam");
    }

    #[test]
    fn truncated_ban_entry_is_an_error() {
        assert!(parse_bans(&words(&["guid", "EA_A", "perm"])).is_err());
    }
}
