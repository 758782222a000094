//! Decoding of structured response words.
//!
//! Player listings arrive as a self-describing table:
//!
//! ```text
//! <column count N> <column name>*N <row count M> <value>*(N*M)
//! ```
//!
//! Columns are matched against [`PLAYER_FIELDS`] by name, so servers that
//! add, drop or reorder columns still decode. Unknown columns land in
//! [`Player::extra`].

use std::collections::BTreeMap;

use bfrcon_core::{RconError, Word};

// ── WordCursor ───────────────────────────────────────────────────

/// Sequential reader over response words. Running out is a format error.
#[derive(Debug, Clone)]
pub struct WordCursor<'a> {
    words: &'a [Word],
    position: usize,
}

impl<'a> WordCursor<'a> {
    pub fn new(words: &'a [Word]) -> Self {
        Self { words, position: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.words.len() - self.position
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn peek(&self) -> Option<&'a Word> {
        self.words.get(self.position)
    }

    pub fn next_word(&mut self) -> Result<&'a Word, RconError> {
        let word = self.words.get(self.position).ok_or_else(|| {
            RconError::Format(format!("expected a word at position {}", self.position))
        })?;
        self.position += 1;
        Ok(word)
    }

    pub fn text(&mut self) -> Result<String, RconError> {
        Ok(self.next_word()?.to_text().into_owned())
    }

    /// A number; `NaN` when the word does not parse.
    pub fn number(&mut self) -> Result<f64, RconError> {
        Ok(self.next_word()?.to_number())
    }

    pub fn integer(&mut self) -> Result<i64, RconError> {
        let word = self.next_word()?;
        let n = word.to_number();
        if n.is_finite() {
            Ok(n as i64)
        } else {
            Err(RconError::Format(format!("expected a number, got {word:?}")))
        }
    }

    pub fn unsigned(&mut self) -> Result<u32, RconError> {
        let n = self.integer()?;
        u32::try_from(n).map_err(|_| RconError::Format(format!("{n} is out of range")))
    }

    pub fn boolean(&mut self) -> Result<bool, RconError> {
        Ok(self.next_word()?.to_boolean())
    }

    /// Whether the next word parses as a number.
    pub fn at_number(&self) -> bool {
        self.peek().is_some_and(|w| !w.to_number().is_nan())
    }

    /// Everything not yet read, as text.
    pub fn rest(&mut self) -> Vec<String> {
        let rest = self.words[self.position..]
            .iter()
            .map(|w| w.to_text().into_owned())
            .collect();
        self.position = self.words.len();
        rest
    }
}

// ── Player table ─────────────────────────────────────────────────

/// One row of a player listing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Player {
    pub name: String,
    /// Zeroed out in `admin.listPlayers all` answers to non-admins.
    pub guid: String,
    pub team_id: i64,
    pub squad_id: i64,
    pub kills: i64,
    pub deaths: i64,
    pub score: i64,
    pub rank: i64,
    pub ping: i64,
    /// From the listing if present, else learned from PunkBuster.
    pub ip: Option<String>,
    /// Venice Unleashed only.
    pub player_guid: Option<String>,
    pub spectator: bool,
    /// Columns this client does not know, by name.
    pub extra: BTreeMap<String, String>,
}

type FieldDecoder = fn(&mut Player, &Word);

/// Column name to field decoder.
pub const PLAYER_FIELDS: &[(&str, FieldDecoder)] = &[
    ("name", |p, w| p.name = w.to_text().into_owned()),
    ("guid", |p, w| p.guid = w.to_text().into_owned()),
    ("teamId", |p, w| p.team_id = whole(w)),
    ("squadId", |p, w| p.squad_id = whole(w)),
    ("kills", |p, w| p.kills = whole(w)),
    ("deaths", |p, w| p.deaths = whole(w)),
    ("score", |p, w| p.score = whole(w)),
    ("rank", |p, w| p.rank = whole(w)),
    ("ping", |p, w| p.ping = whole(w)),
    ("ip", |p, w| p.ip = Some(w.to_text().into_owned())),
    ("playerGuid", |p, w| p.player_guid = Some(w.to_text().into_owned())),
    ("spectator", |p, w| p.spectator = w.to_boolean()),
];

/// Non-numeric cells read as 0.
fn whole(word: &Word) -> i64 {
    let n = word.to_number();
    if n.is_finite() { n as i64 } else { 0 }
}

fn decoder_for(column: &str) -> Option<FieldDecoder> {
    PLAYER_FIELDS
        .iter()
        .find(|(name, _)| *name == column)
        .map(|(_, decode)| *decode)
}

/// Read the column header and rows of a table.
pub fn read_table(cursor: &mut WordCursor<'_>) -> Result<(Vec<String>, Vec<Vec<Word>>), RconError> {
    let columns = cursor.unsigned()? as usize;
    let names = (0..columns)
        .map(|_| cursor.text())
        .collect::<Result<Vec<_>, _>>()?;
    let rows = cursor.unsigned()? as usize;
    if columns == 0 && rows > 0 {
        return Err(RconError::Format(format!("{rows} rows without columns")));
    }
    if cursor.remaining() < columns * rows {
        return Err(RconError::Format(format!(
            "table declares {rows} rows of {columns} columns but only {} words follow",
            cursor.remaining()
        )));
    }
    let cells = (0..rows)
        .map(|_| {
            (0..columns)
                .map(|_| cursor.next_word().cloned())
                .collect::<Result<Vec<_>, _>>()
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok((names, cells))
}

/// Decode a player info block from the cursor.
pub fn read_players(cursor: &mut WordCursor<'_>) -> Result<Vec<Player>, RconError> {
    let (names, rows) = read_table(cursor)?;
    let decoders: Vec<_> = names.iter().map(|n| decoder_for(n)).collect();

    Ok(rows
        .iter()
        .map(|row| {
            let mut player = Player::default();
            for ((name, decode), cell) in names.iter().zip(&decoders).zip(row) {
                match decode {
                    Some(decode) => decode(&mut player, cell),
                    None => {
                        player.extra.insert(name.clone(), cell.to_text().into_owned());
                    }
                }
            }
            player
        })
        .collect())
}

pub fn parse_players(words: &[Word]) -> Result<Vec<Player>, RconError> {
    read_players(&mut WordCursor::new(words))
}

// ── Scores ───────────────────────────────────────────────────────

/// Ticket counts per team and the score that ends the round.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TeamScores {
    pub scores: Vec<f64>,
    pub target_score: f64,
}

/// `<team count N> <score>*N <target>`. Both parts are skipped when the
/// next word is not numeric.
pub fn read_scores(cursor: &mut WordCursor<'_>) -> Result<TeamScores, RconError> {
    let mut out = TeamScores::default();
    if cursor.at_number() {
        let teams = cursor.unsigned()?;
        out.scores = (0..teams)
            .map(|_| cursor.number())
            .collect::<Result<_, _>>()?;
    }
    if cursor.at_number() {
        out.target_score = cursor.number()?;
    }
    Ok(out)
}

// ── Tests ────────────────────────────────────────────────────────
