//! Clue minigames
//!
//! Each game is a closed state machine `Ready -> (Studying) -> Playing ->
//! Complete` driven by caller-supplied millisecond timestamps, so a run is
//! fully reproducible from its seed and input script. On completion a game
//! yields a [`MinigameResult`]; the [`MinigameCoordinator`] turns that into a
//! recorded attempt and the next storylet.

mod coordinator;
mod logic;
mod memory;
mod pattern;
mod reaction;
mod sequence;
mod session;
mod word_search;

pub use coordinator::MinigameCoordinator;
pub use logic::LogicPuzzle;
pub use memory::{FlipOutcome, MemoryMatch};
pub use pattern::PatternRecognition;
pub use reaction::{ReactionOutcome, ReactionTime};
pub use sequence::SequenceRecall;
pub use session::Session;
pub use word_search::WordSearch;

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MinigameKind {
    MemoryMatch,
    LogicPuzzle,
    WordSearch,
    ReactionTime,
    SequenceRecall,
    PatternRecognition,
}

impl MinigameKind {
    pub const ALL: [MinigameKind; 6] = [
        MinigameKind::MemoryMatch,
        MinigameKind::LogicPuzzle,
        MinigameKind::WordSearch,
        MinigameKind::ReactionTime,
        MinigameKind::SequenceRecall,
        MinigameKind::PatternRecognition,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MinigameKind::MemoryMatch => "memory_match",
            MinigameKind::LogicPuzzle => "logic_puzzle",
            MinigameKind::WordSearch => "word_search",
            MinigameKind::ReactionTime => "reaction_time",
            MinigameKind::SequenceRecall => "sequence_recall",
            MinigameKind::PatternRecognition => "pattern_recognition",
        }
    }
}

impl fmt::Display for MinigameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MinigameKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == normalized)
            .ok_or_else(|| format!("unknown minigame '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    /// Pick the value for this difficulty
    pub fn pick<T>(self, easy: T, medium: T, hard: T) -> T {
        match self {
            Difficulty::Easy => easy,
            Difficulty::Medium => medium,
            Difficulty::Hard => hard,
        }
    }
}

/// How a minigame is set up for a clue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinigameConfig {
    pub kind: MinigameKind,
    #[serde(default)]
    pub time_limit_secs: Option<u32>,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub success_storylet_id: Option<String>,
    #[serde(default)]
    pub failure_storylet_id: Option<String>,
    /// Kind-specific knobs (`pairs`, `size`, `words`, `rounds`, ...)
    #[serde(default)]
    pub settings: serde_json::Value,
}

impl MinigameConfig {
    pub fn new(kind: MinigameKind) -> Self {
        Self {
            kind,
            time_limit_secs: None,
            difficulty: Difficulty::default(),
            success_storylet_id: None,
            failure_storylet_id: None,
            settings: serde_json::Value::Null,
        }
    }

    pub fn time_limit_ms(&self) -> Option<u64> {
        self.time_limit_secs.map(|s| u64::from(s) * 1000)
    }

    pub fn setting_usize(&self, key: &str) -> Option<usize> {
        self.settings.get(key)?.as_u64().map(|v| v as usize)
    }

    pub fn setting_strings(&self, key: &str) -> Option<Vec<String>> {
        let values = self.settings.get(key)?.as_array()?;
        Some(values.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Ready,
    /// Material is shown before input is accepted
    Studying,
    Playing,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinigameResult {
    pub kind: MinigameKind,
    pub score: u32,
    pub success: bool,
    pub duration_ms: u64,
}

/// Common surface of every minigame
pub trait Minigame {
    fn kind(&self) -> MinigameKind;

    fn phase(&self) -> Phase;

    /// Leave `Ready`
    fn start(&mut self, now_ms: u64);

    /// Advance timers: end the study period, expire the time limit
    fn tick(&mut self, now_ms: u64);

    /// Available once the phase is `Complete`
    fn result(&self) -> Option<MinigameResult>;

    /// Scripted player: perform the winning moves starting at `now_ms`,
    /// returning the timestamp after the last move. Before `start` it makes
    /// no moves and returns `now_ms`; it stops at the first move the game
    /// does not accept.
    fn autoplay(&mut self, now_ms: u64) -> u64;
}

/// Clamp a signed score to the non-negative range
pub(crate) fn clamp_score(raw: i64) -> u32 {
    raw.clamp(0, i64::from(u32::MAX)) as u32
}

/// Bonus points for each whole second left on the clock
pub(crate) fn time_bonus(session: &Session, per_second: i64) -> i64 {
    session
        .remaining_ms()
        .map(|ms| (ms / 1000) as i64 * per_second)
        .unwrap_or(0)
}

/// Build the game described by `config`
pub fn build<R: Rng + ?Sized>(config: &MinigameConfig, rng: &mut R) -> Box<dyn Minigame> {
    match config.kind {
        MinigameKind::MemoryMatch => Box::new(MemoryMatch::new(config, rng)),
        MinigameKind::LogicPuzzle => Box::new(LogicPuzzle::new(config, rng)),
        MinigameKind::WordSearch => Box::new(WordSearch::new(config, rng)),
        MinigameKind::ReactionTime => Box::new(ReactionTime::new(config, rng)),
        MinigameKind::SequenceRecall => Box::new(SequenceRecall::new(config, rng)),
        MinigameKind::PatternRecognition => Box::new(PatternRecognition::new(config, rng)),
    }
}
