//! Memory match: find every pair of face-down cards

use super::{clamp_score, time_bonus, Minigame, MinigameConfig, MinigameKind, MinigameResult, Phase, Session};
use rand::seq::SliceRandom;
use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlipOutcome {
    Ignored,
    /// First card of a pair turned up
    Revealed,
    Matched,
    /// Both cards turn back down
    Mismatched,
}

#[derive(Debug, Clone)]
pub struct MemoryMatch {
    session: Session,
    cards: Vec<u8>,
    matched: Vec<bool>,
    face_up: Option<usize>,
    pairs: usize,
    moves: u32,
    mismatches: u32,
}

impl MemoryMatch {
    pub fn new<R: Rng + ?Sized>(config: &MinigameConfig, rng: &mut R) -> Self {
        let pairs = config
            .setting_usize("pairs")
            .unwrap_or(config.difficulty.pick(4, 6, 8))
            .clamp(2, 26);
        let mut cards: Vec<u8> = (0..pairs as u8).flat_map(|p| [p, p]).collect();
        cards.shuffle(rng);
        let study_ms = config.difficulty.pick(3000, 2000, 1000);

        Self {
            session: Session::new(config.time_limit_ms(), study_ms),
            matched: vec![false; cards.len()],
            cards,
            face_up: None,
            pairs,
            moves: 0,
            mismatches: 0,
        }
    }

    pub fn cards(&self) -> &[u8] {
        &self.cards
    }

    pub fn is_matched(&self, index: usize) -> bool {
        self.matched.get(index).copied().unwrap_or(false)
    }

    pub fn moves(&self) -> u32 {
        self.moves
    }

    pub fn flip(&mut self, index: usize, now_ms: u64) -> FlipOutcome {
        if !self.session.accepts_input(now_ms) || index >= self.cards.len() || self.matched[index] {
            return FlipOutcome::Ignored;
        }
        match self.face_up.take() {
            None => {
                self.face_up = Some(index);
                FlipOutcome::Revealed
            }
            Some(first) if first == index => {
                self.face_up = Some(first);
                FlipOutcome::Ignored
            }
            Some(first) => {
                self.moves += 1;
                if self.cards[first] != self.cards[index] {
                    self.mismatches += 1;
                    return FlipOutcome::Mismatched;
                }
                self.matched[first] = true;
                self.matched[index] = true;
                if self.matched.iter().all(|m| *m) {
                    self.session.complete(now_ms);
                }
                FlipOutcome::Matched
            }
        }
    }
}

impl Minigame for MemoryMatch {
    fn kind(&self) -> MinigameKind {
        MinigameKind::MemoryMatch
    }

    fn phase(&self) -> Phase {
        self.session.phase()
    }

    fn start(&mut self, now_ms: u64) {
        self.session.start(now_ms);
    }

    fn tick(&mut self, now_ms: u64) {
        self.session.tick(now_ms);
    }

    fn result(&self) -> Option<MinigameResult> {
        if !self.session.is_complete() {
            return None;
        }
        let raw = self.pairs as i64 * 100 - i64::from(self.mismatches) * 25 + time_bonus(&self.session, 5);
        Some(MinigameResult {
            kind: self.kind(),
            score: clamp_score(raw),
            success: self.matched.iter().all(|m| *m),
            duration_ms: self.session.duration_ms(),
        })
    }

    fn autoplay(&mut self, now_ms: u64) -> u64 {
        if self.session.phase() == Phase::Ready {
            return now_ms;
        }
        let mut t = now_ms.max(self.session.study_until());
        for symbol in 0..self.pairs as u8 {
            let positions: Vec<usize> = (0..self.cards.len()).filter(|i| self.cards[*i] == symbol).collect();
            for index in positions {
                self.flip(index, t);
                t += 500;
            }
        }
        t
    }
}
