//! Sequence recall: watch a sequence of pads, then repeat it
//!
//! Each round replays the sequence one step longer. A wrong press ends the
//! run.

use super::{clamp_score, Minigame, MinigameConfig, MinigameKind, MinigameResult, Phase, Session};
use rand::Rng;

const START_LENGTH: usize = 3;
const SHOW_MS_PER_STEP: u64 = 600;
const MAX_ROUNDS: usize = 20;

#[derive(Debug, Clone)]
pub struct SequenceRecall {
    session: Session,
    pads: u8,
    full: Vec<u8>,
    target_rounds: usize,
    rounds_done: usize,
    position: usize,
    failed: bool,
}

impl SequenceRecall {
    pub fn new<R: Rng + ?Sized>(config: &MinigameConfig, rng: &mut R) -> Self {
        let pads = config.difficulty.pick(4, 6, 9);
        let target_rounds = config
            .setting_usize("rounds")
            .unwrap_or(config.difficulty.pick(3, 5, 7))
            .clamp(1, MAX_ROUNDS);
        let full = (0..START_LENGTH + target_rounds - 1)
            .map(|_| rng.gen_range(0..pads))
            .collect();
        Self {
            session: Session::new(config.time_limit_ms(), START_LENGTH as u64 * SHOW_MS_PER_STEP),
            pads,
            full,
            target_rounds,
            rounds_done: 0,
            position: 0,
            failed: false,
        }
    }

    pub fn pads(&self) -> u8 {
        self.pads
    }

    fn current_length(&self) -> usize {
        START_LENGTH + self.rounds_done
    }

    /// The sequence on display while studying
    pub fn shown(&self) -> Option<&[u8]> {
        (self.session.phase() == Phase::Studying).then(|| &self.full[..self.current_length()])
    }

    /// Press a pad. Returns false when the press was wrong or not accepted.
    pub fn press(&mut self, pad: u8, now_ms: u64) -> bool {
        if !self.session.accepts_input(now_ms) {
            return false;
        }
        if self.full[self.position] != pad {
            self.failed = true;
            self.session.complete(now_ms);
            return false;
        }
        self.position += 1;
        if self.position == self.current_length() {
            self.rounds_done += 1;
            self.position = 0;
            if self.rounds_done == self.target_rounds {
                self.session.complete(now_ms);
            } else {
                let show = self.current_length() as u64 * SHOW_MS_PER_STEP;
                self.session.restudy(now_ms, show);
            }
        }
        true
    }
}

impl Minigame for SequenceRecall {
    fn kind(&self) -> MinigameKind {
        MinigameKind::SequenceRecall
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
        let longest = if self.rounds_done > 0 { START_LENGTH + self.rounds_done - 1 } else { 0 };
        let raw = self.rounds_done as i64 * 100 + longest as i64 * 10 - if self.failed { 50 } else { 0 };
        Some(MinigameResult {
            kind: self.kind(),
            score: clamp_score(raw),
            success: self.rounds_done == self.target_rounds,
            duration_ms: self.session.duration_ms(),
        })
    }

    fn autoplay(&mut self, now_ms: u64) -> u64 {
        if self.session.phase() == Phase::Ready {
            return now_ms;
        }
        let mut t = now_ms;
        while !self.session.is_complete() {
            t = t.max(self.session.study_until());
            let pad = self.full[self.position];
            if !self.press(pad, t) {
                break;
            }
            t += 300;
        }
        t
    }
}
