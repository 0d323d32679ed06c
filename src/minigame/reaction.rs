//! Reaction time: respond as soon as the signal appears

use super::{clamp_score, Minigame, MinigameConfig, MinigameKind, MinigameResult, Phase, Session};
use rand::Rng;

const MAX_ROUNDS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionOutcome {
    Ignored,
    /// Responded before the signal; the wait restarts
    FalseStart,
    Recorded(u64),
}

#[derive(Debug, Clone)]
pub struct ReactionTime {
    session: Session,
    delays: Vec<u64>,
    round: usize,
    round_started_ms: u64,
    times: Vec<u64>,
    false_starts: u32,
    threshold_ms: u64,
}

impl ReactionTime {
    pub fn new<R: Rng + ?Sized>(config: &MinigameConfig, rng: &mut R) -> Self {
        let rounds = config
            .setting_usize("rounds")
            .unwrap_or(config.difficulty.pick(3, 5, 7))
            .clamp(1, MAX_ROUNDS);
        Self {
            session: Session::new(config.time_limit_ms(), 0),
            delays: (0..rounds).map(|_| rng.gen_range(1000..=3000)).collect(),
            round: 0,
            round_started_ms: 0,
            times: Vec::new(),
            false_starts: 0,
            threshold_ms: config.difficulty.pick(500, 400, 300),
        }
    }

    /// When the signal shows in the current round
    pub fn signal_at(&self) -> Option<u64> {
        self.delays.get(self.round).map(|d| self.round_started_ms + d)
    }

    pub fn signal_shown(&self, now_ms: u64) -> bool {
        self.session.phase() == Phase::Playing && self.signal_at().is_some_and(|at| now_ms >= at)
    }

    pub fn average_ms(&self) -> Option<u64> {
        if self.times.is_empty() {
            None
        } else {
            Some(self.times.iter().sum::<u64>() / self.times.len() as u64)
        }
    }

    pub fn react(&mut self, now_ms: u64) -> ReactionOutcome {
        if !self.session.accepts_input(now_ms) {
            return ReactionOutcome::Ignored;
        }
        let Some(signal) = self.signal_at() else {
            return ReactionOutcome::Ignored;
        };
        if now_ms < signal {
            self.false_starts += 1;
            self.round_started_ms = now_ms;
            return ReactionOutcome::FalseStart;
        }
        let reaction = now_ms - signal;
        self.times.push(reaction);
        self.round += 1;
        self.round_started_ms = now_ms;
        if self.round == self.delays.len() {
            self.session.complete(now_ms);
        }
        ReactionOutcome::Recorded(reaction)
    }
}

impl Minigame for ReactionTime {
    fn kind(&self) -> MinigameKind {
        MinigameKind::ReactionTime
    }

    fn phase(&self) -> Phase {
        self.session.phase()
    }

    fn start(&mut self, now_ms: u64) {
        self.session.start(now_ms);
        self.round_started_ms = now_ms;
    }

    fn tick(&mut self, now_ms: u64) {
        self.session.tick(now_ms);
    }

    fn result(&self) -> Option<MinigameResult> {
        if !self.session.is_complete() {
            return None;
        }
        let rounds = self.delays.len() as i64;
        let speed: i64 = self.times.iter().map(|t| (1000 - *t as i64).max(0)).sum();
        let raw = speed / rounds - i64::from(self.false_starts) * 100;
        let finished = self.times.len() == self.delays.len();
        Some(MinigameResult {
            kind: self.kind(),
            score: clamp_score(raw),
            success: finished && self.average_ms().is_some_and(|avg| avg <= self.threshold_ms),
            duration_ms: self.session.duration_ms(),
        })
    }

    fn autoplay(&mut self, now_ms: u64) -> u64 {
        if self.session.phase() == Phase::Ready {
            return now_ms;
        }
        let mut t = now_ms;
        while let Some(signal) = self.signal_at() {
            if self.session.is_complete() {
                break;
            }
            t = t.max(signal) + 200;
            if self.react(t) == ReactionOutcome::Ignored {
                break;
            }
        }
        t
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn game() -> ReactionTime {
        let mut config = MinigameConfig::new(MinigameKind::ReactionTime);
        config.settings = serde_json::json!({ "rounds": 2 });
        let mut game = ReactionTime::new(&config, &mut StdRng::seed_from_u64(9));
        game.start(0);
        game
    }

    #[test]
    fn test_false_start_restarts_wait() {
        let mut game = game();
        assert_eq!(game.react(500), ReactionOutcome::FalseStart);
        let signal = game.signal_at().unwrap();
        assert!(signal >= 1500);
        assert!(!game.signal_shown(signal - 1));
        assert!(game.signal_shown(signal));
        assert_eq!(game.react(signal + 250), ReactionOutcome::Recorded(250));
    }

    #[test]
    fn test_slow_reactions_fail() {
        let mut game = game();
        for _ in 0..2 {
            let signal = game.signal_at().unwrap();
            game.react(signal + 900);
        }
        let result = game.result().unwrap();
        assert!(!result.success);
        assert_eq!(result.score, 100);
    }

    #[test]
    fn test_false_starts_clamp_to_zero() {
        let mut game = game();
        for i in 0..10 {
            game.react(i * 10 + 1);
        }
        game.autoplay(100);
        assert_eq!(game.result().unwrap().score, 0);
    }

    #[test]
    fn test_round_count_is_capped() {
        let mut config = MinigameConfig::new(MinigameKind::ReactionTime);
        config.settings = serde_json::json!({ "rounds": 1_000_000_000u64 });
        let game = ReactionTime::new(&config, &mut StdRng::seed_from_u64(1));
        assert_eq!(game.delays.len(), MAX_ROUNDS);

        config.settings = serde_json::json!({ "rounds": 0 });
        let game = ReactionTime::new(&config, &mut StdRng::seed_from_u64(1));
        assert_eq!(game.delays.len(), 1);
    }
}
