use super::Phase;

/// Phase and clock bookkeeping shared by every minigame
///
/// The time limit runs from `start`, study time included.
#[derive(Debug, Clone)]
pub struct Session {
    phase: Phase,
    started_ms: u64,
    study_until_ms: u64,
    study_ms: u64,
    limit_ms: Option<u64>,
    ended_ms: Option<u64>,
    timed_out: bool,
}

impl Session {
    pub fn new(limit_ms: Option<u64>, study_ms: u64) -> Self {
        Self {
            phase: Phase::Ready,
            started_ms: 0,
            study_until_ms: 0,
            study_ms,
            limit_ms,
            ended_ms: None,
            timed_out: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn start(&mut self, now_ms: u64) {
        if self.phase != Phase::Ready {
            return;
        }
        self.started_ms = now_ms;
        self.study_until_ms = now_ms + self.study_ms;
        self.phase = if self.study_ms > 0 { Phase::Studying } else { Phase::Playing };
    }

    /// Show new material before accepting more input
    pub fn restudy(&mut self, now_ms: u64, study_ms: u64) {
        if matches!(self.phase, Phase::Playing | Phase::Studying) {
            self.study_until_ms = now_ms + study_ms;
            self.phase = Phase::Studying;
        }
    }

    pub fn tick(&mut self, now_ms: u64) {
        if let Some(limit) = self.limit_ms {
            let deadline = self.started_ms + limit;
            if matches!(self.phase, Phase::Studying | Phase::Playing) && now_ms >= deadline {
                self.timed_out = true;
                self.complete(deadline);
                return;
            }
        }
        if self.phase == Phase::Studying && now_ms >= self.study_until_ms {
            self.phase = Phase::Playing;
        }
    }

    /// Advance the clock, then report whether input is accepted
    pub fn accepts_input(&mut self, now_ms: u64) -> bool {
        self.tick(now_ms);
        self.phase == Phase::Playing
    }

    pub fn complete(&mut self, now_ms: u64) {
        if self.phase != Phase::Complete {
            self.phase = Phase::Complete;
            self.ended_ms = Some(now_ms.max(self.started_ms));
        }
    }

    pub fn is_complete(&self) -> bool {
        self.phase == Phase::Complete
    }

    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    /// First moment input is accepted in the current round
    pub fn study_until(&self) -> u64 {
        self.study_until_ms
    }

    pub fn duration_ms(&self) -> u64 {
        self.ended_ms.unwrap_or(self.started_ms) - self.started_ms
    }

    /// Time left on the clock when the game ended, if there is a limit
    pub fn remaining_ms(&self) -> Option<u64> {
        self.limit_ms.map(|limit| limit.saturating_sub(self.duration_ms()))
    }
}
