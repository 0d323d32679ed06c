//! Pattern recognition: pick the number that continues each series

use super::{clamp_score, time_bonus, Minigame, MinigameConfig, MinigameKind, MinigameResult, Phase, Session};
use rand::seq::SliceRandom;
use rand::Rng;

const SHOWN_TERMS: usize = 4;
const OPTIONS: usize = 4;
const MAX_QUESTIONS: usize = 20;

#[derive(Debug, Clone, PartialEq)]
struct Question {
    terms: Vec<i64>,
    options: Vec<i64>,
    answer: usize,
}

#[derive(Debug, Clone)]
pub struct PatternRecognition {
    session: Session,
    questions: Vec<Question>,
    current: usize,
    correct: u32,
    wrong: u32,
}

impl PatternRecognition {
    pub fn new<R: Rng + ?Sized>(config: &MinigameConfig, rng: &mut R) -> Self {
        let count = config
            .setting_usize("questions")
            .unwrap_or(config.difficulty.pick(4, 5, 6))
            .clamp(1, MAX_QUESTIONS);
        let max_step = config.difficulty.pick(5, 9, 15);
        let questions = (0..count).map(|_| question(rng, max_step)).collect();
        Self {
            session: Session::new(config.time_limit_ms(), 0),
            questions,
            current: 0,
            correct: 0,
            wrong: 0,
        }
    }

    /// Terms of the current series
    pub fn prompt(&self) -> Option<&[i64]> {
        self.questions.get(self.current).map(|q| q.terms.as_slice())
    }

    pub fn options(&self) -> Option<&[i64]> {
        self.questions.get(self.current).map(|q| q.options.as_slice())
    }

    /// Answer the current question with an option index
    pub fn answer(&mut self, option: usize, now_ms: u64) -> Option<bool> {
        if !self.session.accepts_input(now_ms) {
            return None;
        }
        let question = self.questions.get(self.current)?;
        if option >= question.options.len() {
            return None;
        }
        let right = option == question.answer;
        if right {
            self.correct += 1;
        } else {
            self.wrong += 1;
        }
        self.current += 1;
        if self.current == self.questions.len() {
            self.session.complete(now_ms);
        }
        Some(right)
    }
}

/// One series: arithmetic, geometric or alternating steps
fn question<R: Rng + ?Sized>(rng: &mut R, max_step: i64) -> Question {
    let mut series = Vec::with_capacity(SHOWN_TERMS + 1);
    match rng.gen_range(0..3) {
        0 => {
            let (start, step) = (rng.gen_range(1..=10), rng.gen_range(1..=max_step));
            series.extend((0..=SHOWN_TERMS as i64).map(|k| start + step * k));
        }
        1 => {
            let (start, ratio): (i64, i64) = (rng.gen_range(1..=5), rng.gen_range(2..=3));
            series.extend((0..=SHOWN_TERMS as u32).map(|k| start * ratio.pow(k)));
        }
        _ => {
            let (a, b) = (rng.gen_range(1..=max_step), rng.gen_range(1..=max_step));
            let mut value = rng.gen_range(1..=10);
            for k in 0..=SHOWN_TERMS {
                series.push(value);
                value += if k % 2 == 0 { a } else { b };
            }
        }
    }
    let answer_value = series[SHOWN_TERMS];
    series.truncate(SHOWN_TERMS);

    let mut offsets: Vec<i64> = vec![-3, -2, -1, 1, 2, 3, max_step, -max_step];
    offsets.shuffle(rng);
    let mut options = vec![answer_value];
    for offset in offsets {
        let candidate = answer_value + offset;
        if options.len() == OPTIONS {
            break;
        }
        if !options.contains(&candidate) {
            options.push(candidate);
        }
    }
    options.shuffle(rng);
    let answer = options.iter().position(|v| *v == answer_value).unwrap_or(0);

    Question {
        terms: series,
        options,
        answer,
    }
}

impl Minigame for PatternRecognition {
    fn kind(&self) -> MinigameKind {
        MinigameKind::PatternRecognition
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
        let raw = i64::from(self.correct) * 100 - i64::from(self.wrong) * 50 + time_bonus(&self.session, 2);
        let total = self.questions.len() as u32;
        Some(MinigameResult {
            kind: self.kind(),
            score: clamp_score(raw),
            success: self.correct * 10 >= total * 7,
            duration_ms: self.session.duration_ms(),
        })
    }

    fn autoplay(&mut self, now_ms: u64) -> u64 {
        if self.session.phase() == Phase::Ready {
            return now_ms;
        }
        let mut t = now_ms;
        while let Some(answer) = self.questions.get(self.current).map(|q| q.answer) {
            if self.session.is_complete() {
                break;
            }
            if self.answer(answer, t).is_none() {
                break;
            }
            t += 2000;
        }
        t
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_questions_have_distinct_options_with_answer() {
        let mut rng = StdRng::seed_from_u64(21);
        for _ in 0..50 {
            let q = question(&mut rng, 9);
            assert_eq!(q.terms.len(), SHOWN_TERMS);
            assert_eq!(q.options.len(), OPTIONS);
            let mut sorted = q.options.clone();
            sorted.sort_unstable();
            sorted.dedup();
            assert_eq!(sorted.len(), OPTIONS);
        }
    }

    #[test]
    fn test_wrong_answers_fail_below_threshold() {
        let mut config = MinigameConfig::new(MinigameKind::PatternRecognition);
        config.settings = serde_json::json!({ "questions": 4 });
        let mut game = PatternRecognition::new(&config, &mut StdRng::seed_from_u64(4));
        game.start(0);

        for i in 0..4 {
            let answer = game.questions[game.current].answer;
            let pick = if i < 2 { answer } else { (answer + 1) % OPTIONS };
            game.answer(pick, 100 * i as u64);
        }
        let result = game.result().unwrap();
        assert!(!result.success);
        assert_eq!(result.score, 200 - 100);
        assert!(game.prompt().is_none());
    }

    #[test]
    fn test_question_count_is_capped() {
        let mut config = MinigameConfig::new(MinigameKind::PatternRecognition);
        config.settings = serde_json::json!({ "questions": 1_000_000_000u64 });
        let game = PatternRecognition::new(&config, &mut StdRng::seed_from_u64(1));
        assert_eq!(game.questions.len(), MAX_QUESTIONS);
    }
}
