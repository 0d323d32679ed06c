//! Logic puzzle: complete a Latin square
//!
//! The board is a cyclic Latin square with rows, columns and symbols
//! shuffled, then some cells blanked. Any completed Latin square consistent
//! with the givens is accepted, not only the generated one.

use super::{clamp_score, time_bonus, Minigame, MinigameConfig, MinigameKind, MinigameResult, Phase, Session};
use rand::seq::SliceRandom;
use rand::Rng;

#[derive(Debug, Clone)]
pub struct LogicPuzzle {
    session: Session,
    size: usize,
    solution: Vec<Vec<u8>>,
    grid: Vec<Vec<Option<u8>>>,
    givens: Vec<Vec<bool>>,
    failed_checks: u32,
    solved: bool,
}

impl LogicPuzzle {
    pub fn new<R: Rng + ?Sized>(config: &MinigameConfig, rng: &mut R) -> Self {
        let size = config
            .setting_usize("size")
            .unwrap_or(config.difficulty.pick(3, 4, 5))
            .clamp(2, 9);
        let solution = shuffled_latin_square(size, rng);

        let cells = size * size;
        let blank_ratio = config.difficulty.pick(0.4, 0.5, 0.6);
        let blanks = ((cells as f64 * blank_ratio).round() as usize).clamp(1, cells);
        let mut order: Vec<usize> = (0..cells).collect();
        order.shuffle(rng);

        let mut grid: Vec<Vec<Option<u8>>> = solution.iter().map(|row| row.iter().map(|v| Some(*v)).collect()).collect();
        let mut givens = vec![vec![true; size]; size];
        for cell in order.into_iter().take(blanks) {
            grid[cell / size][cell % size] = None;
            givens[cell / size][cell % size] = false;
        }

        Self {
            session: Session::new(config.time_limit_ms(), 0),
            size,
            solution,
            grid,
            givens,
            failed_checks: 0,
            solved: false,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<u8> {
        self.grid.get(row)?.get(col).copied().flatten()
    }

    pub fn is_given(&self, row: usize, col: usize) -> bool {
        self.givens.get(row).and_then(|r| r.get(col)).copied().unwrap_or(false)
    }

    /// Fill or clear a non-given cell. Values run from 1 to `size`.
    pub fn set_cell(&mut self, row: usize, col: usize, value: Option<u8>, now_ms: u64) -> bool {
        if !self.session.accepts_input(now_ms) || row >= self.size || col >= self.size || self.givens[row][col] {
            return false;
        }
        if value.is_some_and(|v| v == 0 || usize::from(v) > self.size) {
            return false;
        }
        self.grid[row][col] = value;
        true
    }

    /// Submit the board. A wrong submission counts against the score.
    pub fn check(&mut self, now_ms: u64) -> bool {
        if !self.session.accepts_input(now_ms) {
            return false;
        }
        if is_latin_square(&self.grid, self.size) {
            self.solved = true;
            self.session.complete(now_ms);
            true
        } else {
            self.failed_checks += 1;
            false
        }
    }
}

fn shuffled_latin_square<R: Rng + ?Sized>(size: usize, rng: &mut R) -> Vec<Vec<u8>> {
    let mut rows: Vec<usize> = (0..size).collect();
    let mut cols: Vec<usize> = (0..size).collect();
    let mut symbols: Vec<u8> = (1..=size as u8).collect();
    rows.shuffle(rng);
    cols.shuffle(rng);
    symbols.shuffle(rng);
    rows.iter()
        .map(|r| cols.iter().map(|c| symbols[(r + c) % size]).collect())
        .collect()
}

fn is_latin_square(grid: &[Vec<Option<u8>>], size: usize) -> bool {
    let full_set = |values: &mut dyn Iterator<Item = Option<u8>>| {
        let mut seen = vec![false; size + 1];
        for value in values {
            match value {
                Some(v) if usize::from(v) >= 1 && usize::from(v) <= size && !seen[usize::from(v)] => {
                    seen[usize::from(v)] = true
                }
                _ => return false,
            }
        }
        true
    };
    (0..size).all(|i| {
        full_set(&mut grid[i].iter().copied()) && full_set(&mut grid.iter().map(|row| row[i]))
    })
}

impl Minigame for LogicPuzzle {
    fn kind(&self) -> MinigameKind {
        MinigameKind::LogicPuzzle
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
        let base = if self.solved { 300 + (self.size * self.size) as i64 * 10 } else { 0 };
        let raw = base - i64::from(self.failed_checks) * 50 + if self.solved { time_bonus(&self.session, 3) } else { 0 };
        Some(MinigameResult {
            kind: self.kind(),
            score: clamp_score(raw),
            success: self.solved,
            duration_ms: self.session.duration_ms(),
        })
    }

    fn autoplay(&mut self, now_ms: u64) -> u64 {
        if self.session.phase() == Phase::Ready {
            return now_ms;
        }
        let mut t = now_ms;
        for row in 0..self.size {
            for col in 0..self.size {
                if !self.givens[row][col] {
                    let value = self.solution[row][col];
                    self.set_cell(row, col, Some(value), t);
                    t += 250;
                }
            }
        }
        self.check(t);
        t
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn puzzle() -> LogicPuzzle {
        let config = MinigameConfig::new(MinigameKind::LogicPuzzle);
        let mut puzzle = LogicPuzzle::new(&config, &mut StdRng::seed_from_u64(3));
        puzzle.start(0);
        puzzle
    }

    #[test]
    fn test_generated_square_is_latin() {
        let mut rng = StdRng::seed_from_u64(11);
        for size in 2..=6 {
            let square = shuffled_latin_square(size, &mut rng);
            let grid: Vec<Vec<Option<u8>>> = square.iter().map(|r| r.iter().map(|v| Some(*v)).collect()).collect();
            assert!(is_latin_square(&grid, size));
        }
    }

    #[test]
    fn test_givens_are_locked() {
        let mut puzzle = puzzle();
        let (row, col) = (0..4)
            .flat_map(|r| (0..4).map(move |c| (r, c)))
            .find(|(r, c)| puzzle.is_given(*r, *c))
            .unwrap();
        assert!(!puzzle.set_cell(row, col, Some(1), 10));
        assert!(!puzzle.set_cell(9, 9, Some(1), 10));
    }

    #[test]
    fn test_wrong_check_penalized() {
        let mut puzzle = puzzle();
        assert!(!puzzle.check(100));
        puzzle.autoplay(200);
        let result = puzzle.result().unwrap();
        assert!(result.success);
        assert_eq!(result.score, 300 + 160 - 50);
    }
}
