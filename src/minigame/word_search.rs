//! Word search: find hidden words in a letter grid

use super::{clamp_score, time_bonus, Difficulty, Minigame, MinigameConfig, MinigameKind, MinigameResult, Phase, Session};
use rand::seq::SliceRandom;
use rand::Rng;

const DEFAULT_WORDS: [&str; 8] = ["CLUE", "KNIFE", "LEDGER", "WITNESS", "ALIBI", "MOTIVE", "HARBOR", "LANTERN"];
const PLACEMENT_TRIES: usize = 200;

type Cell = (usize, usize);

#[derive(Debug, Clone)]
struct PlacedWord {
    word: String,
    start: Cell,
    end: Cell,
}

#[derive(Debug, Clone)]
pub struct WordSearch {
    session: Session,
    grid: Vec<Vec<char>>,
    words: Vec<PlacedWord>,
    found: Vec<bool>,
    misses: u32,
}

impl WordSearch {
    pub fn new<R: Rng + ?Sized>(config: &MinigameConfig, rng: &mut R) -> Self {
        let size = config
            .setting_usize("size")
            .unwrap_or(config.difficulty.pick(8, 10, 12))
            .clamp(4, 20);
        let count = config.difficulty.pick(4, 5, 6);

        let mut candidates: Vec<String> = config
            .setting_strings("words")
            .unwrap_or_default()
            .into_iter()
            .map(|w| w.trim().to_uppercase())
            .filter(|w| w.len() >= 2 && w.len() <= size && w.chars().all(|c| c.is_ascii_alphabetic()))
            .collect();
        if candidates.is_empty() {
            let mut defaults: Vec<String> = DEFAULT_WORDS
                .iter()
                .filter(|w| w.len() <= size)
                .map(|w| w.to_string())
                .collect();
            defaults.shuffle(rng);
            defaults.truncate(count);
            candidates = defaults;
        }

        let directions = directions(config.difficulty);
        let mut grid = vec![vec![' '; size]; size];
        let mut words = Vec::new();
        for word in candidates {
            match place(&mut grid, &word, &directions, rng) {
                Some((start, end)) => words.push(PlacedWord { word, start, end }),
                None => tracing::debug!(word = %word, "could not place word, dropping it"),
            }
        }
        for cell in grid.iter_mut().flatten() {
            if *cell == ' ' {
                *cell = rng.gen_range(b'A'..=b'Z') as char;
            }
        }

        Self {
            session: Session::new(config.time_limit_ms(), 0),
            found: vec![false; words.len()],
            grid,
            words,
            misses: 0,
        }
    }

    pub fn grid(&self) -> &[Vec<char>] {
        &self.grid
    }

    pub fn words(&self) -> Vec<&str> {
        self.words.iter().map(|w| w.word.as_str()).collect()
    }

    pub fn found_count(&self) -> usize {
        self.found.iter().filter(|f| **f).count()
    }

    /// Select a straight run of cells. Returns the word found, if any.
    pub fn select(&mut self, start: Cell, end: Cell, now_ms: u64) -> Option<String> {
        if !self.session.accepts_input(now_ms) {
            return None;
        }
        let letters = self.read_line(start, end);
        let hit = letters.as_deref().and_then(|letters| {
            let reversed: String = letters.chars().rev().collect();
            self.words
                .iter()
                .enumerate()
                .find(|(i, w)| !self.found[*i] && (w.word == letters || w.word == reversed))
                .map(|(i, _)| i)
        });
        match hit {
            Some(index) => {
                self.found[index] = true;
                if self.found.iter().all(|f| *f) {
                    self.session.complete(now_ms);
                }
                Some(self.words[index].word.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Letters along a horizontal, vertical or diagonal line
    fn read_line(&self, start: Cell, end: Cell) -> Option<String> {
        let size = self.grid.len();
        if start.0 >= size || start.1 >= size || end.0 >= size || end.1 >= size {
            return None;
        }
        let dr = end.0 as isize - start.0 as isize;
        let dc = end.1 as isize - start.1 as isize;
        if dr != 0 && dc != 0 && dr.abs() != dc.abs() {
            return None;
        }
        let steps = dr.abs().max(dc.abs());
        let (sr, sc) = (dr.signum(), dc.signum());
        Some(
            (0..=steps)
                .map(|k| {
                    let r = (start.0 as isize + sr * k) as usize;
                    let c = (start.1 as isize + sc * k) as usize;
                    self.grid[r][c]
                })
                .collect(),
        )
    }
}

fn directions(difficulty: Difficulty) -> Vec<(isize, isize)> {
    let mut dirs = vec![(0, 1), (1, 0)];
    if difficulty != Difficulty::Easy {
        dirs.push((1, 1));
    }
    if difficulty == Difficulty::Hard {
        dirs.extend([(0, -1), (-1, 0), (-1, 1)]);
    }
    dirs
}

/// Place `word` at a random spot where it fits; overlaps must agree
fn place<R: Rng + ?Sized>(
    grid: &mut [Vec<char>],
    word: &str,
    directions: &[(isize, isize)],
    rng: &mut R,
) -> Option<(Cell, Cell)> {
    let size = grid.len() as isize;
    let len = word.len() as isize;
    let letters: Vec<char> = word.chars().collect();

    for _ in 0..PLACEMENT_TRIES {
        let &(dr, dc) = directions.choose(rng)?;
        let r0 = rng.gen_range(0..size);
        let c0 = rng.gen_range(0..size);
        let (r1, c1) = (r0 + dr * (len - 1), c0 + dc * (len - 1));
        if !(0..size).contains(&r1) || !(0..size).contains(&c1) {
            continue;
        }
        let cells: Vec<Cell> = (0..len)
            .map(|k| ((r0 + dr * k) as usize, (c0 + dc * k) as usize))
            .collect();
        let fits = cells
            .iter()
            .zip(&letters)
            .all(|(&(r, c), &ch)| grid[r][c] == ' ' || grid[r][c] == ch);
        if !fits {
            continue;
        }
        for (&(r, c), &ch) in cells.iter().zip(&letters) {
            grid[r][c] = ch;
        }
        return Some(((r0 as usize, c0 as usize), (r1 as usize, c1 as usize)));
    }
    None
}

impl Minigame for WordSearch {
    fn kind(&self) -> MinigameKind {
        MinigameKind::WordSearch
    }

    fn phase(&self) -> Phase {
        self.session.phase()
    }

    fn start(&mut self, now_ms: u64) {
        self.session.start(now_ms);
        if self.words.is_empty() {
            self.session.complete(now_ms);
        }
    }

    fn tick(&mut self, now_ms: u64) {
        self.session.tick(now_ms);
    }

    fn result(&self) -> Option<MinigameResult> {
        if !self.session.is_complete() {
            return None;
        }
        let raw = self.found_count() as i64 * 100 - i64::from(self.misses) * 10 + time_bonus(&self.session, 2);
        Some(MinigameResult {
            kind: self.kind(),
            score: clamp_score(raw),
            success: !self.words.is_empty() && self.found.iter().all(|f| *f),
            duration_ms: self.session.duration_ms(),
        })
    }

    fn autoplay(&mut self, now_ms: u64) -> u64 {
        if self.session.phase() == Phase::Ready {
            return now_ms;
        }
        let mut t = now_ms;
        let targets: Vec<(Cell, Cell)> = self.words.iter().map(|w| (w.start, w.end)).collect();
        for (start, end) in targets {
            self.select(start, end, t);
            t += 1500;
        }
        t
    }
}
