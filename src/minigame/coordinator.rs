use super::{build, MinigameConfig, MinigameResult};
use crate::error::{Error, Result};
use crate::model::{new_id, now, MinigameAttempt};
use crate::store::{ContentBackend, ContentStore};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Turns minigame results into recorded attempts and story progress
pub struct MinigameCoordinator<'a, B: ContentBackend> {
    store: &'a mut ContentStore<B>,
}

impl<'a, B: ContentBackend> MinigameCoordinator<'a, B> {
    pub fn new(store: &'a mut ContentStore<B>) -> Self {
        Self { store }
    }

    /// Record the attempt, discover the clue on success, and return the
    /// storylet the story continues with
    pub fn complete(&mut self, clue_id: &str, config: &MinigameConfig, result: &MinigameResult) -> Result<Option<String>> {
        if self.store.clue(clue_id).is_none() {
            return Err(Error::not_found("Clue", clue_id));
        }

        self.store.record_attempt(MinigameAttempt {
            id: new_id(),
            clue_id: clue_id.to_string(),
            kind: result.kind.to_string(),
            score: result.score,
            success: result.success,
            duration_ms: result.duration_ms,
            created_at: now(),
        })?;

        if result.success {
            self.store.mark_clue_discovered(clue_id)?;
        }

        let next = if result.success {
            config.success_storylet_id.clone()
        } else {
            config.failure_storylet_id.clone()
        };
        tracing::info!(
            clue = clue_id,
            kind = %result.kind,
            score = result.score,
            success = result.success,
            next = next.as_deref().unwrap_or("-"),
            "minigame completed"
        );
        Ok(next)
    }

    /// Run the configured game with the scripted player and record it
    pub fn play_scripted(
        &mut self,
        clue_id: &str,
        config: &MinigameConfig,
        seed: u64,
    ) -> Result<(MinigameResult, Option<String>)> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut game = build(config, &mut rng);
        game.start(0);
        let end = game.autoplay(0);
        game.tick(end);

        let result = game
            .result()
            .ok_or_else(|| Error::Validation(vec![format!("{} did not finish", config.kind)]))?;
        let next = self.complete(clue_id, config, &result)?;
        Ok((result, next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::minigame::MinigameKind;
    use crate::model::Clue;
    use crate::store::MemoryBackend;

    fn store_with_clue() -> (ContentStore<MemoryBackend>, String) {
        let mut store = ContentStore::open(MemoryBackend::new()).unwrap();
        let clue = Clue::new("Torn ledger page", "");
        let id = clue.id.clone();
        store.insert_clue(clue).unwrap();
        (store, id)
    }

    fn config() -> MinigameConfig {
        MinigameConfig {
            success_storylet_id: Some("s-win".into()),
            failure_storylet_id: Some("s-lose".into()),
            ..MinigameConfig::new(MinigameKind::MemoryMatch)
        }
    }

    #[test]
    fn test_success_discovers_clue_and_continues() {
        let (mut store, clue_id) = store_with_clue();
        let (result, next) = MinigameCoordinator::new(&mut store)
            .play_scripted(&clue_id, &config(), 42)
            .unwrap();

        assert!(result.success);
        assert_eq!(next.as_deref(), Some("s-win"));
        assert!(store.clue(&clue_id).unwrap().discovered);
        let attempts = store.attempts_for(&clue_id).unwrap();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].kind, "memory_match");
    }

    #[test]
    fn test_failure_records_attempt_only() {
        let (mut store, clue_id) = store_with_clue();
        let result = MinigameResult {
            kind: MinigameKind::ReactionTime,
            score: 0,
            success: false,
            duration_ms: 12_000,
        };
        let next = MinigameCoordinator::new(&mut store)
            .complete(&clue_id, &config(), &result)
            .unwrap();

        assert_eq!(next.as_deref(), Some("s-lose"));
        assert!(!store.clue(&clue_id).unwrap().discovered);
        assert_eq!(store.attempts_for(&clue_id).unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_clue_rejected() {
        let (mut store, _) = store_with_clue();
        let err = MinigameCoordinator::new(&mut store)
            .play_scripted("missing", &config(), 1)
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { kind: "Clue", .. }));
    }
}
