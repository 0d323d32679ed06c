//! Content store: per-entity mirrors over an injected persistence backend
//!
//! The store is the source of truth the graph editor projects from. Writes
//! go to the backend first and only replace the mirrored record once the
//! backend has accepted them, so a rejected write leaves the mirror as it
//! was.

use crate::error::{Error, Result};
use crate::model::{now, Character, Clue, MinigameAttempt, NewStorylet, StoryArc, Storylet};
use std::cell::{Cell, RefCell};

/// Persistence dependency for [`ContentStore`]
///
/// `Database` implements this against SQLite; [`MemoryBackend`] keeps
/// everything in process for tests and scratch sessions.
pub trait ContentBackend {
    fn load_storylets(&self) -> Result<Vec<Storylet>>;
    fn insert_storylet(&self, storylet: &Storylet) -> Result<()>;
    fn update_storylet(&self, storylet: &Storylet) -> Result<()>;
    fn delete_storylet(&self, id: &str) -> Result<()>;

    fn load_arcs(&self) -> Result<Vec<StoryArc>>;
    fn insert_arc(&self, arc: &StoryArc) -> Result<()>;
    fn update_arc(&self, arc: &StoryArc) -> Result<()>;
    fn delete_arc(&self, id: &str) -> Result<()>;

    fn load_characters(&self) -> Result<Vec<Character>>;
    fn insert_character(&self, character: &Character) -> Result<()>;
    fn update_character(&self, character: &Character) -> Result<()>;
    fn delete_character(&self, id: &str) -> Result<()>;

    fn load_clues(&self) -> Result<Vec<Clue>>;
    fn insert_clue(&self, clue: &Clue) -> Result<()>;
    fn update_clue(&self, clue: &Clue) -> Result<()>;
    fn delete_clue(&self, id: &str) -> Result<()>;

    fn record_attempt(&self, attempt: &MinigameAttempt) -> Result<()>;
    fn load_attempts(&self) -> Result<Vec<MinigameAttempt>>;
}

// ============================================================================
// In-memory backend
// ============================================================================

#[derive(Debug, Default)]
struct MemoryTables {
    storylets: Vec<Storylet>,
    arcs: Vec<StoryArc>,
    characters: Vec<Character>,
    clues: Vec<Clue>,
    attempts: Vec<MinigameAttempt>,
}

/// Backend that keeps records in insertion order in memory
///
/// `fail_writes(true)` makes every insert/update/delete return
/// `Error::Backend`, for exercising failure paths.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    tables: RefCell<MemoryTables>,
    failing: Cell<bool>,
    writes: Cell<usize>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate with storylets and arcs
    pub fn with_content(storylets: Vec<Storylet>, arcs: Vec<StoryArc>) -> Self {
        let backend = Self::new();
        {
            let mut tables = backend.tables.borrow_mut();
            tables.storylets = storylets;
            tables.arcs = arcs;
        }
        backend
    }

    pub fn fail_writes(&self, failing: bool) {
        self.failing.set(failing);
    }

    /// Number of successful writes so far
    pub fn write_count(&self) -> usize {
        self.writes.get()
    }

    fn write<F>(&self, op: F) -> Result<()>
    where
        F: FnOnce(&mut MemoryTables) -> Result<()>,
    {
        if self.failing.get() {
            return Err(Error::Backend("write rejected".to_string()));
        }
        op(&mut self.tables.borrow_mut())?;
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }
}

/// Insert/update/delete helpers over a Vec keyed by an id accessor
fn insert_record<T: Clone>(rows: &mut Vec<T>, record: &T, id: impl Fn(&T) -> &str, kind: &str) -> Result<()> {
    if rows.iter().any(|r| id(r) == id(record)) {
        return Err(Error::Backend(format!("{} {} already exists", kind, id(record))));
    }
    rows.push(record.clone());
    Ok(())
}

fn update_record<T: Clone>(rows: &mut [T], record: &T, id: impl Fn(&T) -> &str, kind: &'static str) -> Result<()> {
    match rows.iter_mut().find(|r| id(r) == id(record)) {
        Some(slot) => {
            *slot = record.clone();
            Ok(())
        }
        None => Err(Error::not_found(kind, id(record))),
    }
}

impl ContentBackend for MemoryBackend {
    fn load_storylets(&self) -> Result<Vec<Storylet>> {
        Ok(self.tables.borrow().storylets.clone())
    }

    fn insert_storylet(&self, storylet: &Storylet) -> Result<()> {
        self.write(|t| insert_record(&mut t.storylets, storylet, |s| s.id.as_str(), "Storylet"))
    }

    fn update_storylet(&self, storylet: &Storylet) -> Result<()> {
        self.write(|t| update_record(&mut t.storylets, storylet, |s| s.id.as_str(), "Storylet"))
    }

    fn delete_storylet(&self, id: &str) -> Result<()> {
        self.write(|t| {
            t.storylets.retain(|s| s.id != id);
            Ok(())
        })
    }

    fn load_arcs(&self) -> Result<Vec<StoryArc>> {
        Ok(self.tables.borrow().arcs.clone())
    }

    fn insert_arc(&self, arc: &StoryArc) -> Result<()> {
        self.write(|t| insert_record(&mut t.arcs, arc, |a| a.id.as_str(), "Arc"))
    }

    fn update_arc(&self, arc: &StoryArc) -> Result<()> {
        self.write(|t| update_record(&mut t.arcs, arc, |a| a.id.as_str(), "Arc"))
    }

    fn delete_arc(&self, id: &str) -> Result<()> {
        self.write(|t| {
            t.arcs.retain(|a| a.id != id);
            Ok(())
        })
    }

    fn load_characters(&self) -> Result<Vec<Character>> {
        Ok(self.tables.borrow().characters.clone())
    }

    fn insert_character(&self, character: &Character) -> Result<()> {
        self.write(|t| insert_record(&mut t.characters, character, |c| c.id.as_str(), "Character"))
    }

    fn update_character(&self, character: &Character) -> Result<()> {
        self.write(|t| update_record(&mut t.characters, character, |c| c.id.as_str(), "Character"))
    }

    fn delete_character(&self, id: &str) -> Result<()> {
        self.write(|t| {
            t.characters.retain(|c| c.id != id);
            Ok(())
        })
    }

    fn load_clues(&self) -> Result<Vec<Clue>> {
        Ok(self.tables.borrow().clues.clone())
    }

    fn insert_clue(&self, clue: &Clue) -> Result<()> {
        self.write(|t| insert_record(&mut t.clues, clue, |c| c.id.as_str(), "Clue"))
    }

    fn update_clue(&self, clue: &Clue) -> Result<()> {
        self.write(|t| update_record(&mut t.clues, clue, |c| c.id.as_str(), "Clue"))
    }

    fn delete_clue(&self, id: &str) -> Result<()> {
        self.write(|t| {
            t.clues.retain(|c| c.id != id);
            Ok(())
        })
    }

    fn record_attempt(&self, attempt: &MinigameAttempt) -> Result<()> {
        self.write(|t| {
            t.attempts.push(attempt.clone());
            Ok(())
        })
    }

    fn load_attempts(&self) -> Result<Vec<MinigameAttempt>> {
        Ok(self.tables.borrow().attempts.clone())
    }
}

// ============================================================================
// Content store
// ============================================================================

/// What changed in the store, delivered to subscribers after each write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentChange {
    Reloaded,
    Storylet { id: String, removed: bool },
    Arc { id: String, removed: bool },
    Character { id: String, removed: bool },
    Clue { id: String, removed: bool },
    Attempt { clue_id: String },
}

/// Which storylets a caller wants
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadScope {
    All,
    Arc(String),
}

impl LoadScope {
    pub fn from_arc(arc_id: Option<String>) -> Self {
        match arc_id {
            Some(id) => LoadScope::Arc(id),
            None => LoadScope::All,
        }
    }

    pub fn includes(&self, storylet: &Storylet) -> bool {
        match self {
            LoadScope::All => true,
            LoadScope::Arc(id) => storylet.arc_id.as_deref() == Some(id.as_str()),
        }
    }
}

type Listener = Box<dyn FnMut(&ContentChange)>;

/// In-memory mirror of every content collection, backed by `B`
pub struct ContentStore<B: ContentBackend> {
    backend: B,
    storylets: Vec<Storylet>,
    arcs: Vec<StoryArc>,
    characters: Vec<Character>,
    clues: Vec<Clue>,
    listeners: Vec<Listener>,
}

impl<B: ContentBackend> ContentStore<B> {
    /// Load every collection from the backend
    pub fn open(backend: B) -> Result<Self> {
        let mut store = Self {
            backend,
            storylets: Vec::new(),
            arcs: Vec::new(),
            characters: Vec::new(),
            clues: Vec::new(),
            listeners: Vec::new(),
        };
        store.refresh()?;
        Ok(store)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Re-read all mirrors from the backend
    pub fn refresh(&mut self) -> Result<()> {
        self.storylets = self.backend.load_storylets()?;
        self.arcs = self.backend.load_arcs()?;
        self.characters = self.backend.load_characters()?;
        self.clues = self.backend.load_clues()?;
        tracing::debug!(
            storylets = self.storylets.len(),
            arcs = self.arcs.len(),
            "content store refreshed"
        );
        self.notify(ContentChange::Reloaded);
        Ok(())
    }

    /// Register a listener called after every successful write
    pub fn subscribe<F>(&mut self, listener: F)
    where
        F: FnMut(&ContentChange) + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    fn notify(&mut self, change: ContentChange) {
        for listener in &mut self.listeners {
            listener(&change);
        }
    }

    // === Storylets ===

    pub fn storylets(&self) -> &[Storylet] {
        &self.storylets
    }

    pub fn storylet(&self, id: &str) -> Option<&Storylet> {
        self.storylets.iter().find(|s| s.id == id)
    }

    /// Storylets in creation order, filtered by scope
    pub fn storylets_for(&self, scope: &LoadScope) -> Vec<Storylet> {
        self.storylets
            .iter()
            .filter(|s| scope.includes(s))
            .cloned()
            .collect()
    }

    pub fn create_storylet(&mut self, draft: NewStorylet) -> Result<Storylet> {
        if draft.title.trim().is_empty() {
            return Err(Error::Validation(vec!["Title is required".to_string()]));
        }
        let storylet = draft.into_storylet();
        self.insert_storylet(storylet.clone())?;
        Ok(storylet)
    }

    /// Insert a fully-formed record (ids and timestamps kept as given)
    pub fn insert_storylet(&mut self, storylet: Storylet) -> Result<()> {
        self.backend.insert_storylet(&storylet)?;
        let id = storylet.id.clone();
        self.storylets.push(storylet);
        self.notify(ContentChange::Storylet { id, removed: false });
        Ok(())
    }

    /// Replace a storylet wholesale. Last writer wins.
    pub fn update_storylet(&mut self, mut storylet: Storylet) -> Result<Storylet> {
        let index = self
            .storylets
            .iter()
            .position(|s| s.id == storylet.id)
            .ok_or_else(|| Error::not_found("Storylet", storylet.id.clone()))?;
        storylet.updated_at = now();
        self.backend.update_storylet(&storylet)?;
        self.storylets[index] = storylet.clone();
        self.notify(ContentChange::Storylet {
            id: storylet.id.clone(),
            removed: false,
        });
        Ok(storylet)
    }

    pub fn delete_storylet(&mut self, id: &str) -> Result<()> {
        if self.storylet(id).is_none() {
            return Err(Error::not_found("Storylet", id));
        }
        self.backend.delete_storylet(id)?;
        self.storylets.retain(|s| s.id != id);
        self.notify(ContentChange::Storylet {
            id: id.to_string(),
            removed: true,
        });
        Ok(())
    }

    // === Arcs ===

    pub fn arcs(&self) -> &[StoryArc] {
        &self.arcs
    }

    pub fn arc(&self, id: &str) -> Option<&StoryArc> {
        self.arcs.iter().find(|a| a.id == id)
    }

    pub fn create_arc(&mut self, name: &str, description: &str) -> Result<StoryArc> {
        if name.trim().is_empty() {
            return Err(Error::Validation(vec!["Arc name is required".to_string()]));
        }
        let arc = StoryArc::new(name, description);
        self.insert_arc(arc.clone())?;
        Ok(arc)
    }

    pub fn insert_arc(&mut self, arc: StoryArc) -> Result<()> {
        self.backend.insert_arc(&arc)?;
        let id = arc.id.clone();
        self.arcs.push(arc);
        self.notify(ContentChange::Arc { id, removed: false });
        Ok(())
    }

    pub fn update_arc(&mut self, mut arc: StoryArc) -> Result<StoryArc> {
        let index = self
            .arcs
            .iter()
            .position(|a| a.id == arc.id)
            .ok_or_else(|| Error::not_found("Arc", arc.id.clone()))?;
        arc.updated_at = now();
        self.backend.update_arc(&arc)?;
        self.arcs[index] = arc.clone();
        self.notify(ContentChange::Arc {
            id: arc.id.clone(),
            removed: false,
        });
        Ok(arc)
    }

    pub fn delete_arc(&mut self, id: &str) -> Result<()> {
        if self.arc(id).is_none() {
            return Err(Error::not_found("Arc", id));
        }
        self.backend.delete_arc(id)?;
        self.arcs.retain(|a| a.id != id);
        self.notify(ContentChange::Arc {
            id: id.to_string(),
            removed: true,
        });
        Ok(())
    }

    // === Characters ===

    pub fn characters(&self) -> &[Character] {
        &self.characters
    }

    pub fn character(&self, id: &str) -> Option<&Character> {
        self.characters.iter().find(|c| c.id == id)
    }

    pub fn insert_character(&mut self, character: Character) -> Result<()> {
        if character.name.trim().is_empty() {
            return Err(Error::Validation(vec!["Character name is required".to_string()]));
        }
        self.backend.insert_character(&character)?;
        let id = character.id.clone();
        self.characters.push(character);
        self.notify(ContentChange::Character { id, removed: false });
        Ok(())
    }

    pub fn update_character(&mut self, mut character: Character) -> Result<Character> {
        let index = self
            .characters
            .iter()
            .position(|c| c.id == character.id)
            .ok_or_else(|| Error::not_found("Character", character.id.clone()))?;
        character.updated_at = now();
        self.backend.update_character(&character)?;
        self.characters[index] = character.clone();
        self.notify(ContentChange::Character {
            id: character.id.clone(),
            removed: false,
        });
        Ok(character)
    }

    pub fn delete_character(&mut self, id: &str) -> Result<()> {
        if self.character(id).is_none() {
            return Err(Error::not_found("Character", id));
        }
        self.backend.delete_character(id)?;
        self.characters.retain(|c| c.id != id);
        self.notify(ContentChange::Character {
            id: id.to_string(),
            removed: true,
        });
        Ok(())
    }

    // === Clues ===

    pub fn clues(&self) -> &[Clue] {
        &self.clues
    }

    pub fn clue(&self, id: &str) -> Option<&Clue> {
        self.clues.iter().find(|c| c.id == id)
    }

    pub fn insert_clue(&mut self, clue: Clue) -> Result<()> {
        if clue.name.trim().is_empty() {
            return Err(Error::Validation(vec!["Clue name is required".to_string()]));
        }
        self.backend.insert_clue(&clue)?;
        let id = clue.id.clone();
        self.clues.push(clue);
        self.notify(ContentChange::Clue { id, removed: false });
        Ok(())
    }

    pub fn update_clue(&mut self, mut clue: Clue) -> Result<Clue> {
        let index = self
            .clues
            .iter()
            .position(|c| c.id == clue.id)
            .ok_or_else(|| Error::not_found("Clue", clue.id.clone()))?;
        clue.updated_at = now();
        self.backend.update_clue(&clue)?;
        self.clues[index] = clue.clone();
        self.notify(ContentChange::Clue {
            id: clue.id.clone(),
            removed: false,
        });
        Ok(clue)
    }

    pub fn delete_clue(&mut self, id: &str) -> Result<()> {
        if self.clue(id).is_none() {
            return Err(Error::not_found("Clue", id));
        }
        self.backend.delete_clue(id)?;
        self.clues.retain(|c| c.id != id);
        self.notify(ContentChange::Clue {
            id: id.to_string(),
            removed: true,
        });
        Ok(())
    }

    /// Flag a clue as discovered. Already-discovered clues are left alone.
    pub fn mark_clue_discovered(&mut self, id: &str) -> Result<()> {
        let clue = self.clue(id).cloned().ok_or_else(|| Error::not_found("Clue", id))?;
        if clue.discovered {
            return Ok(());
        }
        self.update_clue(Clue {
            discovered: true,
            ..clue
        })?;
        Ok(())
    }

    // === Minigame attempts ===

    pub fn record_attempt(&mut self, attempt: MinigameAttempt) -> Result<()> {
        self.backend.record_attempt(&attempt)?;
        self.notify(ContentChange::Attempt {
            clue_id: attempt.clue_id,
        });
        Ok(())
    }

    pub fn attempts_for(&self, clue_id: &str) -> Result<Vec<MinigameAttempt>> {
        Ok(self
            .backend
            .load_attempts()?
            .into_iter()
            .filter(|a| a.clue_id == clue_id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn store() -> ContentStore<MemoryBackend> {
        ContentStore::open(MemoryBackend::new()).unwrap()
    }

    #[test]
    fn test_create_storylet_requires_title() {
        let mut store = store();
        let err = store.create_storylet(NewStorylet::titled("   ")).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(store.storylets().is_empty());
    }

    #[test]
    fn test_scope_filters_by_arc() {
        let mut store = store();
        let arc = store.create_arc("Harbor", "").unwrap();
        store.create_storylet(NewStorylet::titled("Pier").in_arc(&arc.id)).unwrap();
        store.create_storylet(NewStorylet::titled("Market")).unwrap();

        assert_eq!(store.storylets_for(&LoadScope::All).len(), 2);
        let harbor = store.storylets_for(&LoadScope::Arc(arc.id.clone()));
        assert_eq!(harbor.len(), 1);
        assert_eq!(harbor[0].title, "Pier");
    }

    #[test]
    fn test_rejected_write_leaves_mirror_untouched() {
        let mut store = store();
        let storylet = store.create_storylet(NewStorylet::titled("Pier")).unwrap();

        store.backend().fail_writes(true);
        let mut edited = storylet.clone();
        edited.title = "Wharf".into();
        let err = store.update_storylet(edited).unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(store.storylet(&storylet.id).unwrap().title, "Pier");
    }

    #[test]
    fn test_update_is_last_writer_wins() {
        let mut store = store();
        let original = store.create_storylet(NewStorylet::titled("Pier")).unwrap();

        let mut first = original.clone();
        first.description = "first".into();
        let mut second = original.clone();
        second.title = "Second".into();

        store.update_storylet(first).unwrap();
        store.update_storylet(second).unwrap();

        let stored = store.storylet(&original.id).unwrap();
        assert_eq!(stored.title, "Second");
        assert_eq!(stored.description, "");
    }

    #[test]
    fn test_subscribers_see_writes() {
        let mut store = store();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        store.subscribe(move |change| sink.borrow_mut().push(change.clone()));

        let storylet = store.create_storylet(NewStorylet::titled("Pier")).unwrap();
        store.delete_storylet(&storylet.id).unwrap();

        assert_eq!(
            *seen.borrow(),
            vec![
                ContentChange::Storylet { id: storylet.id.clone(), removed: false },
                ContentChange::Storylet { id: storylet.id, removed: true },
            ]
        );
    }

    #[test]
    fn test_mark_clue_discovered_is_idempotent() {
        let mut store = store();
        let clue = Clue::new("Torn letter", "");
        store.insert_clue(clue.clone()).unwrap();

        store.mark_clue_discovered(&clue.id).unwrap();
        let writes = store.backend().write_count();
        store.mark_clue_discovered(&clue.id).unwrap();

        assert!(store.clue(&clue.id).unwrap().discovered);
        assert_eq!(store.backend().write_count(), writes);
    }

    #[test]
    fn test_write_count_skips_rejected_writes() {
        let mut store = store();
        store.create_storylet(NewStorylet::titled("Pier")).unwrap();
        assert_eq!(store.backend().write_count(), 1);

        store.backend().fail_writes(true);
        assert!(store.create_storylet(NewStorylet::titled("Wharf")).is_err());
        assert_eq!(store.backend().write_count(), 1);

        store.backend().fail_writes(false);
        store.create_storylet(NewStorylet::titled("Wharf")).unwrap();
        assert_eq!(store.backend().write_count(), 2);
        assert_eq!(store.storylets().len(), 2);
    }
}
