//! Side-panel editor bound to one storylet
//!
//! The panel edits a working copy. Any mutation marks it dirty; `save`
//! writes the whole copy back (last writer wins, no merge) and clears the
//! flag. Closing a dirty panel asks the caller to confirm.

use crate::error::{Error, Result};
use crate::model::{new_id, Choice, Effect, Requirement, Storylet};
use crate::store::{ContentBackend, ContentStore};

#[derive(Debug, Clone)]
pub struct EditorPanel {
    working: Storylet,
    dirty: bool,
}

/// What happened when the panel was asked to close
#[derive(Debug)]
pub enum CloseOutcome {
    Closed,
    /// The user declined to discard unsaved edits
    Kept(EditorPanel),
}

impl EditorPanel {
    pub fn open<B: ContentBackend>(store: &ContentStore<B>, storylet_id: &str) -> Result<Self> {
        let working = store
            .storylet(storylet_id)
            .cloned()
            .ok_or_else(|| Error::not_found("Storylet", storylet_id))?;
        Ok(Self { working, dirty: false })
    }

    pub fn storylet_id(&self) -> &str {
        &self.working.id
    }

    pub fn working(&self) -> &Storylet {
        &self.working
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn edit(&mut self, f: impl FnOnce(&mut Storylet)) {
        f(&mut self.working);
        self.dirty = true;
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        let title = title.into();
        self.edit(|s| s.title = title);
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        let description = description.into();
        self.edit(|s| s.description = description);
    }

    pub fn set_content(&mut self, content: impl Into<String>) {
        let content = content.into();
        self.edit(|s| s.content = content);
    }

    pub fn set_tags(&mut self, tags: Vec<String>) {
        self.edit(|s| s.tags = tags);
    }

    pub fn set_priority(&mut self, priority: i32) {
        self.edit(|s| s.priority = priority);
    }

    pub fn set_estimated_play_time(&mut self, minutes: Option<u32>) {
        self.edit(|s| s.estimated_play_time = minutes);
    }

    pub fn set_triggers(&mut self, triggers: Vec<Requirement>) {
        self.edit(|s| s.triggers = triggers);
    }

    pub fn add_effect(&mut self, effect: Effect) {
        self.edit(|s| s.effects.push(effect));
    }

    pub fn remove_effect(&mut self, index: usize) -> bool {
        if index >= self.working.effects.len() {
            return false;
        }
        self.edit(|s| {
            s.effects.remove(index);
        });
        true
    }

    /// Append a blank dead-end choice and return its id
    pub fn add_choice(&mut self, text: impl Into<String>) -> String {
        let choice = Choice {
            id: new_id(),
            text: text.into(),
            description: None,
            effects: Vec::new(),
            requirements: Vec::new(),
            probability: 100,
            unlocked: true,
            next_storylet_id: None,
            create_new_storylet: false,
            clue_id: None,
        };
        let id = choice.id.clone();
        self.edit(|s| s.choices.push(choice));
        id
    }

    pub fn update_choice(&mut self, choice_id: &str, f: impl FnOnce(&mut Choice)) -> bool {
        let Some(index) = self.working.choices.iter().position(|c| c.id == choice_id) else {
            return false;
        };
        self.edit(|s| f(&mut s.choices[index]));
        true
    }

    pub fn remove_choice(&mut self, choice_id: &str) -> bool {
        let before = self.working.choices.len();
        self.working.choices.retain(|c| c.id != choice_id);
        let removed = self.working.choices.len() != before;
        self.dirty |= removed;
        removed
    }

    /// Problems that block saving, one message per field
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.working.title.trim().is_empty() {
            errors.push("Title is required".to_string());
        }
        for (i, choice) in self.working.choices.iter().enumerate() {
            if choice.text.trim().is_empty() {
                errors.push(format!("Choice {} needs text", i + 1));
            }
            if choice.probability > 100 {
                errors.push(format!("Choice {} probability must be between 0 and 100", i + 1));
            }
        }
        errors
    }

    /// Persist the working copy, overwriting whatever is stored
    pub fn save<B: ContentBackend>(&mut self, store: &mut ContentStore<B>) -> Result<Storylet> {
        let errors = self.validate();
        if !errors.is_empty() {
            return Err(Error::Validation(errors));
        }
        let saved = store.update_storylet(self.working.clone())?;
        self.working = saved.clone();
        self.dirty = false;
        Ok(saved)
    }

    /// Close the panel; `confirm` is asked only when there are unsaved edits
    pub fn close(self, confirm: impl FnOnce() -> bool) -> CloseOutcome {
        if !self.dirty || confirm() {
            CloseOutcome::Closed
        } else {
            CloseOutcome::Kept(self)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewStorylet;
    use crate::store::MemoryBackend;

    fn store_with_storylet() -> (ContentStore<MemoryBackend>, String) {
        let mut store = ContentStore::open(MemoryBackend::new()).unwrap();
        let s = store.create_storylet(NewStorylet::titled("Docks")).unwrap();
        (store, s.id)
    }

    #[test]
    fn test_mutation_sets_dirty_and_save_clears_it() {
        let (mut store, id) = store_with_storylet();
        let mut panel = EditorPanel::open(&store, &id).unwrap();
        assert!(!panel.is_dirty());

        panel.set_content("Fog rolls in.");
        panel.set_priority(3);
        assert!(panel.is_dirty());

        panel.save(&mut store).unwrap();
        assert!(!panel.is_dirty());
        let stored = store.storylet(&id).unwrap();
        assert_eq!(stored.content, "Fog rolls in.");
        assert_eq!(stored.priority, 3);
    }

    #[test]
    fn test_validation_blocks_save() {
        let (mut store, id) = store_with_storylet();
        let mut panel = EditorPanel::open(&store, &id).unwrap();
        panel.set_title("  ");
        let choice = panel.add_choice("");
        panel.update_choice(&choice, |c| c.probability = 150);

        let errors = panel.validate();
        assert_eq!(errors.len(), 3);
        assert!(matches!(panel.save(&mut store), Err(Error::Validation(_))));
        assert!(panel.is_dirty());
        assert_eq!(store.storylet(&id).unwrap().title, "Docks");
    }

    #[test]
    fn test_close_confirms_only_when_dirty() {
        let (store, id) = store_with_storylet();

        let clean = EditorPanel::open(&store, &id).unwrap();
        let outcome = clean.close(|| panic!("confirm asked for a clean panel"));
        assert!(matches!(outcome, CloseOutcome::Closed));

        let mut dirty = EditorPanel::open(&store, &id).unwrap();
        dirty.set_title("Wharf");
        let outcome = dirty.close(|| false);
        let CloseOutcome::Kept(dirty) = outcome else {
            panic!("dirty panel closed without confirmation");
        };
        assert!(matches!(dirty.close(|| true), CloseOutcome::Closed));
    }

    #[test]
    fn test_save_overwrites_concurrent_edit() {
        let (mut store, id) = store_with_storylet();
        let mut panel = EditorPanel::open(&store, &id).unwrap();

        let mut elsewhere = store.storylet(&id).unwrap().clone();
        elsewhere.description = "edited in another view".into();
        store.update_storylet(elsewhere).unwrap();

        panel.set_title("Wharf");
        panel.save(&mut store).unwrap();
        let stored = store.storylet(&id).unwrap();
        assert_eq!(stored.title, "Wharf");
        assert_eq!(stored.description, "");
    }

    #[test]
    fn test_open_missing_storylet() {
        let (store, _) = store_with_storylet();
        assert!(matches!(
            EditorPanel::open(&store, "nope"),
            Err(Error::NotFound { kind: "Storylet", .. })
        ));
    }
}
