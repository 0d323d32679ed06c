//! Content records: storylets, arcs, characters, clues, minigame attempts
//!
//! These are the durable documents the content store owns. Every field that
//! was added after the first schema version carries a serde default, so
//! older exports and partially-filled imports get the same backfill the
//! SQLite migrations apply to existing rows.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generate a fresh record id
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Current time as an RFC 3339 string (the format every timestamp column uses)
pub fn now() -> String {
    chrono::Local::now().to_rfc3339()
}

fn default_true() -> bool {
    true
}

fn default_probability() -> u8 {
    100
}

// ============================================================================
// Storylets
// ============================================================================

/// An atomic narrative unit with content, triggers, choices and effects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Storylet {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub arc_id: Option<String>,
    #[serde(default)]
    pub choices: Vec<Choice>,
    /// Conditions that must hold for the storylet to become available
    #[serde(default)]
    pub triggers: Vec<Requirement>,
    #[serde(default)]
    pub effects: Vec<Effect>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub priority: i32,
    /// Estimated play time in minutes
    #[serde(default)]
    pub estimated_play_time: Option<u32>,
    #[serde(default = "now")]
    pub created_at: String,
    #[serde(default = "now")]
    pub updated_at: String,
}

impl Storylet {
    /// Does any choice already lead to `target`?
    pub fn has_choice_to(&self, target: &str) -> bool {
        self.choices
            .iter()
            .any(|c| c.next_storylet_id.as_deref() == Some(target))
    }

    pub fn choice(&self, id: &str) -> Option<&Choice> {
        self.choices.iter().find(|c| c.id == id)
    }
}

/// Fields a caller supplies when creating a storylet
#[derive(Debug, Clone, Default)]
pub struct NewStorylet {
    pub title: String,
    pub description: String,
    pub content: String,
    pub arc_id: Option<String>,
    pub tags: Vec<String>,
    pub priority: i32,
    pub estimated_play_time: Option<u32>,
}

impl NewStorylet {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn in_arc(mut self, arc_id: impl Into<String>) -> Self {
        self.arc_id = Some(arc_id.into());
        self
    }

    pub(crate) fn into_storylet(self) -> Storylet {
        let ts = now();
        Storylet {
            id: new_id(),
            title: self.title,
            description: self.description,
            content: self.content,
            arc_id: self.arc_id,
            choices: Vec::new(),
            triggers: Vec::new(),
            effects: Vec::new(),
            tags: self.tags,
            priority: self.priority,
            estimated_play_time: self.estimated_play_time,
            created_at: ts.clone(),
            updated_at: ts,
        }
    }
}

/// A player option on a storylet. The durable form of a graph connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Choice {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub effects: Vec<Effect>,
    #[serde(default)]
    pub requirements: Vec<Requirement>,
    /// Chance (0-100) that the choice is offered
    #[serde(default = "default_probability")]
    pub probability: u8,
    #[serde(default = "default_true")]
    pub unlocked: bool,
    #[serde(default)]
    pub next_storylet_id: Option<String>,
    #[serde(default)]
    pub create_new_storylet: bool,
    #[serde(default)]
    pub clue_id: Option<String>,
}

impl Choice {
    /// The choice the graph editor writes for a freshly drawn edge
    pub fn leading_to(id: impl Into<String>, text: impl Into<String>, target_id: &str, target_title: &str) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            description: Some(format!("Go to {}", target_title)),
            effects: Vec::new(),
            requirements: Vec::new(),
            probability: 100,
            unlocked: true,
            next_storylet_id: Some(target_id.to_string()),
            create_new_storylet: false,
            clue_id: None,
        }
    }

    /// Choices that grant a clue or lead nowhere are not graph-navigable
    pub fn is_navigable(&self) -> bool {
        self.next_storylet_id.is_some() && self.clue_id.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    SetFlag,
    AdjustStat,
    GrantClue,
    SetVariable,
}

/// A state change applied when a storylet plays or a choice is taken
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Effect {
    pub kind: EffectKind,
    pub key: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Has,
    NotHas,
}

/// A condition on game state, used for storylet triggers and choice gating
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    pub key: String,
    pub operator: Comparison,
    #[serde(default)]
    pub value: serde_json::Value,
}

// ============================================================================
// Arcs, characters, clues
// ============================================================================

/// A named narrative thread grouping storylets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryArc {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "now")]
    pub created_at: String,
    #[serde(default = "now")]
    pub updated_at: String,
}

impl StoryArc {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        let ts = now();
        Self {
            id: new_id(),
            name: name.into(),
            description: description.into(),
            created_at: ts.clone(),
            updated_at: ts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub traits: Vec<String>,
    #[serde(default = "now")]
    pub created_at: String,
    #[serde(default = "now")]
    pub updated_at: String,
}

impl Character {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        let ts = now();
        Self {
            id: new_id(),
            name: name.into(),
            description: description.into(),
            role: None,
            traits: Vec::new(),
            created_at: ts.clone(),
            updated_at: ts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clue {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub discovered: bool,
    #[serde(default = "now")]
    pub created_at: String,
    #[serde(default = "now")]
    pub updated_at: String,
}

impl Clue {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        let ts = now();
        Self {
            id: new_id(),
            name: name.into(),
            description: description.into(),
            category: None,
            discovered: false,
            created_at: ts.clone(),
            updated_at: ts,
        }
    }
}

/// One recorded run of a minigame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinigameAttempt {
    pub id: String,
    pub clue_id: String,
    pub kind: String,
    pub score: u32,
    pub success: bool,
    pub duration_ms: u64,
    #[serde(default = "now")]
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_choice_defaults_match_migration_backfill() {
        let choice: Choice = serde_json::from_str(r#"{"id":"c1","text":"Run"}"#).unwrap();
        assert_eq!(choice.probability, 100);
        assert!(choice.unlocked);
        assert!(choice.effects.is_empty());
        assert!(choice.requirements.is_empty());
        assert!(!choice.create_new_storylet);
    }

    #[test]
    fn test_storylet_camel_case_fields() {
        let json = r#"{"id":"s1","title":"Opening","arcId":"a1","estimatedPlayTime":5,
            "choices":[{"id":"c1","text":"Go","nextStoryletId":"s2"}]}"#;
        let s: Storylet = serde_json::from_str(json).unwrap();
        assert_eq!(s.arc_id.as_deref(), Some("a1"));
        assert_eq!(s.estimated_play_time, Some(5));
        assert!(s.has_choice_to("s2"));
        assert!(s.tags.is_empty());
    }

    #[test]
    fn test_clue_choice_is_not_navigable() {
        let mut choice = Choice::leading_to("c1", "Look closer", "s2", "Cellar");
        assert!(choice.is_navigable());
        assert_eq!(choice.description.as_deref(), Some("Go to Cellar"));

        choice.clue_id = Some("clue-1".into());
        assert!(!choice.is_navigable());

        choice.clue_id = None;
        choice.next_storylet_id = None;
        assert!(!choice.is_navigable());
    }
}
