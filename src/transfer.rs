//! JSON export/import of story content
//!
//! The file format is an envelope:
//!
//! ```json
//! { "version": "1.0.0", "timestamp": "...",
//!   "metadata": { "description": "...", "tags": ["..."] },
//!   "data": { "storylets": [...], "arcs": [...], "clues": [...], "characters": [...] } }
//! ```
//!
//! Import validates size and version, fills missing fields with the same
//! defaults the schema migrations use, and inserts only records whose ids
//! are not already present.

use crate::config::TransferConfig;
use crate::error::{Error, Result};
use crate::model::{now, Character, Clue, StoryArc, Storylet};
use crate::store::{ContentBackend, ContentStore};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Version written by `export`; imports must share the major version
pub const FORMAT_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportEnvelope {
    pub version: String,
    #[serde(default = "now")]
    pub timestamp: String,
    #[serde(default)]
    pub metadata: ExportMetadata,
    #[serde(default)]
    pub data: ExportData,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storylets: Option<Vec<Storylet>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arcs: Option<Vec<StoryArc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clues: Option<Vec<Clue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub characters: Option<Vec<Character>>,
}

/// Which collections to export
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportSelection {
    pub storylets: bool,
    pub arcs: bool,
    pub clues: bool,
    pub characters: bool,
}

impl Default for ExportSelection {
    fn default() -> Self {
        Self {
            storylets: true,
            arcs: true,
            clues: true,
            characters: true,
        }
    }
}

/// Per-collection import counts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub storylets: usize,
    pub arcs: usize,
    pub clues: usize,
    pub characters: usize,
    /// Records whose id already existed
    pub skipped: usize,
    /// "kind id: error" for records the store refused
    pub failed: Vec<String>,
}

impl ImportReport {
    pub fn inserted(&self) -> usize {
        self.storylets + self.arcs + self.clues + self.characters
    }
}

/// Snapshot the selected collections
pub fn export<B: ContentBackend>(
    store: &ContentStore<B>,
    selection: ExportSelection,
    metadata: ExportMetadata,
) -> ExportEnvelope {
    ExportEnvelope {
        version: FORMAT_VERSION.to_string(),
        timestamp: now(),
        metadata,
        data: ExportData {
            storylets: selection.storylets.then(|| store.storylets().to_vec()),
            arcs: selection.arcs.then(|| store.arcs().to_vec()),
            clues: selection.clues.then(|| store.clues().to_vec()),
            characters: selection.characters.then(|| store.characters().to_vec()),
        },
    }
}

/// Size, syntax and version checks
pub fn parse_envelope(json: &str, max_bytes: usize) -> Result<ExportEnvelope> {
    if json.len() > max_bytes {
        return Err(Error::Import(format!(
            "file is {} bytes, the limit is {} bytes",
            json.len(),
            max_bytes
        )));
    }
    let envelope: ExportEnvelope =
        serde_json::from_str(json).map_err(|e| Error::Import(format!("not a storyloom export: {}", e)))?;

    let major = envelope.version.split('.').next().unwrap_or_default();
    let supported = FORMAT_VERSION.split('.').next().unwrap_or_default();
    if major != supported {
        return Err(Error::Import(format!(
            "unsupported format version {} (expected {}.x)",
            envelope.version, supported
        )));
    }
    Ok(envelope)
}

/// Insert every record whose id is new. Arcs go first so storylets can
/// reference them.
pub fn import_envelope<B: ContentBackend>(store: &mut ContentStore<B>, envelope: ExportEnvelope) -> ImportReport {
    let mut report = ImportReport::default();
    let data = envelope.data;

    for arc in data.arcs.unwrap_or_default() {
        if store.arc(&arc.id).is_some() {
            report.skipped += 1;
            continue;
        }
        let id = arc.id.clone();
        match store.insert_arc(arc) {
            Ok(()) => report.arcs += 1,
            Err(e) => report.failed.push(format!("arc {}: {}", id, e)),
        }
    }
    for character in data.characters.unwrap_or_default() {
        if store.character(&character.id).is_some() {
            report.skipped += 1;
            continue;
        }
        let id = character.id.clone();
        match store.insert_character(character) {
            Ok(()) => report.characters += 1,
            Err(e) => report.failed.push(format!("character {}: {}", id, e)),
        }
    }
    for clue in data.clues.unwrap_or_default() {
        if store.clue(&clue.id).is_some() {
            report.skipped += 1;
            continue;
        }
        let id = clue.id.clone();
        match store.insert_clue(clue) {
            Ok(()) => report.clues += 1,
            Err(e) => report.failed.push(format!("clue {}: {}", id, e)),
        }
    }
    for storylet in data.storylets.unwrap_or_default() {
        if store.storylet(&storylet.id).is_some() {
            report.skipped += 1;
            continue;
        }
        let id = storylet.id.clone();
        match store.insert_storylet(storylet) {
            Ok(()) => report.storylets += 1,
            Err(e) => report.failed.push(format!("storylet {}: {}", id, e)),
        }
    }

    for failure in &report.failed {
        tracing::warn!(failure = %failure, "import skipped record");
    }
    report
}

pub fn import_json<B: ContentBackend>(store: &mut ContentStore<B>, json: &str, max_bytes: usize) -> Result<ImportReport> {
    let envelope = parse_envelope(json, max_bytes)?;
    Ok(import_envelope(store, envelope))
}

/// Sliding-window limiter: at most `max_operations` per `window`
#[derive(Debug, Clone)]
pub struct RateLimiter {
    max_operations: usize,
    window: Duration,
    history: VecDeque<Instant>,
}

impl RateLimiter {
    pub fn new(max_operations: usize, window: Duration) -> Self {
        Self {
            max_operations: max_operations.max(1),
            window,
            history: VecDeque::new(),
        }
    }

    pub fn check(&mut self) -> Result<()> {
        self.check_at(Instant::now())
    }

    /// Admit one operation at `now`, or report how long to wait
    pub fn check_at(&mut self, now: Instant) -> Result<()> {
        while let Some(oldest) = self.history.front() {
            if now.duration_since(*oldest) >= self.window {
                self.history.pop_front();
            } else {
                break;
            }
        }
        if self.history.len() >= self.max_operations {
            let retry_after = self
                .history
                .front()
                .map(|oldest| self.window.saturating_sub(now.duration_since(*oldest)))
                .unwrap_or(self.window);
            return Err(Error::RateLimited {
                retry_after_secs: retry_after.as_secs().max(1),
            });
        }
        self.history.push_back(now);
        Ok(())
    }
}

/// Export and import behind a shared rate limit
#[derive(Debug, Clone)]
pub struct Transfer {
    limiter: RateLimiter,
    max_import_bytes: usize,
}

impl Transfer {
    pub fn new(config: &TransferConfig) -> Self {
        Self {
            limiter: RateLimiter::new(config.max_operations, Duration::from_secs(config.window_secs)),
            max_import_bytes: config.max_import_bytes,
        }
    }

    pub fn export_json<B: ContentBackend>(
        &mut self,
        store: &ContentStore<B>,
        selection: ExportSelection,
        metadata: ExportMetadata,
    ) -> Result<String> {
        self.limiter.check()?;
        let envelope = export(store, selection, metadata);
        Ok(serde_json::to_string_pretty(&envelope)?)
    }

    pub fn import_json<B: ContentBackend>(&mut self, store: &mut ContentStore<B>, json: &str) -> Result<ImportReport> {
        self.limiter.check()?;
        let report = import_json(store, json, self.max_import_bytes)?;
        tracing::info!(
            inserted = report.inserted(),
            skipped = report.skipped,
            failed = report.failed.len(),
            "import finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Choice, NewStorylet};
    use crate::store::MemoryBackend;

    fn populated() -> ContentStore<MemoryBackend> {
        let mut store = ContentStore::open(MemoryBackend::new()).unwrap();
        let arc = store.create_arc("Harbor", "Night at the docks").unwrap();
        let s1 = store.create_storylet(NewStorylet::titled("Pier").in_arc(&arc.id)).unwrap();
        let mut s2 = store.create_storylet(NewStorylet::titled("Warehouse")).unwrap();
        s2.choices.push(Choice::leading_to("c1", "Back", &s1.id, "Pier"));
        s2.tags = vec!["night".into()];
        store.update_storylet(s2).unwrap();
        store.insert_clue(Clue::new("Ledger", "Water-stained")).unwrap();
        store.insert_character(Character::new("Marta", "Harbormaster")).unwrap();
        store
    }

    fn empty() -> ContentStore<MemoryBackend> {
        ContentStore::open(MemoryBackend::new()).unwrap()
    }

    #[test]
    fn test_round_trip_into_empty_store() {
        let source = populated();
        let json = serde_json::to_string(&export(&source, ExportSelection::default(), ExportMetadata::default())).unwrap();

        let mut target = empty();
        let report = import_json(&mut target, &json, 1 << 20).unwrap();

        assert_eq!(report.inserted(), 5);
        assert_eq!(target.storylets(), source.storylets());
        assert_eq!(target.arcs(), source.arcs());
        assert_eq!(target.clues(), source.clues());
        assert_eq!(target.characters(), source.characters());
    }

    #[test]
    fn test_existing_ids_skipped() {
        let mut store = populated();
        let json = serde_json::to_string(&export(&store, ExportSelection::default(), ExportMetadata::default())).unwrap();
        let report = import_json(&mut store, &json, 1 << 20).unwrap();
        assert_eq!(report.inserted(), 0);
        assert_eq!(report.skipped, 5);
    }

    #[test]
    fn test_selection_and_metadata() {
        let store = populated();
        let envelope = export(
            &store,
            ExportSelection {
                storylets: true,
                arcs: false,
                clues: false,
                characters: false,
            },
            ExportMetadata {
                description: Some("backup".into()),
                tags: None,
            },
        );
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["version"], "1.0.0");
        assert_eq!(json["metadata"]["description"], "backup");
        assert!(json["data"].get("arcs").is_none());
        assert_eq!(json["data"]["storylets"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_missing_fields_get_defaults() {
        let json = r#"{"version":"1.2.0","data":{"storylets":[
            {"id":"s1","title":"Bare","choices":[{"id":"c1","text":"Go","nextStoryletId":"s2"}]}
        ]}}"#;
        let mut store = empty();
        import_json(&mut store, json, 1 << 20).unwrap();

        let s = store.storylet("s1").unwrap();
        assert!(s.tags.is_empty());
        assert!(!s.created_at.is_empty());
        assert_eq!(s.choices[0].probability, 100);
        assert!(s.choices[0].unlocked);
    }

    #[test]
    fn test_rejects_oversize_and_wrong_version() {
        let mut store = empty();
        let big = format!(r#"{{"version":"1.0.0","metadata":{{"description":"{}"}}}}"#, "x".repeat(200));
        assert!(matches!(import_json(&mut store, &big, 100), Err(Error::Import(_))));

        let future = r#"{"version":"2.0.0","data":{}}"#;
        let err = import_json(&mut store, future, 1 << 20).unwrap_err();
        assert!(err.to_string().contains("unsupported format version 2.0.0"));

        assert!(matches!(import_json(&mut store, "[1,2", 1 << 20), Err(Error::Import(_))));
    }

    #[test]
    fn test_rate_limiter_window() {
        let mut limiter = RateLimiter::new(2, Duration::from_secs(60));
        let t0 = Instant::now();
        limiter.check_at(t0).unwrap();
        limiter.check_at(t0 + Duration::from_secs(10)).unwrap();

        let err = limiter.check_at(t0 + Duration::from_secs(20)).unwrap_err();
        assert!(matches!(err, Error::RateLimited { retry_after_secs: 40 }));

        limiter.check_at(t0 + Duration::from_secs(61)).unwrap();
    }

    #[test]
    fn test_transfer_shares_limit() {
        let mut store = populated();
        let mut transfer = Transfer::new(&TransferConfig {
            max_operations: 2,
            ..TransferConfig::default()
        });
        let json = transfer
            .export_json(&store, ExportSelection::default(), ExportMetadata::default())
            .unwrap();
        transfer.import_json(&mut store, &json).unwrap();
        assert!(matches!(
            transfer.import_json(&mut store, &json),
            Err(Error::RateLimited { .. })
        ));
    }
}
