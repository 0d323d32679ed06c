//! SQLite database with Diesel ORM
//!
//! Persists storylets, arcs, characters, clues and minigame attempts.
//! Nested documents (choices, effects, tags, traits) live in `*_json` text
//! columns. Older databases are upgraded in place on open.

use crate::model::{Character, Clue, MinigameAttempt, StoryArc, Storylet};
use crate::schema::*;
use crate::store::ContentBackend;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::sqlite::SqliteConnection;
use std::path::Path;

/// Walk up directory tree to find .storyloom folder (like git finds .git)
/// Can be overridden with STORYLOOM_DB_PATH env var
fn get_db_path() -> std::path::PathBuf {
    if let Ok(path) = std::env::var("STORYLOOM_DB_PATH") {
        return std::path::PathBuf::from(path);
    }

    if let Ok(current_dir) = std::env::current_dir() {
        let mut dir = current_dir.as_path();
        loop {
            let project_dir = dir.join(".storyloom");
            if project_dir.is_dir() {
                return project_dir.join("storyloom.db");
            }
            match dir.parent() {
                Some(parent) => dir = parent,
                None => break,
            }
        }
    }

    // Nothing found - `storyloom init` will create it here
    std::path::PathBuf::from(".storyloom/storyloom.db")
}

/// Current schema version
pub const CURRENT_SCHEMA: ContentSchema = ContentSchema {
    major: 1,
    minor: 2,
    patch: 0,
    name: "storylet-content",
    features: &[
        "storylets",
        "story_arcs",
        "characters",
        "clues",
        "minigame_attempts",
        "storylet_tags",
        "storylet_triggers",
    ],
};

/// Describes the version and capabilities of the schema
#[derive(Debug, Clone)]
pub struct ContentSchema {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub name: &'static str,
    pub features: &'static [&'static str],
}

impl ContentSchema {
    pub fn version_string(&self) -> String {
        format!("{}.{}.{}", self.major, self.minor, self.patch)
    }

    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.contains(&feature)
    }
}

impl std::fmt::Display for ContentSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{} ({})", self.version_string(), self.name)
    }
}

/// Columns added after the first release: (table, column, definition).
/// Existing rows pick up the DEFAULT, which matches the serde defaults on
/// the model types.
const BACKFILL_COLUMNS: &[(&str, &str, &str)] = &[
    ("storylets", "triggers_json", "TEXT NOT NULL DEFAULT '[]'"),
    ("storylets", "tags_json", "TEXT NOT NULL DEFAULT '[]'"),
    ("storylets", "priority", "INTEGER NOT NULL DEFAULT 0"),
    ("storylets", "estimated_play_time", "INTEGER"),
    ("storylets", "updated_at", "TEXT NOT NULL DEFAULT ''"),
    ("characters", "traits_json", "TEXT NOT NULL DEFAULT '[]'"),
    ("characters", "role", "TEXT"),
    ("clues", "discovered", "INTEGER NOT NULL DEFAULT 0"),
    ("clues", "category", "TEXT"),
];

// ============================================================================
// Diesel Models
// ============================================================================

/// Insertable schema version
#[derive(Insertable)]
#[diesel(table_name = schema_versions)]
pub struct NewSchemaVersion<'a> {
    pub version: &'a str,
    pub name: &'a str,
    pub features: &'a str,
    pub introduced_at: &'a str,
}

/// Queryable schema version
#[derive(Queryable, Selectable, Debug, Clone, serde::Serialize)]
#[diesel(table_name = schema_versions)]
pub struct StoredSchema {
    pub id: i32,
    pub version: String,
    pub name: String,
    pub features: String,
    pub introduced_at: String,
}

#[derive(Queryable, Selectable, Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = storylets)]
#[diesel(treat_none_as_null = true)]
struct StoryletRow {
    id: String,
    title: String,
    description: String,
    content: String,
    arc_id: Option<String>,
    choices_json: String,
    triggers_json: String,
    effects_json: String,
    tags_json: String,
    priority: i32,
    estimated_play_time: Option<i32>,
    created_at: String,
    updated_at: String,
}

#[derive(Queryable, Selectable, Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = story_arcs)]
struct ArcRow {
    id: String,
    name: String,
    description: String,
    created_at: String,
    updated_at: String,
}

#[derive(Queryable, Selectable, Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = characters)]
#[diesel(treat_none_as_null = true)]
struct CharacterRow {
    id: String,
    name: String,
    description: String,
    role: Option<String>,
    traits_json: String,
    created_at: String,
    updated_at: String,
}

#[derive(Queryable, Selectable, Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = clues)]
#[diesel(treat_none_as_null = true)]
struct ClueRow {
    id: String,
    name: String,
    description: String,
    category: Option<String>,
    discovered: bool,
    created_at: String,
    updated_at: String,
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = minigame_attempts)]
struct AttemptRow {
    id: String,
    clue_id: String,
    kind: String,
    score: i32,
    success: bool,
    duration_ms: i64,
    created_at: String,
}

/// Decode a JSON column, falling back to the column default on corrupt data
fn decode_json<T: serde::de::DeserializeOwned + Default>(raw: &str, column: &str, id: &str) -> T {
    if raw.trim().is_empty() {
        return T::default();
    }
    serde_json::from_str(raw).unwrap_or_else(|e| {
        tracing::warn!(column, id, error = %e, "unreadable JSON column, using default");
        T::default()
    })
}

fn encode_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| DbError::Validation(format!("Could not encode JSON: {}", e)))
}

impl StoryletRow {
    fn from_model(s: &Storylet) -> Result<Self> {
        Ok(Self {
            id: s.id.clone(),
            title: s.title.clone(),
            description: s.description.clone(),
            content: s.content.clone(),
            arc_id: s.arc_id.clone(),
            choices_json: encode_json(&s.choices)?,
            triggers_json: encode_json(&s.triggers)?,
            effects_json: encode_json(&s.effects)?,
            tags_json: encode_json(&s.tags)?,
            priority: s.priority,
            estimated_play_time: s.estimated_play_time.and_then(|m| i32::try_from(m).ok()),
            created_at: s.created_at.clone(),
            updated_at: s.updated_at.clone(),
        })
    }

    fn into_model(self) -> Storylet {
        Storylet {
            choices: decode_json(&self.choices_json, "choices_json", &self.id),
            triggers: decode_json(&self.triggers_json, "triggers_json", &self.id),
            effects: decode_json(&self.effects_json, "effects_json", &self.id),
            tags: decode_json(&self.tags_json, "tags_json", &self.id),
            estimated_play_time: self.estimated_play_time.and_then(|m| u32::try_from(m).ok()),
            id: self.id,
            title: self.title,
            description: self.description,
            content: self.content,
            arc_id: self.arc_id,
            priority: self.priority,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl From<&StoryArc> for ArcRow {
    fn from(a: &StoryArc) -> Self {
        Self {
            id: a.id.clone(),
            name: a.name.clone(),
            description: a.description.clone(),
            created_at: a.created_at.clone(),
            updated_at: a.updated_at.clone(),
        }
    }
}

impl From<ArcRow> for StoryArc {
    fn from(r: ArcRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            description: r.description,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

impl CharacterRow {
    fn from_model(c: &Character) -> Result<Self> {
        Ok(Self {
            id: c.id.clone(),
            name: c.name.clone(),
            description: c.description.clone(),
            role: c.role.clone(),
            traits_json: encode_json(&c.traits)?,
            created_at: c.created_at.clone(),
            updated_at: c.updated_at.clone(),
        })
    }

    fn into_model(self) -> Character {
        Character {
            traits: decode_json(&self.traits_json, "traits_json", &self.id),
            id: self.id,
            name: self.name,
            description: self.description,
            role: self.role,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl From<&Clue> for ClueRow {
    fn from(c: &Clue) -> Self {
        Self {
            id: c.id.clone(),
            name: c.name.clone(),
            description: c.description.clone(),
            category: c.category.clone(),
            discovered: c.discovered,
            created_at: c.created_at.clone(),
            updated_at: c.updated_at.clone(),
        }
    }
}

impl From<ClueRow> for Clue {
    fn from(r: ClueRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            description: r.description,
            category: r.category,
            discovered: r.discovered,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

// ============================================================================
// Helper structs for raw SQL queries
// ============================================================================

/// Helper for PRAGMA table_info queries
#[derive(QueryableByName, Debug)]
struct PragmaTableInfo {
    #[diesel(sql_type = diesel::sql_types::Text)]
    name: String,
}

/// Helper for sqlite_master table queries
#[derive(QueryableByName, Debug)]
#[allow(dead_code)]
struct TableInfo {
    #[diesel(sql_type = diesel::sql_types::Text)]
    name: String,
}

// ============================================================================
// Database Connection
// ============================================================================

type DbPool = Pool<ConnectionManager<SqliteConnection>>;
type DbConn = PooledConnection<ConnectionManager<SqliteConnection>>;

/// Database connection wrapper with connection pool
pub struct Database {
    pool: DbPool,
}

/// Error type for database operations
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Query error: {0}")]
    Query(#[from] diesel::result::Error),
    #[error("Pool error: {0}")]
    Pool(#[from] diesel::r2d2::Error),
    #[error("{0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

impl Database {
    /// Get the database path that will be used
    pub fn db_path() -> std::path::PathBuf {
        get_db_path()
    }

    /// Open database at default path (respects STORYLOOM_DB_PATH env var)
    pub fn open() -> Result<Self> {
        let path = get_db_path();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| DbError::Connection(format!("Could not create {}: {}", parent.display(), e)))?;
            }
        }
        Self::open_at(&path)
    }

    /// Open database at specified path
    pub fn open_at<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let manager = ConnectionManager::<SqliteConnection>::new(&path_str);
        let pool = Pool::builder()
            .max_size(5)
            .build(manager)
            .map_err(|e| DbError::Connection(e.to_string()))?;

        let db = Self { pool };
        db.init_schema()?;
        // Upgrade AFTER create: CREATE IF NOT EXISTS leaves old tables untouched
        let added = db.migrate_backfill_columns()?;
        if added > 0 {
            tracing::info!(columns = added, "upgraded database schema");
        }
        db.register_schema(&CURRENT_SCHEMA)?;
        Ok(db)
    }

    fn get_conn(&self) -> Result<DbConn> {
        self.pool.get().map_err(|e| DbError::Connection(e.to_string()))
    }

    fn init_schema(&self) -> Result<()> {
        let mut conn = self.get_conn()?;

        diesel::sql_query(r#"
            CREATE TABLE IF NOT EXISTS schema_versions (
                id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
                version TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                features TEXT NOT NULL,
                introduced_at TEXT NOT NULL
            )
        "#).execute(&mut conn)?;

        diesel::sql_query(r#"
            CREATE TABLE IF NOT EXISTS storylets (
                id TEXT PRIMARY KEY NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                content TEXT NOT NULL DEFAULT '',
                arc_id TEXT,
                choices_json TEXT NOT NULL DEFAULT '[]',
                triggers_json TEXT NOT NULL DEFAULT '[]',
                effects_json TEXT NOT NULL DEFAULT '[]',
                tags_json TEXT NOT NULL DEFAULT '[]',
                priority INTEGER NOT NULL DEFAULT 0,
                estimated_play_time INTEGER,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (arc_id) REFERENCES story_arcs(id)
            )
        "#).execute(&mut conn)?;

        diesel::sql_query(r#"
            CREATE TABLE IF NOT EXISTS story_arcs (
                id TEXT PRIMARY KEY NOT NULL,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
        "#).execute(&mut conn)?;

        diesel::sql_query(r#"
            CREATE TABLE IF NOT EXISTS characters (
                id TEXT PRIMARY KEY NOT NULL,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                role TEXT,
                traits_json TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
        "#).execute(&mut conn)?;

        diesel::sql_query(r#"
            CREATE TABLE IF NOT EXISTS clues (
                id TEXT PRIMARY KEY NOT NULL,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                category TEXT,
                discovered INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
        "#).execute(&mut conn)?;

        diesel::sql_query(r#"
            CREATE TABLE IF NOT EXISTS minigame_attempts (
                id TEXT PRIMARY KEY NOT NULL,
                clue_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                score INTEGER NOT NULL,
                success INTEGER NOT NULL,
                duration_ms BIGINT NOT NULL,
                created_at TEXT NOT NULL
            )
        "#).execute(&mut conn)?;

        diesel::sql_query("CREATE INDEX IF NOT EXISTS idx_storylets_arc ON storylets(arc_id)").execute(&mut conn)?;
        diesel::sql_query("CREATE INDEX IF NOT EXISTS idx_attempts_clue ON minigame_attempts(clue_id)").execute(&mut conn)?;

        Ok(())
    }

    /// Add columns introduced after a table was first created and backfill
    /// empty timestamps. Returns the number of columns added.
    fn migrate_backfill_columns(&self) -> Result<usize> {
        let mut conn = self.get_conn()?;
        let mut added = 0;

        for (table, column, definition) in BACKFILL_COLUMNS {
            let columns: Vec<PragmaTableInfo> = diesel::sql_query(format!("PRAGMA table_info({})", table))
                .load(&mut conn)
                .unwrap_or_default();

            if columns.iter().any(|c| c.name == *column) {
                continue;
            }

            diesel::sql_query(format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, definition))
                .execute(&mut conn)?;
            added += 1;
        }

        // Rows written before updated_at existed
        diesel::sql_query("UPDATE storylets SET updated_at = created_at WHERE updated_at = ''")
            .execute(&mut conn)?;

        Ok(added)
    }

    fn register_schema(&self, schema: &ContentSchema) -> Result<()> {
        let mut conn = self.get_conn()?;
        let now = chrono::Local::now().to_rfc3339();
        let features_json = encode_json(&schema.features)?;

        let new_schema = NewSchemaVersion {
            version: &schema.version_string(),
            name: schema.name,
            features: &features_json,
            introduced_at: &now,
        };

        diesel::insert_or_ignore_into(schema_versions::table)
            .values(&new_schema)
            .execute(&mut conn)?;

        Ok(())
    }

    /// Every schema version this database has been opened with
    pub fn stored_schemas(&self) -> Result<Vec<StoredSchema>> {
        let mut conn = self.get_conn()?;
        let rows = schema_versions::table
            .order(schema_versions::id.asc())
            .load::<StoredSchema>(&mut conn)?;
        Ok(rows)
    }

    /// Does a table with this name exist?
    pub fn has_table(&self, name: &str) -> Result<bool> {
        let mut conn = self.get_conn()?;
        let tables: Vec<TableInfo> = diesel::sql_query(
            "SELECT name FROM sqlite_master WHERE type='table' AND name = ?",
        )
        .bind::<diesel::sql_types::Text, _>(name)
        .load(&mut conn)?;
        Ok(!tables.is_empty())
    }

    fn ensure_updated(affected: usize, kind: &str, id: &str) -> Result<()> {
        if affected == 0 {
            return Err(DbError::Validation(format!("{} {} does not exist", kind, id)));
        }
        Ok(())
    }
}

// ============================================================================
// Content operations
// ============================================================================

impl ContentBackend for Database {
    fn load_storylets(&self) -> crate::Result<Vec<Storylet>> {
        let mut conn = self.get_conn()?;
        let rows = storylets::table
            .order((storylets::created_at.asc(), storylets::id.asc()))
            .select(StoryletRow::as_select())
            .load(&mut conn)
            .map_err(DbError::from)?;
        Ok(rows.into_iter().map(StoryletRow::into_model).collect())
    }

    fn insert_storylet(&self, storylet: &Storylet) -> crate::Result<()> {
        let mut conn = self.get_conn()?;
        let row = StoryletRow::from_model(storylet)?;
        diesel::insert_into(storylets::table)
            .values(&row)
            .execute(&mut conn)
            .map_err(DbError::from)?;
        Ok(())
    }

    fn update_storylet(&self, storylet: &Storylet) -> crate::Result<()> {
        let mut conn = self.get_conn()?;
        let row = StoryletRow::from_model(storylet)?;
        let affected = diesel::update(storylets::table.find(row.id.as_str()))
            .set(&row)
            .execute(&mut conn)
            .map_err(DbError::from)?;
        Self::ensure_updated(affected, "Storylet", &storylet.id)?;
        Ok(())
    }

    fn delete_storylet(&self, id: &str) -> crate::Result<()> {
        let mut conn = self.get_conn()?;
        diesel::delete(storylets::table.find(id))
            .execute(&mut conn)
            .map_err(DbError::from)?;
        Ok(())
    }

    fn load_arcs(&self) -> crate::Result<Vec<StoryArc>> {
        let mut conn = self.get_conn()?;
        let rows = story_arcs::table
            .order((story_arcs::created_at.asc(), story_arcs::id.asc()))
            .select(ArcRow::as_select())
            .load(&mut conn)
            .map_err(DbError::from)?;
        Ok(rows.into_iter().map(StoryArc::from).collect())
    }

    fn insert_arc(&self, arc: &StoryArc) -> crate::Result<()> {
        let mut conn = self.get_conn()?;
        diesel::insert_into(story_arcs::table)
            .values(&ArcRow::from(arc))
            .execute(&mut conn)
            .map_err(DbError::from)?;
        Ok(())
    }

    fn update_arc(&self, arc: &StoryArc) -> crate::Result<()> {
        let mut conn = self.get_conn()?;
        let affected = diesel::update(story_arcs::table.find(arc.id.as_str()))
            .set(&ArcRow::from(arc))
            .execute(&mut conn)
            .map_err(DbError::from)?;
        Self::ensure_updated(affected, "Arc", &arc.id)?;
        Ok(())
    }

    fn delete_arc(&self, id: &str) -> crate::Result<()> {
        let mut conn = self.get_conn()?;
        diesel::delete(story_arcs::table.find(id))
            .execute(&mut conn)
            .map_err(DbError::from)?;
        Ok(())
    }

    fn load_characters(&self) -> crate::Result<Vec<Character>> {
        let mut conn = self.get_conn()?;
        let rows = characters::table
            .order((characters::created_at.asc(), characters::id.asc()))
            .select(CharacterRow::as_select())
            .load(&mut conn)
            .map_err(DbError::from)?;
        Ok(rows.into_iter().map(CharacterRow::into_model).collect())
    }

    fn insert_character(&self, character: &Character) -> crate::Result<()> {
        let mut conn = self.get_conn()?;
        let row = CharacterRow::from_model(character)?;
        diesel::insert_into(characters::table)
            .values(&row)
            .execute(&mut conn)
            .map_err(DbError::from)?;
        Ok(())
    }

    fn update_character(&self, character: &Character) -> crate::Result<()> {
        let mut conn = self.get_conn()?;
        let row = CharacterRow::from_model(character)?;
        let affected = diesel::update(characters::table.find(row.id.as_str()))
            .set(&row)
            .execute(&mut conn)
            .map_err(DbError::from)?;
        Self::ensure_updated(affected, "Character", &character.id)?;
        Ok(())
    }

    fn delete_character(&self, id: &str) -> crate::Result<()> {
        let mut conn = self.get_conn()?;
        diesel::delete(characters::table.find(id))
            .execute(&mut conn)
            .map_err(DbError::from)?;
        Ok(())
    }

    fn load_clues(&self) -> crate::Result<Vec<Clue>> {
        let mut conn = self.get_conn()?;
        let rows = clues::table
            .order((clues::created_at.asc(), clues::id.asc()))
            .select(ClueRow::as_select())
            .load(&mut conn)
            .map_err(DbError::from)?;
        Ok(rows.into_iter().map(Clue::from).collect())
    }

    fn insert_clue(&self, clue: &Clue) -> crate::Result<()> {
        let mut conn = self.get_conn()?;
        diesel::insert_into(clues::table)
            .values(&ClueRow::from(clue))
            .execute(&mut conn)
            .map_err(DbError::from)?;
        Ok(())
    }

    fn update_clue(&self, clue: &Clue) -> crate::Result<()> {
        let mut conn = self.get_conn()?;
        let affected = diesel::update(clues::table.find(clue.id.as_str()))
            .set(&ClueRow::from(clue))
            .execute(&mut conn)
            .map_err(DbError::from)?;
        Self::ensure_updated(affected, "Clue", &clue.id)?;
        Ok(())
    }

    fn delete_clue(&self, id: &str) -> crate::Result<()> {
        let mut conn = self.get_conn()?;
        diesel::delete(clues::table.find(id))
            .execute(&mut conn)
            .map_err(DbError::from)?;
        Ok(())
    }

    fn record_attempt(&self, attempt: &MinigameAttempt) -> crate::Result<()> {
        let mut conn = self.get_conn()?;
        let row = AttemptRow {
            id: attempt.id.clone(),
            clue_id: attempt.clue_id.clone(),
            kind: attempt.kind.clone(),
            score: i32::try_from(attempt.score).unwrap_or(i32::MAX),
            success: attempt.success,
            duration_ms: i64::try_from(attempt.duration_ms).unwrap_or(i64::MAX),
            created_at: attempt.created_at.clone(),
        };
        diesel::insert_into(minigame_attempts::table)
            .values(&row)
            .execute(&mut conn)
            .map_err(DbError::from)?;
        Ok(())
    }

    fn load_attempts(&self) -> crate::Result<Vec<MinigameAttempt>> {
        let mut conn = self.get_conn()?;
        let rows = minigame_attempts::table
            .order(minigame_attempts::created_at.asc())
            .select(AttemptRow::as_select())
            .load(&mut conn)
            .map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .map(|r| MinigameAttempt {
                id: r.id,
                clue_id: r.clue_id,
                kind: r.kind,
                score: u32::try_from(r.score).unwrap_or(0),
                success: r.success,
                duration_ms: u64::try_from(r.duration_ms).unwrap_or(0),
                created_at: r.created_at,
            })
            .collect())
    }
}
