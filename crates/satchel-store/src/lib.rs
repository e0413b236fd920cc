use chrono::Utc;
use rusqlite::{Connection, Error as SqlError, ErrorCode, OptionalExtension, params};
use satchel_api::{CollectionEntry, CollectionKind, CourseDetail, UserData};
use satchel_core::{SatchelError, SatchelResult};
use satchel_fs::WorkspacePaths;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSession {
    pub profile: String,
    pub server: String,
    pub email: String,
    pub authenticated_at: String,
    pub token: String,
    pub user: UserData,
}

/// Persisted view of one collection: the id set, the raw entries from the
/// last full listing, and whatever details hydration produced. Used to seed
/// the in-memory collection state between runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionSnapshot {
    #[serde(default)]
    pub ids: Vec<String>,
    #[serde(default)]
    pub entries: Vec<CollectionEntry>,
    #[serde(default)]
    pub items: Vec<CourseDetail>,
    pub fetched_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppState {
    pub last_auth_at: Option<String>,
    pub last_fetch_at: Option<String>,
    pub last_mutation_at: Option<String>,
    pub last_status: Option<String>,
}

impl AppState {
    pub fn mark_auth_ok(&mut self) {
        self.last_auth_at = Some(Utc::now().to_rfc3339());
        self.last_status = Some("authenticated".to_string());
    }

    pub fn mark_fetch_ok(&mut self) {
        self.last_fetch_at = Some(Utc::now().to_rfc3339());
        self.last_status = Some("ok".to_string());
    }

    pub fn mark_mutation_ok(&mut self) {
        self.last_mutation_at = Some(Utc::now().to_rfc3339());
        self.last_status = Some("ok".to_string());
    }

    pub fn mark_error(&mut self, message: &str) {
        self.last_status = Some(format!("error: {message}"));
    }
}

#[derive(Debug, Clone)]
pub struct SessionStore {
    db_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct EnvCredentials {
    pub email: String,
    pub password: String,
}

impl SessionStore {
    pub fn from_workspace(paths: &WorkspacePaths) -> SatchelResult<Self> {
        fs::create_dir_all(&paths.satchel_dir).map_err(|err| {
            SatchelError::io(format!(
                "failed to create workspace directory '{}': {}",
                paths.satchel_dir.display(),
                err
            ))
        })?;

        let store = Self {
            db_path: paths.state_db_path.clone(),
        };

        let conn = store.connection()?;
        store.initialize_schema(&conn)?;

        Ok(store)
    }

    pub fn load(&self, profile: &str) -> SatchelResult<Option<StoredSession>> {
        let key = profile_key(profile);
        let conn = self.connection()?;
        let payload = conn
            .query_row(
                "SELECT payload_json FROM sessions WHERE profile = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(|err| sqlite_error("load session", &self.db_path, err))?;

        let Some(payload) = payload else {
            return Ok(None);
        };

        let parsed = serde_json::from_str::<StoredSession>(&payload).map_err(|err| {
            SatchelError::io(format!(
                "failed to parse stored session in '{}': {}",
                self.db_path.display(),
                err
            ))
        })?;

        Ok(Some(parsed))
    }

    pub fn save(&self, profile: &str, session: &StoredSession) -> SatchelResult<()> {
        let key = profile_key(profile);
        let payload = serde_json::to_string(session)
            .map_err(|err| SatchelError::io(format!("failed to serialize session data: {err}")))?;

        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO sessions (profile, payload_json, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(profile) DO UPDATE SET payload_json = excluded.payload_json, updated_at = excluded.updated_at",
            params![key, payload, Utc::now().to_rfc3339()],
        )
        .map_err(|err| sqlite_error("save session", &self.db_path, err))?;

        Ok(())
    }

    pub fn remove(&self, profile: &str) -> SatchelResult<()> {
        let key = profile_key(profile);
        let conn = self.connection()?;
        conn.execute("DELETE FROM sessions WHERE profile = ?1", params![key])
            .map_err(|err| sqlite_error("remove session", &self.db_path, err))?;
        Ok(())
    }

    /// The auth gate: synchronous access to the signed-in user, if any.
    /// Collection operations consult this before touching the network.
    pub fn current_user(&self, profile: &str) -> SatchelResult<Option<UserData>> {
        Ok(self.load(profile)?.map(|session| session.user))
    }

    pub fn load_snapshot(
        &self,
        profile: &str,
        kind: CollectionKind,
    ) -> SatchelResult<Option<CollectionSnapshot>> {
        let key = profile_key(profile);
        let conn = self.connection()?;
        let payload = conn
            .query_row(
                "SELECT payload_json FROM collection_state WHERE profile = ?1 AND collection = ?2",
                params![key, kind.path_segment()],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(|err| sqlite_error("load collection snapshot", &self.db_path, err))?;

        let Some(payload) = payload else {
            return Ok(None);
        };

        let parsed = serde_json::from_str::<CollectionSnapshot>(&payload).map_err(|err| {
            SatchelError::io(format!(
                "failed to parse collection snapshot in '{}': {}",
                self.db_path.display(),
                err
            ))
        })?;

        Ok(Some(parsed))
    }

    pub fn save_snapshot(
        &self,
        profile: &str,
        kind: CollectionKind,
        snapshot: &CollectionSnapshot,
    ) -> SatchelResult<()> {
        let key = profile_key(profile);
        let payload = serde_json::to_string(snapshot).map_err(|err| {
            SatchelError::io(format!("failed to encode collection snapshot: {err}"))
        })?;

        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO collection_state (profile, collection, payload_json, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(profile, collection) DO UPDATE SET payload_json = excluded.payload_json, updated_at = excluded.updated_at",
            params![key, kind.path_segment(), payload, Utc::now().to_rfc3339()],
        )
        .map_err(|err| sqlite_error("save collection snapshot", &self.db_path, err))?;

        Ok(())
    }

    pub fn clear_snapshot(&self, profile: &str, kind: CollectionKind) -> SatchelResult<()> {
        let key = profile_key(profile);
        let conn = self.connection()?;
        conn.execute(
            "DELETE FROM collection_state WHERE profile = ?1 AND collection = ?2",
            params![key, kind.path_segment()],
        )
        .map_err(|err| sqlite_error("clear collection snapshot", &self.db_path, err))?;
        Ok(())
    }

    pub fn clear_all_snapshots(&self, profile: &str) -> SatchelResult<()> {
        let key = profile_key(profile);
        let conn = self.connection()?;
        conn.execute(
            "DELETE FROM collection_state WHERE profile = ?1",
            params![key],
        )
        .map_err(|err| sqlite_error("clear collection snapshots", &self.db_path, err))?;
        Ok(())
    }

    pub fn load_app_state(&self, profile: &str) -> SatchelResult<AppState> {
        let key = profile_key(profile);
        let conn = self.connection()?;
        let payload = conn
            .query_row(
                "SELECT payload_json FROM app_state WHERE profile = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(|err| sqlite_error("load app state", &self.db_path, err))?;

        let Some(payload) = payload else {
            return Ok(AppState::default());
        };

        serde_json::from_str::<AppState>(&payload).map_err(|err| {
            SatchelError::io(format!(
                "failed to parse app state in '{}': {}",
                self.db_path.display(),
                err
            ))
        })
    }

    pub fn save_app_state(&self, profile: &str, state: &AppState) -> SatchelResult<()> {
        let key = profile_key(profile);
        let payload = serde_json::to_string(state)
            .map_err(|err| SatchelError::io(format!("failed to serialize app state: {err}")))?;

        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO app_state (profile, payload_json, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(profile) DO UPDATE SET payload_json = excluded.payload_json, updated_at = excluded.updated_at",
            params![key, payload, Utc::now().to_rfc3339()],
        )
        .map_err(|err| sqlite_error("save app state", &self.db_path, err))?;

        Ok(())
    }

    fn connection(&self) -> SatchelResult<Connection> {
        Connection::open(&self.db_path)
            .map_err(|err| sqlite_error("open state database", &self.db_path, err))
    }

    fn initialize_schema(&self, conn: &Connection) -> SatchelResult<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             CREATE TABLE IF NOT EXISTS sessions (
                 profile TEXT PRIMARY KEY,
                 payload_json TEXT NOT NULL,
                 updated_at TEXT NOT NULL
             );
             CREATE TABLE IF NOT EXISTS collection_state (
                 profile TEXT NOT NULL,
                 collection TEXT NOT NULL,
                 payload_json TEXT NOT NULL,
                 updated_at TEXT NOT NULL,
                 PRIMARY KEY (profile, collection)
             );
             CREATE TABLE IF NOT EXISTS app_state (
                 profile TEXT PRIMARY KEY,
                 payload_json TEXT NOT NULL,
                 updated_at TEXT NOT NULL
             );",
        )
        .map_err(|err| sqlite_error("initialize schema", &self.db_path, err))?;

        Ok(())
    }
}

pub fn resolve_env_credentials(workspace_root: &Path) -> SatchelResult<Option<EnvCredentials>> {
    if let Some(creds) = credentials_from_env() {
        return Ok(Some(creds));
    }

    if let Some(path) = resolve_env_file(workspace_root) {
        let values = load_env_file(&path)?;
        let email = values.get("SATCHEL_EMAIL").cloned();
        let password = values.get("SATCHEL_PASSWORD").cloned();

        if let (Some(email), Some(password)) = (email, password)
            && !email.trim().is_empty()
            && !password.is_empty()
        {
            return Ok(Some(EnvCredentials { email, password }));
        }
    }

    Ok(None)
}

fn credentials_from_env() -> Option<EnvCredentials> {
    let email = std::env::var("SATCHEL_EMAIL").ok()?;
    let password = std::env::var("SATCHEL_PASSWORD").ok()?;

    if email.trim().is_empty() || password.is_empty() {
        return None;
    }

    Some(EnvCredentials { email, password })
}

fn resolve_env_file(workspace_root: &Path) -> Option<PathBuf> {
    if let Ok(path) = std::env::var("SATCHEL_ENV_FILE") {
        let candidate = PathBuf::from(path);
        if candidate.is_file() {
            return Some(candidate);
        }
    }

    if let Ok(cwd) = std::env::current_dir()
        && let Some(found) = search_upwards_for(&cwd, Path::new(".env"))
    {
        return Some(found);
    }

    search_upwards_for(workspace_root, Path::new(".env"))
}

fn search_upwards_for(start: &Path, relative_path: &Path) -> Option<PathBuf> {
    let mut cursor = Some(start);

    while let Some(path) = cursor {
        let candidate = path.join(relative_path);
        if candidate.exists() {
            return Some(candidate);
        }
        cursor = path.parent();
    }

    None
}

fn load_env_file(path: &Path) -> SatchelResult<BTreeMap<String, String>> {
    let raw = fs::read_to_string(path).map_err(|err| {
        SatchelError::io(format!(
            "failed to read env file '{}': {}",
            path.display(),
            err
        ))
    })?;

    let mut vars = BTreeMap::new();
    for line in raw.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let Some((key, value)) = trimmed.split_once('=') else {
            continue;
        };

        let key = key.trim();
        if key.is_empty() {
            continue;
        }

        let mut value = value.trim().to_string();
        if (value.starts_with('"') && value.ends_with('"'))
            || (value.starts_with('\'') && value.ends_with('\''))
        {
            value = value[1..value.len() - 1].to_string();
        }

        vars.insert(key.to_string(), value);
    }

    Ok(vars)
}

fn sqlite_error(action: &str, db_path: &Path, err: SqlError) -> SatchelError {
    if let SqlError::SqliteFailure(code, message) = &err
        && (code.code == ErrorCode::DatabaseCorrupt || code.code == ErrorCode::NotADatabase)
    {
        let detail = message.as_deref().unwrap_or("sqlite reported corruption");
        return SatchelError::io(format!(
            "failed to {action}: state database '{}' is corrupted ({detail}); remove '.satchel/state.db' and sign in again to rebuild local state",
            db_path.display()
        ));
    }

    SatchelError::io(format!(
        "failed to {action} using state database '{}': {}",
        db_path.display(),
        err
    ))
}

fn profile_key(profile: &str) -> String {
    let mut output = String::with_capacity(profile.len());
    for ch in profile.chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
            output.push(ch);
        } else {
            output.push('_');
        }
    }

    if output.is_empty() {
        "default".to_string()
    } else {
        output
    }
}
