use std::{
    collections::BTreeMap,
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use {
    serde_json::Value,
    tokio::sync::Mutex,
    tracing::{debug, warn},
};

#[cfg(feature = "metrics")]
use parley_metrics::{counter, session as session_metrics};

use crate::{
    entry::{SessionEntry, SessionPatch},
    error::{Error, Result},
    key::SessionKey,
};

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// In-memory view of one store file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionMap {
    entries: BTreeMap<String, SessionEntry>,
    /// Entries that failed to decode, written back untouched.
    undecodable: BTreeMap<String, Value>,
}

impl SessionMap {
    pub fn get(&self, key: &SessionKey) -> Option<&SessionEntry> {
        self.entries.get(key.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SessionEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Apply `patch` to the entry for `key`, creating it with a fresh session id
    /// when missing. `updatedAt` always moves forward.
    pub fn merge(&mut self, key: &SessionKey, patch: SessionPatch) -> SessionEntry {
        let now = now_ms();
        self.undecodable.remove(key.as_str());
        let entry = self
            .entries
            .entry(key.as_str().to_string())
            .and_modify(|e| e.updated_at = now.max(e.updated_at.saturating_add(1)))
            .or_insert_with(|| {
                debug!(session_key = %key, "creating session entry");
                #[cfg(feature = "metrics")]
                counter!(session_metrics::CREATED_TOTAL).increment(1);
                SessionEntry::new(uuid::Uuid::new_v4().to_string(), now)
            });
        patch.apply(entry);
        entry.clone()
    }

    fn from_value(path: &Path, value: Value) -> Self {
        let Value::Object(object) = value else {
            warn!(path = %path.display(), "session store is not a JSON object, ignoring");
            return Self::default();
        };
        let mut map = Self::default();
        for (key, raw) in object {
            match serde_json::from_value::<SessionEntry>(raw.clone()) {
                Ok(entry) => {
                    map.entries.insert(key, entry);
                },
                Err(e) => {
                    warn!(path = %path.display(), session_key = %key, error = %e, "undecodable session entry kept as-is");
                    map.undecodable.insert(key, raw);
                },
            }
        }
        map
    }

    fn to_value(&self) -> Result<Value> {
        let mut object = serde_json::Map::new();
        for (key, raw) in &self.undecodable {
            object.insert(key.clone(), raw.clone());
        }
        for (key, entry) in &self.entries {
            object.insert(key.clone(), serde_json::to_value(entry)?);
        }
        Ok(Value::Object(object))
    }
}

/// Read a store file. Missing or malformed files yield an empty map.
pub fn load(path: &Path) -> SessionMap {
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => return SessionMap::default(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read session store, treating as empty");
            #[cfg(feature = "metrics")]
            counter!(session_metrics::STORE_LOAD_ERRORS_TOTAL).increment(1);
            return SessionMap::default();
        },
    };
    if data.trim().is_empty() {
        return SessionMap::default();
    }
    match serde_json::from_str::<Value>(&data) {
        Ok(value) => SessionMap::from_value(path, value),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "malformed session store, treating as empty");
            #[cfg(feature = "metrics")]
            counter!(session_metrics::STORE_LOAD_ERRORS_TOTAL).increment(1);
            SessionMap::default()
        },
    }
}

/// Write a store file atomically: temp file in the same directory, fsync, rename.
pub fn save(path: &Path, map: &SessionMap) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)
        .map_err(|e| Error::io(format!("create {}", dir.display()), e))?;

    let data = serde_json::to_string_pretty(&map.to_value()?)?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("sessions.json");
    let tmp = dir.join(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4().simple()));

    let written = fs::File::create(&tmp).and_then(|mut file| {
        file.write_all(data.as_bytes())?;
        file.write_all(b"\n")?;
        file.sync_all()
    });
    if let Err(e) = written.and_then(|()| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(Error::io(format!("write {}", path.display()), e));
    }

    #[cfg(feature = "metrics")]
    counter!(session_metrics::STORE_WRITES_TOTAL).increment(1);
    debug!(path = %path.display(), entries = map.len(), "saved session store");
    Ok(())
}

/// Async handle on one store file.
///
/// Writers going through the same handle are serialized; other processes
/// writing the same file are not coordinated with (last writer wins).
pub struct SessionStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl SessionStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<SessionMap> {
        let path = self.path.clone();
        Ok(tokio::task::spawn_blocking(move || load(&path)).await?)
    }

    pub async fn get(&self, key: &SessionKey) -> Result<Option<SessionEntry>> {
        Ok(self.load().await?.get(key).cloned())
    }

    /// Load, merge `patch` into `key`, and save.
    pub async fn update(&self, key: &SessionKey, patch: SessionPatch) -> Result<SessionEntry> {
        let _guard = self.write_lock.lock().await;
        let path = self.path.clone();
        let key = key.clone();
        tokio::task::spawn_blocking(move || -> Result<SessionEntry> {
            let mut map = load(&path);
            let entry = map.merge(&key, patch);
            save(&path, &map)?;
            Ok(entry)
        })
        .await?
    }

    /// Entry for `key`, creating and persisting it when missing.
    pub async fn get_or_create(&self, key: &SessionKey) -> Result<SessionEntry> {
        if let Some(entry) = self.get(key).await? {
            return Ok(entry);
        }
        self.update(key, SessionPatch::touch()).await
    }

    /// All entries, most recently updated first.
    pub async fn list(&self) -> Result<Vec<(SessionKey, SessionEntry)>> {
        let map = self.load().await?;
        let mut entries: Vec<_> = map
            .iter()
            .map(|(k, v)| (SessionKey::new(k), v.clone()))
            .collect();
        entries.sort_by(|a, b| b.1.updated_at.cmp(&a.1.updated_at));
        Ok(entries)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::entry::QueueOverride,
        parley_common::{DropPolicy, QueueMode, ThinkLevel},
    };

    fn key(raw: &str) -> SessionKey {
        SessionKey::new(raw)
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(&dir.path().join("sessions.json")).is_empty());
    }

    #[test]
    fn malformed_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");
        fs::write(&path, "{not json").unwrap();
        assert!(load(&path).is_empty());
        fs::write(&path, "[1,2,3]").unwrap();
        assert!(load(&path).is_empty());
    }

    #[test]
    fn merge_then_reload_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agents/main/sessions/sessions.json");

        let mut map = load(&path);
        let k = key("agent:main:main");
        map.merge(&k, SessionPatch::model("openai", "gpt-5.2"));
        map.merge(&k, SessionPatch::thinking(ThinkLevel::Low));
        map.merge(
            &k,
            SessionPatch::queue(QueueOverride {
                mode: Some(QueueMode::Collect),
                debounce_ms: Some(1500),
                cap: Some(9),
                drop: Some(DropPolicy::Summarize),
            }),
        );
        save(&path, &map).unwrap();

        let reloaded = load(&path);
        assert_eq!(reloaded, map);
        let entry = reloaded.get(&k).unwrap();
        assert_eq!(entry.provider_override.as_deref(), Some("openai"));
        assert_eq!(entry.thinking_override, Some(ThinkLevel::Low));
        assert_eq!(entry.queue_override.as_ref().unwrap().cap, Some(9));
    }

    #[test]
    fn updated_at_strictly_increases() {
        let mut map = SessionMap::default();
        let k = key("agent:main:main");
        let mut last = map.merge(&k, SessionPatch::touch()).updated_at;
        for _ in 0..50 {
            let next = map.merge(&k, SessionPatch::touch()).updated_at;
            assert!(next > last, "{next} <= {last}");
            last = next;
        }
    }

    #[test]
    fn merge_keeps_session_id() {
        let mut map = SessionMap::default();
        let k = key("agent:main:main");
        let first = map.merge(&k, SessionPatch::touch());
        let second = map.merge(&k, SessionPatch::aborted(true));
        assert_eq!(first.session_id, second.session_id);
        assert!(second.aborted_last_run);
        assert!(!first.session_id.is_empty());
    }

    #[test]
    fn undecodable_entries_survive_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");
        fs::write(
            &path,
            r#"{"agent:main:main":{"sessionId":"a","updatedAt":1},"agent:main:odd":{"sessionId":7}}"#,
        )
        .unwrap();

        let mut map = load(&path);
        assert_eq!(map.len(), 1);
        map.merge(&key("agent:main:main"), SessionPatch::touch());
        save(&path, &map).unwrap();

        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["agent:main:odd"], serde_json::json!({"sessionId": 7}));
    }

    #[test]
    fn save_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");
        let mut map = SessionMap::default();
        map.merge(&key("agent:main:main"), SessionPatch::touch());
        save(&path, &map).unwrap();
        save(&path, &map).unwrap();
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["sessions.json".to_string()]);
    }

    #[test]
    fn save_into_unwritable_location_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "file, not a dir").unwrap();
        let path = blocker.join("sessions.json");
        assert!(save(&path, &SessionMap::default()).is_err());
    }

    #[tokio::test]
    async fn store_update_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("sessions.json"));

        store
            .update(&key("agent:main:main"), SessionPatch::touch())
            .await
            .unwrap();
        store
            .update(
                &key("agent:main:telegram:group:1"),
                SessionPatch::model("anthropic", "claude-opus-4-5"),
            )
            .await
            .unwrap();

        let list = store.list().await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].0.as_str(), "agent:main:telegram:group:1");

        let created = store.get_or_create(&key("agent:main:main")).await.unwrap();
        assert_eq!(store.list().await.unwrap().len(), 2);
        assert_eq!(
            store.get(&key("agent:main:main")).await.unwrap().unwrap().session_id,
            created.session_id
        );
    }

    #[tokio::test]
    async fn concurrent_updates_through_one_handle_are_not_lost() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(SessionStore::new(dir.path().join("sessions.json")));
        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .update(&key(&format!("agent:main:peer{i}")), SessionPatch::touch())
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(store.load().await.unwrap().len(), 8);
    }
}
