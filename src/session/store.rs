use crate::error::EnhanceError;
use crate::session::{SessionRecord, SCHEMA_VERSION};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct SessionStore {
    root: PathBuf,
}

impl SessionStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, EnhanceError> {
        let root = root.into();
        fs::create_dir_all(&root)
            .map_err(|err| EnhanceError::storage("failed to create session directory", err))?;
        Ok(Self { root })
    }

    fn slot_path(&self) -> PathBuf {
        self.root.join("session.json")
    }

    pub fn put(&self, record: &SessionRecord) -> Result<(), EnhanceError> {
        let final_path = self.slot_path();
        let tmp_path = self.root.join("session.json.tmp");
        let bytes = serde_json::to_vec_pretty(record)
            .map_err(|err| EnhanceError::storage("failed to serialize session", err))?;

        fs::write(&tmp_path, bytes)
            .map_err(|err| EnhanceError::storage("failed to write session", err))?;
        match fs::rename(&tmp_path, &final_path) {
            Ok(()) => Ok(()),
            Err(rename_err) => {
                if final_path.exists() {
                    fs::remove_file(&final_path)
                        .and_then(|()| fs::rename(&tmp_path, &final_path))
                        .map_err(|err| EnhanceError::storage("failed to replace session", err))
                } else {
                    Err(EnhanceError::storage("failed to write session", rename_err))
                }
            }
        }
    }

    pub fn get(&self) -> Result<Option<SessionRecord>, EnhanceError> {
        let path = self.slot_path();
        if !path.exists() {
            return Ok(None);
        }
        read_record(&path).map(Some)
    }

    pub fn clear(&self) -> Result<(), EnhanceError> {
        let path = self.slot_path();
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(EnhanceError::storage("failed to clear session", err)),
        }
    }
}

fn read_record(path: &Path) -> Result<SessionRecord, EnhanceError> {
    let data = fs::read(path)
        .map_err(|err| EnhanceError::storage("failed to read session", err))?;
    let record: SessionRecord = serde_json::from_slice(&data)
        .map_err(|err| EnhanceError::storage("failed to parse session", err))?;
    if record.schema_version != SCHEMA_VERSION {
        return Err(EnhanceError::Storage(format!(
            "unknown session schema_version: {}",
            record.schema_version
        )));
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::EnhancementMode;

    #[test]
    fn empty_slot_reads_as_none() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        let store = SessionStore::open(dir.path()).expect("store should open");
        assert_eq!(store.get().expect("empty slot should read"), None);
    }

    #[test]
    fn put_then_get_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        let store = SessionStore::open(dir.path()).expect("store should open");

        let record = SessionRecord::new("chef@example.com");
        store.put(&record).expect("put should succeed");
        assert_eq!(store.get().expect("slot should read"), Some(record));
    }

    #[test]
    fn put_overwrites_the_single_slot() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        let store = SessionStore::open(dir.path()).expect("store should open");

        store
            .put(&SessionRecord::new("first@example.com"))
            .expect("first put should succeed");
        let mut second = SessionRecord::new("second@example.com");
        second.mode = EnhancementMode::QualityFix;
        store.put(&second).expect("second put should succeed");

        assert_eq!(store.get().expect("slot should read"), Some(second));
    }

    #[test]
    fn clear_empties_the_slot_and_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        let store = SessionStore::open(dir.path()).expect("store should open");

        store
            .put(&SessionRecord::new("chef@example.com"))
            .expect("put should succeed");
        store.clear().expect("clear should succeed");
        assert_eq!(store.get().expect("slot should read"), None);
        store.clear().expect("clearing an empty slot should succeed");
    }

    #[test]
    fn unknown_schema_version_is_a_storage_error() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        let store = SessionStore::open(dir.path()).expect("store should open");
        std::fs::write(
            dir.path().join("session.json"),
            r#"{"schema_version":99,"email":"chef@example.com","mode":"fine_dining"}"#,
        )
        .expect("fixture should write");

        let err = store.get().expect_err("unknown schema should fail");
        assert!(matches!(err, EnhanceError::Storage(_)));
    }
}
