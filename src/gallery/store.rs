use crate::error::EnhanceError;
use crate::gallery::EnhancedImage;
use std::ffi::OsStr;
use std::fs;
use std::path::PathBuf;
use tracing::warn;

// One JSON file per record under the store root, named by record id.
// Inserting an existing id overwrites its file.
#[derive(Debug, Clone)]
pub struct GalleryStore {
    root: PathBuf,
}

impl GalleryStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, EnhanceError> {
        let root = root.into();
        fs::create_dir_all(&root)
            .map_err(|err| EnhanceError::storage("failed to create gallery directory", err))?;
        Ok(Self { root })
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }

    pub fn insert(&self, record: &EnhancedImage) -> Result<(), EnhanceError> {
        let final_path = self.record_path(&record.id);
        let tmp_path = self.root.join(format!("{}.json.tmp", record.id));
        let bytes = serde_json::to_vec(record)
            .map_err(|err| EnhanceError::storage("failed to serialize gallery record", err))?;

        fs::write(&tmp_path, bytes)
            .map_err(|err| EnhanceError::storage("failed to write gallery record", err))?;
        match fs::rename(&tmp_path, &final_path) {
            Ok(()) => Ok(()),
            Err(rename_err) => {
                if final_path.exists() {
                    fs::remove_file(&final_path)
                        .and_then(|()| fs::rename(&tmp_path, &final_path))
                        .map_err(|err| {
                            EnhanceError::storage("failed to replace gallery record", err)
                        })
                } else {
                    Err(EnhanceError::storage(
                        "failed to write gallery record",
                        rename_err,
                    ))
                }
            }
        }
    }

    pub fn list_all(&self) -> Result<Vec<EnhancedImage>, EnhanceError> {
        let entries = fs::read_dir(&self.root)
            .map_err(|err| EnhanceError::storage("failed to read gallery directory", err))?;

        let mut records = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension() != Some(OsStr::new("json")) {
                continue;
            }
            let data = match fs::read(&path) {
                Ok(data) => data,
                Err(err) => {
                    warn!(path = %path.display(), %err, "skipping unreadable gallery record");
                    continue;
                }
            };
            match serde_json::from_slice::<EnhancedImage>(&data) {
                Ok(record) => records.push(record),
                Err(err) => {
                    warn!(path = %path.display(), %err, "skipping corrupt gallery record");
                }
            }
        }
        Ok(records)
    }

    pub fn clear_all(&self) -> Result<(), EnhanceError> {
        let entries = fs::read_dir(&self.root)
            .map_err(|err| EnhanceError::storage("failed to read gallery directory", err))?;

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension() != Some(OsStr::new("json")) {
                continue;
            }
            fs::remove_file(&path)
                .map_err(|err| EnhanceError::storage("failed to remove gallery record", err))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::InlinePayload;

    fn record(tag: &str) -> EnhancedImage {
        EnhancedImage::new(
            InlinePayload::from_bytes("image/png", tag.as_bytes()),
            InlinePayload::from_bytes("image/jpeg", b"upload"),
        )
    }

    #[test]
    fn listing_after_n_inserts_has_n_distinct_ids() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        let store = GalleryStore::open(dir.path()).expect("store should open");

        for i in 0..5 {
            store
                .insert(&record(&format!("generated-{i}")))
                .expect("insert should succeed");
        }

        let listed = store.list_all().expect("listing should succeed");
        assert_eq!(listed.len(), 5);
        let mut ids: Vec<&str> = listed.iter().map(|r| r.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 5);
    }

    #[test]
    fn clear_all_empties_the_store() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        let store = GalleryStore::open(dir.path()).expect("store should open");

        store.insert(&record("a")).expect("insert should succeed");
        store.insert(&record("b")).expect("insert should succeed");
        store.clear_all().expect("clear should succeed");

        assert!(store.list_all().expect("listing should succeed").is_empty());
        store.clear_all().expect("clearing an empty store should succeed");
    }

    #[test]
    fn inserting_an_existing_id_overwrites_it() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        let store = GalleryStore::open(dir.path()).expect("store should open");

        let first = record("first");
        store.insert(&first).expect("insert should succeed");

        let mut replacement = record("second");
        replacement.id = first.id.clone();
        store.insert(&replacement).expect("upsert should succeed");

        let listed = store.list_all().expect("listing should succeed");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].image, replacement.image);
    }

    #[test]
    fn corrupt_record_files_are_skipped() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        let store = GalleryStore::open(dir.path()).expect("store should open");

        store.insert(&record("good")).expect("insert should succeed");
        std::fs::write(dir.path().join("img_0_bad.json"), b"{ not json")
            .expect("fixture should write");

        let listed = store.list_all().expect("listing should succeed");
        assert_eq!(listed.len(), 1);
    }

    #[test]
    fn records_survive_reopening_the_store() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        let stored = record("persisted");
        {
            let store = GalleryStore::open(dir.path()).expect("store should open");
            store.insert(&stored).expect("insert should succeed");
        }

        let reopened = GalleryStore::open(dir.path()).expect("store should reopen");
        let listed = reopened.list_all().expect("listing should succeed");
        assert_eq!(listed, vec![stored]);
    }
}
