//! Implements PublicationStore using a single JSON document.
//!
//! Layout: `{ "groups": [...], "publications": [...], "schedule": { id: {...} } }`.
//! The whole document is rewritten after every mutation (write-replace, see `write_atomic`).

use crate::domain::{
    DomainError, FireSummary, Group, NewPublication, Publication, PublicationId, ScheduleEntry,
    ScheduledPublication, TimeOfDay,
};
use crate::ports::PublicationStore;
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(default)]
    groups: Vec<Group>,
    #[serde(default)]
    publications: Vec<Publication>,
    #[serde(default)]
    schedule: BTreeMap<PublicationId, ScheduleEntry>,
}

impl StoreDocument {
    /// Restore the one-to-one pairing between publications and schedule entries and
    /// drop duplicate group handles. Returns true if anything changed.
    fn repair(&mut self) -> bool {
        let ids: HashSet<PublicationId> = self.publications.iter().map(|p| p.id.clone()).collect();
        let before = self.schedule.len();
        self.schedule.retain(|id, _| ids.contains(id));
        let mut changed = self.schedule.len() != before;
        for id in ids {
            if !self.schedule.contains_key(&id) {
                self.schedule.insert(id, ScheduleEntry::default());
                changed = true;
            }
        }

        let mut seen = HashSet::new();
        let groups_before = self.groups.len();
        self.groups.retain(|g| seen.insert(g.handle.clone()));
        changed || self.groups.len() != groups_before
    }

    /// `pub_<unix millis>`, bumped above every existing id so ids never repeat.
    fn next_id(&self) -> PublicationId {
        let now_ms = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
        let floor = self
            .publications
            .iter()
            .filter_map(|p| p.id.sequence())
            .max()
            .map_or(0, |max| max + 1);
        PublicationId::from_sequence(now_ms.max(floor))
    }

    fn publication_mut(&mut self, id: &PublicationId) -> Result<&mut Publication, DomainError> {
        self.publications
            .iter_mut()
            .find(|p| &p.id == id)
            .ok_or_else(|| DomainError::NotFound(format!("publication {}", id)))
    }

    fn entry_mut(&mut self, id: &PublicationId) -> Result<&mut ScheduleEntry, DomainError> {
        self.schedule
            .get_mut(id)
            .ok_or_else(|| DomainError::NotFound(format!("publication {}", id)))
    }
}

/// What `JsonStore::load` found on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded,
    /// Loaded, but orphaned or missing schedule entries had to be fixed.
    Repaired,
    /// File was missing, empty, unreadable or corrupt; the empty default was written.
    Initialized,
}

/// JSON file-based publication store.
pub struct JsonStore {
    path: PathBuf,
    cache: tokio::sync::RwLock<StoreDocument>,
}

impl JsonStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            cache: tokio::sync::RwLock::new(StoreDocument::default()),
        }
    }

    /// Create the store and load it from disk.
    pub async fn open(path: impl AsRef<Path>) -> Self {
        let store = Self::new(path);
        store.load().await;
        store
    }

    /// Load state from disk. Never fails: anything unusable is replaced by the empty
    /// default, which is persisted immediately. A corrupt file is kept aside as `<file>.corrupt`.
    pub async fn load(&self) -> LoadOutcome {
        let mut cache = self.cache.write().await;
        let (mut doc, outcome) = match fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => {
                info!(path = %self.path.display(), "store file empty, initializing");
                (StoreDocument::default(), LoadOutcome::Initialized)
            }
            Ok(bytes) => match serde_json::from_slice::<StoreDocument>(&bytes) {
                Ok(doc) => (doc, LoadOutcome::Loaded),
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "store file corrupt, reinitializing");
                    self.quarantine().await;
                    (StoreDocument::default(), LoadOutcome::Initialized)
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "no store file, initializing");
                (StoreDocument::default(), LoadOutcome::Initialized)
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "store file unreadable, reinitializing");
                self.quarantine().await;
                (StoreDocument::default(), LoadOutcome::Initialized)
            }
        };

        let outcome = if doc.repair() && outcome == LoadOutcome::Loaded {
            warn!("store had orphaned or missing schedule entries; repaired");
            LoadOutcome::Repaired
        } else {
            outcome
        };

        if outcome != LoadOutcome::Loaded {
            if let Err(e) = write_atomic(&self.path, &doc).await {
                error!(path = %self.path.display(), error = %e, "failed to persist store after load");
            }
        }

        info!(
            groups = doc.groups.len(),
            publications = doc.publications.len(),
            ?outcome,
            "store loaded"
        );
        *cache = doc;
        outcome
    }

    async fn quarantine(&self) {
        let target = sibling_with_suffix(&self.path, ".corrupt");
        if let Err(e) = fs::rename(&self.path, &target).await {
            warn!(path = %target.display(), error = %e, "could not keep corrupt store file aside");
        }
    }

    /// Run one read-modify-write under the write lock. The change is applied to a copy,
    /// persisted, and only then swapped in; on failure the cache is left untouched.
    async fn mutate<T, F>(&self, f: F) -> Result<T, DomainError>
    where
        T: Send,
        F: FnOnce(&mut StoreDocument) -> Result<T, DomainError> + Send,
    {
        let mut cache = self.cache.write().await;
        let mut next = cache.clone();
        let out = f(&mut next)?;
        if next != *cache {
            write_atomic(&self.path, &next).await?;
            *cache = next;
        }
        Ok(out)
    }
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Atomic save using write-replace pattern.
/// 1. Write to temp file
/// 2. sync_all() to ensure flush to disk
/// 3. Atomic rename to target path
///
/// Readers of the target path never observe a partially written document.
async fn write_atomic(path: &Path, doc: &StoreDocument) -> Result<(), DomainError> {
    let json = serde_json::to_string_pretty(doc).map_err(|e| DomainError::Store(e.to_string()))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| DomainError::Store(format!("create store directory: {}", e)))?;
    }

    let temp_path = sibling_with_suffix(path, ".tmp");
    let mut f = fs::File::create(&temp_path)
        .await
        .map_err(|e| DomainError::Store(format!("create temp file: {}", e)))?;
    f.write_all(json.as_bytes())
        .await
        .map_err(|e| DomainError::Store(format!("write temp file: {}", e)))?;
    f.sync_all()
        .await
        .map_err(|e| DomainError::Store(format!("sync temp file: {}", e)))?;
    drop(f);

    fs::rename(&temp_path, path)
        .await
        .map_err(|e| DomainError::Store(format!("atomic rename failed: {}", e)))?;
    debug!(path = %path.display(), bytes = json.len(), "store saved");
    Ok(())
}

#[async_trait::async_trait]
impl PublicationStore for JsonStore {
    async fn add_group(&self, group: Group) -> Result<bool, DomainError> {
        self.mutate(|doc| {
            match doc.groups.iter_mut().find(|g| g.handle == group.handle) {
                Some(existing) => {
                    existing.label = group.label;
                    Ok(false)
                }
                None => {
                    doc.groups.push(group);
                    Ok(true)
                }
            }
        })
        .await
    }

    async fn remove_group(&self, handle: &str) -> Result<bool, DomainError> {
        self.mutate(|doc| {
            let before = doc.groups.len();
            doc.groups.retain(|g| g.handle != handle);
            Ok(doc.groups.len() != before)
        })
        .await
    }

    async fn list_groups(&self) -> Result<Vec<Group>, DomainError> {
        Ok(self.cache.read().await.groups.clone())
    }

    async fn commit_publication(&self, draft: NewPublication) -> Result<Publication, DomainError> {
        let publication = self
            .mutate(|doc| {
                let publication = Publication {
                    id: doc.next_id(),
                    time: draft.time,
                    content: draft.content,
                };
                doc.schedule
                    .insert(publication.id.clone(), ScheduleEntry::default());
                doc.publications.push(publication.clone());
                Ok(publication)
            })
            .await?;
        info!(publication_id = %publication.id, time = %publication.time, "publication committed");
        Ok(publication)
    }

    async fn update_publication(
        &self,
        id: &PublicationId,
        draft: NewPublication,
    ) -> Result<Publication, DomainError> {
        self.mutate(|doc| {
            let publication = doc.publication_mut(id)?;
            publication.time = draft.time;
            publication.content = draft.content;
            let updated = publication.clone();
            doc.schedule.entry(id.clone()).or_default();
            Ok(updated)
        })
        .await
    }

    async fn delete_publication(&self, id: &PublicationId) -> Result<bool, DomainError> {
        self.mutate(|doc| {
            let before = doc.publications.len();
            doc.publications.retain(|p| &p.id != id);
            doc.schedule.remove(id);
            Ok(doc.publications.len() != before)
        })
        .await
    }

    async fn set_active(&self, id: &PublicationId, active: bool) -> Result<(), DomainError> {
        self.mutate(|doc| {
            doc.entry_mut(id)?.active = active;
            Ok(())
        })
        .await
    }

    async fn list_publications(&self) -> Result<Vec<ScheduledPublication>, DomainError> {
        let doc = self.cache.read().await;
        Ok(doc
            .publications
            .iter()
            .map(|p| ScheduledPublication {
                publication: p.clone(),
                schedule: doc.schedule.get(&p.id).cloned().unwrap_or_default(),
            })
            .collect())
    }

    async fn list_due(&self, now: DateTime<FixedOffset>) -> Result<Vec<Publication>, DomainError> {
        let minute = TimeOfDay::of(&now);
        self.mutate(|doc| {
            let mut due = Vec::new();
            for publication in doc.publications.iter().filter(|p| p.time == minute) {
                let Some(entry) = doc.schedule.get_mut(&publication.id) else {
                    continue;
                };
                if entry.active && !entry.fired_within_minute_of(&now) {
                    entry.last_fired = Some(now);
                    due.push(publication.clone());
                }
            }
            Ok(due)
        })
        .await
    }

    async fn mark_fired(
        &self,
        id: &PublicationId,
        when: DateTime<FixedOffset>,
        summary: FireSummary,
    ) -> Result<(), DomainError> {
        self.mutate(|doc| {
            let entry = doc.entry_mut(id)?;
            entry.last_fired = Some(when);
            entry.last_result = Some(summary);
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Content, Media, MediaKind};
    use std::sync::Arc;

    fn at(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    fn draft(body: &str, time: &str) -> NewPublication {
        NewPublication {
            time: TimeOfDay::parse(time).unwrap(),
            content: Content::text(body),
        }
    }

    fn group(handle: &str) -> Group {
        Group {
            handle: handle.into(),
            label: format!("label {}", handle),
        }
    }

    fn raw(path: &Path) -> serde_json::Value {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn missing_file_initializes_and_persists_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("bot_config.json");
        let store = JsonStore::new(&path);
        assert_eq!(store.load().await, LoadOutcome::Initialized);
        assert_eq!(
            raw(&path),
            serde_json::json!({"groups": [], "publications": [], "schedule": {}})
        );
        assert!(store.list_groups().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupt_or_empty_file_initializes_without_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot_config.json");

        std::fs::write(&path, "{ not json").unwrap();
        let store = JsonStore::new(&path);
        assert_eq!(store.load().await, LoadOutcome::Initialized);
        assert_eq!(raw(&path)["publications"], serde_json::json!([]));
        assert_eq!(
            std::fs::read_to_string(sibling_with_suffix(&path, ".corrupt")).unwrap(),
            "{ not json"
        );

        std::fs::write(&path, "  \n").unwrap();
        assert_eq!(store.load().await, LoadOutcome::Initialized);
        assert_eq!(raw(&path)["groups"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn non_utf8_file_is_kept_aside_before_reset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot_config.json");
        let bytes = [0xff, 0xfe, b'{', 0x80, b'}'];
        std::fs::write(&path, bytes).unwrap();

        let store = JsonStore::new(&path);
        assert_eq!(store.load().await, LoadOutcome::Initialized);
        assert_eq!(
            std::fs::read(sibling_with_suffix(&path, ".corrupt")).unwrap(),
            bytes
        );
        assert_eq!(raw(&path)["schedule"], serde_json::json!({}));
    }

    #[tokio::test]
    async fn state_round_trips_through_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot_config.json");
        let store = JsonStore::open(&path).await;
        store.add_group(group("-100123")).await.unwrap();
        let committed = store
            .commit_publication(NewPublication {
                time: TimeOfDay::new(8, 30).unwrap(),
                content: Content {
                    body: "Hello".into(),
                    media: vec![
                        Media {
                            kind: MediaKind::Photo,
                            file_id: "ph".into(),
                        },
                        Media {
                            kind: MediaKind::Video,
                            file_id: "vd".into(),
                        },
                    ],
                },
            })
            .await
            .unwrap();
        store
            .mark_fired(
                &committed.id,
                at("2026-03-01T08:30:10+01:00"),
                FireSummary {
                    delivered: 1,
                    failed: 0,
                },
            )
            .await
            .unwrap();

        let reopened = JsonStore::new(&path);
        assert_eq!(reopened.load().await, LoadOutcome::Loaded);
        assert_eq!(*reopened.cache.read().await, *store.cache.read().await);
        let listed = reopened.list_publications().await.unwrap();
        assert_eq!(listed[0].publication, committed);
        assert_eq!(
            listed[0].schedule.last_fired,
            Some(at("2026-03-01T08:30:10+01:00"))
        );
    }

    #[tokio::test]
    async fn commit_issues_unique_increasing_ids_with_active_entry() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path().join("s.json")).await;
        let mut last = None;
        for i in 0..5 {
            let p = store
                .commit_publication(draft(&format!("p{}", i), "10:00"))
                .await
                .unwrap();
            let seq = p.id.sequence().unwrap();
            assert!(last.is_none_or(|l| seq > l));
            last = Some(seq);
        }
        let listed = store.list_publications().await.unwrap();
        assert_eq!(listed.len(), 5);
        assert!(listed.iter().all(|s| s.schedule.active && s.schedule.last_fired.is_none()));
    }

    #[tokio::test]
    async fn ids_stay_above_existing_ones_after_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.json");
        let far_future = u64::MAX / 2;
        std::fs::write(
            &path,
            serde_json::json!({
                "groups": [],
                "publications": [{"id": format!("pub_{}", far_future), "time": "08:00", "body": "x", "media": []}],
                "schedule": {format!("pub_{}", far_future): {"active": false, "last_fired": null}}
            })
            .to_string(),
        )
        .unwrap();
        let store = JsonStore::open(&path).await;
        let p = store.commit_publication(draft("y", "09:00")).await.unwrap();
        assert_eq!(p.id.sequence(), Some(far_future + 1));
    }

    #[tokio::test]
    async fn concurrent_commits_are_serialized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.json");
        let store = Arc::new(JsonStore::open(&path).await);
        let mut handles = Vec::new();
        for i in 0..20 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .commit_publication(draft(&format!("p{}", i), "12:00"))
                    .await
                    .unwrap()
            }));
        }
        let mut ids = HashSet::new();
        for h in handles {
            assert!(ids.insert(h.await.unwrap().id));
        }
        let on_disk = raw(&path);
        assert_eq!(on_disk["publications"].as_array().unwrap().len(), 20);
        assert_eq!(on_disk["schedule"].as_object().unwrap().len(), 20);
    }

    #[tokio::test]
    async fn delete_removes_schedule_entry_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.json");
        let store = JsonStore::open(&path).await;
        let a = store.commit_publication(draft("a", "08:00")).await.unwrap();
        let b = store.commit_publication(draft("b", "09:00")).await.unwrap();
        assert!(store.delete_publication(&a.id).await.unwrap());
        assert!(!store.delete_publication(&a.id).await.unwrap());

        let on_disk = raw(&path);
        let schedule = on_disk["schedule"].as_object().unwrap();
        assert_eq!(schedule.len(), 1);
        assert!(schedule.contains_key(b.id.as_str()));
        assert!(matches!(
            store.set_active(&a.id, false).await,
            Err(DomainError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn load_repairs_orphans_and_missing_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.json");
        std::fs::write(
            &path,
            serde_json::json!({
                "groups": [{"handle": "1", "label": "a"}, {"handle": "1", "label": "dup"}],
                "publications": [{"id": "pub_1", "time": "08:00", "body": "x", "media": []}],
                "schedule": {"pub_999": {"active": true, "last_fired": null}}
            })
            .to_string(),
        )
        .unwrap();
        let store = JsonStore::new(&path);
        assert_eq!(store.load().await, LoadOutcome::Repaired);
        let on_disk = raw(&path);
        assert_eq!(
            on_disk["schedule"],
            serde_json::json!({"pub_1": {"active": true, "last_fired": null}})
        );
        assert_eq!(on_disk["groups"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn groups_are_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path().join("s.json")).await;
        assert!(store.add_group(group("@chan")).await.unwrap());
        assert!(!store.add_group(group("@chan")).await.unwrap());
        assert!(
            !store
                .add_group(Group {
                    handle: "@chan".into(),
                    label: "renamed".into()
                })
                .await
                .unwrap()
        );
        let groups = store.list_groups().await.unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].label, "renamed");

        assert!(!store.remove_group("@other").await.unwrap());
        assert!(store.remove_group("@chan").await.unwrap());
        assert!(store.list_groups().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_replaces_in_place_and_keeps_schedule() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path().join("s.json")).await;
        let p = store.commit_publication(draft("old", "08:00")).await.unwrap();
        store.set_active(&p.id, false).await.unwrap();
        let updated = store
            .update_publication(&p.id, draft("new", "09:15"))
            .await
            .unwrap();
        assert_eq!(updated.id, p.id);
        assert_eq!(updated.content.body, "new");
        let listed = store.list_publications().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].publication.time.to_string(), "09:15");
        assert!(!listed[0].schedule.active);

        let missing = PublicationId::from_sequence(1);
        assert!(matches!(
            store.update_publication(&missing, draft("x", "10:00")).await,
            Err(DomainError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn list_due_fires_once_per_minute() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path().join("s.json")).await;
        let p = store.commit_publication(draft("Hello", "08:30")).await.unwrap();
        let later = store.commit_publication(draft("Later", "08:31")).await.unwrap();

        assert!(store.list_due(at("2026-03-01T08:29:59+00:00")).await.unwrap().is_empty());

        let first = store.list_due(at("2026-03-01T08:30:00+00:00")).await.unwrap();
        assert_eq!(first, vec![p.clone()]);
        let second = store.list_due(at("2026-03-01T08:30:40+00:00")).await.unwrap();
        assert!(second.is_empty());

        store
            .mark_fired(&p.id, at("2026-03-01T08:30:02+00:00"), FireSummary::default())
            .await
            .unwrap();
        assert!(store.list_due(at("2026-03-01T08:30:50+00:00")).await.unwrap().is_empty());

        let next_minute = store.list_due(at("2026-03-01T08:31:00+00:00")).await.unwrap();
        assert_eq!(next_minute, vec![later.clone()]);

        let next_day = store.list_due(at("2026-03-02T08:30:05+00:00")).await.unwrap();
        assert_eq!(next_day, vec![p]);
        let next_day_later = store.list_due(at("2026-03-02T08:31:00+00:00")).await.unwrap();
        assert_eq!(next_day_later, vec![later]);
    }

    #[tokio::test]
    async fn list_due_skips_inactive() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path().join("s.json")).await;
        let p = store.commit_publication(draft("Hello", "08:30")).await.unwrap();
        store.set_active(&p.id, false).await.unwrap();
        assert!(store.list_due(at("2026-03-01T08:30:00+00:00")).await.unwrap().is_empty());
        store.set_active(&p.id, true).await.unwrap();
        assert_eq!(store.list_due(at("2026-03-01T08:30:00+00:00")).await.unwrap().len(), 1);
    }
}
