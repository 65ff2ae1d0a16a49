//! Silences: time-bounded rules suppressing notifications for matching alerts.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::alert::{AlertKey, AlertKeyError};
use crate::matchers::{GlobPattern, PatternError};
use crate::sched::Schedule;

/// Input errors from [`Schedule::add_silence`].
#[derive(Debug, Error)]
pub enum SilenceError {
    #[error("both start and end must be specified")]
    MissingTime,
    #[error("start time must be before end time")]
    StartAfterEnd,
    #[error("end time must be in the future")]
    EndInPast,
    #[error("must specify either alert or tags")]
    EmptyPattern,
    #[error(transparent)]
    AlertKey(#[from] AlertKeyError),
    #[error(transparent)]
    Pattern(#[from] PatternError),
}

/// A suppression rule.
///
/// `alert` holds the rule's pattern: an empty name matches any alert, and each
/// group entry is a glob the alert's value for that key must match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Silence {
    #[serde(with = "time::serde::rfc3339")]
    pub start: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end: OffsetDateTime,
    pub alert: AlertKey,
}

impl Silence {
    pub fn new(start: OffsetDateTime, end: OffsetDateTime, alert: AlertKey) -> Self {
        Self { start, end, alert }
    }

    /// Stable content hash of start, end and pattern, as lowercase hex.
    pub fn id(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(
            format!(
                "{}|{}|{}",
                self.start.unix_timestamp_nanos(),
                self.end.unix_timestamp_nanos(),
                self.alert
            )
            .as_bytes(),
        );
        format!("{:x}", hasher.finalize())
    }

    /// Compile the tag patterns once for repeated matching.
    ///
    /// # Errors
    ///
    /// Returns `PatternError` if any tag pattern is invalid.
    pub fn compile(&self) -> Result<CompiledSilence<'_>, PatternError> {
        let tags = self
            .alert
            .group()
            .iter()
            .map(|(k, pattern)| Ok((k.as_str(), GlobPattern::new(pattern.as_str())?)))
            .collect::<Result<Vec<_>, PatternError>>()?;
        Ok(CompiledSilence { silence: self, tags })
    }

    /// Whether the rule's pattern covers `alert`, ignoring time.
    pub fn matches(&self, alert: &AlertKey) -> Result<bool, PatternError> {
        Ok(self.compile()?.matches(alert))
    }

    /// Whether the rule suppresses `alert` at `now`.
    pub fn silenced(&self, now: OffsetDateTime, alert: &AlertKey) -> Result<bool, PatternError> {
        Ok(self.compile()?.silenced(now, alert))
    }
}

/// A silence with its tag patterns compiled.
#[derive(Debug)]
pub struct CompiledSilence<'a> {
    silence: &'a Silence,
    tags: Vec<(&'a str, GlobPattern)>,
}

impl CompiledSilence<'_> {
    /// Match name and tags. Keys the rule does not mention are unconstrained.
    pub fn matches(&self, alert: &AlertKey) -> bool {
        let name = self.silence.alert.name();
        if !name.is_empty() && name != alert.name() {
            return false;
        }
        let group = alert.group();
        self.tags
            .iter()
            .all(|(k, pattern)| group.get(k).is_some_and(|v| pattern.is_match(v)))
    }

    /// Match within `[start, end]`, inclusive on both ends.
    pub fn silenced(&self, now: OffsetDateTime, alert: &AlertKey) -> bool {
        self.is_active(now) && self.matches(alert)
    }

    pub fn is_active(&self, now: OffsetDateTime) -> bool {
        self.silence.start <= now && now <= self.silence.end
    }
}

impl Schedule {
    /// Preview or create a silence.
    ///
    /// With `confirm` unset nothing is stored; the result maps every tracked
    /// alert the rule would match to whether that alert is currently active.
    /// With `confirm` set the rule previously stored under `edit` (if any) is
    /// replaced by the new rule and the silence set is persisted.
    ///
    /// # Parameters
    ///
    /// - `start` - Start of the silence window
    /// - `end` - End of the silence window, must be in the future
    /// - `alert` - Alert name to match, empty for any
    /// - `tag_list` - Comma separated `k=pattern` list
    /// - `confirm` - Store the rule instead of previewing it
    /// - `edit` - ID of a rule to replace, empty for none
    ///
    /// # Errors
    ///
    /// Returns `SilenceError` for invalid times, empty patterns, or a malformed pattern.
    pub fn add_silence(
        &self,
        start: Option<OffsetDateTime>,
        end: Option<OffsetDateTime>,
        alert: &str,
        tag_list: &str,
        confirm: bool,
        edit: &str,
    ) -> Result<Option<HashMap<AlertKey, bool>>, SilenceError> {
        let (Some(start), Some(end)) = (start, end) else {
            return Err(SilenceError::MissingTime);
        };
        if start >= end {
            return Err(SilenceError::StartAfterEnd);
        }
        if end <= self.now() {
            return Err(SilenceError::EndInPast);
        }
        if alert.is_empty() && tag_list.is_empty() {
            return Err(SilenceError::EmptyPattern);
        }
        let pattern = AlertKey::parse(&format!("{alert}{{{tag_list}}}"))?;
        let silence = Silence::new(start, end, pattern);
        let compiled = silence.compile()?;

        if !confirm {
            let state = self.lock();
            let preview = state
                .status
                .iter()
                .filter(|(ak, _)| compiled.matches(ak))
                .map(|(ak, status)| (ak.clone(), status.is_active()))
                .collect();
            return Ok(Some(preview));
        }

        let id = silence.id();
        let (generation, saved) = {
            let mut state = self.lock();
            if !edit.is_empty() {
                state.silences.remove(edit);
            }
            state.silences.insert(id.clone(), silence.clone());
            Self::next_generation(&mut state)
        };
        info!(%id, edit, alert = %silence.alert, "added silence");
        self.save(generation, &saved);
        Ok(None)
    }

    /// Remove a silence. Unknown IDs are ignored.
    pub fn clear_silence(&self, id: &str) {
        let (removed, (generation, saved)) = {
            let mut state = self.lock();
            let removed = state.silences.remove(id).is_some();
            (removed, Self::next_generation(&mut state))
        };
        info!(id, removed, "cleared silence");
        self.save(generation, &saved);
    }

    /// Every tracked alert currently silenced, with the latest end among the
    /// silences covering it.
    pub fn silenced(&self) -> HashMap<AlertKey, OffsetDateTime> {
        self.silenced_at(self.now())
    }

    /// Like [`Self::silenced`], evaluated at `now`.
    pub fn silenced_at(&self, now: OffsetDateTime) -> HashMap<AlertKey, OffsetDateTime> {
        let mut silenced: HashMap<AlertKey, OffsetDateTime> = HashMap::new();
        let state = self.lock();
        for (id, silence) in &state.silences {
            let compiled = match silence.compile() {
                Ok(compiled) => compiled,
                Err(e) => {
                    warn!(%id, error = %e, "skipping silence with invalid pattern");
                    continue;
                }
            };
            if !compiled.is_active(now) {
                continue;
            }
            for ak in state.status.keys().filter(|ak| compiled.matches(ak)) {
                debug!(alert = %ak, %id, "alert silenced");
                let until = silenced.entry(ak.clone()).or_insert(silence.end);
                if *until < silence.end {
                    *until = silence.end;
                }
            }
        }
        silenced
    }

    /// Active silences keyed by ID, for listing.
    pub fn active_silences(&self) -> BTreeMap<String, Silence> {
        let now = self.now();
        self.lock()
            .silences
            .iter()
            .filter(|(_, s)| s.end >= now)
            .map(|(id, s)| (id.clone(), s.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{mpsc, Arc, Mutex};
    use std::thread;
    use std::time::Duration as StdDuration;

    use time::macros::datetime;
    use time::Duration;

    use crate::sched::{MemoryStore, SilenceStore, Status, StoreError};

    use super::*;

    const NOW: OffsetDateTime = datetime!(2030-06-01 12:00 UTC);

    fn key(s: &str) -> AlertKey {
        AlertKey::parse(s).expect("valid key")
    }

    fn schedule_with(store: Arc<MemoryStore>) -> Schedule {
        let schedule = Schedule::builder()
            .with_store(store)
            .with_fixed_now(NOW)
            .build()
            .expect("memory store loads");
        schedule.set_status(key("cpu{host=web-01,dc=us}"), Status::Critical);
        schedule.set_status(key("cpu{host=web-02}"), Status::Normal);
        schedule.set_status(key("cpu{dc=us}"), Status::Warning);
        schedule.set_status(key("cpu{host=db-01}"), Status::Critical);
        schedule.set_status(key("disk{host=web-01}"), Status::Critical);
        schedule
    }

    fn schedule() -> Schedule {
        schedule_with(Arc::new(MemoryStore::new()))
    }

    /// Time gating is inclusive at both ends.
    #[test]
    fn test_time_gating() {
        let t = NOW;
        let silence = Silence::new(t, t + Duration::seconds(10), key("cpu{}"));
        let ak = key("cpu{host=web-01}");

        assert!(!silence.silenced(t - Duration::seconds(1), &ak).expect("valid"));
        assert!(silence.silenced(t, &ak).expect("valid"));
        assert!(silence.silenced(t + Duration::seconds(5), &ak).expect("valid"));
        assert!(silence.silenced(t + Duration::seconds(10), &ak).expect("valid"));
        assert!(!silence.silenced(t + Duration::seconds(11), &ak).expect("valid"));
    }

    /// Keys absent from the rule are unconstrained; keys present must match.
    #[test]
    fn test_tag_wildcard_by_omission() {
        let silence = Silence::new(NOW, NOW + Duration::hours(1), key("{host=web*}"));
        assert!(silence.matches(&key("cpu{host=web-01,dc=us}")).expect("valid"));
        assert!(silence.matches(&key("mem{host=web-02}")).expect("valid"));
        assert!(!silence.matches(&key("cpu{dc=us}")).expect("valid"));
        assert!(!silence.matches(&key("cpu{host=db-01}")).expect("valid"));
    }

    /// A named rule only covers alerts of that name.
    #[test]
    fn test_name_match() {
        let silence = Silence::new(NOW, NOW + Duration::hours(1), key("cpu{host=web*}"));
        assert!(silence.matches(&key("cpu{host=web-01}")).expect("valid"));
        assert!(!silence.matches(&key("disk{host=web-01}")).expect("valid"));

        let any = Silence::new(NOW, NOW + Duration::hours(1), AlertKey::default());
        assert!(any.matches(&key("disk{host=web-01}")).expect("valid"));
    }

    /// IDs depend on every input and nothing else.
    #[test]
    fn test_deterministic_id() {
        let end = NOW + Duration::hours(1);
        let a = Silence::new(NOW, end, key("cpu{host=web*}"));
        let b = Silence::new(NOW, end, key("cpu{host=web*}"));
        assert_eq!(a.id(), b.id());
        assert_eq!(a.id().len(), 64);

        let pattern = key("cpu{host=web*}");
        let later_start = Silence::new(NOW + Duration::seconds(1), end, pattern.clone());
        let later_end = Silence::new(NOW, end + Duration::seconds(1), pattern);
        assert_ne!(a.id(), later_start.id());
        assert_ne!(a.id(), later_end.id());
        assert_ne!(a.id(), Silence::new(NOW, end, key("cpu{host=db*}")).id());
    }

    /// Validation runs in order and stores nothing on failure.
    #[test]
    fn test_add_silence_validation() {
        let schedule = schedule();
        let later = NOW + Duration::hours(1);

        let err = schedule.add_silence(None, Some(later), "cpu", "", true, "").unwrap_err();
        assert!(matches!(err, SilenceError::MissingTime));

        let err = schedule.add_silence(Some(later), Some(NOW), "cpu", "", true, "").unwrap_err();
        assert!(matches!(err, SilenceError::StartAfterEnd));

        let past = NOW - Duration::hours(1);
        let err = schedule
            .add_silence(Some(past - Duration::hours(1)), Some(past), "cpu", "", true, "")
            .unwrap_err();
        assert!(matches!(err, SilenceError::EndInPast));

        let err = schedule.add_silence(Some(NOW), Some(later), "", "", true, "").unwrap_err();
        assert!(matches!(err, SilenceError::EmptyPattern));

        let err = schedule.add_silence(Some(NOW), Some(later), "", "host", true, "").unwrap_err();
        assert!(matches!(err, SilenceError::AlertKey(_)));

        let err =
            schedule.add_silence(Some(NOW), Some(later), "", "host=web[", true, "").unwrap_err();
        assert!(matches!(err, SilenceError::Pattern(_)));

        assert!(schedule.silences().is_empty());
    }

    /// Preview reports matching alerts and their activity without storing.
    #[test]
    fn test_add_silence_preview() {
        let store = Arc::new(MemoryStore::new());
        let schedule = schedule_with(store.clone());
        let preview = schedule
            .add_silence(Some(NOW), Some(NOW + Duration::hours(1)), "cpu", "host=web*", false, "")
            .expect("valid silence")
            .expect("preview requested");

        assert_eq!(preview.len(), 2);
        assert_eq!(preview.get(&key("cpu{dc=us,host=web-01}")), Some(&true));
        assert_eq!(preview.get(&key("cpu{host=web-02}")), Some(&false));
        assert!(schedule.silences().is_empty());
        assert_eq!(store.save_count(), 0);
    }

    /// Confirming stores the rule; editing replaces it; clearing removes it.
    #[test]
    fn test_confirm_edit_clear() {
        let store = Arc::new(MemoryStore::new());
        let schedule = schedule_with(store.clone());
        let end = NOW + Duration::hours(1);

        let result = schedule
            .add_silence(Some(NOW), Some(end), "cpu", "host=web*", true, "")
            .expect("valid silence");
        assert!(result.is_none());
        let first_id = Silence::new(NOW, end, key("cpu{host=web*}")).id();
        assert!(schedule.silences().contains_key(&first_id));
        assert_eq!(store.save_count(), 1);

        let longer = NOW + Duration::hours(2);
        schedule
            .add_silence(Some(NOW), Some(longer), "cpu", "host=web*", true, &first_id)
            .expect("valid edit");
        let silences = schedule.silences();
        assert_eq!(silences.len(), 1);
        assert!(!silences.contains_key(&first_id));
        let second_id = Silence::new(NOW, longer, key("cpu{host=web*}")).id();
        assert!(silences.contains_key(&second_id));

        schedule.clear_silence(&second_id);
        assert!(schedule.silences().is_empty());
        schedule.clear_silence(&second_id);
        assert_eq!(store.save_count(), 4);
        assert!(store.load().expect("memory store").is_empty());
    }

    /// Holds its first save open until released, then writes to `inner`.
    struct GatedStore {
        inner: MemoryStore,
        entered: Mutex<Option<mpsc::Sender<()>>>,
        release: Mutex<Option<mpsc::Receiver<()>>>,
    }

    impl SilenceStore for GatedStore {
        fn load(&self) -> Result<BTreeMap<String, Silence>, StoreError> {
            self.inner.load()
        }

        fn save(&self, silences: &BTreeMap<String, Silence>) -> Result<(), StoreError> {
            if let Some(entered) = self.entered.lock().expect("lock").take() {
                entered.send(()).expect("test waiting");
                let release = self.release.lock().expect("lock").take().expect("receiver");
                release.recv_timeout(StdDuration::from_millis(300)).ok();
            }
            self.inner.save(silences)
        }
    }

    /// Overlapping confirms persist the newest silence set.
    #[test]
    fn test_concurrent_confirms_persist_latest() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let store = Arc::new(GatedStore {
            inner: MemoryStore::new(),
            entered: Mutex::new(Some(entered_tx)),
            release: Mutex::new(Some(release_rx)),
        });
        let schedule = Arc::new(
            Schedule::builder()
                .with_store(store.clone())
                .with_fixed_now(NOW)
                .build()
                .expect("memory store loads"),
        );
        let end = NOW + Duration::hours(1);

        let first = {
            let schedule = Arc::clone(&schedule);
            thread::spawn(move || {
                schedule.add_silence(Some(NOW), Some(end), "a", "", true, "").expect("valid");
            })
        };
        entered_rx.recv().expect("first save started");

        let second = {
            let schedule = Arc::clone(&schedule);
            thread::spawn(move || {
                schedule.add_silence(Some(NOW), Some(end), "b", "", true, "").expect("valid");
            })
        };
        // let the second confirm reach its save before the first one finishes
        thread::sleep(StdDuration::from_millis(50));
        release_tx.send(()).expect("store waiting");
        first.join().expect("first confirm");
        second.join().expect("second confirm");

        assert_eq!(schedule.silences().len(), 2);
        let persisted = store.load().expect("memory store");
        assert_eq!(persisted, schedule.silences());
        assert_eq!(store.inner.save_count(), 2);
    }

    /// Silenced reports the latest end among active matching rules.
    #[test]
    fn test_silenced_latest_end() {
        let schedule = schedule();
        let one = NOW + Duration::hours(1);
        let three = NOW + Duration::hours(3);
        schedule.add_silence(Some(NOW), Some(one), "", "host=web*", true, "").expect("valid");
        schedule
            .add_silence(Some(NOW), Some(three), "cpu", "host=web-01", true, "")
            .expect("valid");
        // not yet started
        schedule
            .add_silence(Some(one), Some(NOW + Duration::hours(9)), "cpu", "dc=us", true, "")
            .expect("valid");

        let silenced = schedule.silenced();
        assert_eq!(silenced.len(), 3);
        assert_eq!(silenced.get(&key("cpu{dc=us,host=web-01}")), Some(&three));
        assert_eq!(silenced.get(&key("cpu{host=web-02}")), Some(&one));
        assert_eq!(silenced.get(&key("disk{host=web-01}")), Some(&one));
        assert!(!silenced.contains_key(&key("cpu{dc=us}")));
        assert!(!silenced.contains_key(&key("cpu{host=db-01}")));

        let later = schedule.silenced_at(one + Duration::minutes(30));
        assert!(later.contains_key(&key("cpu{dc=us}")));
        assert!(!later.contains_key(&key("disk{host=web-01}")));
    }

    /// Persisted silences are restored by a new schedule on the same store.
    #[test]
    fn test_silences_restored_from_store() {
        let store = Arc::new(MemoryStore::new());
        let schedule = schedule_with(store.clone());
        schedule
            .add_silence(Some(NOW), Some(NOW + Duration::hours(1)), "cpu", "", true, "")
            .expect("valid silence");

        let restored = schedule_with(store);
        assert_eq!(restored.silences(), schedule.silences());
        assert_eq!(restored.active_silences().len(), 1);
    }
}
