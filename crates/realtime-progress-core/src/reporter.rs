//! Throttled progress reporting for a single session.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{KeyedStore, SessionUpdate, StoreError};

/// Reporter error.
#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Reports are accepted and pushed to the store.
    Running,
    /// The terminal marker has been written; reports are ignored.
    Ended,
}

/// Owns one progress-reporting session.
///
/// The function being tracked calls [`report`](Self::report) as often as it
/// likes; the store is written at most once per push interval and only the
/// latest payload is kept between writes. [`end`](Self::end) writes the
/// terminal marker exactly once.
///
/// A reporter that is dropped while still running ends itself, so the
/// terminal marker is written on every exit path, including panics.
pub struct ProgressReporter<'a> {
    store: &'a dyn KeyedStore,
    key: String,
    push_interval: Duration,
    state: SessionState,
    last_pushed_at: Option<Instant>,
    latest_message: Option<Value>,
}

impl<'a> ProgressReporter<'a> {
    /// Start a session writing to `store` under `key`.
    ///
    /// # Errors
    /// Returns [`ProgressError::InvalidArgument`] if `key` is empty or
    /// `push_interval_ms` is negative.
    pub fn new(
        store: &'a dyn KeyedStore,
        key: impl Into<String>,
        push_interval_ms: i64,
    ) -> Result<Self, ProgressError> {
        let key = key.into();
        if key.is_empty() {
            return Err(ProgressError::InvalidArgument(
                "session key must not be empty".to_string(),
            ));
        }
        let push_interval = u64::try_from(push_interval_ms)
            .map(Duration::from_millis)
            .map_err(|_| {
                ProgressError::InvalidArgument(format!(
                    "push interval must be non-negative, got {push_interval_ms}"
                ))
            })?;

        tracing::debug!(%key, ?push_interval, "progress session started");

        Ok(Self {
            store,
            key,
            push_interval,
            state: SessionState::Running,
            last_pushed_at: None,
            latest_message: None,
        })
    }

    /// Session key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Minimum time between two store writes.
    #[must_use]
    pub const fn push_interval(&self) -> Duration {
        self.push_interval
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Most recent payload passed to [`report`](Self::report), pushed or not.
    #[must_use]
    pub const fn latest_message(&self) -> Option<&Value> {
        self.latest_message.as_ref()
    }

    /// Record progress.
    ///
    /// Ignored once the session has ended. Otherwise the payload becomes the
    /// latest message and is written to the store if the push interval has
    /// elapsed since the previous write.
    ///
    /// # Errors
    /// Returns error if the payload cannot be serialized or the store write
    /// fails.
    pub fn report<T: Serialize + ?Sized>(&mut self, message: &T) -> Result<(), ProgressError> {
        if self.state == SessionState::Ended {
            tracing::trace!(key = %self.key, "report after end ignored");
            return Ok(());
        }

        let message = serde_json::to_value(message)?;
        self.latest_message = Some(message.clone());

        let now = Instant::now();
        let due = self
            .last_pushed_at
            .is_none_or(|at| now.duration_since(at) >= self.push_interval);
        if !due {
            return Ok(());
        }

        let raw = SessionUpdate::running(message).encode()?;
        self.store.set(&self.key, &raw)?;
        self.last_pushed_at = Some(now);
        tracing::debug!(key = %self.key, "progress pushed");
        Ok(())
    }

    /// End the session and write the terminal marker.
    ///
    /// Only the first call has an effect. The terminal write bypasses the
    /// throttle so the next poll observes completion.
    ///
    /// # Errors
    /// Returns error if the terminal marker cannot be written. The session is
    /// considered ended either way.
    pub fn end(&mut self) -> Result<(), ProgressError> {
        if self.state == SessionState::Ended {
            return Ok(());
        }
        self.state = SessionState::Ended;

        let raw = SessionUpdate::Ended.encode()?;
        self.store.set(&self.key, &raw)?;
        self.last_pushed_at = Some(Instant::now());
        tracing::debug!(key = %self.key, "progress session ended");
        Ok(())
    }
}

impl Drop for ProgressReporter<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.end() {
            tracing::warn!(key = %self.key, "failed to write terminal marker: {e}");
        }
    }
}

impl std::fmt::Debug for ProgressReporter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("key", &self.key)
            .field("push_interval", &self.push_interval)
            .field("state", &self.state)
            .field("last_pushed_at", &self.last_pushed_at)
            .field("latest_message", &self.latest_message)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::thread::sleep;

    use serde_json::json;

    use super::*;
    use crate::test_support::{FailingStore, RecordingStore};

    fn ended() -> String {
        SessionUpdate::Ended.encode().unwrap()
    }

    #[test]
    fn test_rejects_empty_key() {
        let store = RecordingStore::default();
        let err = ProgressReporter::new(&store, "", 0).unwrap_err();
        assert!(matches!(err, ProgressError::InvalidArgument(_)));
    }

    #[test]
    fn test_rejects_negative_interval() {
        let store = RecordingStore::default();
        let err = ProgressReporter::new(&store, "k", -1).unwrap_err();
        assert!(matches!(err, ProgressError::InvalidArgument(_)));
        assert_eq!(store.total_writes(), 0);
    }

    #[test]
    fn test_end_writes_single_terminal_marker() {
        let store = RecordingStore::default();
        let mut reporter = ProgressReporter::new(&store, "k", 100).unwrap();
        tokio_test::assert_ok!(reporter.end());
        tokio_test::assert_ok!(reporter.end());
        assert_eq!(reporter.state(), SessionState::Ended);
        drop(reporter);

        assert_eq!(store.writes_to("k"), vec![ended()]);
    }

    #[test]
    fn test_zero_interval_writes_every_report() {
        let store = RecordingStore::default();
        let mut reporter = ProgressReporter::new(&store, "k", 0).unwrap();
        for n in 1..=5 {
            reporter.report(&json!({ "n": n })).unwrap();
        }
        assert_eq!(store.writes_to("k").len(), 5);
    }

    #[test]
    fn test_throttle_keeps_first_write_only() {
        let store = RecordingStore::default();
        let mut reporter = ProgressReporter::new(&store, "k", 60_000).unwrap();
        for n in 1..=50 {
            reporter.report(&json!({ "n": n })).unwrap();
        }

        let writes = store.writes_to("k");
        assert_eq!(writes.len(), 1);
        assert_eq!(
            SessionUpdate::decode(&writes[0]).unwrap(),
            SessionUpdate::running(json!({"n": 1}))
        );
        assert_eq!(reporter.latest_message(), Some(&json!({"n": 50})));
    }

    #[test]
    fn test_write_count_bounded_by_elapsed_time() {
        let store = RecordingStore::default();
        let interval_ms = 20;
        let mut reporter = ProgressReporter::new(&store, "k", interval_ms).unwrap();

        let started = Instant::now();
        for n in 0..30 {
            reporter.report(&n).unwrap();
            sleep(Duration::from_millis(2));
        }
        let elapsed_ms = started.elapsed().as_millis();

        let bound = elapsed_ms.div_ceil(u128::from(interval_ms.unsigned_abs())) + 1;
        let writes = store.writes_to("k").len();
        assert!(writes < 30, "expected throttling, got {writes} writes");
        assert!(
            writes as u128 <= bound,
            "{writes} writes exceeds bound {bound} for {elapsed_ms}ms"
        );
    }

    #[test]
    fn test_push_resumes_after_interval() {
        let store = RecordingStore::default();
        let mut reporter = ProgressReporter::new(&store, "k", 5).unwrap();
        reporter.report("first").unwrap();
        reporter.report("dropped").unwrap();
        sleep(Duration::from_millis(10));
        reporter.report("second").unwrap();

        let messages: Vec<_> = store
            .writes_to("k")
            .iter()
            .map(|raw| SessionUpdate::decode(raw).unwrap())
            .collect();
        assert_eq!(
            messages,
            vec![
                SessionUpdate::running(json!("first")),
                SessionUpdate::running(json!("second")),
            ]
        );
    }

    #[test]
    fn test_report_after_end_is_ignored() {
        let store = RecordingStore::default();
        let mut reporter = ProgressReporter::new(&store, "k", 0).unwrap();
        reporter.end().unwrap();
        tokio_test::assert_ok!(reporter.report(&json!({"late": true})));

        assert_eq!(store.writes_to("k"), vec![ended()]);
        assert_eq!(reporter.latest_message(), None);
    }

    #[test]
    fn test_drop_ends_running_session() {
        let store = RecordingStore::default();
        {
            let mut reporter = ProgressReporter::new(&store, "k", 0).unwrap();
            reporter.report(&1).unwrap();
        }
        assert_eq!(store.get("k").unwrap(), Some(ended()));
        assert_eq!(store.writes_to("k").len(), 2);
    }

    #[test]
    fn test_store_failure_is_reported() {
        let store = FailingStore;
        let mut reporter = ProgressReporter::new(&store, "k", 0).unwrap();
        assert!(matches!(reporter.report(&1), Err(ProgressError::Store(_))));
        assert!(matches!(reporter.end(), Err(ProgressError::Store(_))));
        assert_eq!(reporter.state(), SessionState::Ended);
        tokio_test::assert_ok!(reporter.end());
    }
}
