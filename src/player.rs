//! Session playback
//!
//! Loads a stored session and performs its actions through an [`InputSink`],
//! sleeping the recorded gap between consecutive events.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

use crate::domain::Action;
use crate::error::ServiceError;
use crate::store::SessionRepository;

/// Destination for replayed input
pub trait InputSink: Send {
    fn perform(&mut self, action: &Action) -> anyhow::Result<()>;
}

/// Emits every action through `tracing`
#[derive(Debug, Default)]
pub struct LoggingSink {
    performed: usize,
}

impl LoggingSink {
    pub fn performed(&self) -> usize {
        self.performed
    }
}

impl InputSink for LoggingSink {
    fn perform(&mut self, action: &Action) -> anyhow::Result<()> {
        match action {
            Action::KeyPress { key } => match printable_key(key) {
                Some(c) => tracing::info!("Replaying key {} as '{}'", key, c),
                None => tracing::warn!("Key {} has no printable character", key),
            },
            other => tracing::info!("Replaying {:?}", other),
        }
        self.performed += 1;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackReport {
    pub session_id: Uuid,
    pub events_played: usize,
    pub elapsed: Duration,
}

#[derive(Clone)]
pub struct Player {
    store: Arc<dyn SessionRepository>,
    start_delay: Duration,
    busy: Arc<Mutex<()>>,
}

impl Player {
    pub fn new(store: Arc<dyn SessionRepository>, start_delay: Duration) -> Self {
        Player {
            store,
            start_delay,
            busy: Arc::new(Mutex::new(())),
        }
    }

    /// Replay a session into `sink`. Only one playback runs at a time.
    pub async fn play(
        &self,
        session_id: Uuid,
        sink: &mut dyn InputSink,
    ) -> Result<PlaybackReport, ServiceError> {
        let _playing = self
            .busy
            .try_lock()
            .map_err(|_| ServiceError::PlaybackInProgress)?;

        if self.store.get_session(session_id).await?.is_none() {
            return Err(ServiceError::SessionNotFound(session_id));
        }

        let records = self.store.load_events(session_id).await?;
        let Some(first) = records.first() else {
            tracing::info!("Session {} has no events to play", session_id);
            return Ok(PlaybackReport {
                session_id,
                events_played: 0,
                elapsed: Duration::ZERO,
            });
        };

        tracing::info!(
            "Loaded {} events for session {}, playback starts in {:?}",
            records.len(),
            session_id,
            self.start_delay
        );
        tokio::time::sleep(self.start_delay).await;

        let started = Instant::now();
        let mut last_timestamp = first.timestamp_ms;
        for record in &records {
            let wait = record.timestamp_ms.saturating_sub(last_timestamp);
            if wait > 0 {
                tokio::time::sleep(Duration::from_millis(wait)).await;
            }
            sink.perform(&record.action)
                .map_err(|e| ServiceError::Playback(format!("{:#}", e)))?;
            last_timestamp = record.timestamp_ms;
        }

        let elapsed = started.elapsed();
        tracing::info!(
            "Played {} events from session {} in {:?}",
            records.len(),
            session_id,
            elapsed
        );
        Ok(PlaybackReport {
            session_id,
            events_played: records.len(),
            elapsed,
        })
    }
}

/// The character a key name types, if any.
///
/// `KeyA` types `A` and `Num1` types `1`; names wrapping a layout-specific
/// key such as `Unknown(Layout('q'))` type the first letter inside `Layout(`.
pub fn printable_key(key: &str) -> Option<char> {
    const LAYOUT: &str = "Layout(";
    if let Some(pos) = key.find(LAYOUT) {
        if let Some(c) = key[pos + LAYOUT.len()..]
            .chars()
            .find(|c| c.is_ascii_alphabetic())
        {
            return Some(c);
        }
    }
    key.chars().rev().find(|c| c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EventRecord, MouseButton};
    use crate::store::SqliteSessionRepository;

    /// Records what was performed and when
    #[derive(Default)]
    struct CapturingSink {
        performed: Vec<(Instant, Action)>,
        fail_on: Option<usize>,
    }

    impl InputSink for CapturingSink {
        fn perform(&mut self, action: &Action) -> anyhow::Result<()> {
            if self.fail_on == Some(self.performed.len()) {
                anyhow::bail!("device unplugged");
            }
            self.performed.push((Instant::now(), action.clone()));
            Ok(())
        }
    }

    const DELAY: Duration = Duration::from_secs(3);

    async fn seeded(timestamps: &[u64]) -> (Player, Uuid, Vec<Action>) {
        let store = SqliteSessionRepository::in_memory().unwrap();
        store.init().await.unwrap();
        let session = store.create_session("replay", None).await.unwrap();

        let actions: Vec<Action> = timestamps
            .iter()
            .enumerate()
            .map(|(i, _)| Action::MouseMove { x: i as i32, y: 0 })
            .collect();
        let records: Vec<EventRecord> = timestamps
            .iter()
            .zip(&actions)
            .map(|(ts, a)| EventRecord::new(*ts, a.clone()))
            .collect();
        store.save_events(session.id, &records).await.unwrap();

        (Player::new(Arc::new(store), DELAY), session.id, actions)
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_waits_deltas_in_order() {
        let (player, id, actions) = seeded(&[1000, 1100, 1350]).await;
        let mut sink = CapturingSink::default();

        let before = Instant::now();
        let report = player.play(id, &mut sink).await.unwrap();

        assert_eq!(report.events_played, 3);
        assert_close(report.elapsed, Duration::from_millis(350));

        let performed: Vec<_> = sink.performed.iter().map(|(_, a)| a.clone()).collect();
        assert_eq!(performed, actions);

        let times: Vec<_> = sink.performed.iter().map(|(t, _)| *t).collect();
        assert_close(times[0] - before, DELAY);
        assert_close(times[1] - times[0], Duration::from_millis(100));
        assert_close(times[2] - times[1], Duration::from_millis(250));
    }

    /// Paused-clock timers fire on millisecond ticks
    fn assert_close(actual: Duration, expected: Duration) {
        assert!(
            actual >= expected && actual <= expected + Duration::from_millis(2),
            "expected ~{:?}, got {:?}",
            expected,
            actual
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_session() {
        let (player, _, _) = seeded(&[]).await;
        let missing = Uuid::new_v4();

        let err = player.play(missing, &mut CapturingSink::default()).await.unwrap_err();
        assert!(matches!(err, ServiceError::SessionNotFound(id) if id == missing));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_session_completes_immediately() {
        let (player, id, _) = seeded(&[]).await;
        let before = Instant::now();

        let report = player.play(id, &mut CapturingSink::default()).await.unwrap();
        assert_eq!(report.events_played, 0);
        assert_eq!(Instant::now() - before, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_playback_rejected() {
        let (player, id, _) = seeded(&[0, 10]).await;

        let background = player.clone();
        let first = tokio::spawn(async move {
            let mut sink = CapturingSink::default();
            background.play(id, &mut sink).await.map(|r| r.events_played)
        });
        tokio::task::yield_now().await;

        let err = player.play(id, &mut CapturingSink::default()).await.unwrap_err();
        assert!(matches!(err, ServiceError::PlaybackInProgress));

        assert_eq!(first.await.unwrap().unwrap(), 2);
        // lock released once the first playback finishes
        assert!(player.play(id, &mut CapturingSink::default()).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sink_failure_aborts_playback() {
        let (player, id, _) = seeded(&[0, 10, 20]).await;
        let mut sink = CapturingSink {
            fail_on: Some(1),
            ..Default::default()
        };

        let err = player.play(id, &mut sink).await.unwrap_err();
        assert!(matches!(err, ServiceError::Playback(msg) if msg.contains("device unplugged")));
        assert_eq!(sink.performed.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_logging_sink_counts() {
        let mut sink = LoggingSink::default();
        sink.perform(&Action::KeyPress { key: "KeyA".to_string() }).unwrap();
        sink.perform(&Action::MouseUp { button: MouseButton::Left, x: 1, y: 1 }).unwrap();
        assert_eq!(sink.performed(), 2);
    }

    #[test]
    fn test_printable_key() {
        assert_eq!(printable_key("KeyA"), Some('A'));
        assert_eq!(printable_key("Num7"), Some('7'));
        assert_eq!(printable_key("Unknown(Layout('q'))"), Some('q'));
        assert_eq!(printable_key(""), None);
        assert_eq!(printable_key("()"), None);
    }
}
