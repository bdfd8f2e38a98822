//! Input recorder
//!
//! Capture sources push [`InputEvent`]s; the recorder stamps them, attaches
//! the last known pointer position, and queues them on a channel. A flusher
//! task drains the channel on a fixed interval and writes each batch to the
//! [`SessionRepository`], so capture never waits on the database.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use uuid::Uuid;

use crate::domain::{Action, EventRecord, InputEvent, Session};
use crate::error::ServiceError;
use crate::store::SessionRepository;

/// Pointer position reported before any mouse movement was seen
const UNKNOWN_POSITION: (i32, i32) = (-1, -1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingStatus {
    pub is_recording: bool,
    pub session_id: Option<Uuid>,
    /// Captured events not yet written to storage
    pub pending_events: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopSummary {
    pub session_id: Uuid,
    pub saved_events: usize,
}

struct ActiveRecording {
    session_id: Uuid,
    started: Instant,
    last_position: (i32, i32),
    sender: mpsc::UnboundedSender<EventRecord>,
    flusher: JoinHandle<()>,
}

impl ActiveRecording {
    /// Attach the last known pointer position to a raw input
    fn enrich(&mut self, input: InputEvent) -> Action {
        let (x, y) = self.last_position;
        match input {
            InputEvent::MouseMove { x, y } => {
                self.last_position = (x, y);
                Action::MouseMove { x, y }
            }
            InputEvent::ButtonPress { button } => Action::MouseDown { button, x, y },
            InputEvent::ButtonRelease { button } => Action::MouseUp { button, x, y },
            InputEvent::Wheel { delta_x, delta_y } => Action::Wheel { delta_x, delta_y, x, y },
            InputEvent::KeyPress { key } => Action::KeyPress { key },
        }
    }
}

struct RecorderInner {
    store: Arc<dyn SessionRepository>,
    flush_interval: Duration,
    active: Mutex<Option<ActiveRecording>>,
    pending: Arc<AtomicUsize>,
}

/// Records one session at a time; cheap to clone
#[derive(Clone)]
pub struct Recorder {
    inner: Arc<RecorderInner>,
}

impl Recorder {
    pub fn new(store: Arc<dyn SessionRepository>, flush_interval: Duration) -> Self {
        Recorder {
            inner: Arc::new(RecorderInner {
                store,
                // tokio intervals reject a zero period
                flush_interval: flush_interval.max(Duration::from_millis(1)),
                active: Mutex::new(None),
                pending: Arc::new(AtomicUsize::new(0)),
            }),
        }
    }

    /// Create a session and begin accepting captured input for it
    pub async fn start(&self, name: &str, description: Option<&str>) -> Result<Session, ServiceError> {
        let mut active = self.inner.active.lock().await;
        if active.is_some() {
            return Err(ServiceError::AlreadyRecording);
        }

        let session = self.inner.store.create_session(name, description).await?;
        let (sender, receiver) = mpsc::unbounded_channel();
        let flusher = tokio::spawn(flush_loop(
            self.inner.store.clone(),
            session.id,
            receiver,
            self.inner.flush_interval,
            self.inner.pending.clone(),
        ));

        *active = Some(ActiveRecording {
            session_id: session.id,
            started: Instant::now(),
            last_position: UNKNOWN_POSITION,
            sender,
            flusher,
        });

        tracing::info!("Started recording session: {}", session.id);
        Ok(session)
    }

    /// Queue one input event.
    ///
    /// `timestamp_ms` is the offset from the start of the recording; when the
    /// source does not supply one, the time elapsed since `start` is used.
    pub async fn capture(&self, input: InputEvent, timestamp_ms: Option<u64>) -> Result<(), ServiceError> {
        self.capture_batch(vec![(input, timestamp_ms)]).await.map(|_| ())
    }

    /// Queue a batch of input events against a single recording.
    ///
    /// The recording lock is held for the whole batch, so a concurrent
    /// `stop` sees either none or all of it. Timestamps are checked before
    /// anything is queued.
    pub async fn capture_batch(
        &self,
        inputs: Vec<(InputEvent, Option<u64>)>,
    ) -> Result<usize, ServiceError> {
        let mut guard = self.inner.active.lock().await;
        let active = guard.as_mut().ok_or(ServiceError::NotRecording)?;

        if let Some(ts) = inputs
            .iter()
            .filter_map(|(_, ts)| *ts)
            .find(|ts| i64::try_from(*ts).is_err())
        {
            return Err(ServiceError::TimestampOutOfRange(ts));
        }

        let count = inputs.len();
        for (input, timestamp_ms) in inputs {
            let timestamp_ms =
                timestamp_ms.unwrap_or_else(|| active.started.elapsed().as_millis() as u64);
            let action = active.enrich(input);

            // counted before the flusher can see it
            self.inner.pending.fetch_add(1, Ordering::SeqCst);
            if active.sender.send(EventRecord::new(timestamp_ms, action)).is_err() {
                self.inner.pending.fetch_sub(1, Ordering::SeqCst);
                return Err(anyhow::anyhow!(
                    "recorder flusher for session {} has stopped",
                    active.session_id
                )
                .into());
            }
        }
        Ok(count)
    }

    /// Stop recording and wait until every queued event has been flushed
    pub async fn stop(&self) -> Result<StopSummary, ServiceError> {
        let active = self
            .inner
            .active
            .lock()
            .await
            .take()
            .ok_or(ServiceError::NotRecording)?;

        let ActiveRecording {
            session_id,
            sender,
            flusher,
            ..
        } = active;

        // closing the channel lets the flusher drain and exit
        drop(sender);
        if let Err(e) = flusher.await {
            tracing::error!("Recorder flusher for session {} failed: {}", session_id, e);
        }

        let saved_events = self
            .inner
            .store
            .get_session(session_id)
            .await?
            .map(|s| s.event_count.max(0) as usize)
            .unwrap_or(0);

        tracing::info!("Saved {} events to session {}", saved_events, session_id);
        Ok(StopSummary {
            session_id,
            saved_events,
        })
    }

    pub async fn status(&self) -> RecordingStatus {
        let active = self.inner.active.lock().await;
        RecordingStatus {
            is_recording: active.is_some(),
            session_id: active.as_ref().map(|a| a.session_id),
            pending_events: self.inner.pending.load(Ordering::SeqCst),
        }
    }

    /// Flush and close an in-progress recording, if any
    pub async fn shutdown(&self) {
        match self.stop().await {
            Ok(summary) => tracing::info!(
                "Recording {} closed on shutdown with {} events",
                summary.session_id,
                summary.saved_events
            ),
            Err(ServiceError::NotRecording) => {}
            Err(e) => tracing::error!("Failed to close recording on shutdown: {}", e),
        }
    }
}

async fn flush_loop(
    store: Arc<dyn SessionRepository>,
    session_id: Uuid,
    mut receiver: mpsc::UnboundedReceiver<EventRecord>,
    interval: Duration,
    pending: Arc<AtomicUsize>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut batch = Vec::new();

    loop {
        ticker.tick().await;
        let closed = drain(&mut receiver, &mut batch);

        if !batch.is_empty() {
            match store.save_events(session_id, &batch).await {
                Ok(()) => {
                    tracing::debug!("Flushed {} events for session {}", batch.len(), session_id);
                    pending.fetch_sub(batch.len(), Ordering::SeqCst);
                    batch.clear();
                }
                Err(e) if closed => {
                    tracing::error!(
                        "Dropping {} events for session {} after final flush failed: {:#}",
                        batch.len(),
                        session_id,
                        e
                    );
                    pending.fetch_sub(batch.len(), Ordering::SeqCst);
                    batch.clear();
                }
                Err(e) => {
                    // kept for the next tick
                    tracing::warn!(
                        "Failed to save {} events for session {}: {:#}",
                        batch.len(),
                        session_id,
                        e
                    );
                }
            }
        }

        if closed {
            break;
        }
    }
}

/// Move everything queued into `batch`; returns true once the sender is gone
fn drain(receiver: &mut mpsc::UnboundedReceiver<EventRecord>, batch: &mut Vec<EventRecord>) -> bool {
    loop {
        match receiver.try_recv() {
            Ok(event) => batch.push(event),
            Err(TryRecvError::Empty) => return false,
            Err(TryRecvError::Disconnected) => return true,
        }
    }
}
