//! Deterministic state reconstruction and timed playback.
//!
//! Reconstruction is always a full fold from the session's initial
//! snapshot, never an incremental patch, so seeking backward is as
//! correct as seeking forward and any index is idempotent to probe.
//!
//! Playback state machine:
//! ```text
//! Stopped ──play()──► Playing ◄──play()── Paused
//!                        │  ╲──pause()──►   ▲
//!                        │                  │ seek_to()
//!                   last op reached         │
//!                        ▼                  │
//!                     Finished ─────────────┘
//! ```
//!
//! One tokio timer task drives an active replay; `play()` replaces any
//! running timer, `pause()` and `Drop` stop it deterministically.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;

use scribe_core::apply_clamped;

use crate::recorder::{RecordedPayload, ReplaySession};

/// Floor for the inter-operation tick delay (pre speed scaling).
const MIN_TICK_MS: i64 = 30;
/// Ceiling for the inter-operation tick delay; idle gaps in the real
/// timeline are cosmetic, not worth waiting out.
const MAX_TICK_MS: i64 = 2000;

/// Rebuild block contents after folding operations `0..=up_to_index`.
///
/// The index is clamped to the available operations; operations
/// referencing a block absent from the initial snapshot start it at
/// the empty string.
pub fn reconstruct_state(
    session: &ReplaySession,
    up_to_index: usize,
) -> HashMap<String, String> {
    let mut blocks = session.initial_snapshot.clone();
    if session.operations.is_empty() {
        return blocks;
    }
    let last = up_to_index.min(session.operations.len() - 1);
    for op in &session.operations[..=last] {
        let entry = blocks.entry(op.block_id.clone()).or_default();
        match &op.payload {
            RecordedPayload::Snapshot { content } => {
                *entry = content.clone();
            }
            edit => {
                if let Some(text_op) = edit.as_text_op() {
                    *entry = apply_clamped(entry, &text_op);
                }
            }
        }
    }
    blocks
}

/// Playback lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
    Finished,
}

/// Fixed speed multipliers for playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackSpeed {
    X1,
    X2,
    X4,
    X8,
}

impl PlaybackSpeed {
    pub fn multiplier(self) -> u64 {
        match self {
            Self::X1 => 1,
            Self::X2 => 2,
            Self::X4 => 4,
            Self::X8 => 8,
        }
    }
}

impl Default for PlaybackSpeed {
    fn default() -> Self {
        Self::X1
    }
}

/// Events emitted during playback.
#[derive(Debug, Clone)]
pub enum ReplayEvent {
    /// Playback advanced to `index`; `blocks` is the reconstructed
    /// state at that point.
    Progress {
        index: usize,
        blocks: HashMap<String, String>,
    },
    /// The last operation was reached.
    Finished,
}

struct ReplayShared {
    session: ReplaySession,
    index: usize,
    state: PlaybackState,
    speed: PlaybackSpeed,
}

/// Drives timed playback of one [`ReplaySession`].
///
/// The engine is owned by the page that created it; it is not shared
/// across pages. `index` means "operations `0..=index` are applied".
pub struct ReplayEngine {
    shared: Arc<RwLock<ReplayShared>>,
    timer: Option<JoinHandle<()>>,
    event_tx: mpsc::Sender<ReplayEvent>,
    event_rx: Option<mpsc::Receiver<ReplayEvent>>,
}

impl ReplayEngine {
    pub fn new(session: ReplaySession) -> Self {
        let (event_tx, event_rx) = mpsc::channel(256);
        Self {
            shared: Arc::new(RwLock::new(ReplayShared {
                session,
                index: 0,
                state: PlaybackState::Stopped,
                speed: PlaybackSpeed::default(),
            })),
            timer: None,
            event_tx,
            event_rx: Some(event_rx),
        }
    }

    /// Take the event receiver (can only be called once).
    pub fn take_event_rx(&mut self) -> Option<mpsc::Receiver<ReplayEvent>> {
        self.event_rx.take()
    }

    pub async fn state(&self) -> PlaybackState {
        self.shared.read().await.state
    }

    pub async fn current_index(&self) -> usize {
        self.shared.read().await.index
    }

    pub async fn speed(&self) -> PlaybackSpeed {
        self.shared.read().await.speed
    }

    pub async fn set_speed(&self, speed: PlaybackSpeed) {
        self.shared.write().await.speed = speed;
    }

    pub async fn total_operations(&self) -> usize {
        self.shared.read().await.session.operations.len()
    }

    /// Reconstructed state at the current index.
    pub async fn current_blocks(&self) -> HashMap<String, String> {
        let s = self.shared.read().await;
        reconstruct_state(&s.session, s.index)
    }

    /// Begin (or resume) advancing through the log.
    ///
    /// Starting a replay while one is active replaces the running
    /// timer; two timers never race on one session.
    pub async fn play(&mut self) {
        self.stop_timer();
        self.shared.write().await.state = PlaybackState::Playing;

        let shared = self.shared.clone();
        let tx = self.event_tx.clone();
        self.timer = Some(tokio::spawn(async move {
            Self::run_timer(shared, tx).await;
        }));
    }

    /// Halt advancement without losing position.
    pub async fn pause(&mut self) {
        self.stop_timer();
        self.shared.write().await.state = PlaybackState::Paused;
    }

    /// Jump to `index` (clamped to the available operations) and
    /// return the reconstructed state there. Valid in any state; while
    /// Playing, the timer simply continues from the new position.
    pub async fn seek_to(&mut self, index: usize) -> HashMap<String, String> {
        let mut s = self.shared.write().await;
        let total = s.session.operations.len();
        let clamped = if total == 0 { 0 } else { index.min(total - 1) };
        s.index = clamped;
        if s.state == PlaybackState::Finished && clamped + 1 < total {
            s.state = PlaybackState::Paused;
        }
        reconstruct_state(&s.session, clamped)
    }

    /// Back to the first operation, paused.
    pub async fn restart(&mut self) -> HashMap<String, String> {
        let blocks = self.seek_to(0).await;
        self.pause().await;
        blocks
    }

    fn stop_timer(&mut self) {
        if let Some(handle) = self.timer.take() {
            handle.abort();
        }
    }

    async fn run_timer(shared: Arc<RwLock<ReplayShared>>, tx: mpsc::Sender<ReplayEvent>) {
        loop {
            // Delay until the next operation, or None when done.
            let delay = {
                let s = shared.read().await;
                if s.state != PlaybackState::Playing {
                    return;
                }
                let total = s.session.operations.len();
                if total == 0 || s.index + 1 >= total {
                    None
                } else {
                    let gap = s.session.operations[s.index + 1].timestamp
                        - s.session.operations[s.index].timestamp;
                    let clamped = gap.clamp(MIN_TICK_MS, MAX_TICK_MS) as u64;
                    Some(Duration::from_millis(clamped / s.speed.multiplier()))
                }
            };

            let Some(delay) = delay else {
                {
                    let mut s = shared.write().await;
                    if s.state != PlaybackState::Playing {
                        return;
                    }
                    s.state = PlaybackState::Finished;
                }
                let _ = tx.send(ReplayEvent::Finished).await;
                return;
            };

            tokio::time::sleep(delay).await;

            let progress = {
                let mut s = shared.write().await;
                if s.state != PlaybackState::Playing {
                    return;
                }
                if s.index + 1 < s.session.operations.len() {
                    s.index += 1;
                    Some((s.index, reconstruct_state(&s.session, s.index)))
                } else {
                    None
                }
            };
            if let Some((index, blocks)) = progress {
                let _ = tx.send(ReplayEvent::Progress { index, blocks }).await;
            }
        }
    }
}

impl Drop for ReplayEngine {
    // Closing the replay view must not leave a timer firing.
    fn drop(&mut self) {
        self.stop_timer();
    }
}
