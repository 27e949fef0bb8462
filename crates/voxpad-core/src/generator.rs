//! Generation queue and the single background worker that drains it.
//!
//! Tasks carry nothing but a field id. The worker re-resolves the text at
//! dequeue time, so edits and reorders that happen while a task waits are
//! picked up for free and a deleted field degrades to a logged skip. Pushing
//! a task and deciding whether to start the worker happen under one mutex,
//! which is what makes "exactly one worker, ever" hold under concurrent
//! enqueues.

use crate::error::VoxpadResult;
use crate::synthesis::{artifact_path, default_audio_dir, SynthesisClient, SynthesisRequest};
use crate::workspace::Workspace;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Generation worker configuration
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Directory audio artifacts are written to
    pub audio_dir: PathBuf,
    /// Voice identifier passed to the backend
    pub voice: String,
    /// Speed multiplier passed to the backend
    pub speed: f32,
    /// How long shutdown waits for an in-flight synthesis call before
    /// abandoning it
    pub shutdown_grace: Duration,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            audio_dir: default_audio_dir(),
            voice: crate::DEFAULT_VOICE.to_string(),
            speed: crate::DEFAULT_SPEED,
            shutdown_grace: Duration::from_secs(2),
        }
    }
}

impl GeneratorConfig {
    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the voice is empty or the speed is out of range.
    pub fn validate(&self) -> VoxpadResult<()> {
        if self.voice.is_empty() {
            return Err(crate::error::VoxpadError::configuration(
                "Voice cannot be empty",
            ));
        }
        if !(0.1..=3.0).contains(&self.speed) {
            return Err(crate::error::VoxpadError::configuration(format!(
                "Speed must be between 0.1 and 3.0, got {}",
                self.speed
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<Uuid>,
    worker_running: bool,
}

/// FIFO generation queue owning the lifecycle of its single worker
#[derive(Debug)]
pub struct Generator {
    workspace: Arc<Workspace>,
    client: SynthesisClient,
    config: GeneratorConfig,
    state: Arc<Mutex<QueueState>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    shutting_down: Arc<AtomicBool>,
}

impl Generator {
    /// Create a generator over a workspace and a synthesis client
    ///
    /// Ensures the artifact directory exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the artifact
    /// directory cannot be created.
    pub fn new(
        workspace: Arc<Workspace>,
        client: SynthesisClient,
        config: GeneratorConfig,
    ) -> VoxpadResult<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.audio_dir)?;
        info!(audio_dir = %config.audio_dir.display(), "generator ready");
        Ok(Self {
            workspace,
            client,
            config,
            state: Arc::new(Mutex::new(QueueState::default())),
            worker: Mutex::new(None),
            shutting_down: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Queue a generation task for a field
    ///
    /// Marks the field as generating, appends to the FIFO, and starts the
    /// worker if none is running. Returns false if the generator is shutting
    /// down and refused the task.
    pub fn enqueue(&self, id: Uuid) -> bool {
        if self.shutting_down.load(Ordering::SeqCst) {
            debug!(%id, "generator is shutting down, refusing task");
            return false;
        }
        if !self.workspace.set_generating(id, true) {
            // The worker will log the not-found race when it gets there.
            debug!(%id, "enqueued field does not currently resolve");
        }

        let mut state = self.state.lock();
        state.pending.push_back(id);
        if !state.worker_running {
            state.worker_running = true;
            let handle = self.spawn_worker();
            *self.worker.lock() = Some(handle);
        }
        true
    }

    /// Queue generation tasks for a batch of fields, preserving order
    ///
    /// Returns the number of tasks accepted.
    pub fn enqueue_all<I: IntoIterator<Item = Uuid>>(&self, ids: I) -> usize {
        ids.into_iter().filter(|id| self.enqueue(*id)).count()
    }

    /// Number of tasks waiting in the queue (excluding any in-flight task)
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Check whether the background worker is currently running
    #[must_use]
    pub fn is_worker_running(&self) -> bool {
        self.state.lock().worker_running
    }

    /// Check whether shutdown has begun
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Get the generator configuration
    #[must_use]
    pub const fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Cancel all pending (unstarted) tasks
    ///
    /// Clears the `generating` flag of every cancelled field so nothing looks
    /// stuck. The in-flight task, if any, is not touched. Returns the number
    /// of cancelled tasks.
    pub fn drain(&self) -> usize {
        let drained: Vec<Uuid> = self.state.lock().pending.drain(..).collect();
        for id in &drained {
            self.workspace.set_generating(*id, false);
        }
        if !drained.is_empty() {
            info!(count = drained.len(), "cancelled pending generation tasks");
        }
        drained.len()
    }

    /// Stop accepting tasks, cancel the queue, and wait briefly for the worker
    ///
    /// Waits `shutdown_grace` for an in-flight synthesis call. The backend
    /// cannot be interrupted, so on timeout the worker task is abandoned (it
    /// either finishes in the background or leaks until process exit) rather
    /// than forcibly killed.
    pub async fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
        self.drain();

        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            match tokio::time::timeout(self.config.shutdown_grace, handle).await {
                Ok(Ok(())) => debug!("generation worker finished before shutdown deadline"),
                Ok(Err(e)) => warn!("generation worker task failed: {e}"),
                Err(_) => {
                    warn!(
                        grace = ?self.config.shutdown_grace,
                        "synthesis still running after grace period, abandoning worker task"
                    );
                }
            }
        }
    }

    fn spawn_worker(&self) -> JoinHandle<()> {
        let workspace = Arc::clone(&self.workspace);
        let client = self.client.clone();
        let state = Arc::clone(&self.state);
        let audio_dir = self.config.audio_dir.clone();
        let voice = self.config.voice.clone();
        let speed = self.config.speed;

        tokio::spawn(async move {
            debug!("generation worker started");
            loop {
                let id = {
                    let mut state = state.lock();
                    match state.pending.pop_front() {
                        Some(id) => id,
                        None => {
                            state.worker_running = false;
                            break;
                        }
                    }
                };

                // Re-resolve at dequeue time; the tree may have changed since
                // the task was queued.
                let Some(text) = workspace.field_content(id) else {
                    warn!(%id, "field vanished before synthesis, skipping task");
                    continue;
                };

                let output_path = artifact_path(&audio_dir, id);
                let request = SynthesisRequest {
                    text,
                    output_path: output_path.clone(),
                    voice: voice.clone(),
                    speed,
                };

                match client.generate(request).await {
                    Ok(()) => debug!(%id, path = %output_path.display(), "synthesis finished"),
                    Err(err) => {
                        warn!(%id, %err, "synthesis failed, no retry");
                        remove_partial_artifact(&output_path);
                    }
                }

                // Cleared on success and failure alike; a field may only stay
                // marked generating if it no longer resolves at all.
                if !workspace.set_generating(id, false) {
                    warn!(%id, "field vanished during synthesis");
                }
            }
            debug!("generation queue empty, worker exiting");
        })
    }
}

/// A failed generation must not leave an artifact that passes the UI's
/// "has audio" existence check.
fn remove_partial_artifact(path: &std::path::Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "failed to remove partial artifact");
        }
    }
}
