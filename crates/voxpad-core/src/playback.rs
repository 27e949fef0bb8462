//! External-process audio playback with asynchronous completion detection.
//!
//! Playback shells out to whichever command-line player the host happens to
//! have. Candidates are probed in order: launch with output suppressed, wait
//! a short grace delay, and keep the first process that is still alive. The
//! liveness check is what separates "player is playing" from "player bailed
//! out over a missing codec or device", which a fire-and-forget spawn cannot
//! see.
//!
//! At most one session exists system-wide. Each session carries a token so a
//! monitor from a stopped-then-restarted session can never clear state that
//! now belongs to its successor.

use crate::error::{VoxpadError, VoxpadResult};
use crate::synthesis::artifact_path;
use crate::workspace::Workspace;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Playback state enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// No session is active
    Idle,
    /// Candidate players are being probed
    Starting,
    /// An external player process is running
    Playing,
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Starting => write!(f, "Starting"),
            Self::Playing => write!(f, "Playing"),
        }
    }
}

/// Playback manager configuration
#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    /// Candidate player programs, tried in order; first alive wins
    pub players: Vec<String>,
    /// How long to wait after launch before the liveness check
    pub spawn_grace: Duration,
    /// Directory audio artifacts are read from
    pub audio_dir: PathBuf,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            players: vec![
                "aplay".to_string(),
                "paplay".to_string(),
                "play".to_string(),
                "mpv".to_string(),
            ],
            spawn_grace: Duration::from_millis(150),
            audio_dir: crate::synthesis::default_audio_dir(),
        }
    }
}

impl PlaybackConfig {
    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the candidate list is empty.
    pub fn validate(&self) -> VoxpadResult<()> {
        if self.players.is_empty() {
            return Err(VoxpadError::configuration(
                "Player candidate list cannot be empty",
            ));
        }
        Ok(())
    }
}

struct PlaybackSession {
    field_id: Uuid,
    token: u64,
    kill: oneshot::Sender<()>,
    monitor: JoinHandle<()>,
}

impl std::fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("field_id", &self.field_id)
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

/// Manages the single system-wide playback session
#[derive(Debug)]
pub struct PlaybackManager {
    workspace: Arc<Workspace>,
    config: PlaybackConfig,
    session: Arc<Mutex<Option<PlaybackSession>>>,
    state: Arc<Mutex<PlaybackState>>,
    next_token: AtomicU64,
}

impl PlaybackManager {
    /// Create a playback manager over a workspace
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(workspace: Arc<Workspace>, config: PlaybackConfig) -> VoxpadResult<Self> {
        config.validate()?;
        Ok(Self {
            workspace,
            config,
            session: Arc::new(Mutex::new(None)),
            state: Arc::new(Mutex::new(PlaybackState::Idle)),
            next_token: AtomicU64::new(0),
        })
    }

    /// Get the playback configuration
    #[must_use]
    pub const fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    /// Current playback state
    #[must_use]
    pub fn state(&self) -> PlaybackState {
        *self.state.lock()
    }

    /// Check whether a player process is currently running
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.state() == PlaybackState::Playing
    }

    /// Field whose artifact is currently playing, if any
    #[must_use]
    pub fn current_field(&self) -> Option<Uuid> {
        self.session.lock().as_ref().map(|s| s.field_id)
    }

    /// Play a field's audio artifact
    ///
    /// Any active session is stopped first, even for the same field (restart
    /// semantics). Candidate players are tried in order until one survives
    /// the grace delay.
    ///
    /// # Errors
    ///
    /// Returns an error if the artifact is missing or no candidate player
    /// stayed alive.
    pub async fn play(&self, id: Uuid) -> VoxpadResult<()> {
        self.stop().await?;

        let path = artifact_path(&self.config.audio_dir, id);
        if !path.is_file() {
            return Err(VoxpadError::playback(format!(
                "no audio artifact for field {id}"
            )));
        }

        *self.state.lock() = PlaybackState::Starting;
        for player in &self.config.players {
            let spawned = Command::new(player)
                .arg(&path)
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn();
            let mut child = match spawned {
                Ok(child) => child,
                Err(e) => {
                    debug!(%player, error = %e, "player failed to launch");
                    continue;
                }
            };

            tokio::time::sleep(self.config.spawn_grace).await;
            match child.try_wait() {
                Ok(None) => {
                    self.adopt(id, player, child);
                    return Ok(());
                }
                Ok(Some(status)) => {
                    debug!(%player, %status, "player exited immediately");
                }
                Err(e) => {
                    warn!(%player, error = %e, "could not check player liveness");
                }
            }
        }

        *self.state.lock() = PlaybackState::Idle;
        warn!(%id, "no audio player available");
        Err(VoxpadError::playback("no audio player available"))
    }

    /// Stop the active session, if any, and wait for the player to exit
    ///
    /// Waiting for actual process exit is what keeps players from outliving
    /// their session as orphans. Calling with no active session is a no-op.
    ///
    /// # Errors
    ///
    /// Currently always returns `Ok`; monitor teardown problems are logged.
    pub async fn stop(&self) -> VoxpadResult<()> {
        let session = self.session.lock().take();
        let Some(session) = session else {
            return Ok(());
        };

        debug!(field = %session.field_id, "stopping playback");
        if !self.workspace.set_playing(session.field_id, false) {
            warn!(field = %session.field_id, "field vanished before playback stopped");
        }
        // The monitor may have finished naturally already; a dead receiver is
        // fine.
        let _ = session.kill.send(());
        if let Err(e) = session.monitor.await {
            warn!(error = %e, "playback monitor task failed");
        }
        *self.state.lock() = PlaybackState::Idle;
        Ok(())
    }

    /// Record an adopted player process and spawn its completion monitor
    fn adopt(&self, id: Uuid, player: &str, mut child: tokio::process::Child) {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        if !self.workspace.set_playing(id, true) {
            warn!(%id, "field vanished while playback was starting");
        }

        let (kill_tx, kill_rx) = oneshot::channel::<()>();
        let session_slot = Arc::clone(&self.session);
        let state_slot = Arc::clone(&self.state);
        let workspace = Arc::clone(&self.workspace);

        // Hold the session slot while spawning so the monitor cannot observe
        // it before the new session is stored.
        let mut slot = self.session.lock();
        let monitor = tokio::spawn(async move {
            let natural_exit = tokio::select! {
                status = child.wait() => Some(status),
                _ = kill_rx => None,
            };
            match natural_exit {
                Some(status) => {
                    match status {
                        Ok(status) => debug!(%id, %status, "player exited"),
                        Err(e) => warn!(%id, error = %e, "failed waiting for player"),
                    }
                    // Only clean up if this session is still the active one;
                    // a stop-then-restart hands the slot to a successor.
                    let mut session = session_slot.lock();
                    if session.as_ref().map_or(false, |s| s.token == token) {
                        *session = None;
                        drop(session);
                        *state_slot.lock() = PlaybackState::Idle;
                        if !workspace.set_playing(id, false) {
                            warn!(%id, "field vanished before playback completed");
                        }
                    }
                }
                None => {
                    if let Err(e) = child.kill().await {
                        warn!(%id, error = %e, "failed to kill player process");
                    }
                    let _ = child.wait().await;
                }
            }
        });
        *slot = Some(PlaybackSession {
            field_id: id,
            token,
            kill: kill_tx,
            monitor,
        });
        drop(slot);

        *self.state.lock() = PlaybackState::Playing;
        info!(%id, %player, "playback started");
    }
}
