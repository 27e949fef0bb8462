//! Synthesis backend boundary.
//!
//! The heavy lifting happens in an external Kokoro engine driven by a Python
//! interpreter. Its execution context is single-threaded and not
//! reentrant-safe, so the whole boundary is modeled as one mutex-guarded
//! [`SynthesisClient`]: the lock is acquired for the full duration of every
//! call, which makes "at most one synthesis in flight system-wide" a type-level
//! fact instead of a property of how many workers happen to exist.
//!
//! Artifact naming is a pure function of the field id, so regeneration is
//! idempotent and the UI can answer "has audio?" with a plain file-existence
//! check.

use crate::error::{VoxpadError, VoxpadResult};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One synthesis call: text in, audio artifact out
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    /// Text to synthesize
    pub text: String,
    /// Absolute path the backend writes the artifact to
    pub output_path: PathBuf,
    /// Voice identifier understood by the backend
    pub voice: String,
    /// Speed multiplier (0.1 to 3.0)
    pub speed: f32,
}

impl SynthesisRequest {
    /// Validate the request before handing it to the backend
    ///
    /// # Errors
    ///
    /// Returns an error if the text is empty or oversized, the voice is
    /// empty, or the speed is out of range.
    pub fn validate(&self) -> VoxpadResult<()> {
        if self.text.is_empty() {
            return Err(VoxpadError::invalid_input("Text cannot be empty"));
        }
        if self.text.len() > crate::MAX_TEXT_LENGTH {
            return Err(VoxpadError::invalid_input(format!(
                "Text length {} exceeds maximum of {}",
                self.text.len(),
                crate::MAX_TEXT_LENGTH
            )));
        }
        if self.voice.is_empty() {
            return Err(VoxpadError::invalid_input("Voice cannot be empty"));
        }
        if !(0.1..=3.0).contains(&self.speed) {
            return Err(VoxpadError::invalid_input(format!(
                "Speed must be between 0.1 and 3.0, got {}",
                self.speed
            )));
        }
        Ok(())
    }
}

/// A synchronous text-to-speech engine
///
/// `generate` blocks until the artifact is written (or the attempt failed)
/// and must never be entered from two threads at once; [`SynthesisClient`]
/// enforces that.
pub trait SynthesisBackend: Send {
    /// Synthesize `request.text` into `request.output_path`
    ///
    /// # Errors
    ///
    /// Returns an error if the backend could not produce the artifact.
    fn generate(&mut self, request: &SynthesisRequest) -> VoxpadResult<()>;
}

/// Mutex-guarded handle to the synthesis backend
///
/// Cloning is cheap; all clones share the same backend and the same lock.
#[derive(Clone)]
pub struct SynthesisClient {
    backend: Arc<Mutex<Box<dyn SynthesisBackend>>>,
}

impl std::fmt::Debug for SynthesisClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthesisClient").finish_non_exhaustive()
    }
}

impl SynthesisClient {
    /// Wrap a backend in the execution lock
    #[must_use]
    pub fn new(backend: Box<dyn SynthesisBackend>) -> Self {
        Self {
            backend: Arc::new(Mutex::new(backend)),
        }
    }

    /// Run one synthesis call with the execution lock held throughout
    ///
    /// The blocking backend call is moved off the async runtime via
    /// `spawn_blocking`; the caller only awaits.
    ///
    /// # Errors
    ///
    /// Returns an error if the request is invalid, the backend fails, or the
    /// blocking task is torn down underneath us.
    pub async fn generate(&self, request: SynthesisRequest) -> VoxpadResult<()> {
        request.validate()?;
        debug!(chars = request.text.len(), path = %request.output_path.display(), "dispatching synthesis call");

        let backend = Arc::clone(&self.backend);
        tokio::task::spawn_blocking(move || {
            let mut backend = backend.lock();
            backend.generate(&request)
        })
        .await
        .map_err(|e| VoxpadError::concurrency(format!("synthesis task failed: {e}")))?
    }
}

/// Compute the deterministic artifact path for a field
///
/// Content-independent: the same id always maps to the same file, so
/// regeneration overwrites in place.
#[must_use]
pub fn artifact_path(audio_dir: &Path, id: Uuid) -> PathBuf {
    audio_dir.join(format!("{id}.wav"))
}

/// Check whether a field's audio artifact exists on disk
#[must_use]
pub fn has_artifact(audio_dir: &Path, id: Uuid) -> bool {
    artifact_path(audio_dir, id).is_file()
}

/// Default artifact directory under the platform data dir
pub(crate) fn default_audio_dir() -> PathBuf {
    directories::ProjectDirs::from("app", "VoxPad", "voxpad")
        .map(|dirs| dirs.data_dir().join("audio"))
        .unwrap_or_else(|| PathBuf::from("audio"))
}

/// Python shim run as `python -c <SHIM> <text> <path> <voice> <speed>`
const KOKORO_SHIM: &str = "\
import sys
import kokoro_tts
ok = kokoro_tts.generate_tts(sys.argv[1], sys.argv[2], sys.argv[3], float(sys.argv[4]))
sys.exit(0 if ok else 1)
";

/// Kokoro TTS backend driven through its Python virtual environment
///
/// Each call spawns the venv interpreter with a small shim around
/// `kokoro_tts.generate_tts`; the exit status is the success flag.
#[derive(Debug)]
pub struct KokoroBackend {
    script_dir: PathBuf,
    python: PathBuf,
}

impl KokoroBackend {
    /// Validate the Kokoro environment under `script_dir`
    ///
    /// Probes the virtual environment's interpreter; if the probe fails, runs
    /// `setup_venv.sh` once and probes again. A still-broken environment is a
    /// setup error, which disables the synthesis feature for the session.
    ///
    /// # Errors
    ///
    /// Returns a setup error if the script, the interpreter, or the
    /// bootstrap step is missing or broken.
    pub fn new<P: Into<PathBuf>>(script_dir: P) -> VoxpadResult<Self> {
        let script_dir = script_dir.into();
        let script = script_dir.join("kokoro_tts.py");
        if !script.is_file() {
            return Err(VoxpadError::setup(format!(
                "kokoro_tts.py not found in {}",
                script_dir.display()
            )));
        }

        let python = venv_python(&script_dir);
        if !probe_venv(&python) {
            let setup_script = script_dir.join("setup_venv.sh");
            if !setup_script.is_file() {
                return Err(VoxpadError::setup(format!(
                    "setup_venv.sh not found in {}",
                    script_dir.display()
                )));
            }
            info!(script = %setup_script.display(), "virtual environment not ready, running setup script");
            let status = Command::new("bash")
                .arg(&setup_script)
                .status()
                .map_err(|e| VoxpadError::setup(format!("failed to run setup_venv.sh: {e}")))?;
            if !status.success() {
                return Err(VoxpadError::setup(format!(
                    "setup_venv.sh failed with {status}"
                )));
            }
            if !probe_venv(&python) {
                return Err(VoxpadError::setup(format!(
                    "virtual environment at {} is still unusable after setup",
                    python.display()
                )));
            }
        }

        info!(python = %python.display(), "Kokoro environment validated");
        Ok(Self { script_dir, python })
    }
}

impl SynthesisBackend for KokoroBackend {
    fn generate(&mut self, request: &SynthesisRequest) -> VoxpadResult<()> {
        if let Some(parent) = request.output_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let output = absolute_path(&request.output_path)?;

        let status = Command::new(&self.python)
            .arg("-c")
            .arg(KOKORO_SHIM)
            .arg(&request.text)
            .arg(&output)
            .arg(&request.voice)
            .arg(request.speed.to_string())
            .current_dir(&self.script_dir)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| VoxpadError::synthesis(format!("failed to spawn interpreter: {e}")))?;

        if status.success() {
            Ok(())
        } else {
            warn!(%status, path = %output.display(), "Kokoro generation failed");
            Err(VoxpadError::synthesis(format!(
                "generate_tts reported failure ({status})"
            )))
        }
    }
}

fn venv_python(script_dir: &Path) -> PathBuf {
    #[cfg(windows)]
    {
        script_dir.join("venv").join("Scripts").join("python.exe")
    }
    #[cfg(not(windows))]
    {
        script_dir.join("venv").join("bin").join("python")
    }
}

/// `python -m pip --version` with output suppressed, as a cheap liveness probe
fn probe_venv(python: &Path) -> bool {
    Command::new(python)
        .args(["-m", "pip", "--version"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

fn absolute_path(path: &Path) -> VoxpadResult<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
