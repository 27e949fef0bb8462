//! # VoxPad Core
//!
//! Coordination engine for VoxPad: organize text snippets into projects,
//! queue them for neural TTS generation, and play the results back.
//!
//! ## Features
//!
//! - Projects → Sections → Fields with stable field identifiers
//! - Single-consumer generation queue over a lock-guarded Kokoro backend
//! - External-process audio playback with completion detection
//! - Dirty-tracked autosave and a recent-projects index
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use voxpad_core::{
//!     Generator, GeneratorConfig, KokoroBackend, PlaybackConfig, PlaybackManager, Project,
//!     SynthesisClient, Workspace,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let workspace = Arc::new(Workspace::new());
//!     let mut project = Project::new("notes", "demo project");
//!     let section = project.add_section("intro");
//!     let field = project.add_field(section, "Hello from VoxPad!").unwrap();
//!     workspace.open(project);
//!
//!     let backend = KokoroBackend::new("kokoro")?;
//!     let client = SynthesisClient::new(Box::new(backend));
//!     let generator = Generator::new(Arc::clone(&workspace), client, GeneratorConfig::default())?;
//!     generator.enqueue(field);
//!
//!     let playback = PlaybackManager::new(Arc::clone(&workspace), PlaybackConfig::default())?;
//!     playback.play(field).await?;
//!     playback.stop().await?;
//!     generator.shutdown().await;
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod generator;
pub mod persistence;
pub mod playback;
pub mod project;
pub mod synthesis;
pub mod workspace;

// Re-export main types for convenience
pub use error::{VoxpadError, VoxpadResult};
pub use generator::{Generator, GeneratorConfig};
pub use persistence::{Autosave, ProjectIndex, ProjectStore, RecentProject};
pub use playback::{PlaybackConfig, PlaybackManager, PlaybackState};
pub use project::{Field, Project, Section};
pub use synthesis::{
    artifact_path, has_artifact, KokoroBackend, SynthesisBackend, SynthesisClient,
    SynthesisRequest,
};
pub use workspace::{FieldPath, Workspace};

/// Version information for the voxpad-core crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default Kokoro voice identifier
pub const DEFAULT_VOICE: &str = "af_heart";

/// Default speech speed multiplier
pub const DEFAULT_SPEED: f32 = 1.0;

/// Maximum text length for a single synthesis call (to prevent memory issues)
pub const MAX_TEXT_LENGTH: usize = 100_000;
