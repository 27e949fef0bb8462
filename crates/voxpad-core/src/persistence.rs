//! Project persistence: documents on disk, the recent-projects index, and the
//! autosave timer.
//!
//! Project documents are pretty-printed JSON preserving Project → Section →
//! Field order; the small index document (recent projects plus a few global
//! preferences) is TOML. The autosave pass only touches projects that are
//! both dirty and already have a save path; a never-saved project waits for
//! an explicit "Save As". The same pass doubles as the best-effort flush on
//! abnormal termination.

use crate::error::{VoxpadError, VoxpadResult};
use crate::project::Project;
use crate::workspace::Workspace;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Name → file path table plus project document I/O
#[derive(Debug, Default)]
pub struct ProjectStore {
    paths: Mutex<HashMap<String, PathBuf>>,
}

impl ProjectStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember the save target for a project
    pub fn assign_path<P: Into<PathBuf>>(&self, name: &str, path: P) {
        self.paths.lock().insert(name.to_string(), path.into());
    }

    /// Look up a project's save target
    #[must_use]
    pub fn path_for(&self, name: &str) -> Option<PathBuf> {
        self.paths.lock().get(name).cloned()
    }

    /// Drop a project's save target (e.g. when it is closed)
    pub fn forget(&self, name: &str) -> Option<PathBuf> {
        self.paths.lock().remove(name)
    }

    /// Move a save target to a renamed project, keeping the path
    pub fn rename_entry(&self, old: &str, new: &str) -> bool {
        let mut paths = self.paths.lock();
        match paths.remove(old) {
            Some(path) => {
                paths.insert(new.to_string(), path);
                true
            }
            None => false,
        }
    }

    /// Write a project document
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be serialized or written.
    pub fn save_project(&self, project: &Project, path: &Path) -> VoxpadResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let document = serde_json::to_string_pretty(project)?;
        std::fs::write(path, document)?;
        debug!(name = %project.name, path = %path.display(), "project saved");
        Ok(())
    }

    /// Read a project document; the result is clean
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_project(&self, path: &Path) -> VoxpadResult<Project> {
        let document = std::fs::read_to_string(path)?;
        let project: Project = serde_json::from_str(&document)?;
        debug!(name = %project.name, path = %path.display(), "project loaded");
        Ok(project)
    }

    /// Explicit "Save As": snapshot, write, remember the path, mark clean
    ///
    /// # Errors
    ///
    /// Returns an error if the project is not open or the write fails.
    pub fn save_as(&self, workspace: &Workspace, name: &str, path: &Path) -> VoxpadResult<()> {
        let snapshot = workspace
            .snapshot(name)
            .ok_or_else(|| VoxpadError::project_not_found(name))?;
        self.save_project(&snapshot, path)?;
        self.assign_path(name, path);
        workspace.mark_clean(name);
        info!(%name, path = %path.display(), "project saved as");
        Ok(())
    }

    /// The autosave pass: persist every open project that is dirty and has a
    /// save path
    ///
    /// Path-less projects are skipped. A failed save is logged and leaves the
    /// project dirty (the unsaved-state indicator); it never aborts the rest
    /// of the pass. Returns the number of projects saved.
    pub fn save_open_projects(&self, workspace: &Workspace) -> usize {
        let mut saved = 0;
        for name in workspace.dirty_project_names() {
            let Some(path) = self.path_for(&name) else {
                debug!(%name, "dirty project has no save path yet, skipping");
                continue;
            };
            let Some(snapshot) = workspace.snapshot(&name) else {
                continue;
            };
            match self.save_project(&snapshot, &path) {
                Ok(()) => {
                    workspace.mark_clean(&name);
                    saved += 1;
                }
                Err(e) => {
                    warn!(%name, error = %e, "autosave failed, project stays dirty");
                }
            }
        }
        saved
    }
}

/// Entry in the recent-projects list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentProject {
    /// Project display name
    pub name: String,
    /// Path of the project document
    pub path: PathBuf,
}

/// Small index document: recent projects plus global preferences
///
/// Saved and loaded independently of project dirtiness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectIndex {
    /// Name of the project focused in the last session
    pub current_project: Option<String>,
    /// Whether the autosave timer is enabled
    pub autosave_enabled: bool,
    /// Autosave interval in seconds
    pub autosave_interval_secs: u64,
    /// Whether to reopen the last project on startup
    pub auto_open_last: bool,
    /// Known projects, most recently used first
    #[serde(default)]
    pub recent: Vec<RecentProject>,
}

impl Default for ProjectIndex {
    fn default() -> Self {
        Self {
            current_project: None,
            autosave_enabled: true,
            autosave_interval_secs: 60,
            auto_open_last: true,
            recent: Vec::new(),
        }
    }
}

impl ProjectIndex {
    /// Autosave interval as a [`Duration`]
    #[must_use]
    pub const fn autosave_interval(&self) -> Duration {
        Duration::from_secs(self.autosave_interval_secs)
    }

    /// Record a project in the recent list, moving it to the front
    pub fn remember<P: Into<PathBuf>>(&mut self, name: &str, path: P) {
        self.recent.retain(|entry| entry.name != name);
        self.recent.insert(
            0,
            RecentProject {
                name: name.to_string(),
                path: path.into(),
            },
        );
    }

    /// Write the index document
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be serialized or written.
    pub fn save(&self, path: &Path) -> VoxpadResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let document = toml::to_string_pretty(self)?;
        std::fs::write(path, document)?;
        debug!(path = %path.display(), "project index saved");
        Ok(())
    }

    /// Read the index document
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> VoxpadResult<Self> {
        let document = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&document)?)
    }
}

/// Periodic autosave trigger
///
/// Runs [`ProjectStore::save_open_projects`] on a wall-clock interval until
/// stopped or dropped.
#[derive(Debug)]
pub struct Autosave {
    handle: JoinHandle<()>,
}

impl Autosave {
    /// Start the autosave timer
    pub fn start(workspace: Arc<Workspace>, store: Arc<ProjectStore>, interval: Duration) -> Self {
        // tokio's interval panics on zero
        let interval = interval.max(Duration::from_millis(10));
        info!(?interval, "autosave timer started");
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick fires immediately; the timer should not.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let saved = store.save_open_projects(&workspace);
                if saved > 0 {
                    info!(saved, "autosave pass complete");
                }
            }
        });
        Self { handle }
    }

    /// Stop the autosave timer
    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for Autosave {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_project(name: &str) -> Project {
        let mut project = Project::new(name, "round trip test");
        let s0 = project.add_section("intro");
        project.add_field(s0, "first");
        project.add_field(s0, "second");
        let s1 = project.add_section("outro");
        project.add_field(s1, "third");
        project
    }

    #[test]
    fn test_path_table() {
        let store = ProjectStore::new();
        assert_eq!(store.path_for("notes"), None);

        store.assign_path("notes", "/tmp/notes.json");
        assert_eq!(store.path_for("notes"), Some(PathBuf::from("/tmp/notes.json")));

        assert!(store.rename_entry("notes", "drafts"));
        assert_eq!(store.path_for("notes"), None);
        assert_eq!(store.path_for("drafts"), Some(PathBuf::from("/tmp/notes.json")));
        assert!(!store.rename_entry("ghost", "x"));

        assert_eq!(store.forget("drafts"), Some(PathBuf::from("/tmp/notes.json")));
        assert_eq!(store.forget("drafts"), None);
    }

    #[test]
    fn test_project_document_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = ProjectStore::new();
        let project = sample_project("notes");
        let path = dir.path().join("notes.json");

        store.save_project(&project, &path).unwrap();
        let loaded = store.load_project(&path).unwrap();

        assert!(!loaded.is_dirty());
        assert_eq!(loaded.name, project.name);
        assert_eq!(loaded.description, project.description);
        assert_eq!(loaded.sections, project.sections);
    }

    #[test]
    fn test_load_missing_document() {
        let dir = TempDir::new().unwrap();
        let store = ProjectStore::new();
        assert!(store.load_project(&dir.path().join("nope.json")).is_err());
    }

    #[test]
    fn test_save_as_assigns_path_and_cleans() {
        let dir = TempDir::new().unwrap();
        let workspace = Workspace::new();
        workspace.open(sample_project("notes"));
        let store = ProjectStore::new();
        let path = dir.path().join("deep").join("notes.json");

        store.save_as(&workspace, "notes", &path).unwrap();
        assert!(path.is_file());
        assert_eq!(store.path_for("notes"), Some(path));
        assert!(workspace.dirty_project_names().is_empty());
    }

    #[test]
    fn test_save_as_unknown_project() {
        let dir = TempDir::new().unwrap();
        let workspace = Workspace::new();
        let store = ProjectStore::new();
        let err = store
            .save_as(&workspace, "ghost", &dir.path().join("x.json"))
            .unwrap_err();
        assert!(matches!(err, VoxpadError::ProjectNotFound { .. }));
    }

    #[test]
    fn test_autosave_pass_skips_pathless_and_clean() {
        let dir = TempDir::new().unwrap();
        let workspace = Workspace::new();
        workspace.open(sample_project("saved"));
        workspace.open(sample_project("unsaved"));
        let store = ProjectStore::new();
        let path = dir.path().join("saved.json");
        store.assign_path("saved", &path);

        // Both dirty, only "saved" has a path.
        assert_eq!(store.save_open_projects(&workspace), 1);
        assert!(path.is_file());
        assert_eq!(workspace.dirty_project_names(), vec!["unsaved"]);

        // Nothing dirty with a path left: a second pass writes nothing.
        assert_eq!(store.save_open_projects(&workspace), 0);
    }

    #[test]
    fn test_autosave_pass_failure_leaves_dirty() {
        let dir = TempDir::new().unwrap();
        let workspace = Workspace::new();
        workspace.open(sample_project("notes"));
        let store = ProjectStore::new();
        // The parent "directory" is a plain file, so the save must fail.
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();
        store.assign_path("notes", blocker.join("sub").join("notes.json"));

        assert_eq!(store.save_open_projects(&workspace), 0);
        assert_eq!(workspace.dirty_project_names(), vec!["notes"]);
    }

    #[test]
    fn test_index_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut index = ProjectIndex::default();
        index.current_project = Some("notes".to_string());
        index.autosave_interval_secs = 30;
        index.remember("notes", "/tmp/notes.json");
        index.remember("drafts", "/tmp/drafts.json");

        let path = dir.path().join("index.toml");
        index.save(&path).unwrap();
        let loaded = ProjectIndex::load(&path).unwrap();
        assert_eq!(loaded, index);
        assert_eq!(loaded.autosave_interval(), Duration::from_secs(30));
    }

    #[test]
    fn test_index_remember_moves_to_front() {
        let mut index = ProjectIndex::default();
        index.remember("a", "/a.json");
        index.remember("b", "/b.json");
        index.remember("a", "/a2.json");

        let names: Vec<_> = index.recent.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(index.recent[0].path, PathBuf::from("/a2.json"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_autosave_timer_saves_dirty_projects() {
        let dir = TempDir::new().unwrap();
        let workspace = Arc::new(Workspace::new());
        workspace.open(sample_project("notes"));
        let store = Arc::new(ProjectStore::new());
        let path = dir.path().join("notes.json");
        store.assign_path("notes", &path);

        let autosave = Autosave::start(
            Arc::clone(&workspace),
            Arc::clone(&store),
            Duration::from_millis(50),
        );

        for _ in 0..100 {
            if path.is_file() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        autosave.stop();

        assert!(path.is_file());
        assert!(workspace.dirty_project_names().is_empty());
    }
}
