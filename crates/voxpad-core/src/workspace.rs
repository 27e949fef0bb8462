//! Open-project workspace: shared ownership of the project tree plus field
//! resolution by stable id.
//!
//! The UI thread mutates the tree (edits, reorders, add/remove) while the
//! generation worker and playback monitors resolve fields concurrently, so
//! every structural read and write goes through one [`parking_lot::RwLock`].
//! Critical sections are O(tree size) scans and stay short; the lock is never
//! held across an await point.
//!
//! Resolution is a fresh linear scan on every call, never a cached index: a
//! task enqueued against index positions would break the moment the user
//! reorders a section, while a scan by id simply finds the field wherever it
//! lives now. "Found then vanished" is a normal race and callers treat a
//! `None` as a recoverable skip.

use crate::error::{VoxpadError, VoxpadResult};
use crate::project::{Field, Project};
use parking_lot::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Location of a field in the workspace at the time of a lookup
///
/// Indices are positions in the current snapshot; any structural mutation can
/// invalidate them. Re-resolve instead of caching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldPath {
    /// Index of the owning project in the open-projects list
    pub project: usize,
    /// Index of the owning section within the project
    pub section: usize,
    /// Index of the field within the section
    pub field: usize,
}

/// Thread-safe collection of the currently open projects
#[derive(Debug, Default)]
pub struct Workspace {
    projects: RwLock<Vec<Project>>,
}

impl Workspace {
    /// Create an empty workspace
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a project, renaming it if its name collides with an already open
    /// project
    ///
    /// Returns the name the project ended up with.
    pub fn open(&self, mut project: Project) -> String {
        let mut projects = self.projects.write();
        let name = unique_name(&project.name, |candidate| {
            projects.iter().any(|p| p.name == candidate)
        });
        if name != project.name {
            debug!(original = %project.name, adjusted = %name, "project name already open, adding suffix");
            project.name = name.clone();
        }
        projects.push(project);
        name
    }

    /// Close a project by name, returning it for a final save if wanted
    pub fn close(&self, name: &str) -> Option<Project> {
        let mut projects = self.projects.write();
        let index = projects.iter().position(|p| p.name == name)?;
        Some(projects.remove(index))
    }

    /// Rename an open project
    ///
    /// Collisions with other open projects are resolved by appending a
    /// numeric suffix, the same policy used when opening. Returns the name
    /// the project ended up with.
    pub fn rename(&self, old: &str, new: &str) -> VoxpadResult<String> {
        let mut projects = self.projects.write();
        let index = projects
            .iter()
            .position(|p| p.name == old)
            .ok_or_else(|| VoxpadError::project_not_found(old))?;
        if old == new {
            return Ok(old.to_string());
        }
        let name = unique_name(new, |candidate| {
            projects
                .iter()
                .enumerate()
                .any(|(i, p)| i != index && p.name == candidate)
        });
        projects[index].name = name.clone();
        projects[index].touch();
        Ok(name)
    }

    /// Names of all open projects, in open order
    #[must_use]
    pub fn project_names(&self) -> Vec<String> {
        self.projects.read().iter().map(|p| p.name.clone()).collect()
    }

    /// Number of open projects
    #[must_use]
    pub fn project_count(&self) -> usize {
        self.projects.read().len()
    }

    /// Check whether any project is open
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.projects.read().is_empty()
    }

    /// Run a closure against a project by name
    pub fn with_project<R>(&self, name: &str, f: impl FnOnce(&Project) -> R) -> Option<R> {
        let projects = self.projects.read();
        projects.iter().find(|p| p.name == name).map(f)
    }

    /// Run a mutating closure against a project by name
    ///
    /// The closure is responsible for going through [`Project`] mutation
    /// methods so the dirty flag stays accurate.
    pub fn with_project_mut<R>(&self, name: &str, f: impl FnOnce(&mut Project) -> R) -> Option<R> {
        let mut projects = self.projects.write();
        projects.iter_mut().find(|p| p.name == name).map(f)
    }

    /// Locate a field by id across all open projects
    ///
    /// Fresh linear scan over the current tree snapshot.
    #[must_use]
    pub fn find(&self, id: Uuid) -> Option<FieldPath> {
        let projects = self.projects.read();
        projects.iter().enumerate().find_map(|(pi, project)| {
            project.find(id).map(|(si, fi)| FieldPath {
                project: pi,
                section: si,
                field: fi,
            })
        })
    }

    /// Resolve a field's current text content
    #[must_use]
    pub fn field_content(&self, id: Uuid) -> Option<String> {
        let projects = self.projects.read();
        projects
            .iter()
            .find_map(|p| p.field(id))
            .map(|f| f.content.clone())
    }

    /// Run a mutating closure against a field by id
    ///
    /// Resolution and mutation happen under a single lock acquisition, so the
    /// field cannot move between being found and being updated.
    pub fn with_field_mut<R>(&self, id: Uuid, f: impl FnOnce(&mut Field) -> R) -> Option<R> {
        let mut projects = self.projects.write();
        projects.iter_mut().find_map(|p| p.field_mut(id)).map(f)
    }

    /// Set a field's `generating` flag, returning false if the field is gone
    ///
    /// Status flags are transient and do not mark the project dirty.
    pub fn set_generating(&self, id: Uuid, generating: bool) -> bool {
        self.with_field_mut(id, |field| field.generating = generating)
            .is_some()
    }

    /// Set a field's `playing_audio` flag, returning false if the field is gone
    pub fn set_playing(&self, id: Uuid, playing: bool) -> bool {
        self.with_field_mut(id, |field| field.playing_audio = playing)
            .is_some()
    }

    /// Names of open projects with unsaved changes
    #[must_use]
    pub fn dirty_project_names(&self) -> Vec<String> {
        self.projects
            .read()
            .iter()
            .filter(|p| p.is_dirty())
            .map(|p| p.name.clone())
            .collect()
    }

    /// Clone a project for persistence
    #[must_use]
    pub fn snapshot(&self, name: &str) -> Option<Project> {
        self.with_project(name, Project::clone)
    }

    /// Clear a project's dirty flag after a successful save
    pub fn mark_clean(&self, name: &str) -> bool {
        self.with_project_mut(name, Project::mark_clean).is_some()
    }
}

/// Probe `taken` with `base`, then `base (2)`, `base (3)`, ... until free
fn unique_name(base: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(base) {
        return base.to_string();
    }
    let mut n = 2usize;
    loop {
        let candidate = format!("{base} ({n})");
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}
