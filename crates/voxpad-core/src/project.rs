//! Project data model: projects group sections, sections group text fields.
//!
//! A [`Field`] is a single text snippet plus its transient generation/playback
//! status. The field id is assigned at creation and never changes; it is the
//! only handle that stays valid while the surrounding tree is reordered.
//! Every content mutation marks the owning [`Project`] dirty so the
//! persistence gate knows what to flush.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single text snippet with a stable identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Stable unique identifier, assigned at creation
    pub id: Uuid,
    /// Snippet text to be synthesized
    pub content: String,
    /// Whether a generation task for this field is queued or in flight
    #[serde(skip)]
    pub generating: bool,
    /// Whether this field's audio artifact is currently playing
    #[serde(skip)]
    pub playing_audio: bool,
}

impl Field {
    /// Create a new field with a fresh identifier
    #[must_use]
    pub fn new<S: Into<String>>(content: S) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: content.into(),
            generating: false,
            playing_audio: false,
        }
    }
}

/// An ordered, user-reorderable group of fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Section title shown in the UI
    pub title: String,
    /// Fields in user-significant order
    pub fields: Vec<Field>,
}

impl Section {
    /// Create a new empty section
    #[must_use]
    pub fn new<S: Into<String>>(title: S) -> Self {
        Self {
            title: title.into(),
            fields: Vec::new(),
        }
    }
}

/// A named collection of sections with independent dirty tracking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Display name; unique among open projects
    pub name: String,
    /// Free-form project description
    pub description: String,
    /// Sections in user-significant order
    pub sections: Vec<Section>,
    /// Unsaved-changes marker; false right after a successful load or save
    #[serde(skip)]
    pub dirty: bool,
}

impl Project {
    /// Create a new empty project
    ///
    /// A freshly created project has never been persisted, so it starts
    /// dirty.
    #[must_use]
    pub fn new<S: Into<String>, D: Into<String>>(name: S, description: D) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            sections: Vec::new(),
            dirty: true,
        }
    }

    /// Append a new empty section, returning its index
    pub fn add_section<S: Into<String>>(&mut self, title: S) -> usize {
        self.sections.push(Section::new(title));
        self.dirty = true;
        self.sections.len() - 1
    }

    /// Remove a section by index
    pub fn remove_section(&mut self, section: usize) -> Option<Section> {
        if section >= self.sections.len() {
            return None;
        }
        self.dirty = true;
        Some(self.sections.remove(section))
    }

    /// Swap two sections (user reorder)
    pub fn swap_sections(&mut self, a: usize, b: usize) -> bool {
        if a >= self.sections.len() || b >= self.sections.len() {
            return false;
        }
        if a != b {
            self.sections.swap(a, b);
            self.dirty = true;
        }
        true
    }

    /// Append a new field to a section, returning the new field's id
    pub fn add_field<S: Into<String>>(&mut self, section: usize, content: S) -> Option<Uuid> {
        let section = self.sections.get_mut(section)?;
        let field = Field::new(content);
        let id = field.id;
        section.fields.push(field);
        self.dirty = true;
        Some(id)
    }

    /// Remove a field by position
    pub fn remove_field(&mut self, section: usize, field: usize) -> Option<Field> {
        let section = self.sections.get_mut(section)?;
        if field >= section.fields.len() {
            return None;
        }
        self.dirty = true;
        Some(section.fields.remove(field))
    }

    /// Swap two fields within a section (user reorder)
    pub fn swap_fields(&mut self, section: usize, a: usize, b: usize) -> bool {
        let Some(section) = self.sections.get_mut(section) else {
            return false;
        };
        if a >= section.fields.len() || b >= section.fields.len() {
            return false;
        }
        if a != b {
            section.fields.swap(a, b);
            self.dirty = true;
        }
        true
    }

    /// Replace a field's text content
    pub fn set_field_content<S: Into<String>>(
        &mut self,
        section: usize,
        field: usize,
        content: S,
    ) -> bool {
        let Some(field) = self
            .sections
            .get_mut(section)
            .and_then(|s| s.fields.get_mut(field))
        else {
            return false;
        };
        field.content = content.into();
        self.dirty = true;
        true
    }

    /// Replace the project description
    pub fn set_description<S: Into<String>>(&mut self, description: S) {
        self.description = description.into();
        self.dirty = true;
    }

    /// Locate a field by id, returning `(section, field)` indices
    ///
    /// Linear scan over the current shape; the result is only meaningful
    /// until the next structural mutation.
    #[must_use]
    pub fn find(&self, id: Uuid) -> Option<(usize, usize)> {
        self.sections.iter().enumerate().find_map(|(si, section)| {
            section
                .fields
                .iter()
                .position(|field| field.id == id)
                .map(|fi| (si, fi))
        })
    }

    /// Borrow a field by id
    #[must_use]
    pub fn field(&self, id: Uuid) -> Option<&Field> {
        let (si, fi) = self.find(id)?;
        self.sections.get(si)?.fields.get(fi)
    }

    /// Mutably borrow a field by id
    ///
    /// Does not touch the dirty flag; status-flag updates are not content
    /// mutations. Use [`Project::set_field_content`] for edits.
    #[must_use]
    pub fn field_mut(&mut self, id: Uuid) -> Option<&mut Field> {
        let (si, fi) = self.find(id)?;
        self.sections.get_mut(si)?.fields.get_mut(fi)
    }

    /// Total number of fields across all sections
    #[must_use]
    pub fn field_count(&self) -> usize {
        self.sections.iter().map(|s| s.fields.len()).sum()
    }

    /// Check whether the project has unsaved changes
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Mark the project as having unsaved changes
    pub fn touch(&mut self) {
        self.dirty = true;
    }

    /// Clear the dirty flag after a successful save or load
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }
}
