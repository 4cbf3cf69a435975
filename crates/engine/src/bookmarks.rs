use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{EngineError, Result};
use crate::looping::{LoopModel, LoopRange};

/// Opaque identifier for saved steps. Never persisted.
pub type BookmarkId = u64;

/// A named loop range ("step") kept for practice.
#[derive(Debug, Clone, PartialEq)]
pub struct Bookmark {
    pub id: BookmarkId,
    pub name: String,
    pub range: LoopRange,
}

/// Exported shape of one step. Identities are assigned again on import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BookmarkRecord {
    pub name: String,
    pub start: f64,
    pub end: f64,
}

impl From<&Bookmark> for BookmarkRecord {
    fn from(value: &Bookmark) -> Self {
        Self {
            name: value.name.clone(),
            start: value.range.start,
            end: value.range.end,
        }
    }
}

/// Ordered collection of steps. Insertion order is display and export order.
#[derive(Debug, Clone, PartialEq)]
pub struct BookmarkStore {
    bookmarks: Vec<Bookmark>,
    next_id: BookmarkId,
    name_prefix: String,
}

impl Default for BookmarkStore {
    fn default() -> Self {
        Self::new("Step")
    }
}

impl BookmarkStore {
    /// Creates an empty store whose new steps are named `"{name_prefix} N"`.
    pub fn new(name_prefix: impl Into<String>) -> Self {
        Self {
            bookmarks: Vec::new(),
            next_id: 1,
            name_prefix: name_prefix.into(),
        }
    }

    /// Appends a step for `range` and returns its identity.
    ///
    /// # Example
    /// ```
    /// use loop_engine::bookmarks::BookmarkStore;
    /// use loop_engine::looping::LoopRange;
    ///
    /// let mut store = BookmarkStore::default();
    /// let id = store.add(LoopRange::new(1.0, 3.0));
    /// assert_eq!(store.get(id).expect("step exists").name, "Step 1");
    /// ```
    pub fn add(&mut self, range: LoopRange) -> BookmarkId {
        let id = self.allocate_id();
        let name = format!("{} {}", self.name_prefix, self.next_name_number());
        debug!(id, %name, start = range.start, end = range.end, "step added");
        self.bookmarks.push(Bookmark { id, name, range });
        id
    }

    pub fn remove(&mut self, id: BookmarkId) -> Result<Bookmark> {
        let index = self.index_of(id)?;
        Ok(self.bookmarks.remove(index))
    }

    pub fn rename(&mut self, id: BookmarkId, name: impl Into<String>) -> Result<()> {
        let index = self.index_of(id)?;
        self.bookmarks[index].name = name.into();
        Ok(())
    }

    pub fn update_range(&mut self, id: BookmarkId, range: LoopRange) -> Result<()> {
        let index = self.index_of(id)?;
        self.bookmarks[index].range = range;
        Ok(())
    }

    pub fn get(&self, id: BookmarkId) -> Option<&Bookmark> {
        self.bookmarks.iter().find(|bookmark| bookmark.id == id)
    }

    pub fn list(&self) -> &[Bookmark] {
        &self.bookmarks
    }

    pub fn len(&self) -> usize {
        self.bookmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bookmarks.is_empty()
    }

    /// Replaces every step with `records`, assigning fresh identities.
    ///
    /// The records are validated as a whole first; on error the store is left
    /// untouched.
    pub fn replace_all(&mut self, records: Vec<BookmarkRecord>) -> Result<()> {
        validate_records(&records)?;

        let mut bookmarks = Vec::with_capacity(records.len());
        for record in records {
            bookmarks.push(Bookmark {
                id: self.allocate_id(),
                name: record.name,
                range: LoopRange::new(record.start, record.end),
            });
        }
        self.bookmarks = bookmarks;
        Ok(())
    }

    pub fn to_records(&self) -> Vec<BookmarkRecord> {
        self.bookmarks.iter().map(BookmarkRecord::from).collect()
    }

    /// Serializes the steps as a JSON array of `{name, start, end}` records.
    pub fn export_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.to_records())
            .map_err(|source| EngineError::BookmarkSerialization { path: None, source })
    }

    /// Writes the exported JSON to `path` and returns how many steps were saved.
    pub fn save_to_path(&self, path: &Path) -> Result<usize> {
        let json = self.export_json()?;
        fs::write(path, json).map_err(|source| EngineError::BookmarkIo {
            context: "write step file",
            path: path.to_path_buf(),
            source,
        })?;

        info!(path = ?path, count = self.bookmarks.len(), "steps exported");
        Ok(self.bookmarks.len())
    }

    fn index_of(&self, id: BookmarkId) -> Result<usize> {
        self.bookmarks
            .iter()
            .position(|bookmark| bookmark.id == id)
            .ok_or(EngineError::BookmarkNotFound { id })
    }

    /// One past both the step count and the highest `"{prefix} N"` in use, so a
    /// generated name never repeats a live one.
    fn next_name_number(&self) -> usize {
        let highest = self
            .bookmarks
            .iter()
            .filter_map(|bookmark| {
                bookmark
                    .name
                    .strip_prefix(self.name_prefix.as_str())?
                    .strip_prefix(' ')?
                    .parse::<usize>()
                    .ok()
            })
            .max()
            .unwrap_or(0);
        highest.max(self.bookmarks.len()) + 1
    }

    fn allocate_id(&mut self) -> BookmarkId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

/// Parses exported step JSON. Any malformed entry rejects the whole input.
///
/// # Example
/// ```
/// use loop_engine::bookmarks::parse_records;
///
/// let records = parse_records(r#"[{"name": "Intro", "start": 2.0, "end": 4.5}]"#)
///     .expect("valid records");
/// assert_eq!(records[0].name, "Intro");
///
/// assert!(parse_records(r#"[{"name": "Intro", "start": 2.0}]"#).is_err());
/// ```
pub fn parse_records(text: &str) -> Result<Vec<BookmarkRecord>> {
    let records: Vec<BookmarkRecord> = serde_json::from_str(text)
        .map_err(|source| EngineError::BookmarkSerialization { path: None, source })?;
    validate_records(&records)?;
    Ok(records)
}

/// Reads and parses a step file written by [`BookmarkStore::save_to_path`].
pub fn load_records_from_path(path: &Path) -> Result<Vec<BookmarkRecord>> {
    let text = fs::read_to_string(path).map_err(|source| EngineError::BookmarkIo {
        context: "read step file",
        path: path.to_path_buf(),
        source,
    })?;

    parse_records(&text).map_err(|error| match error {
        EngineError::BookmarkSerialization { source, .. } => EngineError::BookmarkSerialization {
            path: Some(path.to_path_buf()),
            source,
        },
        other => other,
    })
}

fn validate_records(records: &[BookmarkRecord]) -> Result<()> {
    for (index, record) in records.iter().enumerate() {
        let range = LoopRange::new(record.start, record.end);
        if !range.fits_within(f64::MAX) {
            warn!(
                index,
                name = %record.name,
                start = record.start,
                end = record.end,
                "import rejected: invalid range"
            );
            return Err(EngineError::MalformedImport {
                reason: format!(
                    "step {} ({}) must satisfy 0 <= start < end, got {}..{}",
                    index + 1,
                    record.name,
                    record.start,
                    record.end
                ),
            });
        }
    }
    Ok(())
}

/// Two-way link between the loop and at most one active step.
///
/// While a step is bound, every accepted loop edit is written back into its
/// stored range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BookmarkBinder {
    active: Option<BookmarkId>,
}

impl BookmarkBinder {
    pub fn active(&self) -> Option<BookmarkId> {
        self.active
    }

    /// Loads the step's range into `model`, turns looping on, and binds the step.
    ///
    /// On error the previous binding is kept.
    pub fn activate(
        &mut self,
        id: BookmarkId,
        store: &BookmarkStore,
        model: &mut LoopModel,
    ) -> Result<LoopRange> {
        let bookmark = store.get(id).ok_or(EngineError::BookmarkNotFound { id })?;
        if model.duration().is_none() {
            return Err(EngineError::MediaNotLoaded);
        }
        let range =
            model
                .activate_range(bookmark.range)
                .ok_or(EngineError::InvalidBookmarkRange {
                    id,
                    start: bookmark.range.start,
                    end: bookmark.range.end,
                })?;

        if self.active != Some(id) {
            debug!(previous = ?self.active, id, "binding moved");
        }
        self.active = Some(id);
        Ok(range)
    }

    /// Writes an accepted loop edit into the bound step. Returns whether a step
    /// was updated.
    pub fn mirror(&self, range: LoopRange, store: &mut BookmarkStore) -> Result<bool> {
        let Some(id) = self.active else {
            return Ok(false);
        };
        store.update_range(id, range)?;
        Ok(true)
    }

    pub fn deactivate(&mut self) -> Option<BookmarkId> {
        self.active.take()
    }

    /// Reacts to a removed step. Only removing the bound step unbinds it and
    /// turns looping off; the loop range itself is kept.
    pub fn on_removed(&mut self, id: BookmarkId, model: &mut LoopModel) -> bool {
        if self.active != Some(id) {
            return false;
        }

        self.active = None;
        model.disable_looping();
        true
    }
}
