//! The free-form textual metadata accompanying every image
//!
//! Metadata is an ordered list of strings whose first entry is always the
//! literal `imagename` and whose second entry is the human-readable image
//! name. The list travels as one text frame with the entries joined by a
//! fixed 7-byte separator.

use crate::error::{Error, Result};

/// The 7-byte separator joining metadata entries on the wire
pub const SEPARATOR: &str = "__QWE__";

/// Required first entry of every metadata list
pub const IMAGE_NAME_KEY: &str = "imagename";

const OPENING: &str = "metadata";
const CLOSING: &str = "endmetadata";

/// Ordered list of metadata strings
///
/// # Examples
///
/// ```
/// use imgtransfer_rust::protocol::metadata::Metadata;
///
/// let mut meta = Metadata::new("nuclei stack");
/// meta.push("channel 2");
/// assert_eq!(meta.image_name(), Some("nuclei stack"));
/// assert_eq!(meta.entries().len(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    entries: Vec<String>,
}

impl Metadata {
    /// Create a metadata list holding the given image name
    pub fn new(image_name: impl Into<String>) -> Self {
        Metadata {
            entries: vec![IMAGE_NAME_KEY.to_string(), image_name.into()],
        }
    }

    /// Wrap an explicit entry list.
    ///
    /// # Errors
    ///
    /// [`Error::Protocol`] unless the first entry is the literal `imagename`.
    pub fn from_entries(entries: Vec<String>) -> Result<Self> {
        match entries.first() {
            Some(key) if key == IMAGE_NAME_KEY => Ok(Metadata { entries }),
            _ => Err(Error::Protocol(format!(
                "metadata must begin with the {IMAGE_NAME_KEY:?} entry"
            ))),
        }
    }

    /// Append an application-defined entry
    pub fn push(&mut self, entry: impl Into<String>) {
        self.entries.push(entry.into());
    }

    /// All entries, `imagename` first
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// The human-readable image name (the second entry)
    pub fn image_name(&self) -> Option<&str> {
        self.entries.get(1).map(String::as_str)
    }

    /// Encode the metadata frame.
    ///
    /// The frame reads `metadata__QWE__<e0>__QWE__…__QWE__endmetadata`.
    pub fn encode(&self) -> String {
        let mut frame = String::from(OPENING);
        for entry in &self.entries {
            frame.push_str(SEPARATOR);
            frame.push_str(entry);
        }
        frame.push_str(SEPARATOR);
        frame.push_str(CLOSING);
        frame
    }

    /// Decode a metadata frame.
    ///
    /// The leading token must equal `metadata` and at least one separator
    /// must be present; the token after the last separator is ignored.
    ///
    /// # Errors
    ///
    /// [`Error::Protocol`] on a wrong leading token, a frame without
    /// separators, or a list not starting with `imagename`.
    pub fn decode(text: &str) -> Result<Self> {
        let mut segments = text.split(SEPARATOR);
        // split always yields at least one segment
        let opening = segments.next().unwrap_or_default();
        if opening != OPENING {
            return Err(Error::Protocol(format!(
                "expected a metadata frame, got leading token {opening:?}"
            )));
        }

        let mut entries: Vec<String> = segments.map(str::to_string).collect();
        if entries.is_empty() {
            return Err(Error::Protocol(
                "metadata frame carries no separators".to_string(),
            ));
        }
        // the trailing token after the last separator is the closing marker
        entries.pop();

        Self::from_entries(entries)
    }
}
