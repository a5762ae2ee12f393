//! Record module - the unit of input work

use std::fmt;

/// Stable identifier of an input record
///
/// Taken verbatim from the configured id column of the input dataset.
///
/// # Examples
///
/// ```
/// use sift_domain::RecordId;
///
/// let id = RecordId::new("call-0042");
/// assert_eq!(id.as_str(), "call-0042");
/// assert_eq!(id.to_string(), "call-0042");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId(String);

impl RecordId {
    /// Create a record id from any string-like value
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the id, returning the inner string
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A block of free text taken from one input column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBlob {
    /// Column the text came from
    pub column: String,

    /// Raw text content
    pub text: String,
}

impl TextBlob {
    /// Create a new text blob
    pub fn new(column: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            text: text.into(),
        }
    }

    /// Whether the blob holds anything besides whitespace
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// An immutable input row
///
/// A record carries every source column (in input order) so the output dataset
/// can reproduce the input verbatim, plus the text blobs selected for analysis.
///
/// # Examples
///
/// ```
/// use sift_domain::{Record, TextBlob};
///
/// let record = Record::new(
///     "7",
///     vec![("id".to_string(), "7".to_string()), ("agent".to_string(), "dana".to_string())],
///     vec![TextBlob::new("transcript", "Customer asked for a refund.")],
/// );
///
/// assert_eq!(record.id().as_str(), "7");
/// assert_eq!(record.field("agent"), Some("dana"));
/// assert!(record.has_text());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    id: RecordId,
    fields: Vec<(String, String)>,
    texts: Vec<TextBlob>,
}

impl Record {
    /// Create a new record
    pub fn new(
        id: impl Into<RecordId>,
        fields: Vec<(String, String)>,
        texts: Vec<TextBlob>,
    ) -> Self {
        Self {
            id: id.into(),
            fields,
            texts,
        }
    }

    /// The record's stable id
    pub fn id(&self) -> &RecordId {
        &self.id
    }

    /// All source columns in input order
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// Look up a source column by name
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value.as_str())
    }

    /// Text blobs selected for analysis
    pub fn texts(&self) -> &[TextBlob] {
        &self.texts
    }

    /// Whether at least one text blob has content
    pub fn has_text(&self) -> bool {
        self.texts.iter().any(|blob| !blob.is_blank())
    }
}
