//! On-disk form of a post: the document tree inside a small envelope naming
//! the format and its revision, so older saves can be recognised on load.

use std::io;

use serde::{Deserialize, Serialize};

use crate::error::ExternalFormatError;
use crate::node::Document;
use crate::schema::validate_document;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    #[serde(default = "StoredDocument::format_name")]
    pub schema: String,
    #[serde(default = "StoredDocument::format_revision")]
    pub version: u32,
    pub document: Document,
}

impl StoredDocument {
    pub const FORMAT: &'static str = "blockdoc";
    /// Newest envelope revision this build reads and writes.
    pub const REVISION: u32 = 1;

    fn format_name() -> String {
        Self::FORMAT.to_string()
    }

    fn format_revision() -> u32 {
        Self::REVISION
    }

    pub fn from_document(document: Document) -> Self {
        Self {
            schema: Self::format_name(),
            version: Self::REVISION,
            document,
        }
    }

    pub fn into_document(self) -> Document {
        self.document
    }

    pub fn write_pretty<W: io::Write>(&self, writer: W) -> Result<(), serde_json::Error> {
        serde_json::to_writer_pretty(writer, self)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        let mut out = Vec::new();
        self.write_pretty(&mut out)?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    /// Reads the envelope without checking the tree.
    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Reads a saved post. Foreign formats, newer revisions and trees that
    /// break the schema are rejected.
    pub fn load(s: &str) -> Result<Document, ExternalFormatError> {
        let stored = Self::from_json_str(s)?;
        if stored.schema != Self::FORMAT || stored.version > Self::REVISION {
            return Err(ExternalFormatError::UnsupportedEnvelope {
                schema: stored.schema,
                version: stored.version,
            });
        }
        validate_document(&stored.document)?;
        Ok(stored.document)
    }
}
