//! The bibliographic database seam.
//!
//! The query executor only needs two operations from a database: a capped
//! search returning identifiers, and a fetch of one full record. [`crate::entrez`]
//! implements them against NCBI E-utilities.

use crate::error::Result;
use crate::record::RawRecord;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque record handle returned by a search (a PubMed PMID)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A searchable bibliographic database
#[async_trait]
pub trait Database: Send + Sync {
    /// Run a query expression and return at most `max_results` identifiers,
    /// in the database's own order
    async fn search(&self, term: &str, max_results: usize) -> Result<Vec<RecordId>>;

    /// Fetch the full record for one identifier
    async fn fetch(&self, id: &RecordId) -> Result<RawRecord>;
}
