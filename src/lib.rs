//! # pubmed-abstracts
//!
//! PubMed abstract search and export.
//!
//! ## Modules
//!
//! - [`query`] - Search criteria and the query executor
//! - [`database`] - Database trait and record identifiers
//! - [`entrez`] - NCBI E-utilities client
//! - [`record`] - Raw efetch records as element trees
//! - [`flatten`] - Six-column article rows and the sorted result table
//! - [`export`] - CSV/TSV output
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use chrono::NaiveDate;
//! use pubmed_abstracts::entrez::{EntrezClient, EntrezConfig};
//! use pubmed_abstracts::query::{QueryExecutor, SearchCriteria};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let executor = QueryExecutor::new(EntrezClient::new(EntrezConfig::default())?);
//!     let criteria = SearchCriteria::new(
//!         "PFAS exposure",
//!         NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_default(),
//!         NaiveDate::from_ymd_opt(2020, 12, 31).unwrap_or_default(),
//!     )?;
//!     let table = executor.execute(&criteria).await?;
//!     println!("Found {} articles", table.len());
//!     Ok(())
//! }
//! ```

pub mod database;
pub mod entrez;
pub mod error;
pub mod export;
pub mod flatten;
pub mod query;
pub mod record;

pub use error::{PubmedError, Result};
