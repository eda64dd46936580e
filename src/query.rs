//! Search criteria and the query executor.
//!
//! The executor turns a keyword and an inclusive date range into one sorted
//! [`ResultTable`]:
//!
//! 1. search for at most [`MAX_RESULTS`] identifiers
//! 2. fetch each identifier in order, one request at a time
//! 3. flatten each record as it arrives
//! 4. sort the rows by publication date
//!
//! Any failed request or malformed record aborts the whole search.

use crate::database::Database;
use crate::error::{PubmedError, Result};
use crate::flatten::{flatten, ResultTable};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Maximum identifiers requested from a search
pub const MAX_RESULTS: usize = 1000;

/// Keyword and inclusive publication date range for one search
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchCriteria {
    keyword: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
}

impl SearchCriteria {
    /// Validate and build criteria.
    ///
    /// # Errors
    ///
    /// [`PubmedError::Input`] when the keyword is blank or `start_date` is after `end_date`.
    pub fn new(keyword: impl Into<String>, start_date: NaiveDate, end_date: NaiveDate) -> Result<Self> {
        let keyword = keyword.into();
        if keyword.trim().is_empty() {
            return Err(PubmedError::Input("Please enter a keyword".to_string()));
        }
        if start_date > end_date {
            return Err(PubmedError::Input(format!(
                "The start date ({}) must not be after the end date ({})",
                start_date, end_date
            )));
        }
        Ok(Self {
            keyword,
            start_date,
            end_date,
        })
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end_date
    }

    /// PubMed query expression restricting the keyword to title/abstract and the
    /// publication date to the range
    pub fn term(&self) -> String {
        format!(
            "{}[Title/Abstract] AND {}:{}[PDAT]",
            self.keyword,
            self.start_date.format("%Y/%m/%d"),
            self.end_date.format("%Y/%m/%d")
        )
    }
}

/// Runs searches against a [`Database`]
pub struct QueryExecutor<D> {
    database: D,
    max_results: usize,
}

impl<D: Database> QueryExecutor<D> {
    pub fn new(database: D) -> Self {
        Self {
            database,
            max_results: MAX_RESULTS,
        }
    }

    /// Search, fetch every match and return the sorted table
    pub async fn execute(&self, criteria: &SearchCriteria) -> Result<ResultTable> {
        let term = criteria.term();
        info!(term = %term, "Starting PubMed search");

        let mut ids = self.database.search(&term, self.max_results).await?;
        if ids.len() > self.max_results {
            warn!(
                returned = ids.len(),
                cap = self.max_results,
                "Search returned more identifiers than requested, truncating"
            );
            ids.truncate(self.max_results);
        }
        info!(count = ids.len(), "Search complete");

        let mut rows = Vec::with_capacity(ids.len());
        for (idx, id) in ids.iter().enumerate() {
            debug!(pmid = %id, position = idx + 1, total = ids.len(), "Fetching record");
            let raw = self.database.fetch(id).await?;
            let row = flatten(&raw).map_err(|e| {
                warn!(pmid = %id, error = %e, "Record is missing a required field");
                e
            })?;
            rows.push(row);
        }

        let table = ResultTable::assemble(rows);
        info!(rows = table.len(), "Result table assembled");
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::RecordId;
    use crate::record::RawRecord;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory database recording every call it receives
    #[derive(Default)]
    struct MockDatabase {
        ids: Vec<RecordId>,
        records: HashMap<String, String>,
        calls: Mutex<Vec<String>>,
    }

    impl MockDatabase {
        fn with_records(records: &[(&str, &str)]) -> Self {
            Self {
                ids: records.iter().map(|(id, _)| RecordId::from(*id)).collect(),
                records: records
                    .iter()
                    .map(|(id, xml)| (id.to_string(), xml.to_string()))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().expect("lock poisoned").clone()
        }
    }

    #[async_trait]
    impl Database for MockDatabase {
        async fn search(&self, term: &str, max_results: usize) -> Result<Vec<RecordId>> {
            self.calls
                .lock()
                .expect("lock poisoned")
                .push(format!("search {} {}", term, max_results));
            Ok(self.ids.clone())
        }

        async fn fetch(&self, id: &RecordId) -> Result<RawRecord> {
            self.calls
                .lock()
                .expect("lock poisoned")
                .push(format!("fetch {}", id));
            match self.records.get(id.as_str()) {
                Some(xml) => RawRecord::from_efetch_xml(xml),
                None => Err(PubmedError::Api {
                    code: 500,
                    message: format!("no record {}", id),
                }),
            }
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("valid date")
    }

    fn article_xml(title: &str, article_extra: &str, pub_date: &str) -> String {
        format!(
            "<PubmedArticleSet><PubmedArticle><MedlineCitation><Article>\
             <Journal><JournalIssue><PubDate>{}</PubDate></JournalIssue><Title>Env Int</Title></Journal>\
             <ArticleTitle>{}</ArticleTitle>{}\
             <AuthorList><Author><LastName>Lee</LastName><Initials>K</Initials></Author></AuthorList>\
             </Article></MedlineCitation></PubmedArticle></PubmedArticleSet>",
            pub_date, title, article_extra
        )
    }

    #[test]
    fn test_criteria_term() {
        let criteria =
            SearchCriteria::new("PFAS exposure", date("2020-01-01"), date("2020-12-31")).expect("valid");
        assert_eq!(
            criteria.term(),
            "PFAS exposure[Title/Abstract] AND 2020/01/01:2020/12/31[PDAT]"
        );
    }

    #[test]
    fn test_criteria_same_day_is_valid() {
        assert!(SearchCriteria::new("PFAS", date("2020-06-01"), date("2020-06-01")).is_ok());
    }

    #[test]
    fn test_criteria_rejects_bad_input() {
        assert!(matches!(
            SearchCriteria::new("PFAS", date("2021-01-01"), date("2020-01-01")),
            Err(PubmedError::Input(_))
        ));
        assert!(matches!(
            SearchCriteria::new("   ", date("2020-01-01"), date("2020-12-31")),
            Err(PubmedError::Input(_))
        ));
    }

    #[tokio::test]
    async fn test_execute_full_and_partial_records() {
        let a = article_xml(
            "Full record",
            "<Abstract><AbstractText>Abstract A.</AbstractText></Abstract>\
             <ELocationID EIdType=\"doi\">10.1/a</ELocationID>",
            "<Year>2020</Year><Month>Jun</Month><Day>3</Day>",
        );
        let b = article_xml("Sparse record", "", "<Year>2020</Year>");
        let db = MockDatabase::with_records(&[("A", a.as_str()), ("B", b.as_str())]);
        let executor = QueryExecutor::new(db);

        let criteria =
            SearchCriteria::new("PFAS exposure", date("2020-01-01"), date("2020-12-31")).expect("valid");
        let table = executor.execute(&criteria).await.expect("Execute failed");

        assert_eq!(table.len(), 2);
        let sparse = table
            .iter()
            .find(|r| r.title == "Sparse record")
            .expect("row for B");
        assert_eq!(sparse.abstract_text, "");
        assert_eq!(sparse.doi, "");
        assert_eq!(sparse.publication_date, "2020  ");

        // "2020  " < "2020 Jun 3"
        assert_eq!(table.rows()[0].title, "Sparse record");
        assert_eq!(table.rows()[1].doi, "10.1/a");
        assert_eq!(table.rows()[1].authors, "Lee K");

        assert_eq!(
            executor.database.calls(),
            vec![
                "search PFAS exposure[Title/Abstract] AND 2020/01/01:2020/12/31[PDAT] 1000",
                "fetch A",
                "fetch B",
            ]
        );
    }

    #[tokio::test]
    async fn test_execute_no_matches() {
        let executor = QueryExecutor::new(MockDatabase::default());
        let criteria = SearchCriteria::new("zzzz", date("2020-01-01"), date("2020-01-31")).expect("valid");
        let table = executor.execute(&criteria).await.expect("Execute failed");
        assert!(table.is_empty());
        assert_eq!(executor.database.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_execute_fetch_failure_aborts() {
        let a = article_xml("A", "", "<Year>2020</Year>");
        let mut db = MockDatabase::with_records(&[("A", a.as_str())]);
        db.ids.push(RecordId::from("missing"));
        db.ids.push(RecordId::from("A"));
        let executor = QueryExecutor::new(db);

        let criteria = SearchCriteria::new("PFAS", date("2020-01-01"), date("2020-12-31")).expect("valid");
        let result = executor.execute(&criteria).await;
        assert!(matches!(result, Err(PubmedError::Api { code: 500, .. })));
        // nothing after the failing fetch is requested
        assert_eq!(executor.database.calls().last().map(String::as_str), Some("fetch missing"));
        assert_eq!(executor.database.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_execute_missing_required_field_aborts() {
        let broken = "<PubmedArticleSet><PubmedArticle><MedlineCitation><Article>\
             <Journal><JournalIssue><PubDate><Year>2020</Year></PubDate></JournalIssue></Journal>\
             <ArticleTitle>No journal title</ArticleTitle>\
             </Article></MedlineCitation></PubmedArticle></PubmedArticleSet>";
        let executor = QueryExecutor::new(MockDatabase::with_records(&[("X", broken)]));
        let criteria = SearchCriteria::new("PFAS", date("2020-01-01"), date("2020-12-31")).expect("valid");
        assert!(matches!(
            executor.execute(&criteria).await,
            Err(PubmedError::MissingField(_))
        ));
    }

    #[tokio::test]
    async fn test_execute_caps_results() {
        let xml = article_xml("Same", "", "<Year>2020</Year>");
        let mut db = MockDatabase::with_records(&[("1", xml.as_str())]);
        db.ids = vec![RecordId::from("1"); MAX_RESULTS + 5];
        let executor = QueryExecutor::new(db);

        let criteria = SearchCriteria::new("PFAS", date("2020-01-01"), date("2020-12-31")).expect("valid");
        let table = executor.execute(&criteria).await.expect("Execute failed");
        assert_eq!(table.len(), MAX_RESULTS);
    }
}
