//! Record flattening and table assembly.
//!
//! Projects a [`RawRecord`] onto the six-column [`ArticleRow`] and collects rows
//! into a [`ResultTable`] ordered by publication date.
//!
//! Required fields (title, journal, publication date block, author list and
//! author name parts) raise [`PubmedError::MissingField`]. Optional fields
//! (abstract, DOI, the individual date parts) fall back to empty strings, and an
//! author list with no entries gives an empty string.

use crate::error::{OptionExt, Result};
use crate::record::{Element, RawRecord};
use serde::{Deserialize, Serialize};

/// Column headers, in output order
pub const COLUMNS: [&str; 6] = [
    "Title",
    "Abstract",
    "Publication Date",
    "Journal",
    "Authors",
    "DOI",
];

/// One flattened article.
///
/// Serialized field names match [`COLUMNS`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ArticleRow {
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Abstract")]
    pub abstract_text: String,
    /// `"<year> <month> <day>"`, any part possibly empty
    #[serde(rename = "Publication Date")]
    pub publication_date: String,
    #[serde(rename = "Journal")]
    pub journal: String,
    /// `"<LastName> <Initials>"` entries joined by `", "`
    #[serde(rename = "Authors")]
    pub authors: String,
    #[serde(rename = "DOI")]
    pub doi: String,
}

/// Flatten one raw record into a row
pub fn flatten(raw: &RawRecord) -> Result<ArticleRow> {
    let article = raw
        .root()
        .path("MedlineCitation/Article")
        .ok_or_missing("MedlineCitation/Article")?;

    let title = article
        .child("ArticleTitle")
        .ok_or_missing("Article/ArticleTitle")?
        .inner_markup();

    let abstract_text = article
        .path("Abstract/AbstractText")
        .map(Element::inner_markup)
        .unwrap_or_default();

    let journal = article.child("Journal").ok_or_missing("Article/Journal")?;
    let pub_date = journal
        .path("JournalIssue/PubDate")
        .ok_or_missing("Journal/JournalIssue/PubDate")?;
    let publication_date = format_pub_date(pub_date);

    let journal_title = journal
        .child("Title")
        .ok_or_missing("Journal/Title")?
        .text();

    let authors = format_authors(
        article
            .child("AuthorList")
            .ok_or_missing("Article/AuthorList")?,
    )?;

    let doi = article
        .child("ELocationID")
        .map(Element::text)
        .unwrap_or_default();

    Ok(ArticleRow {
        title,
        abstract_text,
        publication_date,
        journal: journal_title,
        authors,
        doi,
    })
}

/// Join Year, Month and Day with single spaces, leaving absent parts empty.
///
/// No padding or month normalization: `2021 Jan 5`, `2021  5`, `2020  `.
fn format_pub_date(pub_date: &Element) -> String {
    let part = |name: &str| pub_date.child(name).map(Element::text).unwrap_or_default();
    format!("{} {} {}", part("Year"), part("Month"), part("Day"))
}

fn format_authors(list: &Element) -> Result<String> {
    let names = list
        .children("Author")
        .map(|author| -> Result<String> {
            let last = author.child("LastName").ok_or_missing("Author/LastName")?;
            let initials = author.child("Initials").ok_or_missing("Author/Initials")?;
            Ok(format!("{} {}", last.text(), initials.text()))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(names.join(", "))
}

/// Rows of one search, sorted by publication date
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ResultTable {
    rows: Vec<ArticleRow>,
}

impl ResultTable {
    /// Sort rows by the publication date string.
    ///
    /// The comparison is plain string order, not calendar order, so
    /// `"2021 10 1"` sorts before `"2021 2 5"` and `"2020 Dec"` before `"2020 Jan"`.
    /// The sort is stable: rows with equal dates keep their fetch order.
    pub fn assemble(mut rows: Vec<ArticleRow>) -> Self {
        rows.sort_by(|a, b| a.publication_date.cmp(&b.publication_date));
        Self { rows }
    }

    pub fn rows(&self) -> &[ArticleRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ArticleRow> {
        self.rows.iter()
    }

    pub fn into_rows(self) -> Vec<ArticleRow> {
        self.rows
    }
}

impl<'a> IntoIterator for &'a ResultTable {
    type Item = &'a ArticleRow;
    type IntoIter = std::slice::Iter<'a, ArticleRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
