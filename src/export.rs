//! Table export.
//!
//! Writes a [`ResultTable`] as delimited text with the fixed header
//! `Title, Abstract, Publication Date, Journal, Authors, DOI`. The header row is
//! always written, so an empty search still produces a valid file.

use crate::error::Result;
use crate::flatten::{ArticleRow, ResultTable, COLUMNS};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// File name suffix shared by every format
const FILE_SUFFIX: &str = "_abstracts";

/// Output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TableFormat {
    /// Comma-separated values
    #[default]
    Csv,
    /// Tab-separated values, opened directly by spreadsheet applications
    Tsv,
}

impl TableFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Tsv => "tsv",
        }
    }

    pub fn delimiter(self) -> u8 {
        match self {
            Self::Csv => b',',
            Self::Tsv => b'\t',
        }
    }
}

/// Output file name: keyword with spaces replaced by underscores, plus `_abstracts.<ext>`.
///
/// Path separators, quotes, characters Windows rejects in file names and control
/// characters are replaced by underscores too, so the name is always a single
/// path component that is also safe inside a quoted `Content-Disposition` filename.
pub fn export_file_name(keyword: &str, format: TableFormat) -> String {
    let stem: String = keyword
        .chars()
        .map(|c| if is_unsafe_in_file_name(c) { '_' } else { c })
        .collect();
    format!("{}{}.{}", stem, FILE_SUFFIX, format.extension())
}

fn is_unsafe_in_file_name(c: char) -> bool {
    matches!(c, ' ' | '/' | '\\' | '"' | ':' | '*' | '?' | '<' | '>' | '|') || c.is_control()
}

/// Write the table to any writer
pub fn write_table<W: Write>(table: &ResultTable, writer: W, format: TableFormat) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .delimiter(format.delimiter())
        .from_writer(writer);

    wtr.write_record(COLUMNS)?;
    for row in table {
        wtr.serialize(row)?;
    }

    wtr.flush()?;
    Ok(())
}

/// Render the table as CSV text, for downloads
pub fn to_csv_string(table: &ResultTable) -> Result<String> {
    let mut buf = Vec::new();
    write_table(table, &mut buf, TableFormat::Csv)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Save the table into `dir` under [`export_file_name`], returning the path written
pub fn save_table(
    table: &ResultTable,
    dir: &Path,
    keyword: &str,
    format: TableFormat,
) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(export_file_name(keyword, format));
    let file = std::fs::File::create(&path)?;
    write_table(table, file, format)?;

    info!(path = %path.display(), rows = table.len(), "Saved table");
    Ok(path)
}

/// Read rows back from exported text
pub fn read_table<R: Read>(reader: R, format: TableFormat) -> Result<Vec<ArticleRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(format.delimiter())
        .from_reader(reader);

    let mut rows = Vec::new();
    for record in rdr.deserialize() {
        rows.push(record?);
    }
    Ok(rows)
}
