use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::Record;

/// `<digits><optional dot><whitespace><label>`
static NUMBERED_ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\d+\.?\s+(.+)$").expect("valid regex"));

/// Parse a numbered list ("1. Alice", "2 Bob") into its labels.
///
/// Lines without a leading index are ignored. Order and duplicates are kept;
/// labels that are blank after trimming are skipped.
pub fn parse_numbered_list(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| NUMBERED_ITEM_RE.captures(line))
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|label| !label.is_empty())
        .map(str::to_string)
        .collect()
}

/// How strictly a markdown table is reduced to records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TablePolicy {
    /// Drop rows whose cell count differs from the header; a repeated header
    /// name keeps the last cell.
    #[default]
    Lenient,
    /// Reject the table on any ragged row, repeated header name, or missing
    /// expected column.
    Strict,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error("Row {row} has {found} cells, header has {expected}")]
    Ragged {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Header repeats column {0:?}")]
    DuplicateColumn(String),

    #[error("Header is missing columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
}

/// A markdown pipe table before rows are matched against the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Locate the pipe-delimited lines in `text`.
    ///
    /// The first such line is the header, the second is taken as the
    /// separator and skipped without inspection, the rest are body rows.
    /// Returns `None` when fewer than two such lines exist.
    pub fn parse(text: &str) -> Option<Self> {
        let lines: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|l| l.starts_with('|'))
            .collect();

        if lines.len() < 2 {
            return None;
        }

        Some(Self {
            header: split_row(lines[0]),
            rows: lines[2..].iter().map(|l| split_row(l)).collect(),
        })
    }

    /// Zip every body row with the header.
    pub fn into_records(self, policy: TablePolicy) -> Result<Vec<Record>, TableError> {
        if policy == TablePolicy::Strict {
            let mut seen = HashSet::new();
            if let Some(dup) = self.header.iter().find(|h| !seen.insert(h.as_str())) {
                return Err(TableError::DuplicateColumn(dup.clone()));
            }
        }

        let width = self.header.len();
        let mut records = Vec::with_capacity(self.rows.len());

        for (index, cells) in self.rows.into_iter().enumerate() {
            if cells.len() != width {
                if policy == TablePolicy::Strict {
                    return Err(TableError::Ragged {
                        row: index + 1,
                        expected: width,
                        found: cells.len(),
                    });
                }
                tracing::debug!(
                    row = index + 1,
                    expected = width,
                    found = cells.len(),
                    "Dropping table row with mismatched cell count"
                );
                continue;
            }

            records.push(self.header.iter().cloned().zip(cells).collect());
        }

        Ok(records)
    }

    /// Columns of `expected` that the header lacks.
    pub fn missing_columns(&self, expected: &[&str]) -> Vec<String> {
        expected
            .iter()
            .filter(|col| !self.header.iter().any(|h| h == *col))
            .map(|col| col.to_string())
            .collect()
    }
}

/// Split one trimmed table line into trimmed cells, ignoring a single
/// leading and trailing pipe.
fn split_row(line: &str) -> Vec<String> {
    let inner = line.strip_prefix('|').unwrap_or(line);
    let inner = inner.strip_suffix('|').unwrap_or(inner);
    inner.split('|').map(|c| c.trim().to_string()).collect()
}

/// Parse the markdown table in a model reply into records.
///
/// A reply without a table yields an empty sequence. Under the strict policy,
/// a table that does not carry every `expected` column is rejected; pass an
/// empty slice to skip the schema check.
pub fn parse_markdown_table(
    text: &str,
    policy: TablePolicy,
    expected: &[&str],
) -> Result<Vec<Record>, TableError> {
    let Some(table) = RawTable::parse(text) else {
        return Ok(Vec::new());
    };

    if policy == TablePolicy::Strict {
        let missing = table.missing_columns(expected);
        if !missing.is_empty() {
            return Err(TableError::MissingColumns(missing));
        }
    }

    table.into_records(policy)
}
