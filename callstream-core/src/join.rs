//! Enrichment of snapshots with the static radio code reference table.
//!
//! The reference file is loaded once at startup and never refreshed. The join is a left outer
//! join on the disposition code: every snapshot row survives, rows without a matching code
//! carry no description.
use std::path::Path;

use indexmap::IndexMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::errorhandling::{ConfigError, ReferenceError};
use crate::snapshot::{format_table, AggregationSnapshot};

/// Column names of a rendered enrichment
pub const ENRICHED_COLUMNS: [&str; 4] = ["original_crime_type_name", "count", "disposition", "description"];

/// A row of the reference table. `disposition_code` is renamed to `disposition` on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RadioCodeEntry {
    /// The radio code
    pub disposition: String,
    /// Human readable meaning of the code
    pub description: String,
}

/// Immutable lookup from disposition code to [RadioCodeEntry]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RadioCodes {
    entries: IndexMap<String, RadioCodeEntry>,
}

impl RadioCodes {
    /// Load the reference file at `path`.
    ///
    /// The file holds either a JSON array of objects or one JSON object per line.
    /// Every object needs a `disposition_code`, the description is taken from `description`
    /// or `disposition_description` and defaults to empty.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let codes = std::fs::read_to_string(path)
            .map_err(ReferenceError::from)
            .and_then(|text| Self::parse(&text))
            .map_err(|source| ConfigError::ReferenceLoadFailed {
                path: path.to_owned(),
                source,
            })?;
        info!(path = %path.display(), codes = codes.len(), "Loaded radio codes");
        Ok(codes)
    }

    /// Parse the contents of a reference file
    pub fn parse(text: &str) -> Result<Self, ReferenceError> {
        let objects = match serde_json::from_str::<Value>(text) {
            Ok(Value::Array(items)) => items,
            Ok(obj @ Value::Object(_)) => vec![obj],
            Ok(_) => return Err(ReferenceError::UnexpectedShape),
            // not a single document, try one object per line
            Err(_) => text
                .lines()
                .enumerate()
                .filter(|(_, line)| !line.trim().is_empty())
                .map(|(i, line)| {
                    serde_json::from_str::<Value>(line)
                        .map_err(|source| ReferenceError::Json { line: i + 1, source })
                })
                .collect::<Result<Vec<_>, _>>()?,
        };

        let mut entries = IndexMap::with_capacity(objects.len());
        for (index, obj) in objects.into_iter().enumerate() {
            let Value::Object(map) = obj else {
                return Err(ReferenceError::UnexpectedShape);
            };
            let code = map
                .get("disposition_code")
                .and_then(json_text)
                .filter(|c| !c.is_empty())
                .ok_or(ReferenceError::MissingCode { index })?;
            let description = map
                .get("description")
                .or_else(|| map.get("disposition_description"))
                .and_then(json_text)
                .unwrap_or_default();
            let entry = RadioCodeEntry {
                disposition: code.clone(),
                description,
            };
            if entries.insert(code.clone(), entry).is_some() {
                warn!(%code, "Duplicate disposition code in reference file, keeping the last");
            }
        }
        Ok(Self { entries })
    }

    /// Entry of a disposition code
    pub fn get(&self, disposition: &str) -> Option<&RadioCodeEntry> {
        self.entries.get(disposition)
    }

    /// Number of distinct codes
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the file held no codes
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<RadioCodeEntry> for RadioCodes {
    fn from_iter<I: IntoIterator<Item = RadioCodeEntry>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|e| (e.disposition.clone(), e))
                .collect(),
        }
    }
}

fn json_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_owned()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// A snapshot row with its reference data attached
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedRow {
    /// Call type
    pub original_crime_type_name: String,
    /// Cumulative count of the call type
    pub count: u64,
    /// Join key, `None` if the call type never had a disposition
    pub disposition: Option<String>,
    /// `None` if the disposition has no entry in the reference table
    pub description: Option<String>,
}

/// Left outer join of `snapshot` with `lookup` on the disposition code.
/// The output has exactly one row per snapshot row, in snapshot order.
pub fn enrich(snapshot: &AggregationSnapshot, lookup: &RadioCodes) -> Vec<EnrichedRow> {
    snapshot
        .rows()
        .iter()
        .map(|row| EnrichedRow {
            original_crime_type_name: row.original_crime_type_name.clone(),
            count: row.count,
            disposition: row.disposition.clone(),
            description: row
                .disposition
                .as_deref()
                .and_then(|d| lookup.get(d))
                .map(|entry| entry.description.clone()),
        })
        .collect()
}

/// Render enriched rows as a console table, absent values print as `null`
pub fn format_enriched(rows: &[EnrichedRow]) -> String {
    let cells = rows
        .iter()
        .map(|r| {
            vec![
                r.original_crime_type_name.clone(),
                r.count.to_string(),
                r.disposition.clone().unwrap_or_else(|| "null".into()),
                r.description.clone().unwrap_or_else(|| "null".into()),
            ]
        })
        .collect_vec();
    format_table(&ENRICHED_COLUMNS, &cells)
}
