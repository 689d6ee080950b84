//! Snapshots materialize the complete aggregation state at one point in time, ranked by count.
mod table;
mod triggers;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::aggregate::AggregationEngine;

pub(crate) use table::format_table;
pub use triggers::{IntervalTrigger, NoTrigger, SnapshotTrigger};

/// Column names of a rendered snapshot
pub const SNAPSHOT_COLUMNS: [&str; 2] = ["original_crime_type_name", "count"];

/// One ranked entry of a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRow {
    /// Call type
    pub original_crime_type_name: String,
    /// Cumulative count of the call type
    pub count: u64,
    /// Disposition of the most recent occurrence, used as join key for enrichment
    pub disposition: Option<String>,
}

impl SnapshotRow {
    /// Create a row
    pub fn new(original_crime_type_name: impl Into<String>, count: u64) -> Self {
        Self {
            original_crime_type_name: original_crime_type_name.into(),
            count,
            disposition: None,
        }
    }

    /// Attach the disposition this row is joined by
    pub fn with_disposition(mut self, disposition: impl Into<String>) -> Self {
        self.disposition = Some(disposition.into());
        self
    }
}

/// Complete aggregation state, sorted by count descending and call type ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationSnapshot {
    rows: Vec<SnapshotRow>,
}

impl AggregationSnapshot {
    /// Build a snapshot from rows in any order, establishing the ranking
    pub fn from_rows(rows: impl IntoIterator<Item = SnapshotRow>) -> Self {
        let rows = rows
            .into_iter()
            .sorted_by(|a, b| {
                b.count
                    .cmp(&a.count)
                    .then_with(|| a.original_crime_type_name.cmp(&b.original_crime_type_name))
            })
            .collect();
        Self { rows }
    }

    /// Rows in rank order
    pub fn rows(&self) -> &[SnapshotRow] {
        &self.rows
    }

    /// Number of call types
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True if nothing was counted yet
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// `(call type, count)` pairs in ranked order
    pub fn counts(&self) -> Vec<(&str, u64)> {
        self.rows
            .iter()
            .map(|r| (r.original_crime_type_name.as_str(), r.count))
            .collect()
    }
}

impl IntoIterator for AggregationSnapshot {
    type Item = SnapshotRow;
    type IntoIter = std::vec::IntoIter<SnapshotRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl std::fmt::Display for AggregationSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cells = self
            .rows
            .iter()
            .map(|r| vec![r.original_crime_type_name.clone(), r.count.to_string()])
            .collect_vec();
        f.write_str(&format_table(&SNAPSHOT_COLUMNS, &cells))
    }
}

/// Render the full state of `engine`. Never fails, empty state renders an empty snapshot.
pub fn render(engine: &AggregationEngine) -> AggregationSnapshot {
    AggregationSnapshot::from_rows(engine.windows().map(|(key, window)| SnapshotRow {
        original_crime_type_name: key.clone(),
        count: window.count,
        disposition: Some(window.last_disposition.clone()).filter(|d| !d.is_empty()),
    }))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::dedup::dedupe;
    use crate::testing::call;
    use crate::time::{EventTime, Timestamp};

    #[test]
    fn ranks_by_count_then_key() {
        let snapshot = AggregationSnapshot::from_rows([
            SnapshotRow::new("Theft", 1),
            SnapshotRow::new("Assault", 3),
            SnapshotRow::new("Robbery", 1),
            SnapshotRow::new("Burglary", 3),
        ]);
        assert_eq!(
            snapshot.counts(),
            vec![("Assault", 3), ("Burglary", 3), ("Robbery", 1), ("Theft", 1)]
        );
    }

    #[test]
    fn empty_state_renders_empty() {
        let engine = AggregationEngine::new(Duration::ZERO, None);
        assert!(render(&engine).is_empty());
    }

    #[test]
    fn render_is_deterministic() {
        let mut engine = AggregationEngine::new(Duration::ZERO, None);
        // insertion order differs from ranking order
        let events = [
            call("Theft", "A", ""),
            call("Robbery", "B", ""),
            call("Assault", "C", ""),
            call("Assault", "D", ""),
        ];
        engine.apply(&dedupe(&events), EventTime::MIN);
        let first = render(&engine);
        let second = render(&engine);
        assert_eq!(first, second);
        assert_eq!(first.to_string(), second.to_string());
        assert_eq!(first.counts(), vec![("Assault", 2), ("Robbery", 1), ("Theft", 1)]);
        assert_eq!(first.rows()[0].disposition.as_deref(), Some("D"));
    }

    #[test]
    fn displays_console_table() {
        let snapshot =
            AggregationSnapshot::from_rows([SnapshotRow::new("Theft", 12), SnapshotRow::new("Robbery", 3)]);
        let expected = "\
+------------------------+-----+
|original_crime_type_name|count|
+------------------------+-----+
|                   Theft|   12|
|                 Robbery|    3|
+------------------------+-----+
";
        assert_eq!(snapshot.to_string(), expected);
    }
}
