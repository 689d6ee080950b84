use std::io::Write;

use super::SnapshotSink;
use crate::snapshot::AggregationSnapshot;

/// Prints every snapshot as a console table preceded by a batch banner.
pub struct StdOutSink<W = std::io::Stdout> {
    out: W,
}

impl StdOutSink {
    /// Print to the process stdout
    pub fn new() -> Self {
        Self {
            out: std::io::stdout(),
        }
    }
}

impl Default for StdOutSink {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> StdOutSink<W> {
    /// Print into any writer
    pub fn with_writer(out: W) -> Self {
        Self { out }
    }

    /// Give back the writer
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + 'static> SnapshotSink for StdOutSink<W> {
    fn emit(&mut self, batch_id: u64, snapshot: &AggregationSnapshot) -> std::io::Result<()> {
        let rule = "-".repeat(43);
        write!(self.out, "{rule}\nBatch: {batch_id}\n{rule}\n{snapshot}\n")?;
        self.out.flush()
    }

    fn close(&mut self) -> std::io::Result<()> {
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::SnapshotRow;

    #[test]
    fn prints_banner_and_table() {
        let mut sink = StdOutSink::with_writer(Vec::new());
        let snapshot = AggregationSnapshot::from_rows([SnapshotRow::new("Theft", 1)]);
        sink.emit(7, &snapshot).unwrap();
        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert!(out.starts_with("-------------------------------------------\nBatch: 7\n"));
        assert!(out.contains("|                   Theft|    1|\n"));
    }
}
