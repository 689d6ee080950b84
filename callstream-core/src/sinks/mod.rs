//! Sinks receive every emitted snapshot.
mod stdout;
mod vec_sink;

pub use stdout::StdOutSink;
pub use vec_sink::VecSink;

use crate::snapshot::AggregationSnapshot;

/// Receives the complete aggregation state on every trigger.
pub trait SnapshotSink: 'static {
    /// Write out one snapshot. `batch_id` is the sequence number of the emission.
    fn emit(&mut self, batch_id: u64, snapshot: &AggregationSnapshot) -> std::io::Result<()>;

    /// Called once when the job stops. Flush buffers and release resources here.
    fn close(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
