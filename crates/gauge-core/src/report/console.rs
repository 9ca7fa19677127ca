use crate::error::SinkError;
use crate::record::{MeasurementRecord, RecordFormat};
use crate::report::Destination;

/// Writes header and data lines through the `log` facade under the
/// `console` target, so whatever logger the board installs carries them.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl Destination for ConsoleSink {
    fn name(&self) -> &'static str {
        "console"
    }

    async fn write_header(&mut self, format: &RecordFormat) -> Result<(), SinkError> {
        log::info!(target: "console", "{}", format.header);
        Ok(())
    }

    async fn write_record(
        &mut self,
        format: &RecordFormat,
        record: &MeasurementRecord,
    ) -> Result<(), SinkError> {
        let line = record.to_line(format)?;
        log::info!(target: "console", "{}", line);
        Ok(())
    }
}
