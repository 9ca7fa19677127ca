use embedded_io_async::Write;

use crate::error::SinkError;
use crate::record::{MeasurementRecord, RecordFormat};
use crate::report::Destination;

/// Newline-terminated text lines over a UART.
pub struct SerialSink<W> {
    port: W,
}

impl<W: Write> SerialSink<W> {
    pub fn new(port: W) -> Self {
        Self { port }
    }

    pub fn into_inner(self) -> W {
        self.port
    }

    async fn write_line(&mut self, line: &str) -> Result<(), SinkError> {
        self.port
            .write_all(line.as_bytes())
            .await
            .map_err(|e| {
                log::error!("Serial write failed: {:?}", e);
                SinkError::Write {
                    destination: "serial",
                }
            })?;
        self.port.write_all(b"\n").await.map_err(|e| {
            log::error!("Serial write failed: {:?}", e);
            SinkError::Write {
                destination: "serial",
            }
        })?;
        self.port.flush().await.map_err(|e| {
            log::error!("Serial flush failed: {:?}", e);
            SinkError::Write {
                destination: "serial",
            }
        })
    }
}

impl<W: Write> Destination for SerialSink<W> {
    fn name(&self) -> &'static str {
        "serial"
    }

    async fn write_header(&mut self, format: &RecordFormat) -> Result<(), SinkError> {
        self.write_line(format.header).await
    }

    async fn write_record(
        &mut self,
        format: &RecordFormat,
        record: &MeasurementRecord,
    ) -> Result<(), SinkError> {
        let line = record.to_line(format)?;
        self.write_line(&line).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Quantity;
    use embassy_futures::block_on;
    use embedded_io::{ErrorKind, ErrorType};

    struct Port {
        bytes: std::vec::Vec<u8>,
        broken: bool,
    }

    impl ErrorType for Port {
        type Error = ErrorKind;
    }

    impl Write for Port {
        async fn write(&mut self, buf: &[u8]) -> Result<usize, ErrorKind> {
            if self.broken {
                return Err(ErrorKind::BrokenPipe);
            }
            self.bytes.extend_from_slice(buf);
            Ok(buf.len())
        }

        async fn flush(&mut self) -> Result<(), ErrorKind> {
            Ok(())
        }
    }

    const FORMAT: RecordFormat = RecordFormat {
        header: "Time, Elapsed(s), TMP36(F), SHT31D(F)",
        separator: ", ",
    };

    #[test]
    fn test_header_then_lines() {
        let mut sink = SerialSink::new(Port {
            bytes: std::vec::Vec::new(),
            broken: false,
        });
        let record = MeasurementRecord::new(20)
            .with(Quantity::Fahrenheit, 70.0)
            .with(Quantity::Fahrenheit, 71.5);

        block_on(sink.write_header(&FORMAT)).unwrap();
        block_on(sink.write_record(&FORMAT, &record)).unwrap();

        let text = std::string::String::from_utf8(sink.into_inner().bytes).unwrap();
        assert_eq!(
            text,
            "Time, Elapsed(s), TMP36(F), SHT31D(F)\n20, 70.00, 71.50\n"
        );
    }

    #[test]
    fn test_write_error_reported() {
        let mut sink = SerialSink::new(Port {
            bytes: std::vec::Vec::new(),
            broken: true,
        });
        assert_eq!(
            block_on(sink.write_header(&FORMAT)),
            Err(SinkError::Write {
                destination: "serial"
            })
        );
    }
}
