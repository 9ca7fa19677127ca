use core::fmt::{Debug, Write};
use core::future::Future;

use embassy_time::{Duration, with_timeout};

use crate::config::{PUBLISH_CALL_TIMEOUT_MS, PublishConfig};
use crate::error::SinkError;
use crate::record::{MeasurementRecord, RecordFormat};
use crate::report::Destination;

/// Capacity of one publish payload.
pub const PAYLOAD_CAPACITY: usize = 96;

/// Broker transport. One connect / publish / disconnect per interval.
pub trait PublishClient {
    type Error: Debug;

    fn connect(
        &mut self,
        server: &str,
        client_id: &str,
    ) -> impl Future<Output = Result<(), Self::Error>>;

    fn publish(&mut self, topic: &str, payload: &[u8]) -> impl Future<Output = Result<(), Self::Error>>;

    fn disconnect(&mut self) -> impl Future<Output = Result<(), Self::Error>>;
}

/// Publishes each record as `field1=<v>&field2=<v>...` to the configured
/// channel topic.
pub struct PublishSink<C> {
    client: C,
    config: PublishConfig,
    call_timeout: Duration,
}

impl<C: PublishClient> PublishSink<C> {
    pub fn new(client: C, config: PublishConfig) -> Self {
        Self {
            client,
            config,
            call_timeout: Duration::from_millis(PUBLISH_CALL_TIMEOUT_MS),
        }
    }

    /// Bound each broker call by `timeout` instead of the default.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn payload(record: &MeasurementRecord) -> Result<heapless::String<PAYLOAD_CAPACITY>, SinkError> {
        let mut payload = heapless::String::new();
        for (i, reading) in record.readings().iter().enumerate() {
            if i > 0 {
                payload.push('&').map_err(|_| SinkError::LineOverflow)?;
            }
            write!(payload, "field{}={:.2}", i + 1, reading.value)
                .map_err(|_| SinkError::LineOverflow)?;
        }
        Ok(payload)
    }
}

impl<C: PublishClient> Destination for PublishSink<C> {
    fn name(&self) -> &'static str {
        "publish"
    }

    async fn write_header(&mut self, _format: &RecordFormat) -> Result<(), SinkError> {
        Ok(())
    }

    async fn write_record(
        &mut self,
        _format: &RecordFormat,
        record: &MeasurementRecord,
    ) -> Result<(), SinkError> {
        let payload = Self::payload(record)?;
        let server = self.config.server;

        match with_timeout(
            self.call_timeout,
            self.client.connect(server, self.config.client_id),
        )
        .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                log::error!("Connect to {} failed: {:?}", server, e);
                return Err(SinkError::Connect {
                    destination: "publish",
                });
            }
            Err(_) => {
                log::error!("Connect to {} timed out", server);
                return Err(SinkError::Timeout {
                    destination: "publish",
                });
            }
        }

        let published = with_timeout(
            self.call_timeout,
            self.client.publish(self.config.topic(), payload.as_bytes()),
        )
        .await;

        // Always release the connection, even after a failed publish.
        match with_timeout(self.call_timeout, self.client.disconnect()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::warn!("Disconnect from {} failed: {:?}", server, e),
            Err(_) => log::warn!("Disconnect from {} timed out", server),
        }

        match published {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                log::error!("Publish to {} failed: {:?}", self.config.topic(), e);
                return Err(SinkError::Write {
                    destination: "publish",
                });
            }
            Err(_) => {
                log::error!("Publish to {} timed out", self.config.topic());
                return Err(SinkError::Timeout {
                    destination: "publish",
                });
            }
        }

        log::debug!("Published {} to {}", payload, self.config.topic());
        Ok(())
    }
}
