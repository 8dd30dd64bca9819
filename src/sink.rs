//! Delivery sinks: where consumed records end up.
use std::{fmt::Debug, io::Write};

use tokio::sync::mpsc;

use crate::{error::ScribeResult, messages::Record};

/// Receives every consumed record, in offset order.
#[async_trait::async_trait]
pub trait DeliverySink
where
    Self: Send + Debug,
{
    /// Takes ownership of one record.
    ///
    /// # Errors
    /// An error stops the consume loop.
    async fn deliver(&mut self, record: Record) -> ScribeResult<()>;
}

/// Writes one line per record: the offset, then the payload decoded as lossy UTF-8.
#[derive(Debug)]
pub struct ConsoleSink<W> {
    writer: W,
}

impl ConsoleSink<std::io::Stdout> {
    /// A sink printing to standard output.
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W> ConsoleSink<W>
where
    W: Write + Send + Debug,
{
    /// A sink writing to `writer`.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Returns the wrapped writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait::async_trait]
impl<W> DeliverySink for ConsoleSink<W>
where
    W: Write + Send + Debug,
{
    async fn deliver(&mut self, record: Record) -> ScribeResult<()> {
        writeln!(
            self.writer,
            "{}: {}",
            record.offset,
            String::from_utf8_lossy(&record.payload)
        )?;
        self.writer.flush()?;

        Ok(())
    }
}

/// Forwards records into a tokio channel, waiting for capacity when it is full.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<Record>,
}

impl ChannelSink {
    /// A sink sending into `tx`.
    pub fn new(tx: mpsc::Sender<Record>) -> Self {
        Self { tx }
    }
}

#[async_trait::async_trait]
impl DeliverySink for ChannelSink {
    async fn deliver(&mut self, record: Record) -> ScribeResult<()> {
        self.tx.send(record).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScribeError;

    #[tokio::test]
    async fn test_console_sink_writes_offset_and_payload() {
        let mut sink = ConsoleSink::new(Vec::new());

        sink.deliver(Record::new(41, "hello")).await.expect("");
        sink.deliver(Record::new(42, vec![0x77, 0xff, 0x77]))
            .await
            .expect("");

        let written = String::from_utf8(sink.into_inner()).expect("");

        assert_eq!(written, "41: hello\n42: w\u{fffd}w\n");
    }

    #[tokio::test]
    async fn test_channel_sink_forwards_in_order() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut sink = ChannelSink::new(tx);

        sink.deliver(Record::new(1, "one")).await.expect("");
        sink.deliver(Record::new(2, "two")).await.expect("");

        assert_eq!(rx.recv().await.expect("").offset, 1);
        assert_eq!(rx.recv().await.expect("").offset, 2);
    }

    #[tokio::test]
    async fn test_channel_sink_fails_once_receiver_is_gone() {
        let (tx, rx) = mpsc::channel(1);
        let mut sink = ChannelSink::new(tx);
        drop(rx);

        let result = sink.deliver(Record::new(1, "one")).await;

        assert!(matches!(result, Err(ScribeError::SinkClosed(_))));
    }
}
