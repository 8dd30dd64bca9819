//! The consume loop.
//!
//! ```text
//! ResolvingOffset -> Fetching -> Delivering -> (Idle | Fetching)
//!                       |  ^
//!   offset out of range |  | retriable broker error
//!                       v  |
//!           ResolvingOffset  BackingOff
//! ```
//!
//! The loop owns the cursor, the broker client and the sink. A run positions the cursor
//! once from [`ConsumeSettings::start_from`] and afterwards only moves it forward, except
//! when the broker reports the cursor out of range and it is re-positioned from
//! [`ConsumeSettings::reset_to`].
use std::time::Duration;

use crate::{
    broker_client::PartitionClient,
    error::{ScribeError, ScribeResult},
    messages::{BrokerErrorCode, OffsetSelection, PartitionRef, Record, Recovery},
    sink::DeliverySink,
    utils::shutdown::Shutdown,
};

/// What happens to records that arrive together with a retriable broker error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ErroredBatchPolicy {
    /// Drop them; they are fetched again once the broker recovers.
    #[default]
    Discard,
    /// Deliver them, subject to the usual below-cursor check.
    Deliver,
}

/// Tunables of the consume loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumeSettings {
    /// Where the cursor starts.
    pub start_from: OffsetSelection,
    /// Where the cursor goes after the broker reports it out of range.
    pub reset_to: OffsetSelection,
    /// Upper bound on the data returned by one fetch.
    pub max_bytes: i32,
    /// Pause after a fetch that delivered nothing.
    pub idle_interval: Duration,
    /// Pause after a retriable broker error or a failed offset reset.
    pub error_backoff: Duration,
    /// Handling of records accompanying a retriable broker error.
    pub errored_batch: ErroredBatchPolicy,
}

impl ConsumeSettings {
    /// Default fetch size in bytes.
    pub const DEFAULT_MAX_BYTES: i32 = 100_000;
    /// Default pause after an empty fetch.
    pub const DEFAULT_IDLE_INTERVAL: Duration = Duration::from_secs(1);
    /// Default pause after a retriable error.
    pub const DEFAULT_ERROR_BACKOFF: Duration = Duration::from_secs(1);
}

impl Default for ConsumeSettings {
    fn default() -> Self {
        Self {
            start_from: OffsetSelection::default(),
            reset_to: OffsetSelection::default(),
            max_bytes: Self::DEFAULT_MAX_BYTES,
            idle_interval: Self::DEFAULT_IDLE_INTERVAL,
            error_backoff: Self::DEFAULT_ERROR_BACKOFF,
            errored_batch: ErroredBatchPolicy::default(),
        }
    }
}

/// Where the loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    /// Positioning the cursor, at startup or after an out of range error.
    ResolvingOffset,
    /// Waiting on a fetch.
    Fetching,
    /// Handing records to the sink.
    Delivering,
    /// The last fetch delivered nothing.
    Idle,
    /// The last fetch failed with a retriable broker error.
    BackingOff,
}

/// The result of a single [`Consumer::poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// This many records reached the sink. Zero when the cursor only moved past
    /// control records or offsets removed by compaction.
    Delivered(usize),
    /// Nothing reached the sink and the cursor did not move.
    Idle,
    /// The cursor was out of range and has been re-positioned.
    Reset {
        /// The rejected cursor.
        from: i64,
        /// The cursor after re-resolution.
        to: i64,
    },
    /// The broker reported a retriable error.
    BackOff(BrokerErrorCode),
}

#[derive(Debug, Clone, Copy)]
enum Cursor {
    Unresolved(OffsetSelection),
    At(i64),
}

/// Consumes one partition, handing every record to a [`DeliverySink`].
#[derive(Debug)]
pub struct Consumer<C, S> {
    client: C,
    sink: S,
    partition: PartitionRef,
    settings: ConsumeSettings,
    cursor: Cursor,
    state: ConsumerState,
    repeated_resets: u32,
}

impl<C, S> Consumer<C, S>
where
    C: PartitionClient,
    S: DeliverySink,
{
    /// Creates a consumer. Nothing is sent to the broker until the first poll or run.
    pub fn new(client: C, sink: S, partition: PartitionRef, settings: ConsumeSettings) -> Self {
        Self {
            client,
            sink,
            partition,
            cursor: Cursor::Unresolved(settings.start_from),
            settings,
            state: ConsumerState::ResolvingOffset,
            repeated_resets: 0,
        }
    }

    /// The offset of the next record to fetch, once resolved.
    pub fn offset(&self) -> Option<i64> {
        match self.cursor {
            Cursor::At(offset) => Some(offset),
            Cursor::Unresolved(_) => None,
        }
    }

    /// The current state of the loop.
    pub fn state(&self) -> ConsumerState {
        self.state
    }

    /// The partition being consumed.
    pub fn partition(&self) -> &PartitionRef {
        &self.partition
    }

    /// Hands back the client and the sink.
    pub fn into_parts(self) -> (C, S) {
        (self.client, self.sink)
    }

    /// Resolves the cursor if it is not positioned yet and returns it.
    ///
    /// On failure the cursor stays unresolved and the next call tries again with the
    /// same selection.
    pub async fn position(&mut self) -> ScribeResult<i64> {
        let selection = match self.cursor {
            Cursor::At(offset) => return Ok(offset),
            Cursor::Unresolved(selection) => selection,
        };

        self.state = ConsumerState::ResolvingOffset;

        let offset = match selection {
            OffsetSelection::Explicit(offset) => offset,
            OffsetSelection::Time(selector) => {
                self.client.resolve(&self.partition, selector).await?
            }
        };

        // ListOffsets answers -1 when no record is at or after the requested time.
        if offset < 0 {
            return Err(ScribeError::UnusableOffset {
                partition: self.partition.clone(),
                selection,
                offset,
            });
        }

        tracing::info!(
            "Positioned {} at offset {} ({}).",
            self.partition,
            offset,
            selection
        );

        self.cursor = Cursor::At(offset);
        self.state = ConsumerState::Fetching;

        Ok(offset)
    }

    /// Runs one fetch and handles its result.
    ///
    /// # Errors
    /// Fails on transport errors, sink errors, failed offset resolution and broker errors
    /// that are neither retriable nor an out of range cursor. A failed resolution leaves
    /// the cursor unresolved, so polling again retries it.
    #[tracing::instrument(skip_all, name = "poll", fields(partition = %self.partition))]
    pub async fn poll(&mut self) -> ScribeResult<PollOutcome> {
        let offset = self.position().await?;

        self.state = ConsumerState::Fetching;

        let batch = self
            .client
            .fetch(&self.partition, offset, self.settings.max_bytes)
            .await?;

        match batch.error.map(|code| (code, code.recovery())) {
            None => {
                self.repeated_resets = 0;

                let delivered = self
                    .deliver(offset, batch.records, batch.next_offset)
                    .await?;

                match self.cursor {
                    Cursor::At(cursor) if batch.high_watermark >= 0 => tracing::debug!(
                        "{} records behind high watermark {}.",
                        batch.high_watermark - cursor,
                        batch.high_watermark
                    ),
                    _ => {}
                }

                Ok(self.settle(offset, delivered))
            }
            Some((_, Recovery::ResetOffset)) => {
                tracing::warn!(
                    "Offset {} is out of range, discarding {} records and resetting to {}.",
                    offset,
                    batch.records.len(),
                    self.settings.reset_to
                );

                self.repeated_resets += 1;
                self.cursor = Cursor::Unresolved(self.settings.reset_to);
                let to = self.position().await?;

                Ok(PollOutcome::Reset { from: offset, to })
            }
            Some((code, Recovery::Retry)) => {
                self.repeated_resets = 0;

                tracing::warn!("Fetch at offset {} failed with {}, backing off.", offset, code);

                match self.settings.errored_batch {
                    ErroredBatchPolicy::Deliver => {
                        self.deliver(offset, batch.records, batch.next_offset)
                            .await?;
                    }
                    ErroredBatchPolicy::Discard if !batch.records.is_empty() => {
                        tracing::debug!(
                            "Discarding {} records that came with {}.",
                            batch.records.len(),
                            code
                        );
                    }
                    ErroredBatchPolicy::Discard => {}
                }

                self.state = ConsumerState::BackingOff;

                Ok(PollOutcome::BackOff(code))
            }
            Some((code, Recovery::Fail)) => Err(ScribeError::UnhandledBrokerFault {
                partition: self.partition.clone(),
                code,
                offset,
            }),
        }
    }

    /// Positions the cursor and polls until `shutdown` fires or an error surfaces.
    ///
    /// Sleeps [`ConsumeSettings::idle_interval`] after a poll that neither delivered nor
    /// moved the cursor, and [`ConsumeSettings::error_backoff`] after a retriable broker
    /// error, a failed offset reset, or a reset whose target was rejected again. All
    /// sleeps end early on shutdown.
    ///
    /// # Errors
    /// Fails if the initial positioning fails, and on every error of [`Consumer::poll`]
    /// except a broker refusing an offset reset, which is retried.
    #[tracing::instrument(skip_all, name = "consume", fields(partition = %self.partition))]
    pub async fn run(&mut self, mut shutdown: Shutdown) -> ScribeResult<()> {
        self.position().await?;

        while !shutdown.is_triggered() {
            let pause = match self.poll().await {
                Ok(PollOutcome::Delivered(_)) => None,
                Ok(PollOutcome::Reset { to, .. }) if self.repeated_resets > 1 => {
                    tracing::warn!(
                        "Reset target was rejected again, backing off before fetching at {}.",
                        to
                    );
                    self.state = ConsumerState::BackingOff;
                    Some(self.settings.error_backoff)
                }
                Ok(PollOutcome::Reset { .. }) => None,
                Ok(PollOutcome::Idle) => {
                    tracing::debug!("Nothing to read, sleeping.");
                    Some(self.settings.idle_interval)
                }
                Ok(PollOutcome::BackOff(_)) => Some(self.settings.error_backoff),
                Err(
                    err @ (ScribeError::BrokerUnavailable { .. }
                    | ScribeError::MissingPartition(_)
                    | ScribeError::UnusableOffset { .. }),
                ) if self.state == ConsumerState::ResolvingOffset => {
                    tracing::error!("Failed to reset offset: {}, retrying.", err);
                    self.state = ConsumerState::BackingOff;
                    Some(self.settings.error_backoff)
                }
                Err(err) => return Err(err),
            };

            if let Some(pause) = pause {
                if shutdown.sleep(pause).await {
                    break;
                }
            }
        }

        tracing::info!("Shutting down consumer at offset {:?}.", self.offset());

        Ok(())
    }

    /// Hands records at or after the cursor to the sink, advancing the cursor past each
    /// and finally to `end`, the offset following the fetched log entries.
    async fn deliver(
        &mut self,
        mut cursor: i64,
        records: Vec<Record>,
        end: Option<i64>,
    ) -> ScribeResult<usize> {
        let mut delivered = 0;

        for record in records {
            if record.offset < cursor {
                tracing::debug!(
                    "Found an old offset {}, expecting {}.",
                    record.offset,
                    cursor
                );
                continue;
            }

            cursor = record.next_offset();
            self.cursor = Cursor::At(cursor);

            if record.control {
                continue;
            }

            self.state = ConsumerState::Delivering;
            self.sink.deliver(record).await?;
            delivered += 1;
        }

        if let Some(end) = end.filter(|end| *end > cursor) {
            tracing::debug!("Moving past removed offsets {}..{}.", cursor, end);
            self.cursor = Cursor::At(end);
        }

        Ok(delivered)
    }

    fn settle(&mut self, fetched_at: i64, delivered: usize) -> PollOutcome {
        if delivered == 0 && self.offset() == Some(fetched_at) {
            self.state = ConsumerState::Idle;
            PollOutcome::Idle
        } else {
            self.state = ConsumerState::Fetching;
            PollOutcome::Delivered(delivered)
        }
    }
}
