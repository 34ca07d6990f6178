//! Event sinks: where pipeline events are delivered.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use common::events::PipelineEvent;

/// The event consumer went away. Every sink reports this the same way so
/// the pipeline can abandon the run without caring which transport died.
#[derive(Debug, Error)]
#[error("event consumer disconnected")]
pub struct SinkClosed;

#[async_trait]
pub trait EventSink: Send {
    async fn emit(&mut self, event: PipelineEvent) -> Result<(), SinkClosed>;
}

/// Forwards events into a bounded channel, typically drained by an SSE
/// response stream. A full channel applies backpressure; a dropped
/// receiver surfaces as `SinkClosed`.
pub struct ChannelSink {
    tx: mpsc::Sender<PipelineEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<PipelineEvent>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn emit(&mut self, event: PipelineEvent) -> Result<(), SinkClosed> {
        self.tx.send(event).await.map_err(|_| SinkClosed)
    }
}

/// Collects events in memory. `fail_after` simulates a consumer that
/// disconnects after accepting that many events.
#[derive(Default)]
pub struct CollectSink {
    pub events: Vec<PipelineEvent>,
    fail_after: Option<usize>,
}

impl CollectSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_after(accepted: usize) -> Self {
        Self {
            events: Vec::new(),
            fail_after: Some(accepted),
        }
    }
}

#[async_trait]
impl EventSink for CollectSink {
    async fn emit(&mut self, event: PipelineEvent) -> Result<(), SinkClosed> {
        if let Some(limit) = self.fail_after {
            if self.events.len() >= limit {
                return Err(SinkClosed);
            }
        }
        self.events.push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::events::ProgressStage;

    #[tokio::test]
    async fn test_channel_sink_reports_dropped_receiver() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let mut sink = ChannelSink::new(tx);
        let result = sink
            .emit(PipelineEvent::progress(ProgressStage::Scenes, "starting"))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_collect_sink_fails_after_limit() {
        let mut sink = CollectSink::failing_after(1);
        assert!(sink
            .emit(PipelineEvent::progress(ProgressStage::Scenes, "one"))
            .await
            .is_ok());
        assert!(sink
            .emit(PipelineEvent::progress(ProgressStage::Scenes, "two"))
            .await
            .is_err());
        assert_eq!(sink.events.len(), 1);
    }
}
