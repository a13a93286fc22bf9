//! Pull-based frame feeds.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;

use siren_models::{Frame, SourceId};

pub type FeedResult<T> = Result<T, FeedError>;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Feed disconnected: {0}")]
    Disconnected(String),

    #[error("Frame read failed: {0}")]
    ReadFailed(String),

    #[error("Reconnect failed: {0}")]
    ConnectFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FeedError {
    pub fn disconnected(msg: impl Into<String>) -> Self {
        Self::Disconnected(msg.into())
    }

    pub fn read_failed(msg: impl Into<String>) -> Self {
        Self::ReadFailed(msg.into())
    }

    pub fn connect_failed(msg: impl Into<String>) -> Self {
        Self::ConnectFailed(msg.into())
    }
}

/// Frame feed for one source.
///
/// `next_frame` waits for the next frame. `Ok(None)` means end of stream;
/// both end of stream and errors make the worker back off and reconnect.
#[async_trait]
pub trait FrameSource: Send {
    async fn next_frame(&mut self) -> FeedResult<Option<Frame>>;

    async fn reconnect(&mut self) -> FeedResult<()>;
}

/// One step of a scripted feed.
#[derive(Debug, Clone)]
pub enum FeedStep {
    Frame(Vec<u8>),
    Fail(String),
    End,
    /// Wait before the next step
    Pause(Duration),
}

/// Feed replaying a fixed script. Parks forever once the script is done.
pub struct ScriptedFeed {
    source_id: SourceId,
    steps: VecDeque<FeedStep>,
    sequence: u64,
    reconnect_failures: u32,
    reconnects: u32,
}

impl ScriptedFeed {
    pub fn new(source_id: impl Into<SourceId>) -> Self {
        Self {
            source_id: source_id.into(),
            steps: VecDeque::new(),
            sequence: 0,
            reconnect_failures: 0,
            reconnects: 0,
        }
    }

    pub fn frame(mut self, data: Vec<u8>) -> Self {
        self.steps.push_back(FeedStep::Frame(data));
        self
    }

    /// `count` empty frames.
    pub fn frames(mut self, count: usize) -> Self {
        for _ in 0..count {
            self.steps.push_back(FeedStep::Frame(Vec::new()));
        }
        self
    }

    pub fn fail(mut self, msg: impl Into<String>) -> Self {
        self.steps.push_back(FeedStep::Fail(msg.into()));
        self
    }

    pub fn end(mut self) -> Self {
        self.steps.push_back(FeedStep::End);
        self
    }

    pub fn pause(mut self, duration: Duration) -> Self {
        self.steps.push_back(FeedStep::Pause(duration));
        self
    }

    /// Make the next `count` reconnect attempts fail.
    pub fn failing_reconnects(mut self, count: u32) -> Self {
        self.reconnect_failures = count;
        self
    }

    pub fn reconnects(&self) -> u32 {
        self.reconnects
    }
}

#[async_trait]
impl FrameSource for ScriptedFeed {
    async fn next_frame(&mut self) -> FeedResult<Option<Frame>> {
        loop {
            match self.steps.pop_front() {
                Some(FeedStep::Pause(duration)) => tokio::time::sleep(duration).await,
                Some(FeedStep::Frame(data)) => {
                    let frame = Frame::new(self.source_id.clone(), self.sequence, Utc::now(), data);
                    self.sequence += 1;
                    return Ok(Some(frame));
                }
                Some(FeedStep::Fail(msg)) => return Err(FeedError::read_failed(msg)),
                Some(FeedStep::End) => return Ok(None),
                None => std::future::pending::<()>().await,
            }
        }
    }

    async fn reconnect(&mut self) -> FeedResult<()> {
        self.reconnects += 1;
        if self.reconnect_failures > 0 {
            self.reconnect_failures -= 1;
            return Err(FeedError::connect_failed("scripted reconnect failure"));
        }
        Ok(())
    }
}
