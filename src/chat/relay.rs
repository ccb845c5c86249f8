//! Forwarding of a streamed model reply to a caller.
//!
//! The relay waits on whichever comes first: the next chunk or the cancel
//! signal. Once cancellation is observed no further chunk is delivered and the
//! partial text is discarded.

use std::future::Future;

use futures::{Stream, StreamExt};
use tracing::{debug, warn};

use crate::llm::{Message, StreamChunk};
use crate::{AgentError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Idle,
    Streaming,
    Completed,
    Cancelled,
    Errored,
}

/// How a relay ended when it did not error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// The source ended normally; carries the assembled assistant message.
    Completed(Message),
    Cancelled,
}

/// Drives one streamed reply through `Idle -> Streaming -> {Completed, Cancelled, Errored}`.
#[derive(Debug)]
pub struct StreamRelay {
    state: RelayState,
    delivered: usize,
}

impl Default for StreamRelay {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamRelay {
    pub fn new() -> Self {
        Self {
            state: RelayState::Idle,
            delivered: 0,
        }
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    /// Number of chunks handed to the caller.
    pub fn delivered(&self) -> usize {
        self.delivered
    }

    /// Consume `chunks`, handing each one to `on_chunk` in arrival order.
    ///
    /// `on_chunk` resolves to `false` when the receiving side is gone, which is
    /// treated like cancellation. The source stream is dropped before this
    /// returns, whatever the outcome.
    pub async fn run<S, F, Fut, C>(
        &mut self,
        chunks: S,
        mut on_chunk: F,
        cancel: C,
    ) -> Result<RelayOutcome>
    where
        S: Stream<Item = anyhow::Result<StreamChunk>>,
        F: FnMut(StreamChunk) -> Fut,
        Fut: Future<Output = bool>,
        C: Future<Output = ()>,
    {
        if self.state != RelayState::Idle {
            return Err(AgentError::Other(format!(
                "relay already ran (state {:?})",
                self.state
            )));
        }
        self.state = RelayState::Streaming;

        tokio::pin!(chunks);
        tokio::pin!(cancel);
        let mut text = String::new();

        loop {
            let next = tokio::select! {
                biased;
                _ = &mut cancel => return Ok(self.cancel()),
                next = chunks.next() => next,
            };

            match next {
                None => {
                    self.state = RelayState::Completed;
                    debug!(chunks = self.delivered, chars = text.chars().count(), "stream completed");
                    return Ok(RelayOutcome::Completed(Message::assistant(text)));
                }
                Some(Err(e)) => {
                    self.state = RelayState::Errored;
                    warn!(chunks = self.delivered, error = %format!("{:#}", e), "stream failed mid-turn");
                    return Err(AgentError::Stream(format!("{:#}", e)));
                }
                Some(Ok(chunk)) => {
                    text.push_str(&chunk.content);
                    let accepted = tokio::select! {
                        biased;
                        _ = &mut cancel => return Ok(self.cancel()),
                        accepted = on_chunk(chunk) => accepted,
                    };
                    if !accepted {
                        debug!("receiver gone, stopping stream");
                        return Ok(self.cancel());
                    }
                    self.delivered += 1;
                }
            }
        }
    }

    fn cancel(&mut self) -> RelayOutcome {
        self.state = RelayState::Cancelled;
        debug!(chunks = self.delivered, "stream cancelled");
        RelayOutcome::Cancelled
    }
}

/// One-shot form of [`StreamRelay::run`].
pub async fn relay<S, F, Fut, C>(chunks: S, on_chunk: F, cancel: C) -> Result<RelayOutcome>
where
    S: Stream<Item = anyhow::Result<StreamChunk>>,
    F: FnMut(StreamChunk) -> Fut,
    Fut: Future<Output = bool>,
    C: Future<Output = ()>,
{
    StreamRelay::new().run(chunks, on_chunk, cancel).await
}
