//! Acknowledged-write flow control.
//!
//! Each channel may have a single acknowledged transfer outstanding. Further
//! commands wait in FIFO order and are released one at a time as the radio
//! reports completion of the previous one.

use bytes::Bytes;
use std::{collections::VecDeque, fmt};
use tracing::debug;

/// Continuation invoked once a queued command completes
///
/// Receives `true` when the radio reported the transfer as completed.
pub type Completion = Box<dyn FnOnce(bool) + Send + 'static>;

/// A queued outbound frame and its optional continuation
pub struct OutboundCommand {
    frame: Bytes,
    completion: Option<Completion>,
}

impl OutboundCommand {
    /// Create a new command
    #[must_use]
    pub fn new(frame: Bytes, completion: Option<Completion>) -> Self {
        Self { frame, completion }
    }

    /// The frame to write
    #[must_use]
    pub const fn frame(&self) -> &Bytes {
        &self.frame
    }
}

impl fmt::Debug for OutboundCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutboundCommand")
            .field("frame", &self.frame)
            .field("completion", &self.completion.is_some())
            .finish()
    }
}

/// Per-channel FIFO of acknowledged writes
#[derive(Debug, Default)]
pub struct FlowControlQueue {
    queue: VecDeque<OutboundCommand>,
}

impl FlowControlQueue {
    /// Create an empty queue
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a command
    ///
    /// Returns the frame to write now when the queue was idle; otherwise the
    /// command waits for the ones ahead of it.
    pub fn enqueue(&mut self, command: OutboundCommand) -> Option<Bytes> {
        self.queue.push_back(command);
        if self.queue.len() == 1 {
            self.queue.front().map(|head| head.frame.clone())
        } else {
            debug!("Queued acknowledged write behind {} pending", self.queue.len() - 1);
            None
        }
    }

    /// Complete the in-flight command
    ///
    /// Invokes the head's continuation with `success` and returns the next
    /// frame to write, if any.
    pub fn on_completion(&mut self, success: bool) -> Option<Bytes> {
        if let Some(head) = self.queue.pop_front() {
            if let Some(completion) = head.completion {
                completion(success);
            }
        }
        self.queue.front().map(|head| head.frame.clone())
    }

    /// Fail every queued command
    ///
    /// Continuations run in FIFO order with `false`. Returns how many commands
    /// were dropped.
    pub fn fail_all(&mut self) -> usize {
        let failed = self.queue.len();
        for command in self.queue.drain(..) {
            if let Some(completion) = command.completion {
                completion(false);
            }
        }
        failed
    }

    /// Number of commands waiting, the in-flight one included
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether nothing is queued
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
