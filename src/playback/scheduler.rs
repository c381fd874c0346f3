use std::collections::VecDeque;

/// Handle for one requested redraw; stale handles are ignored by the loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RedrawToken(pub u64);

/// The host's "call me at the next redraw opportunity" primitive.
pub trait RedrawScheduler: Send {
    fn request_redraw(&mut self) -> RedrawToken;
    /// Cancelled tokens must never be delivered.
    fn cancel_redraw(&mut self, token: RedrawToken);
}

/// Scheduler the host drains itself: request pushes, cancel removes, `take_pending` delivers.
#[derive(Debug, Default)]
pub struct QueuedScheduler {
    next: u64,
    pending: VecDeque<RedrawToken>,
}

impl QueuedScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Oldest requested redraw that has not been cancelled.
    pub fn take_pending(&mut self) -> Option<RedrawToken> {
        self.pending.pop_front()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

impl RedrawScheduler for QueuedScheduler {
    fn request_redraw(&mut self) -> RedrawToken {
        self.next += 1;
        let token = RedrawToken(self.next);
        self.pending.push_back(token);
        token
    }

    fn cancel_redraw(&mut self, token: RedrawToken) {
        self.pending.retain(|t| *t != token);
    }
}
