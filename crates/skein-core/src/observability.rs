use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: usize,
    pub dispatched: usize,
    pub completed: usize,
    pub failed: usize,
}

impl QueueStats {
    /// Nothing pending or in flight.
    pub fn is_settled(&self) -> bool {
        self.pending == 0 && self.dispatched == 0
    }
}
