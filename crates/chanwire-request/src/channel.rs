use std::fmt;
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::stats::{NullStats, StatSink};

/// Collaborators shared by every request on a connection.
#[derive(Clone)]
pub struct Channel {
    pub clock: Arc<dyn Clock>,
    pub stats: Arc<dyn StatSink>,
}

impl Channel {
    pub fn new(clock: Arc<dyn Clock>, stats: Arc<dyn StatSink>) -> Self {
        Self { clock, stats }
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }
}

impl Default for Channel {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock), Arc::new(NullStats))
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel").field("now", &self.now()).finish()
    }
}
