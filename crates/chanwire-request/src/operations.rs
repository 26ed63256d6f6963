//! Pending outbound requests of one connection.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::fmt;

use tracing::{debug, warn};

use chanwire_frame::{Frame, FrameBody, LazyFrame};

use crate::channel::Channel;
use crate::error::RequestError;
use crate::options::RequestOptions;
use crate::out_request::OutRequest;

type Task = Box<dyn FnOnce()>;

/// Work deferred to the next scheduling tick.
#[derive(Default)]
pub struct TickQueue {
    tasks: VecDeque<Task>,
}

impl TickQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn defer<F>(&mut self, task: F)
    where
        F: FnOnce() + 'static,
    {
        self.tasks.push_back(Box::new(task));
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Run the tasks queued before this call, in order. Returns how many ran.
    pub fn run(&mut self) -> usize {
        let batch = std::mem::take(&mut self.tasks);
        let count = batch.len();
        for task in batch {
            task();
        }
        count
    }
}

impl fmt::Debug for TickQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TickQueue")
            .field("pending", &self.tasks.len())
            .finish()
    }
}

/// What happened to an incoming frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The frame finished the request with this id.
    Completed(u32),
    /// More response frames are expected.
    Pending(u32),
    /// No pending request has this id.
    Unknown(u32),
    /// Not a response frame.
    Ignored,
}

/// Table of in-flight requests keyed by frame id.
pub struct Operations {
    requests: HashMap<u32, OutRequest>,
    next_id: u32,
    channel: Channel,
    ticks: TickQueue,
    draining: Option<String>,
    last_timeout_time: Option<u64>,
}

impl Operations {
    pub fn new(channel: Channel) -> Self {
        Self {
            requests: HashMap::new(),
            next_id: 1,
            channel,
            ticks: TickQueue::new(),
            draining: None,
            last_timeout_time: None,
        }
    }

    /// Allocate an id. 0 is reserved for connection-level frames.
    pub fn next_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1).max(1);
        id
    }

    /// Create and track a request for `options`.
    pub fn request(&mut self, options: RequestOptions) -> &mut OutRequest {
        let id = self.next_id();
        let req = OutRequest::new(id, options, self.channel.clone());
        self.add(req)
    }

    /// Track `req`. A draining table marks it drained first.
    pub fn add(&mut self, mut req: OutRequest) -> &mut OutRequest {
        if let Some(reason) = &self.draining {
            req.drain(reason.clone());
        }
        match self.requests.entry(req.id()) {
            Entry::Occupied(mut entry) => {
                warn!(id = req.id(), "replacing pending request with the same id");
                entry.insert(req);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(req),
        }
    }

    pub fn get(&self, id: u32) -> Option<&OutRequest> {
        self.requests.get(&id)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut OutRequest> {
        self.requests.get_mut(&id)
    }

    pub fn pop(&mut self, id: u32) -> Option<OutRequest> {
        self.requests.remove(&id)
    }

    pub fn pending_len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Route a received response or error frame to its request.
    pub fn handle_frame(&mut self, frame: &Frame) -> Delivery {
        let id = frame.id;
        match &frame.body {
            FrameBody::CallResponse(_) | FrameBody::CallResponseCont(_) => {
                let Some(req) = self.requests.get_mut(&id) else {
                    return self.unknown(frame);
                };
                let result = req.on_response_frame(&frame.body);
                match result {
                    Ok(None) => Delivery::Pending(id),
                    Ok(Some(res)) => {
                        if let Some(mut req) = self.pop(id) {
                            req.emit_response(res);
                        }
                        Delivery::Completed(id)
                    }
                    Err(err) => {
                        if let Some(mut req) = self.pop(id) {
                            req.emit_error(err);
                        }
                        Delivery::Completed(id)
                    }
                }
            }
            FrameBody::ErrorResponse(body) => {
                let Some(mut req) = self.pop(id) else {
                    return self.unknown(frame);
                };
                req.emit_error(RequestError::ErrorFrame {
                    code: body.code,
                    message: body.message.clone(),
                });
                Delivery::Completed(id)
            }
            _ => Delivery::Ignored,
        }
    }

    /// Decode a received lazy frame and route it.
    pub fn handle_lazy<B: AsRef<[u8]>>(
        &mut self,
        frame: &LazyFrame<B>,
    ) -> chanwire_frame::Result<Delivery> {
        Ok(self.handle_frame(&frame.to_frame()?))
    }

    /// Expire requests whose deadline has passed.
    ///
    /// Expired requests leave the table now. Those with no response yet get
    /// a timeout error delivered by the next [`Operations::run_ticks`];
    /// those whose response was already streaming are dropped without one.
    /// Returns how many requests were expired.
    pub fn check_timeouts(&mut self) -> usize {
        let now = self.channel.now();
        let mut due: Vec<u32> = self
            .requests
            .values()
            .filter(|req| req.deadline().is_some_and(|deadline| deadline <= now))
            .map(OutRequest::id)
            .collect();
        due.sort_unstable();

        let mut expired = 0;
        for id in due {
            let Some(req) = self.requests.get_mut(&id) else {
                continue;
            };
            self.last_timeout_time = Some(now);
            let timeout = req.on_timeout(now);
            let Some(mut req) = self.requests.remove(&id) else {
                continue;
            };
            expired += 1;
            match timeout {
                Some(err) => {
                    debug!(id, error = %err, "request timed out");
                    self.ticks.defer(move || {
                        req.emit_error(err);
                    });
                }
                None => debug!(id, "dropped stalled response stream past its deadline"),
            }
        }
        expired
    }

    /// Run deferred work queued so far.
    pub fn run_ticks(&mut self) -> usize {
        self.ticks.run()
    }

    pub fn ticks_pending(&self) -> usize {
        self.ticks.len()
    }

    /// Mark every request added from now on as drained.
    pub fn drain(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        debug!(reason = %reason, pending = self.requests.len(), "draining outbound requests");
        self.draining = Some(reason);
    }

    pub fn is_draining(&self) -> bool {
        self.draining.is_some()
    }

    pub fn drain_reason(&self) -> Option<&str> {
        self.draining.as_deref()
    }

    pub fn last_timeout_time(&self) -> Option<u64> {
        self.last_timeout_time
    }

    fn unknown(&self, frame: &Frame) -> Delivery {
        warn!(
            id = frame.id,
            frame_type = %frame.frame_type(),
            "response for unknown request"
        );
        Delivery::Unknown(frame.id)
    }
}

impl fmt::Debug for Operations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operations")
            .field("pending", &self.requests.len())
            .field("next_id", &self.next_id)
            .field("ticks", &self.ticks)
            .field("draining", &self.draining)
            .finish()
    }
}
