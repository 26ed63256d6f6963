//! Single-assignment completion shared between a request and its waiters.

use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use bytes::Bytes;
use chanwire_frame::{Headers, Tracing, RESPONSE_OK};

use crate::error::RequestError;

/// A fully reassembled call response.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub id: u32,
    pub code: u8,
    pub headers: Headers,
    pub tracing: Tracing,
    pub args: Vec<Bytes>,
}

impl Response {
    pub fn ok(&self) -> bool {
        self.code == RESPONSE_OK
    }

    pub fn arg(&self, index: usize) -> Option<&Bytes> {
        self.args.get(index)
    }

    pub fn arg1(&self) -> Option<&Bytes> {
        self.arg(0)
    }

    pub fn arg2(&self) -> Option<&Bytes> {
        self.arg(1)
    }

    pub fn arg3(&self) -> Option<&Bytes> {
        self.arg(2)
    }
}

/// How an attempt finished.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Response(Response),
    Error(RequestError),
}

impl Outcome {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub fn response(&self) -> Option<&Response> {
        match self {
            Self::Response(res) => Some(res),
            Self::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&RequestError> {
        match self {
            Self::Error(err) => Some(err),
            Self::Response(_) => None,
        }
    }
}

type Waiter = Box<dyn FnOnce(&Outcome) + Send>;

struct Inner {
    value: OnceLock<Outcome>,
    waiters: Mutex<Vec<Waiter>>,
}

/// Written once, observed by any number of waiters.
///
/// Clones share the same cell. A waiter registered after completion runs
/// immediately with the stored outcome.
#[derive(Clone)]
pub struct Completion {
    inner: Arc<Inner>,
}

impl Default for Completion {
    fn default() -> Self {
        Self::new()
    }
}

impl Completion {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                value: OnceLock::new(),
                waiters: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        self.inner.value.get()
    }

    pub fn is_complete(&self) -> bool {
        self.inner.value.get().is_some()
    }

    pub fn on_complete<F>(&self, waiter: F)
    where
        F: FnOnce(&Outcome) + Send + 'static,
    {
        {
            let mut waiters = self
                .inner
                .waiters
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if self.inner.value.get().is_none() {
                waiters.push(Box::new(waiter));
                return;
            }
        }
        if let Some(outcome) = self.inner.value.get() {
            waiter(outcome);
        }
    }

    /// Store `outcome` and notify waiters. Returns false, leaving the stored
    /// outcome untouched, if the cell was already written.
    pub fn complete(&self, outcome: Outcome) -> bool {
        let waiters = {
            let mut waiters = self
                .inner
                .waiters
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if self.inner.value.set(outcome).is_err() {
                return false;
            }
            std::mem::take(&mut *waiters)
        };
        if let Some(outcome) = self.inner.value.get() {
            for waiter in waiters {
                waiter(outcome);
            }
        }
        true
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("outcome", &self.inner.value.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn response(code: u8) -> Response {
        Response {
            id: 1,
            code,
            headers: Headers::new(),
            tracing: Tracing::default(),
            args: vec![Bytes::from_static(b"a1")],
        }
    }

    #[test]
    fn first_write_wins() {
        let done = Completion::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        done.on_complete(move |outcome| {
            assert!(!outcome.is_error());
            seen.fetch_add(1, Ordering::SeqCst);
        });

        assert!(done.complete(Outcome::Response(response(RESPONSE_OK))));
        assert!(!done.complete(Outcome::Error(RequestError::Drained {
            reason: "late".into()
        })));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(done.outcome().and_then(Outcome::response).is_some());
    }

    #[test]
    fn late_waiter_runs_immediately() {
        let done = Completion::new();
        done.complete(Outcome::Error(RequestError::Frame("boom".into())));
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        done.clone().on_complete(move |outcome| {
            assert!(outcome.error().is_some());
            seen.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn complete_across_threads() {
        let done = Completion::new();
        let calls = Arc::new(AtomicUsize::new(0));
        for _ in 0..4 {
            let seen = Arc::clone(&calls);
            done.on_complete(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            });
        }
        let handles: Vec<_> = (0..8u8)
            .map(|code| {
                let done = done.clone();
                std::thread::spawn(move || done.complete(Outcome::Response(response(code))))
            })
            .collect();
        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(wins, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn response_accessors() {
        let res = response(chanwire_frame::RESPONSE_APP_ERROR);
        assert!(!res.ok());
        assert_eq!(res.arg1().map(|b| b.as_ref()), Some(&b"a1"[..]));
        assert!(res.arg2().is_none());
    }
}
