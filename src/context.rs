//! Deadlines and cancellation for blocking calls.

use crate::error::{BigIpError, Result};
use reqwest::blocking::RequestBuilder;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Deadline and cancellation signal passed to every appliance call.
///
/// The deadline bounds every HTTP attempt by the time remaining. Cancelling
/// the token abandons the attempt in flight and stops any further attempt
/// or chunk.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

/// Fully read response of one attempt
pub(crate) struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl CallContext {
    /// Context without deadline
    pub fn background() -> Self {
        CallContext::default()
    }

    /// Context that expires after `timeout`
    pub fn with_timeout(timeout: Duration) -> Self {
        CallContext::with_deadline(Instant::now() + timeout)
    }

    /// Context that expires at `deadline`
    pub fn with_deadline(deadline: Instant) -> Self {
        CallContext {
            deadline: Some(deadline),
            cancel: CancellationToken::new(),
        }
    }

    /// Use `token` as the cancellation signal, e.g. a child of an
    /// application-wide shutdown token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token cancelling every call that shares this context
    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel every call sharing this context
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the context was cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Time left before the deadline; `None` without a deadline
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Fail if the context is cancelled or its deadline has passed
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(BigIpError::Cancelled);
        }
        match self.remaining() {
            Some(left) if left.is_zero() => Err(BigIpError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Timeout for the next HTTP attempt
    pub(crate) fn attempt_timeout(&self, configured: Duration) -> Duration {
        match self.remaining() {
            Some(left) => left.min(configured),
            None => configured,
        }
    }

    /// Translate a transport failure, reporting deadline expiry and cancellation
    pub(crate) fn classify(&self, err: reqwest::Error) -> BigIpError {
        if self.is_cancelled() {
            BigIpError::Cancelled
        } else if err.is_timeout() && matches!(self.remaining(), Some(left) if left.is_zero()) {
            BigIpError::DeadlineExceeded
        } else {
            BigIpError::Reqwest(err)
        }
    }

    /// Send `request` and read its body on a worker thread while waiting on
    /// the cancellation token.
    ///
    /// A cancelled attempt is abandoned: the worker finishes or times out on
    /// its own and its reply is dropped. Must not be called from inside an
    /// async runtime, like every blocking reqwest call.
    pub(crate) fn dispatch(&self, request: RequestBuilder) -> Result<Reply> {
        self.check()?;

        let waiter = tokio::runtime::Builder::new_current_thread().build()?;
        let (tx, rx) = oneshot::channel();
        std::thread::Builder::new()
            .name("bigip-request".to_string())
            .spawn(move || {
                // The receiver is gone once the call was cancelled
                let _ = tx.send(read_reply(request));
            })?;

        let outcome = waiter.block_on(async {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                reply = rx => Some(reply),
            }
        });

        let result = match outcome {
            None => return Err(BigIpError::Cancelled),
            Some(Ok(result)) => result,
            Some(Err(_)) => {
                return Err(BigIpError::Protocol(
                    "request worker stopped without a reply".to_string(),
                ))
            }
        };
        let reply = result.map_err(|e| self.classify(e))?;
        if self.is_cancelled() {
            return Err(BigIpError::Cancelled);
        }
        Ok(reply)
    }
}

fn read_reply(request: RequestBuilder) -> reqwest::Result<Reply> {
    let response = request.send()?;
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.bytes()?.to_vec();
    Ok(Reply {
        status,
        headers,
        body,
    })
}
