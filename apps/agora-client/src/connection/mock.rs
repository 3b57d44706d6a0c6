//! In-memory connector for tests and offline demos. Every accepted connection
//! attempt hands the server end of the link to a [`MockServer`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use agora_proto::{Envelope, Request, UserOperation};
use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::warn;

use super::{ChannelLink, Connector};
use crate::error::ClientError;

struct Inner {
    refusals: AtomicU32,
    attempts: AtomicU32,
    accepted: mpsc::UnboundedSender<MockPeer>,
}

#[derive(Clone)]
pub struct MockConnector {
    inner: Arc<Inner>,
}

impl MockConnector {
    pub fn new() -> (Self, MockServer) {
        let (accepted, rx) = mpsc::unbounded_channel();
        let connector = Self {
            inner: Arc::new(Inner {
                refusals: AtomicU32::new(0),
                attempts: AtomicU32::new(0),
                accepted,
            }),
        };
        (connector, MockServer { accepted: rx })
    }

    /// Makes the next `count` connection attempts fail.
    pub fn refuse_next(&self, count: u32) {
        self.inner.refusals.store(count, Ordering::SeqCst);
    }

    /// Number of connection attempts made so far, refused ones included.
    pub fn attempts(&self) -> u32 {
        self.inner.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self) -> Result<ChannelLink, ClientError> {
        let attempt = self.inner.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let refused = self
            .inner
            .refusals
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(ClientError::Transport(format!(
                "mock refused connection attempt {attempt}"
            )));
        }

        let (outbound, requests) = mpsc::unbounded_channel();
        let (frames, inbound) = mpsc::unbounded_channel();
        self.inner
            .accepted
            .send(MockPeer { requests, frames })
            .map_err(|_| ClientError::Transport("mock server dropped".into()))?;
        Ok(ChannelLink { outbound, inbound })
    }
}

pub struct MockServer {
    accepted: mpsc::UnboundedReceiver<MockPeer>,
}

impl MockServer {
    pub async fn accept(&mut self) -> Option<MockPeer> {
        self.accepted.recv().await
    }

    pub fn try_accept(&mut self) -> Option<MockPeer> {
        self.accepted.try_recv().ok()
    }
}

/// Server end of one mock link. Dropping it (or calling
/// [`MockPeer::disconnect`]) looks like the socket closing.
pub struct MockPeer {
    requests: mpsc::UnboundedReceiver<String>,
    frames: mpsc::UnboundedSender<String>,
}

impl MockPeer {
    pub async fn recv_request(&mut self) -> Option<Request> {
        loop {
            let text = self.requests.recv().await?;
            match Request::decode(&text) {
                Ok(request) => return Some(request),
                Err(err) => warn!(target = "agora::mock", error = %err, "undecodable request"),
            }
        }
    }

    pub fn try_recv_request(&mut self) -> Option<Request> {
        while let Ok(text) = self.requests.try_recv() {
            if let Ok(request) = Request::decode(&text) {
                return Some(request);
            }
        }
        None
    }

    pub fn push(&self, envelope: &Envelope) -> bool {
        match envelope.encode() {
            Ok(text) => self.push_raw(text),
            Err(_) => false,
        }
    }

    /// Sends a success envelope for `op` carrying `payload`.
    pub fn respond<T: Serialize>(&self, op: UserOperation, payload: &T) -> bool {
        match Envelope::success(op, payload) {
            Ok(envelope) => self.push(&envelope),
            Err(_) => false,
        }
    }

    pub fn push_raw(&self, text: impl Into<String>) -> bool {
        self.frames.send(text.into()).is_ok()
    }

    pub fn disconnect(self) {}
}
