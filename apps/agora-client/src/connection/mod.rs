//! The single shared channel to the agora server.
//!
//! A [`Connection`] owns a driver task that opens links through a
//! [`Connector`], decodes inbound frames into envelopes, publishes them on the
//! [`Dispatcher`] and reconnects according to its [`ReconnectPolicy`].
//! Callers only ever touch the cloneable [`ConnectionHandle`].

use std::collections::VecDeque;
use std::sync::Arc;

use agora_bus::{ChannelError, Dispatcher};
use agora_proto::{Envelope, OperationKind, Request};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{Notify, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, trace, warn};

use crate::error::ClientError;

pub mod mock;
pub mod reconnect;
pub mod websocket;

use reconnect::ReconnectPolicy;

/// Text frame pipes for one live link. `inbound` closing means the link
/// dropped.
pub struct ChannelLink {
    pub outbound: mpsc::UnboundedSender<String>,
    pub inbound: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self) -> Result<ChannelLink, ClientError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    Failed,
}

/// What `send` does while no link is up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfflinePolicy {
    /// Buffer up to `limit` frames and flush them, oldest first, on the next
    /// successful connect. The oldest frame is dropped on overflow.
    Queue { limit: usize },
    /// Fail with `NotConnected`. The next connect publishes the reconnect
    /// signal so mounted views reissue their queries.
    Reject,
}

impl Default for OfflinePolicy {
    fn default() -> Self {
        OfflinePolicy::Queue { limit: 64 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    Sent,
    Queued,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectionOptions {
    pub reconnect: ReconnectPolicy,
    pub offline: OfflinePolicy,
}

struct Queued {
    text: String,
    query: bool,
}

#[derive(Default)]
struct Outbox {
    live: Option<mpsc::UnboundedSender<String>>,
    queued: VecDeque<Queued>,
    /// A frame was rejected or dropped since the last connect.
    lost: bool,
}

struct Shared {
    state: watch::Sender<ConnectionState>,
    outbox: Mutex<Outbox>,
    offline: OfflinePolicy,
    shutdown: Notify,
}

impl Shared {
    fn set_state(&self, next: ConnectionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(
                target = "agora::connection",
                from = ?previous,
                to = ?next,
                "connection state changed"
            );
        }
    }

    fn current(&self) -> ConnectionState {
        *self.state.borrow()
    }
}

#[derive(Clone)]
pub struct ConnectionHandle {
    shared: Arc<Shared>,
}

impl ConnectionHandle {
    /// Fire-and-forget send. The response, if any, arrives later through the
    /// dispatcher.
    ///
    /// A query queued while offline is discarded when the next connect
    /// publishes the reconnect signal, since mounted views reissue their
    /// queries on that signal.
    pub fn send(&self, request: &Request) -> Result<SendStatus, ClientError> {
        let text = request.encode()?;
        let query = request.op().kind() == OperationKind::Query;
        let status = self.enqueue(text, query)?;
        trace!(
            target = "agora::connection",
            op = %request.op(),
            ?status,
            "request handed to channel"
        );
        Ok(status)
    }

    pub fn send_frame(&self, text: String) -> Result<SendStatus, ClientError> {
        self.enqueue(text, false)
    }

    fn enqueue(&self, text: String, query: bool) -> Result<SendStatus, ClientError> {
        let mut outbox = self.shared.outbox.lock();
        if self.shared.current() == ConnectionState::Failed {
            return Err(ClientError::ConnectionFailed);
        }
        let text = match &outbox.live {
            Some(live) => match live.send(text) {
                Ok(()) => return Ok(SendStatus::Sent),
                Err(mpsc::error::SendError(text)) => text,
            },
            None => text,
        };
        match self.shared.offline {
            OfflinePolicy::Reject | OfflinePolicy::Queue { limit: 0 } => {
                outbox.lost = true;
                Err(ClientError::NotConnected)
            }
            OfflinePolicy::Queue { limit } => {
                if outbox.queued.len() >= limit {
                    outbox.queued.pop_front();
                    outbox.lost = true;
                    warn!(
                        target = "agora::connection",
                        limit, "send queue full; dropped the oldest frame"
                    );
                }
                outbox.queued.push_back(Queued { text, query });
                Ok(SendStatus::Queued)
            }
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.current()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Resolves once the state satisfies `predicate`, returning that state.
    pub async fn wait_for<F>(&self, mut predicate: F) -> ConnectionState
    where
        F: FnMut(&ConnectionState) -> bool,
    {
        let mut rx = self.shared.state.subscribe();
        let result = rx.wait_for(|state| predicate(state)).await.map(|state| *state);
        // The sender lives in `shared`, which `self` keeps alive.
        result.unwrap_or(ConnectionState::Disconnected)
    }

    pub fn queued_len(&self) -> usize {
        self.shared.outbox.lock().queued.len()
    }

    /// Asks the driver to close the channel. Use [`Connection::shutdown`] to
    /// also wait for it.
    pub fn shutdown(&self) {
        self.shared.shutdown.notify_one();
    }
}

pub struct Connection {
    handle: ConnectionHandle,
    driver: JoinHandle<()>,
}

impl Connection {
    pub fn spawn<C: Connector>(
        connector: C,
        dispatcher: Dispatcher<Envelope>,
        options: ConnectionOptions,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let shared = Arc::new(Shared {
            state,
            outbox: Mutex::new(Outbox::default()),
            offline: options.offline,
            shutdown: Notify::new(),
        });
        let driver = Driver {
            connector,
            dispatcher,
            policy: options.reconnect,
            shared: Arc::clone(&shared),
        };
        let driver = tokio::spawn(driver.run());
        Self {
            handle: ConnectionHandle { shared },
            driver,
        }
    }

    pub fn handle(&self) -> ConnectionHandle {
        self.handle.clone()
    }

    pub async fn shutdown(self) {
        self.handle.shutdown();
        if let Err(err) = self.driver.await {
            warn!(target = "agora::connection", error = %err, "connection driver panicked");
        }
    }
}

enum PumpExit {
    Shutdown,
    Dropped,
}

struct Driver<C> {
    connector: C,
    dispatcher: Dispatcher<Envelope>,
    policy: ReconnectPolicy,
    shared: Arc<Shared>,
}

impl<C: Connector> Driver<C> {
    async fn run(self) {
        let mut was_connected = false;
        loop {
            let Some(link) = self.establish(was_connected).await else {
                return;
            };
            let reconnected = was_connected;
            was_connected = true;
            match self.pump(link, reconnected).await {
                PumpExit::Shutdown => {
                    self.finish();
                    return;
                }
                PumpExit::Dropped => {
                    warn!(
                        target = "agora::connection",
                        "channel closed unexpectedly; reconnecting"
                    );
                }
            }
        }
    }

    /// Returns `None` when the driver should stop, either because of a
    /// shutdown request or because the retry budget ran out.
    async fn establish(&self, was_connected: bool) -> Option<ChannelLink> {
        if !was_connected {
            self.shared.set_state(ConnectionState::Connecting);
            match self.connect_or_shutdown().await? {
                Ok(link) => {
                    info!(target = "agora::connection", "channel connected");
                    return Some(link);
                }
                Err(err) => {
                    warn!(target = "agora::connection", error = %err, "initial connect failed");
                }
            }
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            let Some(delay) = self.policy.delay_for(attempt) else {
                self.give_up(attempt - 1);
                return None;
            };
            self.shared
                .set_state(ConnectionState::Reconnecting { attempt });
            tokio::select! {
                _ = sleep(delay) => {}
                _ = self.shared.shutdown.notified() => {
                    self.finish();
                    return None;
                }
            }
            match self.connect_or_shutdown().await? {
                Ok(link) => {
                    info!(target = "agora::connection", attempt, "channel reconnected");
                    return Some(link);
                }
                Err(err) => {
                    warn!(
                        target = "agora::connection",
                        attempt,
                        error = %err,
                        "reconnect attempt failed"
                    );
                }
            }
        }
    }

    async fn connect_or_shutdown(&self) -> Option<Result<ChannelLink, ClientError>> {
        tokio::select! {
            result = self.connector.connect() => Some(result),
            _ = self.shared.shutdown.notified() => {
                self.finish();
                None
            }
        }
    }

    async fn pump(&self, link: ChannelLink, reconnected: bool) -> PumpExit {
        let ChannelLink {
            outbound,
            mut inbound,
        } = link;
        // A frame lost while offline makes even the first connect replay.
        let replay = {
            let mut outbox = self.shared.outbox.lock();
            let lost = std::mem::take(&mut outbox.lost);
            let replay = reconnected || lost;
            let mut flushed = 0usize;
            let mut superseded = 0usize;
            while let Some(frame) = outbox.queued.pop_front() {
                if replay && frame.query {
                    superseded += 1;
                    continue;
                }
                if let Err(mpsc::error::SendError(text)) = outbound.send(frame.text) {
                    outbox.queued.push_front(Queued { text, query: frame.query });
                    break;
                }
                flushed += 1;
            }
            outbox.live = Some(outbound);
            self.shared.set_state(ConnectionState::Connected);
            if flushed > 0 || superseded > 0 {
                debug!(
                    target = "agora::connection",
                    flushed, superseded, "flushed queued frames"
                );
            }
            replay
        };

        if replay {
            let subscribers = self.dispatcher.publish(&Envelope::reconnect_signal());
            debug!(
                target = "agora::connection",
                subscribers, "published reconnect signal"
            );
        }

        loop {
            tokio::select! {
                biased;
                _ = self.shared.shutdown.notified() => return PumpExit::Shutdown,
                frame = inbound.recv() => match frame {
                    Some(text) => self.deliver(&text),
                    None => {
                        self.shared.outbox.lock().live = None;
                        return PumpExit::Dropped;
                    }
                },
            }
        }
    }

    fn deliver(&self, text: &str) {
        match Envelope::decode(text) {
            Ok(envelope) => {
                let delivered = self.dispatcher.publish(&envelope);
                trace!(
                    target = "agora::connection",
                    op = ?envelope.op,
                    delivered,
                    "envelope dispatched"
                );
            }
            Err(err) => {
                warn!(
                    target = "agora::connection",
                    error = %err,
                    frame_len = text.len(),
                    "dropping malformed frame"
                );
            }
        }
    }

    fn give_up(&self, attempts: u32) {
        error!(
            target = "agora::connection",
            attempts, "exhausted reconnect attempts; channel failed"
        );
        let dropped = {
            let mut outbox = self.shared.outbox.lock();
            self.shared.set_state(ConnectionState::Failed);
            outbox.live = None;
            let dropped = outbox.queued.len();
            outbox.queued.clear();
            dropped
        };
        if dropped > 0 {
            warn!(target = "agora::connection", dropped, "discarded queued frames");
        }
        self.dispatcher
            .fail(&ChannelError::RetriesExhausted { attempts });
    }

    fn finish(&self) {
        {
            let mut outbox = self.shared.outbox.lock();
            outbox.live = None;
            outbox.queued.clear();
            self.shared.set_state(ConnectionState::Disconnected);
        }
        self.dispatcher.complete();
        info!(target = "agora::connection", "connection shut down");
    }
}
