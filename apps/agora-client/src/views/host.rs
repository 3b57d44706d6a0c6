use agora_bus::{ChannelError, Delivery, Dispatcher, Subscription, SubscriptionId};
use agora_proto::{Envelope, Outcome, ProtocolError, Request, UserOperation};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{Notice, REDIRECT_KEYS, Reaction, Route, View, ViewContext};
use crate::connection::ConnectionHandle;
use crate::error::ClientError;

/// Mounts views on the shared dispatcher and connection.
#[derive(Clone)]
pub struct ViewHost {
    dispatcher: Dispatcher<Envelope>,
    connection: ConnectionHandle,
    context: ViewContext,
}

impl ViewHost {
    pub fn new(
        dispatcher: Dispatcher<Envelope>,
        connection: ConnectionHandle,
        context: ViewContext,
    ) -> Self {
        Self {
            dispatcher,
            connection,
            context,
        }
    }

    pub fn context(&self) -> &ViewContext {
        &self.context
    }

    /// Subscribes `view` and issues its initial queries.
    pub fn mount<V: View>(&self, view: V) -> MountedView<V> {
        let (subscription, deliveries) = self.dispatcher.channel();
        let mut mounted = MountedView {
            view,
            subscription,
            deliveries,
            connection: self.connection.clone(),
            context: self.context.clone(),
            notices: Vec::new(),
        };
        let requests = mounted.refresh();
        info!(
            target = "agora::views",
            view = mounted.view.name(),
            requests,
            "view mounted"
        );
        mounted
    }
}

/// What one delivery did to a mounted view.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    Updated(UserOperation),
    /// Reconnect signal; the view's queries were reissued.
    Replayed { requests: usize },
    OperationError {
        op: Option<UserOperation>,
        key: String,
    },
    ConnectionLost(ChannelError),
    Ignored,
    Closed,
}

/// A view attached to the channel. Dropping it unsubscribes.
pub struct MountedView<V> {
    view: V,
    subscription: Subscription<Envelope>,
    deliveries: mpsc::UnboundedReceiver<Delivery<Envelope>>,
    connection: ConnectionHandle,
    context: ViewContext,
    notices: Vec<Notice>,
}

impl<V: View> MountedView<V> {
    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn context(&self) -> &ViewContext {
        &self.context
    }

    pub fn subscription_id(&self) -> SubscriptionId {
        self.subscription.id()
    }

    /// Runs a user intent against the view and sends whatever requests it
    /// produced. Returns how many were handed to the channel.
    ///
    /// If the intent fails, or the channel refuses its first request, the
    /// view is restored to its state before the intent ran.
    pub fn act<F>(&mut self, intent: F) -> Result<usize, ClientError>
    where
        V: Clone,
        F: FnOnce(&mut V, &ViewContext) -> Result<Vec<Request>, ProtocolError>,
    {
        let before = self.view.clone();
        let requests = match intent(&mut self.view, &self.context) {
            Ok(requests) => requests,
            Err(err) => {
                self.view = before;
                return Err(err.into());
            }
        };
        let mut sent = 0;
        for request in requests {
            let op = request.op();
            if let Err(err) = self.connection.send(&self.context.authorize(request)) {
                if sent == 0 {
                    self.view = before;
                }
                warn!(
                    target = "agora::views",
                    view = self.view.name(),
                    %op,
                    sent,
                    error = %err,
                    "intent not sent"
                );
                return Err(err);
            }
            sent += 1;
        }
        Ok(sent)
    }

    /// Reissues the view's queries with its current parameters.
    pub fn refresh(&mut self) -> usize {
        let requests = match self.view.replay_requests(&self.context) {
            Ok(requests) => requests,
            Err(err) => {
                warn!(
                    target = "agora::views",
                    view = self.view.name(),
                    error = %err,
                    "could not build view queries"
                );
                return 0;
            }
        };
        self.send_all(requests)
    }

    /// Waits for the next delivery and applies it. `None` once the
    /// dispatcher has gone away.
    pub async fn next(&mut self) -> Option<Applied> {
        let delivery = self.deliveries.recv().await?;
        Some(self.apply(delivery))
    }

    /// Applies everything already delivered without waiting.
    pub fn drain(&mut self) -> Vec<Applied> {
        let mut applied = Vec::new();
        while let Ok(delivery) = self.deliveries.try_recv() {
            applied.push(self.apply(delivery));
        }
        applied
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn unmount(self) -> V {
        info!(
            target = "agora::views",
            view = self.view.name(),
            "view unmounted"
        );
        self.view
    }

    fn apply(&mut self, delivery: Delivery<Envelope>) -> Applied {
        match delivery {
            Delivery::Next(envelope) => self.apply_envelope(&envelope),
            Delivery::Error(error) => {
                warn!(
                    target = "agora::views",
                    view = self.view.name(),
                    error = %error,
                    "channel failed"
                );
                self.notices.push(Notice::ConnectionLost);
                Applied::ConnectionLost(error)
            }
            Delivery::Complete => Applied::Closed,
        }
    }

    fn apply_envelope(&mut self, envelope: &Envelope) -> Applied {
        if envelope.reconnect {
            let requests = self.refresh();
            debug!(
                target = "agora::views",
                view = self.view.name(),
                requests,
                "reissued queries after reconnect"
            );
            if envelope.outcome == Outcome::Empty {
                return Applied::Replayed { requests };
            }
        }

        match (&envelope.outcome, envelope.op) {
            (Outcome::Error(key), op) => self.apply_error(op, key),
            (Outcome::Payload(_), Some(op)) if self.view.handles(op) => {
                match self.view.on_envelope(envelope, &self.context) {
                    Ok(reaction) => {
                        self.react(reaction);
                        Applied::Updated(op)
                    }
                    Err(err) => {
                        warn!(
                            target = "agora::views",
                            view = self.view.name(),
                            %op,
                            error = %err,
                            "dropping envelope the view could not read"
                        );
                        Applied::Ignored
                    }
                }
            }
            _ => Applied::Ignored,
        }
    }

    fn apply_error(&mut self, op: Option<UserOperation>, key: &str) -> Applied {
        if let Some(op) = op {
            if !self.view.handles(op) {
                return Applied::Ignored;
            }
        }
        warn!(
            target = "agora::views",
            view = self.view.name(),
            op = ?op,
            key,
            "server reported an error"
        );
        self.notices.push(Notice::Toast(key.to_string()));
        if REDIRECT_KEYS.contains(&key) {
            self.notices.push(Notice::Redirect(Route::Home));
        }
        let reaction = self.view.on_error(op, key, &self.context);
        self.react(reaction);
        Applied::OperationError {
            op,
            key: key.to_string(),
        }
    }

    fn react(&mut self, reaction: Reaction) {
        self.send_all(reaction.requests);
        self.notices.extend(reaction.notices);
    }

    fn send_all(&self, requests: Vec<Request>) -> usize {
        let mut sent = 0;
        for request in requests {
            let op = request.op();
            match self.connection.send(&self.context.authorize(request)) {
                Ok(_) => sent += 1,
                Err(err) => warn!(
                    target = "agora::views",
                    view = self.view.name(),
                    %op,
                    error = %err,
                    "request not sent"
                ),
            }
        }
        sent
    }
}
