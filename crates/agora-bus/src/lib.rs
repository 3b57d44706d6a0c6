//! In-process multicast of channel messages to every mounted consumer.
//!
//! The dispatcher only keeps `Weak` references to observers. The strong
//! reference lives in the [`Subscription`] guard handed back to the caller, so
//! a subscription ends when its owner drops it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, trace};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("channel closed")]
    Closed,
    #[error("gave up reconnecting after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
}

pub trait Observer<M>: Send + Sync {
    fn on_next(&self, message: &M);

    fn on_error(&self, _error: &ChannelError) {}

    fn on_complete(&self) {}
}

type Filter<M> = Arc<dyn Fn(&M) -> bool + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

struct Entry<M> {
    id: SubscriptionId,
    filter: Option<Filter<M>>,
    observer: Weak<dyn Observer<M>>,
}

impl<M> Clone for Entry<M> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            filter: self.filter.clone(),
            observer: self.observer.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Terminal {
    Failed(ChannelError),
    Completed,
}

struct Registry<M> {
    entries: Mutex<Vec<Entry<M>>>,
    terminal: Mutex<Option<Terminal>>,
    next_id: AtomicU64,
}

impl<M> Registry<M> {
    fn remove(&self, id: SubscriptionId) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        entries.len() != before
    }

    fn contains(&self, id: SubscriptionId) -> bool {
        self.entries.lock().iter().any(|entry| entry.id == id)
    }

    fn snapshot(&self) -> Vec<Entry<M>> {
        self.entries.lock().clone()
    }
}

/// Fans every published message out to all live subscribers, in registration
/// order, without replay.
pub struct Dispatcher<M> {
    registry: Arc<Registry<M>>,
}

impl<M> Clone for Dispatcher<M> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<M: 'static> Default for Dispatcher<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: 'static> Dispatcher<M> {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Registry {
                entries: Mutex::new(Vec::new()),
                terminal: Mutex::new(None),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn subscribe<O>(&self, observer: Arc<O>) -> Subscription<M>
    where
        O: Observer<M> + 'static,
    {
        self.register(observer, None)
    }

    /// Like [`Dispatcher::subscribe`], but only messages for which `filter`
    /// returns true reach the observer.
    pub fn subscribe_filtered<O, F>(&self, observer: Arc<O>, filter: F) -> Subscription<M>
    where
        O: Observer<M> + 'static,
        F: Fn(&M) -> bool + Send + Sync + 'static,
    {
        self.register(observer, Some(Arc::new(filter)))
    }

    /// Subscribes an observer that forwards every delivery into an unbounded
    /// channel, for consumers that want to `.await` messages.
    pub fn channel(&self) -> (Subscription<M>, mpsc::UnboundedReceiver<Delivery<M>>)
    where
        M: Clone + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self.subscribe(Arc::new(ChannelObserver { tx }));
        (subscription, rx)
    }

    fn register(&self, observer: Arc<dyn Observer<M>>, filter: Option<Filter<M>>) -> Subscription<M> {
        let id = SubscriptionId(self.registry.next_id.fetch_add(1, Ordering::Relaxed));
        let terminal = self.registry.terminal.lock().clone();
        if terminal.is_none() {
            self.registry.entries.lock().push(Entry {
                id,
                filter,
                observer: Arc::downgrade(&observer),
            });
            trace!(target = "agora::bus", subscription = id.0, "subscribed");
        }
        // Late subscribers to a finished stream learn how it ended.
        match terminal {
            Some(Terminal::Failed(error)) => observer.on_error(&error),
            Some(Terminal::Completed) => observer.on_complete(),
            None => {}
        }
        Subscription {
            id,
            observer,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Delivers `message` to every current subscriber and returns how many
    /// observers received it.
    pub fn publish(&self, message: &M) -> usize {
        if self.registry.terminal.lock().is_some() {
            debug!(target = "agora::bus", "publish after stream end ignored");
            return 0;
        }
        let mut delivered = 0;
        for entry in self.registry.snapshot() {
            let Some(observer) = entry.observer.upgrade() else {
                debug!(
                    target = "agora::bus",
                    subscription = entry.id.0,
                    "observer dropped without unsubscribing; pruning leaked entry"
                );
                self.registry.remove(entry.id);
                continue;
            };
            // An earlier callback in this round may have unsubscribed it.
            if !self.registry.contains(entry.id) {
                continue;
            }
            if let Some(filter) = &entry.filter {
                if !filter(message) {
                    continue;
                }
            }
            observer.on_next(message);
            delivered += 1;
        }
        delivered
    }

    /// Ends the stream with an error. Subsequent publishes are ignored.
    pub fn fail(&self, error: &ChannelError) {
        if !self.terminate(Terminal::Failed(error.clone())) {
            return;
        }
        for observer in self.live_observers() {
            observer.on_error(error);
        }
    }

    /// Ends the stream normally. Subsequent publishes are ignored.
    pub fn complete(&self) {
        if !self.terminate(Terminal::Completed) {
            return;
        }
        for observer in self.live_observers() {
            observer.on_complete();
        }
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.registry.remove(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.entries.lock().len()
    }

    pub fn is_terminated(&self) -> bool {
        self.registry.terminal.lock().is_some()
    }

    fn terminate(&self, how: Terminal) -> bool {
        let mut terminal = self.registry.terminal.lock();
        if terminal.is_some() {
            return false;
        }
        *terminal = Some(how);
        true
    }

    fn live_observers(&self) -> Vec<Arc<dyn Observer<M>>> {
        self.registry
            .snapshot()
            .into_iter()
            .filter_map(|entry| entry.observer.upgrade())
            .collect()
    }
}

/// Keeps an observer registered. Dropping it unsubscribes.
pub struct Subscription<M> {
    id: SubscriptionId,
    #[allow(dead_code)]
    observer: Arc<dyn Observer<M>>,
    registry: Weak<Registry<M>>,
}

impl<M> Subscription<M> {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.registry
            .upgrade()
            .map(|registry| registry.contains(self.id))
            .unwrap_or(false)
    }
}

impl<M> std::fmt::Debug for Subscription<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl<M> Drop for Subscription<M> {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            if registry.remove(self.id) {
                trace!(target = "agora::bus", subscription = self.id.0, "unsubscribed");
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Delivery<M> {
    Next(M),
    Error(ChannelError),
    Complete,
}

struct ChannelObserver<M> {
    tx: mpsc::UnboundedSender<Delivery<M>>,
}

impl<M: Clone + Send> Observer<M> for ChannelObserver<M> {
    fn on_next(&self, message: &M) {
        let _ = self.tx.send(Delivery::Next(message.clone()));
    }

    fn on_error(&self, error: &ChannelError) {
        let _ = self.tx.send(Delivery::Error(error.clone()));
    }

    fn on_complete(&self) {
        let _ = self.tx.send(Delivery::Complete);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        label: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Observer<u32> for Recorder {
        fn on_next(&self, message: &u32) {
            self.log.lock().push(format!("{}:{}", self.label, message));
        }

        fn on_error(&self, error: &ChannelError) {
            self.log.lock().push(format!("{}:error:{}", self.label, error));
        }

        fn on_complete(&self) {
            self.log.lock().push(format!("{}:done", self.label));
        }
    }

    fn recorder(label: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Arc<Recorder> {
        Arc::new(Recorder {
            label,
            log: Arc::clone(log),
        })
    }

    #[test]
    fn delivers_in_registration_order() {
        let bus = Dispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let _a = bus.subscribe(recorder("a", &log));
        let _b = bus.subscribe(recorder("b", &log));

        assert_eq!(bus.publish(&1), 2);
        assert_eq!(bus.publish(&2), 2);
        assert_eq!(*log.lock(), vec!["a:1", "b:1", "a:2", "b:2"]);
    }

    #[test]
    fn late_subscriber_sees_no_replay() {
        let bus = Dispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let _a = bus.subscribe(recorder("a", &log));
        bus.publish(&1);
        let _b = bus.subscribe(recorder("b", &log));
        bus.publish(&2);
        assert_eq!(*log.lock(), vec!["a:1", "a:2", "b:2"]);
    }

    #[test]
    fn dropping_subscription_stops_delivery() {
        let bus = Dispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let sub = bus.subscribe(recorder("a", &log));
        assert_eq!(bus.subscriber_count(), 1);
        drop(sub);
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.publish(&1), 0);
        assert!(log.lock().is_empty());
    }

    #[test]
    fn filtered_subscription_skips_non_matching() {
        let bus = Dispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let _even = bus.subscribe_filtered(recorder("even", &log), |n: &u32| n % 2 == 0);
        bus.publish(&1);
        bus.publish(&2);
        assert_eq!(*log.lock(), vec!["even:2"]);
    }

    struct Reentrant {
        bus: Dispatcher<u32>,
        held: Mutex<Vec<Subscription<u32>>>,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Observer<u32> for Reentrant {
        fn on_next(&self, message: &u32) {
            let sub = self.bus.subscribe(recorder("late", &self.log));
            self.held.lock().push(sub);
            self.log.lock().push(format!("outer:{message}"));
        }
    }

    #[test]
    fn subscribing_inside_a_callback_does_not_deadlock() {
        let bus = Dispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let _outer = bus.subscribe(Arc::new(Reentrant {
            bus: bus.clone(),
            held: Mutex::new(Vec::new()),
            log: Arc::clone(&log),
        }));
        bus.publish(&1);
        assert_eq!(*log.lock(), vec!["outer:1"]);
        bus.publish(&2);
        assert_eq!(*log.lock(), vec!["outer:1", "outer:2", "late:2"]);
    }

    #[test]
    fn fail_reaches_everyone_once_and_ends_the_stream() {
        let bus = Dispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let _a = bus.subscribe(recorder("a", &log));
        let err = ChannelError::RetriesExhausted { attempts: 10 };
        bus.fail(&err);
        bus.fail(&err);
        assert_eq!(bus.publish(&5), 0);
        assert!(bus.is_terminated());
        assert_eq!(
            *log.lock(),
            vec!["a:error:gave up reconnecting after 10 attempts"]
        );

        let _late = bus.subscribe(recorder("late", &log));
        assert_eq!(log.lock().last().map(String::as_str), Some("late:error:gave up reconnecting after 10 attempts"));
    }

    #[tokio::test]
    async fn channel_subscription_forwards_deliveries() {
        let bus = Dispatcher::new();
        let (sub, mut rx) = bus.channel();
        bus.publish(&7u32);
        bus.complete();
        assert_eq!(rx.recv().await, Some(Delivery::Next(7)));
        assert_eq!(rx.recv().await, Some(Delivery::Complete));
        assert!(sub.is_active());
        drop(sub);
        assert_eq!(bus.subscriber_count(), 0);
    }
}
