// System
use std::{collections::HashMap, sync::Arc, time::Duration};

// Third Party
use futures::{pin_mut, TryStreamExt};
use k8s_openapi::api::core::v1::Event;
use kube::{
    api::Api,
    runtime::{
        reflector::{self, ObjectRef, Store},
        watcher, WatchStreamExt,
    },
    Client,
};
use tokio::{
    sync::mpsc,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Notifications buffered per subscriber. A full buffer makes the informer wait, nothing is dropped.
pub const NOTIFICATION_BUFFER: usize = 1024;

/// A change to the locally cached set of cluster events.
#[derive(Clone, Debug)]
pub enum Notification {
    Added(Arc<Event>),
    /// Also emitted for every cached event on each resync, with `old` and `new` identical.
    Updated {
        old: Arc<Event>,
        new: Arc<Event>,
    },
    Deleted(Arc<Event>),
}

impl Notification {
    pub fn verb(&self) -> &'static str {
        match self {
            Notification::Added(_) => "ADDED",
            Notification::Updated { .. } => "UPDATED",
            Notification::Deleted(_) => "DELETED",
        }
    }
}

/// Local cache of events that turns raw watch events into `Notification`s.
struct EventCache {
    reader: Store<Event>,
    writer: reflector::store::Writer<Event>,
}

impl EventCache {
    fn new() -> Self {
        let (reader, writer) = reflector::store();
        Self { reader, writer }
    }

    fn apply(&mut self, event: watcher::Event<Event>) -> Vec<Notification> {
        let notifications = match &event {
            watcher::Event::Applied(obj) => {
                let new = Arc::new(obj.clone());
                match self.reader.get(&ObjectRef::from_obj(obj)) {
                    Some(old) => vec![Notification::Updated { old, new }],
                    None => vec![Notification::Added(new)],
                }
            }
            watcher::Event::Deleted(obj) => vec![Notification::Deleted(Arc::new(obj.clone()))],
            watcher::Event::Restarted(objs) => {
                let mut previous: HashMap<ObjectRef<Event>, Arc<Event>> = self
                    .reader
                    .state()
                    .into_iter()
                    .map(|obj| (ObjectRef::from_obj(obj.as_ref()), obj))
                    .collect();
                let mut notifications: Vec<Notification> = objs
                    .iter()
                    .map(|obj| {
                        let new = Arc::new(obj.clone());
                        match previous.remove(&ObjectRef::from_obj(obj)) {
                            Some(old) => Notification::Updated { old, new },
                            None => Notification::Added(new),
                        }
                    })
                    .collect();
                notifications.extend(previous.into_values().map(Notification::Deleted));
                notifications
            }
        };
        self.writer.apply_watcher_event(&event);
        notifications
    }

    fn resync(&self) -> Vec<Notification> {
        self.reader
            .state()
            .into_iter()
            .map(|obj| Notification::Updated {
                old: obj.clone(),
                new: obj,
            })
            .collect()
    }
}

/// Shared informer for `core/v1` events across all namespaces.
///
/// Keeps a reflector store of the cluster's events up to date and delivers every change to each
/// subscriber. Every `resync_interval` the whole cache is re-delivered as updates.
pub struct EventInformer {
    api: Api<Event>,
    resync_interval: Duration,
    cache: EventCache,
    subscribers: Vec<mpsc::Sender<Notification>>,
}

impl EventInformer {
    pub fn new(client: Client, resync_interval: Duration) -> Self {
        Self {
            api: Api::all(client),
            resync_interval,
            cache: EventCache::new(),
            subscribers: Vec::new(),
        }
    }

    /// Subscribe to notifications. Only changes applied after this call are delivered.
    pub fn subscribe(&mut self) -> mpsc::Receiver<Notification> {
        let (sender, receiver) = mpsc::channel(NOTIFICATION_BUFFER);
        self.subscribers.push(sender);
        receiver
    }

    /// Read-only view of the cached events.
    pub fn store(&self) -> Store<Event> {
        self.cache.reader.clone()
    }

    /// Watch events until `shutdown` is cancelled. Returns an error if the watch stream ends.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), anyhow::Error> {
        let EventInformer {
            api,
            resync_interval,
            mut cache,
            mut subscribers,
        } = self;

        let stream = watcher(api, watcher::Config::default()).default_backoff();
        pin_mut!(stream);
        let mut resync = time::interval_at(Instant::now() + resync_interval, resync_interval);
        resync.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Starting shared informer for events...");
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Shared informer for events stopped");
                    return Ok(());
                }
                _ = resync.tick() => {
                    debug!("Resyncing {} cached events", cache.reader.state().len());
                    publish(&mut subscribers, cache.resync(), &shutdown).await;
                }
                event = stream.try_next() => match event {
                    Ok(Some(event)) => publish(&mut subscribers, cache.apply(event), &shutdown).await,
                    Ok(None) => anyhow::bail!("event watch stream ended"),
                    Err(error) => warn!("Event watch failed: {}", error),
                }
            }
        }
    }
}

/// Hands `notifications` to every subscriber in order, waiting while a subscriber's buffer is full.
/// Gives up on the rest once `shutdown` is cancelled. Subscribers that went away are forgotten.
async fn publish(
    subscribers: &mut Vec<mpsc::Sender<Notification>>,
    notifications: Vec<Notification>,
    shutdown: &CancellationToken,
) {
    for notification in notifications {
        for subscriber in subscribers.iter() {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => return,
                // A closed subscriber is pruned below.
                _ = subscriber.send(notification.clone()) => {}
            }
        }
        subscribers.retain(|subscriber| !subscriber.is_closed());
        if subscribers.is_empty() {
            debug!("No subscribers for event notifications");
            return;
        }
    }
}
