// Third Party
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

// Local
use crate::{
    informer::{EventInformer, Notification},
    sink::Sink,
};

/// Forwards every notification from the event informer to a `Sink`.
pub struct EventRouter<S> {
    notifications: mpsc::Receiver<Notification>,
    sink: S,
}

impl<S: Sink> EventRouter<S> {
    pub fn new(informer: &mut EventInformer, sink: S) -> Self {
        Self::with_receiver(informer.subscribe(), sink)
    }

    pub fn with_receiver(notifications: mpsc::Receiver<Notification>, sink: S) -> Self {
        Self {
            notifications,
            sink,
        }
    }

    /// Route notifications until `shutdown` is cancelled or the informer goes away.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<(), anyhow::Error> {
        info!("Starting event router...");
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                received = self.notifications.recv() => match received {
                    Some(notification) => {
                        if let Err(e) = self.sink.route(&notification).await {
                            error!("Unable to route {} event: {:#}", notification.verb(), e);
                        }
                    }
                    None => {
                        warn!("Event informer stopped publishing notifications");
                        break;
                    }
                }
            }
        }
        info!("Event router stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    // System
    use std::{
        sync::{Arc, Mutex},
        time::Duration,
    };

    // Third Party
    use async_trait::async_trait;
    use k8s_openapi::api::core::v1::Event;
    use tokio::{sync::mpsc, time::timeout};
    use tokio_util::sync::CancellationToken;

    // Local
    use super::EventRouter;
    use crate::{informer::Notification, sink::Sink};

    #[derive(Clone, Default)]
    struct Recorder {
        verbs: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl Sink for Recorder {
        async fn route(&mut self, notification: &Notification) -> Result<(), anyhow::Error> {
            self.verbs.lock().unwrap().push(notification.verb());
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl Sink for Failing {
        async fn route(&mut self, _notification: &Notification) -> Result<(), anyhow::Error> {
            Err(anyhow::anyhow!("broken pipe"))
        }
    }

    fn added() -> Notification {
        Notification::Added(Arc::new(Event::default()))
    }

    #[tokio::test]
    async fn test_routes_every_notification_in_order() {
        let (sender, receiver) = mpsc::channel(16);
        let recorder = Recorder::default();
        let router = EventRouter::with_receiver(receiver, recorder.clone());

        let event = Arc::new(Event::default());
        sender.send(Notification::Added(event.clone())).await.unwrap();
        sender
            .send(Notification::Updated {
                old: event.clone(),
                new: event.clone(),
            })
            .await
            .unwrap();
        sender.send(Notification::Deleted(event)).await.unwrap();
        drop(sender);

        router.run(CancellationToken::new()).await.unwrap();
        assert_eq!(
            *recorder.verbs.lock().unwrap(),
            vec!["ADDED", "UPDATED", "DELETED"]
        );
    }

    #[tokio::test]
    async fn test_stops_on_shutdown() {
        let (_sender, receiver) = mpsc::channel(16);
        let router = EventRouter::with_receiver(receiver, Recorder::default());
        let shutdown = CancellationToken::new();

        let running = tokio::spawn(router.run(shutdown.clone()));
        shutdown.cancel();
        timeout(Duration::from_secs(5), running)
            .await
            .expect("router ignored the shutdown request")
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_full_buffer_holds_the_producer_back_without_loss() {
        let (sender, receiver) = mpsc::channel(2);
        let recorder = Recorder::default();
        let router = EventRouter::with_receiver(receiver, recorder.clone());

        let producer = tokio::spawn(async move {
            for _ in 0..50 {
                sender.send(added()).await.unwrap();
            }
        });

        router.run(CancellationToken::new()).await.unwrap();
        producer.await.unwrap();
        assert_eq!(recorder.verbs.lock().unwrap().len(), 50);
    }

    #[tokio::test]
    async fn test_sink_errors_do_not_stop_routing() {
        let (sender, receiver) = mpsc::channel(16);
        let router = EventRouter::with_receiver(receiver, Failing);
        sender.send(added()).await.unwrap();
        sender.send(added()).await.unwrap();
        drop(sender);

        router.run(CancellationToken::new()).await.unwrap();
    }
}
