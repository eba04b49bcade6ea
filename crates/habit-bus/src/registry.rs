use std::collections::HashMap;

use tokio::sync::{broadcast, RwLock};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use uuid::Uuid;

use crate::event::BusEvent;

/// An item yielded by a subscription stream: either a real event, or a
/// notice that the subscriber fell behind and `n` events were dropped.
/// Mirrors the bus's documented "no persistence, lagged subscribers skip
/// forward" contract.
#[derive(Debug, Clone)]
pub enum BusStreamItem {
    Event(BusEvent),
    Lagged(u64),
}

/// Per-user broadcast registry. Each user gets a `broadcast::Sender`
/// created lazily on first subscribe; publishing to a user with no
/// channel yet is a silent no-op (nobody is listening).
pub struct EventBus {
    channels: RwLock<HashMap<Uuid, broadcast::Sender<BusEvent>>>,
    queue_depth: usize,
}

impl EventBus {
    pub fn new(queue_depth: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            queue_depth,
        }
    }

    /// Fan out `event` to every live connection for `user_id`. Returns the
    /// number of connections it was delivered to (0 if the user has none).
    pub async fn publish(&self, user_id: Uuid, event: BusEvent) -> usize {
        let channels = self.channels.read().await;
        let Some(sender) = channels.get(&user_id) else {
            return 0;
        };
        match sender.send(event) {
            Ok(receivers) => receivers,
            Err(_) => 0,
        }
    }

    /// Subscribe to `user_id`'s topic. The returned stream immediately
    /// yields `BusEvent::Connected` before any fanned-out event, per the
    /// "adding a subscriber sends a connected event immediately" contract.
    pub async fn subscribe(&self, user_id: Uuid) -> impl futures::Stream<Item = BusStreamItem> + Send + 'static {
        let sender = self.sender_for(user_id).await;
        let rx = sender.subscribe();

        let connected = futures::stream::once(async { BusStreamItem::Event(BusEvent::Connected) });
        let forwarded = BroadcastStream::new(rx).filter_map(|item| match item {
            Ok(event) => Some(BusStreamItem::Event(event)),
            Err(BroadcastStreamRecvError::Lagged(n)) => Some(BusStreamItem::Lagged(n)),
        });

        connected.chain(forwarded)
    }

    /// Drop the channel for `user_id` if nobody is listening anymore.
    /// `broadcast::Sender` never cleans itself up, so the registry prunes
    /// opportunistically rather than growing forever across user churn.
    pub async fn prune_if_idle(&self, user_id: Uuid) {
        let channels = self.channels.read().await;
        let idle = channels.get(&user_id).is_some_and(|s| s.receiver_count() == 0);
        drop(channels);
        if idle {
            self.channels.write().await.remove(&user_id);
        }
    }

    async fn sender_for(&self, user_id: Uuid) -> broadcast::Sender<BusEvent> {
        {
            let channels = self.channels.read().await;
            if let Some(sender) = channels.get(&user_id) {
                return sender.clone();
            }
        }
        let mut channels = self.channels.write().await;
        channels
            .entry(user_id)
            .or_insert_with(|| broadcast::channel(self.queue_depth).0)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use habit_core::TrackingState;

    use super::*;

    #[tokio::test]
    async fn publish_with_no_subscriber_is_noop() {
        let bus = EventBus::new(16);
        let delivered = bus.publish(Uuid::new_v4(), BusEvent::TelegramConnected).await;
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn subscribe_yields_connected_first() {
        let bus = EventBus::new(16);
        let user_id = Uuid::new_v4();
        let mut stream = Box::pin(bus.subscribe(user_id).await);
        let first = stream.next().await.unwrap();
        assert!(matches!(first, BusStreamItem::Event(BusEvent::Connected)));
    }

    #[tokio::test]
    async fn publish_fans_out_to_all_subscribers() {
        let bus = EventBus::new(16);
        let user_id = Uuid::new_v4();
        let mut s1 = Box::pin(bus.subscribe(user_id).await);
        let mut s2 = Box::pin(bus.subscribe(user_id).await);
        s1.next().await;
        s2.next().await;

        let tracking_id = Uuid::new_v4();
        let delivered = bus
            .publish(
                user_id,
                BusEvent::TrackingStateChanged {
                    tracking_id,
                    state: TrackingState::Paused,
                },
            )
            .await;
        assert_eq!(delivered, 2);

        let e1 = s1.next().await.unwrap();
        let e2 = s2.next().await.unwrap();
        assert!(matches!(e1, BusStreamItem::Event(BusEvent::TrackingStateChanged { .. })));
        assert!(matches!(e2, BusStreamItem::Event(BusEvent::TrackingStateChanged { .. })));
    }

    #[tokio::test]
    async fn events_for_different_users_do_not_cross() {
        let bus = EventBus::new(16);
        let user_a = Uuid::new_v4();
        let user_b = Uuid::new_v4();
        let mut stream_a = Box::pin(bus.subscribe(user_a).await);
        stream_a.next().await;

        let delivered = bus.publish(user_b, BusEvent::TelegramConnected).await;
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn lagging_subscriber_gets_lagged_notice() {
        let bus = EventBus::new(2);
        let user_id = Uuid::new_v4();
        let mut stream = Box::pin(bus.subscribe(user_id).await);
        stream.next().await; // Connected

        for _ in 0..5 {
            bus.publish(user_id, BusEvent::TelegramConnected).await;
        }

        let mut saw_lagged = false;
        for _ in 0..5 {
            if let Some(item) = stream.next().await {
                if matches!(item, BusStreamItem::Lagged(_)) {
                    saw_lagged = true;
                    break;
                }
            }
        }
        assert!(saw_lagged);
    }

    #[tokio::test]
    async fn prune_removes_idle_channel() {
        let bus = EventBus::new(16);
        let user_id = Uuid::new_v4();
        {
            let stream = bus.subscribe(user_id).await;
            drop(stream);
        }
        bus.prune_if_idle(user_id).await;
        assert_eq!(bus.channels.read().await.len(), 0);
    }
}
