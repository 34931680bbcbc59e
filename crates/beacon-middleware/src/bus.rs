//! Headless, typed, topic-based publish/subscribe bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every message without any single subscriber blocking
//! the others.
//!
//! # Topics
//!
//! | Topic | Payload | Writer |
//! |---|---|---|
//! | [`Topic::BeaconReport`] | [`EventPayload::BeaconReport`] | beacon driver, every good read |
//! | [`Topic::LandingTargetPose`] | [`EventPayload::TargetPose`] | beacon driver, when the pose gate passes |
//! | [`Topic::VehicleLocalPosition`] | [`EventPayload::VehicleLocalPosition`] | navigation estimator |
//! | [`Topic::ParameterUpdate`] | [`EventPayload::ParameterUpdate`] | parameter store |
//!
//! Every topic channel exists from the moment the bus is built, so
//! publishing is always "publish-or-create": the first publish needs no
//! special handling and publishing with nobody listening is not an error.

use beacon_types::{BeaconError, Event, EventPayload};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;
use tracing::warn;

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// Enumeration of all routing topics on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Decoded beacon sensor reports.
    BeaconReport,
    /// Landing target pose derived from beacon reports.
    LandingTargetPose,
    /// Vehicle local position estimates.
    VehicleLocalPosition,
    /// Parameter change notifications.
    ParameterUpdate,
}

impl Topic {
    /// `true` when `payload` is the message type carried on this topic.
    pub fn accepts(self, payload: &EventPayload) -> bool {
        matches!(
            (self, payload),
            (Topic::BeaconReport, EventPayload::BeaconReport(_))
                | (Topic::LandingTargetPose, EventPayload::TargetPose(_))
                | (Topic::VehicleLocalPosition, EventPayload::VehicleLocalPosition(_))
                | (Topic::ParameterUpdate, EventPayload::ParameterUpdate { .. })
        )
    }
}

/// Shared event bus. Clone it cheaply – all clones share the same underlying
/// broadcast channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    beacon_report: broadcast::Sender<Event>,
    landing_target_pose: broadcast::Sender<Event>,
    vehicle_local_position: broadcast::Sender<Event>,
    parameter_update: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new bus with the given channel capacity.
    ///
    /// The `capacity` is applied to every topic channel independently.
    pub fn new(capacity: usize) -> Self {
        let (beacon_report, _) = broadcast::channel(capacity);
        let (landing_target_pose, _) = broadcast::channel(capacity);
        let (vehicle_local_position, _) = broadcast::channel(capacity);
        let (parameter_update, _) = broadcast::channel(capacity);
        Self {
            beacon_report,
            landing_target_pose,
            vehicle_local_position,
            parameter_update,
        }
    }

    /// Publish `event` to the given [`Topic`] channel.
    ///
    /// Returns the number of active receivers that were handed the event;
    /// `Ok(0)` when nobody is currently listening.
    ///
    /// # Errors
    ///
    /// Returns [`BeaconError::Channel`] when the payload does not belong on
    /// `topic`.
    pub fn publish_to(&self, topic: Topic, event: Event) -> Result<usize, BeaconError> {
        if !topic.accepts(&event.payload) {
            return Err(BeaconError::Channel(format!(
                "payload from {} does not belong on topic {:?}",
                event.source, topic
            )));
        }
        // A send error only means there are no receivers right now.
        Ok(self.topic_sender(topic).send(event).unwrap_or(0))
    }

    /// Subscribe to a specific [`Topic`] channel.
    ///
    /// The receiver only sees events published after this call.
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.topic_sender(topic).subscribe(),
        }
    }

    /// Number of live subscribers on `topic`.
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.topic_sender(topic).receiver_count()
    }

    fn topic_sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::BeaconReport => &self.beacon_report,
            Topic::LandingTargetPose => &self.landing_target_pose,
            Topic::VehicleLocalPosition => &self.vehicle_local_position,
            Topic::ParameterUpdate => &self.parameter_update,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Topic-based receiver
// ---------------------------------------------------------------------------

/// A receiver bound to a single [`Topic`] channel.
///
/// Obtained via [`EventBus::subscribe_to`].  Offers both an async
/// [`recv`](Self::recv) and a non-blocking [`try_latest`](Self::try_latest)
/// for polled consumers.
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Wait for the next event on this topic.
    ///
    /// Returns:
    /// * `Ok(event)` – a successfully received event.
    /// * `Err(broadcast::error::RecvError::Lagged(n))` – the subscriber fell
    ///   behind and `n` messages were dropped.  The caller decides whether to
    ///   continue or abort.
    /// * `Err(broadcast::error::RecvError::Closed)` – the bus has shut down.
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// Drain everything queued since the last call and return the newest
    /// event, or `None` when nothing new arrived.
    ///
    /// Never blocks.  Lag is logged and skipped over.
    pub fn try_latest(&mut self) -> Option<Event> {
        let mut latest = None;
        loop {
            match self.receiver.try_recv() {
                Ok(event) => latest = Some(event),
                Err(TryRecvError::Lagged(n)) => {
                    warn!(topic = ?self.topic, lagged_by = n, "TopicReceiver lagged");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return latest,
            }
        }
    }

    /// The [`Topic`] this receiver is bound to.
    pub fn topic(&self) -> Topic {
        self.topic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_types::{BeaconReport, VehicleLocalPosition};
    use chrono::Utc;

    fn report_event(id: u16) -> Event {
        Event::new(
            "beacon-middleware::test",
            EventPayload::BeaconReport(BeaconReport {
                timestamp: Utc::now(),
                id,
                status: 7,
                pos_x: 0.0,
                pos_y: 0.0,
                pos_z: 5.0,
                vel_x: 0.0,
                vel_y: 0.0,
                snr: 0,
                cl: 0,
                sl: 0,
            }),
        )
    }

    fn position_event(x: f32) -> Event {
        Event::new(
            "nav::test",
            EventPayload::VehicleLocalPosition(VehicleLocalPosition {
                timestamp: Utc::now(),
                x,
                y: 0.0,
                z: 0.0,
                valid: true,
                xy_valid: true,
            }),
        )
    }

    #[test]
    fn publish_without_subscribers_is_not_an_error() {
        let bus = EventBus::default();
        assert_eq!(bus.publish_to(Topic::BeaconReport, report_event(1)), Ok(0));
        // Second publish behaves the same as the first.
        assert_eq!(bus.publish_to(Topic::BeaconReport, report_event(2)), Ok(0));
    }

    #[test]
    fn publish_rejects_payload_on_wrong_topic() {
        let bus = EventBus::default();
        let result = bus.publish_to(Topic::LandingTargetPose, report_event(1));
        assert!(matches!(result, Err(BeaconError::Channel(_))));
    }

    #[tokio::test]
    async fn topic_multiple_subscribers_receive_same_event() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut subscriber1 = bus.subscribe_to(Topic::BeaconReport);
        let mut subscriber2 = bus.subscribe_to(Topic::BeaconReport);

        let event = report_event(4);
        assert_eq!(bus.publish_to(Topic::BeaconReport, event.clone())?, 2);

        assert_eq!(subscriber1.recv().await?.id, event.id);
        assert_eq!(subscriber2.recv().await?.id, event.id);
        Ok(())
    }

    #[tokio::test]
    async fn topic_subscriber_does_not_receive_other_topic_events() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut pose_sub = bus.subscribe_to(Topic::LandingTargetPose);

        bus.publish_to(Topic::BeaconReport, report_event(1))?;

        let result =
            tokio::time::timeout(std::time::Duration::from_millis(50), pose_sub.recv()).await;
        assert!(
            result.is_err(),
            "LandingTargetPose subscriber must not receive a BeaconReport event"
        );
        Ok(())
    }

    #[test]
    fn try_latest_returns_none_without_new_data() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe_to(Topic::VehicleLocalPosition);
        assert!(rx.try_latest().is_none());
    }

    #[test]
    fn try_latest_keeps_only_newest_event() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe_to(Topic::VehicleLocalPosition);

        for x in [1.0, 2.0, 3.0] {
            bus.publish_to(Topic::VehicleLocalPosition, position_event(x))
                .unwrap();
        }

        let latest = rx.try_latest().expect("new data");
        match latest.payload {
            EventPayload::VehicleLocalPosition(p) => assert_eq!(p.x, 3.0),
            other => panic!("unexpected payload: {other:?}"),
        }
        // Drained: nothing new until the next publish.
        assert!(rx.try_latest().is_none());
    }

    #[test]
    fn try_latest_survives_lag() {
        let bus = EventBus::new(4);
        let mut rx = bus.subscribe_to(Topic::VehicleLocalPosition);
        for i in 0..100 {
            bus.publish_to(Topic::VehicleLocalPosition, position_event(i as f32))
                .unwrap();
        }
        let latest = rx.try_latest().expect("new data after lag");
        match latest.payload {
            EventPayload::VehicleLocalPosition(p) => assert_eq!(p.x, 99.0),
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn subscriber_count_tracks_receivers() {
        let bus = EventBus::default();
        assert_eq!(bus.subscriber_count(Topic::ParameterUpdate), 0);
        let rx = bus.subscribe_to(Topic::ParameterUpdate);
        assert_eq!(rx.topic(), Topic::ParameterUpdate);
        assert_eq!(bus.subscriber_count(Topic::ParameterUpdate), 1);
        drop(rx);
        assert_eq!(bus.subscriber_count(Topic::ParameterUpdate), 0);
    }
}
