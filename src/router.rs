//! Demultiplexing of inbound frames to the channels that own them.

use bytes::Bytes;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::{
    channel::{ChannelController, ChannelState},
    error::{AntError, Result},
    event::SensorEvent,
    profiles::Telemetry,
    protocol::{Frame, MessageId},
};

/// Receiver of a channel's non-event frames
///
/// Implemented by the sensor variants in [`crate::sensor`].
pub trait DataSink: Send {
    /// Handle a data page or other non-event frame
    fn handle_frame(&mut self, frame: &Frame, dispatch: &mut Dispatch);

    /// Device type this sink decodes
    fn device_type(&self) -> u8;

    /// Current state of every device behind the channel
    fn telemetry(&self) -> Vec<Telemetry>;
}

/// A channel whose binding was dropped after it reached `Detached`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Released {
    /// Channel index
    pub channel: u8,
    /// Whether the transport slot was already given back by `detach()`
    pub slot_released: bool,
}

/// Output collected while processing one inbound frame
///
/// Frames are written and notifications delivered only after routing
/// returns.
#[derive(Debug, Default)]
pub struct Dispatch {
    writes: Vec<Bytes>,
    events: Vec<SensorEvent>,
    released: Vec<Released>,
}

impl Dispatch {
    /// Queue a frame for the transport
    pub fn write(&mut self, frame: Bytes) {
        self.writes.push(frame);
    }

    /// Queue a notification for the observer
    pub fn notify(&mut self, event: SensorEvent) {
        self.events.push(event);
    }

    /// Frames queued so far
    #[must_use]
    pub fn writes(&self) -> &[Bytes] {
        &self.writes
    }

    /// Notifications queued so far
    #[must_use]
    pub fn events(&self) -> &[SensorEvent] {
        &self.events
    }

    /// Channels unbound during this step
    #[must_use]
    pub fn released(&self) -> &[Released] {
        &self.released
    }

    /// Split into frames, notifications and released channels
    #[must_use]
    pub fn into_parts(self) -> (Vec<Bytes>, Vec<SensorEvent>, Vec<Released>) {
        (self.writes, self.events, self.released)
    }
}

struct Binding {
    controller: ChannelController,
    sinks: Vec<Box<dyn DataSink>>,
}

/// Routes frames by channel index
#[derive(Default)]
pub struct FrameRouter {
    bindings: HashMap<u8, Binding>,
}

impl FrameRouter {
    /// Create an empty router
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a controller and its data sink to the controller's channel
    ///
    /// # Errors
    ///
    /// Returns [`AntError::AlreadyAttached`] if the channel is already bound.
    pub fn bind(&mut self, controller: ChannelController, sink: Box<dyn DataSink>) -> Result<()> {
        let channel = controller.channel();
        if self.bindings.contains_key(&channel) {
            return Err(AntError::AlreadyAttached { channel });
        }
        self.bindings.insert(
            channel,
            Binding {
                controller,
                sinks: vec![sink],
            },
        );
        Ok(())
    }

    /// Add another sink to a bound channel
    ///
    /// Every data frame on the channel is offered to each sink in the order
    /// they joined. Used to share the receive-scan channel between profiles.
    ///
    /// # Errors
    ///
    /// Returns [`AntError::NotAttached`] if the channel is not bound, or
    /// [`AntError::AlreadyAttached`] if a sink for the same device type is
    /// already on it.
    pub fn join(&mut self, channel: u8, sink: Box<dyn DataSink>) -> Result<()> {
        let binding = self
            .bindings
            .get_mut(&channel)
            .ok_or(AntError::NotAttached { channel })?;
        if binding
            .sinks
            .iter()
            .any(|s| s.device_type() == sink.device_type())
        {
            return Err(AntError::AlreadyAttached { channel });
        }
        binding.sinks.push(sink);
        Ok(())
    }

    /// Whether a controller owns the channel
    #[must_use]
    pub fn is_bound(&self, channel: u8) -> bool {
        self.bindings.contains_key(&channel)
    }

    /// Controller bound to the channel
    #[must_use]
    pub fn controller(&self, channel: u8) -> Option<&ChannelController> {
        self.bindings.get(&channel).map(|b| &b.controller)
    }

    /// Mutable controller bound to the channel
    pub fn controller_mut(&mut self, channel: u8) -> Option<&mut ChannelController> {
        self.bindings.get_mut(&channel).map(|b| &mut b.controller)
    }

    /// Telemetry of every sink bound to the channel
    #[must_use]
    pub fn telemetry(&self, channel: u8) -> Vec<Telemetry> {
        self.bindings
            .get(&channel)
            .map(|b| b.sinks.iter().flat_map(|sink| sink.telemetry()).collect())
            .unwrap_or_default()
    }

    /// Bound channel indices in ascending order
    #[must_use]
    pub fn channels(&self) -> Vec<u8> {
        let mut channels: Vec<u8> = self.bindings.keys().copied().collect();
        channels.sort_unstable();
        channels
    }

    /// Route one frame
    ///
    /// Channel events go to the channel's controller; anything it does not
    /// consume is logged and surfaced as [`SensorEvent::EventData`]. Every other
    /// message goes to the channel's data sink. Frames for unbound channels are
    /// dropped.
    pub fn route(&mut self, frame: &Frame, dispatch: &mut Dispatch) {
        let channel = frame.channel();
        let Some(binding) = self.bindings.get_mut(&channel) else {
            debug!("Dropping frame for unbound channel {}: {}", channel, frame.to_hex());
            return;
        };

        if frame.message_id() != Some(MessageId::ChannelEvent) {
            for sink in &mut binding.sinks {
                sink.handle_frame(frame, dispatch);
            }
            return;
        }

        let Some(status) = frame.channel_status() else {
            warn!("Truncated channel event on channel {}: {}", channel, frame.to_hex());
            return;
        };

        if !binding.controller.handle_status(status, dispatch) {
            warn!("Unhandled channel event on channel {}: {}", channel, frame.to_hex());
            dispatch.notify(SensorEvent::EventData {
                channel,
                message: status.message,
                code: status.code,
            });
        }

        if binding.controller.state() == ChannelState::Detached {
            let failed = binding.controller.fail_pending();
            if failed > 0 {
                warn!("Channel {} detached with {} acknowledged writes pending", channel, failed);
            }
            let slot_released = binding.controller.slot_released();
            self.bindings.remove(&channel);
            info!("Channel {} unbound", channel);
            dispatch.released.push(Released {
                channel,
                slot_released,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        flow::OutboundCommand,
        protocol::{code, Message, MESSAGE_RF},
        types::ChannelConfig,
    };
    use std::sync::{Arc, Mutex};

    #[derive(Default, Clone)]
    struct RecordingSink {
        device_type: u8,
        frames: Arc<Mutex<Vec<Frame>>>,
    }

    impl DataSink for RecordingSink {
        fn handle_frame(&mut self, frame: &Frame, _dispatch: &mut Dispatch) {
            self.frames.lock().unwrap().push(frame.clone());
        }

        fn device_type(&self) -> u8 {
            self.device_type
        }

        fn telemetry(&self) -> Vec<Telemetry> {
            Vec::new()
        }
    }

    fn event(channel: u8, message: u8, code: u8) -> Frame {
        Frame::parse(Message::new(MessageId::ChannelEvent, vec![channel, message, code]).to_bytes())
            .unwrap()
    }

    fn router_with(channel: u8) -> (FrameRouter, RecordingSink) {
        let sink = RecordingSink::default();
        let (controller, _) = ChannelController::attach(ChannelConfig::attach(channel, 0x78, 0, 8070));
        let mut router = FrameRouter::new();
        router.bind(controller, Box::new(sink.clone())).unwrap();
        (router, sink)
    }

    #[test]
    fn test_bind_twice_fails() {
        let (mut router, _) = router_with(1);
        let (controller, _) = ChannelController::attach(ChannelConfig::attach(1, 0x79, 0, 8086));
        let result = router.bind(controller, Box::new(RecordingSink::default()));
        assert!(matches!(result, Err(AntError::AlreadyAttached { channel: 1 })));
        assert_eq!(router.channels(), vec![1]);
    }

    #[test]
    fn test_status_goes_to_controller() {
        let (mut router, sink) = router_with(1);
        let mut dispatch = Dispatch::default();

        router.route(&event(1, MessageId::ChannelAssign as u8, 0), &mut dispatch);

        assert_eq!(
            router.controller(1).map(ChannelController::state),
            Some(ChannelState::IdPending)
        );
        assert_eq!(dispatch.writes().len(), 1);
        assert!(dispatch.events().is_empty());
        assert!(sink.frames.lock().unwrap().is_empty());
    }

    #[test]
    fn test_unhandled_status_emits_event_data() {
        let (mut router, _) = router_with(1);
        let mut dispatch = Dispatch::default();

        router.route(&event(1, MESSAGE_RF, code::EVENT_CHANNEL_COLLISION), &mut dispatch);

        assert_eq!(
            dispatch.events(),
            &[SensorEvent::EventData {
                channel: 1,
                message: MESSAGE_RF,
                code: code::EVENT_CHANNEL_COLLISION
            }]
        );
        assert_eq!(
            router.controller(1).map(ChannelController::state),
            Some(ChannelState::AssignPending)
        );
    }

    #[test]
    fn test_data_goes_to_sink() {
        let (mut router, sink) = router_with(2);
        let mut dispatch = Dispatch::default();
        let data = Frame::parse(
            Message::new(MessageId::BroadcastData, vec![2, 0, 1, 2, 3, 4, 5, 6, 7]).to_bytes(),
        )
        .unwrap();

        router.route(&data, &mut dispatch);

        assert_eq!(sink.frames.lock().unwrap().as_slice(), &[data]);
    }

    #[test]
    fn test_unbound_channel_is_dropped() {
        let (mut router, sink) = router_with(1);
        let mut dispatch = Dispatch::default();

        router.route(&event(5, MESSAGE_RF, code::EVENT_CHANNEL_CLOSED), &mut dispatch);

        assert!(dispatch.writes().is_empty());
        assert!(dispatch.events().is_empty());
        assert!(sink.frames.lock().unwrap().is_empty());
    }

    #[test]
    fn test_detached_channel_is_unbound() {
        let (mut router, _) = router_with(3);
        let mut dispatch = Dispatch::default();

        router.route(&event(3, MESSAGE_RF, code::EVENT_CHANNEL_CLOSED), &mut dispatch);
        assert!(router.is_bound(3));
        router.route(&event(3, MessageId::ChannelUnassign as u8, 0), &mut dispatch);

        assert!(!router.is_bound(3));
        assert_eq!(
            dispatch.released(),
            &[Released {
                channel: 3,
                slot_released: false
            }]
        );
        let (writes, events, _) = dispatch.into_parts();
        assert_eq!(writes.len(), 1);
        assert_eq!(events, vec![SensorEvent::Detached { channel: 3 }]);
    }

    #[test]
    fn test_detach_fails_queued_writes() {
        let (mut router, _) = router_with(3);
        let results = Arc::new(Mutex::new(Vec::new()));
        for tag in [0x31u8, 0x33] {
            let results = results.clone();
            let frame = Message::acknowledged_data(3, &[tag, 0, 0, 0, 0, 0, 0, 0]).to_bytes();
            router.controller_mut(3).unwrap().enqueue(OutboundCommand::new(
                frame,
                Some(Box::new(move |ok: bool| results.lock().unwrap().push((tag, ok)))),
            ));
        }
        let mut dispatch = Dispatch::default();

        router.route(&event(3, MESSAGE_RF, code::EVENT_CHANNEL_CLOSED), &mut dispatch);
        assert!(results.lock().unwrap().is_empty());
        router.route(&event(3, MessageId::ChannelUnassign as u8, 0), &mut dispatch);

        assert!(!router.is_bound(3));
        assert_eq!(*results.lock().unwrap(), vec![(0x31, false), (0x33, false)]);
    }

    #[test]
    fn test_joined_sinks_share_data() {
        let (mut router, first) = router_with(0);
        let second = RecordingSink {
            device_type: 0x7B,
            ..RecordingSink::default()
        };
        assert!(router.join(0, Box::new(second.clone())).is_ok());

        let duplicate = router.join(0, Box::new(RecordingSink::default()));
        assert!(matches!(duplicate, Err(AntError::AlreadyAttached { channel: 0 })));
        let unbound = router.join(4, Box::new(RecordingSink::default()));
        assert!(matches!(unbound, Err(AntError::NotAttached { channel: 4 })));

        let mut dispatch = Dispatch::default();
        let data = Frame::parse(
            Message::new(MessageId::BroadcastData, vec![0, 0, 1, 2, 3, 4, 5, 6, 7]).to_bytes(),
        )
        .unwrap();
        router.route(&data, &mut dispatch);

        assert_eq!(first.frames.lock().unwrap().len(), 1);
        assert_eq!(second.frames.lock().unwrap().as_slice(), &[data]);
    }
}
