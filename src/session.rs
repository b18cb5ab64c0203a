use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::{
    channel::{ChannelController, ChannelState, Handshake},
    error::{AntError, Result},
    event::{Observer, SensorEvent},
    flow::{Completion, OutboundCommand},
    profiles::{Page, Profile, Telemetry},
    protocol::{Frame, Message},
    router::{Dispatch, FrameRouter},
    sensor::{Scanner, Sensor},
    transport::Transport,
    types::ChannelConfig,
};

/// Channel used by the receive-scan mode
pub const SCAN_CHANNEL: u8 = 0;

/// Main interface to an ANT radio
///
/// `Session` owns the transport and every bound channel. It brings channels
/// up and down, routes inbound frames to the sensors that own them and hands
/// the resulting notifications to an [`Observer`].
///
/// # Features
///
/// - **Directed sensors**: attach a channel to one device, or to the first
///   device of a profile found when the device id is 0
/// - **Scanning**: capture every device of a profile in range with the radio's
///   exclusive receive-scan mode
/// - **Acknowledged writes**: send control pages one at a time per channel
///   with a completion callback
/// - **Autonomous recovery**: channels dropped by the radio are unassigned and
///   their transport slot given back, ready to be attached again
///
/// # Processing model
///
/// Frames are processed one at a time. Commands and notifications produced
/// while routing a frame are buffered and only written or delivered once
/// routing returns, so an observer never runs in the middle of a step.
///
/// # Examples
///
/// ## Directed sensor
///
/// ```no_run
/// use antlers::{ChannelTransport, HeartRate, Profile, SensorEvent, Session, SlotTable};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let (transport, _radio) = ChannelTransport::pair(SlotTable::default());
///     let mut session = Session::new(transport, Vec::<SensorEvent>::new());
///
///     // Pair with the first heart rate monitor found on channel 1
///     session.attach(HeartRate, HeartRate::attach_config(1, 0)).await?;
///
///     session.run().await?;
///
///     for event in session.observer() {
///         println!("{event:?}");
///     }
///
///     Ok(())
/// }
/// ```
///
/// ## Scanning with a channel observer
///
/// ```no_run
/// use antlers::{ChannelTransport, HeartRate, Session, SlotTable, ANT_PLUS_FREQUENCY};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let (transport, _radio) = ChannelTransport::pair(SlotTable::default());
///     let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
///     let mut session = Session::new(transport, tx);
///
///     session.scan(HeartRate, ANT_PLUS_FREQUENCY).await?;
///
///     tokio::spawn(async move {
///         while let Some(event) = rx.recv().await {
///             println!("{event:?}");
///         }
///     });
///
///     session.run().await?;
///     Ok(())
/// }
/// ```
pub struct Session<T: Transport, O: Observer> {
    transport: T,
    observer: O,
    router: FrameRouter,
}

impl<T: Transport, O: Observer> Session<T, O> {
    /// Create a session over `transport`, delivering notifications to `observer`
    pub fn new(transport: T, observer: O) -> Self {
        Self {
            transport,
            observer,
            router: FrameRouter::new(),
        }
    }

    /// Reset the radio and load `key` on network 0
    ///
    /// Every channel is assigned to network 0, so this must run before the
    /// first attach on a freshly plugged radio.
    ///
    /// # Errors
    ///
    /// Returns a transport error if a command cannot be written.
    pub async fn initialize(&mut self, key: &[u8; 8]) -> Result<()> {
        info!("Resetting radio");
        self.transport.write(Message::system_reset().to_bytes()).await?;
        self.transport
            .write(Message::set_network_key(0, key).to_bytes())
            .await
    }

    /// Attach a channel to a device of profile `P`
    ///
    /// Claims the transport slot, binds a [`Sensor`] to `config.channel` and
    /// sends the first setup command. The rest of the handshake is driven by
    /// the radio's confirmations; [`SensorEvent::Attached`] is delivered once
    /// the channel is open.
    ///
    /// [`SensorEvent::Attached`]: crate::SensorEvent::Attached
    ///
    /// # Errors
    ///
    /// Returns [`AntError::AlreadyAttached`] if the channel is bound,
    /// [`AntError::AttachRefused`] if the transport will not grant the slot,
    /// or a transport error if the first command cannot be written.
    pub async fn attach<P: Profile>(&mut self, profile: P, config: ChannelConfig) -> Result<()> {
        let channel = config.channel;
        if self.router.is_bound(channel) {
            return Err(AntError::AlreadyAttached { channel });
        }
        if !self.transport.attach(channel, false) {
            return Err(AntError::AttachRefused { channel });
        }

        info!(
            "Attaching channel {} to {} device {}",
            channel,
            P::NAME,
            config.device_id
        );

        let sensor = Sensor::new(profile, channel, config.device_id, config.transmission_type);
        let (controller, assign) = ChannelController::attach(config);
        self.router.bind(controller, Box::new(sensor))?;

        self.transport.write(assign.to_bytes()).await
    }

    /// Scan for every device of profile `P` on `frequency`
    ///
    /// Takes the radio's exclusive scan slot on [`SCAN_CHANNEL`]. Every device
    /// seen gets its own state record and its notifications carry the signal
    /// strength of the frame that produced them.
    ///
    /// If a scan is already running, the new profile joins it instead: no
    /// handshake is sent and `frequency` is ignored. A join on an open scan
    /// delivers [`SensorEvent::Attached`] right away; otherwise it is
    /// delivered once the running handshake completes.
    ///
    /// [`SensorEvent::Attached`]: crate::SensorEvent::Attached
    ///
    /// # Errors
    ///
    /// Returns [`AntError::AlreadyAttached`] if the scan channel is bound to a
    /// directed sensor, to a closing scan or to a scan of the same profile,
    /// [`AntError::ScanUnsupported`] if the transport cannot scan,
    /// [`AntError::AttachRefused`] if other channels are in use, or a
    /// transport error if the first command cannot be written.
    pub async fn scan<P: Profile>(&mut self, profile: P, frequency: u8) -> Result<()> {
        if let Some(controller) = self.router.controller(SCAN_CHANNEL) {
            let joinable = controller.handshake() == Handshake::Scan
                && !controller.slot_released()
                && !controller.state().is_tearing_down()
                && self.transport.is_scanning();
            if !joinable {
                return Err(AntError::AlreadyAttached {
                    channel: SCAN_CHANNEL,
                });
            }
            let open = controller.state().is_open();

            self.router
                .join(SCAN_CHANNEL, Box::new(Scanner::new(profile, SCAN_CHANNEL)))?;
            info!("Joined running scan for {} devices", P::NAME);

            if open {
                self.observer.notify(SensorEvent::Attached {
                    channel: SCAN_CHANNEL,
                });
            }
            return Ok(());
        }
        if !self.transport.can_scan() {
            return Err(AntError::ScanUnsupported);
        }
        if !self.transport.attach(SCAN_CHANNEL, true) {
            return Err(AntError::AttachRefused {
                channel: SCAN_CHANNEL,
            });
        }

        info!("Scanning for {} devices on {} MHz", P::NAME, 2400 + u16::from(frequency));

        let config = ChannelConfig::scan(P::DEVICE_TYPE, frequency);
        let (controller, assign) = ChannelController::scan(config);
        self.router
            .bind(controller, Box::new(Scanner::new(profile, SCAN_CHANNEL)))?;

        self.transport.write(assign.to_bytes()).await
    }

    /// Close a channel and give back its transport slot
    ///
    /// Does nothing if the channel is not bound. The channel stays bound until
    /// the radio confirms the unassign; wait for [`SensorEvent::Detached`]
    /// before attaching it again.
    ///
    /// [`SensorEvent::Detached`]: crate::SensorEvent::Detached
    ///
    /// # Errors
    ///
    /// Returns [`AntError::DetachRefused`] if the transport does not hold the
    /// channel's slot, or a transport error if the close cannot be written.
    pub async fn detach(&mut self, channel: u8) -> Result<()> {
        let Some(controller) = self.router.controller_mut(channel) else {
            debug!("Detach of unbound channel {} ignored", channel);
            return Ok(());
        };
        if controller.slot_released() {
            debug!("Channel {} is already detaching", channel);
            return Ok(());
        }

        info!("Detaching channel {}", channel);
        let close = controller.close();
        self.transport.write(close.to_bytes()).await?;

        if !self.transport.detach(channel) {
            return Err(AntError::DetachRefused { channel });
        }
        if let Some(controller) = self.router.controller_mut(channel) {
            controller.mark_slot_released();
        }
        Ok(())
    }

    /// Send a page as acknowledged data
    ///
    /// Writes are queued per channel and sent one at a time. `completion` is
    /// called with `true` once the device acknowledged the page, or `false` if
    /// the transfer failed.
    ///
    /// # Errors
    ///
    /// Returns [`AntError::NotAttached`] if the channel is not bound, or a
    /// transport error if the page cannot be written.
    pub async fn send(
        &mut self,
        channel: u8,
        page: Page,
        completion: Option<Completion>,
    ) -> Result<()> {
        let controller = self
            .router
            .controller_mut(channel)
            .ok_or(AntError::NotAttached { channel })?;

        let frame = Message::acknowledged_data(channel, &page).to_bytes();
        debug!("Queueing page {:02X} on channel {}", page[0], channel);
        match controller.enqueue(OutboundCommand::new(frame, completion)) {
            Some(frame) => self.transport.write(frame).await,
            None => Ok(()),
        }
    }

    /// Process one inbound frame
    ///
    /// Malformed frames are logged and dropped. Notifications produced by the
    /// frame are delivered after its commands are written, even if a write
    /// fails.
    ///
    /// # Errors
    ///
    /// Returns a transport error if a command produced by the frame cannot be
    /// written.
    pub async fn process_frame(&mut self, data: Bytes) -> Result<()> {
        let frame = match Frame::parse(data) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Discarding inbound frame: {}", e);
                return Ok(());
            }
        };

        let mut dispatch = Dispatch::default();
        self.router.route(&frame, &mut dispatch);
        let (writes, events, released) = dispatch.into_parts();

        let mut written = Ok(());
        for frame in writes {
            written = self.transport.write(frame).await;
            if written.is_err() {
                break;
            }
        }

        for release in released {
            if !release.slot_released && !self.transport.detach(release.channel) {
                warn!("Transport did not hold a slot for channel {}", release.channel);
            }
        }

        for event in events {
            self.observer.notify(event);
        }

        written
    }

    /// Process frames until the transport closes
    ///
    /// # Errors
    ///
    /// Returns the first transport error hit while writing.
    pub async fn run(&mut self) -> Result<()> {
        while let Some(data) = self.transport.read().await {
            self.process_frame(data).await?;
        }
        info!("Transport closed, {} channels still bound", self.router.channels().len());
        Ok(())
    }

    /// Handshake state of a bound channel
    #[must_use]
    pub fn state(&self, channel: u8) -> Option<ChannelState> {
        self.router.controller(channel).map(ChannelController::state)
    }

    /// Current telemetry of every device behind a channel
    #[must_use]
    pub fn telemetry(&self, channel: u8) -> Vec<Telemetry> {
        self.router.telemetry(channel)
    }

    /// Bound channels in ascending order
    #[must_use]
    pub fn channels(&self) -> Vec<u8> {
        self.router.channels()
    }

    /// Acknowledged writes waiting or in flight on a channel
    #[must_use]
    pub fn queued(&self, channel: u8) -> usize {
        self.router
            .controller(channel)
            .map_or(0, ChannelController::queued)
    }

    /// Get the observer
    #[must_use]
    pub const fn observer(&self) -> &O {
        &self.observer
    }

    /// Get the observer mutably
    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    /// Get the transport
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Get the transport mutably
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Take back the transport and observer
    pub fn into_parts(self) -> (T, O) {
        (self.transport, self.observer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        profiles::{FitnessEquipment, HeartRate, Speed},
        protocol::{code, MessageId, MESSAGE_RF},
        transport::{ChannelTransport, LoopbackHandle, SlotTable},
        ANT_PLUS_FREQUENCY, ANT_PLUS_NETWORK_KEY,
    };
    use futures::channel::mpsc::UnboundedReceiver;
    use std::sync::{Arc, Mutex};
    use tokio_test::{assert_err, assert_ok};

    type TestSession = Session<ChannelTransport<UnboundedReceiver<Bytes>>, Vec<SensorEvent>>;

    const ATTACH_ORDER: [MessageId; 7] = [
        MessageId::ChannelAssign,
        MessageId::ChannelId,
        MessageId::ChannelSearchTimeout,
        MessageId::ChannelFrequency,
        MessageId::ChannelPeriod,
        MessageId::LibConfig,
        MessageId::ChannelOpen,
    ];

    const SCAN_ORDER: [MessageId; 6] = [
        MessageId::ChannelAssign,
        MessageId::ChannelId,
        MessageId::ChannelFrequency,
        MessageId::EnableRxExt,
        MessageId::LibConfig,
        MessageId::OpenRxScan,
    ];

    fn new_session(slots: SlotTable) -> (TestSession, LoopbackHandle) {
        let (transport, radio) = ChannelTransport::pair(slots);
        (Session::new(transport, Vec::new()), radio)
    }

    fn channel_event(channel: u8, message: u8, code: u8) -> Bytes {
        Message::new(MessageId::ChannelEvent, vec![channel, message, code]).to_bytes()
    }

    fn confirm(channel: u8, id: MessageId) -> Bytes {
        channel_event(channel, id as u8, code::RESPONSE_NO_ERROR)
    }

    fn rf(channel: u8, code: u8) -> Bytes {
        channel_event(channel, MESSAGE_RF, code)
    }

    fn broadcast(channel: u8, page: Page) -> Bytes {
        let mut payload = vec![channel];
        payload.extend_from_slice(&page);
        Message::new(MessageId::BroadcastData, payload).to_bytes()
    }

    fn ids(frames: &[Bytes]) -> Vec<MessageId> {
        frames
            .iter()
            .map(|f| Frame::parse(f.clone()).unwrap().message_id().unwrap())
            .collect()
    }

    async fn open(session: &mut TestSession, radio: &mut LoopbackHandle, channel: u8) {
        for id in ATTACH_ORDER {
            assert_ok!(session.process_frame(confirm(channel, id)).await);
        }
        radio.drain_written();
    }

    #[tokio::test]
    async fn test_initialize() {
        let (mut session, mut radio) = new_session(SlotTable::default());
        assert_ok!(session.initialize(&ANT_PLUS_NETWORK_KEY).await);

        let written = radio.drain_written();
        assert_eq!(ids(&written), vec![MessageId::SystemReset, MessageId::NetworkKey]);
        let key = Frame::parse(written[1].clone()).unwrap();
        assert_eq!(key.channel(), 0);
        assert_eq!(key.data(), &ANT_PLUS_NETWORK_KEY);
    }

    #[tokio::test]
    async fn test_attach_handshake() {
        let (mut session, mut radio) = new_session(SlotTable::default());

        assert_ok!(session.attach(HeartRate, HeartRate::attach_config(1, 12345)).await);
        assert_eq!(session.state(1), Some(ChannelState::AssignPending));

        let mut written = radio.drain_written();
        for id in ATTACH_ORDER {
            assert_ok!(session.process_frame(confirm(1, id)).await);
            written.extend(radio.drain_written());
        }

        assert_eq!(ids(&written), ATTACH_ORDER.to_vec());

        let id = Frame::parse(written[1].clone()).unwrap();
        assert_eq!(id.channel(), 1);
        assert_eq!(id.data(), &[0x39, 0x30, HeartRate::DEVICE_TYPE, 0]);

        assert_eq!(session.state(1), Some(ChannelState::Open));
        assert_eq!(session.observer(), &vec![SensorEvent::Attached { channel: 1 }]);
    }

    #[tokio::test]
    async fn test_out_of_order_confirmation_is_reported() {
        let (mut session, _radio) = new_session(SlotTable::default());
        assert_ok!(session.attach(HeartRate, HeartRate::attach_config(1, 1)).await);

        assert_ok!(session.process_frame(confirm(1, MessageId::ChannelPeriod)).await);

        assert_eq!(session.state(1), Some(ChannelState::AssignPending));
        assert_eq!(
            session.observer(),
            &vec![SensorEvent::EventData {
                channel: 1,
                message: MessageId::ChannelPeriod as u8,
                code: code::RESPONSE_NO_ERROR,
            }]
        );
    }

    #[tokio::test]
    async fn test_telemetry_follows_attached() {
        let (mut session, mut radio) = new_session(SlotTable::default());
        assert_ok!(session.attach(HeartRate, HeartRate::attach_config(1, 7)).await);
        open(&mut session, &mut radio, 1).await;

        assert_ok!(session.process_frame(broadcast(1, [0, 0, 0, 0, 0, 0, 1, 72])).await);
        assert_ok!(session.process_frame(broadcast(1, [0, 0, 0, 0, 0, 0, 1, 72])).await);
        assert_ok!(session.process_frame(broadcast(1, [0, 0, 0, 0, 0, 0, 2, 73])).await);

        let events = session.observer();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], SensorEvent::Attached { channel: 1 });
        assert!(events[1..]
            .iter()
            .all(|e| matches!(e, SensorEvent::Telemetry { channel: 1, signal: None, .. })));
        assert_eq!(session.telemetry(1).len(), 1);
    }

    #[tokio::test]
    async fn test_frames_for_unbound_channels_are_dropped() {
        let (mut session, mut radio) = new_session(SlotTable::default());

        assert_ok!(session.process_frame(confirm(3, MessageId::ChannelAssign)).await);
        assert_ok!(session.process_frame(broadcast(3, [0; 8])).await);
        assert_ok!(session.process_frame(Bytes::from_static(&[0xA4, 0x01])).await);

        assert!(session.observer().is_empty());
        assert!(radio.drain_written().is_empty());
    }

    #[tokio::test]
    async fn test_attach_preconditions() {
        let (mut session, _radio) = new_session(SlotTable::new(1, true));

        assert_ok!(session.attach(HeartRate, HeartRate::attach_config(1, 1)).await);

        let err = assert_err!(session.attach(HeartRate, HeartRate::attach_config(1, 2)).await);
        assert!(matches!(err, AntError::AlreadyAttached { channel: 1 }));

        let err = assert_err!(session.attach(HeartRate, HeartRate::attach_config(2, 2)).await);
        assert!(matches!(err, AntError::AttachRefused { channel: 2 }));
        assert!(err.is_precondition());
        assert_eq!(session.channels(), vec![1]);
    }

    #[tokio::test]
    async fn test_scan_preconditions() {
        let (mut session, _radio) = new_session(SlotTable::new(8, false));
        let err = assert_err!(session.scan(HeartRate, ANT_PLUS_FREQUENCY).await);
        assert!(matches!(err, AntError::ScanUnsupported));

        let (mut session, _radio) = new_session(SlotTable::default());
        assert_ok!(session.attach(HeartRate, HeartRate::attach_config(1, 1)).await);
        let err = assert_err!(session.scan(HeartRate, ANT_PLUS_FREQUENCY).await);
        assert!(matches!(err, AntError::AttachRefused { channel: SCAN_CHANNEL }));

        let (mut session, _radio) = new_session(SlotTable::default());
        assert_ok!(session.scan(HeartRate, ANT_PLUS_FREQUENCY).await);
        let err = assert_err!(session.scan(HeartRate, ANT_PLUS_FREQUENCY).await);
        assert!(matches!(err, AntError::AlreadyAttached { channel: 0 }));
        let err = assert_err!(session.attach(HeartRate, HeartRate::attach_config(1, 1)).await);
        assert!(matches!(err, AntError::AttachRefused { channel: 1 }));
    }

    #[tokio::test]
    async fn test_scan_handshake_and_data() {
        let (mut session, mut radio) = new_session(SlotTable::default());
        assert_ok!(session.scan(HeartRate, ANT_PLUS_FREQUENCY).await);

        let mut written = radio.drain_written();
        for id in SCAN_ORDER {
            assert_ok!(session.process_frame(confirm(SCAN_CHANNEL, id)).await);
            written.extend(radio.drain_written());
        }
        assert_eq!(ids(&written), SCAN_ORDER.to_vec());
        assert_eq!(session.state(SCAN_CHANNEL), Some(ChannelState::Open));

        let wildcard = Frame::parse(written[1].clone()).unwrap();
        assert_eq!(wildcard.data(), &[0, 0, 0, 0]);

        let mut payload = vec![SCAN_CHANNEL, 0, 0, 0, 0, 0, 0, 5, 66];
        payload.extend_from_slice(&[0xC0, 0x10, 0x00, 0x78, 0x01, 0x20]);
        payload.extend_from_slice(&(-60i8).to_le_bytes());
        payload.extend_from_slice(&(-96i8).to_le_bytes());
        let frame = Message::new(MessageId::BroadcastData, payload).to_bytes();
        assert_ok!(session.process_frame(frame).await);

        let Some(SensorEvent::Telemetry {
            signal, telemetry, ..
        }) = session.observer().last()
        else {
            panic!("expected telemetry");
        };
        assert_eq!(signal.map(|s| s.rssi), Some(-60));
        assert_eq!(telemetry.device_id(), 16);
    }

    fn scan_broadcast(page: Page, device_id: u16, device_type: u8) -> Bytes {
        let [lo, hi] = device_id.to_le_bytes();
        let mut payload = vec![SCAN_CHANNEL];
        payload.extend_from_slice(&page);
        payload.extend_from_slice(&[0xC0, lo, hi, device_type, 0x01, 0x20]);
        payload.extend_from_slice(&(-70i8).to_le_bytes());
        payload.extend_from_slice(&(-96i8).to_le_bytes());
        Message::new(MessageId::BroadcastData, payload).to_bytes()
    }

    #[tokio::test]
    async fn test_second_profile_joins_running_scan() {
        let (mut session, mut radio) = new_session(SlotTable::default());
        assert_ok!(session.scan(HeartRate, ANT_PLUS_FREQUENCY).await);
        for id in SCAN_ORDER {
            assert_ok!(session.process_frame(confirm(SCAN_CHANNEL, id)).await);
        }
        radio.drain_written();
        assert!(session.transport().is_scanning());

        assert_ok!(session.scan(Speed::default(), ANT_PLUS_FREQUENCY).await);
        assert!(radio.drain_written().is_empty());
        assert_eq!(
            session.observer(),
            &vec![
                SensorEvent::Attached {
                    channel: SCAN_CHANNEL
                };
                2
            ]
        );

        let err = assert_err!(session.scan(HeartRate, ANT_PLUS_FREQUENCY).await);
        assert!(matches!(err, AntError::AlreadyAttached { channel: 0 }));

        let hr = scan_broadcast([0, 0, 0, 0, 0, 0, 3, 62], 11, HeartRate::DEVICE_TYPE);
        let speed = scan_broadcast([0, 0, 0, 0, 0x00, 0x04, 10, 0], 22, Speed::DEVICE_TYPE);
        assert_ok!(session.process_frame(hr).await);
        assert_ok!(session.process_frame(speed).await);

        let kinds: Vec<_> = session
            .observer()
            .iter()
            .filter_map(|e| match e {
                SensorEvent::Telemetry { telemetry, .. } => Some(telemetry),
                _ => None,
            })
            .map(|t| (matches!(t, Telemetry::HeartRate(_)), t.device_id()))
            .collect();
        assert_eq!(kinds, vec![(true, 11), (false, 22)]);
        assert_eq!(session.telemetry(SCAN_CHANNEL).len(), 2);
    }

    #[tokio::test]
    async fn test_join_during_scan_handshake_waits_for_open() {
        let (mut session, mut radio) = new_session(SlotTable::default());
        assert_ok!(session.scan(HeartRate, ANT_PLUS_FREQUENCY).await);
        assert_ok!(session.scan(Speed::default(), ANT_PLUS_FREQUENCY).await);
        assert_eq!(ids(&radio.drain_written()), vec![MessageId::ChannelAssign]);
        assert!(session.observer().is_empty());

        for id in SCAN_ORDER {
            assert_ok!(session.process_frame(confirm(SCAN_CHANNEL, id)).await);
        }
        assert_eq!(
            session.observer(),
            &vec![SensorEvent::Attached {
                channel: SCAN_CHANNEL
            }]
        );
    }

    #[tokio::test]
    async fn test_scan_does_not_join_directed_or_closing_channel() {
        let (mut session, _radio) = new_session(SlotTable::default());
        assert_ok!(session.attach(HeartRate, HeartRate::attach_config(SCAN_CHANNEL, 1)).await);
        let err = assert_err!(session.scan(Speed::default(), ANT_PLUS_FREQUENCY).await);
        assert!(matches!(err, AntError::AlreadyAttached { channel: 0 }));

        let (mut session, _radio) = new_session(SlotTable::default());
        assert_ok!(session.scan(HeartRate, ANT_PLUS_FREQUENCY).await);
        assert_ok!(session.detach(SCAN_CHANNEL).await);
        let err = assert_err!(session.scan(Speed::default(), ANT_PLUS_FREQUENCY).await);
        assert!(matches!(err, AntError::AlreadyAttached { channel: 0 }));
    }

    #[tokio::test]
    async fn test_detach() {
        let (mut session, mut radio) = new_session(SlotTable::default());

        assert_ok!(session.detach(4).await);
        assert!(radio.drain_written().is_empty());

        assert_ok!(session.attach(HeartRate, HeartRate::attach_config(4, 1)).await);
        open(&mut session, &mut radio, 4).await;

        assert_ok!(session.detach(4).await);
        assert_eq!(ids(&radio.drain_written()), vec![MessageId::ChannelClose]);
        assert_eq!(session.state(4), Some(ChannelState::ClosePending));
        assert_eq!(session.transport().slots().used(), 0);

        // a second detach while closing does nothing
        assert_ok!(session.detach(4).await);
        assert!(radio.drain_written().is_empty());

        assert_ok!(session.process_frame(confirm(4, MessageId::ChannelClose)).await);
        assert_ok!(session.process_frame(rf(4, code::EVENT_CHANNEL_CLOSED)).await);
        assert_eq!(ids(&radio.drain_written()), vec![MessageId::ChannelUnassign]);

        assert_ok!(session.process_frame(confirm(4, MessageId::ChannelUnassign)).await);
        assert_eq!(session.state(4), None);
        assert!(session.channels().is_empty());
        assert_eq!(
            session.observer().last(),
            Some(&SensorEvent::Detached { channel: 4 })
        );

        assert_ok!(session.attach(HeartRate, HeartRate::attach_config(4, 1)).await);
    }

    #[tokio::test]
    async fn test_detach_refused() {
        let (mut session, _radio) = new_session(SlotTable::default());
        assert_ok!(session.attach(HeartRate, HeartRate::attach_config(2, 1)).await);
        assert!(session.transport_mut().detach(2));

        let err = assert_err!(session.detach(2).await);
        assert!(matches!(err, AntError::DetachRefused { channel: 2 }));
    }

    #[tokio::test]
    async fn test_dropped_channel_releases_slot() {
        let (mut session, mut radio) = new_session(SlotTable::new(1, true));
        assert_ok!(session.attach(HeartRate, HeartRate::attach_config(1, 1)).await);
        open(&mut session, &mut radio, 1).await;

        assert_ok!(session.process_frame(rf(1, code::EVENT_RX_FAIL_GO_TO_SEARCH)).await);
        assert_eq!(ids(&radio.drain_written()), vec![MessageId::ChannelUnassign]);
        assert_eq!(session.transport().slots().used(), 1);

        assert_ok!(session.process_frame(confirm(1, MessageId::ChannelUnassign)).await);
        assert_eq!(session.transport().slots().used(), 0);
        assert!(session
            .observer()
            .contains(&SensorEvent::Detached { channel: 1 }));

        assert_ok!(session.attach(HeartRate, HeartRate::attach_config(1, 1)).await);
    }

    #[tokio::test]
    async fn test_dropped_channel_fails_queued_sends() {
        let (mut session, mut radio) = new_session(SlotTable::default());
        let results = Arc::new(Mutex::new(Vec::new()));
        assert_ok!(
            session
                .attach(FitnessEquipment, FitnessEquipment::attach_config(1, 1))
                .await
        );
        open(&mut session, &mut radio, 1).await;

        for tag in [0x31u8, 0x33] {
            let results = Arc::clone(&results);
            let completion: Completion = Box::new(move |ok: bool| results.lock().unwrap().push((tag, ok)));
            assert_ok!(session.send(1, [tag, 0, 0, 0, 0, 0, 0, 0], Some(completion)).await);
        }
        assert_eq!(session.queued(1), 2);

        assert_ok!(session.process_frame(rf(1, code::EVENT_CHANNEL_CLOSED)).await);
        assert_ok!(session.process_frame(confirm(1, MessageId::ChannelUnassign)).await);

        assert!(session.channels().is_empty());
        assert_eq!(*results.lock().unwrap(), vec![(0x31, false), (0x33, false)]);
    }

    #[tokio::test]
    async fn test_send_is_flow_controlled() {
        let (mut session, mut radio) = new_session(SlotTable::default());
        let results = Arc::new(Mutex::new(Vec::new()));

        let err = assert_err!(session.send(1, [0x30; 8], None).await);
        assert!(matches!(err, AntError::NotAttached { channel: 1 }));

        assert_ok!(
            session
                .attach(FitnessEquipment, FitnessEquipment::attach_config(1, 1))
                .await
        );
        open(&mut session, &mut radio, 1).await;

        for tag in [0x30u8, 0x31, 0x32] {
            let results = Arc::clone(&results);
            let completion: Completion = Box::new(move |ok: bool| results.lock().unwrap().push((tag, ok)));
            assert_ok!(session.send(1, [tag, 0, 0, 0, 0, 0, 0, 0], Some(completion)).await);
        }

        let first = radio.drain_written();
        assert_eq!(first.len(), 1);
        assert_eq!(Frame::parse(first[0].clone()).unwrap().data()[0], 0x30);
        assert_eq!(session.queued(1), 3);

        assert_ok!(session.process_frame(rf(1, code::EVENT_TRANSFER_TX_COMPLETED)).await);
        let second = radio.drain_written();
        assert_eq!(Frame::parse(second[0].clone()).unwrap().data()[0], 0x31);

        assert_ok!(session.process_frame(rf(1, code::EVENT_TRANSFER_TX_FAILED)).await);
        let third = radio.drain_written();
        assert_eq!(Frame::parse(third[0].clone()).unwrap().data()[0], 0x32);

        assert_ok!(session.process_frame(rf(1, code::EVENT_TRANSFER_TX_COMPLETED)).await);
        assert!(radio.drain_written().is_empty());
        assert_eq!(session.queued(1), 0);

        assert_eq!(
            *results.lock().unwrap(),
            vec![(0x30, true), (0x31, false), (0x32, true)]
        );
        assert!(session
            .observer()
            .iter()
            .all(|e| !matches!(e, SensorEvent::EventData { .. })));
    }

    #[tokio::test]
    async fn test_wildcard_attach_learns_device() {
        let (mut session, mut radio) = new_session(SlotTable::default());
        assert_ok!(session.attach(HeartRate, HeartRate::attach_config(2, 0)).await);
        open(&mut session, &mut radio, 2).await;

        assert_ok!(session.process_frame(broadcast(2, [0, 0, 0, 0, 0, 0, 1, 64])).await);
        assert_eq!(ids(&radio.drain_written()), vec![MessageId::ChannelRequest]);

        let id = Message::new(MessageId::ChannelId, vec![2, 0xD2, 0x04, 0x78, 0x01]).to_bytes();
        assert_ok!(session.process_frame(id).await);
        assert_eq!(session.telemetry(2)[0].device_id(), 1234);

        assert_ok!(session.process_frame(broadcast(2, [0, 0, 0, 0, 0, 0, 2, 65])).await);
        assert!(radio.drain_written().is_empty());
    }

    #[tokio::test]
    async fn test_run_until_closed() {
        let (mut session, radio) = new_session(SlotTable::default());
        assert_ok!(session.attach(HeartRate, HeartRate::attach_config(1, 1)).await);

        for id in ATTACH_ORDER {
            assert_ok!(radio.inject(confirm(1, id)));
        }
        assert_ok!(radio.inject(broadcast(1, [0, 0, 0, 0, 0, 0, 1, 60])));
        radio.close();

        assert_ok!(session.run().await);

        let (_, events) = session.into_parts();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], SensorEvent::Attached { channel: 1 });
    }
}
