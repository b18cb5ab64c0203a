//! Channel handshake state machine.
//!
//! ```text
//!  attach:  ASSIGN ─▶ ID ─▶ SEARCH_TIMEOUT ─▶ FREQUENCY ─▶ PERIOD ─▶ LIB_CONFIG ─▶ OPEN ─▶ Open
//!  scan:    ASSIGN ─▶ ID ─▶ FREQUENCY ─▶ RX_EXT ─▶ LIB_CONFIG ─▶ OPEN_SCAN ─▶ Open
//!
//!  any ──[channel closed | rx fail go to search]──▶ UNASSIGN ─▶ Detached
//!  detach() ─▶ CLOSE ──[channel closed]──▶ UNASSIGN ─▶ Detached
//! ```
//!
//! Each pending state waits for the radio's response to the command sent on
//! entry. A response that does not belong to the current state leaves the
//! state untouched and is reported as unhandled.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::{
    event::SensorEvent,
    flow::{FlowControlQueue, OutboundCommand},
    protocol::{code, Message, MessageId, LIB_CONFIG_EXTENDED, MESSAGE_RF},
    router::Dispatch,
    types::{ChannelConfig, ChannelStatus},
};

/// Which transition table a channel follows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Handshake {
    /// Directed at a known device
    Attach,
    /// Broadcast capture of every device in range
    Scan,
}

/// Handshake state of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelState {
    /// Waiting for the assign response
    AssignPending,
    /// Waiting for the channel id response
    IdPending,
    /// Waiting for the search timeout response
    SearchTimeoutPending,
    /// Waiting for the frequency response
    FrequencyPending,
    /// Waiting for the period response
    PeriodPending,
    /// Waiting for the extended receive response
    RxExtPending,
    /// Waiting for the lib config response
    LibConfigPending,
    /// Waiting for the open response
    OpenPending,
    /// Waiting for the open-scan response
    OpenScanPending,
    /// Channel is open and streaming
    Open,
    /// Close requested, waiting for the channel to close
    ClosePending,
    /// Waiting for the unassign response
    UnassignPending,
    /// Channel is unassigned
    Detached,
}

impl ChannelState {
    /// Whether the channel is streaming
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }

    /// Whether the channel is being torn down or is gone
    #[must_use]
    pub const fn is_tearing_down(self) -> bool {
        matches!(self, Self::UnassignPending | Self::Detached)
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Notification raised by a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    /// The channel reached `Open`
    Attached,
    /// The channel reached `Detached`
    Detached,
}

/// Result of one transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// State after the transition
    pub next: ChannelState,
    /// Command to send on entering `next`
    pub outbound: Option<Message>,
    /// Notification to raise
    pub notice: Option<Notice>,
    /// Whether the status was consumed
    pub handled: bool,
}

impl Step {
    const fn stay(state: ChannelState) -> Self {
        Self {
            next: state,
            outbound: None,
            notice: None,
            handled: true,
        }
    }

    const fn unhandled(state: ChannelState) -> Self {
        Self {
            next: state,
            outbound: None,
            notice: None,
            handled: false,
        }
    }

    const fn to(next: ChannelState, outbound: Message) -> Self {
        Self {
            next,
            outbound: Some(outbound),
            notice: None,
            handled: true,
        }
    }

    const fn raise(next: ChannelState, notice: Notice) -> Self {
        Self {
            next,
            outbound: None,
            notice: Some(notice),
            handled: true,
        }
    }
}

/// Drives one channel from unassigned to open and back
#[derive(Debug)]
pub struct ChannelController {
    config: ChannelConfig,
    handshake: Handshake,
    state: ChannelState,
    queue: FlowControlQueue,
    slot_released: bool,
}

impl ChannelController {
    /// Start the directed handshake, returning the assign command to send
    #[must_use]
    pub fn attach(config: ChannelConfig) -> (Self, Message) {
        Self::start(config, Handshake::Attach)
    }

    /// Start the scan handshake, returning the assign command to send
    #[must_use]
    pub fn scan(config: ChannelConfig) -> (Self, Message) {
        Self::start(config, Handshake::Scan)
    }

    fn start(config: ChannelConfig, handshake: Handshake) -> (Self, Message) {
        let assign = Message::assign_channel(config.channel, config.channel_type, 0);
        let controller = Self {
            config,
            handshake,
            state: ChannelState::AssignPending,
            queue: FlowControlQueue::new(),
            slot_released: false,
        };
        (controller, assign)
    }

    /// Channel configuration
    #[must_use]
    pub const fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Channel index
    #[must_use]
    pub const fn channel(&self) -> u8 {
        self.config.channel
    }

    /// Transition table in use
    #[must_use]
    pub const fn handshake(&self) -> Handshake {
        self.handshake
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> ChannelState {
        self.state
    }

    /// Whether the transport slot was already given back
    #[must_use]
    pub const fn slot_released(&self) -> bool {
        self.slot_released
    }

    /// Record that the transport slot was given back
    pub fn mark_slot_released(&mut self) {
        self.slot_released = true;
    }

    /// Begin a manual close, returning the close command to send
    pub fn close(&mut self) -> Message {
        if !self.state.is_tearing_down() {
            self.set_state(ChannelState::ClosePending);
        }
        Message::close_channel(self.config.channel)
    }

    /// Queue an acknowledged write, returning the frame to send now if idle
    pub fn enqueue(&mut self, command: OutboundCommand) -> Option<bytes::Bytes> {
        self.queue.enqueue(command)
    }

    /// Fail every acknowledged write still queued, returning how many
    pub fn fail_pending(&mut self) -> usize {
        self.queue.fail_all()
    }

    /// Number of acknowledged writes waiting or in flight
    #[must_use]
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Handle a channel event, returning whether it was consumed
    ///
    /// Transfer completion codes settle the flow-control queue whatever the
    /// handshake state; everything else goes through the transition table.
    pub fn handle_status(&mut self, status: ChannelStatus, dispatch: &mut Dispatch) -> bool {
        if status.message == MESSAGE_RF {
            match status.code {
                code::EVENT_TRANSFER_TX_COMPLETED
                | code::EVENT_TRANSFER_TX_FAILED
                | code::EVENT_RX_FAIL
                | code::INVALID_SCAN_TX_CHANNEL => {
                    let success = status.code == code::EVENT_TRANSFER_TX_COMPLETED;
                    if let Some(next) = self.queue.on_completion(success) {
                        dispatch.write(next);
                    }
                    return true;
                }
                _ => {}
            }
        }

        if status.message == MessageId::AcknowledgedData as u8 {
            return status.code == code::TRANSFER_IN_PROGRESS;
        }

        let step = self.transition(self.state, status);
        self.set_state(step.next);

        if let Some(message) = step.outbound {
            dispatch.write(message.to_bytes());
        }

        let channel = self.config.channel;
        match step.notice {
            Some(Notice::Attached) => dispatch.notify(SensorEvent::Attached { channel }),
            Some(Notice::Detached) => dispatch.notify(SensorEvent::Detached { channel }),
            None => {}
        }

        step.handled
    }

    /// Pure transition function over `(state, status)`
    #[must_use]
    pub fn transition(&self, state: ChannelState, status: ChannelStatus) -> Step {
        use ChannelState::{
            AssignPending, ClosePending, Detached, FrequencyPending, IdPending, LibConfigPending,
            Open, OpenPending, OpenScanPending, PeriodPending, RxExtPending, SearchTimeoutPending,
            UnassignPending,
        };
        use Handshake::{Attach, Scan};

        let config = &self.config;
        let channel = config.channel;

        if status.message == MESSAGE_RF {
            return match status.code {
                code::EVENT_CHANNEL_CLOSED | code::EVENT_RX_FAIL_GO_TO_SEARCH => {
                    if state.is_tearing_down() {
                        Step::stay(state)
                    } else {
                        Step::to(UnassignPending, Message::unassign_channel(channel))
                    }
                }
                _ => Step::unhandled(state),
            };
        }

        let Some(id) = MessageId::from_u8(status.message) else {
            return Step::unhandled(state);
        };

        match (self.handshake, state, id) {
            // the radio answers a close on a channel that never opened with
            // CHANNEL_IN_WRONG_STATE and sends no EVENT_CHANNEL_CLOSED after it
            (_, ClosePending, MessageId::ChannelClose) if status.code != code::RESPONSE_NO_ERROR => {
                Step::to(UnassignPending, Message::unassign_channel(channel))
            }
            (_, _, MessageId::ChannelClose) => Step::stay(state),
            (_, UnassignPending, MessageId::ChannelUnassign) => {
                Step::raise(Detached, Notice::Detached)
            }

            (Attach, AssignPending, MessageId::ChannelAssign) => Step::to(
                IdPending,
                Message::set_channel_id(
                    channel,
                    config.device_id,
                    config.device_type,
                    config.transmission_type,
                ),
            ),
            (Attach, IdPending, MessageId::ChannelId) => Step::to(
                SearchTimeoutPending,
                Message::set_search_timeout(channel, config.search_timeout),
            ),
            (Attach, SearchTimeoutPending, MessageId::ChannelSearchTimeout) => Step::to(
                FrequencyPending,
                Message::set_frequency(channel, config.frequency),
            ),
            (Attach, FrequencyPending, MessageId::ChannelFrequency) => {
                Step::to(PeriodPending, Message::set_period(channel, config.period))
            }
            (Attach, PeriodPending, MessageId::ChannelPeriod) => {
                Step::to(LibConfigPending, Message::lib_config(channel, LIB_CONFIG_EXTENDED))
            }
            (Attach, LibConfigPending, MessageId::LibConfig) => {
                Step::to(OpenPending, Message::open_channel(channel))
            }
            (Attach, OpenPending, MessageId::ChannelOpen) => Step::raise(Open, Notice::Attached),

            (Scan, AssignPending, MessageId::ChannelAssign) => {
                Step::to(IdPending, Message::set_channel_id(channel, 0, 0, 0))
            }
            (Scan, IdPending, MessageId::ChannelId) => Step::to(
                FrequencyPending,
                Message::set_frequency(channel, config.frequency),
            ),
            (Scan, FrequencyPending, MessageId::ChannelFrequency) => {
                Step::to(RxExtPending, Message::enable_rx_ext())
            }
            (Scan, RxExtPending, MessageId::EnableRxExt) => {
                Step::to(LibConfigPending, Message::lib_config(channel, LIB_CONFIG_EXTENDED))
            }
            (Scan, LibConfigPending, MessageId::LibConfig) => {
                Step::to(OpenScanPending, Message::open_rx_scan())
            }
            (Scan, OpenScanPending, MessageId::OpenRxScan) => Step::raise(Open, Notice::Attached),

            _ => Step::unhandled(state),
        }
    }

    fn set_state(&mut self, next: ChannelState) {
        if next != self.state {
            debug!(
                "Channel {} {} -> {}",
                self.config.channel, self.state, next
            );
            self.state = next;
        }
    }
}
