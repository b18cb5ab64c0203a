#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

//! # Antlers 🦌
//!
//! A Rust library for reading ANT+ fitness sensors through a USB ANT radio.
//!
//! ANT radios multiplex a handful of logical channels over one serial link.
//! Each channel has to be walked through a fixed handshake before it streams
//! data, acknowledged writes must be sent one at a time, and every device
//! class packs its measurements into its own 8-byte data pages with narrow
//! counters that wrap. This crate takes care of all three:
//!
//! - **Channel handshakes**: directed attach to one device, or the radio's
//!   exclusive receive-scan mode capturing every device in range
//! - **Recovery**: channels the radio drops are unassigned and released so
//!   they can be attached again
//! - **Flow control**: acknowledged data pages are queued per channel with a
//!   completion callback
//! - **Profiles**: heart rate, bike speed and cadence, bicycle power, fitness
//!   equipment control, muscle oxygen, environment and stride sensors, with
//!   rollover-safe counters and duplicate suppression
//!
//! ## Architecture
//!
//! ```text
//! Transport ──frames──▶ FrameRouter ──channel events──▶ ChannelController ──▶ FlowControlQueue
//!                            │                                  │
//!                            └──data pages──▶ Sensor / Scanner ─┴──▶ Dispatch ──▶ Observer
//! ```
//!
//! The [`Transport`] trait is the only seam to the hardware. The in-memory
//! [`ChannelTransport`] drives sessions from any frame stream and backs the
//! tests and demos.
//!
//! ## Quick Start
//!
//! ```no_run
//! use antlers::{
//!     ChannelTransport, HeartRate, Profile, SensorEvent, Session, SlotTable, ANT_PLUS_NETWORK_KEY,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (transport, _radio) = ChannelTransport::pair(SlotTable::default());
//!     let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<SensorEvent>();
//!     let mut session = Session::new(transport, tx);
//!
//!     // Load the ANT+ key, then pair channel 0 with any heart rate monitor
//!     session.initialize(&ANT_PLUS_NETWORK_KEY).await?;
//!     session.attach(HeartRate, HeartRate::attach_config(0, 0)).await?;
//!
//!     tokio::spawn(async move {
//!         while let Some(event) = rx.recv().await {
//!             println!("{event:?}");
//!         }
//!     });
//!
//!     session.run().await?;
//!     Ok(())
//! }
//! ```

/// Channel handshake state machine
pub mod channel;
/// Byte stream to frame reassembly
pub mod codec;
/// Error types and handling
pub mod error;
/// Notifications and observers
pub mod event;
/// Acknowledged write queue
pub mod flow;
/// Device profiles and page decoders
pub mod profiles;
/// Protocol message structures and parsing
pub mod protocol;
/// Rollover-safe counters
pub mod rollover;
/// Inbound frame routing
pub mod router;
/// Directed sensors and scanners
pub mod sensor;
/// Main engine interface
pub mod session;
/// Radio link abstraction
pub mod transport;
/// Type definitions and data structures
pub mod types;

// Re-export the main types for convenient usage
pub use channel::{ChannelController, ChannelState, Handshake};
pub use codec::{frame_stream, FrameDecoder};
pub use error::{AntError, Result};
pub use event::{Observer, SensorEvent};
pub use flow::{Completion, FlowControlQueue, OutboundCommand};
pub use profiles::{
    Cadence, CommonPages, Environment, FitnessEquipment, HeartRate, MuscleOxygen, Power, Profile,
    Speed, SpeedCadence, Stride, Telemetry,
};
pub use protocol::{Frame, Message, MessageId};
pub use rollover::RolloverCounter;
pub use sensor::{Scanner, Sensor};
pub use session::{Session, SCAN_CHANNEL};
pub use transport::{ChannelTransport, LoopbackHandle, SlotTable, Transport};
pub use types::{
    BatteryStatus, ChannelConfig, ChannelStatus, ChannelType, Reading, SignalStrength,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// ANT+ RF channel, offset in MHz from 2400
pub const ANT_PLUS_FREQUENCY: u8 = 57;

/// Search timeout that never expires
pub const DEFAULT_SEARCH_TIMEOUT: u8 = 255;

/// Public ANT+ network key
///
/// Radios only hear ANT+ devices once this key is loaded on the network the
/// channels are assigned to.
pub const ANT_PLUS_NETWORK_KEY: [u8; 8] = [0xB9, 0xA5, 0x21, 0xFB, 0xBD, 0x72, 0xC3, 0x45];
