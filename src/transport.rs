//! The link to the radio.
//!
//! A [`Transport`] moves whole frames to and from the USB stick and arbitrates
//! channel slots. The stick has a fixed number of channels and one exclusive
//! receive-scan mode that takes the whole radio.

use async_trait::async_trait;
use bytes::Bytes;
use futures::{channel::mpsc as stream_mpsc, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::{AntError, Result};

/// Frame-level link to the radio
#[async_trait]
pub trait Transport: Send {
    /// Next inbound frame, `None` once the link is closed
    async fn read(&mut self) -> Option<Bytes>;

    /// Write one frame
    ///
    /// # Errors
    ///
    /// Returns [`AntError::Disconnected`] if the link is gone.
    async fn write(&mut self, frame: Bytes) -> Result<()>;

    /// Claim a slot for `channel`, or the exclusive scan slot when `for_scan`
    fn attach(&mut self, channel: u8, for_scan: bool) -> bool;

    /// Give back the slot held by `channel`
    fn detach(&mut self, channel: u8) -> bool;

    /// Whether the exclusive scan slot is taken
    fn is_scanning(&self) -> bool;

    /// Whether the radio supports receive-scan mode
    fn can_scan(&self) -> bool;
}

/// Channel slot bookkeeping of a radio
///
/// A scan needs the radio to be idle and then excludes every other channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotTable {
    max_channels: u8,
    can_scan: bool,
    attached: BTreeSet<u8>,
    scanning: bool,
}

impl SlotTable {
    /// Table for a radio with `max_channels` channels
    #[must_use]
    pub const fn new(max_channels: u8, can_scan: bool) -> Self {
        Self {
            max_channels,
            can_scan,
            attached: BTreeSet::new(),
            scanning: false,
        }
    }

    /// Claim a slot
    pub fn attach(&mut self, channel: u8, for_scan: bool) -> bool {
        if self.scanning || self.attached.contains(&channel) {
            return false;
        }

        if for_scan {
            if !self.can_scan || !self.attached.is_empty() {
                return false;
            }
            self.scanning = true;
        } else if self.attached.len() >= usize::from(self.max_channels) {
            return false;
        }

        self.attached.insert(channel);
        true
    }

    /// Release a slot
    pub fn detach(&mut self, channel: u8) -> bool {
        if !self.attached.remove(&channel) {
            return false;
        }
        self.scanning = false;
        true
    }

    /// Whether the scan slot is taken
    #[must_use]
    pub const fn is_scanning(&self) -> bool {
        self.scanning
    }

    /// Whether scan mode is supported
    #[must_use]
    pub const fn can_scan(&self) -> bool {
        self.can_scan
    }

    /// Number of channels in use
    #[must_use]
    pub fn used(&self) -> usize {
        self.attached.len()
    }

    /// Channel capacity
    #[must_use]
    pub const fn max_channels(&self) -> u8 {
        self.max_channels
    }
}

impl Default for SlotTable {
    /// Eight channels with scan support, the common USB stick layout
    fn default() -> Self {
        Self::new(8, true)
    }
}

/// Transport over an inbound frame stream and an outbound channel
///
/// Pair it with [`crate::codec::frame_stream`] to drive it from raw USB reads.
pub struct ChannelTransport<S> {
    inbound: S,
    outbound: mpsc::UnboundedSender<Bytes>,
    slots: SlotTable,
}

impl<S> ChannelTransport<S>
where
    S: Stream<Item = Bytes> + Unpin + Send,
{
    /// Create a transport from its two halves
    #[must_use]
    pub const fn new(inbound: S, outbound: mpsc::UnboundedSender<Bytes>, slots: SlotTable) -> Self {
        Self {
            inbound,
            outbound,
            slots,
        }
    }

    /// Slot bookkeeping
    #[must_use]
    pub const fn slots(&self) -> &SlotTable {
        &self.slots
    }
}

/// Far end of a [`ChannelTransport::pair`]
#[derive(Debug)]
pub struct LoopbackHandle {
    inbound: stream_mpsc::UnboundedSender<Bytes>,
    outbound: mpsc::UnboundedReceiver<Bytes>,
}

impl LoopbackHandle {
    /// Deliver a frame as if the radio sent it
    ///
    /// # Errors
    ///
    /// Returns [`AntError::Disconnected`] if the transport was dropped.
    pub fn inject(&self, frame: Bytes) -> Result<()> {
        self.inbound
            .unbounded_send(frame)
            .map_err(|_| AntError::Disconnected)
    }

    /// Next frame written by the session, if one is waiting
    pub fn try_written(&mut self) -> Option<Bytes> {
        self.outbound.try_recv().ok()
    }

    /// Wait for the next frame written by the session
    pub async fn written(&mut self) -> Option<Bytes> {
        self.outbound.recv().await
    }

    /// Drain every frame written so far
    pub fn drain_written(&mut self) -> Vec<Bytes> {
        std::iter::from_fn(|| self.try_written()).collect()
    }

    /// Close the inbound side, ending the session's run loop
    pub fn close(&self) {
        self.inbound.close_channel();
    }
}

impl ChannelTransport<stream_mpsc::UnboundedReceiver<Bytes>> {
    /// In-memory transport and the handle driving its far end
    #[must_use]
    pub fn pair(slots: SlotTable) -> (Self, LoopbackHandle) {
        let (in_tx, in_rx) = stream_mpsc::unbounded();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let transport = Self::new(in_rx, out_tx, slots);
        let handle = LoopbackHandle {
            inbound: in_tx,
            outbound: out_rx,
        };
        (transport, handle)
    }
}

#[async_trait]
impl<S> Transport for ChannelTransport<S>
where
    S: Stream<Item = Bytes> + Unpin + Send,
{
    async fn read(&mut self) -> Option<Bytes> {
        self.inbound.next().await
    }

    async fn write(&mut self, frame: Bytes) -> Result<()> {
        debug!("Writing frame: {:02x?}", frame.as_ref());
        self.outbound
            .send(frame)
            .map_err(|_| AntError::Disconnected)
    }

    fn attach(&mut self, channel: u8, for_scan: bool) -> bool {
        let granted = self.slots.attach(channel, for_scan);
        if granted {
            info!(
                "Granted channel {} ({} of {} in use, scanning: {})",
                channel,
                self.slots.used(),
                self.slots.max_channels(),
                self.slots.is_scanning()
            );
        }
        granted
    }

    fn detach(&mut self, channel: u8) -> bool {
        let released = self.slots.detach(channel);
        if released {
            info!("Released channel {}", channel);
        }
        released
    }

    fn is_scanning(&self) -> bool {
        self.slots.is_scanning()
    }

    fn can_scan(&self) -> bool {
        self.slots.can_scan()
    }
}
