use std::time::Duration;

use antlers::{
    profiles::HeartRate, ChannelTransport, Profile, Result, SensorEvent, Session, SlotTable,
    Telemetry, ANT_PLUS_NETWORK_KEY,
};
use tokio::{sync::mpsc, time::timeout};
use tracing::{info, warn};

mod sim;

use sim::{broadcast, SimulatedRadio};

const CHANNEL: u8 = 0;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    info!("❤️ Antlers Heart Rate Monitor Example");

    let (transport, radio) = ChannelTransport::pair(SlotTable::default());

    // A strap sending page 4 with a toggling page number, ~75 bpm
    let strap = SimulatedRadio::new(radio, 4242, HeartRate::DEVICE_TYPE);
    tokio::spawn(strap.run(24, |tick| {
        let beats = u8::try_from(tick % 256).unwrap_or_default();
        let beat_time = u16::try_from(tick * 820 % 65536).unwrap_or_default();
        let [t0, t1] = beat_time.to_le_bytes();
        let toggle = if (tick / 4) % 2 == 0 { 0x00 } else { 0x80 };
        let rate = 72 + u8::try_from(tick % 6).unwrap_or_default();
        vec![broadcast(CHANNEL, [toggle | 0x04, 0x00, 0x00, 0x00, t0, t1, beats, rate])]
    }));

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut session = Session::new(transport, tx);

    session.initialize(&ANT_PLUS_NETWORK_KEY).await?;

    // Device id 0 pairs with the first strap found
    session
        .attach(HeartRate, HeartRate::attach_config(CHANNEL, 0))
        .await?;

    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                SensorEvent::Attached { channel } => info!("✅ Channel {channel} open"),
                SensorEvent::Detached { channel } => info!("👋 Channel {channel} detached"),
                SensorEvent::EventData {
                    channel,
                    message,
                    code,
                } => warn!("Channel {channel} event {message:#04x}/{code:#04x}"),
                SensorEvent::Telemetry {
                    telemetry: Telemetry::HeartRate(state),
                    ..
                } => {
                    println!(
                        "💓 device {:5} | {:3} bpm | beats {:4} | rr {:>8}",
                        state.device_id,
                        state.computed_heart_rate.unwrap_or_default(),
                        state.beat_count.unwrap_or_default(),
                        state
                            .rr_interval
                            .map_or_else(|| "-".to_string(), |rr| format!("{rr:.0} ms")),
                    );
                }
                SensorEvent::Telemetry { .. } => {}
            }
        }
    });

    // Listen for a while, then close the channel and let the radio confirm
    if let Ok(result) = timeout(Duration::from_secs(4), session.run()).await {
        result?;
    }
    session.detach(CHANNEL).await?;
    session.run().await?;

    drop(session);
    if printer.await.is_err() {
        warn!("Printer task panicked");
    }

    Ok(())
}
