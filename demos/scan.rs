use antlers::{
    ChannelTransport, HeartRate, Profile, Result, SensorEvent, Session, SlotTable, Telemetry,
    ANT_PLUS_FREQUENCY, SCAN_CHANNEL,
};
use tracing::info;

mod sim;

use sim::{scan_broadcast, SimulatedRadio};

/// (device id, resting heart rate, rssi)
const STRAPS: [(u16, u8, i8); 3] = [(1001, 58, -48), (2002, 71, -63), (3003, 96, -81)];

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    info!("📡 Antlers Scan Example");

    let (transport, radio) = ChannelTransport::pair(SlotTable::default());

    // Three straps in range, plus a power meter the heart rate scan ignores
    let room = SimulatedRadio::new(radio, 0, 0);
    tokio::spawn(room.run(16, |tick| {
        let beats = u8::try_from(tick % 256).unwrap_or_default();
        let mut frames: Vec<_> = STRAPS
            .iter()
            .map(|&(id, rate, rssi)| {
                let page = [0, 0, 0, 0, 0, 0, beats, rate];
                scan_broadcast(page, id, HeartRate::DEVICE_TYPE, rssi)
            })
            .collect();
        frames.push(scan_broadcast([0x10, beats, 0xFF, 90, 0, 0, 200, 0], 4004, 0x0B, -55));
        frames
    }));

    let mut session = Session::new(transport, Vec::<SensorEvent>::new());
    session.scan(HeartRate, ANT_PLUS_FREQUENCY).await?;
    session.run().await?;

    let updates = session
        .observer()
        .iter()
        .filter(|e| matches!(e, SensorEvent::Telemetry { .. }))
        .count();
    info!("Received {} telemetry updates", updates);

    for telemetry in session.telemetry(SCAN_CHANNEL) {
        if let Telemetry::HeartRate(state) = &telemetry {
            println!(
                "🫀 device {:5} | {:3} bpm | {} beats",
                state.device_id,
                state.computed_heart_rate.unwrap_or_default(),
                state.beat_count.unwrap_or_default()
            );
        }
    }

    if let Some(SensorEvent::Telemetry { signal, telemetry, .. }) = session.observer().last() {
        let json = serde_json::to_string_pretty(telemetry).unwrap_or_default();
        println!("Last update (signal {signal:?}):\n{json}");
    }

    Ok(())
}
