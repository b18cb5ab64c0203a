use std::time::Duration;

use antlers::{
    profiles::fitness_equipment::Command, ChannelTransport, FitnessEquipment, Profile, Result,
    SensorEvent, Session, SlotTable, Telemetry, Transport,
};
use tokio::{sync::mpsc, time::timeout};
use tracing::{error, info, warn};

mod sim;

use sim::{broadcast, SimulatedRadio};

const CHANNEL: u8 = 1;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    info!("🚴 Antlers Trainer Control Example");

    let (transport, radio) = ChannelTransport::pair(SlotTable::default());

    // A smart trainer alternating general and trainer data pages, in use
    let trainer = SimulatedRadio::new(radio, 777, FitnessEquipment::DEVICE_TYPE);
    tokio::spawn(trainer.run(24, |tick| {
        let event = u8::try_from(tick % 256).unwrap_or_default();
        let page = if tick % 2 == 0 {
            // bike trainer, 0.25 s ticks, 8.5 m/s, no heart rate, in use
            let [s0, s1] = 8500u16.to_le_bytes();
            [0x10, 25, event, event, s0, s1, 0xFF, 0x30]
        } else {
            let accumulated = u16::try_from(tick * 100 % 65536).unwrap_or_default();
            let [a0, a1] = accumulated.to_le_bytes();
            // 200 W, in use
            [0x19, event, 88, a0, a1, 0xC8, 0x00, 0x30]
        };
        vec![broadcast(CHANNEL, page)]
    }));

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut session = Session::new(transport, tx);

    session
        .attach(FitnessEquipment, FitnessEquipment::attach_config(CHANNEL, 777))
        .await?;

    // Process frames until the handshake finishes
    loop {
        match rx.try_recv() {
            Ok(SensorEvent::Attached { .. }) => break,
            Ok(_) => {}
            Err(_) => {
                let Some(frame) = session.transport_mut().read().await else {
                    error!("Radio went away during the handshake");
                    return Ok(());
                };
                session.process_frame(frame).await?;
            }
        }
    }
    info!("✅ Trainer connected");

    let commands = [
        Command::UserConfiguration {
            user_weight: 75.0,
            bike_weight: 9.0,
            wheel_diameter: 0.7,
            gear_ratio: 2.5,
        },
        Command::TargetPower(200.0),
        Command::TrackResistance {
            slope: 3.5,
            rolling_resistance: 0.004,
        },
    ];

    for command in commands {
        let page = command.to_page()?;
        session
            .send(
                CHANNEL,
                page,
                Some(Box::new(move |ok: bool| {
                    if ok {
                        info!("Trainer acknowledged {:?}", command);
                    } else {
                        warn!("Trainer did not acknowledge {:?}", command);
                    }
                })),
            )
            .await?;
    }

    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if let SensorEvent::Telemetry {
                telemetry: Telemetry::FitnessEquipment(state),
                ..
            } = event
            {
                println!(
                    "⚙️  {:?} | {:5.1} s | {:4.1} m/s | {:4} W | {:3} rpm",
                    state.state,
                    state.elapsed_time.unwrap_or_default(),
                    state.real_speed.or(state.virtual_speed).unwrap_or_default(),
                    state.instantaneous_power.unwrap_or_default(),
                    state.cadence.unwrap_or_default(),
                );
            }
        }
    });

    if let Ok(result) = timeout(Duration::from_secs(10), session.run()).await {
        result?;
    }

    drop(session);
    if printer.await.is_err() {
        warn!("Printer task panicked");
    }

    Ok(())
}
