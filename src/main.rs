//! ISS receiver simulation
//!
//! Runs the receiver against a simulated RFM69 and ISS in virtual time.
//! Usage: `iss-receiver [config.json]`

use anyhow::{Context, Result};
use iss_receiver::{
    spawn_interrupt_handler, ChannelTable, Command, ConfigurationManager, IssReceiver, MockRfm69,
    RadioDriver, ReceiverConfig, ReceptionEvent, SimulatedTransmitter,
};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Virtual time covered by one run
const SIMULATION_MS: u64 = 300_000;

/// Control-loop period in virtual time
const LOOP_STEP_MS: u64 = 50;

/// Window in which the simulated ISS is out of reach
const OUTAGE_MS: (u64, u64) = (120_000, 200_000);

fn main() -> Result<()> {
    let manager = match std::env::args().nth(1) {
        Some(path) => ConfigurationManager::from_file(&path)
            .with_context(|| format!("loading configuration from {}", path))?,
        None => ConfigurationManager::new(),
    };
    let config = manager.get_config().clone();

    init_logging(&config);
    for warning in manager.validate_config(&config).warnings {
        warn!(target: "setup", "{}", warning);
    }

    if let Err(err) = run(&config) {
        error!(target: "setup", "{:#}", err);
        return Err(err);
    }
    Ok(())
}

fn init_logging(config: &ReceiverConfig) {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

fn run(config: &ReceiverConfig) -> Result<()> {
    let table = ChannelTable::compiled();
    info!(target: "setup", region = table.region, channels = table.len(), "ISS receiver starting");

    let radio = Arc::new(RadioDriver::new(MockRfm69::new(), table));
    let mut receiver =
        IssReceiver::from_config(Arc::clone(&radio), config).context("invalid receiver configuration")?;
    receiver
        .initialize()
        .context("transceiver did not come up")?;
    radio.rc_calibration().context("RC calibration")?;

    let interrupts =
        spawn_interrupt_handler(Arc::clone(&radio)).context("starting interrupt dispatcher")?;

    let mut transmitter = SimulatedTransmitter::new(table, table.len() / 2, 1_000);
    transmitter.set_loss_probability(0.05);

    let report_interval_ms = config.report_interval_s.saturating_mul(1000);
    let mut next_report_ms = report_interval_ms;
    let mut outage_scheduled = false;
    let mut now = 0u64;

    while now < SIMULATION_MS {
        if !outage_scheduled && now >= OUTAGE_MS.0 {
            transmitter.silence_until(OUTAGE_MS.1);
            outage_scheduled = true;
            info!(target: "setup", until_ms = OUTAGE_MS.1, "simulated ISS out of range");
        }

        if radio.critical_section(|chip| transmitter.poll(now, chip)) == Some(true) {
            interrupts.trigger();
            // Let the dispatcher drain the FIFO before the loop looks
            thread::sleep(Duration::from_millis(1));
        }

        match receiver.poll(now) {
            Ok(ReceptionEvent::Success(_)) => {
                if let Some(report) = receiver.last_report() {
                    info!(target: "iss", "{}", report);
                    debug!(target: "iss", "{}", serde_json::to_string(report)?);
                }
            }
            Ok(ReceptionEvent::CrcError) | Ok(ReceptionEvent::None) => {}
            Err(err) if err.is_fatal() => return Err(err).context("receiver failed"),
            Err(err) => warn!(target: "rfm", error = %err, "poll failed"),
        }

        if report_interval_ms > 0 && now >= next_report_ms {
            let snapshot = receiver.snapshot(now);
            info!(target: "rfm", "statistics {}", serde_json::to_string(&snapshot)?);
            next_report_ms += report_interval_ms;
        }

        now += LOOP_STEP_MS;
    }

    let chip_temperature = receiver.chip_temperature().context("reading chip temperature")?;
    info!(target: "setup", chip_temperature, "transceiver temperature");

    receiver.handle_command(Command::NewDay);

    let captured = interrupts.shutdown();
    receiver.shutdown()?;

    let snapshot = receiver.snapshot(now);
    info!(
        target: "setup",
        bursts = transmitter.bursts_sent(),
        captured,
        received = snapshot.packets_received,
        blackouts = snapshot.blackouts,
        "simulation finished"
    );
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    println!("{}", serde_json::to_string_pretty(receiver.measurements())?);

    Ok(())
}
