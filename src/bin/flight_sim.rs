//! Host-side flight simulation.
//!
//! Wires the scheduler to logging collaborator fakes and replays a short
//! flight on virtual time: start, time-only lock, 3D lock, two full
//! transmission windows. Prints the marker timeline at the end.
//!
//! Usage: `flight-sim [slot-config-dir]`
//!
//! With a directory argument, `slotN.js` / `slotN.json` files configure
//! the five slots; otherwise all slots are empty (slot 1 sends the regular
//! beacon, slot 2 basic telemetry).

use std::cell::RefCell;
use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;

use log::info;

use wspr_copilot::caps::{
    Capabilities, ClockSpeedControl, GpsControl, RadioControl, ScriptHost, SystemControl,
    DEFAULT_SCRIPT_TIME_LIMIT_MS,
};
use wspr_copilot::config::Configuration;
use wspr_copilot::fix::{Fix3DPlus, FixTime};
use wspr_copilot::marker::{Marker, MarkerSink};
use wspr_copilot::script::{ApiUsage, RunResult};
use wspr_copilot::slot::Slot;
use wspr_copilot::store::SlotStore;
use wspr_copilot::Scheduler;

struct SimGps;

impl GpsControl for SimGps {
    fn request_new_lock(&mut self) {
        info!("gps: acquisition on");
    }
    fn cancel_request_new_lock(&mut self) {
        info!("gps: acquisition off");
    }
    fn hard_reset(&mut self) {
        info!("gps: hard reset");
    }
}

#[derive(Default)]
struct SimRadio {
    active: bool,
}

impl RadioControl for SimRadio {
    fn is_active(&self) -> bool {
        self.active
    }
    fn start_warmup(&mut self) {
        self.active = true;
        info!("radio: warmup");
    }
    fn stop(&mut self) {
        self.active = false;
        info!("radio: off");
    }
    fn send_regular_type1(&mut self, _quit_after_ms: u64) {
        info!("radio: type-1 beacon");
    }
    fn send_basic_telemetry(&mut self, _quit_after_ms: u64) {
        info!("radio: basic telemetry");
    }
    fn send_user_defined(&mut self, quit_after_ms: u64) {
        info!("radio: user-defined message (limit {quit_after_ms}ms)");
    }
}

struct SimClockSpeed;

impl ClockSpeedControl for SimClockSpeed {
    fn go_high_speed(&mut self) {
        info!("clock: 48MHz");
    }
    fn go_low_speed(&mut self) {
        info!("clock: 6MHz");
    }
}

/// Script host over the slot file store. Runs are simulated as succeeding;
/// the real VM lives in the firmware.
struct SimScriptHost {
    store: SlotStore,
}

impl ScriptHost for SimScriptHost {
    fn api_usage(&mut self, slot: Slot) -> ApiUsage {
        self.store.api_usage(slot)
    }
    fn has_msg_def(&mut self, slot: Slot) -> bool {
        self.store.has_msg_def(slot)
    }
    fn run_slot(&mut self, slot: Slot, fix: Option<&Fix3DPlus>) -> RunResult {
        info!(
            "script: {} ({} bytes, fix {})",
            slot.name(),
            self.store.script(slot).len(),
            if fix.is_some() { "yes" } else { "no" },
        );
        RunResult::succeeded()
    }
    fn time_limit_ms(&self) -> u64 {
        DEFAULT_SCRIPT_TIME_LIMIT_MS
    }
}

struct SimSystem;

impl SystemControl for SimSystem {
    fn reboot(&mut self) {
        info!("system: watchdog reboot");
    }
}

/// Shares the marker list with the scheduler-owned sink.
#[derive(Clone, Default)]
struct SharedTimeline(Rc<RefCell<Vec<(u64, Marker)>>>);

impl MarkerSink for SharedTimeline {
    fn record(&mut self, at_us: u64, marker: Marker) {
        self.0.borrow_mut().push((at_us, marker));
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Configuration {
        callsign: "KD3KDD".to_string(),
        band: "20m".to_string(),
        channel: 414,
        correction: 0,
    };
    if let Err(e) = config.ready_to_fly() {
        eprintln!("not ready to fly: {e}");
        return ExitCode::FAILURE;
    }

    let store = match std::env::args().nth(1) {
        Some(dir) => match SlotStore::load(&PathBuf::from(&dir)) {
            Ok(store) => store,
            Err(e) => {
                eprintln!("loading slot config from {dir}: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => SlotStore::empty(),
    };

    let details = config.channel_details();
    info!(
        "flying {} on {} channel {} (start minute {}, lane {})",
        config.callsign, config.band, config.channel, details.start_minute, details.lane
    );

    let timeline = SharedTimeline::default();
    let caps = Capabilities {
        gps: Box::new(SimGps),
        radio: Box::new(SimRadio::default()),
        clock_speed: Box::new(SimClockSpeed),
        script: Box::new(SimScriptHost { store }),
        system: Box::new(SimSystem),
    };

    let mut scheduler = Scheduler::new(caps, Box::new(timeline.clone()));
    scheduler.set_start_minute(details.start_minute);
    scheduler.start();

    // One second of searching, then a time-only lock, then the 3D fix.
    // 12:09:50 sits just before a minute-6 window, so the first window
    // starts quickly.
    scheduler.run_for(1_000_000);
    scheduler.on_gps_time_lock(&FixTime::from_date_time("2025-01-01 12:05:48.000").unwrap());
    scheduler.run_for(2_000_000);
    scheduler.on_gps_3d_plus_lock(&Fix3DPlus::from_date_time("2025-01-01 12:05:50.000").unwrap());

    // Two full windows plus the gap to the next one.
    scheduler.run_for(22 * 60 * 1_000_000);

    println!("\nmarker timeline:");
    for &(at_us, marker) in timeline.0.borrow().iter() {
        println!("  [{}] {}", scheduler.notional().datetime_at(at_us), marker);
    }

    let status = scheduler.status();
    println!(
        "\nstatus: running={} lockout={} gps_req={} coasts={}",
        status.running, status.in_lockout, status.req_gps_active, status.consecutive_coasts
    );

    ExitCode::SUCCESS
}
