//! Collaborator capability interfaces.
//!
//! The scheduler is dispatch-only: it holds one implementation per
//! capability, registered at construction, and keeps no state from them
//! beyond the handle. The flight application wires these to the real GPS
//! subsystem, the Si5351 transmitter, the core clock, and the script VM;
//! tests and the simulator substitute recording fakes.

use crate::fix::Fix3DPlus;
use crate::script::{ApiUsage, RunResult};
use crate::slot::Slot;

/// Script execution cap assumed when no host overrides it.
pub const DEFAULT_SCRIPT_TIME_LIMIT_MS: u64 = 2_000;

/// GPS receiver control.
pub trait GpsControl {
    /// Power the receiver and begin acquisition. The application bounds an
    /// acquisition at 20 minutes; past that it hard-resets the module and
    /// lets the watchdog reboot.
    fn request_new_lock(&mut self);
    /// Abandon an in-flight acquisition (also disarms the bound above).
    fn cancel_request_new_lock(&mut self);
    /// Power-cycle the GPS module at the hardware level.
    fn hard_reset(&mut self);
}

/// Transmitter control. The radio and the GPS UART are never used at the
/// same time; the scheduler stops the radio before requesting a fix.
pub trait RadioControl {
    fn is_active(&self) -> bool;
    /// Power up and begin frequency stabilization.
    fn start_warmup(&mut self);
    /// Key off and power down.
    fn stop(&mut self);
    /// Standard type-1 message from the current callsign/grid/power.
    fn send_regular_type1(&mut self, quit_after_ms: u64);
    /// Encoded altitude/temperature/voltage/speed telemetry.
    fn send_basic_telemetry(&mut self, quit_after_ms: u64);
    /// Script-populated user-defined message.
    fn send_user_defined(&mut self, quit_after_ms: u64);
}

/// Core clock speed. Scripts run at the high speed; everything else at the
/// low one to hold the solar power budget.
pub trait ClockSpeedControl {
    fn go_high_speed(&mut self);
    fn go_low_speed(&mut self);
}

/// Script VM integration and slot configuration access.
pub trait ScriptHost {
    fn api_usage(&mut self, slot: Slot) -> ApiUsage;
    fn has_msg_def(&mut self, slot: Slot) -> bool;
    fn run_slot(&mut self, slot: Slot, fix: Option<&Fix3DPlus>) -> RunResult;
    fn time_limit_ms(&self) -> u64;
}

/// Last-resort system actions.
pub trait SystemControl {
    /// Reboot the device, nominally by letting the watchdog starve.
    fn reboot(&mut self);
}

/// The full collaborator set, passed once at scheduler construction.
pub struct Capabilities {
    pub gps: Box<dyn GpsControl>,
    pub radio: Box<dyn RadioControl>,
    pub clock_speed: Box<dyn ClockSpeedControl>,
    pub script: Box<dyn ScriptHost>,
    pub system: Box<dyn SystemControl>,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            gps: Box::new(NullGps),
            radio: Box::new(NullRadio),
            clock_speed: Box::new(NullClockSpeed),
            script: Box::new(NullScriptHost),
            system: Box::new(NullSystem),
        }
    }
}

/// No-op GPS control.
#[derive(Debug, Default)]
pub struct NullGps;

impl GpsControl for NullGps {
    fn request_new_lock(&mut self) {}
    fn cancel_request_new_lock(&mut self) {}
    fn hard_reset(&mut self) {}
}

/// Radio that is never active and swallows every send.
#[derive(Debug, Default)]
pub struct NullRadio;

impl RadioControl for NullRadio {
    fn is_active(&self) -> bool {
        false
    }
    fn start_warmup(&mut self) {}
    fn stop(&mut self) {}
    fn send_regular_type1(&mut self, _quit_after_ms: u64) {}
    fn send_basic_telemetry(&mut self, _quit_after_ms: u64) {}
    fn send_user_defined(&mut self, _quit_after_ms: u64) {}
}

#[derive(Debug, Default)]
pub struct NullClockSpeed;

impl ClockSpeedControl for NullClockSpeed {
    fn go_high_speed(&mut self) {}
    fn go_low_speed(&mut self) {}
}

/// Host with no slot configuration: scripts use nothing, always succeed,
/// and no slot has a message definition.
#[derive(Debug, Default)]
pub struct NullScriptHost;

impl ScriptHost for NullScriptHost {
    fn api_usage(&mut self, _slot: Slot) -> ApiUsage {
        ApiUsage::default()
    }
    fn has_msg_def(&mut self, _slot: Slot) -> bool {
        false
    }
    fn run_slot(&mut self, _slot: Slot, _fix: Option<&Fix3DPlus>) -> RunResult {
        RunResult::succeeded()
    }
    fn time_limit_ms(&self) -> u64 {
        DEFAULT_SCRIPT_TIME_LIMIT_MS
    }
}

#[derive(Debug, Default)]
pub struct NullSystem;

impl SystemControl for NullSystem {
    fn reboot(&mut self) {}
}
