//! The window scheduler.
//!
//! Event-driven state machine that turns GPS time/fix events into a timed
//! 10-minute transmission window: warm the radio, lock the schedule, run
//! slot scripts one slot ahead, key each transmission on its UTC minute
//! boundary, then hand the antenna back to the GPS for reacquisition.
//!
//! # Operational model
//!
//! Two primary states while running:
//!
//! - **unlocked** — no window is executing. GPS data applies immediately
//!   and the schedule can be rebuilt any number of times.
//! - **locked** (lockout) — a window is executing. Nothing may disturb it;
//!   new GPS data is cached and merged when the lockout ends.
//!
//! A time-only lock makes the device *coast*: wait as long as possible for
//! a 3D fix, then run the window on time alone. Coasting is allowed twice
//! in a row; the third consecutive coast gives up, hard-resets the GPS and
//! reboots through the watchdog.
//!
//! All work happens on one logical thread. Timer callbacks run to
//! completion; GPS events are accepted only between them.

use log::{debug, info, warn};

use crate::caps::Capabilities;
use crate::fix::{Fix3DPlus, FixTime};
use crate::marker::{Marker, MarkerSink, NullMarkerSink};
use crate::notional::NotionalTime;
use crate::slot::{calculate_slot_behavior, DefaultPayload, MsgSend, Slot, SlotState};
use crate::timer::TimerWheel;
use crate::window::{self, WINDOW_PERIOD_US};

/// How long before the window start the coast timer aims to fire, leaving
/// a last stretch of GPS hunting before giving up on a 3D fix. Empirical.
pub const COAST_LEAD_US: u64 = 7 * 1_000_000;

/// Wanted radio warmup lead before the window start.
const WARMUP_LEAD_US: u64 = 30 * 1_000_000;

/// Safety margin on top of the script time limit for the pre-window run.
const JS_BUDGET_FUDGE_US: u64 = 1_000_000;

/// One slot, two UTC minutes.
const SLOT_PERIOD_US: u64 = 2 * 60 * 1_000_000;

/// Slot 5 transmission bound, so the window ends before GPS reacquisition.
const SLOT5_QUIT_AFTER_MS: u64 = 60 * 1_000;

/// Consecutive windows that may run on time alone.
pub const MAX_CONSECUTIVE_COASTS: u8 = 2;

/// The scheduler's timers, one wheel slot each. Arm order within a window
/// preparation is load-bearing: timers sharing an expiry fire first-armed
/// first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum WindowTimer {
    Coast,
    TxWarmup,
    LockoutStart,
    Period0,
    Period1,
    Period2,
    Period3,
    Period4,
    Period5,
    TxDisableGpsEnable,
    LockoutEnd,
}

impl WindowTimer {
    const COUNT: usize = 11;

    const ALL: [WindowTimer; WindowTimer::COUNT] = [
        WindowTimer::Coast,
        WindowTimer::TxWarmup,
        WindowTimer::LockoutStart,
        WindowTimer::Period0,
        WindowTimer::Period1,
        WindowTimer::Period2,
        WindowTimer::Period3,
        WindowTimer::Period4,
        WindowTimer::Period5,
        WindowTimer::TxDisableGpsEnable,
        WindowTimer::LockoutEnd,
    ];

    /// Everything except the coast timer, which outlives window preparation.
    const WINDOW_SET: [WindowTimer; WindowTimer::COUNT - 1] = [
        WindowTimer::TxWarmup,
        WindowTimer::LockoutStart,
        WindowTimer::Period0,
        WindowTimer::Period1,
        WindowTimer::Period2,
        WindowTimer::Period3,
        WindowTimer::Period4,
        WindowTimer::Period5,
        WindowTimer::TxDisableGpsEnable,
        WindowTimer::LockoutEnd,
    ];

    fn index(self) -> usize {
        self as usize
    }

    fn from_index(index: usize) -> WindowTimer {
        WindowTimer::ALL[index]
    }

    fn period(index: usize) -> WindowTimer {
        [
            WindowTimer::Period0,
            WindowTimer::Period1,
            WindowTimer::Period2,
            WindowTimer::Period3,
            WindowTimer::Period4,
            WindowTimer::Period5,
        ][index]
    }

    fn name(self) -> &'static str {
        match self {
            WindowTimer::Coast => "TIMER_COAST",
            WindowTimer::TxWarmup => "TIMER_TX_WARMUP",
            WindowTimer::LockoutStart => "TIMER_SCHEDULE_LOCK_OUT_START",
            WindowTimer::Period0 => "TIMER_PERIOD0_START",
            WindowTimer::Period1 => "TIMER_PERIOD1_START",
            WindowTimer::Period2 => "TIMER_PERIOD2_START",
            WindowTimer::Period3 => "TIMER_PERIOD3_START",
            WindowTimer::Period4 => "TIMER_PERIOD4_START",
            WindowTimer::Period5 => "TIMER_PERIOD5_START",
            WindowTimer::TxDisableGpsEnable => "TIMER_TX_DISABLE_GPS_ENABLE",
            WindowTimer::LockoutEnd => "TIMER_SCHEDULE_LOCK_OUT_END",
        }
    }
}

/// GPS data in use by the schedule. A zero timestamp marks an absent half.
#[derive(Clone, Debug, Default)]
struct ScheduleData {
    fix_3d: Fix3DPlus,
    time_at_fix_3d_set_us: u64,
    fix_time: FixTime,
    time_at_fix_time_set_us: u64,
}

impl ScheduleData {
    fn has_3d(&self) -> bool {
        self.time_at_fix_3d_set_us != 0
    }

    fn has_time(&self) -> bool {
        self.time_at_fix_time_set_us != 0
    }
}

/// Point-in-time view for the shell's status display.
#[derive(Clone, Debug)]
pub struct SchedulerStatus {
    pub running: bool,
    pub in_lockout: bool,
    pub req_gps_active: bool,
    pub time_synced: bool,
    pub consecutive_coasts: u8,
    pub coast_at_us: Option<u64>,
    /// Start of the upcoming window, or of the executing one during lockout.
    pub window_start_us: Option<u64>,
    pub timers: Vec<TimerStatus>,
}

#[derive(Clone, Copy, Debug)]
pub struct TimerStatus {
    pub name: &'static str,
    pub pending: bool,
    pub expiry_us: Option<u64>,
}

pub struct Scheduler {
    caps: Capabilities,
    markers: Box<dyn MarkerSink>,

    timers: TimerWheel<{ WindowTimer::COUNT }>,
    notional: NotionalTime,
    start_minute: u8,

    running: bool,
    req_gps_active: bool,
    in_lockout: bool,
    time_synced: bool,
    consecutive_coasts: u8,

    /// Schedule data in use outside lockout.
    active: ScheduleData,
    /// GPS events that arrived during lockout, merged at lockout end.
    cache: ScheduleData,

    slots: [SlotState; Slot::COUNT],
}

impl Scheduler {
    pub fn new(caps: Capabilities, markers: Box<dyn MarkerSink>) -> Self {
        Self {
            caps,
            markers,
            timers: TimerWheel::new(),
            notional: NotionalTime::new(),
            start_minute: 0,
            running: false,
            req_gps_active: false,
            in_lockout: false,
            time_synced: false,
            consecutive_coasts: 0,
            active: ScheduleData::default(),
            cache: ScheduleData::default(),
            slots: [SlotState::default(); Slot::COUNT],
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(Capabilities::default(), Box::new(NullMarkerSink))
    }

    /// Units digit of the window start minute: 0/2/4/6/8, from the flight
    /// channel. Set once at startup.
    pub fn set_start_minute(&mut self, start_minute: u8) {
        debug_assert!(start_minute < 10 && start_minute % 2 == 0);
        self.start_minute = start_minute;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn now_us(&self) -> u64 {
        self.timers.now_us()
    }

    pub fn notional(&self) -> &NotionalTime {
        &self.notional
    }

    pub fn next_timer_expiry(&self) -> Option<u64> {
        self.timers.next_expiry()
    }

    /// Service every timer due up to `target_us`, in expiry order, then
    /// advance the clock to `target_us`. Timers armed by callbacks inside
    /// the pump are serviced in the same pass if they fall due.
    pub fn run_until(&mut self, target_us: u64) {
        while let Some((index, _expiry_us)) = self.timers.pop_due(target_us) {
            self.dispatch(WindowTimer::from_index(index));
        }
        self.timers.advance_to(target_us);
    }

    pub fn run_for(&mut self, duration_us: u64) {
        self.run_until(self.timers.now_us() + duration_us);
    }

    /////////////////////////////////////////////////////////////////
    // Start / Stop
    /////////////////////////////////////////////////////////////////

    /// Idempotent.
    pub fn start(&mut self) {
        if self.running {
            return;
        }

        self.mark(Marker::Start);
        self.running = true;

        self.request_new_gps_lock();
    }

    /// Cancel every pending timer, clear schedule data, end the lockout.
    /// The consecutive-coast count survives a stop. Idempotent, and safe
    /// to call from any callback.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }

        self.mark(Marker::Stop);

        self.running = false;
        self.req_gps_active = false;
        self.active = ScheduleData::default();
        self.cache = ScheduleData::default();
        self.in_lockout = false;
        self.timers.cancel_all();
    }

    fn request_new_gps_lock(&mut self) {
        self.mark(Marker::ReqNewGpsLock);
        self.req_gps_active = true;
        self.caps.gps.request_new_lock();
    }

    fn cancel_request_new_gps_lock(&mut self) {
        self.mark(Marker::CancelReqNewGpsLock);
        self.req_gps_active = false;
        self.caps.gps.cancel_request_new_lock();
    }

    /////////////////////////////////////////////////////////////////
    // GPS events
    /////////////////////////////////////////////////////////////////

    pub fn on_gps_3d_plus_lock(&mut self, fix: &Fix3DPlus) {
        if !self.running {
            return;
        }

        let now_us = self.timers.now_us();

        match (self.req_gps_active, self.in_lockout) {
            (true, false) => {
                self.mark(Marker::OnGpsLock3dPlusApplied);

                self.active.fix_3d = fix.clone();
                self.active.time_at_fix_3d_set_us = now_us;
                self.consecutive_coasts = 0;

                let fix_time = self.active.fix_3d.time.clone();
                self.apply_time_and_update_schedule(&fix_time, now_us, true);
            }
            (true, true) => {
                self.mark(Marker::OnGpsLock3dPlusCached);

                self.cache.fix_3d = fix.clone();
                self.cache.time_at_fix_3d_set_us = now_us;
            }
            (false, false) => {
                // unsolicited
                self.mark(Marker::OnGpsLock3dPlusReqNoLockoutNo);
            }
            (false, true) => {
                // unsolicited
                self.mark(Marker::OnGpsLock3dPlusReqNoLockoutOn);
            }
        }
    }

    pub fn on_gps_time_lock(&mut self, fix: &FixTime) {
        if !self.running {
            return;
        }

        let now_us = self.timers.now_us();

        match (self.req_gps_active, self.in_lockout) {
            (true, false) => {
                self.mark(Marker::OnGpsLockTimeApplied);

                self.active.fix_time = fix.clone();
                self.active.time_at_fix_time_set_us = now_us;

                if self.active.has_3d() {
                    // 3D wins until lockout end: absorb for drift
                    // measurement, leave the schedule alone.
                    self.sync_notional(fix, now_us);
                } else {
                    let fix = fix.clone();
                    self.apply_time_and_update_schedule(&fix, now_us, false);
                }
            }
            (true, true) => {
                self.mark(Marker::OnGpsLockTimeCached);

                self.cache.fix_time = fix.clone();
                self.cache.time_at_fix_time_set_us = now_us;
            }
            (false, false) => {
                self.mark(Marker::OnGpsLockTimeReqNoLockoutNo);
            }
            (false, true) => {
                self.mark(Marker::OnGpsLockTimeReqNoLockoutOn);
            }
        }
    }

    /////////////////////////////////////////////////////////////////
    // Schedule tasks
    /////////////////////////////////////////////////////////////////

    fn apply_time_and_update_schedule(
        &mut self,
        fix_time: &FixTime,
        time_at_set_us: u64,
        have_gps_lock: bool,
    ) {
        self.mark(Marker::ApplyTimeAndUpdateSchedule);

        self.sync_notional(fix_time, time_at_set_us);

        if have_gps_lock {
            self.mark(Marker::CoastCanceled);
            self.timers.cancel(WindowTimer::Coast.index());

            self.cancel_request_new_gps_lock();

            self.update_schedule(true);
        } else {
            // Trigger coast as late as possible, to give the 3D fix the
            // maximum time to arrive before giving up on it.
            let now_us = self.timers.now_us();
            let window_start_us = self.time_at_next_window_start_us(now_us);
            let coast_at_us = window_start_us
                .saturating_sub(COAST_LEAD_US)
                .max(now_us + 1);
            self.timers.arm_at(WindowTimer::Coast.index(), coast_at_us);

            self.mark(Marker::CoastScheduled);
            debug!(
                "coast at {} for window at {}",
                self.notional.datetime_at(coast_at_us),
                self.notional.datetime_at(window_start_us),
            );
        }
    }

    fn on_coast_triggered(&mut self) {
        self.mark(Marker::CoastTriggered);

        self.consecutive_coasts = self.consecutive_coasts.saturating_add(1);
        if self.consecutive_coasts > MAX_CONSECUTIVE_COASTS {
            warn!(
                "no 3D fix for {} consecutive windows; hard-resetting GPS and rebooting",
                self.consecutive_coasts
            );
            self.caps.gps.hard_reset();
            self.caps.system.reboot();
            self.stop();
            return;
        }

        self.cancel_request_new_gps_lock();
        self.update_schedule(false);
    }

    fn update_schedule(&mut self, have_gps_lock: bool) {
        self.mark(Marker::UpdateSchedule);

        let now_us = self.timers.now_us();
        let window_start_us = self.time_at_next_window_start_us(now_us);

        info!(
            "window at {} (now {}, gps lock {})",
            self.notional.datetime_at(window_start_us),
            self.notional.datetime_at(now_us),
            have_gps_lock,
        );

        self.prepare_window_slot_behavior(have_gps_lock);
        self.prepare_window_schedule(now_us, window_start_us);
    }

    /// Monotonic instant of the next window start, from notional time.
    fn time_at_next_window_start_us(&self, now_us: u64) -> u64 {
        let parts = self.notional.parts_at(now_us);
        window::time_at_window_start_us(
            self.start_minute,
            parts.minute,
            parts.second,
            parts.us,
            now_us,
        )
    }

    /////////////////////////////////////////////////////////////////
    // Slot behavior
    /////////////////////////////////////////////////////////////////

    fn prepare_window_slot_behavior(&mut self, have_gps_lock: bool) {
        self.mark(Marker::PrepareWindowSlotBehaviorStart);

        for slot in Slot::ALL {
            let usage = self.caps.script.api_usage(slot);
            let has_msg_def = self.caps.script.has_msg_def(slot);
            let behavior =
                calculate_slot_behavior(slot.default_payload(), have_gps_lock, usage, has_msg_def);

            debug!(
                "{}: gps={} usesGps={} usesMsg={} hasDef={} -> runJs={} msgSend={:?}",
                slot.name(),
                have_gps_lock,
                usage.gps,
                usage.msg,
                has_msg_def,
                behavior.run_js,
                behavior.msg_send,
            );

            self.slots[slot.index()] = SlotState {
                behavior,
                js_ran_ok: false,
            };
        }

        self.mark(Marker::PrepareWindowSlotBehaviorEnd);
    }

    fn slot_will_transmit(&self, slot: Slot) -> bool {
        self.slots[slot.index()].behavior.msg_send != MsgSend::None
    }

    /////////////////////////////////////////////////////////////////
    // Window schedule
    /////////////////////////////////////////////////////////////////

    fn prepare_window_schedule(&mut self, now_us: u64, window_start_us: u64) {
        self.mark(Marker::PrepareWindowScheduleStart);

        for timer in WindowTimer::WINDOW_SET {
            self.timers.cancel(timer.index());
        }

        let avail_pre_window_us = window_start_us.saturating_sub(now_us);

        // Warmup starts outside the lockout's protection; the lockout
        // covers the sensitive part. Skipped entirely when nothing will
        // transmit, which also keeps the radio off across a no-TX window.
        let do_warmup = Slot::ALL.iter().any(|&s| self.slot_will_transmit(s));
        let warmup_at_us = window_start_us - WARMUP_LEAD_US.min(avail_pre_window_us);

        // The pre-window script run must finish before the window starts.
        let js_budget_us = self.caps.script.time_limit_ms() * 1_000 + JS_BUDGET_FUDGE_US;
        let lockout_start_at_us = window_start_us - js_budget_us.min(avail_pre_window_us);

        if do_warmup {
            self.timers
                .arm_at(WindowTimer::TxWarmup.index(), warmup_at_us);
            debug!(
                "{} at {}",
                WindowTimer::TxWarmup.name(),
                self.notional.datetime_at(warmup_at_us)
            );
        } else {
            debug!("no transmissions this window, warmup not scheduled");
        }

        self.timers
            .arm_at(WindowTimer::LockoutStart.index(), lockout_start_at_us);

        // GPS re-enable starts out at the window start so that it beats
        // period 1 when no period transmits; armed before the periods so
        // equal-expiry ordering puts it first in that case.
        self.timers
            .arm_at(WindowTimer::TxDisableGpsEnable.index(), window_start_us);

        // Period 0 is the pre-window script run, directly after lockout
        // start. Periods 1..=5 sit on the slot boundaries.
        self.timers
            .arm_at(WindowTimer::Period0.index(), lockout_start_at_us);
        for i in 1..=5usize {
            self.timers.arm_at(
                WindowTimer::period(i).index(),
                window_start_us + (i as u64 - 1) * SLOT_PERIOD_US,
            );
        }

        // Move GPS re-enable onto the start of the last transmitting
        // period. Re-arming makes it fire directly after that period's own
        // action, which is as early as the radio can be surrendered.
        let mut last_tx_at_us = None;
        for slot in Slot::ALL {
            if self.slot_will_transmit(slot) {
                last_tx_at_us = Some(window_start_us + slot.index() as u64 * SLOT_PERIOD_US);
            }
        }
        if let Some(at_us) = last_tx_at_us {
            self.timers
                .arm_at(WindowTimer::TxDisableGpsEnable.index(), at_us);
        }

        // Lockout end shares period 5's start and is armed after it.
        self.timers.arm_at(
            WindowTimer::LockoutEnd.index(),
            window_start_us + 4 * SLOT_PERIOD_US,
        );

        debug!(
            "window {} scheduled: lockout {} warmup {} avail {}us",
            self.notional.datetime_at(window_start_us),
            self.notional.datetime_at(lockout_start_at_us),
            if do_warmup { "yes" } else { "no" },
            avail_pre_window_us,
        );

        self.mark(Marker::PrepareWindowScheduleEnd);
    }

    /////////////////////////////////////////////////////////////////
    // Timer dispatch
    /////////////////////////////////////////////////////////////////

    fn dispatch(&mut self, timer: WindowTimer) {
        match timer {
            WindowTimer::Coast => self.on_coast_triggered(),
            WindowTimer::TxWarmup => {
                self.mark(Marker::TxWarmup);
                self.caps.radio.start_warmup();
            }
            WindowTimer::LockoutStart => {
                self.mark(Marker::ScheduleLockOutStart);
                self.in_lockout = true;
            }
            WindowTimer::LockoutEnd => {
                self.mark(Marker::ScheduleLockOutEnd);
                self.in_lockout = false;
                self.apply_cache();
            }
            WindowTimer::TxDisableGpsEnable => {
                self.mark(Marker::TxDisableGpsEnable);
                // radio off before the GPS goes hunting; never both
                self.caps.radio.stop();
                self.request_new_gps_lock();
            }
            WindowTimer::Period0 => {
                self.mark(Marker::Period0Start);
                self.do_period(None, Some(Slot::Slot1), 0);
                self.mark(Marker::Period0End);
            }
            WindowTimer::Period1 => {
                self.mark(Marker::Period1Start);
                self.do_period(Some(Slot::Slot1), Some(Slot::Slot2), 0);
                self.mark(Marker::Period1End);
            }
            WindowTimer::Period2 => {
                self.mark(Marker::Period2Start);
                self.do_period(Some(Slot::Slot2), Some(Slot::Slot3), 0);
                self.mark(Marker::Period2End);
            }
            WindowTimer::Period3 => {
                self.mark(Marker::Period3Start);
                self.do_period(Some(Slot::Slot3), Some(Slot::Slot4), 0);
                self.mark(Marker::Period3End);
            }
            WindowTimer::Period4 => {
                self.mark(Marker::Period4Start);
                self.do_period(Some(Slot::Slot4), Some(Slot::Slot5), 0);
                self.mark(Marker::Period4End);
            }
            WindowTimer::Period5 => {
                self.mark(Marker::Period5Start);
                self.do_period(Some(Slot::Slot5), None, SLOT5_QUIT_AFTER_MS);
                self.mark(Marker::Period5End);
            }
        }
    }

    /////////////////////////////////////////////////////////////////
    // Per-slot action
    /////////////////////////////////////////////////////////////////

    /// Send this slot's message (if any), then prefetch the next slot's
    /// script so its result is ready when that slot transmits.
    ///
    /// A custom message goes out only if its script ran ok; a bad script
    /// degrades to the slot default where one exists and is sendable.
    fn do_period(&mut self, this: Option<Slot>, next: Option<Slot>, quit_after_ms: u64) {
        if let Some(slot) = this {
            let state = self.slots[slot.index()];
            let behavior = state.behavior;

            if behavior.msg_send == MsgSend::None {
                self.mark(Marker::SendNoMsgNone);
            } else {
                let mut send_default = behavior.msg_send == MsgSend::Default;

                if behavior.msg_send == MsgSend::Custom {
                    if state.js_ran_ok {
                        self.mark(Marker::SendCustomMessage);
                        self.caps.radio.send_user_defined(quit_after_ms);
                    } else {
                        send_default = true;
                    }
                }

                if send_default {
                    if !behavior.has_default {
                        self.mark(Marker::SendNoMsgBadJsNoDefault);
                    } else if !behavior.can_send_default {
                        // a custom message can be planned without a lock,
                        // but the default payloads all need a position
                        self.mark(Marker::SendNoMsgBadJsNoAbleDefault);
                    } else {
                        match behavior.default_payload {
                            DefaultPayload::RegularType1 => {
                                self.mark(Marker::SendRegularType1);
                                self.caps.radio.send_regular_type1(quit_after_ms);
                            }
                            DefaultPayload::BasicTelemetry => {
                                self.mark(Marker::SendBasicTelemetry);
                                self.caps.radio.send_basic_telemetry(quit_after_ms);
                            }
                            DefaultPayload::None => {}
                        }
                    }
                }
            }
        }

        if let Some(next_slot) = next {
            if self.slots[next_slot.index()].behavior.run_js {
                self.mark(Marker::JsExec);
                let ok = self.run_slot_script(next_slot);
                self.slots[next_slot.index()].js_ran_ok = ok;
            } else {
                self.mark(Marker::JsNoExec);
                self.slots[next_slot.index()].js_ran_ok = false;
            }
        }
    }

    /// Run a slot script under the radio/clock discipline: radio off while
    /// the script runs, CPU at high speed, then back down and re-warm.
    fn run_slot_script(&mut self, slot: Slot) -> bool {
        let radio_active = self.caps.radio.is_active();
        if radio_active {
            self.caps.radio.stop();
        }

        self.caps.clock_speed.go_high_speed();

        let fix = self.active.has_3d().then_some(&self.active.fix_3d);
        let result = self.caps.script.run_slot(slot, fix);

        debug!(
            "{} script: ok={} parse {}ms run {}ms heap {}/{}",
            slot.name(),
            result.ok,
            result.parse_ms,
            result.run_ms,
            result.run_mem_used,
            result.run_mem_avail,
        );

        self.caps.clock_speed.go_low_speed();

        if radio_active {
            self.caps.radio.start_warmup();
        }

        result.ok
    }

    /////////////////////////////////////////////////////////////////
    // Cache merge
    /////////////////////////////////////////////////////////////////

    /// Merge GPS data cached during the lockout into the active data and
    /// schedule the next window from the best available: fresh 3D, else
    /// fresh time, else whichever stale half has the newer timestamp.
    ///
    /// The cache is applied after a completed window, so the active data
    /// is guaranteed to hold something; the cache may hold nothing.
    fn apply_cache(&mut self) {
        let fix_3d_fresh = self.cache.has_3d();
        if fix_3d_fresh {
            self.active.fix_3d = self.cache.fix_3d.clone();
            self.active.time_at_fix_3d_set_us = self.cache.time_at_fix_3d_set_us;
        }

        let fix_time_fresh = self.cache.has_time();
        if fix_time_fresh {
            self.active.fix_time = self.cache.fix_time.clone();
            self.active.time_at_fix_time_set_us = self.cache.time_at_fix_time_set_us;
        }

        self.cache = ScheduleData::default();

        if fix_3d_fresh {
            self.mark(Marker::ApplyCacheNew3dPlus);
            self.consecutive_coasts = 0;

            let fix_time = self.active.fix_3d.time.clone();
            let at_us = self.active.time_at_fix_3d_set_us;
            self.apply_time_and_update_schedule(&fix_time, at_us, true);
        } else if fix_time_fresh {
            self.mark(Marker::ApplyCacheNewTime);

            let fix_time = self.active.fix_time.clone();
            let at_us = self.active.time_at_fix_time_set_us;
            self.apply_time_and_update_schedule(&fix_time, at_us, false);
        } else if self.active.has_3d()
            && self.active.time_at_fix_3d_set_us >= self.active.time_at_fix_time_set_us
        {
            self.mark(Marker::ApplyCacheOld3dPlus);

            let fix_time = self.active.fix_3d.time.clone();
            let at_us = self.active.time_at_fix_3d_set_us;
            self.apply_time_and_update_schedule(&fix_time, at_us, false);
        } else {
            self.mark(Marker::ApplyCacheOldTime);

            let fix_time = self.active.fix_time.clone();
            let at_us = self.active.time_at_fix_time_set_us;
            self.apply_time_and_update_schedule(&fix_time, at_us, false);
        }
    }

    /////////////////////////////////////////////////////////////////
    // Time
    /////////////////////////////////////////////////////////////////

    fn sync_notional(&mut self, fix_time: &FixTime, time_at_set_us: u64) {
        let utc_us = fix_time.utc_us();
        let drift_us = self.notional.set_from_gps(utc_us, time_at_set_us);

        self.mark(Marker::TimeSync);

        if !self.time_synced {
            self.time_synced = true;
            info!("time synced to GPS: {}", self.notional.datetime_at(time_at_set_us));
        } else if drift_us < 0 {
            debug!("prior clock was fast by {}us", -drift_us);
        } else if drift_us > 0 {
            debug!("prior clock was slow by {}us", drift_us);
        } else {
            debug!("time unchanged on sync");
        }
    }

    /// Adopt a corrected notional timeline: move notional time by
    /// `duration_us` and re-project every pending timer so expiries keep
    /// their wall-clock meaning. A positive shift moves time forward, so
    /// timers expire sooner.
    pub fn shift_time(&mut self, duration_us: i64) {
        let now_us = self.timers.now_us();
        let notional_was_us = self.notional.utc_at(now_us);
        let notional_now_us = if duration_us >= 0 {
            notional_was_us + duration_us as u64
        } else {
            notional_was_us.saturating_sub(duration_us.unsigned_abs())
        };

        info!(
            "shifting time by {}us: {} -> {}",
            duration_us,
            self.notional.datetime_at(now_us),
            crate::notional::format_date_time(&crate::notional::us_to_parts(notional_now_us)),
        );

        self.notional.set_from_gps(notional_now_us, now_us);
        self.timers.shift_all(duration_us);
    }

    /////////////////////////////////////////////////////////////////
    // Status
    /////////////////////////////////////////////////////////////////

    pub fn status(&self) -> SchedulerStatus {
        let now_us = self.timers.now_us();

        let window_start_us = (self.running && self.time_synced).then(|| {
            let next_us = self.time_at_next_window_start_us(now_us);
            if self.in_lockout {
                next_us.saturating_sub(WINDOW_PERIOD_US)
            } else {
                next_us
            }
        });

        SchedulerStatus {
            running: self.running,
            in_lockout: self.in_lockout,
            req_gps_active: self.req_gps_active,
            time_synced: self.time_synced,
            consecutive_coasts: self.consecutive_coasts,
            coast_at_us: self.timers.expiry_us(WindowTimer::Coast.index()),
            window_start_us,
            timers: WindowTimer::ALL
                .iter()
                .map(|&t| TimerStatus {
                    name: t.name(),
                    pending: self.timers.is_pending(t.index()),
                    expiry_us: self.timers.expiry_us(t.index()),
                })
                .collect(),
        }
    }

    fn mark(&mut self, marker: Marker) {
        let at_us = self.timers.now_us();
        self.markers.record(at_us, marker);
        debug!("[{}] {}", self.notional.datetime_at(at_us), marker);
    }
}
