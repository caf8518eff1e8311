//! Scheduler decision markers.
//!
//! The scheduler emits a short tag at every decision point into a single
//! append-only sink passed at construction. Tests subscribe to assert on
//! ordered sequences; production keeps a fixed-capacity ring for log
//! export over the shell.

use core::fmt;

use heapless::Deque;

/// One tag per scheduler decision point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Marker {
    Start,
    Stop,
    ReqNewGpsLock,
    CancelReqNewGpsLock,
    OnGpsLockTimeApplied,
    OnGpsLockTimeCached,
    OnGpsLockTimeReqNoLockoutNo,
    OnGpsLockTimeReqNoLockoutOn,
    OnGpsLock3dPlusApplied,
    OnGpsLock3dPlusCached,
    OnGpsLock3dPlusReqNoLockoutNo,
    OnGpsLock3dPlusReqNoLockoutOn,
    ApplyTimeAndUpdateSchedule,
    ApplyCacheNew3dPlus,
    ApplyCacheNewTime,
    ApplyCacheOld3dPlus,
    ApplyCacheOldTime,
    UpdateSchedule,
    PrepareWindowSlotBehaviorStart,
    PrepareWindowSlotBehaviorEnd,
    PrepareWindowScheduleStart,
    PrepareWindowScheduleEnd,
    ScheduleLockOutStart,
    ScheduleLockOutEnd,
    CoastScheduled,
    CoastTriggered,
    CoastCanceled,
    TxWarmup,
    Period0Start,
    Period0End,
    Period1Start,
    Period1End,
    Period2Start,
    Period2End,
    Period3Start,
    Period3End,
    Period4Start,
    Period4End,
    Period5Start,
    Period5End,
    TxDisableGpsEnable,
    JsExec,
    JsNoExec,
    SendRegularType1,
    SendBasicTelemetry,
    SendCustomMessage,
    SendNoMsgNone,
    SendNoMsgBadJsNoDefault,
    SendNoMsgBadJsNoAbleDefault,
    TimeSync,
}

impl Marker {
    pub const fn as_str(self) -> &'static str {
        match self {
            Marker::Start => "START",
            Marker::Stop => "STOP",
            Marker::ReqNewGpsLock => "REQ_NEW_GPS_LOCK",
            Marker::CancelReqNewGpsLock => "CANCEL_REQ_NEW_GPS_LOCK",
            Marker::OnGpsLockTimeApplied => "ON_GPS_LOCK_TIME_APPLIED",
            Marker::OnGpsLockTimeCached => "ON_GPS_LOCK_TIME_CACHED",
            Marker::OnGpsLockTimeReqNoLockoutNo => "ON_GPS_LOCK_TIME_REQ_NO_LOCKOUT_NO",
            Marker::OnGpsLockTimeReqNoLockoutOn => "ON_GPS_LOCK_TIME_REQ_NO_LOCKOUT_ON",
            Marker::OnGpsLock3dPlusApplied => "ON_GPS_LOCK_3D_PLUS_APPLIED",
            Marker::OnGpsLock3dPlusCached => "ON_GPS_LOCK_3D_PLUS_CACHED",
            Marker::OnGpsLock3dPlusReqNoLockoutNo => "ON_GPS_LOCK_3D_PLUS_REQ_NO_LOCKOUT_NO",
            Marker::OnGpsLock3dPlusReqNoLockoutOn => "ON_GPS_LOCK_3D_PLUS_REQ_NO_LOCKOUT_ON",
            Marker::ApplyTimeAndUpdateSchedule => "APPLY_TIME_AND_UPDATE_SCHEDULE",
            Marker::ApplyCacheNew3dPlus => "APPLY_CACHE_NEW_3D_PLUS",
            Marker::ApplyCacheNewTime => "APPLY_CACHE_NEW_TIME",
            Marker::ApplyCacheOld3dPlus => "APPLY_CACHE_OLD_3D_PLUS",
            Marker::ApplyCacheOldTime => "APPLY_CACHE_OLD_TIME",
            Marker::UpdateSchedule => "UPDATE_SCHEDULE",
            Marker::PrepareWindowSlotBehaviorStart => "PREPARE_WINDOW_SLOT_BEHAVIOR_START",
            Marker::PrepareWindowSlotBehaviorEnd => "PREPARE_WINDOW_SLOT_BEHAVIOR_END",
            Marker::PrepareWindowScheduleStart => "PREPARE_WINDOW_SCHEDULE_START",
            Marker::PrepareWindowScheduleEnd => "PREPARE_WINDOW_SCHEDULE_END",
            Marker::ScheduleLockOutStart => "SCHEDULE_LOCK_OUT_START",
            Marker::ScheduleLockOutEnd => "SCHEDULE_LOCK_OUT_END",
            Marker::CoastScheduled => "COAST_SCHEDULED",
            Marker::CoastTriggered => "COAST_TRIGGERED",
            Marker::CoastCanceled => "COAST_CANCELED",
            Marker::TxWarmup => "TX_WARMUP",
            Marker::Period0Start => "PERIOD0_START",
            Marker::Period0End => "PERIOD0_END",
            Marker::Period1Start => "PERIOD1_START",
            Marker::Period1End => "PERIOD1_END",
            Marker::Period2Start => "PERIOD2_START",
            Marker::Period2End => "PERIOD2_END",
            Marker::Period3Start => "PERIOD3_START",
            Marker::Period3End => "PERIOD3_END",
            Marker::Period4Start => "PERIOD4_START",
            Marker::Period4End => "PERIOD4_END",
            Marker::Period5Start => "PERIOD5_START",
            Marker::Period5End => "PERIOD5_END",
            Marker::TxDisableGpsEnable => "TX_DISABLE_GPS_ENABLE",
            Marker::JsExec => "JS_EXEC",
            Marker::JsNoExec => "JS_NO_EXEC",
            Marker::SendRegularType1 => "SEND_REGULAR_TYPE1",
            Marker::SendBasicTelemetry => "SEND_BASIC_TELEMETRY",
            Marker::SendCustomMessage => "SEND_CUSTOM_MESSAGE",
            Marker::SendNoMsgNone => "SEND_NO_MSG_NONE",
            Marker::SendNoMsgBadJsNoDefault => "SEND_NO_MSG_BAD_JS_NO_DEFAULT",
            Marker::SendNoMsgBadJsNoAbleDefault => "SEND_NO_MSG_BAD_JS_NO_ABLE_DEFAULT",
            Marker::TimeSync => "TIME_SYNC",
        }
    }

    /// Start marker for period `index` (0..=5).
    pub fn period_start(index: usize) -> Marker {
        [
            Marker::Period0Start,
            Marker::Period1Start,
            Marker::Period2Start,
            Marker::Period3Start,
            Marker::Period4Start,
            Marker::Period5Start,
        ][index]
    }

    /// End marker for period `index` (0..=5).
    pub fn period_end(index: usize) -> Marker {
        [
            Marker::Period0End,
            Marker::Period1End,
            Marker::Period2End,
            Marker::Period3End,
            Marker::Period4End,
            Marker::Period5End,
        ][index]
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives every marker the scheduler emits, with the monotonic timestamp
/// of the emission.
pub trait MarkerSink {
    fn record(&mut self, at_us: u64, marker: Marker);
}

/// Drop-oldest ring of the most recent markers.
pub struct MarkerRing<const N: usize> {
    entries: Deque<(u64, Marker), N>,
}

impl<const N: usize> Default for MarkerRing<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> MarkerRing<N> {
    pub const fn new() -> Self {
        Self {
            entries: Deque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &(u64, Marker)> {
        self.entries.iter()
    }
}

impl<const N: usize> MarkerSink for MarkerRing<N> {
    fn record(&mut self, at_us: u64, marker: Marker) {
        if self.entries.is_full() {
            self.entries.pop_front();
        }
        // cannot fail: a slot was just freed if needed
        let _ = self.entries.push_back((at_us, marker));
    }
}

/// Discards everything; the default sink.
#[derive(Debug, Default)]
pub struct NullMarkerSink;

impl MarkerSink for NullMarkerSink {
    fn record(&mut self, _at_us: u64, _marker: Marker) {}
}
