//! Transmission slots and per-slot behavior planning.
//!
//! A window has five 2-minute slots. For each one the planner decides
//! whether the user script runs and whether the outgoing message is the
//! slot's custom message, its built-in default, or nothing, based on
//! GPS-lock state, which bindings the script reads, and whether the slot
//! has a message field definition.

use crate::script::ApiUsage;

/// Slot identity, 1-based in names and telemetry headers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Slot {
    Slot1,
    Slot2,
    Slot3,
    Slot4,
    Slot5,
}

impl Slot {
    pub const COUNT: usize = 5;
    pub const ALL: [Slot; Slot::COUNT] = [
        Slot::Slot1,
        Slot::Slot2,
        Slot::Slot3,
        Slot::Slot4,
        Slot::Slot5,
    ];

    /// 0-based index.
    pub fn index(self) -> usize {
        self as usize
    }

    /// 1-based slot number.
    pub fn number(self) -> u8 {
        self.index() as u8 + 1
    }

    pub fn name(self) -> &'static str {
        match self {
            Slot::Slot1 => "slot1",
            Slot::Slot2 => "slot2",
            Slot::Slot3 => "slot3",
            Slot::Slot4 => "slot4",
            Slot::Slot5 => "slot5",
        }
    }

    pub fn from_index(index: usize) -> Option<Slot> {
        Slot::ALL.get(index).copied()
    }

    /// Built-in payload when no custom message applies. Slot 1 carries the
    /// regular beacon, slot 2 basic telemetry, the rest nothing.
    pub fn default_payload(self) -> DefaultPayload {
        match self {
            Slot::Slot1 => DefaultPayload::RegularType1,
            Slot::Slot2 => DefaultPayload::BasicTelemetry,
            _ => DefaultPayload::None,
        }
    }
}

/// Scheduler-built message a slot can fall back to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DefaultPayload {
    #[default]
    None,
    RegularType1,
    BasicTelemetry,
}

/// What a slot transmits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MsgSend {
    None,
    Default,
    Custom,
}

/// Planned actions for one slot in the upcoming window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotBehavior {
    pub run_js: bool,
    pub msg_send: MsgSend,
    pub has_default: bool,
    pub can_send_default: bool,
    pub default_payload: DefaultPayload,
}

impl Default for SlotBehavior {
    fn default() -> Self {
        Self {
            run_js: true,
            msg_send: MsgSend::Default,
            has_default: false,
            can_send_default: false,
            default_payload: DefaultPayload::None,
        }
    }
}

/// Slot behavior plus the outcome of the script prefetch that runs in the
/// preceding slot.
#[derive(Clone, Copy, Debug, Default)]
pub struct SlotState {
    pub behavior: SlotBehavior,
    pub js_ran_ok: bool,
}

/// Nominal per-slot decision. Does not concern itself with when the script
/// actually runs (that is the prior slot's prefetch).
///
/// A script that reads the GPS binding cannot run correctly without a
/// lock, so both the script and the transmission are suppressed. A script
/// that writes the message binding yields a custom transmission. Without a
/// message field definition the custom message cannot exist, so the slot
/// reverts to its default (which itself needs a lock) or to nothing.
pub fn calculate_slot_behavior(
    default_payload: DefaultPayload,
    have_gps_lock: bool,
    usage: ApiUsage,
    has_msg_def: bool,
) -> SlotBehavior {
    let msg_send_default = if default_payload == DefaultPayload::None {
        MsgSend::None
    } else {
        MsgSend::Default
    };

    let (run_js, mut msg_send) = match (have_gps_lock, usage.gps, usage.msg) {
        (false, false, false) => (true, MsgSend::None),
        (false, false, true) => (true, MsgSend::Custom),
        (false, true, false) => (false, MsgSend::None),
        (false, true, true) => (false, MsgSend::None),
        (true, false, false) => (true, msg_send_default),
        (true, false, true) => (true, MsgSend::Custom),
        (true, true, false) => (true, msg_send_default),
        (true, true, true) => (true, MsgSend::Custom),
    };

    // No field definition means the message binding cannot populate
    // anything; revert to the default payload where one exists and a lock
    // makes it sendable.
    if !has_msg_def {
        msg_send = if msg_send_default == MsgSend::None || !have_gps_lock {
            MsgSend::None
        } else {
            MsgSend::Default
        };
    }

    SlotBehavior {
        run_js,
        msg_send,
        has_default: default_payload != DefaultPayload::None,
        can_send_default: have_gps_lock,
        default_payload,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NEITHER: ApiUsage = ApiUsage { gps: false, msg: false };
    const GPS_ONLY: ApiUsage = ApiUsage { gps: true, msg: false };
    const MSG_ONLY: ApiUsage = ApiUsage { gps: false, msg: true };
    const BOTH: ApiUsage = ApiUsage { gps: true, msg: true };

    fn behavior(
        default_payload: DefaultPayload,
        gps: bool,
        usage: ApiUsage,
        has_def: bool,
    ) -> (bool, MsgSend, bool) {
        let b = calculate_slot_behavior(default_payload, gps, usage, has_def);
        (b.run_js, b.msg_send, b.can_send_default)
    }

    #[test]
    fn no_gps_with_msg_def() {
        let d = DefaultPayload::None;
        assert_eq!(behavior(d, false, NEITHER, true), (true, MsgSend::None, false));
        assert_eq!(behavior(d, false, MSG_ONLY, true), (true, MsgSend::Custom, false));
        assert_eq!(behavior(d, false, GPS_ONLY, true), (false, MsgSend::None, false));
        assert_eq!(behavior(d, false, BOTH, true), (false, MsgSend::None, false));
    }

    #[test]
    fn no_gps_without_msg_def() {
        let d = DefaultPayload::None;
        assert_eq!(behavior(d, false, NEITHER, false), (true, MsgSend::None, false));
        assert_eq!(behavior(d, false, MSG_ONLY, false), (true, MsgSend::None, false));
        assert_eq!(behavior(d, false, GPS_ONLY, false), (false, MsgSend::None, false));
        assert_eq!(behavior(d, false, BOTH, false), (false, MsgSend::None, false));
    }

    #[test]
    fn gps_with_msg_def() {
        let d = DefaultPayload::RegularType1;
        assert_eq!(behavior(d, true, NEITHER, true), (true, MsgSend::Default, true));
        assert_eq!(behavior(d, true, MSG_ONLY, true), (true, MsgSend::Custom, true));
        // a slot with no built-in default stays silent even with a def
        assert_eq!(
            behavior(DefaultPayload::None, true, GPS_ONLY, true),
            (true, MsgSend::None, true)
        );
        assert_eq!(behavior(d, true, BOTH, true), (true, MsgSend::Custom, true));
    }

    #[test]
    fn gps_without_msg_def() {
        let d = DefaultPayload::BasicTelemetry;
        assert_eq!(behavior(d, true, NEITHER, false), (true, MsgSend::Default, true));
        assert_eq!(behavior(d, true, MSG_ONLY, false), (true, MsgSend::Default, true));
        assert_eq!(
            behavior(DefaultPayload::None, true, GPS_ONLY, false),
            (true, MsgSend::None, true)
        );
        assert_eq!(
            behavior(DefaultPayload::None, true, BOTH, false),
            (true, MsgSend::None, true)
        );
    }

    #[test]
    fn no_def_no_lock_forces_silence_even_with_default() {
        assert_eq!(
            behavior(DefaultPayload::RegularType1, false, NEITHER, false),
            (true, MsgSend::None, false)
        );
    }

    #[test]
    fn default_payload_flags() {
        let b = calculate_slot_behavior(DefaultPayload::BasicTelemetry, true, NEITHER, true);
        assert!(b.has_default);
        assert_eq!(b.default_payload, DefaultPayload::BasicTelemetry);
        let b = calculate_slot_behavior(DefaultPayload::None, true, NEITHER, true);
        assert!(!b.has_default);
    }

    #[test]
    fn planner_is_idempotent() {
        for gps in [false, true] {
            for usage in [NEITHER, GPS_ONLY, MSG_ONLY, BOTH] {
                for has_def in [false, true] {
                    for payload in [
                        DefaultPayload::None,
                        DefaultPayload::RegularType1,
                        DefaultPayload::BasicTelemetry,
                    ] {
                        let a = calculate_slot_behavior(payload, gps, usage, has_def);
                        let b = calculate_slot_behavior(payload, gps, usage, has_def);
                        assert_eq!(a, b);
                    }
                }
            }
        }
    }

    #[test]
    fn slot_identities() {
        assert_eq!(Slot::Slot1.name(), "slot1");
        assert_eq!(Slot::Slot5.number(), 5);
        assert_eq!(Slot::from_index(2), Some(Slot::Slot3));
        assert_eq!(Slot::from_index(5), None);
        assert_eq!(Slot::Slot1.default_payload(), DefaultPayload::RegularType1);
        assert_eq!(Slot::Slot2.default_payload(), DefaultPayload::BasicTelemetry);
        assert_eq!(Slot::Slot4.default_payload(), DefaultPayload::None);
    }
}
