//! Flight control core for a solar-powered high-altitude WSPR beacon
//! tracker.
//!
//! The tracker repeats a 10-minute cycle: acquire a GPS fix, compute the
//! next transmission window, warm the radio, key one 110.6-second message
//! per 2-minute slot on the UTC minute boundaries, then hand the antenna
//! back to the GPS. This crate is the part that decides *when* everything
//! happens and *what* each slot transmits; the hardware itself (GPS
//! serial, Si5351 radio, script VM, flash, watchdog) sits behind the
//! capability traits in [`caps`] and is wired in by the flight
//! application.
//!
//! The whole core runs on one logical thread over a virtual microsecond
//! clock, so entire flights replay deterministically on a host — see the
//! `flight-sim` binary.

pub mod caps;
pub mod config;
pub mod fix;
pub mod marker;
pub mod msgdef;
pub mod notional;
pub mod scheduler;
pub mod script;
pub mod slot;
pub mod store;
pub mod timer;
pub mod window;

pub use caps::Capabilities;
pub use marker::Marker;
pub use scheduler::Scheduler;
