//! Flight configuration.
//!
//! Callsign, band, flight channel, and frequency correction are set on the
//! ground and persisted by the configuration subsystem; the scheduler only
//! consumes the channel-derived start minute. A device with no callsign or
//! band refuses to enter flight mode.

use std::error::Error;
use std::fmt;

/// Flight channels 0..600: 30 id combinations x 4 frequency lanes x 5
/// start minutes.
pub const CHANNEL_COUNT: u16 = 600;

const DEFAULT_BAND: &str = "20m";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Configuration {
    pub callsign: String,
    pub band: String,
    pub channel: u16,
    /// Oscillator correction in parts-per-billion, consumed by the radio.
    pub correction: i32,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            callsign: String::new(),
            band: DEFAULT_BAND.to_string(),
            channel: 0,
            correction: 0,
        }
    }
}

impl Configuration {
    /// Validate the minimum needed to fly.
    pub fn ready_to_fly(&self) -> Result<(), ConfigError> {
        if self.callsign.trim().is_empty() {
            return Err(ConfigError::MissingCallsign);
        }
        if self.band.trim().is_empty() {
            return Err(ConfigError::MissingBand);
        }
        if self.channel >= CHANNEL_COUNT {
            return Err(ConfigError::InvalidChannel(self.channel));
        }
        Ok(())
    }

    pub fn channel_details(&self) -> ChannelDetails {
        channel_details(self.channel)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    MissingCallsign,
    MissingBand,
    InvalidChannel(u16),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingCallsign => write!(f, "no callsign configured"),
            ConfigError::MissingBand => write!(f, "no band configured"),
            ConfigError::InvalidChannel(ch) => {
                write!(f, "channel {ch} out of range (0..{CHANNEL_COUNT})")
            }
        }
    }
}

impl Error for ConfigError {}

/// Scheduling-relevant attributes of a flight channel. The id13 discriminator
/// and lane frequency offset are consumed by the message codec and radio.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelDetails {
    /// First transmission minute of the 10-minute cycle: 0/2/4/6/8.
    pub start_minute: u8,
    /// Frequency lane within the band, 1..=4.
    pub lane: u8,
}

/// Derive the channel's start minute and lane. Channels advance lane-first,
/// then start minute, then id combination.
pub fn channel_details(channel: u16) -> ChannelDetails {
    let channel = channel % CHANNEL_COUNT;
    ChannelDetails {
        start_minute: 2 * ((channel / 4) % 5) as u8,
        lane: (channel % 4) as u8 + 1,
    }
}
