//! Slot script inspection and run results.
//!
//! The script VM itself lives behind the [`ScriptHost`](crate::caps::ScriptHost)
//! capability. What belongs here is the binding-usage detection the planner
//! feeds on: a plain substring scan over the non-commented part of each
//! line, no tokenizer. A script "uses" the GPS binding if `gps.Get` appears
//! outside a `//` comment, and the message binding likewise via `msg.Set`.

/// Which script API bindings a slot script touches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ApiUsage {
    pub gps: bool,
    pub msg: bool,
}

fn has_non_commented_substring(script: &str, needle: &str) -> bool {
    script.lines().any(|line| {
        let uncommented = line.split("//").next().unwrap_or("");
        uncommented.contains(needle)
    })
}

pub fn uses_gps_api(script: &str) -> bool {
    has_non_commented_substring(script, "gps.Get")
}

pub fn uses_msg_api(script: &str) -> bool {
    has_non_commented_substring(script, "msg.Set")
}

pub fn api_usage(script: &str) -> ApiUsage {
    ApiUsage {
        gps: uses_gps_api(script),
        msg: uses_msg_api(script),
    }
}

/// Outcome of one slot script execution, as reported by the VM host.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunResult {
    pub ok: bool,
    pub parse_ms: u64,
    pub run_ms: u64,
    pub run_mem_used: u32,
    pub run_mem_avail: u32,
    pub output: String,
    /// Rendered message field state after the run, for logging.
    pub msg_state: String,
}

impl RunResult {
    pub fn succeeded() -> Self {
        Self {
            ok: true,
            ..Self::default()
        }
    }

    pub fn failed() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_plain_usage() {
        assert!(uses_gps_api("gps.GetAltitudeMeters();"));
        assert!(uses_msg_api("msg.SetAltitudeMeters(1);"));
        let both = api_usage("gps.GetAltitudeMeters();msg.SetAltitudeMeters(1);");
        assert_eq!(both, ApiUsage { gps: true, msg: true });
    }

    #[test]
    fn empty_script_uses_nothing() {
        assert_eq!(api_usage(""), ApiUsage::default());
    }

    #[test]
    fn commented_usage_does_not_count() {
        assert!(!uses_gps_api("// gps.GetAltitudeMeters();"));
        assert!(!uses_msg_api("var x = 1; // msg.SetAltitudeMeters(x);"));
    }

    #[test]
    fn usage_before_comment_counts() {
        assert!(uses_gps_api("gps.GetSpeedKnots(); // read speed"));
    }

    #[test]
    fn scans_every_line() {
        let script = "var a = 1;\n// msg.SetFoo(a);\nmsg.SetAltitudeMeters(a);\n";
        assert!(!uses_gps_api(script));
        assert!(uses_msg_api(script));
    }

    #[test]
    fn getter_on_msg_is_not_a_write() {
        assert!(!uses_msg_api("var v = msg.GetAltitudeMeters();"));
    }
}
