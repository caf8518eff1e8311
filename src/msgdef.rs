//! Slot message field definitions.
//!
//! Each slot may carry a `slotN.json` file describing the fields of its
//! user-defined telemetry message: a JSON array of
//! `{ name, unit, lowValue, highValue, stepSize }` objects. Lines starting
//! with `//` are comments and a trailing comma after the last item is
//! tolerated, since these files are edited by hand.

use std::error::Error;
use std::fmt;

use serde::Deserialize;

/// The encoded message format tops out at 29 user fields.
pub const MAX_FIELDS: usize = 29;

/// One user-defined telemetry field.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FieldDef {
    pub name: String,
    pub unit: String,
    pub low_value: f64,
    pub high_value: f64,
    pub step_size: f64,
}

impl FieldDef {
    /// Field identifier as exposed to scripts: name and unit concatenated,
    /// e.g. `AltitudeMeters`.
    pub fn field_name(&self) -> String {
        format!("{}{}", self.name, self.unit)
    }
}

#[derive(Debug)]
pub enum MsgDefError {
    Json(serde_json::Error),
    TooManyFields(usize),
    InvalidField(String),
}

impl fmt::Display for MsgDefError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MsgDefError::Json(e) => write!(f, "message definition is not valid JSON: {e}"),
            MsgDefError::TooManyFields(n) => {
                write!(f, "message definition has {n} fields, maximum is {MAX_FIELDS}")
            }
            MsgDefError::InvalidField(name) => {
                write!(f, "field {name} has an invalid value range")
            }
        }
    }
}

impl Error for MsgDefError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MsgDefError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for MsgDefError {
    fn from(e: serde_json::Error) -> Self {
        MsgDefError::Json(e)
    }
}

fn sanitize(msg_def: &str) -> String {
    let mut body: String = msg_def
        .lines()
        .filter(|line| !line.starts_with("//"))
        .collect::<Vec<_>>()
        .join("\n");

    let trimmed_len = body.trim_end().len();
    body.truncate(trimmed_len);
    if body.ends_with(',') {
        body.pop();
    }
    body
}

/// Parse a slot message definition. An empty (or comments-only) definition
/// yields an empty field list, which callers treat as "no definition".
pub fn parse_msg_def(msg_def: &str) -> Result<Vec<FieldDef>, MsgDefError> {
    let body = sanitize(msg_def);
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }

    let fields: Vec<FieldDef> = serde_json::from_str(&format!("[\n{body}\n]"))?;

    if fields.len() > MAX_FIELDS {
        return Err(MsgDefError::TooManyFields(fields.len()));
    }
    for field in &fields {
        if !(field.high_value > field.low_value) || !(field.step_size > 0.0) {
            return Err(MsgDefError::InvalidField(field.field_name()));
        }
    }

    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALTITUDE: &str =
        r#"{ "name": "Altitude", "unit": "Meters", "lowValue": 0, "highValue": 21340, "stepSize": 20 }"#;

    #[test]
    fn parses_single_field() {
        let fields = parse_msg_def(ALTITUDE).unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].field_name(), "AltitudeMeters");
        assert_eq!(fields[0].low_value, 0.0);
        assert_eq!(fields[0].high_value, 21_340.0);
        assert_eq!(fields[0].step_size, 20.0);
    }

    #[test]
    fn tolerates_trailing_comma_on_last_item() {
        let def = format!("{ALTITUDE},");
        assert_eq!(parse_msg_def(&def).unwrap().len(), 1);
        let def = format!("{ALTITUDE},\n");
        assert_eq!(parse_msg_def(&def).unwrap().len(), 1);
    }

    #[test]
    fn strips_comment_lines() {
        let def = format!(
            "// altitude in twenty meter steps\n{ALTITUDE},\n// end of file\n"
        );
        assert_eq!(parse_msg_def(&def).unwrap().len(), 1);
    }

    #[test]
    fn parses_multiple_fields() {
        let def = format!(
            "{ALTITUDE},\n{{ \"name\": \"Temp\", \"unit\": \"C\", \"lowValue\": -60, \"highValue\": 40, \"stepSize\": 1 }}"
        );
        let fields = parse_msg_def(&def).unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[1].field_name(), "TempC");
    }

    #[test]
    fn empty_and_comment_only_input_yield_no_fields() {
        assert!(parse_msg_def("").unwrap().is_empty());
        assert!(parse_msg_def("\n\n").unwrap().is_empty());
        assert!(parse_msg_def("// nothing here\n").unwrap().is_empty());
    }

    #[test]
    fn missing_key_is_an_error() {
        let def = r#"{ "name": "Altitude", "unit": "Meters", "lowValue": 0, "highValue": 21340 }"#;
        assert!(matches!(parse_msg_def(def), Err(MsgDefError::Json(_))));
    }

    #[test]
    fn inverted_range_is_an_error() {
        let def = r#"{ "name": "A", "unit": "B", "lowValue": 10, "highValue": 0, "stepSize": 1 }"#;
        assert!(matches!(
            parse_msg_def(def),
            Err(MsgDefError::InvalidField(_))
        ));
        let def = r#"{ "name": "A", "unit": "B", "lowValue": 0, "highValue": 10, "stepSize": 0 }"#;
        assert!(matches!(
            parse_msg_def(def),
            Err(MsgDefError::InvalidField(_))
        ));
    }

    #[test]
    fn too_many_fields_is_an_error() {
        let mut def = String::new();
        for i in 0..=MAX_FIELDS {
            def.push_str(&format!(
                "{{ \"name\": \"F{i}\", \"unit\": \"U\", \"lowValue\": 0, \"highValue\": 1, \"stepSize\": 1 }},\n"
            ));
        }
        assert!(matches!(
            parse_msg_def(&def),
            Err(MsgDefError::TooManyFields(n)) if n == MAX_FIELDS + 1
        ));
    }
}
