//! Per-slot configuration files.
//!
//! Each slot persists as a pair of files, `slotN.js` (user script) and
//! `slotN.json` (message field definition), N in 1..=5. On the tracker
//! these live on the flash filesystem; here they load from a directory.
//! Everything is read once and cached: slot lookups happen inside the
//! pre-window preparation where flash reads were measured to be slow.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::warn;

use crate::msgdef::{self, FieldDef};
use crate::script::{self, ApiUsage};
use crate::slot::Slot;

#[derive(Clone, Debug, Default)]
struct SlotEntry {
    script: String,
    fields: Vec<FieldDef>,
}

/// In-memory view of the five slot file pairs.
#[derive(Clone, Debug, Default)]
pub struct SlotStore {
    slots: [SlotEntry; Slot::COUNT],
}

impl SlotStore {
    /// Empty store: blank scripts, no message definitions.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load `slotN.js` / `slotN.json` from `dir`. Missing files read as
    /// empty; a definition that fails to parse is logged and treated as
    /// absent, matching the slot behavior override for missing defs.
    pub fn load(dir: &Path) -> Result<Self, StoreError> {
        let mut store = Self::empty();

        for slot in Slot::ALL {
            let script = read_optional(&dir.join(format!("{}.js", slot.name())))?;
            let def = read_optional(&dir.join(format!("{}.json", slot.name())))?;
            store.set_slot(slot, &script, &def);
        }

        Ok(store)
    }

    /// Replace one slot's script and message definition.
    pub fn set_slot(&mut self, slot: Slot, script: &str, msg_def: &str) {
        let fields = match msgdef::parse_msg_def(msg_def) {
            Ok(fields) => fields,
            Err(e) => {
                warn!("{}: bad message definition, ignoring: {e}", slot.name());
                Vec::new()
            }
        };
        self.slots[slot.index()] = SlotEntry {
            script: script.to_string(),
            fields,
        };
    }

    pub fn script(&self, slot: Slot) -> &str {
        &self.slots[slot.index()].script
    }

    pub fn api_usage(&self, slot: Slot) -> ApiUsage {
        script::api_usage(self.script(slot))
    }

    pub fn has_msg_def(&self, slot: Slot) -> bool {
        !self.slots[slot.index()].fields.is_empty()
    }

    pub fn field_defs(&self, slot: Slot) -> &[FieldDef] {
        &self.slots[slot.index()].fields
    }
}

fn read_optional(path: &Path) -> Result<String, StoreError> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(contents),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(StoreError::Io(path.to_path_buf(), e)),
    }
}

#[derive(Debug)]
pub enum StoreError {
    Io(PathBuf, io::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io(path, e) => write!(f, "reading {}: {e}", path.display()),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io(_, e) => Some(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MSG_DEF: &str =
        r#"{ "name": "Altitude", "unit": "Meters", "lowValue": 0, "highValue": 21340, "stepSize": 20 },"#;

    #[test]
    fn empty_store_has_no_scripts_or_defs() {
        let store = SlotStore::empty();
        for slot in Slot::ALL {
            assert_eq!(store.script(slot), "");
            assert!(!store.has_msg_def(slot));
            assert_eq!(store.api_usage(slot), ApiUsage::default());
        }
    }

    #[test]
    fn set_slot_parses_def_and_scans_script() {
        let mut store = SlotStore::empty();
        store.set_slot(Slot::Slot3, "msg.SetAltitudeMeters(1);", MSG_DEF);
        assert!(store.has_msg_def(Slot::Slot3));
        assert_eq!(store.field_defs(Slot::Slot3)[0].field_name(), "AltitudeMeters");
        assert!(store.api_usage(Slot::Slot3).msg);
        assert!(!store.api_usage(Slot::Slot3).gps);
        assert!(!store.has_msg_def(Slot::Slot2));
    }

    #[test]
    fn unparseable_def_counts_as_absent() {
        let mut store = SlotStore::empty();
        store.set_slot(Slot::Slot1, "", "{ not json");
        assert!(!store.has_msg_def(Slot::Slot1));
    }

    #[test]
    fn loads_slot_files_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("slot1.js"), "gps.GetAltitudeMeters();").unwrap();
        fs::write(dir.path().join("slot2.json"), MSG_DEF).unwrap();

        let store = SlotStore::load(dir.path()).unwrap();
        assert!(store.api_usage(Slot::Slot1).gps);
        assert!(!store.has_msg_def(Slot::Slot1));
        assert!(store.has_msg_def(Slot::Slot2));
        // untouched slots read as empty
        assert_eq!(store.script(Slot::Slot5), "");
    }

    #[test]
    fn load_of_missing_directory_reads_all_slots_empty() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("nope");
        // files under a nonexistent dir surface NotFound, which reads as
        // empty; only real IO errors fail the load
        let store = SlotStore::load(&gone).unwrap();
        assert_eq!(store.script(Slot::Slot1), "");
    }
}
