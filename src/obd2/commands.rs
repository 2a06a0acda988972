//! # The Command Registry
//!
//! The fixed catalog of diagnostic commands the session draws from: mode 01
//! live-data parameters (including the PID-listing bitmap commands), a
//! derived mode 02 freeze-frame table, the DTC services (modes 03/04/07),
//! and the mode 06 monitor-listing command.
//!
//! The registry is built once into a `Lazy` static; everything handed out is
//! `&'static Command`, so callers can hold references across session calls
//! without cloning.

use crate::constants::{
    MODE_CLEAR_DTC, MODE_CURRENT_DATA, MODE_FREEZE_FRAME, MODE_PENDING_DTC, MODE_STORED_DTC,
    MODE_TEST_RESULTS,
};
use crate::obd2::command::Command;
use crate::obd2::decoders;
use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use std::collections::HashMap;

/// The diagnostic command catalog.
pub struct CommandRegistry {
    /// PID-indexed commands per mode.
    modes: HashMap<u8, BTreeMap<u8, Command>>,
    /// Commands without a parameter identifier (DTC services).
    services: Vec<Command>,
}

impl CommandRegistry {
    fn build() -> Self {
        let mut modes: HashMap<u8, BTreeMap<u8, Command>> = HashMap::new();

        let mode1 = mode1_table();

        // Mode 02 mirrors mode 01: the same parameters captured at the moment
        // a trouble code was stored. The listing commands stay mode-01-only;
        // freeze-frame support is mirrored during discovery instead.
        let mut mode2 = BTreeMap::new();
        for cmd in mode1.values() {
            let pid = cmd.pid.expect("mode 01 commands carry a PID");
            if pid == 0x00 || pid == 0x20 {
                continue;
            }
            let name: &'static str = Box::leak(format!("DTC_{}", cmd.name).into_boxed_str());
            let description: &'static str =
                Box::leak(format!("{} (freeze frame)", cmd.description).into_boxed_str());
            mode2.insert(
                pid,
                Command::new(name, description, MODE_FREEZE_FRAME, Some(pid), cmd.bytes, cmd.fast, cmd.decoder()),
            );
        }

        let mut mode6 = BTreeMap::new();
        mode6.insert(
            0x00,
            Command::new(
                "MIDS_A",
                "Supported MIDs [01-20]",
                MODE_TEST_RESULTS,
                Some(0x00),
                5,
                true,
                &decoders::PID_BITS,
            ),
        );

        modes.insert(MODE_CURRENT_DATA, mode1);
        modes.insert(MODE_FREEZE_FRAME, mode2);
        modes.insert(MODE_TEST_RESULTS, mode6);

        let services = vec![
            Command::new(
                "GET_DTC",
                "Get stored DTCs",
                MODE_STORED_DTC,
                None,
                0,
                false,
                &decoders::TROUBLE_CODES,
            ),
            Command::new(
                "CLEAR_DTC",
                "Clear DTCs and freeze data",
                MODE_CLEAR_DTC,
                None,
                0,
                false,
                &decoders::RAW_BYTES,
            ),
            Command::new(
                "GET_CURRENT_DTC",
                "Get DTCs from the current/last driving cycle",
                MODE_PENDING_DTC,
                None,
                0,
                false,
                &decoders::TROUBLE_CODES,
            ),
        ];

        CommandRegistry { modes, services }
    }

    /// Indexed lookup by mode and parameter identifier.
    pub fn get(&self, mode: u8, pid: u8) -> Option<&Command> {
        self.modes.get(&mode).and_then(|table| table.get(&pid))
    }

    /// Whether the registry defines a command at (mode, pid).
    pub fn has_pid(&self, mode: u8, pid: u8) -> bool {
        self.get(mode, pid).is_some()
    }

    /// Lookup by registry name (`"RPM"`, `"GET_DTC"`, ...).
    pub fn by_name(&self, name: &str) -> Option<&Command> {
        self.all().find(|cmd| cmd.name == name)
    }

    /// The commands every vehicle is assumed to answer: the discovery seeds
    /// plus the DTC services.
    pub fn base_commands(&self) -> Vec<&Command> {
        let mut base = Vec::new();
        if let Some(cmd) = self.get(0x01, 0x00) {
            base.push(cmd);
        }
        if let Some(cmd) = self.get(0x06, 0x00) {
            base.push(cmd);
        }
        base.extend(self.services.iter());
        base
    }

    /// The PID-listing bitmap commands, in probing order.
    pub fn pid_getters(&self) -> Vec<&Command> {
        let mut getters = Vec::new();
        for mode in [0x01, 0x06] {
            if let Some(table) = self.modes.get(&mode) {
                getters.extend(
                    table
                        .values()
                        .filter(|cmd| matches!(cmd.pid, Some(pid) if pid % 0x20 == 0)),
                );
            }
        }
        getters
    }

    /// Iterate over every command in the catalog.
    pub fn all(&self) -> impl Iterator<Item = &Command> {
        let mut mode_ids: Vec<&u8> = self.modes.keys().collect();
        mode_ids.sort();
        mode_ids
            .into_iter()
            .flat_map(|mode| self.modes[mode].values())
            .chain(self.services.iter())
    }
}

fn mode1_table() -> BTreeMap<u8, Command> {
    let specs: &[(&'static str, &'static str, u8, usize, bool, &'static dyn decoders::Decoder)] = &[
        ("PIDS_A", "Supported PIDs [01-20]", 0x00, 5, true, &decoders::PID_BITS),
        ("STATUS", "Status since DTCs cleared", 0x01, 5, true, &decoders::RAW_BYTES),
        ("FUEL_STATUS", "Fuel system status", 0x03, 3, true, &decoders::RAW_BYTES),
        ("ENGINE_LOAD", "Calculated engine load", 0x04, 2, true, &decoders::PERCENT),
        ("COOLANT_TEMP", "Engine coolant temperature", 0x05, 2, true, &decoders::TEMPERATURE),
        ("SHORT_FUEL_TRIM_1", "Short term fuel trim - Bank 1", 0x06, 2, true, &decoders::SIGNED_PERCENT),
        ("LONG_FUEL_TRIM_1", "Long term fuel trim - Bank 1", 0x07, 2, true, &decoders::SIGNED_PERCENT),
        ("SHORT_FUEL_TRIM_2", "Short term fuel trim - Bank 2", 0x08, 2, true, &decoders::SIGNED_PERCENT),
        ("LONG_FUEL_TRIM_2", "Long term fuel trim - Bank 2", 0x09, 2, true, &decoders::SIGNED_PERCENT),
        ("FUEL_PRESSURE", "Fuel pressure", 0x0A, 2, true, &decoders::FUEL_PRESSURE),
        ("INTAKE_PRESSURE", "Intake manifold absolute pressure", 0x0B, 2, true, &decoders::PRESSURE),
        ("RPM", "Engine RPM", 0x0C, 3, true, &decoders::RPM),
        ("SPEED", "Vehicle speed", 0x0D, 2, true, &decoders::SPEED),
        ("TIMING_ADVANCE", "Timing advance", 0x0E, 2, true, &decoders::TIMING_ADVANCE),
        ("INTAKE_TEMP", "Intake air temperature", 0x0F, 2, true, &decoders::TEMPERATURE),
        ("MAF", "Air flow rate (MAF)", 0x10, 3, true, &decoders::MAF),
        ("THROTTLE_POS", "Throttle position", 0x11, 2, true, &decoders::PERCENT),
        ("AIR_STATUS", "Secondary air status", 0x12, 2, true, &decoders::RAW_BYTES),
        ("O2_SENSORS", "O2 sensors present", 0x13, 2, true, &decoders::RAW_BYTES),
        ("O2_B1S1", "O2: Bank 1 - Sensor 1 voltage", 0x14, 3, true, &decoders::O2_VOLTAGE),
        ("O2_B1S2", "O2: Bank 1 - Sensor 2 voltage", 0x15, 3, true, &decoders::O2_VOLTAGE),
        ("OBD_COMPLIANCE", "OBD standards compliance", 0x1C, 2, true, &decoders::RAW_BYTES),
        ("RUN_TIME", "Engine run time", 0x1F, 3, true, &decoders::SECONDS),
        ("PIDS_B", "Supported PIDs [21-40]", 0x20, 5, true, &decoders::PID_BITS),
        ("DISTANCE_W_MIL", "Distance traveled with MIL on", 0x21, 3, true, &decoders::KILOMETERS),
        ("FUEL_LEVEL", "Fuel tank level input", 0x2F, 2, true, &decoders::PERCENT),
        ("WARMUPS_SINCE_DTC_CLEAR", "Warm-ups since codes cleared", 0x30, 2, true, &decoders::COUNT),
        ("DISTANCE_SINCE_DTC_CLEAR", "Distance traveled since codes cleared", 0x31, 3, true, &decoders::KILOMETERS),
        ("BAROMETRIC_PRESSURE", "Barometric pressure", 0x33, 2, true, &decoders::PRESSURE),
    ];

    specs
        .iter()
        .map(|&(name, description, pid, bytes, fast, decoder)| {
            (
                pid,
                Command::new(name, description, MODE_CURRENT_DATA, Some(pid), bytes, fast, decoder),
            )
        })
        .collect()
}

static COMMANDS: Lazy<CommandRegistry> = Lazy::new(CommandRegistry::build);

/// The shared command catalog.
pub fn registry() -> &'static CommandRegistry {
    &COMMANDS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indexed_lookup() {
        let reg = registry();
        let rpm = reg.get(0x01, 0x0C).unwrap();
        assert_eq!(rpm.name, "RPM");
        assert_eq!(rpm.request(), b"010C");
        assert_eq!(rpm.bytes, 3);

        assert!(reg.has_pid(0x01, 0x0D));
        assert!(!reg.has_pid(0x01, 0x02));
        assert!(!reg.has_pid(0x05, 0x00));
    }

    #[test]
    fn test_freeze_frame_mirror() {
        let reg = registry();
        let ff_rpm = reg.get(0x02, 0x0C).unwrap();
        assert_eq!(ff_rpm.name, "DTC_RPM");
        assert_eq!(ff_rpm.mode, 0x02);
        assert_eq!(ff_rpm.bytes, 3);
        assert_eq!(ff_rpm.request(), b"020C");

        // the listing commands are not mirrored
        assert!(!reg.has_pid(0x02, 0x00));
        assert!(!reg.has_pid(0x02, 0x20));
    }

    #[test]
    fn test_pid_getters_in_probing_order() {
        let names: Vec<&str> = registry().pid_getters().iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["PIDS_A", "PIDS_B", "MIDS_A"]);
    }

    #[test]
    fn test_base_commands() {
        let names: Vec<&str> = registry().base_commands().iter().map(|c| c.name).collect();
        assert!(names.contains(&"PIDS_A"));
        assert!(names.contains(&"MIDS_A"));
        assert!(names.contains(&"GET_DTC"));
        assert!(names.contains(&"CLEAR_DTC"));
        assert!(names.contains(&"GET_CURRENT_DTC"));
    }

    #[test]
    fn test_by_name() {
        let reg = registry();
        assert_eq!(reg.by_name("SPEED").unwrap().pid, Some(0x0D));
        assert_eq!(reg.by_name("GET_DTC").unwrap().mode, 0x03);
        assert!(reg.by_name("NOPE").is_none());
    }
}
