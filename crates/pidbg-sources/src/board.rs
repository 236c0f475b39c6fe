//! Board identification, read once at startup.

use pidbg_core::BoardInfo;
use sysinfo::System;
use tracing::debug;

const DEVICE_TREE_MODEL: &str = "/proc/device-tree/model";
const CPUINFO: &str = "/proc/cpuinfo";

/// `Revision` and `Serial` fields from `/proc/cpuinfo`.
pub fn parse_cpuinfo(text: &str) -> (Option<String>, Option<String>) {
    let mut revision = None;
    let mut serial = None;
    for line in text.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        match key.trim() {
            "Revision" => revision = Some(value.to_string()),
            "Serial" => serial = Some(value.to_string()),
            _ => {}
        }
    }
    (revision, serial)
}

/// Device tree strings are NUL-terminated.
pub fn parse_model(raw: &str) -> Option<String> {
    let model = raw.trim_end_matches('\0').trim();
    (!model.is_empty()).then(|| model.to_string())
}

fn os_description() -> Option<String> {
    let name = System::name()?;
    let mut os = name;
    if let Some(version) = System::os_version() {
        os.push(' ');
        os.push_str(&version);
    }
    if let Some(kernel) = System::kernel_version() {
        os.push_str(&format!(" (kernel {kernel})"));
    }
    Some(os)
}

/// Best-effort board description. Missing files leave fields empty.
pub fn detect_board() -> BoardInfo {
    let name = std::fs::read_to_string(DEVICE_TREE_MODEL)
        .ok()
        .and_then(|raw| parse_model(&raw));
    let (revision, serial) = std::fs::read_to_string(CPUINFO)
        .map(|text| parse_cpuinfo(&text))
        .unwrap_or_default();

    let board = BoardInfo {
        name,
        revision,
        serial,
        cpu_arch: System::cpu_arch(),
        os: os_description(),
    };
    debug!(?board, "Board detected");
    board
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cpuinfo_pi() {
        let text = "processor\t: 0\nmodel name\t: ARMv7 Processor rev 4 (v7l)\n\n\
                    Hardware\t: BCM2835\nRevision\t: a02082\nSerial\t\t: 00000000deadbeef\n\
                    Model\t\t: Raspberry Pi 3 Model B Rev 1.2\n";
        let (revision, serial) = parse_cpuinfo(text);
        assert_eq!(revision.as_deref(), Some("a02082"));
        assert_eq!(serial.as_deref(), Some("00000000deadbeef"));
    }

    #[test]
    fn test_parse_cpuinfo_desktop() {
        let (revision, serial) = parse_cpuinfo("processor\t: 0\nvendor_id\t: GenuineIntel\n");
        assert!(revision.is_none());
        assert!(serial.is_none());
    }

    #[test]
    fn test_parse_model_strips_nul() {
        assert_eq!(
            parse_model("Raspberry Pi 4 Model B Rev 1.4\0").as_deref(),
            Some("Raspberry Pi 4 Model B Rev 1.4")
        );
        assert_eq!(parse_model("\0"), None);
    }

    #[test]
    fn test_detect_board_does_not_fail() {
        let board = detect_board();
        if let Some(name) = board.name {
            assert!(!name.contains('\0'));
        }
    }
}
