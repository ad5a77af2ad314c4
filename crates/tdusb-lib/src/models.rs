//! Model profiles — identity and report geometry of supported devices.
//!
//! Each profile is a static descriptor. Behaviour lives in
//! [`crate::device`]; the profile only says which protocol family the
//! device speaks and, for register devices, which register names it knows.
//!
//! IWT120 is a shipping product. `TDDEV2` is a generic register-protocol
//! profile: its product string and register map are an example layout, not
//! the table of any released firmware.

/// Shared V-USB vendor ID used by Tokyo Devices instruments.
pub const TOKYO_DEVICES_VID: u16 = 0x16C0;

/// Shared V-USB HID product ID; devices are told apart by product string.
pub const VUSB_HID_PID: u16 = 0x05DF;

/// How a device is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// Direct FEATURE report get/set (TDDEV1 family).
    FeatureReport,
    /// OUTPUT/INPUT register protocol with ACK correlation (TDDEV2 family).
    Register,
}

/// A named device register.
#[derive(Debug)]
pub struct RegisterName {
    pub name: &'static str,
    pub address: u16,
}

#[derive(Debug)]
pub struct DeviceProfile {
    /// Product string reported by the device; also the CLI model name.
    pub name: &'static str,
    pub vendor_id: u16,
    pub product_id: u16,
    /// INPUT report size, without report id.
    pub input_report_size: usize,
    /// OUTPUT/FEATURE report size, without report id.
    pub output_report_size: usize,
    pub protocol: Protocol,
    /// Named registers (register devices only). The first entry is the
    /// default for `get` without arguments.
    pub registers: &'static [RegisterName],
}

impl DeviceProfile {
    /// Look up a register by name (ASCII case-insensitive).
    pub fn register(&self, name: &str) -> Option<&'static RegisterName> {
        self.registers
            .iter()
            .find(|r| r.name.eq_ignore_ascii_case(name))
    }
}

// ── IWT120 ──

static IWT120: DeviceProfile = DeviceProfile {
    name: "IWT120",
    vendor_id: TOKYO_DEVICES_VID,
    product_id: VUSB_HID_PID,
    input_report_size: 16,
    output_report_size: 16,
    protocol: Protocol::FeatureReport,
    registers: &[],
};

// ── Generic register device ──
//
// Example register map; replace with a real firmware table when adding a
// register-protocol product.

static TDDEV2_REGISTERS: [RegisterName; 4] = [
    RegisterName {
        name: "FIRMWARE_VERSION",
        address: 0x0000,
    },
    RegisterName {
        name: "SERIAL",
        address: 0x0001,
    },
    RegisterName {
        name: "INTERVAL",
        address: 0x0010,
    },
    RegisterName {
        name: "THRESHOLD",
        address: 0x0011,
    },
];

static TDDEV2: DeviceProfile = DeviceProfile {
    name: "TDDEV2",
    vendor_id: TOKYO_DEVICES_VID,
    product_id: VUSB_HID_PID,
    input_report_size: 32,
    output_report_size: 32,
    protocol: Protocol::Register,
    registers: &TDDEV2_REGISTERS,
};

/// All known device profiles.
pub static ALL_MODELS: &[&DeviceProfile] = &[&IWT120, &TDDEV2];

/// Find a profile by model name (ASCII case-insensitive).
pub fn find_model(name: &str) -> Option<&'static DeviceProfile> {
    let name = name.trim();
    ALL_MODELS
        .iter()
        .find(|p| p.name.eq_ignore_ascii_case(name))
        .copied()
}
