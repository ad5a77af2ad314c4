//! Device operations — one [`TdDevice`] implementation per protocol family.
//!
//! Operations take their arguments from [`Context::args`] and validate them
//! before touching the transport, except where the firmware read has to come
//! first (IWT120 `query_value`).

use std::time::{SystemTime, UNIX_EPOCH};

use crate::context::Context;
use crate::devreg;
use crate::error::{Result, TdError};
use crate::models::{DeviceProfile, Protocol};
use crate::protocol::{Frame, Opcode};
use crate::transport::ReportKind;

/// IWT120 FEATURE command that sets the measurement mode.
pub const IWT120_CMD_SET_MODE: u8 = 0x31;

/// Operations shared by every supported device.
///
/// `initialize`, `apply_value` and `query_value` exist for all devices.
/// The register-level operations default to [`TdError::InvalidOption`] and
/// are overridden only by register-protocol devices.
pub trait TdDevice {
    /// Write a fresh serial number (current Unix time) and return it.
    fn initialize(&self, ctx: &Context<'_>) -> Result<String> {
        write_timestamp_serial(ctx)
    }

    /// Apply the value given in `ctx.args`.
    fn apply_value(&self, ctx: &Context<'_>) -> Result<()>;

    /// Read the field named in `ctx.args` (or the default field).
    fn query_value(&self, ctx: &Context<'_>) -> Result<String>;

    fn read_register(&self, ctx: &Context<'_>, _addr: u16) -> Result<u32> {
        Err(unsupported(ctx, "register reads"))
    }

    fn write_register(&self, ctx: &Context<'_>, _addr: u16, _value: u32) -> Result<()> {
        Err(unsupported(ctx, "register writes"))
    }

    fn save(&self, ctx: &Context<'_>) -> Result<()> {
        Err(unsupported(ctx, "saving to flash"))
    }

    fn erase(&self, ctx: &Context<'_>) -> Result<()> {
        Err(unsupported(ctx, "firmware erase"))
    }
}

fn unsupported(ctx: &Context<'_>, what: &str) -> TdError {
    TdError::InvalidOption(format!("{} does not support {what}", ctx.profile.name))
}

/// Driver for a profile's protocol family.
pub fn driver_for(profile: &DeviceProfile) -> &'static dyn TdDevice {
    match profile.protocol {
        Protocol::FeatureReport => &Iwt120,
        Protocol::Register => &RegisterDevice,
    }
}

// ── Initialization ──

/// Send INIT carrying `serial` as ASCII, as a FEATURE report.
pub fn set_serial(ctx: &Context<'_>, serial: &str) -> Result<()> {
    let size = ctx.profile.output_report_size;
    let frame = Frame::command(size, Opcode::Init)
        .with_payload(serial.as_bytes())
        .ok_or_else(|| {
            TdError::InvalidOption(format!("serial '{serial}' does not fit a {size}-byte report"))
        })?;
    log::debug!(">> CMD_INIT ({serial})");
    ctx.transport.send_report(frame.as_bytes(), ReportKind::Feature)?;
    Ok(())
}

/// Set the serial number to the current Unix time in decimal.
pub fn write_timestamp_serial(ctx: &Context<'_>) -> Result<String> {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let serial = secs.to_string();
    set_serial(ctx, &serial)?;
    Ok(serial)
}

// ── Argument parsing ──

/// Parse a decimal or `0x`-prefixed hexadecimal integer.
pub fn parse_number(s: &str) -> Option<u64> {
    let s = s.trim();
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

/// Parse a register address (`u16`).
pub fn parse_address(s: &str) -> Result<u16> {
    parse_number(s)
        .and_then(|n| u16::try_from(n).ok())
        .ok_or_else(|| TdError::InvalidOption(format!("Invalid register address: {s}")))
}

/// Parse a register value (`u32`).
pub fn parse_value(s: &str) -> Result<u32> {
    parse_number(s)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| TdError::InvalidOption(format!("Invalid register value: {s}")))
}

// ── IWT120 ──

/// Readable IWT120 FEATURE report fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Iwt120Field {
    Mode,
    FirmwareVersion,
}

impl Iwt120Field {
    /// Decode a field name (exact, upper case); `None` selects [`Iwt120Field::Mode`].
    pub fn parse(name: Option<&str>) -> Result<Self> {
        match name {
            None | Some("MODE") => Ok(Iwt120Field::Mode),
            Some("FIRMWARE_VERSION") => Ok(Iwt120Field::FirmwareVersion),
            Some(n) => Err(TdError::InvalidOption(format!("Unknown option: {n}"))),
        }
    }

    /// Byte offset in the FEATURE report (report id at 0).
    pub fn offset(self) -> usize {
        match self {
            Iwt120Field::FirmwareVersion => 1,
            Iwt120Field::Mode => 2,
        }
    }
}

/// IWT120 infrared thermometer: FEATURE report get/set.
pub struct Iwt120;

impl TdDevice for Iwt120 {
    fn apply_value(&self, ctx: &Context<'_>) -> Result<()> {
        let [arg] = ctx.args else {
            return Err(TdError::InvalidOption("Only one value can be set.".into()));
        };
        let value = parse_number(arg)
            .and_then(|n| u8::try_from(n).ok())
            .ok_or_else(|| {
                TdError::InvalidOption(format!("Value must be between 0 and 255: {arg}"))
            })?;

        let frame = Frame::vendor_command(ctx.profile.output_report_size, IWT120_CMD_SET_MODE)
            .with_payload(&[value])
            .ok_or_else(|| TdError::InvalidOption("report too small".into()))?;
        log::debug!(">> SET_MODE ({value})");
        ctx.transport.send_report(frame.as_bytes(), ReportKind::Feature)?;
        Ok(())
    }

    fn query_value(&self, ctx: &Context<'_>) -> Result<String> {
        let report = ctx.transport.get_feature_report(ctx.output_len())?;
        log::debug!("<< FEATURE {:02X?}", &report[..report.len().min(4)]);

        if ctx.args.len() > 1 {
            return Err(TdError::InvalidOption(
                "Only one field can be queried.".into(),
            ));
        }
        let field = Iwt120Field::parse(ctx.args.first().map(String::as_str))?;
        let byte = report.get(field.offset()).copied().unwrap_or_default();
        Ok(byte.to_string())
    }
}

// ── Register-protocol devices ──

/// Devices driven through the SET/GET register protocol.
pub struct RegisterDevice;

impl RegisterDevice {
    /// Resolve a register name from the profile, or a numeric address.
    pub fn resolve(profile: &DeviceProfile, name: &str) -> Result<u16> {
        if let Some(reg) = profile.register(name.trim()) {
            return Ok(reg.address);
        }
        parse_number(name)
            .and_then(|n| u16::try_from(n).ok())
            .ok_or_else(|| TdError::InvalidOption(format!("Unknown register: {name}")))
    }
}

impl TdDevice for RegisterDevice {
    fn apply_value(&self, ctx: &Context<'_>) -> Result<()> {
        let [arg] = ctx.args else {
            return Err(TdError::InvalidOption(
                "Specify exactly one NAME=VALUE.".into(),
            ));
        };
        let (name, value) = arg
            .split_once('=')
            .ok_or_else(|| TdError::InvalidOption(format!("Expected NAME=VALUE, got '{arg}'")))?;
        let addr = Self::resolve(ctx.profile, name)?;
        let value = parse_value(value)?;
        self.write_register(ctx, addr, value)
    }

    fn query_value(&self, ctx: &Context<'_>) -> Result<String> {
        let addr = match ctx.args {
            [] => ctx
                .profile
                .registers
                .first()
                .map(|r| r.address)
                .ok_or_else(|| TdError::InvalidOption("No default register.".into()))?,
            [name] => Self::resolve(ctx.profile, name)?,
            _ => {
                return Err(TdError::InvalidOption(
                    "Only one register can be queried.".into(),
                ));
            }
        };
        Ok(self.read_register(ctx, addr)?.to_string())
    }

    fn read_register(&self, ctx: &Context<'_>, addr: u16) -> Result<u32> {
        Ok(devreg::read_devreg(ctx, addr)?)
    }

    fn write_register(&self, ctx: &Context<'_>, addr: u16, value: u32) -> Result<()> {
        Ok(devreg::write_devreg(ctx, addr, value)?)
    }

    fn save(&self, ctx: &Context<'_>) -> Result<()> {
        Ok(devreg::save_to_flash(ctx)?)
    }

    fn erase(&self, ctx: &Context<'_>) -> Result<()> {
        Ok(devreg::erase_firmware(ctx)?)
    }
}
