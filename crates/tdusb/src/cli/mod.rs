//! CLI subcommands — model listing, device values, raw registers, flash.

mod config_cmd;
mod flash;
mod init;
mod list;
mod models;
mod register;
mod value;

use std::io::Write;
use std::path::Path;
use std::str::FromStr;

use clap::Subcommand;
use serde::Serialize;

pub(super) use tdusb_lib::config::Config;
pub(super) use tdusb_lib::context::{Context, RetryPolicy};
pub(super) use tdusb_lib::device::{TdDevice, driver_for};
pub(super) use tdusb_lib::error::{Result, TdError};
pub(super) use tdusb_lib::models::{self as model_table, DeviceProfile, Protocol};
pub(super) use tdusb_lib::transport::{self, DiscoveredDevice, HidTransport};

const PADDING: usize = 2;

/// Compute alignment width for a command's key-value output.
/// Ensures at least PADDING spaces after the longest key in either level,
/// with top-level and indent values aligned to the same column.
pub(super) fn kv_width(top: &[&str], indent: &[&str]) -> usize {
    let top_max = top.iter().map(|k| k.len()).max().unwrap_or(0);
    let indent_max = indent.iter().map(|k| k.len()).max().unwrap_or(0);
    let top_need = if top.is_empty() { 0 } else { top_max + PADDING };
    // Indent keys lose 2 chars of inner width to the "  " prefix
    let indent_need = if indent.is_empty() {
        0
    } else {
        indent_max + PADDING + 2
    };
    top_need.max(indent_need)
}

pub(super) fn kv(key: &str, value: impl std::fmt::Display, w: usize) {
    println!("{key:<width$}{value}", width = w);
}

pub(super) fn kv_indent(key: &str, value: impl std::fmt::Display, w: usize) {
    println!("  {key:<width$}{value}", width = w - 2);
}

/// Print one result value on its own line and flush stdout.
pub(super) fn print_value(value: impl std::fmt::Display) -> Result<()> {
    let mut out = std::io::stdout().lock();
    writeln!(out, "{value}")?;
    out.flush()?;
    Ok(())
}

pub(super) fn print_json(value: &impl Serialize) -> Result<()> {
    let text = serde_json::to_string_pretty(value).map_err(std::io::Error::other)?;
    print_value(text)
}

pub(super) fn protocol_label(protocol: Protocol) -> &'static str {
    match protocol {
        Protocol::FeatureReport => "feature-report",
        Protocol::Register => "register",
    }
}

// ── Device selection ──

/// A model name plus an optional serial number, parsed from `MODEL[:SERIAL]`.
#[derive(Debug, Clone)]
pub struct DeviceSelector {
    pub profile: &'static DeviceProfile,
    pub serial: Option<String>,
}

impl FromStr for DeviceSelector {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (model, serial) = match s.split_once(':') {
            Some((m, sn)) => (m, Some(sn.trim())),
            None => (s, None),
        };
        let profile = parse_model(model)?;
        match serial {
            Some("") => Err(format!("empty serial number in '{s}'")),
            serial => Ok(DeviceSelector {
                profile,
                serial: serial.map(str::to_string),
            }),
        }
    }
}

/// clap value parser for a bare model name.
pub(super) fn parse_model(s: &str) -> std::result::Result<&'static DeviceProfile, String> {
    model_table::find_model(s).ok_or_else(|| {
        let names: Vec<&str> = model_table::ALL_MODELS.iter().map(|p| p.name).collect();
        format!("Unknown model: {s} (supported: {})", names.join(", "))
    })
}

/// clap value parser for a register address.
fn parse_address(s: &str) -> std::result::Result<u16, String> {
    tdusb_lib::device::parse_address(s).map_err(|e| e.to_string())
}

/// clap value parser for a register value.
fn parse_value(s: &str) -> std::result::Result<u32, String> {
    tdusb_lib::device::parse_value(s).map_err(|e| e.to_string())
}

/// Use the given selector, falling back to `default_model` from the config.
pub(super) fn resolve_selector(
    selector: Option<DeviceSelector>,
    config: &Config,
) -> Result<DeviceSelector> {
    if let Some(sel) = selector {
        return Ok(sel);
    }
    let Some(model) = config.default_model() else {
        return Err(TdError::InvalidOption(
            "No device given and no default_model configured.".into(),
        ));
    };
    model.parse().map_err(TdError::InvalidOption)
}

/// Reject register-level commands before opening a device that can't run them.
pub(super) fn require_register(selector: &DeviceSelector, what: &str) -> Result<()> {
    if selector.profile.protocol == Protocol::Register {
        return Ok(());
    }
    Err(TdError::InvalidOption(format!(
        "{} does not support {what}",
        selector.profile.name
    )))
}

/// Load config from `custom_path` or the default location, logging parse warnings.
pub(super) fn load_config(custom_path: Option<&Path>) -> Config {
    let (config, warnings) = match custom_path {
        Some(p) => Config::load_from(p),
        None => Config::load_with_warnings(),
    };
    for w in &warnings {
        log::warn!("{w}");
    }
    config
}

/// Open the selected device, run `f` against it, then close it.
///
/// The transport is dropped before the result is returned, so errors reach
/// the top level with the device already released.
pub(super) fn with_device<T>(
    selector: &DeviceSelector,
    config: &Config,
    args: &[String],
    f: impl FnOnce(&dyn TdDevice, &Context<'_>) -> Result<T>,
) -> Result<T> {
    let transport = transport::open_transport(
        selector.profile,
        selector.serial.as_deref(),
        config.listen_timeout_ms,
    )?;
    log::debug!("{} at {}", selector.profile.name, transport.path());
    let ctx = Context::new(&transport, selector.profile, args)
        .with_policy(RetryPolicy::from_config(config));
    f(driver_for(selector.profile), &ctx)
}

// ── JSON output structs ──

#[derive(Serialize)]
pub(super) struct RegisterJson {
    pub name: &'static str,
    pub address: String,
}

#[derive(Serialize)]
pub(super) struct ModelJson {
    pub name: &'static str,
    pub vendor_id: String,
    pub product_id: String,
    pub protocol: &'static str,
    pub input_report_size: usize,
    pub output_report_size: usize,
    pub registers: Vec<RegisterJson>,
}

#[derive(Serialize)]
pub(super) struct DevicesOutput {
    pub count: usize,
    pub devices: Vec<DiscoveredDevice>,
}

#[derive(Serialize)]
pub(super) struct ValueOutput {
    pub model: &'static str,
    pub field: Option<String>,
    pub value: String,
}

#[derive(Serialize)]
pub(super) struct RegisterValueOutput {
    pub model: &'static str,
    pub address: String,
    pub value: u32,
}

#[derive(Serialize)]
pub(super) struct InitOutput {
    pub model: &'static str,
    pub serial: String,
}

#[derive(Serialize)]
pub(super) struct ConfigOutput {
    pub config_file: Option<String>,
    pub config_file_exists: bool,
    pub settings: Config,
    pub problems: Vec<String>,
}

#[derive(Subcommand)]
pub enum Command {
    /// List supported device models
    Models,

    /// List connected supported devices
    List {
        /// Only list devices of this model (default: config default_model, else all)
        #[arg(value_parser = parse_model)]
        model: Option<&'static DeviceProfile>,
    },

    /// Write a new serial number (current Unix time)
    Init {
        /// MODEL[:SERIAL] (default: config default_model)
        device: Option<DeviceSelector>,
    },

    /// Set a device value (IWT120: MODE; register devices: NAME=VALUE)
    Set {
        /// MODEL[:SERIAL]
        device: DeviceSelector,
        values: Vec<String>,
    },

    /// Read a device value and print it
    Get {
        /// MODEL[:SERIAL]
        device: DeviceSelector,
        fields: Vec<String>,
    },

    /// Read a raw register (register devices)
    ReadReg {
        /// MODEL[:SERIAL]
        device: DeviceSelector,
        /// Register address (decimal or 0x hex)
        #[arg(value_parser = parse_address)]
        address: u16,
    },

    /// Write a raw register (register devices)
    WriteReg {
        /// MODEL[:SERIAL]
        device: DeviceSelector,
        /// Register address (decimal or 0x hex)
        #[arg(value_parser = parse_address)]
        address: u16,
        /// Value (decimal or 0x hex)
        #[arg(value_parser = parse_value)]
        value: u32,
    },

    /// Persist device registers to flash
    Save {
        /// MODEL[:SERIAL] (default: config default_model)
        device: Option<DeviceSelector>,
    },

    /// Erase the device firmware (device is unusable until reflashed)
    Destroy {
        /// MODEL[:SERIAL] (default: config default_model)
        device: Option<DeviceSelector>,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Show current configuration and file path
    Config,
}

/// Warn if `--json` was passed to a command that doesn't support it.
fn warn_json_unsupported(cmd_name: &str) {
    log::warn!("--json is not supported for `{cmd_name}` (ignored)");
}

pub fn run(cmd: Command, json: bool, config_path: Option<&Path>) -> Result<()> {
    // Device commands refuse to run on an invalid config; `config` shows it.
    let config = || load_config(config_path).checked();

    match cmd {
        Command::Models => models::cmd_models(json),
        Command::List { model } => list::cmd_list(model, &config()?, json),
        Command::Init { device } => {
            let config = config()?;
            init::cmd_init(&resolve_selector(device, &config)?, &config, json)
        }
        Command::Set { device, values } => {
            if json {
                warn_json_unsupported("set");
            }
            value::cmd_set(&device, &config()?, &values)
        }
        Command::Get { device, fields } => value::cmd_get(&device, &config()?, &fields, json),
        Command::ReadReg { device, address } => {
            register::cmd_read_reg(&device, &config()?, address, json)
        }
        Command::WriteReg {
            device,
            address,
            value,
        } => {
            if json {
                warn_json_unsupported("write-reg");
            }
            register::cmd_write_reg(&device, &config()?, address, value)
        }
        Command::Save { device } => {
            if json {
                warn_json_unsupported("save");
            }
            let config = config()?;
            flash::cmd_save(&resolve_selector(device, &config)?, &config)
        }
        Command::Destroy { device, yes } => {
            if json {
                warn_json_unsupported("destroy");
            }
            let config = config()?;
            flash::cmd_destroy(&resolve_selector(device, &config)?, &config, yes)
        }
        Command::Config => config_cmd::cmd_config(json, config_path),
    }
}

#[cfg(test)]
mod selector_tests {
    use super::*;

    #[test]
    fn model_only() {
        let sel: DeviceSelector = "IWT120".parse().unwrap();
        assert_eq!(sel.profile.name, "IWT120");
        assert_eq!(sel.serial, None);
    }

    #[test]
    fn model_with_serial() {
        let sel: DeviceSelector = "tddev2:1700000000".parse().unwrap();
        assert_eq!(sel.profile.name, "TDDEV2");
        assert_eq!(sel.serial.as_deref(), Some("1700000000"));
    }

    #[test]
    fn unknown_model_lists_supported() {
        let err = "IWT999".parse::<DeviceSelector>().unwrap_err();
        assert!(err.contains("Unknown model: IWT999"));
        assert!(err.contains("IWT120"));
    }

    #[test]
    fn empty_serial_rejected() {
        assert!("IWT120:".parse::<DeviceSelector>().is_err());
    }

    #[test]
    fn resolve_prefers_explicit_selector() {
        let config = Config {
            default_model: "TDDEV2".into(),
            ..Config::default()
        };
        let explicit: DeviceSelector = "IWT120".parse().unwrap();
        let sel = resolve_selector(Some(explicit), &config).unwrap();
        assert_eq!(sel.profile.name, "IWT120");
    }

    #[test]
    fn resolve_falls_back_to_default_model() {
        let config = Config {
            default_model: "TDDEV2".into(),
            ..Config::default()
        };
        let sel = resolve_selector(None, &config).unwrap();
        assert_eq!(sel.profile.name, "TDDEV2");
    }

    #[test]
    fn resolve_without_default_is_invalid_option() {
        let err = resolve_selector(None, &Config::default()).unwrap_err();
        assert!(matches!(err, TdError::InvalidOption(_)));
    }

    #[test]
    fn register_commands_rejected_for_feature_report_models() {
        let iwt: DeviceSelector = "IWT120".parse().unwrap();
        let err = require_register(&iwt, "saving to flash").unwrap_err();
        assert_eq!(err.to_string(), "Invalid option: IWT120 does not support saving to flash");
        let dev2: DeviceSelector = "TDDEV2".parse().unwrap();
        assert!(require_register(&dev2, "saving to flash").is_ok());
    }

    #[test]
    fn address_parser_accepts_hex() {
        assert_eq!(parse_address("0x0010"), Ok(0x10));
        assert!(parse_address("70000").is_err());
        assert_eq!(parse_value("4294967295"), Ok(u32::MAX));
    }
}

#[cfg(test)]
mod format_tests {
    use super::*;

    #[test]
    fn kv_width_top_only() {
        let w = kv_width(&["Short:", "Longer key:"], &[]);
        // "Longer key:" = 11 + PADDING = 13
        assert_eq!(w, 13);
    }

    #[test]
    fn kv_width_indent_drives_width() {
        let w = kv_width(&["A:"], &["Report size:"]);
        // "Report size:" = 12 + PADDING + 2 = 16
        assert_eq!(w, 16);
    }

    #[test]
    fn kv_width_empty_both() {
        assert_eq!(kv_width(&[], &[]), 0);
    }

    #[test]
    fn protocol_labels_distinct() {
        assert_ne!(
            protocol_label(Protocol::FeatureReport),
            protocol_label(Protocol::Register)
        );
    }
}
