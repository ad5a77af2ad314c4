//! `list` subcommand — list connected supported devices.

use super::{Config, DeviceProfile, DevicesOutput, Result, model_table, print_json};

pub(super) fn cmd_list(
    model: Option<&'static DeviceProfile>,
    config: &Config,
    json: bool,
) -> Result<()> {
    let model = model.or_else(|| config.default_model().and_then(model_table::find_model));
    let profiles: Vec<&'static DeviceProfile> = match model {
        Some(p) => vec![p],
        None => model_table::ALL_MODELS.to_vec(),
    };
    let devices = tdusb_lib::transport::enumerate_devices(&profiles);

    if json {
        let output = DevicesOutput {
            count: devices.len(),
            devices,
        };
        return print_json(&output);
    }

    if devices.is_empty() {
        println!("No supported devices found.");
        return Ok(());
    }

    println!(
        "Found {} device{}:",
        devices.len(),
        if devices.len() == 1 { "" } else { "s" }
    );
    println!();

    for (i, dev) in devices.iter().enumerate() {
        println!("  [{}] {}  {}", i + 1, dev.model, dev.path);
        if let Some(ref serial) = dev.serial {
            println!("      Serial: {serial}");
        }
    }

    Ok(())
}
