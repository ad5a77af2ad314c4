//! `init` subcommand — write a timestamp serial number.

use super::{Config, DeviceSelector, InitOutput, Result, print_json, print_value, with_device};

pub(super) fn cmd_init(selector: &DeviceSelector, config: &Config, json: bool) -> Result<()> {
    let serial = with_device(selector, config, &[], |dev, ctx| dev.initialize(ctx))?;

    if json {
        return print_json(&InitOutput {
            model: selector.profile.name,
            serial,
        });
    }
    print_value(format_args!("Set serial number to {serial}"))
}
