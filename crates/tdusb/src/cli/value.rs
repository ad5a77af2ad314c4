//! `set` / `get` subcommands — device values through the model's driver.

use super::{Config, DeviceSelector, Result, ValueOutput, print_json, print_value, with_device};

pub(super) fn cmd_set(selector: &DeviceSelector, config: &Config, values: &[String]) -> Result<()> {
    with_device(selector, config, values, |dev, ctx| dev.apply_value(ctx))
}

pub(super) fn cmd_get(
    selector: &DeviceSelector,
    config: &Config,
    fields: &[String],
    json: bool,
) -> Result<()> {
    let value = with_device(selector, config, fields, |dev, ctx| dev.query_value(ctx))?;

    if json {
        return print_json(&ValueOutput {
            model: selector.profile.name,
            field: fields.first().cloned(),
            value,
        });
    }
    print_value(value)
}
