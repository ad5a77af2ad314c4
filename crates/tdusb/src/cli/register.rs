//! `read-reg` / `write-reg` subcommands — raw register access.

use super::{
    Config, DeviceSelector, RegisterValueOutput, Result, print_json, print_value, require_register,
    with_device,
};

pub(super) fn cmd_read_reg(
    selector: &DeviceSelector,
    config: &Config,
    address: u16,
    json: bool,
) -> Result<()> {
    require_register(selector, "register reads")?;
    let value = with_device(selector, config, &[], |dev, ctx| {
        dev.read_register(ctx, address)
    })?;

    if json {
        return print_json(&RegisterValueOutput {
            model: selector.profile.name,
            address: format!("0x{address:04X}"),
            value,
        });
    }
    print_value(value)
}

pub(super) fn cmd_write_reg(
    selector: &DeviceSelector,
    config: &Config,
    address: u16,
    value: u32,
) -> Result<()> {
    require_register(selector, "register writes")?;
    with_device(selector, config, &[], |dev, ctx| {
        dev.write_register(ctx, address, value)
    })
}
