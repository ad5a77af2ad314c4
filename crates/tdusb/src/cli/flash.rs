//! `save` / `destroy` subcommands — flash persistence and firmware erase.

use std::io::{BufRead, Write};

use super::{Config, DeviceSelector, Result, require_register, with_device};

const DESTROY_WARNING: &str =
    "WARNING: The device will not be available until new firmware is written. Continue? [y/N] ";

pub(super) fn cmd_save(selector: &DeviceSelector, config: &Config) -> Result<()> {
    require_register(selector, "saving to flash")?;
    with_device(selector, config, &[], |dev, ctx| dev.save(ctx))
}

pub(super) fn cmd_destroy(selector: &DeviceSelector, config: &Config, yes: bool) -> Result<()> {
    require_register(selector, "firmware erase")?;
    if !yes {
        let stdin = std::io::stdin();
        let confirmed = confirm(&mut stdin.lock(), &mut std::io::stdout())?;
        if !confirmed {
            return Ok(());
        }
    }
    with_device(selector, config, &[], |dev, ctx| dev.erase(ctx))
}

/// Ask before erasing. Only `y`/`Y` proceeds; anything else prints `abort.`.
fn confirm(input: &mut impl BufRead, out: &mut impl Write) -> std::io::Result<bool> {
    write!(out, "{DESTROY_WARNING}")?;
    out.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    if answer.trim().eq_ignore_ascii_case("y") {
        return Ok(true);
    }
    writeln!(out, "abort.")?;
    out.flush()?;
    Ok(false)
}
