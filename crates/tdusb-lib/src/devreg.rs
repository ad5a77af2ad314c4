//! Register protocol — SET/GET with ACK correlation, SAVE and ERASE.
//!
//! Register firmware answers asynchronously on the INPUT pipe and may emit
//! unrelated telemetry in between, so every reply is classified by opcode
//! (and, for reads, by the echoed register address) before it is accepted.
//!
//! Reads retry up to [`RetryPolicy::max_retries`](crate::context::RetryPolicy)
//! attempts. An attempt ends when the transport times out, or when only
//! unrelated packets have arrived for longer than the soft deadline. Both
//! cases draw from the same retry budget. Exhausted retries are reported as
//! an I/O error like any other transport failure.
//!
//! Writes, SAVE and ERASE never retry.

use std::time::Instant;

use crate::context::Context;
use crate::protocol::{ERASE_MAGIC, Frame, Opcode, SAVE_MAGIC};
use crate::transport::{DeviceError, ReportKind, Result};

/// Receive one frame. Any receive that yields no report is an error.
fn listen_strict(ctx: &Context<'_>, what: &str) -> Result<Frame> {
    match ctx.transport.receive_report(ctx.input_len())? {
        Some(raw) => Ok(Frame::from_report(ctx.profile.input_report_size, &raw)),
        None => Err(DeviceError::Io(format!("{what}: timed out waiting for ACK"))),
    }
}

fn send_output(ctx: &Context<'_>, frame: &Frame) -> Result<()> {
    ctx.transport.send_report(frame.as_bytes(), ReportKind::Output)
}

/// Write `value` to register `addr` and wait for the device's ACK.
pub fn write_devreg(ctx: &Context<'_>, addr: u16, value: u32) -> Result<()> {
    let frame = Frame::set(ctx.profile.output_report_size, addr, value);
    log::debug!(">> OUTPACKET_SET (ADDR: 0x{addr:04X}, VALUE: 0x{value:08X})");
    send_output(ctx, &frame)?;

    log::debug!("listening for ACK");
    loop {
        let reply = listen_strict(ctx, "SET")?;
        if reply.is_ack(None) {
            log::debug!("<< INPACKET_ACK");
            return Ok(());
        }
    }
}

/// Read register `addr`.
pub fn read_devreg(ctx: &Context<'_>, addr: u16) -> Result<u32> {
    let max = ctx.policy.max_retries;
    let mut retry_count = 0;

    while retry_count < max {
        let start = Instant::now();

        log::debug!(">> OUTPACKET_GET (ADDR: 0x{addr:04X})");
        send_output(ctx, &Frame::get(ctx.profile.output_report_size, addr))?;

        loop {
            let Some(raw) = ctx.transport.receive_report(ctx.input_len())? else {
                retry_count += 1;
                log::debug!("GET 0x{addr:04X}: timeout (attempt {retry_count}/{max})");
                break;
            };
            let reply = Frame::from_report(ctx.profile.input_report_size, &raw);

            if reply.opcode() == Some(Opcode::DevregValue) {
                log::debug!("<< INPACKET_DEVREG (ADDR: 0x{:04X})", reply.address());
                if reply.address() == addr {
                    return Ok(reply.value());
                }
            } else {
                let payload = reply.payload();
                log::debug!(
                    "<< PACKET (0x{:02X}) {:02X?} ...",
                    reply.opcode_byte(),
                    &payload[..payload.len().min(5)]
                );
            }

            if start.elapsed() > ctx.policy.soft_deadline {
                retry_count += 1;
                log::debug!("GET 0x{addr:04X}: soft deadline passed (attempt {retry_count}/{max})");
                break;
            }
        }
    }

    let path = ctx.transport.path();
    log::warn!("GET 0x{addr:04X}: no reply from {path} after {max} attempts");
    Err(DeviceError::Io(format!(
        "no reply for register 0x{addr:04X} from {path} after {max} attempts"
    )))
}

/// Persist device registers to flash and wait for the SAVE ACK.
pub fn save_to_flash(ctx: &Context<'_>) -> Result<()> {
    let frame = Frame::command(ctx.profile.output_report_size, Opcode::Save)
        .with_payload(&[SAVE_MAGIC])
        .ok_or_else(|| DeviceError::Io("SAVE: frame too small".into()))?;

    log::debug!("sending SAVE command");
    send_output(ctx, &frame)?;

    log::debug!("listening for ACK reply");
    loop {
        let reply = listen_strict(ctx, "SAVE")?;
        if reply.is_ack(Some(Opcode::Save)) {
            return Ok(());
        }
    }
}

/// Send the ERASE command. The device runs no firmware afterwards until a
/// new image is written; no reply is expected.
pub fn erase_firmware(ctx: &Context<'_>) -> Result<()> {
    let frame = Frame::command(ctx.profile.output_report_size, Opcode::Erase)
        .with_payload(&ERASE_MAGIC)
        .ok_or_else(|| DeviceError::Io("ERASE: frame too small".into()))?;
    log::debug!("sending ERASE command");
    send_output(ctx, &frame)
}
