//! Integration tests: register protocol through the public API.
//!
//! These drive `TdDevice` operations end to end against `MockTransport`
//! emulating register firmware, including interleaved telemetry and a
//! device that never answers.

use std::time::Duration;

use tdusb_lib::context::{Context, RetryPolicy};
use tdusb_lib::device::driver_for;
use tdusb_lib::devreg::{read_devreg, write_devreg};
use tdusb_lib::error::ExitCode;
use tdusb_lib::models::{ALL_MODELS, find_model};
use tdusb_lib::protocol::Opcode;
use tdusb_lib::transport::mock::*;
use tdusb_lib::transport::{DeviceError, ReportKind};

fn args(a: &[&str]) -> Vec<String> {
    a.iter().map(|s| s.to_string()).collect()
}

// ── Round trip ──

#[test]
fn write_then_read_round_trip() {
    let (t, regs) = MockTransport::with_register_firmware();
    let ctx = Context::new(&t, find_model("TDDEV2").unwrap(), &[]);

    write_devreg(&ctx, 0x0010, 0x1234_5678).unwrap();
    assert_eq!(regs.borrow().get(&0x0010), Some(&0x1234_5678));
    assert_eq!(read_devreg(&ctx, 0x0010).unwrap(), 0x1234_5678);
}

#[test]
fn round_trip_at_boundary_pairs() {
    let (t, _regs) = MockTransport::with_register_firmware();
    let ctx = Context::new(&t, find_model("TDDEV2").unwrap(), &[]);

    let pairs = [
        (0x0000, 0x0000_0000),
        (0xFFFF, u32::MAX),
        (0x00FF, 0x8000_0001),
        (0x0100, 0x0000_00FF),
        (0x8000, 0x7FFF_FFFF),
    ];
    for (addr, value) in pairs {
        write_devreg(&ctx, addr, value).unwrap();
        assert_eq!(read_devreg(&ctx, addr).unwrap(), value, "0x{addr:04X}");
    }
    assert_eq!(t.sent_with_opcode(Opcode::Set), pairs.len());
    assert_eq!(t.sent_with_opcode(Opcode::Get), pairs.len());
}

#[test]
fn set_then_get_through_device_operations() {
    let (t, _regs) = MockTransport::with_register_firmware();
    let profile = find_model("TDDEV2").unwrap();
    let driver = driver_for(profile);

    let set_args = args(&["INTERVAL=250"]);
    driver
        .apply_value(&Context::new(&t, profile, &set_args))
        .unwrap();

    let get_args = args(&["interval"]);
    let value = driver
        .query_value(&Context::new(&t, profile, &get_args))
        .unwrap();
    assert_eq!(value, "250");
}

// ── Noise handling ──

#[test]
fn telemetry_between_get_and_reply_is_ignored() {
    let t = MockTransport::new();
    // Firmware emits two telemetry packets before every register reply.
    t.set_responder(|report, _| {
        let mut out = vec![
            MockReply::Report(noise_report()),
            MockReply::Report(noise_report()),
        ];
        if report[1] == Opcode::Get.byte() {
            out.push(MockReply::Report(devreg_report(0x0011, 9)));
        }
        out
    });
    let ctx = Context::new(&t, find_model("TDDEV2").unwrap(), &[]);
    assert_eq!(read_devreg(&ctx, 0x0011).unwrap(), 9);
    assert_eq!(t.sent_with_opcode(Opcode::Get), 1);
    assert_eq!(t.receives.get(), 3);
}

#[test]
fn stale_reply_for_other_register_is_noise() {
    let t = MockTransport::new();
    t.push_reply(MockReply::Report(devreg_report(0x0010, 1)));
    t.push_reply(MockReply::Report(ack_report(Opcode::Set)));
    t.push_reply(MockReply::Report(devreg_report(0x0011, 2)));
    let ctx = Context::new(&t, find_model("TDDEV2").unwrap(), &[]);
    assert_eq!(read_devreg(&ctx, 0x0011).unwrap(), 2);
}

// ── Failure modes ──

#[test]
fn silent_device_fails_after_three_gets() {
    let t = MockTransport::new();
    let ctx = Context::new(&t, find_model("TDDEV2").unwrap(), &[]);
    let err = read_devreg(&ctx, 0x0001).unwrap_err();
    assert!(matches!(err, DeviceError::Io(_)));
    assert_eq!(t.sent_with_opcode(Opcode::Get), 3);
    for (report, kind) in t.sent.borrow().iter() {
        assert_eq!(*kind, ReportKind::Output);
        assert_eq!(report.len(), 33);
    }
}

#[test]
fn chatty_device_hits_soft_deadline() {
    let t = MockTransport::new();
    *t.idle.borrow_mut() = MockReply::Report(noise_report());
    t.receive_delay.set(Some(Duration::from_millis(1)));
    let ctx = Context::new(&t, find_model("TDDEV2").unwrap(), &[]).with_policy(RetryPolicy {
        max_retries: 2,
        soft_deadline: Duration::from_millis(3),
    });
    assert!(read_devreg(&ctx, 0x0001).is_err());
    assert_eq!(t.sent_with_opcode(Opcode::Get), 2);
}

#[test]
fn timeout_and_soft_deadline_share_one_retry_budget() {
    let t = MockTransport::new();
    t.push_reply(MockReply::Timeout);
    *t.idle.borrow_mut() = MockReply::Report(noise_report());
    t.receive_delay.set(Some(Duration::from_millis(1)));
    let ctx = Context::new(&t, find_model("TDDEV2").unwrap(), &[]).with_policy(RetryPolicy {
        max_retries: 3,
        soft_deadline: Duration::from_millis(5),
    });

    let err = read_devreg(&ctx, 0x0010).unwrap_err();
    assert!(err.to_string().contains("after 3 attempts"));
    // one timeout + two soft-deadline expiries
    assert_eq!(t.sent_with_opcode(Opcode::Get), 3);
}

#[test]
fn device_errors_map_to_io_exit_code() {
    let t = MockTransport::new();
    let profile = find_model("TDDEV2").unwrap();
    let a = args(&["SERIAL"]);
    let err = driver_for(profile)
        .query_value(&Context::new(&t, profile, &a))
        .unwrap_err();
    assert_eq!(err.exit_code(), ExitCode::DeviceIoError);
}

// ── Argument validation ──

#[test]
fn apply_value_arg_count_checked_before_io_on_every_model() {
    for profile in ALL_MODELS {
        for a in [args(&[]), args(&["1", "2"])] {
            let t = MockTransport::new();
            let err = driver_for(profile)
                .apply_value(&Context::new(&t, profile, &a))
                .unwrap_err();
            assert_eq!(err.exit_code(), ExitCode::InvalidOption, "{}", profile.name);
            assert_eq!(t.io_calls(), 0, "{}", profile.name);
        }
    }
}

#[test]
fn iwt120_unknown_field_reads_exactly_once() {
    let t = MockTransport::new();
    let profile = find_model("IWT120").unwrap();
    let a = args(&["BRIGHTNESS"]);
    let err = driver_for(profile)
        .query_value(&Context::new(&t, profile, &a))
        .unwrap_err();
    assert_eq!(err.exit_code(), ExitCode::InvalidOption);
    assert_eq!(t.receives.get(), 1);
}
