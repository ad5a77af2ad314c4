//! Protocol constants and frame layout for Tokyo Devices HID instruments.
//!
//! Every report exchanged with a device is a [`Frame`]: a leading report-id
//! placeholder byte, a one-byte opcode, then an opcode-dependent payload.
//!
//! ```text
//! offset  0      1        2..4          4..8
//!         [0x00][opcode][addr: u16 LE][value: u32 LE][zero padding ...]
//! ```
//!
//! The frame length is always the device's declared report size plus one,
//! independent of the payload carried.

use std::fmt;

// ── Opcodes ──
//
// Byte values are fixed by deployed firmware and must not change.

/// TDDEV1 standard INIT — payload is the new serial number as ASCII.
pub const CMD_INIT: u8 = 0x01;

/// OUTPACKET_SET — write a device register: `[addr:u16][value:u32]`.
pub const OUTPACKET_SET: u8 = 0x10;

/// OUTPACKET_GET — request a device register: `[addr:u16]`.
pub const OUTPACKET_GET: u8 = 0x11;

/// OUTPACKET_SAVE — persist registers to flash: `[magic:u8]`.
pub const OUTPACKET_SAVE: u8 = 0x12;

/// OUTPACKET_ERASE — erase the application firmware: `[magic:u8; 3]`.
pub const OUTPACKET_ERASE: u8 = 0x1F;

/// INPACKET_ACK — acknowledgement; byte 2 echoes the acknowledged opcode.
pub const INPACKET_ACK: u8 = 0x80;

/// INPACKET_DEVREG — register value reply: `[addr:u16][value:u32]`.
pub const INPACKET_DEVREG: u8 = 0x81;

// ── Magic bytes ──

/// Guard byte required by firmware before it accepts a SAVE.
pub const SAVE_MAGIC: u8 = 0x50;

/// Guard bytes required by firmware before it accepts an ERASE.
pub const ERASE_MAGIC: [u8; 3] = [0x31, 0x1C, 0x66];

// ── Read-path policy ──

/// Maximum GET attempts before a register read is abandoned.
pub const MAX_RETRIES: u32 = 3;

/// Soft deadline per GET attempt while only unrelated packets arrive.
pub const SOFT_DEADLINE_MS: u64 = 1000;

/// Default per-receive timeout for the HID transport.
///
/// Must be well below [`SOFT_DEADLINE_MS`] or the soft deadline never fires
/// before the transport itself times out.
pub const LISTEN_TIMEOUT_MS: u64 = 200;

// ── Frame offsets ──

const OFF_OPCODE: usize = 1;
const OFF_PAYLOAD: usize = 2;
const OFF_ADDRESS: usize = 2;
const OFF_VALUE: usize = 4;

/// Closed set of opcodes understood by the register protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Init,
    Set,
    Get,
    Save,
    Erase,
    Ack,
    DevregValue,
}

impl Opcode {
    /// Wire byte for this opcode.
    pub const fn byte(self) -> u8 {
        match self {
            Opcode::Init => CMD_INIT,
            Opcode::Set => OUTPACKET_SET,
            Opcode::Get => OUTPACKET_GET,
            Opcode::Save => OUTPACKET_SAVE,
            Opcode::Erase => OUTPACKET_ERASE,
            Opcode::Ack => INPACKET_ACK,
            Opcode::DevregValue => INPACKET_DEVREG,
        }
    }

    /// Decode a wire byte. Returns `None` for bytes outside the protocol.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            CMD_INIT => Some(Opcode::Init),
            OUTPACKET_SET => Some(Opcode::Set),
            OUTPACKET_GET => Some(Opcode::Get),
            OUTPACKET_SAVE => Some(Opcode::Save),
            OUTPACKET_ERASE => Some(Opcode::Erase),
            INPACKET_ACK => Some(Opcode::Ack),
            INPACKET_DEVREG => Some(Opcode::DevregValue),
            _ => None,
        }
    }
}

/// A single HID report, including the leading report-id placeholder.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: Vec<u8>,
}

impl Frame {
    /// All-zero frame for a device with the given report size.
    pub fn zeroed(report_size: usize) -> Self {
        Frame {
            bytes: vec![0u8; report_size + 1],
        }
    }

    /// Zeroed frame with only the opcode set.
    pub fn command(report_size: usize, opcode: Opcode) -> Self {
        Self::vendor_command(report_size, opcode.byte())
    }

    /// Zeroed frame carrying a model-specific opcode byte outside [`Opcode`].
    pub fn vendor_command(report_size: usize, opcode: u8) -> Self {
        let mut frame = Self::zeroed(report_size);
        frame.bytes[OFF_OPCODE] = opcode;
        frame
    }

    /// Wrap raw bytes received from the transport.
    ///
    /// Short reads are zero-extended and long reads truncated so the frame is
    /// always `report_size + 1` bytes.
    pub fn from_report(report_size: usize, raw: &[u8]) -> Self {
        let mut frame = Self::zeroed(report_size);
        let n = raw.len().min(frame.bytes.len());
        frame.bytes[..n].copy_from_slice(&raw[..n]);
        frame
    }

    /// GET request for `addr`.
    pub fn get(report_size: usize, addr: u16) -> Self {
        let mut frame = Self::command(report_size, Opcode::Get);
        frame.put_address(addr);
        frame
    }

    /// SET request writing `value` to `addr`.
    pub fn set(report_size: usize, addr: u16, value: u32) -> Self {
        let mut frame = Self::command(report_size, Opcode::Set);
        frame.put_address(addr);
        frame.put_value(value);
        frame
    }

    /// Copy `payload` in after the opcode byte.
    ///
    /// Returns `None` if the payload does not fit the frame.
    pub fn with_payload(mut self, payload: &[u8]) -> Option<Self> {
        let end = OFF_PAYLOAD + payload.len();
        if end > self.bytes.len() {
            return None;
        }
        self.bytes[OFF_PAYLOAD..end].copy_from_slice(payload);
        Some(self)
    }

    fn put_address(&mut self, addr: u16) {
        self.bytes[OFF_ADDRESS..OFF_ADDRESS + 2].copy_from_slice(&addr.to_le_bytes());
    }

    fn put_value(&mut self, value: u32) {
        self.bytes[OFF_VALUE..OFF_VALUE + 4].copy_from_slice(&value.to_le_bytes());
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Raw opcode byte.
    pub fn opcode_byte(&self) -> u8 {
        self.bytes[OFF_OPCODE]
    }

    pub fn opcode(&self) -> Option<Opcode> {
        Opcode::from_byte(self.opcode_byte())
    }

    /// Payload bytes following the opcode.
    pub fn payload(&self) -> &[u8] {
        &self.bytes[OFF_PAYLOAD..]
    }

    /// Register address field (bytes 2..4).
    pub fn address(&self) -> u16 {
        u16::from_le_bytes([self.bytes[OFF_ADDRESS], self.bytes[OFF_ADDRESS + 1]])
    }

    /// Register value field (bytes 4..8).
    pub fn value(&self) -> u32 {
        let mut v = [0u8; 4];
        v.copy_from_slice(&self.bytes[OFF_VALUE..OFF_VALUE + 4]);
        u32::from_le_bytes(v)
    }

    /// True if this is a DEVREG reply for `addr`.
    pub fn is_devreg_for(&self, addr: u16) -> bool {
        self.opcode() == Some(Opcode::DevregValue) && self.address() == addr
    }

    /// True if this is an ACK; `for_opcode` additionally checks the echoed opcode.
    pub fn is_ack(&self, for_opcode: Option<Opcode>) -> bool {
        if self.opcode() != Some(Opcode::Ack) {
            return false;
        }
        match for_opcode {
            Some(op) => self.bytes[OFF_PAYLOAD] == op.byte(),
            None => true,
        }
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let head = &self.bytes[..self.bytes.len().min(8)];
        write!(f, "Frame({} bytes, {:02X?} ...)", self.bytes.len(), head)
    }
}
