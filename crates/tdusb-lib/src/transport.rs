//! HID transport — trait + hidapi backend.

use std::fmt;

use serde::Serialize;

use crate::models::DeviceProfile;

// ── Error type ──

/// Device communication errors.
///
/// String payloads follow the convention **"context: details"** where *context*
/// identifies the operation or step (e.g. `"OUTPUT report"`, `"hid open"`) and
/// *details* describes what went wrong.
#[derive(Debug)]
pub enum DeviceError {
    NotFound(String),
    OpenFailed(String),
    Io(String),
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::NotFound(what) => write!(f, "Device not found: {what}"),
            DeviceError::OpenFailed(e) => write!(f, "Failed to open device: {e}"),
            DeviceError::Io(e) => write!(f, "USB I/O error: {e}"),
        }
    }
}

impl std::error::Error for DeviceError {}

pub type Result<T> = std::result::Result<T, DeviceError>;

/// HID report type used for an outgoing report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Feature,
    Output,
}

// ── Trait ──

/// Blocking HID report I/O for one opened device.
///
/// Buffers passed in and returned include the leading report-id byte.
/// The handle is closed when the transport is dropped.
pub trait HidTransport {
    /// Send one report of the given kind.
    fn send_report(&self, report: &[u8], kind: ReportKind) -> Result<()>;

    /// Wait for one INPUT report of up to `len` bytes.
    ///
    /// Returns `Ok(None)` when the per-call timeout elapses without data.
    fn receive_report(&self, len: usize) -> Result<Option<Vec<u8>>>;

    /// Read the current FEATURE report (`len` bytes including report id).
    fn get_feature_report(&self, len: usize) -> Result<Vec<u8>>;

    /// Human-readable location of the device (for logs and `list`).
    fn path(&self) -> &str;
}

// ── hidapi implementation ──

#[cfg(feature = "hidapi")]
mod hidapi_impl {
    use super::*;

    use hidapi::{HidApi, HidDevice};

    pub struct HidapiTransport {
        device: HidDevice,
        path: String,
        listen_timeout_ms: i32,
    }

    fn io_err(context: &str) -> impl Fn(hidapi::HidError) -> DeviceError + '_ {
        move |e| DeviceError::Io(format!("{context}: {e}"))
    }

    pub(super) fn api() -> Result<HidApi> {
        HidApi::new().map_err(|e| DeviceError::OpenFailed(format!("hidapi init: {e}")))
    }

    pub(super) fn matches(info: &hidapi::DeviceInfo, profile: &DeviceProfile) -> bool {
        info.vendor_id() == profile.vendor_id
            && info.product_id() == profile.product_id
            && info.product_string().unwrap_or_default() == profile.name
    }

    impl HidapiTransport {
        /// Open the first device matching `profile` (and `serial`, if given).
        pub fn open(
            profile: &DeviceProfile,
            serial: Option<&str>,
            listen_timeout_ms: u64,
        ) -> Result<Self> {
            let api = api()?;
            let info = api
                .device_list()
                .filter(|d| matches(d, profile))
                .find(|d| match serial {
                    Some(s) => d.serial_number().is_some_and(|sn| sn.eq_ignore_ascii_case(s)),
                    None => true,
                })
                .ok_or_else(|| match serial {
                    Some(s) => DeviceError::NotFound(format!("{} with serial '{s}'", profile.name)),
                    None => DeviceError::NotFound(profile.name.to_string()),
                })?;

            let path = info.path().to_string_lossy().to_string();
            let device = info
                .open_device(&api)
                .map_err(|e| DeviceError::OpenFailed(format!("hid open {path}: {e}")))?;
            log::debug!("opened {} at {path}", profile.name);

            Ok(HidapiTransport {
                device,
                path,
                listen_timeout_ms: i32::try_from(listen_timeout_ms).unwrap_or(i32::MAX),
            })
        }
    }

    impl HidTransport for HidapiTransport {
        fn send_report(&self, report: &[u8], kind: ReportKind) -> Result<()> {
            match kind {
                ReportKind::Feature => self
                    .device
                    .send_feature_report(report)
                    .map_err(io_err("FEATURE report")),
                ReportKind::Output => {
                    let n = self.device.write(report).map_err(io_err("OUTPUT report"))?;
                    if n < report.len() {
                        return Err(DeviceError::Io(format!(
                            "OUTPUT report: short write ({n} of {} bytes)",
                            report.len()
                        )));
                    }
                    Ok(())
                }
            }
        }

        fn receive_report(&self, len: usize) -> Result<Option<Vec<u8>>> {
            // hidapi strips the report id on unnumbered devices; keep byte 0
            // as the placeholder so offsets match the outgoing layout.
            let mut buf = vec![0u8; len];
            let n = self
                .device
                .read_timeout(&mut buf[1..], self.listen_timeout_ms)
                .map_err(io_err("INPUT report"))?;
            if n == 0 {
                return Ok(None);
            }
            Ok(Some(buf))
        }

        fn get_feature_report(&self, len: usize) -> Result<Vec<u8>> {
            let mut buf = vec![0u8; len];
            let n = self
                .device
                .get_feature_report(&mut buf)
                .map_err(io_err("GET FEATURE report"))?;
            buf.truncate(n.max(1));
            buf.resize(len, 0);
            Ok(buf)
        }

        fn path(&self) -> &str {
            &self.path
        }
    }

    impl Drop for HidapiTransport {
        fn drop(&mut self) {
            log::debug!("closing {}", self.path);
        }
    }
}

#[cfg(feature = "hidapi")]
pub use hidapi_impl::HidapiTransport;

// ── Stub transport when built without HID support ──

/// Placeholder transport that never finds a device.
#[cfg(not(feature = "hidapi"))]
pub struct StubTransport;

#[cfg(not(feature = "hidapi"))]
impl StubTransport {
    pub fn open(profile: &DeviceProfile, _serial: Option<&str>, _timeout_ms: u64) -> Result<Self> {
        Err(DeviceError::NotFound(format!(
            "{} (built without HID support)",
            profile.name
        )))
    }
}

#[cfg(not(feature = "hidapi"))]
impl HidTransport for StubTransport {
    fn send_report(&self, _report: &[u8], _kind: ReportKind) -> Result<()> {
        unreachable!()
    }
    fn receive_report(&self, _len: usize) -> Result<Option<Vec<u8>>> {
        unreachable!()
    }
    fn get_feature_report(&self, _len: usize) -> Result<Vec<u8>> {
        unreachable!()
    }
    fn path(&self) -> &str {
        unreachable!()
    }
}

// ── Device enumeration ──

/// A connected device matching one of the supported profiles (not opened).
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveredDevice {
    pub model: &'static str,
    pub path: String,
    pub serial: Option<String>,
}

/// List connected devices for the given profiles.
///
/// Errors from the HID backend are logged and yield an empty list.
pub fn enumerate_devices(profiles: &[&'static DeviceProfile]) -> Vec<DiscoveredDevice> {
    #[cfg(feature = "hidapi")]
    {
        let api = match hidapi_impl::api() {
            Ok(api) => api,
            Err(e) => {
                log::warn!("{e}");
                return Vec::new();
            }
        };
        let mut found = Vec::new();
        for info in api.device_list() {
            if let Some(profile) = profiles.iter().find(|p| hidapi_impl::matches(info, p)) {
                found.push(DiscoveredDevice {
                    model: profile.name,
                    path: info.path().to_string_lossy().to_string(),
                    serial: info.serial_number().map(|s| s.to_string()),
                });
            }
        }
        found
    }
    #[cfg(not(feature = "hidapi"))]
    {
        let _ = profiles;
        Vec::new()
    }
}

/// Concrete transport type for this build.
#[cfg(feature = "hidapi")]
pub type PlatformTransport = HidapiTransport;
#[cfg(not(feature = "hidapi"))]
pub type PlatformTransport = StubTransport;

/// Open the device described by `profile`, optionally by serial number.
pub fn open_transport(
    profile: &DeviceProfile,
    serial: Option<&str>,
    listen_timeout_ms: u64,
) -> Result<PlatformTransport> {
    PlatformTransport::open(profile, serial, listen_timeout_ms)
}

// ── Mock transport for testing ──

/// In-memory transport for unit and integration tests.
///
/// Always compiled, hidden from public docs.
#[doc(hidden)]
pub mod mock {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::{HashMap, VecDeque};
    use std::rc::Rc;
    use std::time::Duration;

    use crate::protocol::{INPACKET_ACK, INPACKET_DEVREG, Opcode};

    /// One scripted result of `receive_report`.
    #[derive(Debug, Clone)]
    pub enum MockReply {
        Report(Vec<u8>),
        Timeout,
        IoError,
    }

    type Responder = Box<dyn FnMut(&[u8], ReportKind) -> Vec<MockReply>>;

    /// Scripted transport.
    ///
    /// Replies are served from `replies` in order; when it is empty `idle` is
    /// returned (default: timeout). An optional responder reacts to every sent
    /// report by queueing more replies, which is how firmware is emulated.
    pub struct MockTransport {
        /// Recorded outgoing reports: (bytes, kind).
        pub sent: RefCell<Vec<(Vec<u8>, ReportKind)>>,
        /// Queued receive results.
        pub replies: RefCell<VecDeque<MockReply>>,
        /// Returned when `replies` is empty.
        pub idle: RefCell<MockReply>,
        /// Current FEATURE report contents.
        pub feature_report: RefCell<Vec<u8>>,
        /// Number of `receive_report` + `get_feature_report` calls.
        pub receives: Cell<usize>,
        /// If true, `send_report` fails.
        pub fail_send: Cell<bool>,
        /// Sleep before each `receive_report` (simulates transport latency).
        pub receive_delay: Cell<Option<Duration>>,
        responder: RefCell<Option<Responder>>,
    }

    impl Default for MockTransport {
        fn default() -> Self {
            Self::new()
        }
    }

    /// Build a DEVREG reply report.
    pub fn devreg_report(addr: u16, value: u32) -> Vec<u8> {
        let mut r = vec![0x00, INPACKET_DEVREG];
        r.extend_from_slice(&addr.to_le_bytes());
        r.extend_from_slice(&value.to_le_bytes());
        r
    }

    /// Build an ACK report echoing `opcode`.
    pub fn ack_report(opcode: Opcode) -> Vec<u8> {
        vec![0x00, INPACKET_ACK, opcode.byte()]
    }

    /// Unrelated telemetry packet.
    pub fn noise_report() -> Vec<u8> {
        vec![0x00, 0x55, 0xAA, 0x01, 0x02]
    }

    impl MockTransport {
        pub fn new() -> Self {
            MockTransport {
                sent: RefCell::new(Vec::new()),
                replies: RefCell::new(VecDeque::new()),
                idle: RefCell::new(MockReply::Timeout),
                feature_report: RefCell::new(Vec::new()),
                receives: Cell::new(0),
                fail_send: Cell::new(false),
                receive_delay: Cell::new(None),
                responder: RefCell::new(None),
            }
        }

        /// Transport emulating register firmware: SET stores and ACKs, GET
        /// replies with the stored value (or times out for unknown addresses),
        /// SAVE ACKs. Returns the shared register map for inspection.
        pub fn with_register_firmware() -> (Self, Rc<RefCell<HashMap<u16, u32>>>) {
            let regs = Rc::new(RefCell::new(HashMap::new()));
            let mock = Self::new();
            let store = Rc::clone(&regs);
            mock.set_responder(move |report, _kind| {
                let frame = crate::protocol::Frame::from_report(report.len().max(8), report);
                match frame.opcode() {
                    Some(Opcode::Set) => {
                        store.borrow_mut().insert(frame.address(), frame.value());
                        vec![MockReply::Report(ack_report(Opcode::Set))]
                    }
                    Some(Opcode::Get) => match store.borrow().get(&frame.address()) {
                        Some(&v) => vec![MockReply::Report(devreg_report(frame.address(), v))],
                        None => vec![],
                    },
                    Some(Opcode::Save) => vec![MockReply::Report(ack_report(Opcode::Save))],
                    _ => vec![],
                }
            });
            (mock, regs)
        }

        /// Install a responder invoked on every successful `send_report`.
        pub fn set_responder(
            &self,
            f: impl FnMut(&[u8], ReportKind) -> Vec<MockReply> + 'static,
        ) {
            *self.responder.borrow_mut() = Some(Box::new(f));
        }

        pub fn push_reply(&self, reply: MockReply) {
            self.replies.borrow_mut().push_back(reply);
        }

        /// Outgoing reports whose opcode byte equals `opcode`.
        pub fn sent_with_opcode(&self, opcode: Opcode) -> usize {
            self.sent
                .borrow()
                .iter()
                .filter(|(r, _)| r.get(1) == Some(&opcode.byte()))
                .count()
        }

        /// Total number of transport calls of any kind.
        pub fn io_calls(&self) -> usize {
            self.sent.borrow().len() + self.receives.get()
        }
    }

    impl HidTransport for MockTransport {
        fn send_report(&self, report: &[u8], kind: ReportKind) -> Result<()> {
            self.sent.borrow_mut().push((report.to_vec(), kind));
            if self.fail_send.get() {
                return Err(DeviceError::Io("mock: send failure injected".into()));
            }
            if let Some(responder) = self.responder.borrow_mut().as_mut() {
                let queued = responder(report, kind);
                self.replies.borrow_mut().extend(queued);
            }
            Ok(())
        }

        fn receive_report(&self, len: usize) -> Result<Option<Vec<u8>>> {
            self.receives.set(self.receives.get() + 1);
            if let Some(d) = self.receive_delay.get() {
                std::thread::sleep(d);
            }
            let next = self
                .replies
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| self.idle.borrow().clone());
            match next {
                MockReply::Report(mut r) => {
                    r.resize(len, 0);
                    Ok(Some(r))
                }
                MockReply::Timeout => Ok(None),
                MockReply::IoError => Err(DeviceError::Io("mock: receive failure injected".into())),
            }
        }

        fn get_feature_report(&self, len: usize) -> Result<Vec<u8>> {
            self.receives.set(self.receives.get() + 1);
            let mut r = self.feature_report.borrow().clone();
            r.resize(len, 0);
            Ok(r)
        }

        fn path(&self) -> &str {
            "mock://td-usb"
        }
    }
}
