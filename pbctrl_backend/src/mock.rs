//! In-process stand-in for the spinapi library.
//!
//! [`MockSpinApi`] implements [`SpinApi`] without hardware: return codes, the error
//! message, the status word and the sequence of status messages are scripted, and every
//! call is recorded. Clones share state, so a test keeps one clone for inspection while the
//! board handle owns another through [`MockLoader`].
//!
//! ```
//! use pbctrl_backend::mock::{MockLoader, MockSpinApi};
//! use pbctrl_backend::{EntryPoint, PulseBlaster};
//!
//! let mock = MockSpinApi::new();
//! mock.set_code(EntryPoint::Init, 1);
//! mock.set_error_message("Board not found");
//!
//! let mut pb = PulseBlaster::new(MockLoader::new(mock.clone()));
//! let err = pb.init().unwrap_err();
//! assert_eq!(err.native_message(), Some("Board not found"));
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use pbinstr_backend::{EntryPoint, RawInstructionDds2};

use crate::error::{Result, SpinError};
use crate::loader::Loader;
use crate::spinapi::{CFloat32, CFloat64, CInt32, CUint32, SpinApi};

pub const MOCK_RUNNING_MESSAGE: &str = "Board is running.\n";
pub const MOCK_STOPPED_MESSAGE: &str = "Board is stopped.\n";

/// Arguments of a recorded call.
#[derive(Debug, Clone, PartialEq)]
pub enum CallArgs {
    None,
    Int(CInt32),
    Double(CFloat64),
    Amp(CFloat32, CInt32),
    Register(CInt32, CInt32),
    Inst(RawInstructionDds2),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MockCall {
    pub entry: EntryPoint,
    pub args: CallArgs,
}

#[derive(Debug)]
struct MockState {
    codes: IndexMap<EntryPoint, CInt32>,
    error_message: String,
    version: String,
    firmware_id: CUint32,
    board_count: CInt32,
    status_word: CUint32,
    status_messages: VecDeque<String>,
    last_status_message: String,
    next_address: CInt32,
    missing: Vec<EntryPoint>,
    calls: Vec<MockCall>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            codes: IndexMap::new(),
            error_message: String::new(),
            version: "20170214".to_string(),
            firmware_id: 0x0E01,
            board_count: 1,
            status_word: 0b0001,
            status_messages: VecDeque::new(),
            last_status_message: MOCK_STOPPED_MESSAGE.to_string(),
            next_address: 0,
            missing: Vec::new(),
            calls: Vec::new(),
        }
    }
}

/// Scriptable [`SpinApi`] implementation.
#[derive(Debug, Clone, Default)]
pub struct MockSpinApi {
    state: Arc<Mutex<MockState>>,
}

impl MockSpinApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `entry` return `code` from now on.
    ///
    /// Without a scripted code, `pb_inst_dds2` returns consecutive addresses starting at 0,
    /// `pb_count_boards` returns the board count and everything else returns 0.
    pub fn set_code(&self, entry: EntryPoint, code: CInt32) {
        self.state.lock().codes.insert(entry, code);
    }

    pub fn clear_code(&self, entry: EntryPoint) {
        self.state.lock().codes.shift_remove(&entry);
    }

    pub fn set_error_message(&self, message: &str) {
        self.state.lock().error_message = message.to_string();
    }

    pub fn set_version(&self, version: &str) {
        self.state.lock().version = version.to_string();
    }

    pub fn set_board_count(&self, count: CInt32) {
        self.state.lock().board_count = count;
    }

    pub fn set_status_word(&self, word: CUint32) {
        self.state.lock().status_word = word;
    }

    /// Queues messages returned by successive `pb_status_message` calls. Once the queue is
    /// empty the last message keeps being returned.
    pub fn push_status_messages<I, S>(&self, messages: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = self.state.lock();
        state.status_messages.extend(messages.into_iter().map(Into::into));
    }

    /// Makes calls to `entry` fail as if the library did not export it.
    pub fn remove_symbol(&self, entry: EntryPoint) {
        self.state.lock().missing.push(entry);
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().calls.clone()
    }

    /// Entry points called so far, in order.
    pub fn entries(&self) -> Vec<EntryPoint> {
        self.state.lock().calls.iter().map(|call| call.entry).collect()
    }

    pub fn count(&self, entry: EntryPoint) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| call.entry == entry)
            .count()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    fn record(&self, entry: EntryPoint, args: CallArgs) -> Result<CInt32> {
        let mut state = self.state.lock();
        state.calls.push(MockCall { entry, args });
        if state.missing.contains(&entry) {
            return Err(SpinError::LoadFailed {
                message: format!("symbol {} not exported", entry.symbol()),
            });
        }
        if let Some(code) = state.codes.get(&entry) {
            return Ok(*code);
        }
        Ok(match entry {
            EntryPoint::InstDds2 => {
                let address = state.next_address;
                state.next_address += 1;
                address
            }
            EntryPoint::CountBoards => state.board_count,
            EntryPoint::StartProgramming => {
                state.next_address = 0;
                0
            }
            _ => 0,
        })
    }
}

impl SpinApi for MockSpinApi {
    fn pb_get_error(&self) -> Result<String> {
        self.record(EntryPoint::GetError, CallArgs::None)?;
        Ok(self.state.lock().error_message.clone())
    }
    fn spinpts_get_version(&self) -> Result<String> {
        self.record(EntryPoint::GetVersion, CallArgs::None)?;
        Ok(self.state.lock().version.clone())
    }
    fn pb_get_firmware_id(&self) -> Result<CUint32> {
        self.record(EntryPoint::GetFirmwareId, CallArgs::None)?;
        Ok(self.state.lock().firmware_id)
    }
    fn pb_status_message(&self) -> Result<String> {
        self.record(EntryPoint::StatusMessage, CallArgs::None)?;
        let mut state = self.state.lock();
        if let Some(message) = state.status_messages.pop_front() {
            state.last_status_message = message;
        }
        Ok(state.last_status_message.clone())
    }
    fn pb_read_status(&self) -> Result<CUint32> {
        self.record(EntryPoint::ReadStatus, CallArgs::None)?;
        Ok(self.state.lock().status_word)
    }

    fn pb_count_boards(&self) -> Result<CInt32> {
        self.record(EntryPoint::CountBoards, CallArgs::None)
    }
    fn pb_select_board(&self, board_num: CInt32) -> Result<CInt32> {
        self.record(EntryPoint::SelectBoard, CallArgs::Int(board_num))
    }
    fn pb_init(&self) -> Result<CInt32> {
        self.record(EntryPoint::Init, CallArgs::None)
    }
    fn pb_set_debug(&self, debug: CInt32) -> Result<CInt32> {
        self.record(EntryPoint::SetDebug, CallArgs::Int(debug))
    }
    fn pb_core_clock(&self, clock_freq: CFloat64) -> Result<CInt32> {
        self.record(EntryPoint::CoreClock, CallArgs::Double(clock_freq))
    }

    fn pb_start_programming(&self, device: CInt32) -> Result<CInt32> {
        self.record(EntryPoint::StartProgramming, CallArgs::Int(device))
    }
    fn pb_stop_programming(&self) -> Result<CInt32> {
        self.record(EntryPoint::StopProgramming, CallArgs::None)
    }
    fn pb_select_dds(&self, dds: CInt32) -> Result<CInt32> {
        self.record(EntryPoint::SelectDds, CallArgs::Int(dds))
    }
    fn pb_set_freq(&self, freq: CFloat64) -> Result<CInt32> {
        self.record(EntryPoint::SetFreq, CallArgs::Double(freq))
    }
    fn pb_set_phase(&self, phase: CFloat64) -> Result<CInt32> {
        self.record(EntryPoint::SetPhase, CallArgs::Double(phase))
    }
    fn pb_set_amp(&self, amp: CFloat32, register: CInt32) -> Result<CInt32> {
        self.record(EntryPoint::SetAmp, CallArgs::Amp(amp, register))
    }
    fn pb_inst_dds2(&self, inst: &RawInstructionDds2) -> Result<CInt32> {
        self.record(EntryPoint::InstDds2, CallArgs::Inst(*inst))
    }

    fn pb_start(&self) -> Result<CInt32> {
        self.record(EntryPoint::Start, CallArgs::None)
    }
    fn pb_stop(&self) -> Result<CInt32> {
        self.record(EntryPoint::Stop, CallArgs::None)
    }
    fn pb_reset(&self) -> Result<CInt32> {
        self.record(EntryPoint::Reset, CallArgs::None)
    }
    fn pb_close(&self) -> Result<CInt32> {
        self.record(EntryPoint::Close, CallArgs::None)
    }
    fn pb_write_register(&self, address: CInt32, value: CInt32) -> Result<CInt32> {
        self.record(EntryPoint::WriteRegister, CallArgs::Register(address, value))
    }
}

/// [`Loader`] handing out clones of one [`MockSpinApi`] and counting load attempts.
#[derive(Debug, Clone)]
pub struct MockLoader {
    mock: MockSpinApi,
    loads: Arc<AtomicUsize>,
    failure: Option<String>,
    debug: Option<bool>,
}

impl MockLoader {
    pub fn new(mock: MockSpinApi) -> Self {
        Self {
            mock,
            loads: Arc::new(AtomicUsize::new(0)),
            failure: None,
            debug: None,
        }
    }

    /// Makes every load attempt fail with `message`.
    pub fn failing(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = Some(debug);
        self
    }

    pub fn mock(&self) -> &MockSpinApi {
        &self.mock
    }

    /// Number of load attempts so far, failed ones included.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl Loader for MockLoader {
    fn load(&self) -> Result<Box<dyn SpinApi + Send>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        match &self.failure {
            Some(message) => Err(SpinError::LoadFailed {
                message: message.clone(),
            }),
            None => Ok(Box::new(self.mock.clone())),
        }
    }

    fn debug_on_load(&self) -> Option<bool> {
        self.debug
    }
}
