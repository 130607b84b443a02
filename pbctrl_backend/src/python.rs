//! Python bindings (feature `python`).
//!
//! The extension module is named `pbctrl_backend` and exposes a `PulseBlaster` class wrapping
//! [`crate::PulseBlaster`] over the native library, the opcode / programming-target / unit
//! constants, and a few free functions.
//!
//! Native failures raise `RuntimeError` carrying the `pb_get_error` message. A host with no
//! spinapi build raises `NotImplementedError`. Malformed flags or out-of-range codes raise
//! `ValueError`.
//!
//! # Example (python)
//! ```python
//! from pbctrl_backend import *
//!
//! pb = PulseBlaster()
//!
//! def program(pb):
//!     pb.start_programming(PULSE_PROGRAM)
//!     start = pb.inst("111111111111", CONTINUE, 0, 100 * us)
//!     pb.inst("000000000000", BRANCH, start, 100 * us)
//!     pb.stop_programming()
//!
//! pb.program_and_run(program)
//! ```

use std::path::PathBuf;
use std::time::Duration;

use pyo3::exceptions::{PyNotImplementedError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyTuple};

use pbinstr_backend::*;

use crate::board::{PulseBlaster, Registers};
use crate::driver::{self, RunConfig, RunOutcome};
use crate::error::SpinError;
use crate::loader::{Loader, LoaderConfig, NativeLoader};
use crate::logging::init_tracing;

impl From<SpinError> for PyErr {
    fn from(err: SpinError) -> PyErr {
        match &err {
            SpinError::UnsupportedPlatform { .. } => PyNotImplementedError::new_err(err.to_string()),
            SpinError::Native { message, .. } => PyRuntimeError::new_err(message.clone()),
            SpinError::Flags(_) => PyValueError::new_err(err.to_string()),
            _ => PyRuntimeError::new_err(err.to_string()),
        }
    }
}

fn value_error(err: impl ToString) -> PyErr {
    PyValueError::new_err(err.to_string())
}

/// Flags as passed from python: a bitmask or a string of `0`/`1` with flag 0 first.
#[derive(FromPyObject)]
enum FlagsArg {
    Text(String),
    Bits(u32),
}

impl From<FlagsArg> for Flags {
    fn from(arg: FlagsArg) -> Flags {
        match arg {
            FlagsArg::Text(text) => Flags::Text(text),
            FlagsArg::Bits(bits) => Flags::Bits(bits),
        }
    }
}

fn registers_to_py(py: Python, registers: Registers) -> PyObject {
    match registers {
        Registers::Single(index) => index.into_py(py),
        Registers::Many(indices) => PyTuple::new(py, indices).into_py(py),
    }
}

fn status_to_dict<'py>(py: Python<'py>, status: BoardStatus) -> PyResult<&'py PyDict> {
    let dict = PyDict::new(py);
    for (name, value) in status.to_map() {
        dict.set_item(name, value)?;
    }
    Ok(dict)
}

/// Polls the board with the GIL released, taking it back only to check for pending signals.
fn run_without_gil<L>(py: Python, board: &mut PulseBlaster<L>, config: &RunConfig) -> crate::Result<RunOutcome>
where
    L: Loader + Send,
{
    py.allow_threads(move || {
        driver::run_until_stopped(board, config, || {
            Python::with_gil(|py| py.check_signals().is_err())
        })
    })
}

#[pyclass(name = "PulseBlaster")]
pub struct PyPulseBlaster {
    board: PulseBlaster<NativeLoader>,
}

#[pymethods]
impl PyPulseBlaster {
    /// Creates a handle. The library is located from the arguments, falling back to the
    /// `SPINAPI_LIBRARY`, `SPINAPI_LIBRARY_DIR` and `SPINAPI_DEBUG` environment variables, and
    /// is loaded on the first call.
    #[new]
    #[pyo3(signature = (library_path=None, library_dir=None, debug=None))]
    fn new(library_path: Option<PathBuf>, library_dir: Option<PathBuf>, debug: Option<bool>) -> Self {
        let mut config = LoaderConfig::from_env();
        if let Some(path) = library_path {
            config = config.with_library_path(path);
        }
        if let Some(dir) = library_dir {
            config = config.with_library_dir(dir);
        }
        if let Some(debug) = debug {
            config = config.with_debug(debug);
        }
        Self {
            board: PulseBlaster::new(NativeLoader::new(config)),
        }
    }

    fn is_loaded(&self) -> bool {
        self.board.is_loaded()
    }

    fn get_error(&mut self) -> PyResult<String> {
        Ok(self.board.get_error()?)
    }

    fn version(&mut self) -> PyResult<String> {
        Ok(self.board.version()?)
    }

    fn firmware_id(&mut self) -> PyResult<u32> {
        Ok(self.board.firmware_id()?)
    }

    fn status_message(&mut self) -> PyResult<String> {
        Ok(self.board.status_message()?)
    }

    /// Returns `{"stopped": bool, "reset": bool, "running": bool, "waiting": bool}`.
    fn read_status<'py>(&mut self, py: Python<'py>) -> PyResult<&'py PyDict> {
        let status = self.board.read_status()?;
        status_to_dict(py, status)
    }

    fn count_boards(&mut self) -> PyResult<i32> {
        Ok(self.board.count_boards()?)
    }

    fn select_board(&mut self, board_num: i32) -> PyResult<()> {
        Ok(self.board.select_board(board_num)?)
    }

    fn init(&mut self) -> PyResult<()> {
        Ok(self.board.init()?)
    }

    fn set_debug(&mut self, debug: bool) -> PyResult<()> {
        Ok(self.board.set_debug(debug)?)
    }

    fn core_clock(&mut self, clock_freq: f64) -> PyResult<()> {
        Ok(self.board.core_clock(clock_freq)?)
    }

    fn start(&mut self) -> PyResult<()> {
        Ok(self.board.start()?)
    }

    fn stop(&mut self) -> PyResult<()> {
        Ok(self.board.stop()?)
    }

    fn reset(&mut self) -> PyResult<()> {
        Ok(self.board.reset()?)
    }

    fn close(&mut self) -> PyResult<()> {
        Ok(self.board.close()?)
    }

    fn write_register(&mut self, address: i32, value: i32) -> PyResult<i32> {
        Ok(self.board.write_register(address, value)?)
    }

    fn write_default_flags(&mut self, flags: FlagsArg) -> PyResult<()> {
        Ok(self.board.write_default_flags(flags)?)
    }

    fn start_programming(&mut self, device: i32) -> PyResult<()> {
        let target = ProgramTarget::try_from(device).map_err(value_error)?;
        Ok(self.board.start_programming(target)?)
    }

    fn stop_programming(&mut self) -> PyResult<()> {
        Ok(self.board.stop_programming()?)
    }

    fn select_dds(&mut self, dds: i32) -> PyResult<()> {
        Ok(self.board.select_dds(dds)?)
    }

    fn set_freq(&mut self, freq: f64) -> PyResult<()> {
        Ok(self.board.set_freq(freq)?)
    }

    fn set_phase(&mut self, phase: f64) -> PyResult<()> {
        Ok(self.board.set_phase(phase)?)
    }

    fn set_amp(&mut self, amp: f32, register: i32) -> PyResult<()> {
        Ok(self.board.set_amp(amp, register)?)
    }

    /// Programs one instruction with both DDS channels off and returns its address.
    fn inst(&mut self, flags: FlagsArg, inst: i32, inst_data: i32, length: f64) -> PyResult<i32> {
        let opcode = Opcode::try_from(inst).map_err(value_error)?;
        Ok(self.board.inst(flags, opcode, inst_data, length)?)
    }

    /// Programs one instruction with DDS register selection and returns its address.
    ///
    /// `dds_en*` and `phase_reset*` take `ANALOG_ON`/`ANALOG_OFF` and
    /// `PHASE_RESET`/`NO_PHASE_RESET`; any non-zero value counts as set.
    #[allow(clippy::too_many_arguments)]
    fn inst_dds2(
        &mut self,
        freq0: i32,
        phase0: i32,
        amp0: i32,
        dds_en0: i32,
        phase_reset0: i32,
        freq1: i32,
        phase1: i32,
        amp1: i32,
        dds_en1: i32,
        phase_reset1: i32,
        flags: FlagsArg,
        inst: i32,
        inst_data: i32,
        length: f64,
    ) -> PyResult<i32> {
        let opcode = Opcode::try_from(inst).map_err(value_error)?;
        let instr = DdsInstruction::new(
            DdsChannel::new(freq0, phase0, amp0, dds_en0 != 0, phase_reset0 != 0),
            DdsChannel::new(freq1, phase1, amp1, dds_en1 != 0, phase_reset1 != 0),
            Instruction::new(flags, opcode, inst_data, length),
        );
        Ok(self.board.inst_dds2(&instr)?)
    }

    /// Programs frequency registers; returns `0` for a single value, otherwise a tuple of indices.
    #[pyo3(signature = (*freqs))]
    fn program_freq_regs(&mut self, py: Python, freqs: &PyTuple) -> PyResult<PyObject> {
        let freqs: Vec<f64> = freqs.extract()?;
        let registers = self.board.program_freq_regs(&freqs)?;
        Ok(registers_to_py(py, registers))
    }

    #[pyo3(signature = (*phases))]
    fn program_phase_regs(&mut self, py: Python, phases: &PyTuple) -> PyResult<PyObject> {
        let phases: Vec<f64> = phases.extract()?;
        let registers = self.board.program_phase_regs(&phases)?;
        Ok(registers_to_py(py, registers))
    }

    #[pyo3(signature = (*amps))]
    fn program_amp_regs(&mut self, py: Python, amps: &PyTuple) -> PyResult<PyObject> {
        let amps: Vec<f32> = amps.extract()?;
        let registers = self.board.program_amp_regs(&amps)?;
        Ok(registers_to_py(py, registers))
    }

    /// Initializes the board, calls `program(self)`, starts it and polls until it stops.
    ///
    /// Ctrl-C during polling stops and closes the board. Returns the final status message, or
    /// `None` when interrupted.
    #[pyo3(signature = (program, core_clock=75.0, poll_interval=0.5))]
    fn program_and_run(
        slf: &PyCell<Self>,
        py: Python,
        program: PyObject,
        core_clock: f64,
        poll_interval: f64,
    ) -> PyResult<Option<String>> {
        let config = RunConfig {
            core_clock_mhz: core_clock,
            poll_interval: Duration::try_from_secs_f64(poll_interval).map_err(value_error)?,
        };

        driver::prepare(&mut slf.borrow_mut().board, &config)?;
        let this: &PyAny = slf;
        program.call1(py, (this,))?;

        let mut this = slf.borrow_mut();
        let outcome = run_without_gil(py, &mut this.board, &config)?;
        Ok(match outcome {
            RunOutcome::Finished(message) => Some(message),
            RunOutcome::Interrupted => None,
        })
    }
}

/// Installs the tracing subscriber; `level` is used when `RUST_LOG` is unset.
#[pyfunction]
#[pyo3(signature = (level="info"))]
fn init_logging(level: &str) -> bool {
    init_tracing(level)
}

#[pyfunction]
#[pyo3(name = "encode_flags")]
fn encode_flags_py(text: &str) -> PyResult<u32> {
    encode_flags(text).map_err(value_error)
}

#[pyfunction]
fn decode_status<'py>(py: Python<'py>, word: u32) -> PyResult<&'py PyDict> {
    status_to_dict(py, BoardStatus::from_raw(word))
}

#[pymodule]
fn pbctrl_backend(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<PyPulseBlaster>()?;
    m.add_function(wrap_pyfunction!(init_logging, m)?)?;
    m.add_function(wrap_pyfunction!(encode_flags_py, m)?)?;
    m.add_function(wrap_pyfunction!(decode_status, m)?)?;

    for opcode in Opcode::ALL {
        m.add(opcode.name(), opcode.code())?;
    }
    for target in [ProgramTarget::PulseProgram, ProgramTarget::FreqRegs, ProgramTarget::PhaseRegs] {
        m.add(target.name(), target.code())?;
    }

    m.add("ns", units::NS)?;
    m.add("us", units::US)?;
    m.add("ms", units::MS)?;
    m.add("s", units::S)?;
    m.add("MHz", units::MHZ)?;
    m.add("kHz", units::KHZ)?;
    m.add("Hz", units::HZ)?;

    m.add("ANALOG_ON", ANALOG_ON)?;
    m.add("ANALOG_OFF", ANALOG_OFF)?;
    m.add("PHASE_RESET", PHASE_RESET)?;
    m.add("NO_PHASE_RESET", NO_PHASE_RESET)?;
    Ok(())
}
