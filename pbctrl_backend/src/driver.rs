//! Operator tooling: program a board and run it until it stops.
//!
//! [`program_and_run`] is the whole interactive sequence: log the API version, initialize
//! the board, set the core clock, call the caller's programming closure, start, poll the
//! status message until the board no longer reports running, then stop and close.
//!
//! Front-ends that need to run their own code between the two halves (the python bindings
//! hand the board back to a python callable) use [`prepare`] and [`run_until_stopped`]
//! directly.
//!
//! Polling ends early when the `interrupted` check returns `true`; the board is still stopped
//! and closed in that case. Native failures are returned immediately.

use std::thread;
use std::time::Duration;

use tracing::info;

use crate::board::PulseBlaster;
use crate::error::Result;
use crate::loader::Loader;

/// Status message reported while a program is executing.
pub const RUNNING_MESSAGE: &str = "Board is running.\n";
pub const DEFAULT_CORE_CLOCK_MHZ: f64 = 75.0;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub core_clock_mhz: f64,
    pub poll_interval: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            core_clock_mhz: DEFAULT_CORE_CLOCK_MHZ,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// How polling ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The board left the running state; holds the status message that ended polling.
    Finished(String),
    Interrupted,
}

/// Logs the API version, initializes the board and sets its core clock.
pub fn prepare<L: Loader>(board: &mut PulseBlaster<L>, config: &RunConfig) -> Result<()> {
    let version = board.version()?;
    info!(%version, "Spincore API version");
    info!("Initialising board");
    board.init()?;
    board.core_clock(config.core_clock_mhz)?;
    Ok(())
}

/// Starts the programmed board and polls until it stops or `interrupted` returns `true`,
/// then stops and closes it.
pub fn run_until_stopped<L, I>(
    board: &mut PulseBlaster<L>,
    config: &RunConfig,
    mut interrupted: I,
) -> Result<RunOutcome>
where
    L: Loader,
    I: FnMut() -> bool,
{
    info!("Starting program");
    board.start()?;

    let outcome = loop {
        let message = board.status_message()?;
        if message != RUNNING_MESSAGE {
            info!(status = message.trim_end(), "board left running state");
            break RunOutcome::Finished(message);
        }
        thread::sleep(config.poll_interval);
        if interrupted() {
            info!("Stopping board");
            break RunOutcome::Interrupted;
        }
    };

    board.stop()?;
    board.close()?;
    info!("done");
    Ok(outcome)
}

/// Runs [`prepare`], `program`, then [`run_until_stopped`].
///
/// ```ignore
/// use pbctrl_backend::*;
///
/// let mut pb = PulseBlaster::from_env();
/// let outcome = program_and_run(&mut pb, &RunConfig::default(), |pb| {
///     pb.start_programming(ProgramTarget::PulseProgram)?;
///     let start = pb.inst("111111111111", Opcode::Continue, 0, 100.0 * units::US)?;
///     pb.inst("000000000000", Opcode::Branch, start, 100.0 * units::US)?;
///     pb.stop_programming()
/// }, || false)?;
/// ```
pub fn program_and_run<L, P, I>(
    board: &mut PulseBlaster<L>,
    config: &RunConfig,
    program: P,
    interrupted: I,
) -> Result<RunOutcome>
where
    L: Loader,
    P: FnOnce(&mut PulseBlaster<L>) -> Result<()>,
    I: FnMut() -> bool,
{
    prepare(board, config)?;
    info!("Programming board");
    program(board)?;
    run_until_stopped(board, config, interrupted)
}
