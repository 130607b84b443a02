use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use tracing::{error, info, warn};

use pbctrl_backend::logging::init_tracing;
use pbctrl_backend::*;

/// Sets `flag` on the first Ctrl-C. Runs on its own thread so the polling loop stays blocking.
fn watch_ctrl_c(flag: Arc<AtomicBool>) {
    thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
            Ok(runtime) => runtime,
            Err(err) => {
                warn!(%err, "Ctrl-C handling unavailable");
                return;
            }
        };
        if runtime.block_on(tokio::signal::ctrl_c()).is_ok() {
            flag.store(true, Ordering::SeqCst);
        }
    });
}

fn main() -> ExitCode {
    init_tracing("info");

    let interrupted = Arc::new(AtomicBool::new(false));
    watch_ctrl_c(interrupted.clone());

    let mut pb = PulseBlaster::from_env();
    let result = program_and_run(
        &mut pb,
        &RunConfig::default(),
        |pb| {
            pb.start_programming(ProgramTarget::PulseProgram)?;
            let start = pb.inst("111111111111", Opcode::Continue, 0, 100.0 * units::US)?;
            pb.inst("000000000000", Opcode::Branch, start, 100.0 * units::US)?;
            pb.stop_programming()
        },
        || interrupted.load(Ordering::SeqCst),
    );

    match result {
        Ok(RunOutcome::Finished(status)) => {
            info!(status = status.trim_end(), "program finished");
            ExitCode::SUCCESS
        }
        Ok(RunOutcome::Interrupted) => {
            info!("interrupted");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(%err, "pulse program failed");
            ExitCode::FAILURE
        }
    }
}
