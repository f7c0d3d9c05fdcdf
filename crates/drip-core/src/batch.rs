//! One-shot query mode.
//!
//! Receive a prompt, stream the answer to stdout through a worker process,
//! exit with a code that reflects how the session ended. Ctrl-C interrupts
//! the session instead of killing drip, so the worker is always cleaned up.

use std::io::{self, IsTerminal};

use drip_protocol::QueryRequest;
use tracing::warn;

use crate::config::Config;
use crate::display::TerminalDisplay;
use crate::session::{InterruptHandle, SessionOutcome, SessionSettings, StreamSession};
use crate::style::Style;
use crate::subprocess::{ProcessSpawner, Workload};

/// Flag that puts the `drip` binary into worker mode.
pub const WORKER_FLAG: &str = "--worker";

pub fn build_request(config: &Config, prompt: &str) -> QueryRequest {
    let request = QueryRequest::new(prompt, config.provider.to_info());
    match &config.provider.system_prompt {
        Some(system) => request.with_system_prompt(system.clone()),
        None => request,
    }
}

/// The worker to run for `request`: the configured command, or this binary
/// in worker mode. The request goes to the worker's stdin as JSON.
pub fn worker_workload(config: &Config, request: &QueryRequest) -> serde_json::Result<Workload> {
    let payload = serde_json::to_vec(request)?;

    let workload = match config.worker.command.split_first() {
        Some((program, args)) => Workload::new(program.clone()).args(args.iter().cloned()),
        None => {
            let exe = std::env::current_exe()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "drip".to_string());
            Workload::new(exe).arg(WORKER_FLAG)
        }
    };
    Ok(workload.stdin(payload))
}

/// Stream one answer to stdout. Returns the process exit code.
pub async fn run_batch(config: &Config, prompt: &str) -> i32 {
    let request = build_request(config, prompt);
    let workload = match worker_workload(config, &request) {
        Ok(w) => w,
        Err(e) => {
            eprintln!("drip: error: failed to encode request: {e}");
            return 1;
        }
    };

    let is_tty = io::stdout().is_terminal();
    let mut display = TerminalDisplay::new(io::stdout(), Style::for_output(is_tty), is_tty);

    let settings = SessionSettings::from_config(&config.stream, request.header());
    let (mut session, interrupt) = StreamSession::new(settings);
    forward_sigint(interrupt);

    let outcome = session.run(&ProcessSpawner, &workload, &mut display).await;
    if outcome == SessionOutcome::Cancelled {
        display.emit_notice("cancelled");
    }
    outcome.exit_code()
}

/// Route SIGINT to the session's interrupt flag.
fn forward_sigint(handle: InterruptHandle) {
    #[cfg(unix)]
    {
        use signal_hook::consts::SIGINT;
        use signal_hook::iterator::Signals;

        let mut signals = match Signals::new([SIGINT]) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "cannot watch SIGINT");
                return;
            }
        };
        std::thread::spawn(move || {
            for _ in signals.forever() {
                handle.interrupt();
            }
        });
    }
    #[cfg(not(unix))]
    let _ = handle;
}
