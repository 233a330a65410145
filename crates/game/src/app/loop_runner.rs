use std::process::ExitCode;

use engine::{run_app, SessionOutcome};
use tracing::{error, info};

use super::bootstrap::AppWiring;

pub(crate) fn run(app: AppWiring) -> ExitCode {
    match run_app(app.config, app.session) {
        Ok(outcome) => {
            info!(outcome = describe(outcome), "game_over");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "run_failed");
            ExitCode::FAILURE
        }
    }
}

fn describe(outcome: SessionOutcome) -> &'static str {
    match outcome {
        SessionOutcome::Running => "window_closed",
        SessionOutcome::ReachedExit => "reached_exit",
        SessionOutcome::FellOut => "fell_out",
    }
}
