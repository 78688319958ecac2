//! Activation command

use std::path::PathBuf;

use libtether_core::{ActivationOutcome, ActivationSequencer, StartupMode, TetherConfig, TetherError};
use libtether_http::{HttpProbe, ProcessLauncher};
use serde::Serialize;

use crate::cli::Cli;
use crate::context::TetherContext;
use crate::output::output_success;
use crate::prompt::TerminalPrompt;

#[derive(Serialize)]
struct ActivationReport {
    outcome: ActivationOutcome,
    supervisor_url: String,
}

pub async fn run(
    cli: &Cli,
    startup: Option<StartupMode>,
    launch_target: Option<PathBuf>,
) -> Result<(), TetherError> {
    let mut ctx = TetherContext::resolve(cli)?;
    if let Some(startup) = startup {
        ctx.config.startup = startup;
    }
    if launch_target.is_some() {
        ctx.config.launch_target = launch_target;
    }

    let outcome = activate(&ctx.config).await?;
    let report = ActivationReport {
        outcome,
        supervisor_url: ctx.config.supervisor_base_url(),
    };

    output_success(cli, report, |report| match report.outcome {
        ActivationOutcome::Ready => format!("Supervisor ready at {}", report.supervisor_url),
        ActivationOutcome::Degraded => format!(
            "Supervisor did not answer at {} before the startup deadline; continuing degraded",
            report.supervisor_url
        ),
        ActivationOutcome::Skipped => "Activation skipped".to_string(),
    });
    Ok(())
}

/// Run the activation sequence with the HTTP probe, process launcher and terminal prompt
pub async fn activate(config: &TetherConfig) -> Result<ActivationOutcome, TetherError> {
    let outcome = ActivationSequencer::from_config(config, HttpProbe::supervisor(config)?)
        .with_launcher(ProcessLauncher::from_config(config))
        .with_prompt(TerminalPrompt)
        .run()
        .await;
    Ok(outcome)
}
