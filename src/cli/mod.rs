//! Command line interface for unleash.
//!
//! The CLI is a thin shell over [`Session`]: it turns arguments into input
//! events, starts one run and renders what the run reports.

mod args;
mod output;

pub use args::Args;
pub use output::OutputManager;

use std::path::{Path, PathBuf};

use anyhow::Context;
use path_absolutize::Absolutize;

use crate::config::ConfigFile;
use crate::error::{CliError, Result};
use crate::metadata::MetadataStore;
use crate::pipeline::{
    BuildPipeline, BuildStamp, PipelineHandle, PipelineSettings, ProcessRunner,
    TokioProcessRunner, request, tools,
};
use crate::session::{InputEvent, Session, SessionResponse};

/// Main CLI entry point
pub async fn run() -> Result<i32> {
    let args = Args::parse_args();
    args.validate()
        .map_err(|reason| CliError::InvalidArguments { reason })?;

    let output = OutputManager::new(args.json);
    let project = args
        .project
        .absolutize()
        .with_context(|| format!("resolving project path {}", args.project.display()))?
        .to_path_buf();

    if args.show_metadata {
        let record = MetadataStore::new().read(&request::info_plist_path(&project))?;
        output.metadata(&record)?;
        return Ok(0);
    }

    let settings = load_settings(&args, &project)?;
    let mut session = Session::new(BuildPipeline::new(TokioProcessRunner::new(), settings));

    let mut handle = match start(&mut session, &args, project) {
        Ok(handle) => handle,
        Err(reason) => {
            log::error!("{}", reason);
            eprintln!("error: {}", reason);
            return Ok(1);
        }
    };

    let token = handle.cancellation_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, cancelling run");
            token.cancel();
        }
    });

    while let Some(event) = handle.next_event().await {
        output.event(&event)?;
    }
    let report = handle.wait().await?;
    interrupt.abort();
    output.outcome(&report.outcome)?;

    match report.outcome.output_dir() {
        Some(dir) => {
            if args.reveal {
                reveal(dir).await;
            }
            Ok(0)
        }
        None => Ok(1),
    }
}

/// Settings from built-in defaults, then the config file, then flags.
fn load_settings(args: &Args, project: &Path) -> Result<PipelineSettings> {
    let project_dir = project.parent().unwrap_or_else(|| Path::new("."));
    let config = ConfigFile::discover(args.config.as_deref(), project_dir)?;

    let mut builder = config.apply(PipelineSettings::builder());
    if let Some(policy) = args.exit_code_policy() {
        builder = builder.exit_code_policy(policy);
    }
    let settings = builder.build();
    log::debug!("Pipeline settings: {:?}", settings);
    Ok(settings)
}

/// Replays the arguments as input events and starts the run.
fn start<R: ProcessRunner + 'static>(
    session: &mut Session<R>,
    args: &Args,
    project: PathBuf,
) -> std::result::Result<PipelineHandle, String> {
    if let SessionResponse::ProjectRejected { path, reason } =
        session.handle(InputEvent::ProjectSelected(project))
    {
        return Err(format!("{}: {}", path.display(), reason));
    }

    if let Some(version) = &args.app_version {
        session.handle(InputEvent::VersionEdited(version.clone()));
    }
    let build = match &args.build_number {
        Some(build) => build.clone(),
        None if session.form().build.is_empty() => BuildStamp::today().to_string(),
        None => session.form().build.clone(),
    };
    session.handle(InputEvent::BuildEdited(build));
    session.handle(InputEvent::ConfigurationSelected(args.configuration));
    session.handle(InputEvent::DiskImageToggled {
        enabled: args.wants_disk_image(),
        image_name: args.image_name.clone(),
    });

    match session.handle(InputEvent::StartRequested) {
        SessionResponse::Started(handle) => Ok(handle),
        SessionResponse::Busy => Err("a run is already in progress".to_string()),
        _ => Err("no project selected".to_string()),
    }
}

async fn reveal(dir: &Path) {
    let invocation = tools::reveal_invocation(dir);
    match TokioProcessRunner::new().run(&invocation).await {
        Ok(output) if output.success() => {}
        Ok(output) => log::warn!("{} failed: {}", invocation, output.output.trim()),
        Err(e) => log::warn!("Could not reveal {}: {}", dir.display(), e),
    }
}
