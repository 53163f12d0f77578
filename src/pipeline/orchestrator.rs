//! Release pipeline orchestration.
//!
//! This module provides the [`BuildPipeline`] that takes a [`BuildRequest`]
//! through validation, Info.plist update, `xcodebuild` and optionally `hdiutil`,
//! reporting every step as a [`PipelineEvent`].
//!
//! # Overview
//!
//! The pipeline:
//! 1. Validates the request (project path, version, build number)
//! 2. Writes the version and build number into the project's Info.plist
//! 3. Builds the scheme named after the project
//! 4. Packages the app bundle into a disk image when requested
//! 5. Reports the output directory and artifact checksum
//!
//! The first failing stage ends the run; later stages never start. Failures are
//! reported through the [`Outcome`] and an `Error` log entry, never as an `Err`.
//!
//! # Example
//!
//! ```no_run
//! use unleash::pipeline::{
//!     BuildPipeline, BuildRequest, Configuration, PipelineSettings, TokioProcessRunner,
//! };
//!
//! # async fn example() {
//! let pipeline = BuildPipeline::new(TokioProcessRunner::new(), PipelineSettings::default());
//! let request =
//!     BuildRequest::new("Demo/Demo.xcodeproj", "1.4.0", "231005", Configuration::Release)
//!         .with_disk_image(None);
//!
//! let mut handle = pipeline.start(request);
//! while let Some(event) = handle.next_event().await {
//!     if let Some(entry) = event.entry {
//!         println!("[{:>3}%] {}", event.progress, entry.text);
//!     }
//! }
//! let report = handle.wait().await.expect("pipeline task");
//! assert!(report.outcome.is_complete());
//! # }
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::checksum::describe_artifact;
use super::error::{Context, Error, Result, describe_exit};
use super::events::{
    Artifact, Failure, FailureKind, LogEntry, Outcome, PipelineEvent, RunSnapshot, Severity, Stage,
};
use super::fs;
use super::process::{Invocation, ProcessOutput, ProcessRunner};
use super::request::BuildRequest;
use super::settings::{ExitCodePolicy, PipelineSettings};
use super::tools;
use super::version;
use crate::metadata::{MetadataRecord, MetadataStore};

/// Sequences the release stages for one request at a time.
///
/// The pipeline holds no per-run state, so one instance can start many runs.
/// Runs against the same project must not overlap: the Info.plist has a single
/// writer assumption. [`Session`](crate::session::Session) enforces this for
/// interactive callers.
pub struct BuildPipeline<R> {
    runner: Arc<R>,
    settings: PipelineSettings,
    store: MetadataStore,
}

impl<R> Clone for BuildPipeline<R> {
    fn clone(&self) -> Self {
        Self {
            runner: Arc::clone(&self.runner),
            settings: self.settings.clone(),
            store: self.store,
        }
    }
}

impl<R> std::fmt::Debug for BuildPipeline<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildPipeline")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Final outcome plus the full transcript of a run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: Outcome,
    pub snapshot: RunSnapshot,
}

/// Live view of a spawned run.
#[derive(Debug)]
pub struct PipelineHandle {
    events: mpsc::UnboundedReceiver<PipelineEvent>,
    cancel: CancellationToken,
    task: JoinHandle<RunReport>,
}

impl PipelineHandle {
    /// Next event, `None` once the run has finished and all events were read.
    pub async fn next_event(&mut self) -> Option<PipelineEvent> {
        self.events.recv().await
    }

    /// Asks the run to stop; a running tool is killed.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Waits for the run to finish. Errors only if the run task panicked.
    pub async fn wait(self) -> Result<RunReport> {
        self.task.await.with_context(|| "pipeline task failed")
    }
}

impl<R: ProcessRunner + 'static> BuildPipeline<R> {
    pub fn new(runner: R, settings: PipelineSettings) -> Self {
        Self::with_shared_runner(Arc::new(runner), settings)
    }

    pub fn with_shared_runner(runner: Arc<R>, settings: PipelineSettings) -> Self {
        Self {
            runner,
            settings,
            store: MetadataStore::new(),
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Spawns a run on the tokio runtime and returns its handle.
    pub fn start(&self, request: BuildRequest) -> PipelineHandle {
        self.start_guarded(request, ())
    }

    /// Like [`Self::start`], dropping `guard` once the run has finished.
    pub fn start_guarded<G: Send + 'static>(
        &self,
        request: BuildRequest,
        guard: G,
    ) -> PipelineHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let pipeline = self.clone();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            let report = pipeline.run(&request, tx, token).await;
            drop(guard);
            report
        });

        PipelineHandle {
            events: rx,
            cancel,
            task,
        }
    }

    /// Executes a run on the current task.
    pub async fn run(
        &self,
        request: &BuildRequest,
        events: mpsc::UnboundedSender<PipelineEvent>,
        cancel: CancellationToken,
    ) -> RunReport {
        let mut run = PipelineRun::new(display_name(request), events);
        let outcome = match self.execute(request, &mut run, &cancel).await {
            Ok(outcome) => outcome,
            Err(err) => run.fail(&err),
        };
        RunReport {
            outcome,
            snapshot: run.snapshot(),
        }
    }

    async fn execute(
        &self,
        request: &BuildRequest,
        run: &mut PipelineRun,
        cancel: &CancellationToken,
    ) -> Result<Outcome> {
        run.enter(Stage::ValidatingInput);
        run.info(format!(
            "Releasing {} {} ({}) in {} configuration",
            run.project,
            request.version(),
            request.build(),
            request.configuration()
        ));
        request.validate()?;

        checkpoint(cancel)?;
        run.enter(Stage::UpdatingMetadata);
        self.update_metadata(request, run).await?;

        checkpoint(cancel)?;
        run.enter(Stage::Building);
        self.build(request, run, cancel).await?;

        let image = if request.package_as_image() {
            checkpoint(cancel)?;
            run.enter(Stage::Packaging);
            Some(self.package(request, run, cancel).await?)
        } else {
            None
        };

        let artifact = self.report_artifact(request, image, run).await;

        run.enter(Stage::Complete);
        run.info("Complete");
        Ok(Outcome::Complete {
            output_dir: request.build_dir(),
            artifact,
        })
    }

    async fn update_metadata(&self, request: &BuildRequest, run: &mut PipelineRun) -> Result<()> {
        let plist = request.info_plist_path();
        run.info(format!("Updating {} version ...", run.project));

        if !plist.exists() {
            log::warn!("No Info.plist at {}", plist.display());
            run.detail(format!(
                "No Info.plist at {}; version metadata left unchanged",
                plist.display()
            ));
            return Ok(());
        }

        let record = MetadataRecord::new(request.version(), request.build());
        let store = self.store;
        let path = plist.clone();
        let next = record.clone();
        let previous = tokio::task::spawn_blocking(move || store.update(&path, &next))
            .await
            .with_context(|| "metadata task failed")??;

        match previous {
            Some(previous) => {
                if version::is_regression(&previous.short_version, &record.short_version) {
                    log::warn!(
                        "{} version goes backwards: {} -> {}",
                        run.project,
                        previous.short_version,
                        record.short_version
                    );
                    run.detail(format!(
                        "Warning: new version {} is lower than the previous {}",
                        record.short_version, previous.short_version
                    ));
                }
                run.detail(format!(
                    "{} version/build updated: {} -> {}",
                    run.project, previous, record
                ));
            }
            None => run.detail(format!("{} version/build set to {}", run.project, record)),
        }
        Ok(())
    }

    async fn build(
        &self,
        request: &BuildRequest,
        run: &mut PipelineRun,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let invocation = tools::build_invocation(request, &self.settings);
        run.info(format!("Start building {} ...", run.project));

        let output = self.launch(&invocation, cancel).await?;
        run.detail(transcript(&output));
        self.check_exit(&invocation, &output, run)?;

        run.info(format!("... {} build finished", run.project));
        Ok(())
    }

    async fn package(
        &self,
        request: &BuildRequest,
        run: &mut PipelineRun,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        let build_dir = request.build_dir();
        let image_name = request.image_file_name(self.settings.image_extension());
        let image = build_dir.join(&image_name);
        run.info(format!("Packaging {} into {} ...", run.project, image_name));

        fs::create_dir_all(&build_dir).await?;
        if fs::remove_file_if_exists(&image).await? {
            run.detail(format!("Removed previous {}", image.display()));
        }

        let invocation = tools::package_invocation(request, &self.settings);
        let output = self.launch(&invocation, cancel).await?;
        run.detail(transcript(&output));
        self.check_exit(&invocation, &output, run)?;

        Ok(image)
    }

    /// Size and checksum of the produced image, or of the app bundle when no
    /// image was requested. Missing artifacts are not an error: under the
    /// lenient policy a failed build still reaches this point.
    async fn report_artifact(
        &self,
        request: &BuildRequest,
        image: Option<PathBuf>,
        run: &mut PipelineRun,
    ) -> Option<Artifact> {
        let path = image.unwrap_or_else(|| request.app_bundle_path());
        if !path.exists() {
            run.detail(format!("No artifact found at {}", path.display()));
            return None;
        }

        match describe_artifact(&path).await {
            Ok(artifact) => {
                run.detail(format!(
                    "{} ({} bytes, sha256 {})",
                    artifact.path.display(),
                    artifact.size,
                    artifact.sha256
                ));
                Some(artifact)
            }
            Err(e) => {
                log::warn!("Could not checksum {}: {}", path.display(), e);
                run.detail(format!("Could not checksum {}: {}", path.display(), e));
                None
            }
        }
    }

    async fn launch(
        &self,
        invocation: &Invocation,
        cancel: &CancellationToken,
    ) -> Result<ProcessOutput> {
        log::info!("Running {}", invocation);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            result = self.runner.run(invocation) => Ok(result?),
        }
    }

    fn check_exit(
        &self,
        invocation: &Invocation,
        output: &ProcessOutput,
        run: &mut PipelineRun,
    ) -> Result<()> {
        if output.success() {
            return Ok(());
        }

        let program = invocation.program_name();
        match self.settings.exit_code_policy() {
            ExitCodePolicy::Strict => Err(Error::ToolFailed {
                program,
                code: output.exit_code,
            }),
            ExitCodePolicy::Lenient => {
                log::warn!(
                    "{} exited with {}; continuing",
                    program,
                    describe_exit(&output.exit_code)
                );
                run.detail(format!(
                    "{} exited with {}; continuing (lenient exit code policy)",
                    program,
                    describe_exit(&output.exit_code)
                ));
                Ok(())
            }
        }
    }
}

fn checkpoint(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(Error::Cancelled)
    } else {
        Ok(())
    }
}

fn display_name(request: &BuildRequest) -> String {
    match request.project_name() {
        "" => request.project_path().display().to_string(),
        name => name.to_string(),
    }
}

fn transcript(output: &ProcessOutput) -> String {
    let text = output.output.trim_end();
    if text.trim().is_empty() {
        "(no output)".to_string()
    } else {
        text.to_string()
    }
}

fn failure_kind(err: &Error) -> FailureKind {
    match err {
        Error::Validation(_) => FailureKind::ValidationError,
        Error::Metadata(e) if e.is_write() => FailureKind::MetadataWriteError,
        Error::Metadata(_) => FailureKind::MetadataReadError,
        Error::Runner(_) => FailureKind::LaunchError,
        Error::ToolFailed { .. } => FailureKind::ToolExecutionFailure,
        Error::Cancelled => FailureKind::Cancelled,
        Error::Fs { .. } | Error::GenericError(_) => FailureKind::FilesystemError,
    }
}

/// State of one run, owned by the task executing it.
///
/// The log is append-only and progress never decreases. Observers receive
/// clones through the event channel or [`RunSnapshot`].
struct PipelineRun {
    project: String,
    stage: Stage,
    progress: u8,
    log: Vec<LogEntry>,
    events: mpsc::UnboundedSender<PipelineEvent>,
}

impl PipelineRun {
    fn new(project: String, events: mpsc::UnboundedSender<PipelineEvent>) -> Self {
        Self {
            project,
            stage: Stage::Idle,
            progress: 0,
            log: Vec::new(),
            events,
        }
    }

    fn enter(&mut self, stage: Stage) {
        log::info!("{}: {}", self.project, stage);
        self.stage = stage;
        self.progress = self.progress.max(stage.checkpoint());
        self.emit(None);
    }

    fn info(&mut self, text: impl Into<String>) {
        self.record(Severity::Info, text);
    }

    fn detail(&mut self, text: impl Into<String>) {
        self.record(Severity::Detail, text);
    }

    fn record(&mut self, severity: Severity, text: impl Into<String>) -> LogEntry {
        let entry = LogEntry::new(severity, text);
        self.log.push(entry.clone());
        self.emit(Some(entry.clone()));
        entry
    }

    fn emit(&self, entry: Option<LogEntry>) {
        // A caller that stopped listening still gets the outcome.
        let _ = self.events.send(PipelineEvent {
            stage: self.stage,
            progress: self.progress,
            entry,
        });
    }

    fn fail(&mut self, err: &Error) -> Outcome {
        let stage = self.stage;
        let text = match err {
            Error::Validation(e) => match e.hint() {
                Some(hint) => format!("{}: {} failed: {} ({})", self.project, stage, e, hint),
                None => format!("{}: {} failed: {}", self.project, stage, e),
            },
            _ => format!("{}: {} failed: {}", self.project, stage, err),
        };
        log::error!("{}", text);

        let last_entry = self.record(Severity::Error, text);
        self.stage = Stage::Failed;
        self.emit(None);

        Outcome::Failed(Failure {
            stage,
            kind: failure_kind(err),
            last_entry,
        })
    }

    fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            stage: self.stage,
            progress: self.progress,
            log: self.log.clone(),
        }
    }
}
