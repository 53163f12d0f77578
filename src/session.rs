//! Interactive front-end state driven by discrete input events.
//!
//! A GUI or CLI shell never touches pipeline state directly. It sends
//! [`InputEvent`]s (a project was dropped, a field was edited, start was
//! pressed) and gets a [`SessionResponse`] back. The session keeps the form
//! values, pre-fills version and build from the selected project's Info.plist,
//! and refuses to start a second run while one is in progress.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;

use crate::metadata::{MetadataRecord, MetadataStore};
use crate::pipeline::request::{self, PROJECT_EXTENSION, WORKSPACE_EXTENSION};
use crate::pipeline::{
    BuildPipeline, BuildRequest, Configuration, PipelineHandle, ProcessRunner, ProjectKind,
};

/// Something the user did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// A project or workspace was dropped or picked
    ProjectSelected(PathBuf),
    VersionEdited(String),
    BuildEdited(String),
    ConfigurationSelected(Configuration),
    DiskImageToggled {
        enabled: bool,
        image_name: Option<String>,
    },
    StartRequested,
}

/// What the session did with an event.
#[derive(Debug)]
pub enum SessionResponse {
    /// The project was accepted; `metadata` holds the values pre-filled from
    /// its Info.plist, if it had one.
    ProjectAccepted {
        path: PathBuf,
        metadata: Option<MetadataRecord>,
    },
    ProjectRejected { path: PathBuf, reason: String },
    /// A form field changed
    Updated,
    /// A run was started
    Started(PipelineHandle),
    /// Start was refused because a run is active
    Busy,
    /// Start was refused because no project is selected
    NoProject,
}

/// Current form values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormState {
    pub project: Option<PathBuf>,
    pub version: String,
    pub build: String,
    pub configuration: Configuration,
    pub package_as_image: bool,
    pub image_name: Option<String>,
}

impl FormState {
    /// Snapshot of the form as a request, values taken verbatim; validation
    /// happens in the pipeline.
    pub fn to_request(&self) -> Option<BuildRequest> {
        let project = self.project.as_ref()?;
        let request = BuildRequest::new(
            project,
            self.version.as_str(),
            self.build.as_str(),
            self.configuration,
        );
        Some(if self.package_as_image {
            request.with_disk_image(self.image_name.clone())
        } else {
            request
        })
    }
}

/// Clears the run-in-progress flag when dropped.
struct RunGuard(Arc<AtomicBool>);

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Event-driven controller in front of a [`BuildPipeline`].
pub struct Session<R> {
    pipeline: BuildPipeline<R>,
    store: MetadataStore,
    form: FormState,
    running: Arc<AtomicBool>,
}

impl<R: ProcessRunner + 'static> Session<R> {
    pub fn new(pipeline: BuildPipeline<R>) -> Self {
        Self {
            pipeline,
            store: MetadataStore::new(),
            form: FormState::default(),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn form(&self) -> &FormState {
        &self.form
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Applies one event.
    pub fn handle(&mut self, event: InputEvent) -> SessionResponse {
        match event {
            InputEvent::ProjectSelected(path) => self.select_project(path),
            InputEvent::VersionEdited(version) => {
                self.form.version = version;
                SessionResponse::Updated
            }
            InputEvent::BuildEdited(build) => {
                self.form.build = build;
                SessionResponse::Updated
            }
            InputEvent::ConfigurationSelected(configuration) => {
                self.form.configuration = configuration;
                SessionResponse::Updated
            }
            InputEvent::DiskImageToggled {
                enabled,
                image_name,
            } => {
                self.form.package_as_image = enabled;
                self.form.image_name = image_name;
                SessionResponse::Updated
            }
            InputEvent::StartRequested => self.start(),
        }
    }

    /// Handles events from `inbox` until it closes, answering on `outbox`.
    pub async fn serve(
        mut self,
        mut inbox: mpsc::Receiver<InputEvent>,
        outbox: mpsc::UnboundedSender<SessionResponse>,
    ) {
        while let Some(event) = inbox.recv().await {
            log::debug!("Session event: {:?}", event);
            if outbox.send(self.handle(event)).is_err() {
                log::debug!("Session listener went away");
                break;
            }
        }
    }

    fn select_project(&mut self, path: PathBuf) -> SessionResponse {
        if let Err(reason) = accept_project(&path) {
            log::info!("Rejected {}: {}", path.display(), reason);
            return SessionResponse::ProjectRejected { path, reason };
        }

        let plist = request::info_plist_path(&path);
        let metadata = match self.store.read(&plist) {
            Ok(record) => {
                log::info!("Loaded {} from {}", record, plist.display());
                self.form.version = record.short_version.clone();
                self.form.build = record.build_number.clone();
                Some(record)
            }
            Err(e) => {
                log::debug!("No version metadata pre-filled: {}", e);
                None
            }
        };

        self.form.project = Some(path.clone());
        SessionResponse::ProjectAccepted { path, metadata }
    }

    fn start(&mut self) -> SessionResponse {
        let Some(request) = self.form.to_request() else {
            return SessionResponse::NoProject;
        };

        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::warn!("Start ignored: a run is already in progress");
            return SessionResponse::Busy;
        }

        let guard = RunGuard(Arc::clone(&self.running));
        SessionResponse::Started(self.pipeline.start_guarded(request, guard))
    }
}

/// Accepts existing `.xcodeproj` / `.xcworkspace` paths.
fn accept_project(path: &Path) -> Result<(), String> {
    if ProjectKind::from_path(path).is_none() {
        return Err(format!(
            "Invalid file format (expected .{PROJECT_EXTENSION} or .{WORKSPACE_EXTENSION})"
        ));
    }
    if !path.exists() {
        return Err("No such file or directory".to_string());
    }
    Ok(())
}
