//! Reference session implementation driving a [`Host`].
//!
//! Startup validates that the engine can run for the context (platform,
//! host version, a project, folders on disk), points the host's project
//! at the configured template, and renders the session menu when the host
//! has a UI.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use hostlink_resolver::PipelineHandle;
use hostlink_shared::{Context, EngineId, EngineSettings, HostlinkError, Result, SessionId};
use tracing::{debug, info, warn};

use crate::host::{Host, Menu, MenuAction, MenuItem};
use crate::queue::{DrainReport, JobQueue};
use crate::session::{Session, SessionFactory};

/// Prefix on user-facing console lines.
const CONSOLE_LABEL: &str = "Pipeline";

// ---------------------------------------------------------------------------
// EngineFactory
// ---------------------------------------------------------------------------

/// Starts [`EngineSession`]s against one host.
pub struct EngineFactory {
    host: Arc<dyn Host>,
    settings: EngineSettings,
}

impl EngineFactory {
    pub fn new(host: Arc<dyn Host>, settings: EngineSettings) -> Self {
        Self { host, settings }
    }
}

impl SessionFactory for EngineFactory {
    fn start(
        &self,
        engine: &EngineId,
        pipeline: PipelineHandle,
        context: Context,
    ) -> Result<Box<dyn Session>> {
        let session = EngineSession::init(
            engine.clone(),
            Arc::clone(&self.host),
            self.settings.clone(),
            pipeline,
            context,
        )?;
        Ok(Box::new(session))
    }
}

// ---------------------------------------------------------------------------
// EngineSession
// ---------------------------------------------------------------------------

pub struct EngineSession {
    id: SessionId,
    engine: EngineId,
    context: Context,
    pipeline: PipelineHandle,
    host: Arc<dyn Host>,
    settings: EngineSettings,
    queue: JobQueue,
    started_at: DateTime<Utc>,
    /// Name of the menu this session rendered, if any.
    menu: Option<String>,
    destroyed: bool,
}

impl EngineSession {
    fn init(
        engine: EngineId,
        host: Arc<dyn Host>,
        settings: EngineSettings,
        pipeline: PipelineHandle,
        context: Context,
    ) -> Result<Self> {
        let mut session = Self {
            id: SessionId::new(),
            engine,
            context,
            pipeline,
            host,
            settings,
            queue: JobQueue::new(),
            started_at: Utc::now(),
            menu: None,
            destroyed: false,
        };
        session.log_debug(&format!("{session}: Initializing..."));

        session.check_host()?;
        session.check_context()?;
        session.set_project()?;
        if session.host.has_ui() {
            session.create_menu()?;
        } else {
            debug!(session = %session.id, "host has no UI, skipping menu");
        }

        Ok(session)
    }

    fn check_host(&self) -> Result<()> {
        let platform = self.host.platform();
        if !self.settings.supported_platforms.is_empty()
            && !self.settings.supported_platforms.contains(&platform)
        {
            return Err(HostlinkError::engine_init(format!(
                "The current platform '{platform}' is not supported! Supported platforms are {}.",
                self.settings.supported_platforms.join(", ")
            )));
        }

        let version = self.host.version();
        let supported = &self.settings.supported_host_versions;
        if !supported.is_empty() && !supported.iter().any(|v| version.starts_with(v.as_str())) {
            return Err(HostlinkError::engine_init(format!(
                "Host version {version} is not supported. Supported versions: {}.",
                supported.join(", ")
            )));
        }
        self.log_debug(&format!("Running host version {version} on {platform}"));
        Ok(())
    }

    fn check_context(&self) -> Result<()> {
        if self.context.project.is_none() {
            return Err(HostlinkError::engine_init(format!(
                "The engine needs at least a project in the context in order to start! \
                 Your context: {}",
                self.context
            )));
        }

        if self.pipeline.paths_for_context(&self.context).is_empty() {
            return Err(HostlinkError::engine_init(
                "No folders on disk are associated with the current context. The engine \
                 requires a context which exists on disk in order to run correctly.",
            ));
        }
        Ok(())
    }

    fn set_project(&self) -> Result<()> {
        let Some(key) = &self.settings.template_project else {
            return Ok(());
        };

        let template = self.pipeline.template(key).ok_or_else(|| {
            HostlinkError::engine_init(format!(
                "template_project '{key}' is not defined by pipeline '{}'",
                self.pipeline.name()
            ))
        })?;
        let relative = template
            .apply_fields(&self.context.as_template_fields())
            .map_err(|e| HostlinkError::engine_init(e.to_string()))?;
        let project_path = self.pipeline.root().join(relative);

        self.log_info(&format!(
            "Setting host project to '{}'",
            project_path.display()
        ));
        self.host.set_project(&project_path)
    }

    fn create_menu(&mut self) -> Result<()> {
        let name = self.settings.menu_name.clone();
        self.host.create_menu(Menu {
            name: name.clone(),
            label: self.settings.menu_label.clone(),
            items: vec![
                MenuItem {
                    label: self.context.to_string(),
                    action: MenuAction::Label,
                },
                MenuItem {
                    label: "About this session...".to_string(),
                    action: MenuAction::ShowMessage {
                        title: "Pipeline session".to_string(),
                        message: format!(
                            "Engine: {}\nSession: {}\nStarted: {}\nPipeline: {} ({})\nContext: {}",
                            self.engine,
                            self.id,
                            self.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
                            self.pipeline.name(),
                            self.pipeline.root().display(),
                            self.context
                        ),
                    },
                },
            ],
        })?;
        self.menu = Some(name);
        Ok(())
    }

    pub fn pipeline(&self) -> &PipelineHandle {
        &self.pipeline
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

impl fmt::Display for EngineSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Engine {} [{}]", self.engine, self.id)
    }
}

impl Session for EngineSession {
    fn id(&self) -> &SessionId {
        &self.id
    }

    fn engine(&self) -> &EngineId {
        &self.engine
    }

    fn context(&self) -> &Context {
        &self.context
    }

    fn jobs(&mut self) -> &mut JobQueue {
        &mut self.queue
    }

    fn execute_queue(&mut self) -> DrainReport {
        let report = self.queue.drain(self.host.as_ref());
        for failure in &report.failed {
            self.log_error(&failure.to_error().to_string());
        }
        info!(
            session = %self.id,
            jobs = report.total(),
            failed = report.failed.len(),
            "queue drained"
        );
        report
    }

    fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.log_debug(&format!("{self}: Destroying..."));

        if let Some(menu) = self.menu.take() {
            if self.host.menu_exists(&menu) {
                if let Err(e) = self.host.delete_menu(&menu) {
                    warn!(session = %self.id, error = %e, "failed to delete session menu");
                }
            }
        }

        let dropped = self.queue.clear();
        if dropped > 0 {
            self.log_warning(&format!("{dropped} queued job(s) discarded on teardown"));
        }
        self.destroyed = true;
    }

    fn log_debug(&self, message: &str) {
        debug!(session = %self.id, "{message}");
        if self.settings.debug_logging {
            for line in wrap(&format!("{self} DEBUG: {message}"), self.settings.console_width) {
                self.host.display_info(&line);
            }
        }
    }

    fn log_info(&self, message: &str) {
        info!(session = %self.id, "{message}");
        for line in wrap(&format!("{CONSOLE_LABEL}: {message}"), self.settings.console_width) {
            self.host.display_info(&line);
        }
    }

    fn log_warning(&self, message: &str) {
        warn!(session = %self.id, "{message}");
        for line in wrap(&format!("{CONSOLE_LABEL}: {message}"), self.settings.console_width) {
            self.host.display_warning(&line);
        }
    }

    fn log_error(&self, message: &str) {
        tracing::error!(session = %self.id, "{message}");
        self.host.display_error(&format!("{CONSOLE_LABEL}: {message}"));
    }
}

/// Greedy word wrap at `width` columns; words longer than a line are split.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        if current_len > 0 && current_len + 1 + word_len > width {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;

        while current_len > width {
            let head: String = current.chars().take(width).collect();
            let tail: String = current.chars().skip(width).collect();
            lines.push(head);
            current = tail;
            current_len -= width;
        }
    }

    if current_len > 0 {
        lines.push(current);
    }
    lines
}
