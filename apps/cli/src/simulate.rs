//! Replays a [`Script`] against a [`TransitionController`].

use std::sync::Arc;

use hostlink_core::controller::{ControllerState, HostEvent, Transition, TransitionController};
use hostlink_core::disabled::DisabledPresenter;
use hostlink_core::engine::EngineFactory;
use hostlink_core::host::Host;
use hostlink_core::queue::{JobResult, ReportProgress};
use hostlink_resolver::{ContextResolver, FsResolver};
use hostlink_shared::{AppConfig, EngineId};
use tracing::{info, warn};

use crate::host::ScriptHost;
use crate::script::{JobSpec, Script, Step};

/// What one step did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Outcome {
    Ignored,
    Unchanged,
    Activated(String),
    Disabled(String),
    Failed(String),
    Queued { pending: usize },
    Drained { completed: usize, failed: usize },
    NoSession,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ignored => write!(f, "ignored"),
            Self::Unchanged => write!(f, "unchanged"),
            Self::Activated(ctx) => write!(f, "session started for {ctx}"),
            Self::Disabled(reason) => write!(f, "disabled ({reason})"),
            Self::Failed(kind) => write!(f, "failed ({kind})"),
            Self::Queued { pending } => write!(f, "queued, {pending} pending"),
            Self::Drained { completed, failed } => {
                write!(f, "drained, {completed} ok, {failed} failed")
            }
            Self::NoSession => write!(f, "no live session"),
        }
    }
}

impl From<Transition> for Outcome {
    fn from(t: Transition) -> Self {
        match t {
            Transition::Unchanged => Self::Unchanged,
            Transition::Activated { context } => Self::Activated(context.to_string()),
            Transition::Disabled { reason, .. } => Self::Disabled(reason.as_str().to_string()),
            Transition::Failed(diagnostic) => Self::Failed(diagnostic.kind),
        }
    }
}

pub(crate) struct Simulation {
    host: Arc<ScriptHost>,
    controller: TransitionController,
}

impl Simulation {
    pub(crate) fn new(config: &AppConfig, script: &Script, show_progress: bool) -> Self {
        let host = Arc::new(ScriptHost::new(script.host.clone(), show_progress));
        let dyn_host: Arc<dyn Host> = host.clone();
        let resolver: Arc<dyn ContextResolver> =
            Arc::new(FsResolver::new(config.resolver.clone()));
        let factory = EngineFactory::new(Arc::clone(&dyn_host), config.engine.clone());

        let controller = TransitionController::new(
            EngineId::new(&config.engine.name),
            dyn_host,
            resolver,
            Box::new(factory),
            DisabledPresenter::from_settings(&config.engine),
        );
        Self { host, controller }
    }

    pub(crate) fn host(&self) -> &ScriptHost {
        &self.host
    }

    pub(crate) fn state(&self) -> &ControllerState {
        self.controller.state()
    }

    /// Establish the initial state from the host's open artifact.
    pub(crate) fn bootstrap(&mut self) -> Outcome {
        self.controller.bootstrap().into()
    }

    pub(crate) fn step(&mut self, step: &Step) -> Outcome {
        match step {
            Step::Open { path } => {
                self.host.set_artifact(Some(path.clone()));
                self.event(HostEvent::ArtifactOpened)
            }
            Step::New => {
                self.host.set_artifact(None);
                self.event(HostEvent::ArtifactOpened)
            }
            Step::Save => self.event(HostEvent::ArtifactSaved),
            Step::SaveAs { path } => {
                self.host.set_artifact(Some(path.clone()));
                self.event(HostEvent::ArtifactSaved)
            }
            Step::Event { name } => self.event(HostEvent::Other(name.clone())),
            Step::Enqueue { name, job, args } => {
                let Some(session) = self.controller.session_mut() else {
                    warn!(job = %name, "no live session, job dropped");
                    return Outcome::NoSession;
                };
                let job = job.clone();
                session
                    .jobs()
                    .enqueue(name.clone(), move |_, progress| run_job(&job, progress), args.clone());
                Outcome::Queued {
                    pending: session.jobs().len(),
                }
            }
            Step::Drain => {
                let Some(session) = self.controller.session_mut() else {
                    return Outcome::NoSession;
                };
                let report = session.execute_queue();
                Outcome::Drained {
                    completed: report.completed.len(),
                    failed: report.failed.len(),
                }
            }
        }
    }

    fn event(&mut self, event: HostEvent) -> Outcome {
        self.controller
            .on_host_event(&event)
            .map_or(Outcome::Ignored, Outcome::from)
    }

    /// Run every step, printing a transcript line per step.
    pub(crate) fn run(&mut self, script: &Script) -> Vec<Outcome> {
        let mut outcomes = Vec::with_capacity(script.steps.len() + 1);

        let initial = self.bootstrap();
        println!("[0] startup -> {initial}");
        outcomes.push(initial);

        for (i, step) in script.steps.iter().enumerate() {
            let outcome = self.step(step);
            info!(step = i + 1, action = %step.describe(), %outcome, "step applied");
            println!("[{}] {} -> {outcome}", i + 1, step.describe());
            outcomes.push(outcome);
        }
        outcomes
    }
}

fn run_job(job: &JobSpec, progress: &mut dyn ReportProgress) -> JobResult {
    match job {
        JobSpec::Progress { report } => {
            for percent in report {
                progress.report_progress(*percent);
            }
            Ok(())
        }
        JobSpec::Fail { message } => Err(message.clone().into()),
        JobSpec::Panic { message } => panic!("{message}"),
    }
}
