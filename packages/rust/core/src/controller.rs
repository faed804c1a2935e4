//! Context-transition state machine.
//!
//! The controller subscribes to the host's lifecycle events once, for the
//! life of the process. On every relevant event it resolves the open
//! artifact, feeds the result through [`plan`] (a pure transition table)
//! and applies the returned effects in order. Exactly one of {live session,
//! disabled marker} is present after every transition.
//!
//! Failures split three ways:
//! - unrecognized location → disabled, logged at info
//! - engine init failure → disabled, logged at info
//! - anything else, including panics → caught at [`TransitionController`]'s
//!   boundary, reported to the host's error channel, prior state kept

use std::collections::VecDeque;
use std::sync::Arc;

use hostlink_resolver::{ContextResolver, PipelineHandle};
use hostlink_shared::{Context, EngineId, HostlinkError, Result};
use tracing::{debug, error, info, instrument, warn};

use crate::diagnostic::{Diagnostic, catch_panic};
use crate::disabled::DisabledPresenter;
use crate::host::Host;
use crate::session::{Session, SessionFactory, SessionSlot};

// ---------------------------------------------------------------------------
// Events, state, effects
// ---------------------------------------------------------------------------

/// Lifecycle notification emitted by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// A file was loaded, or a new empty document was created.
    ArtifactOpened,
    /// The open artifact was saved, possibly to a new location.
    ArtifactSaved,
    /// Any other host notification; ignored.
    Other(String),
}

impl HostEvent {
    /// Whether this event can change the open artifact's identity.
    pub fn triggers_transition(&self) -> bool {
        matches!(self, Self::ArtifactOpened | Self::ArtifactSaved)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerState {
    /// A session is running for `context`.
    Active { context: Context },
    /// No session; the disabled marker is (or is about to be) shown.
    /// `last_context` is the most recent context known, used as a
    /// resolution hint.
    Disabled { last_context: Option<Context> },
}

impl ControllerState {
    /// Context passed as `previous_context` for the next event.
    pub fn previous_context(&self) -> Option<&Context> {
        match self {
            Self::Active { context } => Some(context),
            Self::Disabled { last_context } => last_context.as_ref(),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisabledReason {
    UnrecognizedLocation,
    EngineInit,
}

impl DisabledReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UnrecognizedLocation => "unrecognized_location",
            Self::EngineInit => "engine_init",
        }
    }
}

/// What resolving the open artifact produced.
#[derive(Debug)]
pub enum Observation {
    /// Unsaved document; treated as a continuation of the current state.
    NoLocation,
    Unrecognized { detail: String },
    Resolved {
        pipeline: PipelineHandle,
        context: Context,
    },
}

/// A single side effect requested by [`plan`].
#[derive(Debug)]
pub enum Effect {
    ClearDisabled,
    DestroySession,
    StartSession {
        pipeline: PipelineHandle,
        context: Context,
    },
    ShowDisabled {
        reason: DisabledReason,
        detail: String,
    },
}

/// Transition table.
///
/// An active session whose context equals `previous` is kept. From the
/// disabled state a rebuild is always attempted, even for the same context.
pub fn plan(
    state: &ControllerState,
    previous: Option<&Context>,
    observation: Observation,
) -> Vec<Effect> {
    let disabled = !state.is_active();

    match observation {
        Observation::NoLocation => Vec::new(),
        Observation::Unrecognized { detail } => {
            let mut effects = Vec::with_capacity(2);
            effects.push(if disabled {
                Effect::ClearDisabled
            } else {
                Effect::DestroySession
            });
            effects.push(Effect::ShowDisabled {
                reason: DisabledReason::UnrecognizedLocation,
                detail,
            });
            effects
        }
        Observation::Resolved { pipeline, context } => {
            if !disabled && previous == Some(&context) {
                return Vec::new();
            }
            let teardown = if disabled {
                Effect::ClearDisabled
            } else {
                Effect::DestroySession
            };
            vec![teardown, Effect::StartSession { pipeline, context }]
        }
    }
}

/// Result of one controller call.
#[derive(Debug, Clone)]
pub enum Transition {
    /// Nothing changed.
    Unchanged,
    /// A new session is running for `context`.
    Activated { context: Context },
    /// The disabled marker is shown.
    Disabled {
        reason: DisabledReason,
        detail: String,
    },
    /// An unexpected failure was contained and reported.
    Failed(Diagnostic),
}

// ---------------------------------------------------------------------------
// TransitionController
// ---------------------------------------------------------------------------

/// Owns the live session (if any) and reacts to host lifecycle events.
pub struct TransitionController {
    engine: EngineId,
    host: Arc<dyn Host>,
    resolver: Arc<dyn ContextResolver>,
    factory: Box<dyn SessionFactory>,
    presenter: DisabledPresenter,
    slot: SessionSlot,
    state: ControllerState,
}

impl TransitionController {
    /// A controller in the disabled state with nothing rendered yet; call
    /// [`bootstrap`](Self::bootstrap) or [`establish`](Self::establish) next.
    pub fn new(
        engine: EngineId,
        host: Arc<dyn Host>,
        resolver: Arc<dyn ContextResolver>,
        factory: Box<dyn SessionFactory>,
        presenter: DisabledPresenter,
    ) -> Self {
        Self {
            engine,
            host,
            resolver,
            factory,
            presenter,
            slot: SessionSlot::new(),
            state: ControllerState::Disabled { last_context: None },
        }
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn engine(&self) -> &EngineId {
        &self.engine
    }

    pub fn session(&self) -> Option<&dyn Session> {
        self.slot.get()
    }

    pub fn session_mut(&mut self) -> Option<&mut (dyn Session + 'static)> {
        self.slot.get_mut()
    }

    pub fn is_disabled_shown(&self) -> bool {
        self.presenter.is_shown(self.host.as_ref())
    }

    /// Establish the initial state from whatever artifact the host has open.
    /// With no artifact open the controller goes straight to disabled.
    pub fn bootstrap(&mut self) -> Transition {
        let engine = self.engine.clone();
        self.guarded(|this| {
            let observation = match this.observe(None)? {
                Observation::NoLocation => Observation::Unrecognized {
                    detail: "no artifact is open".to_string(),
                },
                other => other,
            };
            let effects = plan(&this.state, None, observation);
            this.apply(&engine, effects)
        })
    }

    /// Start a session for a context already known to the caller.
    pub fn establish(&mut self, pipeline: PipelineHandle, context: Context) -> Transition {
        let engine = self.engine.clone();
        self.guarded(|this| {
            let effects = plan(
                &this.state,
                None,
                Observation::Resolved { pipeline, context },
            );
            this.apply(&engine, effects)
        })
    }

    /// Permanent subscription entry point. Returns `None` for events that
    /// cannot change the artifact's identity.
    pub fn on_host_event(&mut self, event: &HostEvent) -> Option<Transition> {
        if !event.triggers_transition() {
            debug!(?event, "ignoring host event");
            return None;
        }
        let engine = self.engine.clone();
        let previous = self.state.previous_context().cloned();
        Some(self.handle_event(&engine, previous.as_ref()))
    }

    /// React to an artifact identity change.
    ///
    /// Never fails: unexpected errors are reported through the host's error
    /// channel and returned as [`Transition::Failed`].
    #[instrument(skip_all, fields(engine = %engine))]
    pub fn handle_event(
        &mut self,
        engine: &EngineId,
        previous_context: Option<&Context>,
    ) -> Transition {
        self.guarded(|this| {
            let observation = this.observe(previous_context)?;
            let target = match &observation {
                Observation::Resolved { context, .. } => Some(context.clone()),
                _ => None,
            };

            let effects = plan(&this.state, previous_context, observation);
            if effects.is_empty() {
                debug!("context unchanged, keeping current state");
                return Ok(Transition::Unchanged);
            }

            if let Some(session) = this.slot.get() {
                session.log_debug("Ready to switch context because of a host event.");
                session.log_debug(&format!("Prev context: {}", session.context()));
                if let Some(target) = &target {
                    session.log_debug(&format!("New context: {target}"));
                }
            }

            this.apply(engine, effects)
        })
    }

    fn observe(&self, previous: Option<&Context>) -> Result<Observation> {
        let Some(path) = self.host.artifact_path() else {
            debug!("artifact has no location");
            return Ok(Observation::NoLocation);
        };

        // The artifact may belong to a different installation than the
        // current session's.
        let pipeline = match self.resolver.pipeline_for_path(&path) {
            Ok(pipeline) => pipeline,
            Err(e @ HostlinkError::UnrecognizedLocation { .. }) => {
                return Ok(Observation::Unrecognized {
                    detail: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        };

        match self.resolver.context_from_path(&pipeline, &path, previous) {
            Ok(context) => Ok(Observation::Resolved { pipeline, context }),
            Err(e @ HostlinkError::UnrecognizedLocation { .. }) => Ok(Observation::Unrecognized {
                detail: e.to_string(),
            }),
            Err(e) => Err(e),
        }
    }

    fn apply(&mut self, engine: &EngineId, effects: Vec<Effect>) -> Result<Transition> {
        let mut outcome = Transition::Unchanged;
        let mut pending: VecDeque<Effect> = effects.into();

        while let Some(effect) = pending.pop_front() {
            match effect {
                Effect::ClearDisabled => {
                    self.presenter.clear(self.host.as_ref())?;
                }
                Effect::DestroySession => {
                    self.slot.take_and_destroy();
                }
                Effect::StartSession { pipeline, context } => {
                    let factory = &self.factory;
                    let started = self
                        .slot
                        .replace_with(|| factory.start(engine, pipeline, context.clone()));
                    match started {
                        Ok(session) => {
                            session.log_debug("Launched new engine for context!");
                            info!(
                                session = %session.id(),
                                engine = %session.engine(),
                                %context,
                                "session started"
                            );
                            self.state = ControllerState::Active {
                                context: context.clone(),
                            };
                            outcome = Transition::Activated { context };
                        }
                        Err(e @ HostlinkError::EngineInit(_)) => {
                            // `state` still names the context we came from,
                            // which stays the resolver's hint.
                            pending.push_front(Effect::ShowDisabled {
                                reason: DisabledReason::EngineInit,
                                detail: e.to_string(),
                            });
                        }
                        Err(e) => return Err(e),
                    }
                }
                Effect::ShowDisabled { reason, detail } => {
                    info!(reason = reason.as_str(), %detail, "pipeline disabled");
                    self.host
                        .display_info(&format!("Pipeline engine cannot be started: {detail}"));
                    self.presenter.show(self.host.as_ref())?;
                    self.state = ControllerState::Disabled {
                        last_context: self.state.previous_context().cloned(),
                    };
                    outcome = Transition::Disabled { reason, detail };
                }
            }
        }

        Ok(outcome)
    }

    /// The single catch-all boundary between the controller and the host.
    fn guarded<F>(&mut self, step: F) -> Transition
    where
        F: FnOnce(&mut Self) -> Result<Transition>,
    {
        match catch_panic(|| step(self)) {
            Ok(Ok(transition)) => transition,
            Ok(Err(e)) => self.contain(Diagnostic::from_error(&e)),
            Err(diagnostic) => self.contain(diagnostic),
        }
    }

    /// Report an unexpected failure and bring `state` back in line with
    /// what actually survived.
    fn contain(&mut self, diagnostic: Diagnostic) -> Transition {
        error!(
            kind = %diagnostic.kind,
            message = %diagnostic.message,
            "unexpected failure during context transition"
        );
        self.host.display_error(&diagnostic.render());

        if let Some(session) = self.slot.get() {
            self.state = ControllerState::Active {
                context: session.context().clone(),
            };
        } else {
            self.state = ControllerState::Disabled {
                last_context: self.state.previous_context().cloned(),
            };
            if !self.presenter.is_shown(self.host.as_ref()) {
                if let Err(e) = self.presenter.show(self.host.as_ref()) {
                    warn!(error = %e, "could not render disabled marker");
                }
            }
        }

        Transition::Failed(diagnostic)
    }
}

impl std::fmt::Debug for TransitionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransitionController")
            .field("engine", &self.engine)
            .field("state", &self.state)
            .field("slot", &self.slot)
            .finish_non_exhaustive()
    }
}
