//! Session contract and the single-owner session slot.

use hostlink_resolver::PipelineHandle;
use hostlink_shared::{Context, EngineId, Result, SessionId};
use tracing::debug;

use crate::queue::{DrainReport, JobQueue};

/// One running engine instance bound to exactly one [`Context`].
pub trait Session {
    fn id(&self) -> &SessionId;

    fn engine(&self) -> &EngineId;

    /// The context this session was started for.
    fn context(&self) -> &Context;

    /// The session's job queue.
    fn jobs(&mut self) -> &mut JobQueue;

    /// Drain the job queue against the host's progress indicator.
    fn execute_queue(&mut self) -> DrainReport;

    /// Tear down: release owned UI, drop pending jobs. Called exactly once
    /// by [`SessionSlot`].
    fn destroy(&mut self);

    fn log_debug(&self, message: &str);
    fn log_info(&self, message: &str);
    fn log_warning(&self, message: &str);
    fn log_error(&self, message: &str);
}

/// Starts sessions.
///
/// Fails with [`HostlinkError::EngineInit`](hostlink_shared::HostlinkError::EngineInit)
/// when the engine cannot run for the given context; any other error is
/// unexpected.
pub trait SessionFactory {
    fn start(
        &self,
        engine: &EngineId,
        pipeline: PipelineHandle,
        context: Context,
    ) -> Result<Box<dyn Session>>;
}

// ---------------------------------------------------------------------------
// SessionSlot
// ---------------------------------------------------------------------------

/// Holds at most one live session.
///
/// Replacing the occupant always destroys it *before* the successor is
/// constructed, so two sessions never coexist.
#[derive(Default)]
pub struct SessionSlot {
    current: Option<Box<dyn Session>>,
}

impl SessionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_occupied(&self) -> bool {
        self.current.is_some()
    }

    pub fn get(&self) -> Option<&dyn Session> {
        self.current.as_deref()
    }

    pub fn get_mut(&mut self) -> Option<&mut (dyn Session + 'static)> {
        self.current.as_deref_mut()
    }

    /// Destroy and drop the occupant. Returns `false` if the slot was empty.
    pub fn take_and_destroy(&mut self) -> bool {
        match self.current.take() {
            Some(mut session) => {
                debug!(session = %session.id(), context = %session.context(), "destroying session");
                session.destroy();
                true
            }
            None => false,
        }
    }

    /// Destroy the occupant, then install whatever `start` builds.
    ///
    /// If `start` fails the slot is left empty.
    pub fn replace_with<F>(&mut self, start: F) -> Result<&mut (dyn Session + 'static)>
    where
        F: FnOnce() -> Result<Box<dyn Session>>,
    {
        self.take_and_destroy();
        let session = start()?;
        Ok(&mut **self.current.insert(session))
    }
}

impl std::fmt::Debug for SessionSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSlot")
            .field("session", &self.current.as_ref().map(|s| s.id().to_string()))
            .finish()
    }
}
