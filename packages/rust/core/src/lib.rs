//! Session lifecycle for a pipeline engine embedded in a host application.
//!
//! The [`controller::TransitionController`] keeps exactly one of {a live
//! [`session::Session`], the disabled marker} present as the host opens and
//! saves artifacts. Sessions own a sequential [`queue::JobQueue`].

pub mod controller;
pub mod diagnostic;
pub mod disabled;
pub mod engine;
pub mod host;
pub mod queue;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use controller::{HostEvent, Transition, TransitionController};
pub use engine::{EngineFactory, EngineSession};
pub use host::Host;
pub use session::{Session, SessionFactory};
