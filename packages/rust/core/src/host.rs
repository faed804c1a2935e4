//! Host application seams.
//!
//! Everything hostlink needs from the creative application it runs inside:
//! a console, named menus, a progress indicator, and a few facts about the
//! open artifact. Implementations use interior mutability; every method
//! takes `&self`.

use std::path::{Path, PathBuf};

use hostlink_shared::Result;

// ---------------------------------------------------------------------------
// Menus
// ---------------------------------------------------------------------------

/// A named, top-level menu-like UI affordance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Menu {
    /// Unique name the host tracks the menu by.
    pub name: String,
    /// Label shown in the menu bar.
    pub label: String,
    pub items: Vec<MenuItem>,
}

/// One entry in a [`Menu`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItem {
    pub label: String,
    pub action: MenuAction,
}

/// What happens when a menu item is invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuAction {
    /// Informational entry; does nothing when clicked.
    Label,
    /// Pop up a modal message with a single "Ok" button.
    ShowMessage { title: String, message: String },
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// User-visible message channel of the host.
pub trait Console: Send + Sync {
    fn display_info(&self, message: &str);
    fn display_warning(&self, message: &str);
    fn display_error(&self, message: &str);
}

/// Create, check and delete named menus.
pub trait MenuHost: Send + Sync {
    fn menu_exists(&self, name: &str) -> bool;
    fn create_menu(&self, menu: Menu) -> Result<()>;
    fn delete_menu(&self, name: &str) -> Result<()>;
}

/// The host's main progress indicator.
pub trait ProgressIndicator: Send + Sync {
    /// Start a non-interruptible progress run labelled `status`.
    fn begin(&self, status: &str);
    /// Advance by `delta` percentage points.
    fn step(&self, delta: u8);
    fn end(&self);
}

/// A host application instance.
pub trait Host: Console + MenuHost + ProgressIndicator {
    /// Location of the open artifact; `None` for an unsaved document.
    fn artifact_path(&self) -> Option<PathBuf>;

    /// `false` when the host runs headless (batch or prompt mode).
    fn has_ui(&self) -> bool;

    /// Host platform tag, e.g. `linux64`.
    fn platform(&self) -> String;

    /// Host application version string.
    fn version(&self) -> String;

    /// Point the host's project/workspace at `path`.
    fn set_project(&self, path: &Path) -> Result<()>;
}
