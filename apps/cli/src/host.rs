//! Headless host backing the `simulate` command.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use hostlink_core::host::{Console, Host, Menu, MenuHost, ProgressIndicator};
use hostlink_shared::Result;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tracing::debug;

use crate::script::HostSpec;

#[derive(Default)]
struct State {
    artifact: Option<PathBuf>,
    project: Option<PathBuf>,
    menus: BTreeMap<String, Menu>,
    bar: Option<ProgressBar>,
}

/// Terminal-backed host: console lines go to stdout/stderr, menus are kept
/// in memory, progress is an indicatif bar.
pub(crate) struct ScriptHost {
    spec: HostSpec,
    show_progress: bool,
    state: Mutex<State>,
}

impl ScriptHost {
    pub(crate) fn new(spec: HostSpec, show_progress: bool) -> Self {
        let state = State {
            artifact: spec.open.clone(),
            ..State::default()
        };
        Self {
            spec,
            show_progress,
            state: Mutex::new(state),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Change the open artifact; `None` models a new, unsaved document.
    pub(crate) fn set_artifact(&self, path: Option<PathBuf>) {
        debug!(artifact = ?path, "artifact changed");
        self.state().artifact = path;
    }

    pub(crate) fn menu_names(&self) -> Vec<String> {
        self.state().menus.keys().cloned().collect()
    }

    pub(crate) fn project(&self) -> Option<PathBuf> {
        self.state().project.clone()
    }

    fn new_bar(&self, status: &str) -> ProgressBar {
        let bar = ProgressBar::new(100);
        if !self.show_progress {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        }
        let style = ProgressStyle::with_template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        bar.set_style(style);
        bar.set_message(status.to_string());
        bar
    }
}

impl Console for ScriptHost {
    fn display_info(&self, message: &str) {
        println!("{message}");
    }

    fn display_warning(&self, message: &str) {
        eprintln!("warning: {message}");
    }

    fn display_error(&self, message: &str) {
        eprintln!("error: {message}");
    }
}

impl MenuHost for ScriptHost {
    fn menu_exists(&self, name: &str) -> bool {
        self.state().menus.contains_key(name)
    }

    fn create_menu(&self, menu: Menu) -> Result<()> {
        debug!(menu = %menu.name, items = menu.items.len(), "menu created");
        self.state().menus.insert(menu.name.clone(), menu);
        Ok(())
    }

    fn delete_menu(&self, name: &str) -> Result<()> {
        debug!(menu = name, "menu deleted");
        self.state().menus.remove(name);
        Ok(())
    }
}

impl ProgressIndicator for ScriptHost {
    fn begin(&self, status: &str) {
        let bar = self.new_bar(status);
        if let Some(old) = self.state().bar.replace(bar) {
            old.finish_and_clear();
        }
    }

    fn step(&self, delta: u8) {
        if let Some(bar) = &self.state().bar {
            bar.inc(u64::from(delta));
        }
    }

    fn end(&self) {
        if let Some(bar) = self.state().bar.take() {
            bar.finish_and_clear();
        }
    }
}

impl Host for ScriptHost {
    fn artifact_path(&self) -> Option<PathBuf> {
        self.state().artifact.clone()
    }

    fn has_ui(&self) -> bool {
        self.spec.ui
    }

    fn platform(&self) -> String {
        self.spec.platform.clone()
    }

    fn version(&self) -> String {
        self.spec.version.clone()
    }

    fn set_project(&self, path: &Path) -> Result<()> {
        self.state().project = Some(path.to_path_buf());
        Ok(())
    }
}
