//! "Pipeline unavailable" marker shown when no session can run.

use hostlink_shared::{EngineSettings, Result};
use tracing::debug;

use crate::host::{Menu, MenuAction, MenuHost, MenuItem};

const DISABLED_TITLE: &str = "Pipeline is disabled";

const DISABLED_MESSAGE: &str = "The pipeline is disabled because it cannot recognize the \
     currently opened file. Try opening another file or restarting the application.";

/// Renders and removes the disabled marker.
///
/// The marker and a session's own menu are mutually exclusive: showing the
/// marker deletes the session menu if one is still present.
#[derive(Debug, Clone)]
pub struct DisabledPresenter {
    session_menu: String,
    marker_menu: String,
    label: String,
}

impl DisabledPresenter {
    pub fn new(
        session_menu: impl Into<String>,
        marker_menu: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            session_menu: session_menu.into(),
            marker_menu: marker_menu.into(),
            label: label.into(),
        }
    }

    pub fn from_settings(settings: &EngineSettings) -> Self {
        Self::new(
            &settings.menu_name,
            &settings.disabled_menu_name,
            &settings.menu_label,
        )
    }

    pub fn is_shown<H: MenuHost + ?Sized>(&self, host: &H) -> bool {
        host.menu_exists(&self.marker_menu)
    }

    /// Render the marker, replacing any previous marker or session menu.
    pub fn show<H: MenuHost + ?Sized>(&self, host: &H) -> Result<()> {
        if host.menu_exists(&self.session_menu) {
            host.delete_menu(&self.session_menu)?;
        }
        self.clear(host)?;

        debug!(menu = %self.marker_menu, "showing disabled marker");
        host.create_menu(Menu {
            name: self.marker_menu.clone(),
            label: self.label.clone(),
            items: vec![MenuItem {
                label: "Pipeline is disabled.".to_string(),
                action: MenuAction::ShowMessage {
                    title: DISABLED_TITLE.to_string(),
                    message: DISABLED_MESSAGE.to_string(),
                },
            }],
        })
    }

    /// Remove the marker. Returns whether one was present.
    pub fn clear<H: MenuHost + ?Sized>(&self, host: &H) -> Result<bool> {
        if !host.menu_exists(&self.marker_menu) {
            return Ok(false);
        }
        host.delete_menu(&self.marker_menu)?;
        Ok(true)
    }
}
