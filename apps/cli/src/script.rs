//! Simulation scripts: a headless host description plus an ordered list of
//! lifecycle steps, read from TOML.

use std::path::{Path, PathBuf};

use color_eyre::eyre::{Result, WrapErr};
use hostlink_core::queue::JobArgs;
use serde::Deserialize;

/// A parsed simulation script.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Script {
    #[serde(default)]
    pub host: HostSpec,

    #[serde(default)]
    pub steps: Vec<Step>,
}

/// `[host]` section: facts the headless host reports.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct HostSpec {
    #[serde(default = "default_true")]
    pub ui: bool,
    #[serde(default = "default_platform")]
    pub platform: String,
    #[serde(default = "default_version")]
    pub version: String,
    /// Artifact open before the first step.
    #[serde(default)]
    pub open: Option<PathBuf>,
}

impl Default for HostSpec {
    fn default() -> Self {
        Self {
            ui: true,
            platform: default_platform(),
            version: default_version(),
            open: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_platform() -> String {
    std::env::consts::OS.to_string()
}

fn default_version() -> String {
    "1.0".into()
}

/// One `[[steps]]` entry.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub(crate) enum Step {
    /// Load a file.
    Open { path: PathBuf },
    /// Create a new, never-saved document.
    New,
    /// Save in place.
    Save,
    /// Save to a new location.
    SaveAs { path: PathBuf },
    /// Emit a host notification the controller does not react to.
    Event { name: String },
    /// Queue a job on the live session.
    Enqueue {
        name: String,
        #[serde(flatten)]
        job: JobSpec,
        #[serde(default)]
        args: JobArgs,
    },
    /// Run the live session's queue.
    Drain,
}

/// What a scripted job does when it runs.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum JobSpec {
    /// Report each percentage in turn, then succeed.
    Progress {
        #[serde(default = "default_progress")]
        report: Vec<u8>,
    },
    Fail { message: String },
    Panic { message: String },
}

fn default_progress() -> Vec<u8> {
    vec![25, 50, 75, 100]
}

impl Step {
    /// Short label used in the simulation transcript.
    pub(crate) fn describe(&self) -> String {
        match self {
            Self::Open { path } => format!("open {}", path.display()),
            Self::New => "new".into(),
            Self::Save => "save".into(),
            Self::SaveAs { path } => format!("save_as {}", path.display()),
            Self::Event { name } => format!("event {name}"),
            Self::Enqueue { name, .. } => format!("enqueue {name}"),
            Self::Drain => "drain".into(),
        }
    }
}

impl Script {
    pub(crate) fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).wrap_err("invalid simulation script")
    }

    /// Read a script; relative artifact paths are taken relative to the
    /// script's own directory.
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read {}", path.display()))?;
        let mut script = Self::parse(&content)?;
        let base = path.parent().unwrap_or(Path::new("."));
        script.rebase(base);
        Ok(script)
    }

    fn rebase(&mut self, base: &Path) {
        let absolutize = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        if let Some(open) = self.host.open.as_mut() {
            absolutize(open);
        }
        for step in &mut self.steps {
            match step {
                Step::Open { path } | Step::SaveAs { path } => absolutize(path),
                _ => {}
            }
        }
    }
}
