//! Recording fakes for the host, session, factory and resolver seams.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use hostlink_resolver::{ContextResolver, Installation, PipelineConfig, PipelineHandle, TemplateDef};
use hostlink_shared::{Context, EngineId, HostlinkError, Result, SessionId};

use crate::host::{Console, Host, Menu, MenuHost, ProgressIndicator};
use crate::queue::{DrainReport, JobQueue};
use crate::session::{Session, SessionFactory};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().expect("test mutex poisoned")
}

// ---------------------------------------------------------------------------
// RecordingHost
// ---------------------------------------------------------------------------

struct HostState {
    artifact: Option<PathBuf>,
    ui: bool,
    platform: String,
    version: String,
    project: Option<PathBuf>,
    menus: BTreeMap<String, Menu>,
    console: Vec<String>,
    progress: Vec<String>,
    fail_menu_calls: bool,
}

/// In-memory host that records everything it is asked to do.
pub(crate) struct RecordingHost {
    state: Mutex<HostState>,
}

impl RecordingHost {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(HostState {
                artifact: None,
                ui: true,
                platform: "linux64".into(),
                version: "2013".into(),
                project: None,
                menus: BTreeMap::new(),
                console: Vec::new(),
                progress: Vec::new(),
                fail_menu_calls: false,
            }),
        }
    }

    pub(crate) fn open(&self, path: Option<&Path>) {
        lock(&self.state).artifact = path.map(Path::to_path_buf);
    }

    pub(crate) fn set_ui(&self, ui: bool) {
        lock(&self.state).ui = ui;
    }

    pub(crate) fn set_version(&self, version: &str) {
        lock(&self.state).version = version.into();
    }

    pub(crate) fn set_platform(&self, platform: &str) {
        lock(&self.state).platform = platform.into();
    }

    pub(crate) fn fail_menu_calls(&self, fail: bool) {
        lock(&self.state).fail_menu_calls = fail;
    }

    pub(crate) fn menu_names(&self) -> Vec<String> {
        lock(&self.state).menus.keys().cloned().collect()
    }

    pub(crate) fn menu(&self, name: &str) -> Option<Menu> {
        lock(&self.state).menus.get(name).cloned()
    }

    /// Console lines prefixed with `info:`, `warning:` or `error:`.
    pub(crate) fn console(&self) -> Vec<String> {
        lock(&self.state).console.clone()
    }

    /// Error-channel messages, without prefix.
    pub(crate) fn errors(&self) -> Vec<String> {
        lock(&self.state)
            .console
            .iter()
            .filter_map(|l| l.strip_prefix("error: "))
            .map(str::to_string)
            .collect()
    }

    pub(crate) fn progress_events(&self) -> Vec<String> {
        lock(&self.state).progress.clone()
    }

    pub(crate) fn project(&self) -> Option<PathBuf> {
        lock(&self.state).project.clone()
    }
}

impl Console for RecordingHost {
    fn display_info(&self, message: &str) {
        lock(&self.state).console.push(format!("info: {message}"));
    }

    fn display_warning(&self, message: &str) {
        lock(&self.state).console.push(format!("warning: {message}"));
    }

    fn display_error(&self, message: &str) {
        lock(&self.state).console.push(format!("error: {message}"));
    }
}

impl MenuHost for RecordingHost {
    fn menu_exists(&self, name: &str) -> bool {
        lock(&self.state).menus.contains_key(name)
    }

    fn create_menu(&self, menu: Menu) -> Result<()> {
        let mut state = lock(&self.state);
        if state.fail_menu_calls {
            return Err(HostlinkError::Host("menu bar is locked".into()));
        }
        state.menus.insert(menu.name.clone(), menu);
        Ok(())
    }

    fn delete_menu(&self, name: &str) -> Result<()> {
        let mut state = lock(&self.state);
        if state.fail_menu_calls {
            return Err(HostlinkError::Host("menu bar is locked".into()));
        }
        state.menus.remove(name);
        Ok(())
    }
}

impl ProgressIndicator for RecordingHost {
    fn begin(&self, status: &str) {
        lock(&self.state).progress.push(format!("begin:{status}"));
    }

    fn step(&self, delta: u8) {
        lock(&self.state).progress.push(format!("step:{delta}"));
    }

    fn end(&self) {
        lock(&self.state).progress.push("end".into());
    }
}

impl Host for RecordingHost {
    fn artifact_path(&self) -> Option<PathBuf> {
        lock(&self.state).artifact.clone()
    }

    fn has_ui(&self) -> bool {
        lock(&self.state).ui
    }

    fn platform(&self) -> String {
        lock(&self.state).platform.clone()
    }

    fn version(&self) -> String {
        lock(&self.state).version.clone()
    }

    fn set_project(&self, path: &Path) -> Result<()> {
        lock(&self.state).project = Some(path.to_path_buf());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

/// Shared, ordered record of session lifecycle calls.
#[derive(Clone, Default)]
pub(crate) struct SessionLog(Arc<Mutex<Vec<String>>>);

impl SessionLog {
    pub(crate) fn push(&self, entry: &str) {
        lock(&self.0).push(entry.to_string());
    }

    pub(crate) fn entries(&self) -> Vec<String> {
        lock(&self.0).clone()
    }

    /// Sessions started minus sessions destroyed.
    pub(crate) fn live(&self) -> usize {
        let entries = self.entries();
        let started = entries.iter().filter(|e| e.starts_with("start ")).count();
        let destroyed = entries.iter().filter(|e| e.starts_with("destroy ")).count();
        started - destroyed
    }
}

pub(crate) struct FakeSession {
    id: SessionId,
    engine: EngineId,
    context: Context,
    queue: JobQueue,
    log: SessionLog,
}

impl FakeSession {
    pub(crate) fn boxed(context: Context, log: SessionLog) -> Box<dyn Session> {
        log.push(&format!("start {context}"));
        Box::new(Self {
            id: SessionId::new(),
            engine: EngineId::new("tk-fake"),
            context,
            queue: JobQueue::new(),
            log,
        })
    }
}

impl Session for FakeSession {
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
        let host = RecordingHost::new();
        self.queue.drain(&host)
    }

    fn destroy(&mut self) {
        self.log.push(&format!("destroy {}", self.context));
    }

    fn log_debug(&self, _message: &str) {}
    fn log_info(&self, _message: &str) {}
    fn log_warning(&self, _message: &str) {}
    fn log_error(&self, _message: &str) {}
}

/// How [`FakeFactory`] responds for a given context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StartBehavior {
    EngineInit,
    Unexpected,
    Panic,
}

#[derive(Default)]
pub(crate) struct FakeFactory {
    log: SessionLog,
    behavior: Mutex<HashMap<Context, StartBehavior>>,
}

impl FakeFactory {
    pub(crate) fn new(log: SessionLog) -> Self {
        Self {
            log,
            behavior: Mutex::new(HashMap::new()),
        }
    }

    /// Make starts for `context` misbehave.
    pub(crate) fn misbehave(self, context: Context, behavior: StartBehavior) -> Self {
        lock(&self.behavior).insert(context, behavior);
        self
    }
}

impl SessionFactory for FakeFactory {
    fn start(
        &self,
        _engine: &EngineId,
        _pipeline: PipelineHandle,
        context: Context,
    ) -> Result<Box<dyn Session>> {
        let behavior = lock(&self.behavior).get(&context).copied();
        match behavior {
            Some(StartBehavior::EngineInit) => {
                self.log.push(&format!("init-failed {context}"));
                Err(HostlinkError::engine_init(format!("no folders for {context}")))
            }
            Some(StartBehavior::Unexpected) => Err(HostlinkError::Host("host crashed".into())),
            Some(StartBehavior::Panic) => explode_during_engine_start(&context),
            None => Ok(FakeSession::boxed(context, self.log.clone())),
        }
    }
}

/// Kept out of line so it shows up as its own frame in backtraces.
#[inline(never)]
pub(crate) fn explode_during_engine_start(context: &Context) -> ! {
    panic!("engine exploded for {context}")
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// What [`FakeResolver`] returns for a path.
#[derive(Debug, Clone)]
pub(crate) enum Resolution {
    Context(Context),
    /// Belongs to a pipeline, but no template matches.
    NoTemplate,
    /// Unexpected I/O failure.
    Broken,
}

#[derive(Default)]
pub(crate) struct FakeResolver {
    paths: Mutex<HashMap<PathBuf, Resolution>>,
    calls: Mutex<usize>,
    hints: Mutex<Vec<Option<Context>>>,
}

impl FakeResolver {
    pub(crate) fn with(self, path: &str, resolution: Resolution) -> Self {
        lock(&self.paths).insert(PathBuf::from(path), resolution);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        *lock(&self.calls)
    }

    /// Context hints passed to `context_from_path`, oldest first.
    pub(crate) fn hints(&self) -> Vec<Option<Context>> {
        lock(&self.hints).clone()
    }
}

impl ContextResolver for FakeResolver {
    fn pipeline_for_path(&self, path: &Path) -> Result<PipelineHandle> {
        *lock(&self.calls) += 1;
        match lock(&self.paths).get(path) {
            Some(Resolution::Broken) => Err(HostlinkError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            )),
            Some(_) => Ok(Arc::new(
                Installation::new("/studio", &PipelineConfig::default()).expect("empty pipeline"),
            )),
            None => Err(HostlinkError::unrecognized(path, "no pipeline installation")),
        }
    }

    fn context_from_path(
        &self,
        _pipeline: &PipelineHandle,
        path: &Path,
        hint: Option<&Context>,
    ) -> Result<Context> {
        lock(&self.hints).push(hint.cloned());
        match lock(&self.paths).get(path) {
            Some(Resolution::Context(ctx)) => Ok(ctx.clone()),
            _ => Err(HostlinkError::unrecognized(path, "matches no template")),
        }
    }
}

// ---------------------------------------------------------------------------
// On-disk installation
// ---------------------------------------------------------------------------

/// Installation rooted at `root` with project/shot/asset templates; each of
/// `dirs` is created below the root.
pub(crate) fn installation(root: &Path, dirs: &[&str]) -> PipelineHandle {
    for dir in dirs {
        std::fs::create_dir_all(root.join(dir)).expect("create fixture dir");
    }

    let mut templates = BTreeMap::new();
    templates.insert(
        "project_root".to_string(),
        TemplateDef {
            path: "{project}".into(),
            entity_type: None,
        },
    );
    templates.insert(
        "shot_step".to_string(),
        TemplateDef {
            path: "{project}/shots/{entity}/{step}".into(),
            entity_type: Some("Shot".into()),
        },
    );
    templates.insert(
        "asset_step".to_string(),
        TemplateDef {
            path: "{project}/assets/{entity}/{step}".into(),
            entity_type: Some("Asset".into()),
        },
    );

    let config = PipelineConfig {
        name: "fixture".into(),
        templates,
    };
    Arc::new(Installation::new(root, &config).expect("fixture installation"))
}
