//! Filesystem-backed pipeline lookup and context resolution.
//!
//! Before a session can be scoped to an artifact, hostlink has to find the
//! pipeline installation that owns the artifact's path (any ancestor folder
//! holding `.pipeline/pipeline.toml`), then match the path against that
//! installation's templates to derive a [`Context`].

mod template;

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use hostlink_shared::{Context, EntityRef, HostlinkError, ResolverSettings, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

pub use template::Template;

/// Template fields that map onto [`Context`] members rather than `extra`.
const CONTEXT_FIELDS: [&str; 4] = ["project", "entity_type", "entity", "step"];

// ---------------------------------------------------------------------------
// Pipeline config (pipeline.toml)
// ---------------------------------------------------------------------------

/// Contents of `<root>/.pipeline/pipeline.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Human-readable installation name.
    pub name: String,

    /// Path templates keyed by name.
    #[serde(default)]
    pub templates: BTreeMap<String, TemplateDef>,
}

/// `[templates.<key>]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateDef {
    /// Root-relative template, e.g. `{project}/shots/{entity}/{step}`.
    pub path: String,
    /// Entity type for the `{entity}` field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
}

// ---------------------------------------------------------------------------
// Installation
// ---------------------------------------------------------------------------

/// A pipeline installation rooted at a folder on disk.
#[derive(Debug)]
pub struct Installation {
    root: PathBuf,
    name: String,
    templates: Vec<Template>,
}

/// Shared handle to an installation, as passed to session factories.
pub type PipelineHandle = Arc<Installation>;

impl Installation {
    /// Build an installation from an already-parsed config.
    pub fn new(root: impl Into<PathBuf>, config: &PipelineConfig) -> Result<Self> {
        let templates = config
            .templates
            .iter()
            .map(|(key, def)| Template::parse(key.clone(), &def.path, def.entity_type.clone()))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            root: root.into(),
            name: config.name.clone(),
            templates,
        })
    }

    /// Locate the installation owning `path` by walking up its ancestors.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn locate(path: &Path, settings: &ResolverSettings) -> Result<Self> {
        for dir in path.ancestors() {
            let candidate = dir
                .join(&settings.config_dir_name)
                .join(&settings.config_file_name);
            if candidate.is_file() {
                debug!(root = %dir.display(), "pipeline installation found");
                let config = load_pipeline_config(&candidate)?;
                return Self::new(dir, &config);
            }
        }

        Err(HostlinkError::unrecognized(
            path,
            "no pipeline installation owns this location",
        ))
    }

    /// Installation root folder.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a template by key.
    pub fn template(&self, key: &str) -> Option<&Template> {
        self.templates.iter().find(|t| t.key == key)
    }

    /// Resolve the context for `path`.
    ///
    /// The template capturing the most fields wins. When the hint names the
    /// same project and entity, its step is carried over if the path alone
    /// does not determine one.
    pub fn context_from_path(&self, path: &Path, hint: Option<&Context>) -> Result<Context> {
        let relative = path.strip_prefix(&self.root).map_err(|_| {
            HostlinkError::unrecognized(
                path,
                format!("outside of pipeline '{}' at {}", self.name, self.root.display()),
            )
        })?;
        let relative = to_slash(relative);

        let best = self
            .templates
            .iter()
            .filter_map(|t| t.match_path(&relative).map(|fields| (t, fields)))
            .max_by_key(|(t, _)| t.fields().len());

        let Some((template, fields)) = best else {
            return Err(HostlinkError::unrecognized(
                path,
                format!("matches no template of pipeline '{}'", self.name),
            ));
        };

        debug!(template = %template.key, ?fields, "path matched template");
        let mut context = context_from_fields(template, fields);

        if let Some(hint) = hint {
            let same_entity = hint.project == context.project && hint.entity == context.entity;
            if same_entity && context.step.is_none() {
                context.step = hint.step.clone();
            }
        }

        Ok(context)
    }

    /// Folders on disk belonging to the context's entity, or to its project
    /// when it has no entity.
    pub fn paths_for_context(&self, context: &Context) -> Vec<PathBuf> {
        let fields = context.as_template_fields();
        let field = match (&context.entity, &context.project) {
            (Some(_), _) => "entity",
            (None, Some(_)) => "project",
            (None, None) => return Vec::new(),
        };

        let mut paths: Vec<PathBuf> = self
            .templates
            .iter()
            .filter(|t| match (&context.entity, &t.entity_type) {
                (Some(entity), Some(kind)) => &entity.kind == kind,
                (Some(_), None) => false,
                (None, _) => true,
            })
            .filter_map(|t| t.apply_prefix(field, &fields)?.ok())
            .map(|relative| self.root.join(relative))
            .filter(|p| p.is_dir())
            .collect();

        paths.sort();
        paths.dedup();
        paths
    }
}

fn context_from_fields(template: &Template, mut fields: BTreeMap<String, String>) -> Context {
    let project = fields.remove("project").map(|name| EntityRef::new("Project", name));
    let entity_type = fields
        .remove("entity_type")
        .or_else(|| template.entity_type.clone());
    let entity = match (entity_type, fields.remove("entity")) {
        (Some(kind), Some(name)) => Some(EntityRef::new(kind, name)),
        _ => None,
    };
    let step = fields.remove("step");
    fields.retain(|k, _| !CONTEXT_FIELDS.contains(&k.as_str()));

    Context {
        project,
        entity,
        step,
        extra: fields,
    }
}

fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Parse a `pipeline.toml`.
pub fn load_pipeline_config(path: &Path) -> Result<PipelineConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| HostlinkError::io(path, e))?;
    toml::from_str(&content).map_err(|e| {
        HostlinkError::validation(format!("failed to parse {}: {e}", path.display()))
    })
}

// ---------------------------------------------------------------------------
// ContextResolver
// ---------------------------------------------------------------------------

/// Resolves artifact locations to pipeline contexts.
///
/// Both methods fail with [`HostlinkError::UnrecognizedLocation`] for
/// paths no pipeline knows about; any other error is unexpected.
pub trait ContextResolver: Send + Sync {
    /// Pipeline handle for the installation owning `path`.
    fn pipeline_for_path(&self, path: &Path) -> Result<PipelineHandle>;

    /// Context of `path` within `pipeline`, disambiguated by `hint`.
    fn context_from_path(
        &self,
        pipeline: &PipelineHandle,
        path: &Path,
        hint: Option<&Context>,
    ) -> Result<Context>;
}

/// Resolver reading installations straight from disk on every call.
#[derive(Debug, Clone, Default)]
pub struct FsResolver {
    settings: ResolverSettings,
}

impl FsResolver {
    pub fn new(settings: ResolverSettings) -> Self {
        Self { settings }
    }
}

impl ContextResolver for FsResolver {
    fn pipeline_for_path(&self, path: &Path) -> Result<PipelineHandle> {
        Installation::locate(path, &self.settings).map(Arc::new)
    }

    fn context_from_path(
        &self,
        pipeline: &PipelineHandle,
        path: &Path,
        hint: Option<&Context>,
    ) -> Result<Context> {
        pipeline.context_from_path(path, hint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PIPELINE_TOML: &str = r#"
name = "demo-pipeline"

[templates.project_root]
path = "{project}"

[templates.shot_step]
path = "{project}/shots/{entity}/{step}"
entity_type = "Shot"

[templates.asset_step]
path = "{project}/assets/{entity}/{step}"
entity_type = "Asset"

[templates.shot_root]
path = "{project}/shots/{entity}"
entity_type = "Shot"
"#;

    fn write_installation(root: &Path) {
        let cfg_dir = root.join(".pipeline");
        std::fs::create_dir_all(&cfg_dir).expect("mkdir .pipeline");
        std::fs::write(cfg_dir.join("pipeline.toml"), PIPELINE_TOML).expect("write config");
    }

    #[test]
    fn locate_walks_up_to_installation_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_installation(dir.path());
        let file = dir.path().join("demo/shots/sh010/anim/work/scene.ma");

        let inst = Installation::locate(&file, &ResolverSettings::default()).expect("locate");
        assert_eq!(inst.root(), dir.path());
        assert_eq!(inst.name(), "demo-pipeline");
        assert!(inst.template("shot_step").is_some());
    }

    #[test]
    fn locate_fails_outside_any_installation() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = Installation::locate(&dir.path().join("scratch.ma"), &ResolverSettings::default())
            .unwrap_err();
        assert!(err.is_expected());
        assert!(matches!(err, HostlinkError::UnrecognizedLocation { .. }));
    }

    #[test]
    fn context_uses_most_specific_template() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_installation(dir.path());
        let inst = Installation::locate(dir.path(), &ResolverSettings::default()).expect("locate");

        let ctx = inst
            .context_from_path(&dir.path().join("demo/shots/sh010/anim/scene.ma"), None)
            .expect("resolve");
        assert_eq!(
            ctx,
            Context::for_project("demo")
                .with_entity("Shot", "sh010")
                .with_step("anim")
        );

        let ctx = inst
            .context_from_path(&dir.path().join("demo/shots/sh010"), None)
            .expect("resolve");
        assert_eq!(ctx, Context::for_project("demo").with_entity("Shot", "sh010"));
    }

    #[test]
    fn hint_supplies_step_for_same_entity() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_installation(dir.path());
        let inst = Installation::locate(dir.path(), &ResolverSettings::default()).expect("locate");
        let hint = Context::for_project("demo")
            .with_entity("Shot", "sh010")
            .with_step("anim");

        let ctx = inst
            .context_from_path(&dir.path().join("demo/shots/sh010"), Some(&hint))
            .expect("resolve");
        assert_eq!(ctx.step.as_deref(), Some("anim"));

        let ctx = inst
            .context_from_path(&dir.path().join("demo/shots/sh020"), Some(&hint))
            .expect("resolve");
        assert_eq!(ctx.step, None);
    }

    #[test]
    fn unmatched_path_is_unrecognized() {
        let inst = Installation::new(
            "/studio",
            &PipelineConfig {
                name: "empty".into(),
                templates: BTreeMap::new(),
            },
        )
        .expect("build");

        let err = inst
            .context_from_path(Path::new("/studio/demo/file.ma"), None)
            .unwrap_err();
        assert!(err.to_string().contains("matches no template"));

        let err = inst
            .context_from_path(Path::new("/elsewhere/file.ma"), None)
            .unwrap_err();
        assert!(err.to_string().contains("outside of pipeline"));
    }

    #[test]
    fn paths_for_context_lists_existing_entity_folders() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_installation(dir.path());
        std::fs::create_dir_all(dir.path().join("demo/shots/sh010/anim")).expect("mkdir");
        let inst = Installation::locate(dir.path(), &ResolverSettings::default()).expect("locate");

        let shot = Context::for_project("demo").with_entity("Shot", "sh010");
        assert_eq!(
            inst.paths_for_context(&shot),
            vec![dir.path().join("demo/shots/sh010")]
        );

        let missing = Context::for_project("demo").with_entity("Shot", "sh999");
        assert!(inst.paths_for_context(&missing).is_empty());

        let project = Context::for_project("demo");
        assert_eq!(inst.paths_for_context(&project), vec![dir.path().join("demo")]);

        assert!(inst.paths_for_context(&Context::default()).is_empty());
    }

    #[test]
    fn fs_resolver_end_to_end() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_installation(dir.path());
        let file = dir.path().join("demo/assets/chair/model/chair.ma");

        let resolver = FsResolver::default();
        let pipeline = resolver.pipeline_for_path(&file).expect("pipeline");
        let ctx = resolver
            .context_from_path(&pipeline, &file, None)
            .expect("context");
        assert_eq!(ctx.entity, Some(EntityRef::new("Asset", "chair")));
        assert_eq!(ctx.step.as_deref(), Some("model"));
    }
}
