//! Core domain types for hostlink sessions.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// SessionId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for session identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Generate a new time-sortable session identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// EngineId
// ---------------------------------------------------------------------------

/// Instance name of the engine a session runs (e.g. `tk-maya`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EngineId(pub String);

impl EngineId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl fmt::Display for EngineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// A typed reference to a pipeline entity (`Project`, `Shot`, `Asset`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    /// Entity type, e.g. `Shot`.
    pub kind: String,
    /// Entity name, e.g. `sh010`.
    pub name: String,
}

impl EntityRef {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.name)
    }
}

/// Where in the pipeline an artifact lives.
///
/// Immutable once built; compared by value to decide whether a lifecycle
/// event changes the session's scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Context {
    /// Owning project.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<EntityRef>,
    /// Entity within the project (shot, asset, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<EntityRef>,
    /// Pipeline step (e.g. `anim`, `light`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    /// Any additional template fields captured during resolution.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl Context {
    /// A context scoped to a project only.
    pub fn for_project(name: impl Into<String>) -> Self {
        Self {
            project: Some(EntityRef::new("Project", name)),
            ..Self::default()
        }
    }

    /// Builder-style: set the entity.
    pub fn with_entity(mut self, kind: impl Into<String>, name: impl Into<String>) -> Self {
        self.entity = Some(EntityRef::new(kind, name));
        self
    }

    /// Builder-style: set the step.
    pub fn with_step(mut self, step: impl Into<String>) -> Self {
        self.step = Some(step.into());
        self
    }

    /// Whether the context identifies nothing at all.
    pub fn is_empty(&self) -> bool {
        self.project.is_none() && self.entity.is_none() && self.step.is_none()
    }

    /// Flatten the context into template fields (`project`, `entity_type`,
    /// `entity`, `step`, plus extras).
    pub fn as_template_fields(&self) -> BTreeMap<String, String> {
        let mut fields = self.extra.clone();
        if let Some(project) = &self.project {
            fields.insert("project".into(), project.name.clone());
        }
        if let Some(entity) = &self.entity {
            fields.insert("entity_type".into(), entity.kind.clone());
            fields.insert("entity".into(), entity.name.clone());
        }
        if let Some(step) = &self.step {
            fields.insert("step".into(), step.clone());
        }
        fields
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("<empty context>");
        }
        let mut parts = Vec::new();
        if let Some(project) = &self.project {
            parts.push(project.to_string());
        }
        if let Some(entity) = &self.entity {
            parts.push(entity.to_string());
        }
        if let Some(step) = &self.step {
            parts.push(format!("Step {step}"));
        }
        f.write_str(&parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_equality_is_by_value() {
        let a = Context::for_project("demo")
            .with_entity("Shot", "sh010")
            .with_step("anim");
        let b = Context::for_project("demo")
            .with_entity("Shot", "sh010")
            .with_step("anim");
        let c = Context::for_project("demo")
            .with_entity("Shot", "sh020")
            .with_step("anim");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn context_display() {
        let ctx = Context::for_project("demo").with_entity("Asset", "chair");
        assert_eq!(ctx.to_string(), "Project demo, Asset chair");
        assert_eq!(Context::default().to_string(), "<empty context>");
    }

    #[test]
    fn template_fields_include_extras() {
        let mut ctx = Context::for_project("demo")
            .with_entity("Shot", "sh010")
            .with_step("light");
        ctx.extra.insert("version".into(), "003".into());

        let fields = ctx.as_template_fields();
        assert_eq!(fields["project"], "demo");
        assert_eq!(fields["entity_type"], "Shot");
        assert_eq!(fields["entity"], "sh010");
        assert_eq!(fields["step"], "light");
        assert_eq!(fields["version"], "003");
    }

    #[test]
    fn context_serialization_skips_empty_fields() {
        let ctx = Context::for_project("demo");
        let json = serde_json::to_string(&ctx).expect("serialize");
        assert!(!json.contains("entity"));
        let parsed: Context = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, ctx);
    }

    #[test]
    fn session_ids_are_unique() {
        assert_ne!(SessionId::new(), SessionId::new());
    }
}
