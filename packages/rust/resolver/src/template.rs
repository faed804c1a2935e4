//! Path template parser.
//!
//! A template is a `/`-separated path with `{field}` placeholders:
//! - `{project}/shots/{entity}/{step}` matches `demo/shots/sh010/anim/...`
//! - each placeholder captures exactly one path segment (or part of one)
//! - literal text must match verbatim
//!
//! Templates match path *prefixes*, so a folder template also recognizes
//! every file stored beneath that folder.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use hostlink_shared::{HostlinkError, Result};
use regex::Regex;

// ---------------------------------------------------------------------------
// Regex patterns (compiled once)
// ---------------------------------------------------------------------------

/// Matches a `{field}` placeholder.
static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder regex"));

// ---------------------------------------------------------------------------
// Template
// ---------------------------------------------------------------------------

/// A compiled path template.
#[derive(Debug, Clone)]
pub struct Template {
    /// Key the template is registered under in `pipeline.toml`.
    pub key: String,
    /// Template text as written in the config.
    pub definition: String,
    /// Entity type assigned to `{entity}` when this template matches.
    pub entity_type: Option<String>,
    /// Placeholder names in order of appearance.
    fields: Vec<String>,
    matcher: Regex,
}

impl Template {
    /// Parse and compile a template definition.
    pub fn parse(
        key: impl Into<String>,
        definition: &str,
        entity_type: Option<String>,
    ) -> Result<Self> {
        let key = key.into();
        let definition = definition.trim_matches('/');
        if definition.is_empty() {
            return Err(HostlinkError::validation(format!(
                "template '{key}' is empty"
            )));
        }
        if definition.contains("//") {
            return Err(HostlinkError::validation(format!(
                "template '{key}' contains an empty path segment"
            )));
        }

        let mut pattern = String::from("^");
        let mut fields = Vec::new();
        let mut last = 0;

        for caps in PLACEHOLDER_RE.captures_iter(definition) {
            let Some(whole) = caps.get(0) else { continue };
            let name = caps[1].to_string();
            if fields.contains(&name) {
                return Err(HostlinkError::validation(format!(
                    "template '{key}' repeats field '{{{name}}}'"
                )));
            }
            let literal = &definition[last..whole.start()];
            check_literal(&key, literal)?;
            pattern.push_str(&regex::escape(literal));
            pattern.push_str(&format!("(?P<{name}>[^/]+?)"));
            fields.push(name);
            last = whole.end();
        }

        let tail = &definition[last..];
        check_literal(&key, tail)?;
        pattern.push_str(&regex::escape(tail));
        pattern.push_str("(?:/|$)");

        let matcher = Regex::new(&pattern).map_err(|e| {
            HostlinkError::validation(format!("template '{key}' does not compile: {e}"))
        })?;

        Ok(Self {
            key,
            definition: definition.to_string(),
            entity_type,
            fields,
            matcher,
        })
    }

    /// Placeholder names in order of appearance.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Match a root-relative, `/`-separated path. Returns captured fields.
    pub fn match_path(&self, relative: &str) -> Option<BTreeMap<String, String>> {
        let caps = self.matcher.captures(relative)?;
        let mut values = BTreeMap::new();
        for name in &self.fields {
            let value = caps.name(name)?.as_str();
            values.insert(name.clone(), value.to_string());
        }
        Some(values)
    }

    /// Expand the template with `fields`. Every placeholder must be supplied.
    pub fn apply_fields(&self, fields: &BTreeMap<String, String>) -> Result<String> {
        expand(&self.key, &self.definition, fields)
    }

    /// Expand the template only up to (and including) the segment holding
    /// `{field}`. Returns `None` when the template has no such placeholder.
    pub fn apply_prefix(
        &self,
        field: &str,
        fields: &BTreeMap<String, String>,
    ) -> Option<Result<String>> {
        let marker = format!("{{{field}}}");
        let start = self.definition.find(&marker)?;
        let end = self.definition[start..]
            .find('/')
            .map(|offset| start + offset)
            .unwrap_or(self.definition.len());
        Some(expand(&self.key, &self.definition[..end], fields))
    }
}

fn check_literal(key: &str, literal: &str) -> Result<()> {
    if literal.contains('{') || literal.contains('}') {
        return Err(HostlinkError::validation(format!(
            "template '{key}' has an unbalanced or invalid placeholder near '{literal}'"
        )));
    }
    Ok(())
}

fn expand(key: &str, definition: &str, fields: &BTreeMap<String, String>) -> Result<String> {
    let mut out = String::with_capacity(definition.len());
    let mut last = 0;
    for caps in PLACEHOLDER_RE.captures_iter(definition) {
        let Some(whole) = caps.get(0) else { continue };
        let name = &caps[1];
        let value = fields.get(name).ok_or_else(|| {
            HostlinkError::validation(format!(
                "template '{key}' needs field '{name}' which the context does not provide"
            ))
        })?;
        out.push_str(&definition[last..whole.start()]);
        out.push_str(value);
        last = whole.end();
    }
    out.push_str(&definition[last..]);
    Ok(out)
}
