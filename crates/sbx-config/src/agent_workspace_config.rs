use sbx_core::{ResourceLimits, WorkspaceError};
use serde::Serialize;
use serde_json::Value;

use crate::repo_source::RepoSource;

/// The closed set of tool names a workspace may expose through the host
/// boundary.
pub const KNOWN_TOOLS: &[&str] = &["bash", "read", "write", "edit", "glob", "grep", "git"];

/// Declarative per-agent-type workspace config. Parsed from a
/// free-form JSON mapping and never re-exposed as an untyped map across
/// module boundaries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentWorkspaceConfig {
    pub enabled: bool,
    pub repo_source: RepoSource,
    /// Normalized (lowercased/trimmed/deduped, input order preserved).
    /// Empty means "all tools allowed".
    pub tools: Vec<String>,
    pub resource_limits: ResourceLimits,
    pub checkout_on_start: bool,
    pub base_image: Option<String>,
    pub setup_commands: Vec<String>,
}

impl Default for AgentWorkspaceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            repo_source: RepoSource::None,
            tools: Vec::new(),
            resource_limits: ResourceLimits::default(),
            checkout_on_start: false,
            base_image: None,
            setup_commands: Vec::new(),
        }
    }
}

impl AgentWorkspaceConfig {
    /// Whether `tool` is permitted. An empty `tools` list allows everything.
    pub fn allows_tool(&self, tool: &str) -> bool {
        self.tools.is_empty() || self.tools.iter().any(|t| t == tool)
    }

    /// Parse + validate the wire-format JSON mapping.
    /// An empty/missing map yields the default disabled config
    /// ("Empty/missing ⇒ disabled"). Otherwise every validation rule is
    /// checked and all violations are reported together.
    pub fn parse(value: &Value) -> Result<Self, WorkspaceError> {
        let Some(map) = value.as_object() else {
            return Ok(Self::default());
        };
        if map.is_empty() {
            return Ok(Self::default());
        }

        let mut errors = Vec::new();

        let enabled = map.get("enabled").and_then(Value::as_bool).unwrap_or(false);

        let repo_source = parse_repo_source(map.get("repo_source"), &mut errors);

        let tools = parse_tools(map.get("tools"), &mut errors);

        let resource_limits = parse_resource_limits(map.get("resource_limits"), &mut errors);

        let checkout_on_start = map
            .get("checkout_on_start")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let base_image = map
            .get("base_image")
            .and_then(Value::as_str)
            .map(str::to_string);

        let setup_commands = map
            .get("setup_commands")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        if !errors.is_empty() {
            return Err(WorkspaceError::ValidationError(errors));
        }

        Ok(Self {
            enabled,
            repo_source,
            tools,
            resource_limits,
            checkout_on_start,
            base_image,
            setup_commands,
        })
    }

    /// Serialize back to the wire-format JSON mapping.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).expect("AgentWorkspaceConfig is always representable as JSON")
    }
}

fn parse_repo_source(value: Option<&Value>, errors: &mut Vec<String>) -> RepoSource {
    let Some(value) = value else {
        return RepoSource::None;
    };
    let Some(map) = value.as_object() else {
        return RepoSource::None;
    };
    if map.is_empty() {
        return RepoSource::None;
    }

    let ty = map.get("type").and_then(Value::as_str).unwrap_or("none");
    let url = map.get("url").and_then(Value::as_str).map(str::to_string);
    let branch = map
        .get("branch")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_default();

    match ty {
        "fixed" => {
            let Some(url) = url else {
                errors.push("fixed repo_source requires a url".to_string());
                return RepoSource::None;
            };
            RepoSource::Fixed { url, branch }
        }
        "task_context" => {
            if url.is_some() {
                errors.push("task_context repo_source must not specify a url".to_string());
            }
            RepoSource::TaskContext {
                branch: (!branch.is_empty()).then_some(branch),
            }
        }
        "none" => {
            if url.is_some() {
                errors.push("none repo_source must not specify a url".to_string());
            }
            RepoSource::None
        }
        other => {
            errors.push(format!("unknown repo_source type: '{other}'"));
            RepoSource::None
        }
    }
}

fn parse_tools(value: Option<&Value>, errors: &mut Vec<String>) -> Vec<String> {
    let Some(arr) = value.and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut normalized = Vec::new();
    for raw in arr.iter().filter_map(Value::as_str) {
        let tool = raw.trim().to_lowercase();
        if !KNOWN_TOOLS.contains(&tool.as_str()) {
            errors.push(format!("unknown tool name: '{tool}'"));
            continue;
        }
        if normalized.contains(&tool) {
            errors.push(format!("duplicate tool: '{tool}'"));
            continue;
        }
        normalized.push(tool);
    }
    normalized
}

fn parse_resource_limits(value: Option<&Value>, errors: &mut Vec<String>) -> ResourceLimits {
    let mut limits = ResourceLimits::default();
    let Some(map) = value.and_then(Value::as_object) else {
        return limits;
    };

    for field in ["cpu", "memory", "disk"] {
        let Some(raw) = map.get(field).and_then(Value::as_str) else {
            continue;
        };
        if raw.is_empty() {
            errors.push(format!("resource_limits.{field} must not be empty when present"));
            continue;
        }
        match field {
            "cpu" => limits.cpu = Some(raw.to_string()),
            "memory" => limits.memory = Some(raw.to_string()),
            "disk" => limits.disk = Some(raw.to_string()),
            _ => unreachable!(),
        }
    }
    limits
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use proptest::prop_assert_eq;

    #[test]
    fn empty_or_missing_map_is_disabled() {
        assert_eq!(AgentWorkspaceConfig::parse(&Value::Null).unwrap(), AgentWorkspaceConfig::default());
        assert_eq!(AgentWorkspaceConfig::parse(&json!({})).unwrap(), AgentWorkspaceConfig::default());
    }

    #[test]
    fn tools_are_lowercased_trimmed_and_deduped_in_order() {
        let config = AgentWorkspaceConfig::parse(&json!({
            "enabled": true,
            "tools": [" Bash", "read", "BASH", "Edit"],
        }))
        .unwrap();
        assert_eq!(config.tools, vec!["bash", "read", "edit"]);
    }

    #[test]
    fn unknown_tool_name_is_a_validation_error() {
        let err = AgentWorkspaceConfig::parse(&json!({
            "enabled": true,
            "tools": ["nuke"],
        }))
        .unwrap_err();
        match err {
            WorkspaceError::ValidationError(errors) => {
                assert!(errors.iter().any(|e| e.contains("unknown tool name")));
            }
            _ => panic!("expected ValidationError"),
        }
    }

    #[test]
    fn duplicate_tool_after_normalization_is_a_validation_error() {
        let err = AgentWorkspaceConfig::parse(&json!({
            "enabled": true,
            "tools": ["git", "GIT"],
        }))
        .unwrap_err();
        match err {
            WorkspaceError::ValidationError(errors) => {
                assert!(errors.iter().any(|e| e.contains("duplicate tool")));
            }
            _ => panic!("expected ValidationError"),
        }
    }

    #[test]
    fn fixed_without_url_is_invalid() {
        let err = AgentWorkspaceConfig::parse(&json!({
            "enabled": true,
            "repo_source": {"type": "fixed", "branch": "main"},
        }))
        .unwrap_err();
        match err {
            WorkspaceError::ValidationError(errors) => {
                assert!(errors.iter().any(|e| e.contains("requires a url")));
            }
            _ => panic!("expected ValidationError"),
        }
    }

    #[test]
    fn non_fixed_with_url_is_invalid() {
        let err = AgentWorkspaceConfig::parse(&json!({
            "enabled": true,
            "repo_source": {"type": "task_context", "url": "https://x"},
        }))
        .unwrap_err();
        match err {
            WorkspaceError::ValidationError(errors) => {
                assert!(errors.iter().any(|e| e.contains("must not specify a url")));
            }
            _ => panic!("expected ValidationError"),
        }
    }

    #[test]
    fn unknown_repo_source_type_is_invalid() {
        let err = AgentWorkspaceConfig::parse(&json!({
            "enabled": true,
            "repo_source": {"type": "bogus"},
        }))
        .unwrap_err();
        match err {
            WorkspaceError::ValidationError(errors) => {
                assert!(errors.iter().any(|e| e.contains("unknown repo_source type")));
            }
            _ => panic!("expected ValidationError"),
        }
    }

    #[test]
    fn empty_string_resource_field_is_invalid() {
        let err = AgentWorkspaceConfig::parse(&json!({
            "enabled": true,
            "resource_limits": {"cpu": ""},
        }))
        .unwrap_err();
        match err {
            WorkspaceError::ValidationError(errors) => {
                assert!(errors.iter().any(|e| e.contains("resource_limits.cpu")));
            }
            _ => panic!("expected ValidationError"),
        }
    }

    #[test]
    fn s1_fixed_repo_happy_path_parses() {
        let config = AgentWorkspaceConfig::parse(&json!({
            "enabled": true,
            "repo_source": {"type": "fixed", "url": "https://github.com/org/my-project", "branch": "develop"},
            "setup_commands": ["npm install", "npm run lint"],
        }))
        .unwrap();
        assert!(config.enabled);
        assert_eq!(config.setup_commands, vec!["npm install", "npm run lint"]);
        assert_eq!(
            config.repo_source,
            RepoSource::Fixed {
                url: "https://github.com/org/my-project".into(),
                branch: "develop".into(),
            }
        );
    }

    #[test]
    fn roundtrips_modulo_tool_normalization() {
        let config = AgentWorkspaceConfig::parse(&json!({
            "enabled": true,
            "repo_source": {"type": "fixed", "url": "https://github.com/org/repo", "branch": "main"},
            "tools": ["BASH", "Read"],
            "resource_limits": {"cpu": "2", "memory": "4G", "disk": "10G"},
            "checkout_on_start": true,
            "base_image": "image:tag",
            "setup_commands": ["echo hi"],
        }))
        .unwrap();

        let value = config.to_value();
        let reparsed = AgentWorkspaceConfig::parse(&value).unwrap();
        assert_eq!(config, reparsed);
    }

    proptest::proptest! {
        #[test]
        fn prop_roundtrip_modulo_tool_normalization(
            enabled: bool,
            checkout_on_start: bool,
            setup_commands in proptest::collection::vec("[a-z ]{0,12}", 0..4),
        ) {
            let config = AgentWorkspaceConfig {
                enabled,
                repo_source: RepoSource::None,
                tools: Vec::new(),
                resource_limits: ResourceLimits::default(),
                checkout_on_start,
                base_image: None,
                setup_commands,
            };
            let value = config.to_value();
            let reparsed = AgentWorkspaceConfig::parse(&value).unwrap();
            prop_assert_eq!(config, reparsed);
        }
    }
}
