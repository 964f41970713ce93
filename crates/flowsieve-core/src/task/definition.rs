//! Task names, definitions and fingerprints.

use super::keys;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

// =============================================================================
// TASK NAMES
// =============================================================================

/// The kinds of cacheable computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    CreateDfg,
    ComputeAlignments,
    PerformanceMetrics,
}

impl TaskKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreateDfg => "create_dfg",
            Self::ComputeAlignments => "compute_alignments",
            Self::PerformanceMetrics => "performance_metrics",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A task kind refined by ordered attributes.
///
/// A large task split into subtasks gives each subtask its own name, e.g.
/// `compute_alignments[threshold=0.5][object_type=order]`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskName {
    kind: TaskKind,
    attributes: Vec<(String, String)>,
}

impl TaskName {
    #[must_use]
    pub fn new(kind: TaskKind) -> Self {
        Self {
            kind,
            attributes: Vec::new(),
        }
    }

    /// Append an attribute.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn kind(&self) -> TaskKind {
        self.kind
    }
}

impl fmt::Display for TaskName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind.as_str())?;
        for (key, value) in &self.attributes {
            write!(f, "[{}={}]", key, value)?;
        }
        Ok(())
    }
}

// =============================================================================
// TASK DEFINITIONS
// =============================================================================

/// Everything needed to run a task once and cache its result.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDefinition {
    /// The entity the result belongs to, usually an OCEL file name.
    pub base_entity: String,
    pub task_name: TaskName,
    /// Arguments handed to the job.
    pub args: Vec<Value>,
    /// Key of the result in the durable cache.
    pub durable_key: String,
    /// Schema version the result must carry to be served from cache.
    pub result_version: Option<String>,
    /// Skip the durable lookup and recompute.
    pub refresh: bool,
}

impl TaskDefinition {
    /// Define a task with the default durable key.
    #[must_use]
    pub fn new(base_entity: impl Into<String>, task_name: TaskName, args: Vec<Value>) -> Self {
        let durable_key = keys::default_durable_key(&task_name, &args);
        Self {
            base_entity: base_entity.into(),
            task_name,
            args,
            durable_key,
            result_version: None,
            refresh: false,
        }
    }

    #[must_use]
    pub fn with_durable_key(mut self, durable_key: impl Into<String>) -> Self {
        self.durable_key = durable_key.into();
        self
    }

    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.result_version = Some(version.into());
        self
    }

    /// Recompute even if a cached result exists.
    #[must_use]
    pub fn refreshing(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    #[must_use]
    pub fn fingerprint(&self) -> TaskFingerprint {
        TaskFingerprint {
            base_entity: self.base_entity.clone(),
            task_name: self.task_name.to_string(),
            canonical_args: canonical_args(&self.args),
            result_version: self.result_version.clone(),
        }
    }

    /// Ephemeral key of the job lease.
    #[must_use]
    pub fn handle_key(&self) -> String {
        keys::handle_key(&self.fingerprint())
    }

    /// Ephemeral key of the preliminary result.
    #[must_use]
    pub fn preliminary_key(&self) -> String {
        keys::preliminary_key(&self.fingerprint())
    }
}

// =============================================================================
// FINGERPRINTS
// =============================================================================

/// Identity of one cacheable computation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskFingerprint {
    pub base_entity: String,
    pub task_name: String,
    pub canonical_args: String,
    pub result_version: Option<String>,
}

impl TaskFingerprint {
    /// BLAKE3 digest of all components, hex encoded.
    #[must_use]
    pub fn digest(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for part in [
            self.base_entity.as_str(),
            self.task_name.as_str(),
            self.canonical_args.as_str(),
            self.result_version.as_deref().unwrap_or(""),
        ] {
            hasher.update(part.as_bytes());
            hasher.update(&[0]);
        }
        hasher.finalize().to_hex().to_string()
    }
}

/// JSON encoding of `args` with object keys sorted at every level.
#[must_use]
pub fn canonical_args(args: &[Value]) -> String {
    Value::Array(args.iter().map(canonicalize).collect()).to_string()
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        Value::Object(object) => {
            let mut entries: Vec<(&String, &Value)> = object.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut sorted = Map::new();
            for (key, item) in entries {
                sorted.insert(key.clone(), canonicalize(item));
            }
            Value::Object(sorted)
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn task_name_renders_attributes_in_order() {
        let name = TaskName::new(TaskKind::ComputeAlignments)
            .with("threshold", "0.5")
            .with("object_type", "order");
        assert_eq!(
            name.to_string(),
            "compute_alignments[threshold=0.5][object_type=order]"
        );
        assert_eq!(name.kind(), TaskKind::ComputeAlignments);
    }

    #[test]
    fn canonical_args_ignore_key_order() {
        let a = canonical_args(&[json!({"b": 1, "a": {"d": 2, "c": 3}})]);
        let b = canonical_args(&[json!({"a": {"c": 3, "d": 2}, "b": 1})]);
        assert_eq!(a, b);
        assert_eq!(a, r#"[{"a":{"c":3,"d":2},"b":1}]"#);
    }

    #[test]
    fn fingerprint_changes_with_version() {
        let def = TaskDefinition::new(
            "log.json",
            TaskName::new(TaskKind::CreateDfg),
            vec![json!("log.json")],
        );
        let bumped = def.clone().with_version("5");
        assert_ne!(def.fingerprint().digest(), bumped.fingerprint().digest());
        assert_eq!(def.fingerprint().digest(), def.fingerprint().digest());
    }

    #[test]
    fn default_durable_key_ignores_version() {
        let def =
            TaskDefinition::new("log.json", TaskName::new(TaskKind::CreateDfg), vec![json!(1)]);
        let bumped = def.clone().with_version("9");
        assert_eq!(def.durable_key, bumped.durable_key);
        assert!(def.durable_key.starts_with("create_dfg#"));
    }

    #[test]
    fn ephemeral_keys_include_task_name() {
        let def = TaskDefinition::new(
            "log.json",
            TaskName::new(TaskKind::ComputeAlignments).with("object_type", "order"),
            Vec::new(),
        );
        let digest = def.fingerprint().digest();
        assert_eq!(
            def.handle_key(),
            format!("task:log.json:compute_alignments[object_type=order]#{}", &digest[..16])
        );
        assert_eq!(
            def.preliminary_key(),
            format!(
                "preliminary:log.json:compute_alignments[object_type=order]#{}",
                &digest[..16]
            )
        );
    }

    #[test]
    fn ephemeral_keys_depend_on_args() {
        let name = TaskName::new(TaskKind::CreateDfg);
        let one = TaskDefinition::new("log.json", name.clone(), vec![json!(1)]);
        let two = TaskDefinition::new("log.json", name, vec![json!(2)]);
        assert_ne!(one.handle_key(), two.handle_key());
        assert_ne!(one.preliminary_key(), two.preliminary_key());
    }
}
