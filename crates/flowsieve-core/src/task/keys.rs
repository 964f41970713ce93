//! Cache key builders.
//!
//! Ephemeral keys are scoped by the task fingerprint: base entity, task
//! name, arguments and result version. Durable keys are scoped by base
//! entity through the cache itself, so they only name the result.

use super::definition::{TaskFingerprint, TaskName, canonical_args};
use serde_json::Value;

/// Ephemeral key of a job lease: `task:{base}:{task name}#{digest}`.
#[must_use]
pub fn handle_key(fingerprint: &TaskFingerprint) -> String {
    ephemeral_key("task", fingerprint)
}

/// Ephemeral key of a preliminary result:
/// `preliminary:{base}:{task name}#{digest}`.
#[must_use]
pub fn preliminary_key(fingerprint: &TaskFingerprint) -> String {
    ephemeral_key("preliminary", fingerprint)
}

fn ephemeral_key(prefix: &str, fingerprint: &TaskFingerprint) -> String {
    let digest = fingerprint.digest();
    format!(
        "{}:{}:{}#{}",
        prefix,
        fingerprint.base_entity,
        fingerprint.task_name,
        &digest[..16]
    )
}

/// Task name + `#` + the first 16 hex chars of the BLAKE3 digest of the
/// canonical arguments.
#[must_use]
pub fn default_durable_key(task_name: &TaskName, args: &[Value]) -> String {
    let digest = blake3::hash(canonical_args(args).as_bytes()).to_hex();
    format!("{}#{}", task_name, &digest[..16])
}

/// Durable key of a discovered graph.
#[must_use]
pub fn graph_key() -> String {
    "dfg".to_string()
}

/// Durable key of the alignments of one object type of a conformance log
/// against the process graph filtered at `threshold`.
#[must_use]
pub fn alignments_key(process_entity: &str, threshold: f64, object_type: &str) -> String {
    format!(
        "alignments[process={}][threshold={}][object_type={}]",
        process_entity, threshold, object_type
    )
}

/// Durable key of the performance metrics of one object type.
#[must_use]
pub fn performance_key(process_entity: &str, threshold: f64, object_type: &str) -> String {
    format!(
        "performance[process={}][threshold={}][object_type={}]",
        process_entity, threshold, object_type
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskKind;
    use serde_json::json;

    #[test]
    fn durable_key_has_short_digest() {
        let key = default_durable_key(&TaskName::new(TaskKind::CreateDfg), &[json!("a.json")]);
        let (name, digest) = key.split_once('#').expect("separator");
        assert_eq!(name, "create_dfg");
        assert_eq!(digest.len(), 16);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn durable_key_depends_on_args() {
        let name = TaskName::new(TaskKind::CreateDfg);
        assert_ne!(
            default_durable_key(&name, &[json!("a.json")]),
            default_durable_key(&name, &[json!("b.json")])
        );
    }

    #[test]
    fn ephemeral_keys_depend_on_args() {
        let fingerprint = |arg: Value| TaskFingerprint {
            base_entity: "log.json".to_string(),
            task_name: "create_dfg".to_string(),
            canonical_args: canonical_args(&[arg]),
            result_version: None,
        };
        let one = handle_key(&fingerprint(json!(1)));
        let two = handle_key(&fingerprint(json!(2)));
        assert_ne!(one, two);
        assert!(one.starts_with("task:log.json:create_dfg#"));
        assert_ne!(
            preliminary_key(&fingerprint(json!(1))),
            preliminary_key(&fingerprint(json!(2)))
        );
    }

    #[test]
    fn readable_keys() {
        assert_eq!(graph_key(), "dfg");
        assert_eq!(
            alignments_key("p.json", 0.5, "order"),
            "alignments[process=p.json][threshold=0.5][object_type=order]"
        );
        assert_eq!(
            performance_key("p.json", 1.0, "item"),
            "performance[process=p.json][threshold=1][object_type=item]"
        );
    }
}
