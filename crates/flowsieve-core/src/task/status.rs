//! Task status reported to clients.

use serde::{Deserialize, Serialize};

/// State of a cached task as seen by a caller.
///
/// Serializes as `{"status": "running", "preliminary": ...}`,
/// `{"status": "done", "result": ...}` or `{"status": "failed"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TaskStatus<T> {
    Running { preliminary: Option<T> },
    Done { result: T },
    Failed,
}

impl<T> TaskStatus<T> {
    #[must_use]
    pub fn running(preliminary: Option<T>) -> Self {
        Self::Running { preliminary }
    }

    #[must_use]
    pub fn done(result: T) -> Self {
        Self::Done { result }
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done { .. })
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running { .. })
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed)
    }

    /// The final result, if done.
    #[must_use]
    pub fn into_result(self) -> Option<T> {
        match self {
            Self::Done { result } => Some(result),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn wire_shapes() {
        let running: TaskStatus<Value> = TaskStatus::running(None);
        assert_eq!(
            serde_json::to_value(&running).expect("serialize"),
            json!({"status": "running", "preliminary": null})
        );
        assert_eq!(
            serde_json::to_value(TaskStatus::done(json!([1]))).expect("serialize"),
            json!({"status": "done", "result": [1]})
        );
        assert_eq!(
            serde_json::to_value(TaskStatus::<Value>::Failed).expect("serialize"),
            json!({"status": "failed"})
        );
    }
}
