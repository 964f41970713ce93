//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::api;
use crate::config::ServerConfig;
use crate::projection::{JsonLogProjection, LogFile};
use flowsieve_core::{DirectlyFollowsGraph, FlowError, MemoryProjection, discover};
use std::path::{Path, PathBuf};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum size of a log file read by `discover` (500 MB).
const MAX_LOG_FILE_SIZE: u64 = 500 * 1024 * 1024;

/// Resolve `path` to an existing regular file within the size limit.
fn validate_file_path(path: &Path) -> Result<PathBuf, FlowError> {
    let canonical = path.canonicalize().map_err(|e| {
        FlowError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;
    let metadata = std::fs::metadata(&canonical)
        .map_err(|e| FlowError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if !metadata.is_file() {
        return Err(FlowError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }
    if metadata.len() > MAX_LOG_FILE_SIZE {
        return Err(FlowError::invalid(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            MAX_LOG_FILE_SIZE
        )));
    }
    Ok(canonical)
}

/// Validate that the parent directory of an output file exists.
fn validate_output_path(path: &Path) -> Result<PathBuf, FlowError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let canonical_parent = parent.canonicalize().map_err(|e| {
        FlowError::IoError(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;
    if !canonical_parent.is_dir() {
        return Err(FlowError::IoError(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }
    let filename = path
        .file_name()
        .ok_or_else(|| FlowError::IoError("Output path has no filename".to_string()))?;
    Ok(canonical_parent.join(filename))
}

fn print_json(value: &serde_json::Value) -> Result<(), FlowError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| FlowError::SerializationError(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(config: &ServerConfig) -> Result<(), FlowError> {
    println!("flowsieve server starting...");
    println!();
    println!("Configuration:");
    println!("  Address:  {}", config.bind_addr());
    println!("  Data dir: {}", config.data_dir.display());
    println!("  Backend:  {}", config.backend);
    println!("  Database: {}", config.database.display());
    println!("  Workers:  {}", config.workers);
    println!();
    println!("Endpoints:");
    println!("  GET    /pm/dfg         - Directly-follows graph");
    println!("  GET    /pm/alignments  - Alignments against the graph");
    println!("  GET    /pm/performance - Edge durations");
    println!("  DELETE /cache          - Drop stored results");
    println!("  GET    /health         - Health check");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    api::run_server(config).await
}

// =============================================================================
// DISCOVER COMMAND
// =============================================================================

/// Run the discovery pipeline on a log file.
pub fn cmd_discover(file: &Path, output: Option<&Path>, json_mode: bool) -> Result<(), FlowError> {
    let path = validate_file_path(file)?;
    let log = LogFile::read(&path)?;

    let name = path.display().to_string();
    let mut projection = MemoryProjection::new();
    for (object_type, cases) in log.object_types {
        projection.insert(name.clone(), object_type, cases);
    }

    let graph = discover(&projection, &name, |_, done, total| {
        if !json_mode {
            eprintln!("  reduced {}/{} object types", done, total);
        }
    })?;
    let encoded = serde_json::to_value(&graph)
        .map_err(|e| FlowError::SerializationError(e.to_string()))?;

    match output {
        Some(output) => {
            let target = validate_output_path(output)?;
            let text = serde_json::to_string(&encoded)
                .map_err(|e| FlowError::SerializationError(e.to_string()))?;
            std::fs::write(&target, text)
                .map_err(|e| FlowError::IoError(format!("{}: {}", target.display(), e)))?;
            if json_mode {
                print_json(&summary(&graph, Some(&target)))
            } else {
                print_summary(&graph);
                println!("Written to {}", target.display());
                Ok(())
            }
        }
        None => print_json(&encoded),
    }
}

fn summary(graph: &DirectlyFollowsGraph, output: Option<&Path>) -> serde_json::Value {
    let edges: serde_json::Map<String, serde_json::Value> = graph
        .subgraphs
        .iter()
        .map(|(object_type, edges)| (object_type.clone(), edges.len().into()))
        .collect();
    serde_json::json!({
        "nodes": graph.nodes.len(),
        "traces": graph.traces.len(),
        "thresholds": graph.thresholds.len(),
        "edges": edges,
        "output": output.map(|p| p.display().to_string()),
    })
}

fn print_summary(graph: &DirectlyFollowsGraph) {
    println!("flowsieve Directly-Follows Graph");
    println!("================================");
    println!("Nodes:      {}", graph.nodes.len());
    println!("Traces:     {}", graph.traces.len());
    println!("Thresholds: {}", graph.thresholds.len());
    for (object_type, edges) in &graph.subgraphs {
        println!("  {:<20} {} edges", object_type, edges.len());
    }
}

// =============================================================================
// CACHE COMMANDS
// =============================================================================

/// Drop every stored result computed from `ocel`.
pub fn cmd_invalidate(config: &ServerConfig, ocel: &str, json_mode: bool) -> Result<(), FlowError> {
    JsonLogProjection::check_name(ocel)?;
    let durable = config.open_durable()?;
    let removed = durable.invalidate(ocel)?;

    if json_mode {
        print_json(&serde_json::json!({ "ocel": ocel, "removed": removed }))
    } else {
        println!("Removed {} stored result(s) of '{}'", removed, ocel);
        Ok(())
    }
}

/// Show durable cache status.
pub fn cmd_status(config: &ServerConfig, json_mode: bool) -> Result<(), FlowError> {
    let durable = config.open_durable()?;
    let entries = durable.len()?;

    if json_mode {
        return print_json(&serde_json::json!({
            "backend": config.backend.to_string(),
            "database": config.database.to_string_lossy(),
            "data_dir": config.data_dir.to_string_lossy(),
            "entries": entries,
        }));
    }

    println!("flowsieve Cache Status");
    println!("======================");
    println!("Backend:  {}", config.backend);
    println!("Database: {}", config.database.display());
    println!("Data dir: {}", config.data_dir.display());
    println!();
    println!("Stored results: {}", entries);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Backend;
    use flowsieve_core::{CacheEntry, DurableCache, RedbCache};
    use tempfile::tempdir;

    const LOG: &str = r#"{"object_types": {"order": [
        {"object_id": "o1", "events": [
            {"id": 1, "activity": "place", "timestamp": 1},
            {"id": 2, "activity": "pay", "timestamp": 2}
        ]}
    ]}}"#;

    #[test]
    fn discover_writes_graph_file() {
        let temp = tempdir().expect("temp dir");
        let input = temp.path().join("log.json");
        let output = temp.path().join("graph.json");
        std::fs::write(&input, LOG).expect("write log");

        cmd_discover(&input, Some(&output), true).expect("discover");

        let text = std::fs::read_to_string(&output).expect("read graph");
        let graph: DirectlyFollowsGraph = serde_json::from_str(&text).expect("decode");
        assert_eq!(graph.nodes.len(), 4);
        assert_eq!(graph.subgraphs["order"].len(), 3);
    }

    #[test]
    fn discover_rejects_missing_file() {
        let temp = tempdir().expect("temp dir");
        let result = cmd_discover(&temp.path().join("nope.json"), None, true);
        assert!(matches!(result, Err(FlowError::IoError(_))));
    }

    #[test]
    fn invalidate_removes_stored_results() {
        let temp = tempdir().expect("temp dir");
        let config = ServerConfig {
            backend: Backend::Redb,
            database: temp.path().join("cache.redb"),
            ..ServerConfig::default()
        };
        {
            let cache = RedbCache::open(&config.database).expect("open");
            let entry = CacheEntry::new(serde_json::json!({}), None);
            cache.set("log.json", "dfg", &entry).expect("set");
            cache.set("other.json", "dfg", &entry).expect("set");
        }

        cmd_invalidate(&config, "log.json", true).expect("invalidate");

        let cache = RedbCache::open(&config.database).expect("reopen");
        assert_eq!(cache.len().expect("len"), 1);
        assert!(cmd_invalidate(&config, "../log.json", true).is_err());
    }
}
