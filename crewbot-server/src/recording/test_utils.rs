//! Helpers for reading recordings back, used by tests and offline inspection.

use super::types::RecordedEvent;
use anyhow::{anyhow, Context, Result};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

pub fn read_events<P: AsRef<Path>>(file_path: P) -> Result<Vec<RecordedEvent>> {
    let path = file_path.as_ref();
    let file = File::open(path).with_context(|| format!("Failed to open log file {:?}", path))?;
    let reader = BufReader::new(file);

    let mut events = Vec::new();
    for (line_num, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {}", line_num + 1))?;

        if !line.trim().is_empty() {
            let event: RecordedEvent = serde_json::from_str(&line).map_err(|e| {
                anyhow!("Failed to parse line {} in {:?}: {}", line_num + 1, path, e)
            })?;
            events.push(event);
        }
    }

    Ok(events)
}

/// Group events into per-request scenarios keyed by correlation ID, keeping file order.
pub fn group_by_correlation_id(events: Vec<RecordedEvent>) -> BTreeMap<String, Vec<RecordedEvent>> {
    let mut scenarios: BTreeMap<String, Vec<RecordedEvent>> = BTreeMap::new();
    for event in events {
        scenarios
            .entry(event.correlation_id.clone())
            .or_default()
            .push(event);
    }
    scenarios
}
