use super::types::{Direction, EventType, RecordedEvent};
use anyhow::Result;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{error, info};

/// Appends [`RecordedEvent`]s to a JSONL file from a background writer task.
///
/// Cloning shares the writer; the task ends once every clone is dropped.
#[derive(Clone)]
pub struct RecordingLogger {
    sender: mpsc::UnboundedSender<RecordedEvent>,
}

impl RecordingLogger {
    pub fn new(log_file_path: PathBuf) -> Result<Self> {
        let (sender, mut receiver) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            if let Err(e) = Self::writer_task(log_file_path, &mut receiver).await {
                error!("Recording logger failed: {}", e);
            }
        });

        Ok(Self { sender })
    }

    pub fn record(&self, event: RecordedEvent) {
        if self.sender.send(event).is_err() {
            error!("Failed to send event to recording logger: receiver dropped");
        }
    }

    async fn writer_task(
        log_file_path: PathBuf,
        receiver: &mut mpsc::UnboundedReceiver<RecordedEvent>,
    ) -> Result<()> {
        if let Some(parent) = log_file_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file_path)
            .await?;

        info!("Recording events to: {:?}", log_file_path);

        while let Some(event) = receiver.recv().await {
            match serde_json::to_string(&event) {
                Ok(json_line) => {
                    if let Err(e) = file.write_all(format!("{}\n", json_line).as_bytes()).await {
                        error!("Failed to write event to log: {}", e);
                        continue;
                    }
                    if let Err(e) = file.flush().await {
                        error!("Failed to flush log file: {}", e);
                    }
                }
                Err(e) => {
                    error!("Failed to serialize event: {}", e);
                }
            }
        }

        info!("Recording writer task shutting down");

        Ok(())
    }
}

/// Build an event stamped with the current time and no metadata.
pub fn new_event(
    correlation_id: &str,
    event_type: EventType,
    direction: Direction,
    operation: impl Into<String>,
    data: serde_json::Value,
) -> RecordedEvent {
    RecordedEvent {
        timestamp: chrono::Utc::now().to_rfc3339(),
        correlation_id: correlation_id.to_string(),
        event_type,
        direction,
        operation: operation.into(),
        data,
        metadata: HashMap::new(),
    }
}
