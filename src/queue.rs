//! Per-target command queue: controller enqueues, agent lists and
//! acknowledges.
//!
//! Each command lives in its own record keyed
//! `command:{target_id}:{command_id}`; the FIFO ordering lives in a
//! separate id list at `queue:{target_id}`. Listing is a non-destructive
//! peek - commands stay queued until the agent explicitly acknowledges
//! them, at which point the id is removed from the list and the record is
//! deleted outright (no archive).
//!
//! List mutations are read-modify-write and run under the queue key lock;
//! two concurrent enqueues against one target must both survive.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::now_ms;
use crate::store::{Store, StoreError};

fn queue_key(target_id: &str) -> String {
    format!("queue:{target_id}")
}

fn command_key(target_id: &str, command_id: &str) -> String {
    format!("command:{target_id}:{command_id}")
}

/// Mouse buttons the controller can press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    Down,
}

/// Pointer actions. Coordinates are normalized to the captured frame
/// (0.0..=1.0), so the agent can map them onto whatever resolution it is
/// actually capturing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum MouseData {
    Move {
        x: f64,
        y: f64,
    },
    Click {
        button: MouseButton,
        #[serde(default)]
        x: Option<f64>,
        #[serde(default)]
        y: Option<f64>,
    },
    MouseDown {
        button: MouseButton,
        #[serde(default)]
        x: Option<f64>,
        #[serde(default)]
        y: Option<f64>,
    },
    MouseUp {
        button: MouseButton,
        #[serde(default)]
        x: Option<f64>,
        #[serde(default)]
        y: Option<f64>,
    },
    Scroll {
        direction: ScrollDirection,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum KeyboardData {
    /// A single key press, named the way the controller's key map names it.
    Press { key: String },
    /// Literal text typed as a sequence of key events agent-side.
    Type { text: String },
}

/// Power-management style commands (`shutdown`, `reboot`, ...). The agent
/// interprets the verb; the relay only carries it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShellData {
    pub command: String,
}

fn default_language() -> String {
    "powershell".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteData {
    pub code: String,
    #[serde(default = "default_language")]
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum FileData {
    List { path: String },
    Upload { filename: String, data: String },
    Download { path: String },
}

/// The command payload as the controller sends it: one discriminator
/// (`type`) and a fixed shape per variant under `data`. Unknown extra
/// fields inside `data` (the controller includes a client-side timestamp)
/// are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum CommandPayload {
    Mouse(MouseData),
    Keyboard(KeyboardData),
    System(ShellData),
    Advanced(ShellData),
    Execute(ExecuteData),
    Files(FileData),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    Pending,
    Done,
}

/// A stored command. Created at enqueue, never mutated, deleted at ack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub id: String,
    pub target_id: String,
    #[serde(flatten)]
    pub payload: CommandPayload,
    /// Milliseconds since epoch at enqueue time.
    pub timestamp: u64,
    pub status: CommandStatus,
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("target_id must not be empty")]
    EmptyTargetId,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Per-target FIFO command queues over the shared store.
#[derive(Clone)]
pub struct CommandQueue {
    store: Store,
}

impl CommandQueue {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Queue a command for `target_id`. Returns the generated command id.
    ///
    /// Ids are UUIDv4, so uniqueness is an invariant rather than a
    /// timestamp-plus-randomness probability. The record is written before
    /// the id is appended: a concurrent list never resolves an id whose
    /// record does not exist yet.
    pub async fn enqueue(
        &self,
        target_id: &str,
        payload: CommandPayload,
    ) -> Result<String, QueueError> {
        if target_id.is_empty() {
            return Err(QueueError::EmptyTargetId);
        }

        let id = Uuid::new_v4().to_string();
        let command = Command {
            id: id.clone(),
            target_id: target_id.to_string(),
            payload,
            timestamp: now_ms(),
            status: CommandStatus::Pending,
        };
        self.store
            .put_json(&command_key(target_id, &id), &command)
            .await?;

        let qkey = queue_key(target_id);
        let _queue = self.store.lock(&qkey).await;
        let mut ids: Vec<String> = self.store.get_json(&qkey).await?.unwrap_or_default();
        ids.push(id.clone());
        self.store.put_json(&qkey, &ids).await?;

        tracing::debug!(%target_id, command_id = %id, "command queued");
        Ok(id)
    }

    /// Pending commands for `target_id` in enqueue order.
    ///
    /// Non-destructive: repeated calls return the same set until an ack.
    /// A queued id whose record has gone missing is skipped, not an error.
    pub async fn list(&self, target_id: &str) -> Result<Vec<Command>, StoreError> {
        let ids: Vec<String> = self
            .store
            .get_json(&queue_key(target_id))
            .await?
            .unwrap_or_default();

        let mut commands = Vec::with_capacity(ids.len());
        for id in &ids {
            if let Some(command) = self
                .store
                .get_json::<Command>(&command_key(target_id, id))
                .await?
            {
                commands.push(command);
            }
        }
        Ok(commands)
    }

    /// Acknowledge `command_id`: remove it from the queue and delete its
    /// record.
    ///
    /// Removal drops every occurrence of the id, so the operation is
    /// idempotent even against a corrupted queue holding duplicates.
    /// Acking an id that is not queued is a successful no-op.
    pub async fn ack(&self, target_id: &str, command_id: &str) -> Result<(), StoreError> {
        let qkey = queue_key(target_id);
        {
            let _queue = self.store.lock(&qkey).await;
            if let Some(mut ids) = self.store.get_json::<Vec<String>>(&qkey).await? {
                let before = ids.len();
                ids.retain(|id| id != command_id);
                if ids.len() != before {
                    self.store.put_json(&qkey, &ids).await?;
                }
            }
        }
        self.store.delete(&command_key(target_id, command_id)).await?;
        Ok(())
    }
}
