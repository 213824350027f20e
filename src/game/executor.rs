//! Serialized command queue, one per combatant

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::command::{Command, CommandError, CommandOutcome};

/// Most recent records kept per executor
const HISTORY_LIMIT: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("command executor is closed")]
    Closed,

    #[error(transparent)]
    Command(#[from] CommandError),
}

/// One finished command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRecord {
    pub name: &'static str,
    pub actor: Uuid,
    pub outcome: Result<CommandOutcome, String>,
}

type Reply = oneshot::Sender<Result<CommandOutcome, CommandError>>;

struct Job {
    command: Command,
    reply: Option<Reply>,
}

/// Handle to a worker task that runs commands one at a time in submission
/// order. Cloning shares the queue; the worker exits when the last handle is
/// dropped.
#[derive(Clone)]
pub struct CommandExecutor {
    tx: mpsc::UnboundedSender<Job>,
    history: Arc<RwLock<Vec<CommandRecord>>>,
}

impl CommandExecutor {
    pub fn spawn(label: impl Into<String>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let history = Arc::new(RwLock::new(Vec::new()));
        tokio::spawn(work(label.into(), rx, history.clone()));
        Self { tx, history }
    }

    /// Queue a command and wait until it has completed
    pub async fn run_serially(&self, command: Command) -> Result<CommandOutcome, ExecutorError> {
        let (reply, done) = oneshot::channel();
        self.tx
            .send(Job {
                command,
                reply: Some(reply),
            })
            .map_err(|_| ExecutorError::Closed)?;
        let outcome = done.await.map_err(|_| ExecutorError::Closed)?;
        Ok(outcome?)
    }

    /// Queue a command without waiting for it
    pub fn submit(&self, command: Command) -> Result<(), ExecutorError> {
        self.tx
            .send(Job {
                command,
                reply: None,
            })
            .map_err(|_| ExecutorError::Closed)
    }

    pub fn history(&self) -> Vec<CommandRecord> {
        self.history.read().clone()
    }
}

async fn work(
    label: String,
    mut rx: mpsc::UnboundedReceiver<Job>,
    history: Arc<RwLock<Vec<CommandRecord>>>,
) {
    debug!(executor = %label, "executor started");

    while let Some(job) = rx.recv().await {
        let name = job.command.name();
        let actor = job.command.actor().id();
        let result = job.command.execute().await;

        if let Err(err) = &result {
            warn!(executor = %label, command = name, %actor, %err, "command failed");
        }
        {
            let mut history = history.write();
            if history.len() == HISTORY_LIMIT {
                history.remove(0);
            }
            history.push(CommandRecord {
                name,
                actor,
                outcome: result.as_ref().copied().map_err(|e| e.to_string()),
            });
        }

        if let Some(reply) = job.reply {
            let _ = reply.send(result);
        }
    }

    info!(executor = %label, "executor stopped");
}
