use async_trait::async_trait;
use nexus_core::application::approval::{ApprovalDecision, ApprovalGate, ApprovalRequest, ApprovalSubject};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::warn;

/// Asks on the terminal before risky calls and flagged sub-tasks.
pub struct ConsoleApproval {
    // One prompt at a time when sub-tasks run in parallel.
    lock: Mutex<()>,
}

impl ConsoleApproval {
    pub fn new() -> Self {
        Self { lock: Mutex::new(()) }
    }
}

#[async_trait]
impl ApprovalGate for ConsoleApproval {
    async fn decide(&self, request: &ApprovalRequest) -> ApprovalDecision {
        let _guard = self.lock.lock().await;
        let subject = match &request.subject {
            ApprovalSubject::ToolCall { tool } => format!("tool call `{tool}`"),
            ApprovalSubject::SubTask { id } => format!("sub-task {id}"),
        };
        let prompt = format!(
            "\nApproval needed for {subject}: {}\n  {}\n[y]es / [n]o / [s]kip / [c]ancel: ",
            request.reason, request.detail
        );
        let mut stderr = tokio::io::stderr();
        if let Err(err) = stderr.write_all(prompt.as_bytes()).await {
            warn!(error = %err, "Cannot prompt for approval, rejecting");
            return reject("no terminal for approval");
        }
        let _ = stderr.flush().await;

        let mut line = String::new();
        let mut stdin = BufReader::new(tokio::io::stdin());
        match stdin.read_line(&mut line).await {
            Ok(0) | Err(_) => reject("no answer"),
            Ok(_) => parse_answer(&line),
        }
    }
}

fn reject(reason: &str) -> ApprovalDecision {
    ApprovalDecision::Reject {
        reason: reason.to_string(),
    }
}

fn parse_answer(line: &str) -> ApprovalDecision {
    match line.trim().to_lowercase().as_str() {
        "y" | "yes" => ApprovalDecision::Approve,
        "s" | "skip" => ApprovalDecision::Skip,
        "c" | "cancel" => ApprovalDecision::Cancel,
        _ => reject("declined by operator"),
    }
}
