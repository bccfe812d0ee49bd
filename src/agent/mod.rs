//! Conversation orchestration.
//!
//! [`ConversationOrchestrator`] owns one transcript per identity, runs the
//! model through the [`ToolLoop`] with the school functions attached, and
//! commits each exchange only once it has succeeded. It also runs one-shot
//! prompts (homework analysis, daily recommendations) that never touch a
//! session.
//!
//! Every operation has a `try_*` form returning [`AgentError`] and a string
//! form that renders failures as user-facing Chinese text.

pub mod prompts;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::OwnedMutexGuard;

use crate::llm::{CompletionOptions, LlmDriver, LlmError, Message, ToolExecutor, ToolLoop};
use crate::school::{SchoolFunction, SchoolToolbox};
use crate::session::{Session, SessionStore, TurnRole};
use crate::tools::ToolKind;

const CHAT_OPTIONS: CompletionOptions = CompletionOptions {
    temperature: 0.7,
    max_tokens: 1000,
};

const ANALYSIS_OPTIONS: CompletionOptions = CompletionOptions {
    temperature: 0.8,
    max_tokens: 500,
};

const DAILY_OPTIONS: CompletionOptions = CompletionOptions {
    temperature: 0.7,
    max_tokens: 800,
};

/// Why an orchestrator call failed.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error(transparent)]
    Generation(#[from] LlmError),

    #[error("模型未產生任何內容")]
    EmptyReply,

    /// Feedback was generated but could not be saved.
    #[error("回饋已生成但無法儲存（{reason}）。回饋內容：\n{feedback}")]
    Persistence { feedback: String, reason: String },
}

/// Turn counts for one identity's transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistorySummary {
    NoHistory,
    Counts {
        identity: String,
        user_turns: usize,
        assistant_turns: usize,
    },
}

impl HistorySummary {
    pub fn user_turns(&self) -> usize {
        match self {
            Self::NoHistory => 0,
            Self::Counts { user_turns, .. } => *user_turns,
        }
    }

    pub fn assistant_turns(&self) -> usize {
        match self {
            Self::NoHistory => 0,
            Self::Counts { assistant_turns, .. } => *assistant_turns,
        }
    }
}

impl fmt::Display for HistorySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoHistory => f.write_str("尚無聊天記錄。"),
            Self::Counts {
                identity,
                user_turns,
                assistant_turns,
            } => write!(
                f,
                "學生 {identity} 的聊天記錄：共 {user_turns} 個問題，{assistant_turns} 個回應。"
            ),
        }
    }
}

/// Per-identity conversations over a model provider.
#[derive(Debug, Clone)]
pub struct ConversationOrchestrator {
    sessions: SessionStore,
    tool_loop: ToolLoop,
    toolbox: SchoolToolbox,
}

impl ConversationOrchestrator {
    pub fn new(driver: Arc<dyn LlmDriver>, toolbox: SchoolToolbox, sessions: SessionStore) -> Self {
        Self {
            sessions,
            tool_loop: ToolLoop::new(driver),
            toolbox,
        }
    }

    /// Bound each model turn by `timeout`.
    #[must_use]
    pub fn with_turn_timeout(mut self, timeout: Duration) -> Self {
        self.tool_loop = self.tool_loop.with_turn_timeout(timeout);
        self
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn toolbox(&self) -> &SchoolToolbox {
        &self.toolbox
    }

    /// Reply to `text` within `identity`'s conversation.
    pub async fn send(&self, identity: &str, text: &str) -> String {
        self.try_send(identity, text)
            .await
            .unwrap_or_else(|e| format!("處理請求時發生錯誤：{e}"))
    }

    /// Like [`Self::send`], returning failures as errors.
    ///
    /// The transcript is only extended when the model call succeeds.
    pub async fn try_send(&self, identity: &str, text: &str) -> Result<String, AgentError> {
        let mut session = self.lock_session(identity).await;

        tracing::info!(
            identity = %identity,
            turns = session.turns().len(),
            "Processing conversation message"
        );

        let tools: &dyn ToolExecutor = &self.toolbox;
        let messages = session.messages_with(text);
        let reply = match self.tool_loop.run(&messages, Some(tools), CHAT_OPTIONS).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(identity = %identity, error = %e, "Conversation turn failed");
                return Err(e.into());
            }
        };

        let reply = if reply.trim().is_empty() {
            prompts::EMPTY_REPLY.to_string()
        } else {
            reply
        };
        session.commit_exchange(text, reply.clone());
        Ok(reply)
    }

    /// Lock `identity`'s registered session, creating it if needed.
    ///
    /// Retries if the session was cleared or evicted while waiting, so an
    /// exchange is never committed to a detached transcript.
    async fn lock_session(&self, identity: &str) -> OwnedMutexGuard<Session> {
        loop {
            let handle = self
                .sessions
                .get_or_create(identity, || prompts::tutor_system(identity));
            let guard = Arc::clone(&handle).lock_owned().await;
            if self.sessions.is_current(identity, &handle) {
                return guard;
            }
            tracing::debug!(identity = %identity, "Session replaced while waiting; retrying");
        }
    }

    /// Generate feedback for a homework submission and save it.
    pub async fn analyze(&self, identity: &str, title: &str, submitted: &str) -> String {
        self.try_analyze(identity, title, submitted)
            .await
            .unwrap_or_else(|e| format!("分析作業時發生錯誤：{e}"))
    }

    pub async fn try_analyze(
        &self,
        identity: &str,
        title: &str,
        submitted: &str,
    ) -> Result<String, AgentError> {
        let messages = [
            Message::system(prompts::ANALYSIS_SYSTEM),
            Message::user(prompts::homework_analysis(identity, title, submitted)),
        ];
        let feedback = self.tool_loop.complete(&messages, ANALYSIS_OPTIONS).await?;
        if feedback.trim().is_empty() {
            return Err(AgentError::EmptyReply);
        }

        let saved = self
            .toolbox
            .dispatch(
                SchoolFunction::SubmitHomeworkFeedback.name(),
                &json!({
                    "student_name": identity,
                    "homework_title": title,
                    "ai_feedback": feedback,
                }),
            )
            .await;
        if saved.is_error {
            let reason = saved.joined_text();
            tracing::warn!(
                identity = %identity,
                homework = %title,
                error = %reason,
                "Generated feedback could not be saved"
            );
            return Err(AgentError::Persistence { feedback, reason });
        }

        Ok(feedback)
    }

    /// Personalised study plan for today.
    pub async fn recommend_daily(&self, identity: &str) -> String {
        self.try_recommend_daily(identity)
            .await
            .unwrap_or_else(|e| format!("生成每日建議時發生錯誤：{e}"))
    }

    pub async fn try_recommend_daily(&self, identity: &str) -> Result<String, AgentError> {
        let messages = [
            Message::system(prompts::daily_system(identity)),
            Message::user(prompts::daily_request(identity)),
        ];
        let tools: &dyn ToolExecutor = &self.toolbox;
        let text = self.tool_loop.run(&messages, Some(tools), DAILY_OPTIONS).await?;
        if text.trim().is_empty() {
            return Ok(prompts::EMPTY_DAILY.to_string());
        }
        Ok(text)
    }

    pub async fn summary(&self, identity: &str) -> HistorySummary {
        let Some(handle) = self.sessions.get(identity) else {
            return HistorySummary::NoHistory;
        };
        let session = handle.lock().await;
        HistorySummary::Counts {
            identity: identity.to_string(),
            user_turns: session.count(TurnRole::User),
            assistant_turns: session.count(TurnRole::Assistant),
        }
    }

    /// Forget `identity`'s conversation. Clearing twice is harmless.
    ///
    /// Waits for an in-flight exchange on the same identity to commit first.
    pub async fn clear(&self, identity: &str) {
        let Some(handle) = self.sessions.get(identity) else {
            return;
        };
        let _session = handle.lock().await;
        if self.sessions.remove_current(identity, &handle) {
            tracing::info!(identity = %identity, "Conversation cleared");
        }
    }
}
