//! Conversation history and the session that advances it
//!
//! A [`ConversationSession`] owns one ordered, append-only sequence of
//! [`Turn`]s. Each [`ConversationSession::advance`] appends the user turn,
//! asks the chat model for a reply, and appends the assistant turn only
//! when generation succeeds.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::llm::ChatModel;

/// Default system preamble
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Speaker of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Wire name used by chat completion APIs
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One role-tagged message; immutable once created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    role: Role,
    content: String,
}

impl Turn {
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }
}

/// What happens to the user turn when generation fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailedTurnPolicy {
    /// Keep the unanswered user turn; the next request includes it
    #[default]
    Retain,
    /// Remove the unanswered user turn so history is unchanged
    Discard,
}

/// Tunables for a conversation session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Leading system turn, if any
    pub system_prompt: Option<String>,
    /// Most recent non-system turns sent per request (`None` = all)
    pub max_context_turns: Option<usize>,
    /// Handling of a user turn whose generation failed
    pub failed_turn_policy: FailedTurnPolicy,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            system_prompt: Some(DEFAULT_SYSTEM_PROMPT.to_string()),
            max_context_turns: None,
            failed_turn_policy: FailedTurnPolicy::default(),
        }
    }
}

/// Ordered turn sequence with an optional leading system turn
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    /// Create a conversation, optionally seeded with a system turn
    #[must_use]
    pub fn new(system: Option<&str>) -> Self {
        Self {
            turns: system.map(Turn::system).into_iter().collect(),
        }
    }

    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    fn pop(&mut self) -> Option<Turn> {
        self.turns.pop()
    }

    fn system_len(&self) -> usize {
        usize::from(self.turns.first().is_some_and(|t| t.role == Role::System))
    }

    /// Drop everything after the system turn
    fn truncate_to_system(&mut self) {
        let keep = self.system_len();
        self.turns.truncate(keep);
    }

    /// Turns to send for the next completion
    ///
    /// With a limit, keeps the system turn plus at most `limit` of the most
    /// recent turns, starting on a user turn.
    #[must_use]
    pub fn context(&self, limit: Option<usize>) -> Vec<Turn> {
        let system = self.system_len();
        let Some(limit) = limit else {
            return self.turns.clone();
        };

        let dialogue = &self.turns[system..];
        let mut start = dialogue.len().saturating_sub(limit);
        while start < dialogue.len() && dialogue[start].role != Role::User {
            start += 1;
        }

        self.turns[..system]
            .iter()
            .chain(&dialogue[start..])
            .cloned()
            .collect()
    }
}

/// Stateful holder of one dialogue, delegating replies to a [`ChatModel`]
pub struct ConversationSession {
    conversation: Conversation,
    model: Arc<dyn ChatModel>,
    settings: SessionSettings,
}

impl ConversationSession {
    #[must_use]
    pub fn new(model: Arc<dyn ChatModel>, settings: SessionSettings) -> Self {
        Self {
            conversation: Conversation::new(settings.system_prompt.as_deref()),
            model,
            settings,
        }
    }

    #[must_use]
    pub const fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    #[must_use]
    pub const fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Append a user turn, generate a reply, and append the assistant turn
    ///
    /// Under [`FailedTurnPolicy::Retain`] a failed generation leaves the
    /// user turn in place. Under [`FailedTurnPolicy::Discard`] the user turn
    /// is only committed together with the reply, so a failed or cancelled
    /// generation leaves the conversation unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Generation`] if the chat model fails
    pub async fn advance(&mut self, user_text: &str) -> Result<String> {
        self.conversation.push(Turn::user(user_text));

        let context = self.conversation.context(self.settings.max_context_turns);
        let pending = match self.settings.failed_turn_policy {
            FailedTurnPolicy::Retain => None,
            FailedTurnPolicy::Discard => self.conversation.pop(),
        };
        tracing::debug!(
            history = self.conversation.len(),
            sent = context.len(),
            "advancing conversation"
        );

        match self.model.complete(&context).await {
            Ok(reply) => {
                if let Some(turn) = pending {
                    self.conversation.push(turn);
                }
                self.conversation.push(Turn::assistant(reply.clone()));
                Ok(reply)
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    policy = ?self.settings.failed_turn_policy,
                    history = self.conversation.len(),
                    "generation failed"
                );
                Err(e)
            }
        }
    }

    /// Clear the dialogue, keeping the system turn
    pub fn reset(&mut self) {
        self.conversation.truncate_to_system();
        tracing::debug!("conversation reset");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::Error;
    use crate::error::RemoteError;

    /// Scripted model that records every request it receives
    #[derive(Default)]
    struct ScriptedModel {
        replies: Mutex<Vec<Option<String>>>,
        requests: Mutex<Vec<Vec<Turn>>>,
    }

    impl ScriptedModel {
        fn new(replies: &[Option<&str>]) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.iter().rev().map(|r| r.map(String::from)).collect()),
                requests: Mutex::default(),
            })
        }

        fn requests(&self) -> Vec<Vec<Turn>> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn complete(&self, turns: &[Turn]) -> Result<String> {
            self.requests.lock().unwrap().push(turns.to_vec());
            match self.replies.lock().unwrap().pop().flatten() {
                Some(reply) => Ok(reply),
                None => Err(Error::Generation(RemoteError::Malformed(
                    "no choices".to_string(),
                ))),
            }
        }
    }

    fn roles(turns: &[Turn]) -> Vec<Role> {
        turns.iter().map(Turn::role).collect()
    }

    #[test]
    fn conversation_starts_with_system_turn() {
        let conversation = Conversation::new(Some(DEFAULT_SYSTEM_PROMPT));
        assert_eq!(conversation.len(), 1);
        assert_eq!(conversation.turns()[0], Turn::system("You are a helpful assistant."));

        assert!(Conversation::new(None).is_empty());
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
        assert_eq!(Role::User.as_str(), "user");
    }

    #[tokio::test]
    async fn advance_appends_user_and_assistant() {
        let model = ScriptedModel::new(&[Some("hi there"), Some("fine thanks")]);
        let mut session = ConversationSession::new(model.clone(), SessionSettings::default());

        assert_eq!(session.advance("hello").await.unwrap(), "hi there");
        assert_eq!(session.advance("how are you").await.unwrap(), "fine thanks");

        let turns = session.conversation().turns();
        assert_eq!(turns.len(), 1 + 2 * 2);
        assert_eq!(
            roles(turns),
            [Role::System, Role::User, Role::Assistant, Role::User, Role::Assistant]
        );

        // Each request carries the whole history so far
        let requests = model.requests();
        assert_eq!(requests[0].len(), 2);
        assert_eq!(requests[1].len(), 4);
        assert_eq!(requests[1][2], Turn::assistant("hi there"));
    }

    #[tokio::test]
    async fn without_system_prompt_history_is_two_per_turn() {
        let model = ScriptedModel::new(&[Some("a"), Some("b"), Some("c")]);
        let settings = SessionSettings {
            system_prompt: None,
            ..SessionSettings::default()
        };
        let mut session = ConversationSession::new(model, settings);

        for text in ["one", "two", "three"] {
            session.advance(text).await.unwrap();
        }
        assert_eq!(session.conversation().len(), 6);
    }

    #[tokio::test]
    async fn failed_generation_retains_user_turn_by_default() {
        let model = ScriptedModel::new(&[None, Some("answer")]);
        let mut session = ConversationSession::new(model.clone(), SessionSettings::default());

        let err = session.advance("first question").await.unwrap_err();
        assert!(matches!(err, Error::Generation(_)));
        assert_eq!(session.conversation().len(), 2);
        assert_eq!(session.conversation().turns()[1], Turn::user("first question"));

        // The unanswered question is resent with the next one
        session.advance("second question").await.unwrap();
        let last_request = model.requests().pop().unwrap();
        assert_eq!(roles(&last_request), [Role::System, Role::User, Role::User]);
        assert_eq!(session.conversation().len(), 4);
    }

    #[tokio::test]
    async fn failed_generation_discards_user_turn_when_configured() {
        let model = ScriptedModel::new(&[None]);
        let settings = SessionSettings {
            failed_turn_policy: FailedTurnPolicy::Discard,
            ..SessionSettings::default()
        };
        let mut session = ConversationSession::new(model, settings);

        assert!(session.advance("lost").await.is_err());
        assert_eq!(session.conversation().len(), 1);
    }

    #[tokio::test]
    async fn context_window_limits_request() {
        let model = ScriptedModel::new(&[Some("a1"), Some("a2"), Some("a3")]);
        let settings = SessionSettings {
            max_context_turns: Some(3),
            ..SessionSettings::default()
        };
        let mut session = ConversationSession::new(model.clone(), settings);

        for text in ["u1", "u2", "u3"] {
            session.advance(text).await.unwrap();
        }

        // Full history is kept locally
        assert_eq!(session.conversation().len(), 7);

        // Third request: 5 dialogue turns, window of 3 would start on an
        // assistant turn, so it is trimmed to [u2, a2, u3]
        let last = model.requests().pop().unwrap();
        assert_eq!(
            last,
            vec![
                Turn::system(DEFAULT_SYSTEM_PROMPT),
                Turn::user("u2"),
                Turn::assistant("a2"),
                Turn::user("u3"),
            ]
        );
    }

    #[test]
    fn context_without_limit_is_whole_history() {
        let mut conversation = Conversation::new(Some("sys"));
        conversation.push(Turn::user("q"));
        conversation.push(Turn::assistant("a"));
        assert_eq!(conversation.context(None), conversation.turns());
    }

    #[test]
    fn context_window_of_zero_keeps_only_system() {
        let mut conversation = Conversation::new(Some("sys"));
        conversation.push(Turn::user("q"));
        assert_eq!(conversation.context(Some(0)), vec![Turn::system("sys")]);
    }

    #[tokio::test]
    async fn discard_policy_commits_user_turn_with_reply() {
        let model = ScriptedModel::new(&[None, Some("answer")]);
        let settings = SessionSettings {
            failed_turn_policy: FailedTurnPolicy::Discard,
            ..SessionSettings::default()
        };
        let mut session = ConversationSession::new(model.clone(), settings);

        assert!(session.advance("lost").await.is_err());
        assert_eq!(session.advance("kept").await.unwrap(), "answer");

        // The pending user turn is sent even though it is not yet stored
        let last_request = model.requests().pop().unwrap();
        assert_eq!(last_request.last(), Some(&Turn::user("kept")));
        assert_eq!(
            session.conversation().turns(),
            [
                Turn::system(DEFAULT_SYSTEM_PROMPT),
                Turn::user("kept"),
                Turn::assistant("answer"),
            ]
        );
    }

    #[tokio::test]
    async fn reset_keeps_system_turn() {
        let model = ScriptedModel::new(&[Some("a")]);
        let mut session = ConversationSession::new(model, SessionSettings::default());
        session.advance("q").await.unwrap();

        session.reset();
        assert_eq!(session.conversation().turns(), [Turn::system(DEFAULT_SYSTEM_PROMPT)]);
    }
}
