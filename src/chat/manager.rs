//! Chat manager: one budgeted completion per user query

use std::collections::HashMap;
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{BudgetPolicy, Interaction, InteractionLog, Message, SessionStore, TruncateToTail};
use crate::completion::CompletionClient;
use crate::prompt::TUTOR_INSTRUCTIONS;
use crate::{Error, Result};

/// Default bound on a single completion call
pub const DEFAULT_COMPLETION_TIMEOUT: Duration = Duration::from_secs(60);

/// One async mutex per user id, dropped once nobody holds or awaits it
#[derive(Default)]
struct UserLocks {
    locks: std::sync::Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl UserLocks {
    async fn acquire(&self, user_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.retain(|_, l| Arc::strong_count(l) > 1);
            locks.entry(user_id.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }
}

/// Maintains per-user conversation context and brokers completion calls
pub struct ChatManager {
    store: Arc<dyn SessionStore>,
    completion: Arc<dyn CompletionClient>,
    log: Arc<dyn InteractionLog>,
    policy: Arc<dyn BudgetPolicy>,
    instructions: String,
    timeout: Duration,
    locks: UserLocks,
}

impl ChatManager {
    /// Create a manager with the tutor instructions, the default budget
    /// policy and the default completion timeout
    #[must_use]
    pub fn new(
        store: Arc<dyn SessionStore>,
        completion: Arc<dyn CompletionClient>,
        log: Arc<dyn InteractionLog>,
    ) -> Self {
        Self {
            store,
            completion,
            log,
            policy: Arc::new(TruncateToTail::default()),
            instructions: TUTOR_INSTRUCTIONS.to_string(),
            timeout: DEFAULT_COMPLETION_TIMEOUT,
            locks: UserLocks::default(),
        }
    }

    /// Replace the budget policy
    #[must_use]
    pub fn with_policy(mut self, policy: Arc<dyn BudgetPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Set the completion timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the system instructions
    #[must_use]
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    /// Stored history for a user, without the system message
    #[must_use]
    pub fn history(&self, user_id: &str) -> Vec<Message> {
        self.store.get(user_id)
    }

    /// Answer one user query
    ///
    /// The user message stays in history even when the completion fails.
    /// A failed interaction-log write is logged and the reply still returned.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` for an empty user id or query (nothing is
    /// recorded), and `Error::Upstream` if the completion call fails or
    /// times out.
    pub async fn handle_query(&self, user_id: &str, query: &str) -> Result<Interaction> {
        if user_id.is_empty() || query.is_empty() {
            return Err(Error::Validation(
                "User query and user ID are required".to_string(),
            ));
        }

        let _guard = self.locks.acquire(user_id).await;

        self.store.append(user_id, Message::user(query));

        let mut history = self.store.get(user_id);
        if let Some(kept) = self.policy.truncate(&history) {
            tracing::debug!(
                user_id,
                dropped = history.len() - kept.len(),
                kept = kept.len(),
                "history over token budget, truncated"
            );
            self.store.replace(user_id, kept.clone());
            history = kept;
        }

        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(Message::system(self.instructions.as_str()));
        messages.extend(history);

        let reply = match tokio::time::timeout(self.timeout, self.completion.complete(&messages)).await
        {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                tracing::warn!(user_id, error = %e, "completion failed");
                return Err(match e {
                    Error::Upstream(msg) => Error::Upstream(msg),
                    other => Error::Upstream(other.to_string()),
                });
            }
            Err(_) => {
                tracing::warn!(user_id, timeout = ?self.timeout, "completion timed out");
                return Err(Error::Upstream(format!(
                    "completion timed out after {:?}",
                    self.timeout
                )));
            }
        };

        // Evicted mid-call: restart the history from this turn
        if self.store.get(user_id).is_empty() {
            tracing::debug!(user_id, "history evicted during completion, restarting");
            self.store.append(user_id, Message::user(query));
        }
        self.store.append(user_id, Message::assistant(reply.as_str()));

        let interaction = Interaction::new(user_id, query, &reply);
        if let Err(e) = self.log.append(&interaction) {
            tracing::error!(
                user_id,
                interaction_id = %interaction.id,
                error = %e,
                "failed to persist interaction, audit trail incomplete"
            );
        }

        tracing::info!(user_id, interaction_id = %interaction.id, "chat reply generated");

        Ok(interaction)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;

    use super::*;
    use crate::chat::{MemorySessionStore, Role};

    /// Replies with a numbered echo and records every outbound list
    #[derive(Default)]
    struct ScriptedCompletion {
        calls: StdMutex<Vec<Vec<Message>>>,
        fail_on: Option<usize>,
    }

    impl ScriptedCompletion {
        fn failing_on(call: usize) -> Self {
            Self {
                fail_on: Some(call),
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<Vec<Message>> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CompletionClient for ScriptedCompletion {
        async fn complete(&self, messages: &[Message]) -> Result<String> {
            let n = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(messages.to_vec());
                calls.len()
            };
            if self.fail_on == Some(n) {
                return Err(Error::Upstream("model unavailable".to_string()));
            }
            Ok(format!("reply {n}"))
        }
    }

    struct SlowCompletion;

    #[async_trait]
    impl CompletionClient for SlowCompletion {
        async fn complete(&self, _messages: &[Message]) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("too late".to_string())
        }
    }

    #[derive(Default)]
    struct RecordingLog {
        records: StdMutex<Vec<Interaction>>,
        fail: bool,
    }

    impl InteractionLog for RecordingLog {
        fn append(&self, interaction: &Interaction) -> Result<()> {
            if self.fail {
                return Err(Error::Persistence("disk full".to_string()));
            }
            self.records.lock().unwrap().push(interaction.clone());
            Ok(())
        }
    }

    struct Harness {
        manager: ChatManager,
        store: Arc<MemorySessionStore>,
        completion: Arc<ScriptedCompletion>,
        log: Arc<RecordingLog>,
    }

    fn harness_with(completion: ScriptedCompletion, log: RecordingLog) -> Harness {
        let store = Arc::new(MemorySessionStore::default());
        let completion = Arc::new(completion);
        let log = Arc::new(log);
        let manager = ChatManager::new(store.clone(), completion.clone(), log.clone());
        Harness {
            manager,
            store,
            completion,
            log,
        }
    }

    fn harness() -> Harness {
        harness_with(ScriptedCompletion::default(), RecordingLog::default())
    }

    #[tokio::test]
    async fn empty_inputs_are_rejected_without_side_effects() {
        let h = harness();

        let err = h.manager.handle_query("", "hello").await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        let err = h.manager.handle_query("u1", "").await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        assert!(h.manager.history("u1").is_empty());
        assert!(h.completion.calls().is_empty());
        assert!(h.log.records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn whitespace_only_inputs_are_forwarded() {
        let h = harness();

        h.manager.handle_query("u1", "   ").await.unwrap();
        h.manager.handle_query("  ", "hi").await.unwrap();

        let calls = h.completion.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0][1], Message::user("   "));
        assert_eq!(h.manager.history("  ").len(), 2);
    }

    /// Clears the user's history while the call is in flight
    struct EvictingCompletion {
        store: Arc<MemorySessionStore>,
    }

    #[async_trait]
    impl CompletionClient for EvictingCompletion {
        async fn complete(&self, _messages: &[Message]) -> Result<String> {
            self.store.clear("u1");
            Ok("after eviction".to_string())
        }
    }

    #[tokio::test]
    async fn eviction_during_call_never_leaves_a_lone_reply() {
        let store = Arc::new(MemorySessionStore::default());
        let completion = Arc::new(EvictingCompletion {
            store: store.clone(),
        });
        let manager =
            ChatManager::new(store.clone(), completion, Arc::new(RecordingLog::default()));

        manager.handle_query("u1", "q1").await.unwrap();

        assert_eq!(
            manager.history("u1"),
            vec![Message::user("q1"), Message::assistant("after eviction")]
        );
    }

    #[tokio::test]
    async fn n_queries_leave_2n_messages_in_order() {
        let h = harness();

        for i in 1..=3 {
            h.manager.handle_query("u1", &format!("q{i}")).await.unwrap();
        }

        let history = h.manager.history("u1");
        assert_eq!(history.len(), 6);
        assert_eq!(
            history,
            vec![
                Message::user("q1"),
                Message::assistant("reply 1"),
                Message::user("q2"),
                Message::assistant("reply 2"),
                Message::user("q3"),
                Message::assistant("reply 3"),
            ]
        );
        assert!(history.iter().all(|m| m.role != Role::System));
    }

    #[tokio::test]
    async fn outbound_call_is_instructions_then_history() {
        let h = harness();

        h.manager.handle_query("u1", "first").await.unwrap();
        h.manager.handle_query("u1", "second").await.unwrap();

        let calls = h.completion.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1][0], Message::system(TUTOR_INSTRUCTIONS));
        assert_eq!(
            &calls[1][1..],
            &[
                Message::user("first"),
                Message::assistant("reply 1"),
                Message::user("second"),
            ]
        );
    }

    #[tokio::test]
    async fn interaction_is_logged_and_returned() {
        let h = harness();

        let interaction = h.manager.handle_query("u1", "What is a heap?").await.unwrap();
        assert_eq!(interaction.user_id, "u1");
        assert_eq!(interaction.query, "What is a heap?");
        assert_eq!(interaction.reply, "reply 1");

        let records = h.log.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0], interaction);
    }

    #[tokio::test]
    async fn identical_queries_get_distinct_interactions() {
        let h = harness();

        let a = h.manager.handle_query("u1", "X").await.unwrap();
        let b = h.manager.handle_query("u1", "X").await.unwrap();

        assert_ne!(a.id, b.id);
        assert!(b.timestamp >= a.timestamp);
        assert_eq!(h.manager.history("u1").len(), 4);
    }

    #[tokio::test]
    async fn over_budget_history_is_cut_before_the_call() {
        let h = harness();
        let seeded: Vec<Message> = (0..20)
            .map(|i| {
                if i % 2 == 0 {
                    Message::user(format!("{i:02}{}", "u".repeat(998)))
                } else {
                    Message::assistant(format!("{i:02}{}", "a".repeat(998)))
                }
            })
            .collect();
        h.store.replace("u1", seeded.clone());

        h.manager.handle_query("u1", "next").await.unwrap();

        // Last two seeded messages plus the new query went upstream
        let calls = h.completion.calls();
        assert_eq!(calls[0].len(), 4);
        assert_eq!(calls[0][0].role, Role::System);
        assert_eq!(&calls[0][1..3], &seeded[18..]);
        assert_eq!(calls[0][3], Message::user("next"));

        let history = h.manager.history("u1");
        assert_eq!(history.len(), 4);
        assert_eq!(&history[..2], &seeded[18..]);
        assert_eq!(history[2], Message::user("next"));
        assert_eq!(history[3], Message::assistant("reply 1"));
    }

    #[tokio::test]
    async fn short_history_over_budget_is_kept_whole() {
        let h = harness();
        h.store.replace("u1", vec![Message::user("x".repeat(13_000))]);

        h.manager.handle_query("u1", "and?").await.unwrap();

        let history = h.manager.history("u1");
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].content.len(), 13_000);
        assert_eq!(history[1], Message::user("and?"));
    }

    #[tokio::test]
    async fn instructions_are_not_counted_against_budget() {
        let h = harness();
        let manager = ChatManager::new(h.store.clone(), h.completion.clone(), h.log.clone())
            .with_instructions("i".repeat(40_000));

        manager.handle_query("u1", "short").await.unwrap();

        assert_eq!(manager.history("u1").len(), 2);
    }

    #[tokio::test]
    async fn upstream_failure_keeps_earlier_history() {
        let h = harness_with(ScriptedCompletion::failing_on(2), RecordingLog::default());

        h.manager.handle_query("u1", "one").await.unwrap();
        let err = h.manager.handle_query("u1", "two").await.unwrap_err();
        assert!(matches!(err, Error::Upstream(_)));

        // The unanswered query is kept
        assert_eq!(
            h.manager.history("u1"),
            vec![
                Message::user("one"),
                Message::assistant("reply 1"),
                Message::user("two"),
            ]
        );
        assert_eq!(h.log.records.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn persistence_failure_still_returns_reply() {
        let h = harness_with(
            ScriptedCompletion::default(),
            RecordingLog {
                fail: true,
                ..Default::default()
            },
        );

        let interaction = h.manager.handle_query("u1", "hi").await.unwrap();
        assert_eq!(interaction.reply, "reply 1");
        assert_eq!(h.manager.history("u1").len(), 2);
    }

    #[tokio::test]
    async fn slow_completion_times_out_as_upstream() {
        let store = Arc::new(MemorySessionStore::default());
        let manager = ChatManager::new(
            store,
            Arc::new(SlowCompletion),
            Arc::new(RecordingLog::default()),
        )
        .with_timeout(Duration::from_millis(50));

        let err = manager.handle_query("u1", "hi").await.unwrap_err();
        assert!(matches!(err, Error::Upstream(_)));
        assert_eq!(manager.history("u1"), vec![Message::user("hi")]);
    }

    #[tokio::test]
    async fn users_do_not_share_history() {
        let h = harness();

        h.manager.handle_query("A", "x").await.unwrap();
        h.store.append("B", Message::user("untouched"));
        h.manager.handle_query("A", "y").await.unwrap();

        assert_eq!(h.manager.history("B"), vec![Message::user("untouched")]);
        assert!(
            h.completion
                .calls()
                .iter()
                .flatten()
                .all(|m| m.content != "untouched")
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_queries_for_one_user_stay_paired() {
        let h = harness();
        let manager = Arc::new(h.manager);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let manager = manager.clone();
                tokio::spawn(async move { manager.handle_query("u1", &format!("q{i}")).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let history = manager.history("u1");
        assert_eq!(history.len(), 16);
        for pair in history.chunks(2) {
            assert_eq!(pair[0].role, Role::User);
            assert_eq!(pair[1].role, Role::Assistant);
        }
    }

    #[tokio::test]
    async fn custom_policy_is_used() {
        struct KeepLastOne;
        impl BudgetPolicy for KeepLastOne {
            fn truncate(&self, history: &[Message]) -> Option<Vec<Message>> {
                history.last().map(|m| vec![m.clone()])
            }
        }

        let h = harness();
        let manager = ChatManager::new(h.store.clone(), h.completion.clone(), h.log.clone())
            .with_policy(Arc::new(KeepLastOne));

        manager.handle_query("u1", "a").await.unwrap();
        manager.handle_query("u1", "b").await.unwrap();

        assert_eq!(
            manager.history("u1"),
            vec![Message::user("b"), Message::assistant("reply 2")]
        );
        assert_eq!(h.completion.calls().len(), 2);
    }
}
