use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{validate_thread_id, CheckpointError, Checkpointer};
use crate::state::ConversationState;

/// Process-local checkpointer. State lives as long as the value does.
#[derive(Debug, Default)]
pub struct InMemoryCheckpointer {
    threads: RwLock<HashMap<String, ConversationState>>,
}

impl InMemoryCheckpointer {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Checkpointer for InMemoryCheckpointer {
    async fn load(&self, thread_id: &str) -> Result<Option<ConversationState>, CheckpointError> {
        validate_thread_id(thread_id)?;
        Ok(self.threads.read().await.get(thread_id).cloned())
    }

    async fn save(
        &self,
        thread_id: &str,
        state: &ConversationState,
    ) -> Result<(), CheckpointError> {
        validate_thread_id(thread_id)?;
        self.threads
            .write()
            .await
            .insert(thread_id.to_string(), state.clone());
        Ok(())
    }

    async fn delete(&self, thread_id: &str) -> Result<bool, CheckpointError> {
        validate_thread_id(thread_id)?;
        Ok(self.threads.write().await.remove(thread_id).is_some())
    }

    async fn list(&self) -> Result<Vec<String>, CheckpointError> {
        let mut ids: Vec<String> = self.threads.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;
    use crate::state::MailView;

    #[tokio::test]
    async fn test_save_and_load() -> Result<(), CheckpointError> {
        let store = InMemoryCheckpointer::new();
        assert!(store.load("t1").await?.is_none());

        let mut state = ConversationState::new();
        state.push_message(Message::user().with_text("any news from HR?"));
        state.current_view = MailView::Search;
        store.save("t1", &state).await?;

        let loaded = store.load("t1").await?.unwrap();
        assert_eq!(loaded, state);
        assert!(store.load("t2").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_saved_state_is_a_snapshot() -> Result<(), CheckpointError> {
        let store = InMemoryCheckpointer::new();
        let mut state = ConversationState::new();
        store.save("t1", &state).await?;

        state.push_message(Message::user().with_text("not committed"));
        assert!(store.load("t1").await?.unwrap().messages.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_and_list() -> Result<(), CheckpointError> {
        let store = InMemoryCheckpointer::new();
        store.save("b", &ConversationState::new()).await?;
        store.save("a", &ConversationState::new()).await?;
        assert_eq!(store.list().await?, vec!["a".to_string(), "b".to_string()]);

        assert!(store.delete("a").await?);
        assert!(!store.delete("a").await?);
        assert_eq!(store.list().await?, vec!["b".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_thread_id() {
        let store = InMemoryCheckpointer::new();
        let result = store.save("", &ConversationState::new()).await;
        assert!(matches!(result, Err(CheckpointError::InvalidThreadId(_))));
        assert!(store.list().await.unwrap().is_empty());
    }
}
