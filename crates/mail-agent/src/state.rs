//! Per-thread conversation state
//!
//! The message log is the only part the agent interprets. Everything else is a
//! passive projection of the mail UI that is read by the prompt and may be
//! rewritten by tools, but is never validated here.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

use crate::message::{Message, Role};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailSummary {
    pub id: String,
    #[serde(default)]
    pub thread_id: String,
    pub sender: String,
    #[serde(default)]
    pub sender_email: String,
    pub subject: String,
    #[serde(default)]
    pub snippet: String,
    pub date: String,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailDetail {
    pub id: String,
    #[serde(default)]
    pub thread_id: String,
    pub sender: String,
    #[serde(default)]
    pub sender_email: String,
    #[serde(default)]
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cc: Option<String>,
    pub subject: String,
    #[serde(default)]
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_html: Option<String>,
    pub date: String,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposeDraft {
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailView {
    #[default]
    Inbox,
    Sent,
    Compose,
    Detail,
    Search,
}

impl std::fmt::Display for MailView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MailView::Inbox => "inbox",
            MailView::Sent => "sent",
            MailView::Compose => "compose",
            MailView::Detail => "detail",
            MailView::Search => "search",
        };
        f.write_str(name)
    }
}

/// What the UI reports about itself alongside a turn.
///
/// Only the fields present are applied; `current_email` and `compose_data`
/// use a nested option so the UI can clear them explicitly with `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emails: Option<Vec<EmailSummary>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_present"
    )]
    pub current_email: Option<Option<EmailDetail>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_present"
    )]
    pub compose_data: Option<Option<ComposeDraft>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_view: Option<MailView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<Map<String, Value>>,
}

// A present-but-null field must become Some(None), not None.
fn deserialize_present<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationState {
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub emails: Vec<EmailSummary>,
    #[serde(default)]
    pub current_email: Option<EmailDetail>,
    #[serde(default)]
    pub compose_data: Option<ComposeDraft>,
    #[serde(default)]
    pub current_view: MailView,
    #[serde(default)]
    pub filters: Map<String, Value>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to the log. Messages are never edited or removed afterwards.
    pub fn push_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn apply_ui_snapshot(&mut self, snapshot: UiSnapshot) {
        if let Some(emails) = snapshot.emails {
            self.emails = emails;
        }
        if let Some(current_email) = snapshot.current_email {
            self.current_email = current_email;
        }
        if let Some(compose_data) = snapshot.compose_data {
            self.compose_data = compose_data;
        }
        if let Some(current_view) = snapshot.current_view {
            self.current_view = current_view;
        }
        if let Some(filters) = snapshot.filters {
            self.filters = filters;
        }
    }

    /// Ids of tool requests with no result anywhere after them, in request order.
    ///
    /// A turn that ends on UI actions leaves these behind until the UI reports back.
    pub fn unanswered_tool_requests(&self) -> Vec<String> {
        let mut pending: Vec<&str> = Vec::new();

        for message in &self.messages {
            if message.role == Role::Assistant {
                pending.extend(message.tool_requests().map(|request| request.id.as_str()));
            }
            let answered = message.tool_response_ids();
            pending.retain(|id| !answered.contains(id));
        }

        pending.into_iter().map(str::to_string).collect()
    }

    /// Ids of tool results that do not answer an earlier tool request in this thread.
    pub fn orphaned_tool_responses(&self) -> Vec<String> {
        let mut requested: HashSet<&str> = HashSet::new();
        let mut orphaned = Vec::new();

        for message in &self.messages {
            if message.role == Role::Assistant {
                requested.extend(message.tool_request_ids());
            }
            for id in message.tool_response_ids() {
                if !requested.remove(id) {
                    orphaned.push(id.to_string());
                }
            }
        }

        orphaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Content, ToolCall};
    use serde_json::json;

    fn sample_email() -> EmailDetail {
        EmailDetail {
            id: "18c2".to_string(),
            thread_id: "18c2".to_string(),
            sender: "Uber Receipts".to_string(),
            sender_email: "noreply@uber.com".to_string(),
            to: "me@example.com".to_string(),
            cc: None,
            subject: "Your Thursday trip".to_string(),
            body: "Thanks for riding".to_string(),
            body_html: None,
            date: "2025-01-09".to_string(),
            is_read: false,
            labels: vec!["INBOX".to_string()],
        }
    }

    #[test]
    fn test_state_uses_ui_field_names() {
        let mut state = ConversationState::new();
        state.current_email = Some(sample_email());
        state.compose_data = Some(ComposeDraft {
            to: "bob@example.com".to_string(),
            in_reply_to: Some("18c2".to_string()),
            ..Default::default()
        });

        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["currentView"], "inbox");
        assert_eq!(value["currentEmail"]["senderEmail"], "noreply@uber.com");
        assert_eq!(value["composeData"]["inReplyTo"], "18c2");
        assert!(value["filters"].as_object().unwrap().is_empty());
    }

    #[test]
    fn test_snapshot_only_touches_present_fields() {
        let mut state = ConversationState::new();
        state.push_message(Message::user().with_text("hi"));
        state.current_email = Some(sample_email());

        let snapshot: UiSnapshot = serde_json::from_value(json!({
            "currentView": "compose",
            "filters": {"unreadOnly": true}
        }))
        .unwrap();
        state.apply_ui_snapshot(snapshot);

        assert_eq!(state.current_view, MailView::Compose);
        assert_eq!(state.filters["unreadOnly"], json!(true));
        assert!(state.current_email.is_some());
        assert_eq!(state.messages.len(), 1);
    }

    #[test]
    fn test_snapshot_null_clears_field() {
        let mut state = ConversationState::new();
        state.current_email = Some(sample_email());

        let snapshot: UiSnapshot =
            serde_json::from_value(json!({"currentEmail": null})).unwrap();
        assert_eq!(snapshot.current_email, Some(None));

        state.apply_ui_snapshot(snapshot);
        assert!(state.current_email.is_none());
    }

    #[test]
    fn test_orphaned_tool_responses() {
        let mut state = ConversationState::new();
        state.push_message(Message::user().with_text("filter by alice"));
        state.push_message(
            Message::assistant()
                .with_tool_request("call_1", Ok(ToolCall::new("setFilters", json!({})))),
        );
        state.push_message(Message::tool_result("call_1", Ok(vec![Content::text("ok")])));
        assert!(state.orphaned_tool_responses().is_empty());

        // answered twice, and answered before being asked
        state.push_message(Message::tool_result("call_1", Ok(vec![])));
        state.push_message(Message::tool_result("call_2", Ok(vec![])));
        state.push_message(
            Message::assistant()
                .with_tool_request("call_2", Ok(ToolCall::new("setFilters", json!({})))),
        );

        assert_eq!(
            state.orphaned_tool_responses(),
            vec!["call_1".to_string(), "call_2".to_string()]
        );
    }

    #[test]
    fn test_unanswered_tool_requests() {
        let mut state = ConversationState::new();
        state.push_message(Message::user().with_text("open the uber email and filter"));
        state.push_message(
            Message::assistant()
                .with_tool_request("call_1", Ok(ToolCall::new("openEmail", json!({}))))
                .with_tool_request("call_2", Ok(ToolCall::new("setFilters", json!({})))),
        );
        assert_eq!(
            state.unanswered_tool_requests(),
            vec!["call_1".to_string(), "call_2".to_string()]
        );

        // one tool message may answer a whole batch
        state.push_message(
            Message::tool()
                .with_tool_response("call_1", Ok(vec![Content::text("opened")]))
                .with_tool_response("call_2", Ok(vec![])),
        );
        assert!(state.unanswered_tool_requests().is_empty());
        assert!(state.orphaned_tool_responses().is_empty());
    }

    #[test]
    fn test_unknown_view_is_rejected() {
        let parsed: Result<MailView, _> = serde_json::from_value(json!("archive"));
        assert!(parsed.is_err());
        assert_eq!(MailView::Detail.to_string(), "detail");
    }
}
