use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::id::ApiId,
    common::poll::{OptionText, PollStatus},
    db::poll::Poll,
};

/// An API-friendly poll description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollDescription {
    /// Poll unique ID.
    pub id: ApiId,
    pub title: String,
    pub description: String,
    pub prompt: String,
    /// Options in display order.
    pub options: Vec<OptionText>,
    pub status: PollStatus,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Poll> for PollDescription {
    fn from(poll: Poll) -> Self {
        Self {
            id: poll.id.into(),
            title: poll.poll.title,
            description: poll.poll.description,
            prompt: poll.poll.prompt,
            options: poll.poll.options,
            status: poll.poll.status,
            starts_at: poll.poll.starts_at,
            ends_at: poll.poll.ends_at,
            created_at: poll.poll.created_at,
            updated_at: poll.poll.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rocket::serde::json::serde_json;

    #[test]
    fn camel_case_with_string_id() {
        let mut poll = Poll::example(PollStatus::Open);
        poll.starts_at = None;
        let id = poll.id;
        let json = serde_json::to_value(PollDescription::from(poll)).unwrap();
        assert_eq!(json["id"], id.to_string());
        assert_eq!(json["status"], "open");
        assert!(json["startsAt"].is_null());
        assert!(json["endsAt"].is_string());
        assert!(json.get("createdAt").is_some());
        assert!(json.get("created_at").is_none());
    }
}
