use std::cmp::Reverse;
use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::{doc, serde_helpers::chrono_datetime_as_bson_datetime, DateTime as BsonDateTime, Document};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::poll::PollFields,
    common::poll::{OptionText, PollStatus},
    mongodb::{optional_datetime, Id},
};

/// Core poll data, as stored in the database.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct PollCore {
    pub title: String,
    pub description: String,
    /// The question voters are answering.
    pub prompt: String,
    /// Possible answers, in display order. Always at least two.
    pub options: Vec<OptionText>,
    pub status: PollStatus,
    #[serde(default, with = "optional_datetime")]
    pub starts_at: Option<DateTime<Utc>>,
    /// Once this passes, an open poll is closed by the reconciler.
    #[serde(default, with = "optional_datetime")]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl PollCore {
    /// Create a new poll from validated fields. New polls are always drafts.
    pub fn new(fields: PollFields, now: DateTime<Utc>) -> Self {
        Self {
            title: fields.title,
            description: fields.description,
            prompt: fields.prompt,
            options: fields.options,
            status: PollStatus::Draft,
            starts_at: fields.starts_at,
            ends_at: fields.ends_at,
            created_at: now,
            updated_at: now,
        }
    }

    /// Is the given text one of this poll's current options?
    pub fn has_option(&self, option: &str) -> bool {
        self.options.iter().any(|o| o == option)
    }

    /// When the poll is considered to have started, for public ordering.
    pub fn effective_start(&self) -> DateTime<Utc> {
        self.starts_at.unwrap_or(self.created_at)
    }

    /// Build the `$set` update that overwrites every admin-editable field.
    ///
    /// Edits are full replacements, never partial patches.
    pub fn edit_update(fields: PollFields, status: PollStatus, now: DateTime<Utc>) -> Document {
        doc! {
            "$set": {
                "title": fields.title,
                "description": fields.description,
                "prompt": fields.prompt,
                "options": fields.options,
                "status": status,
                "starts_at": fields.starts_at.map(BsonDateTime::from_chrono),
                "ends_at": fields.ends_at.map(BsonDateTime::from_chrono),
                "updated_at": BsonDateTime::from_chrono(now),
            }
        }
    }
}

/// A poll without an ID.
pub type NewPoll = PollCore;

/// A poll from the database, with its unique ID.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Poll {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub poll: PollCore,
}

impl Poll {
    /// Order polls for the public listing: most recently started first.
    pub fn sort_for_public(polls: &mut [Poll]) {
        polls.sort_by_key(|poll| Reverse(poll.effective_start()));
    }
}

impl Deref for Poll {
    type Target = PollCore;

    fn deref(&self) -> &Self::Target {
        &self.poll
    }
}

impl DerefMut for Poll {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.poll
    }
}
