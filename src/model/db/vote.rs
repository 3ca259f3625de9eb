use std::ops::Deref;

use chrono::{DateTime, Utc};
use log::debug;
use mongodb::{
    bson::{self, doc, serde_helpers::chrono_datetime_as_bson_datetime, DateTime as BsonDateTime},
    options::UpdateOptions,
};
use rocket::futures::TryStreamExt;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{
    common::poll::{OptionText, Tally, UserId},
    db::poll::Poll,
    mongodb::{is_duplicate_key_error, Coll, Id},
};

/// Core vote data, as stored in the database. Votes are never modified or deleted.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct VoteCore {
    pub poll_id: Id,
    pub user_id: UserId,
    pub option_text: OptionText,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub cast_at: DateTime<Utc>,
}

/// A vote without an ID.
pub type NewVote = VoteCore;

impl VoteCore {
    pub fn new(poll_id: Id, user_id: UserId, option_text: OptionText, cast_at: DateTime<Utc>) -> Self {
        Self {
            poll_id,
            user_id,
            option_text,
            cast_at,
        }
    }

    /// Atomically record this vote unless the user has already voted in the poll.
    ///
    /// Returns `false` if a vote for this `(poll_id, user_id)` already existed,
    /// in which case nothing was written. The unique index on those two fields
    /// decides the winner when several attempts race.
    pub async fn insert_if_absent(&self, votes: &Coll<NewVote>) -> Result<bool> {
        let filter = doc! {
            "poll_id": self.poll_id,
            "user_id": self.user_id.as_str(),
        };
        let update = doc! {
            "$setOnInsert": {
                "option_text": self.option_text.as_str(),
                "cast_at": BsonDateTime::from_chrono(self.cast_at),
            }
        };
        let options = UpdateOptions::builder().upsert(true).build();
        match votes.update_one(filter, update, options).await {
            Ok(result) => Ok(result.upserted_id.is_some()),
            Err(e) if is_duplicate_key_error(&e) => {
                debug!(
                    "Lost vote race for poll {} user {}",
                    self.poll_id, self.user_id
                );
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// A vote from the database, with its unique ID.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Vote {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub vote: VoteCore,
}

impl Deref for Vote {
    type Target = VoteCore;

    fn deref(&self) -> &Self::Target {
        &self.vote
    }
}

/// Number of votes recorded for one option text.
#[derive(Debug, Deserialize)]
struct OptionCount {
    #[serde(rename = "_id")]
    option_text: OptionText,
    count: u64,
}

impl Vote {
    /// The option the given user chose in the given poll, if they have voted.
    pub async fn selected_option(
        votes: &Coll<Vote>,
        poll_id: Id,
        user_id: &str,
    ) -> Result<Option<OptionText>> {
        let filter = doc! {
            "poll_id": poll_id,
            "user_id": user_id,
        };
        let vote = votes.find_one(filter, None).await?;
        Ok(vote.map(|vote| vote.vote.option_text))
    }

    /// Raw vote counts per stored option text, straight from the ledger.
    pub async fn counts(votes: &Coll<Vote>, poll_id: Id) -> Result<Vec<(OptionText, u64)>> {
        let pipeline = [
            doc! { "$match": { "poll_id": poll_id } },
            doc! { "$group": { "_id": "$option_text", "count": { "$sum": 1 } } },
        ];
        let documents: Vec<_> = votes.aggregate(pipeline, None).await?.try_collect().await?;
        documents
            .into_iter()
            .map(|document| -> Result<(OptionText, u64)> {
                let count: OptionCount = bson::from_document(document)?;
                Ok((count.option_text, count.count))
            })
            .collect()
    }

    /// Count the votes for every current option of the poll.
    pub async fn tally(votes: &Coll<Vote>, poll: &Poll) -> Result<Tally> {
        let counts = Self::counts(votes, poll.id).await?;
        Ok(Tally::new(&poll.options, counts))
    }
}
