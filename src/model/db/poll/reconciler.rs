use chrono::{DateTime, Utc};
use log::{debug, info};
use mongodb::{
    bson::{doc, DateTime as BsonDateTime},
    options::FindOptions,
};
use rocket::futures::TryStreamExt;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{
    common::poll::PollStatus,
    mongodb::{optional_datetime, Coll, Id},
};

/// A view on just the fields of a poll that decide when it closes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollSchedule {
    #[serde(rename = "_id")]
    pub id: Id,
    pub status: PollStatus,
    #[serde(default, with = "optional_datetime")]
    pub ends_at: Option<DateTime<Utc>>,
}

impl PollSchedule {
    /// Has this poll outlived its end time while still open?
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == PollStatus::Open && self.ends_at.map_or(false, |end| end <= now)
    }
}

/// Decide which of the given polls must be closed at time `now`.
pub fn expired_polls<'a, I>(polls: I, now: DateTime<Utc>) -> Vec<Id>
where
    I: IntoIterator<Item = &'a PollSchedule>,
{
    polls
        .into_iter()
        .filter(|poll| poll.is_expired(now))
        .map(|poll| poll.id)
        .collect()
}

/// Look up the open polls whose end time is at or before `now`, without
/// changing anything.
pub async fn find_expired_polls(polls: &Coll<PollSchedule>, now: DateTime<Utc>) -> Result<Vec<Id>> {
    let filter = doc! {
        "status": PollStatus::Open,
        "ends_at": { "$ne": null },
    };
    let projection = FindOptions::builder()
        .projection(doc! { "_id": 1, "status": 1, "ends_at": 1 })
        .build();
    let candidates: Vec<PollSchedule> = polls.find(filter, projection).await?.try_collect().await?;
    Ok(expired_polls(&candidates, now))
}

/// Close every open poll whose end time is at or before `now`, refreshing
/// its `updated_at`. Returns the IDs of the polls this call closed.
///
/// Each write is conditional on the poll still being open, so a poll closed
/// by a concurrent sweep (or an admin edit) in the meantime is left alone
/// and not reported.
pub async fn close_expired_polls(polls: &Coll<PollSchedule>, now: DateTime<Utc>) -> Result<Vec<Id>> {
    let expired = find_expired_polls(polls, now).await?;
    let update = doc! {
        "$set": {
            "status": PollStatus::Open.expire(),
            "updated_at": BsonDateTime::from_chrono(now),
        }
    };

    let mut closed = Vec::with_capacity(expired.len());
    for id in expired {
        let filter = doc! {
            "_id": id,
            "status": PollStatus::Open,
        };
        let result = polls.update_one(filter, update.clone(), None).await?;
        if result.modified_count == 1 {
            closed.push(id);
        }
    }

    if !closed.is_empty() {
        info!("Closed {} expired poll(s)", closed.len());
        debug!("Expired polls: {closed:?}");
    }
    Ok(closed)
}
