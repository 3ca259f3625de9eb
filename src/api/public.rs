use mongodb::bson::doc;
use rocket::{futures::TryStreamExt, serde::json::Json, Route, State};

use crate::{
    clock::SharedClock,
    error::{Error, Result},
    model::{
        api::poll::PollDescription,
        common::poll::PollStatus,
        db::poll::{close_expired_polls, Poll, PollSchedule},
        mongodb::{Coll, Id},
    },
};

use super::find_poll;

pub fn routes() -> Vec<Route> {
    routes![public_polls, public_poll]
}

/// Open and closed polls, most recently started first. Drafts are never listed.
#[get("/polls")]
async fn public_polls(
    clock: &State<SharedClock>,
    schedules: Coll<PollSchedule>,
    polls: Coll<Poll>,
) -> Result<Json<Vec<PollDescription>>> {
    close_expired_polls(&schedules, clock.now()).await?;

    let filter = doc! {
        "status": { "$in": [PollStatus::Open, PollStatus::Closed] },
    };
    let mut polls: Vec<Poll> = polls.find(filter, None).await?.try_collect().await?;
    Poll::sort_for_public(&mut polls);
    Ok(Json(polls.into_iter().map(Into::into).collect()))
}

#[get("/polls/<poll_id>")]
async fn public_poll(
    poll_id: Id,
    clock: &State<SharedClock>,
    schedules: Coll<PollSchedule>,
    polls: Coll<Poll>,
) -> Result<Json<PollDescription>> {
    close_expired_polls(&schedules, clock.now()).await?;

    let poll = find_poll(&polls, poll_id).await?;
    if !poll.status.is_public() {
        // Drafts don't exist as far as the public is concerned.
        return Err(Error::not_found(format!("Poll {poll_id}")));
    }
    Ok(Json(poll.into()))
}
