use mongodb::{bson::doc, options::FindOptions};
use rocket::{futures::TryStreamExt, response::status::Created, serde::json::Json, Route, State};

use crate::{
    clock::SharedClock,
    error::{Error, Result},
    model::{
        api::{
            auth::Session,
            poll::{PollDescription, PollForm},
        },
        db::poll::{close_expired_polls, NewPoll, Poll, PollSchedule},
        mongodb::{Coll, Id},
    },
};

use super::{find_poll, parse_body, Body};

pub fn routes() -> Vec<Route> {
    routes![admin_polls, admin_poll, create_poll, update_poll]
}

#[get("/admin/polls")]
async fn admin_polls(
    session: Session,
    clock: &State<SharedClock>,
    schedules: Coll<PollSchedule>,
    polls: Coll<Poll>,
) -> Result<Json<Vec<PollDescription>>> {
    session.admin()?;
    close_expired_polls(&schedules, clock.now()).await?;

    let newest_first = FindOptions::builder().sort(doc! { "created_at": -1 }).build();
    let polls: Vec<Poll> = polls.find(None, newest_first).await?.try_collect().await?;
    Ok(Json(polls.into_iter().map(Into::into).collect()))
}

#[get("/admin/polls/<poll_id>")]
async fn admin_poll(
    poll_id: Id,
    session: Session,
    clock: &State<SharedClock>,
    schedules: Coll<PollSchedule>,
    polls: Coll<Poll>,
) -> Result<Json<PollDescription>> {
    session.admin()?;
    close_expired_polls(&schedules, clock.now()).await?;

    let poll = find_poll(&polls, poll_id).await?;
    Ok(Json(poll.into()))
}

#[post("/admin/polls", data = "<form>")]
async fn create_poll(
    form: Body<'_, PollForm>,
    session: Session,
    clock: &State<SharedClock>,
    polls: Coll<Poll>,
) -> Result<Created<Json<PollDescription>>> {
    session.admin()?;
    let fields = parse_body(form)?.validate()?;

    let poll = Poll {
        id: Id::new(),
        poll: NewPoll::new(fields, clock.now()),
    };
    polls.insert_one(&poll, None).await?;

    // Read back what was stored, at the store's precision.
    let poll = find_poll(&polls, poll.id).await?;
    let location = uri!(admin_poll(poll.id)).to_string();
    Ok(Created::new(location).body(Json(poll.into())))
}

/// Overwrite every editable field of a poll. The caller must send the whole form.
#[put("/admin/polls/<poll_id>", data = "<form>")]
async fn update_poll(
    poll_id: Id,
    form: Body<'_, PollForm>,
    session: Session,
    clock: &State<SharedClock>,
    new_polls: Coll<NewPoll>,
    schedules: Coll<PollSchedule>,
    polls: Coll<Poll>,
) -> Result<Json<PollDescription>> {
    session.admin()?;
    let form = parse_body(form)?;
    let fields = form.validate()?;
    let status = form.status()?;

    let now = clock.now();
    let update = NewPoll::edit_update(fields, status, now);
    let result = new_polls.update_one(poll_id.as_doc(), update, None).await?;
    if result.matched_count == 0 {
        return Err(Error::not_found(format!("Poll {poll_id}")));
    }

    // An edit may have opened a poll whose end time has already passed.
    close_expired_polls(&schedules, now).await?;
    let poll = find_poll(&polls, poll_id).await?;
    Ok(Json(poll.into()))
}
