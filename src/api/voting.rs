use rocket::{serde::json::Json, Route, State};

use crate::{
    clock::SharedClock,
    error::{Error, Result},
    model::{
        api::{auth::Session, tally::TallyResponse, vote::VoteRequest},
        db::{
            poll::{close_expired_polls, Poll, PollSchedule},
            vote::{NewVote, Vote},
        },
        mongodb::{Coll, Id},
    },
};

use super::{find_poll, parse_body, Body};

pub fn routes() -> Vec<Route> {
    routes![poll_tally, cast_vote]
}

/// Current counts for a poll, plus the caller's own vote if they are signed in.
#[get("/polls/<poll_id>/tally")]
async fn poll_tally(
    poll_id: Id,
    session: Session,
    clock: &State<SharedClock>,
    schedules: Coll<PollSchedule>,
    polls: Coll<Poll>,
    votes: Coll<Vote>,
) -> Result<Json<TallyResponse>> {
    close_expired_polls(&schedules, clock.now()).await?;

    let poll = find_poll(&polls, poll_id).await?;
    if !poll.status.is_public() {
        return Err(Error::not_found(format!("Poll {poll_id}")));
    }
    let counts = Vote::tally(&votes, &poll).await?;
    let selected = match session.principal() {
        Some(principal) => Vote::selected_option(&votes, poll.id, &principal.user_id).await?,
        None => None,
    };
    Ok(Json(TallyResponse::new(&poll, counts, selected)))
}

#[post("/polls/<poll_id>/vote", data = "<vote>")]
async fn cast_vote(
    poll_id: Id,
    vote: Body<'_, VoteRequest>,
    session: Session,
    clock: &State<SharedClock>,
    schedules: Coll<PollSchedule>,
    polls: Coll<Poll>,
    new_votes: Coll<NewVote>,
    votes: Coll<Vote>,
) -> Result<Json<TallyResponse>> {
    let principal = session.authenticated()?;

    // Status must be current before we look at it.
    let now = clock.now();
    close_expired_polls(&schedules, now).await?;

    let option = parse_body(vote)?.option()?;
    let poll = find_poll(&polls, poll_id).await?;
    if !poll.status.accepts_votes() {
        return Err(Error::PollClosed(poll_id));
    }
    if !poll.has_option(&option) {
        return Err(Error::InvalidOption(option));
    }

    // The unique index decides the winner of any race; never check first.
    let vote = NewVote::new(poll.id, principal.user_id.clone(), option, now);
    if !vote.insert_if_absent(&new_votes).await? {
        return Err(Error::Conflict);
    }

    let counts = Vote::tally(&votes, &poll).await?;
    Ok(Json(TallyResponse::new(&poll, counts, Some(vote.option_text))))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use mongodb::Database;
    use rocket::{
        futures::future::join_all,
        http::{ContentType, Status},
        local::asynchronous::{Client, LocalResponse},
        serde::json::serde_json::json,
    };

    use crate::{
        error::ErrorBody,
        model::{
            api::{
                auth::AuthToken,
                poll::{PollDescription, PollForm},
            },
            common::poll::PollStatus,
        },
    };

    use super::*;

    async fn vote_as<'c>(client: &'c Client, user: &str, poll_id: Id, option: &str) -> LocalResponse<'c> {
        client
            .post(uri!(cast_vote(poll_id)))
            .header(ContentType::JSON)
            .cookie(AuthToken::user_example(user).cookie_for(client))
            .body(json!({ "option": option }).to_string())
            .dispatch()
            .await
    }

    async fn tally_as(client: &Client, user: Option<&str>, poll_id: Id) -> TallyResponse {
        let mut request = client.get(uri!(poll_tally(poll_id)));
        if let Some(user) = user {
            request = request.cookie(AuthToken::user_example(user).cookie_for(client));
        }
        let response = request.dispatch().await;
        assert_eq!(Status::Ok, response.status());
        response.into_json::<TallyResponse>().await.unwrap()
    }

    async fn error_code(response: LocalResponse<'_>) -> String {
        response.into_json::<ErrorBody>().await.unwrap().error
    }

    #[backend_test]
    async fn create_open_vote_conflict(client: Client) {
        let admin = AuthToken::admin_example().cookie_for(&client);

        // Create a draft.
        let form = json!({
            "title": "T",
            "description": "D",
            "prompt": "P",
            "options": ["Yes", "No"],
        });
        let response = client
            .post("/admin/polls")
            .header(ContentType::JSON)
            .cookie(admin.clone())
            .body(form.to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Created, response.status());
        let poll = response.into_json::<PollDescription>().await.unwrap();
        assert_eq!(poll.status, PollStatus::Draft);

        // Drafts don't take votes.
        let response = vote_as(&client, "alice", *poll.id, "Yes").await;
        assert_eq!(Status::Conflict, response.status());
        assert_eq!(error_code(response).await, "poll_closed");

        // Open it.
        let mut form = PollForm::example().with_status(PollStatus::Open);
        form.starts_at = None;
        form.ends_at = None;
        let response = client
            .put(format!("/admin/polls/{}", poll.id))
            .header(ContentType::JSON)
            .cookie(admin)
            .body(json!(form).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());

        // First vote counts.
        let response = vote_as(&client, "alice", *poll.id, "Yes").await;
        assert_eq!(Status::Ok, response.status());
        let tally = response.into_json::<TallyResponse>().await.unwrap();
        assert_eq!(tally.counts.get("Yes"), Some(1));
        assert_eq!(tally.counts.get("No"), Some(0));
        assert_eq!(tally.selected_option.as_deref(), Some("Yes"));
        assert!(tally.has_submitted);

        // Second vote by the same user is rejected, even for another option.
        let response = vote_as(&client, "alice", *poll.id, "No").await;
        assert_eq!(Status::Conflict, response.status());
        assert_eq!(error_code(response).await, "already_voted");
        let tally = tally_as(&client, Some("alice"), *poll.id).await;
        assert_eq!(tally.counts.get("Yes"), Some(1));
        assert_eq!(tally.counts.get("No"), Some(0));
        assert_eq!(tally.selected_option.as_deref(), Some("Yes"));

        // Options outside the poll are rejected.
        let response = vote_as(&client, "bob", *poll.id, "Maybe").await;
        assert_eq!(Status::UnprocessableEntity, response.status());
        assert_eq!(error_code(response).await, "invalid_option");
    }

    #[backend_test]
    async fn expired_poll_flips_on_read(client: Client, polls: Coll<Poll>) {
        let poll = Poll::expired_example();
        polls.insert_one(&poll, None).await.unwrap();

        let tally = tally_as(&client, None, poll.id).await;
        assert_eq!(tally.status, PollStatus::Closed);
        let stored = polls.find_one(poll.id.as_doc(), None).await.unwrap().unwrap();
        assert_eq!(stored.status, PollStatus::Closed);

        let response = vote_as(&client, "alice", poll.id, "Yes").await;
        assert_eq!(Status::Conflict, response.status());
        assert_eq!(error_code(response).await, "poll_closed");

        // And it stays closed.
        let tally = tally_as(&client, None, poll.id).await;
        assert_eq!(tally.status, PollStatus::Closed);
    }

    #[backend_test]
    async fn anonymous_tally(client: Client, polls: Coll<Poll>, new_votes: Coll<NewVote>) {
        let poll = Poll::example(PollStatus::Open);
        polls.insert_one(&poll, None).await.unwrap();
        new_votes
            .insert_one(NewVote::new(poll.id, "u1".into(), "No".into(), Utc::now()), None)
            .await
            .unwrap();

        let tally = tally_as(&client, None, poll.id).await;
        assert_eq!(tally.selected_option, None);
        assert!(!tally.has_submitted);
        assert_eq!(tally.counts.get("Yes"), Some(0));
        assert_eq!(tally.counts.get("No"), Some(1));

        // Signed in but hasn't voted.
        let tally = tally_as(&client, Some("u2"), poll.id).await;
        assert!(!tally.has_submitted);
        // Signed in and has voted.
        let tally = tally_as(&client, Some("u1"), poll.id).await;
        assert_eq!(tally.selected_option.as_deref(), Some("No"));
    }

    #[backend_test]
    async fn parallel_duplicates_conflict(client: Client, db: Database, polls: Coll<Poll>) {
        let poll = Poll::example(PollStatus::Open);
        polls.insert_one(&poll, None).await.unwrap();

        const ATTEMPTS: usize = 12;
        let responses = join_all((0..ATTEMPTS).map(|_| vote_as(&client, "carol", poll.id, "Yes"))).await;
        let statuses = responses.iter().map(|r| r.status()).collect::<Vec<_>>();
        let ok = statuses.iter().filter(|s| **s == Status::Ok).count();
        let conflicts = statuses.iter().filter(|s| **s == Status::Conflict).count();
        assert_eq!(ok, 1);
        assert_eq!(conflicts, ATTEMPTS - 1);

        let stored = Coll::<Vote>::from_db(&db).count_documents(None, None).await.unwrap();
        assert_eq!(stored, 1);
        let tally = tally_as(&client, None, poll.id).await;
        assert_eq!(tally.counts.total(), 1);
    }

    #[backend_test]
    async fn vote_preconditions(client: Client, polls: Coll<Poll>) {
        let poll = Poll::example(PollStatus::Open);
        polls.insert_one(&poll, None).await.unwrap();

        // No session.
        let response = client
            .post(uri!(cast_vote(poll.id)))
            .header(ContentType::JSON)
            .body(json!({ "option": "Yes" }).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());
        assert_eq!(error_code(response).await, "unauthenticated");

        // Blank option.
        let response = vote_as(&client, "dave", poll.id, "   ").await;
        assert_eq!(Status::BadRequest, response.status());
        assert_eq!(error_code(response).await, "invalid_input");

        // Missing option.
        let response = client
            .post(uri!(cast_vote(poll.id)))
            .header(ContentType::JSON)
            .cookie(AuthToken::user_example("dave").cookie_for(&client))
            .body("{}")
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());

        // Unknown poll.
        let response = vote_as(&client, "dave", Id::new(), "Yes").await;
        assert_eq!(Status::NotFound, response.status());
        assert_eq!(error_code(response).await, "not_found");

        // None of that recorded anything.
        let tally = tally_as(&client, Some("dave"), poll.id).await;
        assert!(!tally.has_submitted);
        assert_eq!(tally.counts.total(), 0);
    }

    #[backend_test]
    async fn tally_ignores_removed_options(client: Client, polls: Coll<Poll>, new_votes: Coll<NewVote>) {
        let mut poll = Poll::example(PollStatus::Closed);
        poll.options = vec!["Yes".into(), "No".into()];
        polls.insert_one(&poll, None).await.unwrap();
        let ballots = [("u1", "Yes"), ("u2", "Dropped"), ("u3", "No"), ("u4", "Yes")]
            .map(|(user, option)| NewVote::new(poll.id, user.into(), option.into(), Utc::now()));
        new_votes.insert_many(&ballots, None).await.unwrap();

        let tally = tally_as(&client, None, poll.id).await;
        assert_eq!(tally.counts.get("Yes"), Some(2));
        assert_eq!(tally.counts.get("No"), Some(1));
        assert_eq!(tally.counts.get("Dropped"), None);
        assert_eq!(tally.counts.total(), 3);

        let response = client.get(uri!(poll_tally(Id::new()))).dispatch().await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test]
    async fn draft_tally_is_not_found(client: Client, polls: Coll<Poll>) {
        let draft = Poll::example(PollStatus::Draft);
        polls.insert_one(&draft, None).await.unwrap();

        let response = client.get(uri!(poll_tally(draft.id))).dispatch().await;
        assert_eq!(Status::NotFound, response.status());
        assert_eq!(error_code(response).await, "not_found");

        // Signed in makes no difference.
        let response = client
            .get(uri!(poll_tally(draft.id)))
            .cookie(AuthToken::user_example("u1").cookie_for(&client))
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
    }
}
