use rocket::{
    http::Status,
    response::status::Custom,
    serde::json::{Error as JsonError, Json},
    Catcher, Request, Route,
};

use crate::error::{Error, ErrorBody, Result};
use crate::model::{
    db::poll::Poll,
    mongodb::{Coll, Id},
};

mod admin;
mod public;
mod voting;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(admin::routes());
    routes.extend(public::routes());
    routes.extend(voting::routes());
    routes
}

pub fn catchers() -> Vec<Catcher> {
    catchers![default_catcher]
}

/// A JSON request body that may have failed to parse.
type Body<'r, T> = std::result::Result<Json<T>, JsonError<'r>>;

/// Unwrap a JSON body, reporting parse failures as invalid input.
fn parse_body<T>(body: Body<'_, T>) -> Result<T> {
    match body {
        Ok(Json(value)) => Ok(value),
        Err(JsonError::Io(e)) => Err(Error::invalid(format!("Could not read request body: {e}"))),
        Err(JsonError::Parse(_, e)) => Err(Error::invalid(format!("Malformed request body: {e}"))),
    }
}

/// Load a poll of any status.
async fn find_poll(polls: &Coll<Poll>, poll_id: Id) -> Result<Poll> {
    polls
        .find_one(poll_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Poll {poll_id}")))
}

/// Failures that never reach a handler get the same JSON shape as those that do.
#[catch(default)]
fn default_catcher(status: Status, _req: &Request) -> Custom<Json<ErrorBody>> {
    let code = match status.code {
        400 | 422 => "invalid_input",
        401 => "unauthenticated",
        403 => "forbidden",
        404 => "not_found",
        500..=599 => "server_error",
        _ => "error",
    };
    let message = status.reason().unwrap_or("Unknown error");
    Custom(status, Json(ErrorBody::new(code, message)))
}
