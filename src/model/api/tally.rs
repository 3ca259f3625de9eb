use serde::{Deserialize, Serialize};

use crate::model::{
    api::id::ApiId,
    common::poll::{OptionText, PollStatus, Tally},
    db::poll::Poll,
};

/// Current results of a poll, as seen by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TallyResponse {
    pub poll_id: ApiId,
    pub status: PollStatus,
    /// Votes per option, every option present.
    pub counts: Tally,
    /// What the caller voted for, if they are signed in and have voted.
    pub selected_option: Option<OptionText>,
    pub has_submitted: bool,
}

impl TallyResponse {
    pub fn new(poll: &Poll, counts: Tally, selected_option: Option<OptionText>) -> Self {
        Self {
            poll_id: poll.id.into(),
            status: poll.status,
            counts,
            has_submitted: selected_option.is_some(),
            selected_option,
        }
    }
}
