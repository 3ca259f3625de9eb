use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::common::poll::OptionText;

/// A request to vote in a poll.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VoteRequest {
    #[serde(default)]
    pub option: Option<String>,
}

impl VoteRequest {
    pub fn new(option: impl Into<String>) -> Self {
        Self {
            option: Some(option.into()),
        }
    }

    /// The chosen option, which must not be blank.
    pub fn option(self) -> Result<OptionText> {
        match self.option {
            Some(option) if !option.trim().is_empty() => Ok(option.trim().to_string()),
            _ => Err(Error::invalid("Choose an option to vote for")),
        }
    }
}
