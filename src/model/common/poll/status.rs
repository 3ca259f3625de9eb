use std::fmt::{Display, Formatter};
use std::str::FromStr;

use mongodb::bson::Bson;
use serde::{Deserialize, Serialize};

/// States in the Poll lifecycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollStatus {
    /// Under construction, only visible to admins.
    Draft,
    /// Accepting votes. Visible to all.
    Open,
    /// No longer accepting votes, results still visible to all.
    Closed,
}

impl PollStatus {
    pub const ALL: [PollStatus; 3] = [Self::Draft, Self::Open, Self::Closed];

    /// Can a vote be cast while the poll is in this state?
    pub fn accepts_votes(self) -> bool {
        self == Self::Open
    }

    /// Is a poll in this state visible on the public listing?
    pub fn is_public(self) -> bool {
        matches!(self, Self::Open | Self::Closed)
    }

    /// The only transition the reconciler ever makes.
    pub fn expire(self) -> Self {
        match self {
            Self::Open => Self::Closed,
            other => other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

impl Display for PollStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PollStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("Status must be one of draft, open or closed, not '{s}'"))
    }
}

impl From<PollStatus> for Bson {
    fn from(status: PollStatus) -> Self {
        Bson::String(status.as_str().to_string())
    }
}
