mod status;
mod tally;

pub use status::PollStatus;
pub use tally::Tally;

/// Our option identifiers are the option texts themselves.
pub type OptionText = String;
/// User IDs are issued by the external session provider.
pub type UserId = String;
