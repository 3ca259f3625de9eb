mod base;
mod reconciler;
mod sweeper;

pub use base::{NewPoll, Poll, PollCore};
pub use reconciler::{close_expired_polls, expired_polls, find_expired_polls, PollSchedule};
pub use sweeper::PollSweeperFairing;
