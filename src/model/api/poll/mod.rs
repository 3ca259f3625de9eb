mod desc;
mod spec;

pub use desc::PollDescription;
pub use spec::{OptionsInput, PollFields, PollForm};
