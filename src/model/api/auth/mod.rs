mod session;
mod token;
mod user;

pub use session::{Principal, Session};
pub use token::{AuthToken, AUTH_TOKEN_COOKIE};
pub use user::Rights;
