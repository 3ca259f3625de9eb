use std::convert::Infallible;

use log::{debug, error};
use rocket::{
    request::{FromRequest, Outcome},
    Request,
};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::common::poll::UserId;

use super::token::{AuthToken, AUTH_TOKEN_COOKIE};

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub email: String,
    pub is_admin: bool,
}

impl From<AuthToken> for Principal {
    fn from(token: AuthToken) -> Self {
        Self {
            user_id: token.user_id,
            email: token.email,
            is_admin: token.rights.is_admin(),
        }
    }
}

/// Whoever is making the request, if anyone.
///
/// As a request guard this never fails: a missing, malformed or expired
/// token simply gives an anonymous session. Handlers then state what they
/// require through [`Session::authenticated`] or [`Session::admin`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session(Option<Principal>);

impl Session {
    pub fn anonymous() -> Self {
        Self(None)
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.0.as_ref()
    }

    /// Require a signed-in caller.
    pub fn authenticated(&self) -> Result<&Principal> {
        self.principal().ok_or(Error::Unauthenticated)
    }

    /// Require a signed-in administrator.
    pub fn admin(&self) -> Result<&Principal> {
        let principal = self.authenticated()?;
        if principal.is_admin {
            Ok(principal)
        } else {
            Err(Error::Forbidden)
        }
    }
}

impl From<Principal> for Session {
    fn from(principal: Principal) -> Self {
        Self(Some(principal))
    }
}

/// The raw token from the session cookie, or failing that a bearer header.
fn raw_token(req: &Request<'_>) -> Option<String> {
    if let Some(cookie) = req.cookies().get(AUTH_TOKEN_COOKIE) {
        return Some(cookie.value().to_string());
    }
    req.headers()
        .get_one("Authorization")
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Session {
    type Error = Infallible;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let jwt = match raw_token(req) {
            Some(jwt) => jwt,
            None => return Outcome::Success(Session::anonymous()),
        };
        let config = match req.rocket().state::<Config>() {
            Some(config) => config,
            None => {
                error!("Config is not managed, treating every caller as anonymous");
                return Outcome::Success(Session::anonymous());
            }
        };
        match AuthToken::decode(&jwt, config) {
            Ok(token) => Outcome::Success(Principal::from(token).into()),
            Err(e) => {
                debug!("Ignoring unusable session token: {e}");
                Outcome::Success(Session::anonymous())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::model::api::auth::Rights;

    #[test]
    fn requirements() {
        let anonymous = Session::anonymous();
        assert!(anonymous.principal().is_none());
        assert!(matches!(anonymous.authenticated(), Err(Error::Unauthenticated)));
        assert!(matches!(anonymous.admin(), Err(Error::Unauthenticated)));

        let user = Session::from(Principal::from(AuthToken::user_example("u1")));
        assert_eq!(user.authenticated().unwrap().user_id, "u1");
        assert!(matches!(user.admin(), Err(Error::Forbidden)));

        let admin = Session::from(Principal::from(AuthToken::new("a", "a@b.c", Rights::Admin)));
        assert!(admin.admin().unwrap().is_admin);
    }
}
