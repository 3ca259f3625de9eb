use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use rocket::{
    http::{Cookie, SameSite},
    time::Duration,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Result;
use crate::model::common::poll::UserId;

use super::user::Rights;

pub const AUTH_TOKEN_COOKIE: &str = "auth_token";

/// A session token issued by the session provider, representing a specific
/// user with specific rights.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    #[serde(rename = "sub")]
    pub user_id: UserId,
    pub email: String,
    #[serde(rename = "rgt")]
    pub rights: Rights,
}

impl AuthToken {
    pub fn new(user_id: impl Into<UserId>, email: impl Into<String>, rights: Rights) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
            rights,
        }
    }

    /// Sign this token into a JWT that expires `auth_ttl` after `now`.
    pub fn encode(self, config: &Config, now: DateTime<Utc>) -> Result<String> {
        let claims = Claims {
            token: self,
            expire_at: now + config.auth_ttl(),
        };
        let jwt = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )?;
        Ok(jwt)
    }

    /// Verify and decode a JWT, rejecting expired ones.
    pub fn decode(jwt: &str, config: &Config) -> Result<Self> {
        let token = jsonwebtoken::decode(
            jwt,
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|claims: TokenData<Claims>| claims.claims.token)?;
        Ok(token)
    }

    /// Sign this token into a cookie.
    pub fn into_cookie(self, config: &Config, now: DateTime<Utc>) -> Result<Cookie<'static>> {
        let jwt = self.encode(config, now)?;
        Ok(Cookie::build(AUTH_TOKEN_COOKIE, jwt)
            .max_age(Duration::seconds(config.auth_ttl().num_seconds()))
            .http_only(true)
            .same_site(SameSite::Strict)
            .finish())
    }
}

/// JWT claims: the token itself plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims {
    #[serde(flatten)]
    token: AuthToken,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration as ChronoDuration;

    use crate::error::Error;

    #[test]
    fn round_trip() {
        let config = Config::example();
        let jwt = AuthToken::admin_example().encode(&config, Utc::now()).unwrap();
        let token = AuthToken::decode(&jwt, &config).unwrap();
        assert_eq!(token, AuthToken::admin_example());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let jwt = AuthToken::user_example("u1")
            .encode(&Config::example(), Utc::now())
            .unwrap();
        let other = Config::new("a different secret", 3600, 0);
        assert!(matches!(AuthToken::decode(&jwt, &other), Err(Error::Jwt(_))));
    }

    #[test]
    fn expired_is_rejected() {
        let config = Config::example();
        let long_ago = Utc::now() - ChronoDuration::days(2);
        let jwt = AuthToken::user_example("u1").encode(&config, long_ago).unwrap();
        assert!(AuthToken::decode(&jwt, &config).is_err());
    }

    #[test]
    fn cookie_carries_jwt() {
        let config = Config::example();
        let cookie = AuthToken::user_example("u1")
            .into_cookie(&config, Utc::now())
            .unwrap();
        assert_eq!(cookie.name(), AUTH_TOKEN_COOKIE);
        assert_eq!(
            AuthToken::decode(cookie.value(), &config).unwrap().user_id,
            "u1"
        );
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl Config {
        pub fn example() -> Self {
            Config::new("test secret", 3600, 0)
        }
    }

    impl AuthToken {
        pub fn admin_example() -> Self {
            Self::new("admin-1", "admin@example.org", Rights::Admin)
        }

        pub fn user_example(user_id: &str) -> Self {
            Self::new(user_id, format!("{user_id}@example.org"), Rights::User)
        }

        /// A cookie signed with the config of the given test client.
        pub fn cookie_for(self, client: &rocket::local::asynchronous::Client) -> Cookie<'static> {
            let config = client.rocket().state::<Config>().unwrap();
            self.into_cookie(config, Utc::now()).unwrap()
        }
    }
}
