use axum_extra::extract::{
    cookie::{Cookie, SameSite},
    SignedCookieJar,
};
use time::Duration;

pub const SESSION_COOKIE: &str = "osu_session";
pub const STATE_COOKIE: &str = "osu_oauth_state";

/// Lifetime of the one-time OAuth state.
const STATE_MAX_AGE_MINUTES: i64 = 10;

pub fn state_cookie(state: &str, secure: bool) -> Cookie<'static> {
    Cookie::build((STATE_COOKIE, state.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(Duration::minutes(STATE_MAX_AGE_MINUTES))
        .build()
}

pub fn session_cookie(session_id: &str, max_age_secs: u64, secure: bool) -> Cookie<'static> {
    let max_age = i64::try_from(max_age_secs).unwrap_or(i64::MAX);
    Cookie::build((SESSION_COOKIE, session_id.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(Duration::seconds(max_age))
        .build()
}

/// Removal cookie; the path must match the one the cookie was set with.
pub fn removal(name: &'static str) -> Cookie<'static> {
    Cookie::build(name).path("/").build()
}

pub fn session_id(jar: &SignedCookieJar) -> Option<String> {
    jar.get(SESSION_COOKIE).map(|c| c.value().to_string())
}

pub fn oauth_state(jar: &SignedCookieJar) -> Option<String> {
    jar.get(STATE_COOKIE).map(|c| c.value().to_string())
}
