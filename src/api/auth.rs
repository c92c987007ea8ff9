use chrono::Utc;
use rocket::{
    http::{Cookie, CookieJar, Status},
    serde::json::Json,
    Route, State,
};

use crate::config::Config;
use crate::error::Result;
use crate::model::{
    api::{
        auth::{
            AuthToken, LoginRequest, Message, ProviderAssertion, ProviderSignInRequest,
            RegisterRequest, ResetConfirmRequest, ResetRequest, AUTH_TOKEN_COOKIE,
        },
        session::SessionView,
    },
    db::voter::Voter,
    identity::Normalizer,
    mail::Mailer,
    store::Store,
};
use crate::service::{identity::resolve_on_sign_in, password};

pub fn routes() -> Vec<Route> {
    routes![
        register,
        login,
        provider_sign_in,
        logout,
        session,
        request_reset,
        confirm_reset
    ]
}

/// Set the session cookie for `voter` and describe the new session.
fn start_session(cookies: &CookieJar<'_>, voter: &Voter, config: &Config) -> Result<Json<SessionView>> {
    let token = AuthToken::new(voter.canonical_identity.clone());
    cookies.add(token.into_cookie(config)?);
    Ok(Json(SessionView::from(voter)))
}

#[post("/auth/register", data = "<request>", format = "json")]
pub async fn register(
    request: Json<RegisterRequest>,
    cookies: &CookieJar<'_>,
    store: &State<Store>,
    normalizer: &State<Normalizer>,
    config: &State<Config>,
) -> Result<Json<SessionView>> {
    let voter = password::register(
        store.inner().as_ref(),
        normalizer,
        &request.name,
        &request.email,
        &request.password,
        Utc::now(),
    )
    .await?;
    start_session(cookies, &voter, config)
}

#[post("/auth/login", data = "<request>", format = "json")]
pub async fn login(
    request: Json<LoginRequest>,
    cookies: &CookieJar<'_>,
    store: &State<Store>,
    normalizer: &State<Normalizer>,
    config: &State<Config>,
) -> Result<Json<SessionView>> {
    let voter = password::login(
        store.inner().as_ref(),
        normalizer,
        &request.email,
        &request.password,
    )
    .await?;
    start_session(cookies, &voter, config)
}

/// Complete a Google or LinkedIn sign-in, given the assertion produced by
/// the provider handshake.
#[post("/auth/provider", data = "<request>", format = "json")]
pub async fn provider_sign_in(
    request: Json<ProviderSignInRequest>,
    cookies: &CookieJar<'_>,
    store: &State<Store>,
    normalizer: &State<Normalizer>,
    config: &State<Config>,
) -> Result<Json<SessionView>> {
    let assertion = ProviderAssertion::verify(&request.assertion, config)?;
    let voter = resolve_on_sign_in(
        store.inner().as_ref(),
        normalizer,
        assertion.provider.into(),
        &assertion.email,
        assertion.profile(),
        Utc::now(),
    )
    .await?;
    start_session(cookies, &voter, config)
}

#[delete("/auth")]
pub fn logout(cookies: &CookieJar) -> Status {
    cookies.remove(Cookie::named(AUTH_TOKEN_COOKIE));
    Status::Ok
}

#[get("/auth/session")]
pub fn session(session: SessionView) -> Json<SessionView> {
    Json(session)
}

/// Always succeeds with the same message, so the response reveals nothing
/// about which emails have accounts.
#[post("/auth/reset/request", data = "<request>", format = "json")]
pub async fn request_reset(
    request: Json<ResetRequest>,
    store: &State<Store>,
    mailer: &State<Mailer>,
    normalizer: &State<Normalizer>,
    config: &State<Config>,
) -> Json<Message> {
    let message = password::request_reset(
        store.inner().as_ref(),
        mailer.inner().as_ref(),
        normalizer,
        config,
        &request.email,
        Utc::now(),
    )
    .await;
    Json(Message::new(message))
}

#[post("/auth/reset/confirm", data = "<request>", format = "json")]
pub async fn confirm_reset(
    request: Json<ResetConfirmRequest>,
    store: &State<Store>,
) -> Result<Json<Message>> {
    password::confirm_reset(
        store.inner().as_ref(),
        &request.token,
        &request.password,
        Utc::now(),
    )
    .await?;
    Ok(Json(Message::new(
        "Password has been reset. You can now sign in with your new password.",
    )))
}
