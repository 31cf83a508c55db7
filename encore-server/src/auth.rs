use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, State},
    http::{header, request::Parts, StatusCode},
    routing::{get, post, put},
    Json,
};
use encore_lobby::{NewProfile, UpdatedUser, UserData};

use crate::{
    context::ServerContext,
    errors::ServerResult,
    schemas::{RegisterSchema, UpdateUserSchema, ValidatedJson},
    serialized::{RegisterResult, ToSerialized, User},
    Router,
};

/// Wraps the authenticated [UserData] so [FromRequestParts] can be
/// implemented for it
pub struct Session(UserData);

impl Session {
    /// Returns the user of the session
    pub fn user(&self) -> UserData {
        self.0.clone()
    }
}

#[async_trait]
impl FromRequestParts<ServerContext> for Session {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServerContext,
    ) -> Result<Self, Self::Rejection> {
        let context = ServerContext::from_ref(state);

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|x| x.to_str().ok())
            .ok_or((StatusCode::UNAUTHORIZED, "Missing authorization"))?;

        let parts: Vec<_> = token.split_ascii_whitespace().collect();

        if parts.first() != Some(&"Bearer") {
            return Err((StatusCode::BAD_REQUEST, "Authorization must be Bearer"));
        }

        let token = parts.last().cloned().unwrap_or_default();

        let user = context
            .lobby
            .auth
            .user(token)
            .await
            .map_err(|_| (StatusCode::UNAUTHORIZED, "Invalid token"))?;

        Ok(Self(user))
    }
}

#[utoipa::path(
    post,
    path = "/v1/users",
    tag = "users",
    request_body = RegisterSchema,
    responses(
        (status = 200, body = RegisterResult)
    )
)]
pub(crate) async fn register(
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<RegisterSchema>,
) -> ServerResult<Json<RegisterResult>> {
    let user = context
        .lobby
        .auth
        .register(NewProfile {
            name: body.name,
            leader_card_id: body.leader_card_id,
        })
        .await?;

    Ok(Json(user.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/users/me",
    tag = "users",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = User)
    )
)]
pub(crate) async fn me(session: Session) -> Json<User> {
    Json(session.user().to_serialized())
}

#[utoipa::path(
    put,
    path = "/v1/users/me",
    tag = "users",
    request_body = UpdateUserSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = User)
    )
)]
pub(crate) async fn update_user(
    session: Session,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<UpdateUserSchema>,
) -> ServerResult<Json<User>> {
    let user = context
        .lobby
        .auth
        .update_user(UpdatedUser {
            id: session.user().id,
            name: body.name,
            leader_card_id: body.leader_card_id,
        })
        .await?;

    Ok(Json(user.to_serialized()))
}

pub fn router() -> Router {
    Router::new()
        .route("/", post(register))
        .route("/me", get(me))
        .route("/me", put(update_user))
}
