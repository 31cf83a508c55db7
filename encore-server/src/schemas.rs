//! Request bodies accepted by the endpoints, along with the
//! [ValidatedJson] extractor that rejects invalid ones.

use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::StatusCode,
    Json,
};
use encore_lobby::LiveDifficulty;
use serde::{de::DeserializeOwned, Deserialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RegisterSchema {
    #[validate(length(max = 255))]
    pub name: Option<String>,
    pub leader_card_id: Option<i64>,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateUserSchema {
    #[validate(length(max = 255))]
    pub name: Option<String>,
    pub leader_card_id: Option<i64>,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewRoomSchema {
    #[validate(range(min = 1))]
    pub live_id: i64,
    pub live_difficulty: LiveDifficultySchema,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct JoinRoomSchema {
    pub live_difficulty: LiveDifficultySchema,
}

#[derive(Debug, Clone, Copy, ToSchema, Deserialize)]
pub enum LiveDifficultySchema {
    Normal,
    Hard,
}

impl From<LiveDifficultySchema> for LiveDifficulty {
    fn from(value: LiveDifficultySchema) -> Self {
        match value {
            LiveDifficultySchema::Normal => Self::Normal,
            LiveDifficultySchema::Hard => Self::Hard,
        }
    }
}

/// An action performed on a room by one of its members
#[derive(Debug, ToSchema, Deserialize)]
#[serde(rename_all = "camelCase", tag = "action")]
pub enum RoomActionSchema {
    /// Start the live. Host only.
    Start,
    /// Leave the room
    Leave,
    /// Report the play results after finishing the live
    #[serde(rename_all = "camelCase")]
    Finish {
        judge_count_perfect: i64,
        judge_count_great: i64,
        judge_count_good: i64,
        judge_count_bad: i64,
        judge_count_miss: i64,
        score: i64,
    },
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListRoomsQuery {
    /// The live to list rooms for. Omitted or 0 lists every room.
    pub live_id: Option<i64>,
}

pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let extracted_json: Json<T> = Json::from_request(req, state)
            .await
            .map_err(|_| (StatusCode::BAD_REQUEST, "JSON parse failed"))?;

        extracted_json
            .0
            .validate()
            .map_err(|_| (StatusCode::BAD_REQUEST, "Request body is invalid"))?;

        Ok(Self(extracted_json.0))
    }
}
