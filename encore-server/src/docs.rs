use std::borrow::BorrowMut;

use axum::{response::IntoResponse, Json};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::{auth, rooms, schemas, serialized};

#[derive(OpenApi)]
#[openapi(
    modifiers(&Security),
    info(
        description = "encore-server exposes endpoints to interact with this encore instance"
    ),
    paths(
        auth::register,
        auth::me,
        auth::update_user,
        rooms::list_rooms,
        rooms::create_room,
        rooms::room,
        rooms::join_room,
        rooms::room_results,
        rooms::perform_room_action,
    ),
    components(schemas(
        schemas::RegisterSchema,
        schemas::UpdateUserSchema,
        schemas::NewRoomSchema,
        schemas::JoinRoomSchema,
        schemas::RoomActionSchema,
        schemas::LiveDifficultySchema,
        serialized::User,
        serialized::RegisterResult,
        serialized::Room,
        serialized::RoomMember,
        serialized::WaitRoom,
        serialized::RoomStatus,
        serialized::JoinResult,
        serialized::PlayResult,
    ))
)]
pub struct ApiDoc;

struct Security;

impl Modify for Security {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.borrow_mut() {
            let scheme = HttpBuilder::new()
                .scheme(HttpAuthScheme::Bearer)
                .bearer_format("Bearer <token>")
                .build();

            components.add_security_scheme("BearerAuth", SecurityScheme::Http(scheme))
        }
    }
}

pub async fn docs() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}
