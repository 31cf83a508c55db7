use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json,
};
use encore_lobby::PlayResultData;

use crate::{
    auth::Session,
    context::ServerContext,
    errors::ServerResult,
    schemas::{JoinRoomSchema, ListRoomsQuery, NewRoomSchema, RoomActionSchema, ValidatedJson},
    serialized::{JoinResult, PlayResult, Room, ToSerialized, WaitRoom},
    Router,
};

#[utoipa::path(
    get,
    path = "/v1/rooms",
    tag = "rooms",
    params(ListRoomsQuery),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Room>)
    )
)]
pub(crate) async fn list_rooms(
    _session: Session,
    State(context): State<ServerContext>,
    Query(query): Query<ListRoomsQuery>,
) -> ServerResult<Json<Vec<Room>>> {
    let rooms = context
        .lobby
        .rooms
        .list(query.live_id.unwrap_or(0))
        .await?;

    Ok(Json(rooms.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/rooms",
    tag = "rooms",
    request_body = NewRoomSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Room)
    )
)]
pub(crate) async fn create_room(
    session: Session,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<NewRoomSchema>,
) -> ServerResult<Json<Room>> {
    let room = context
        .lobby
        .rooms
        .create(&session.user(), body.live_id, body.live_difficulty.into())
        .await?;

    Ok(Json(room.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/rooms/{id}",
    tag = "rooms",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = WaitRoom)
    )
)]
pub(crate) async fn room(
    session: Session,
    State(context): State<ServerContext>,
    Path(room_id): Path<i64>,
) -> ServerResult<Json<WaitRoom>> {
    let snapshot = context.lobby.rooms.wait(session.user().id, room_id).await?;

    Ok(Json(snapshot.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{id}/members",
    tag = "rooms",
    request_body = JoinRoomSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = JoinResult)
    )
)]
pub(crate) async fn join_room(
    session: Session,
    State(context): State<ServerContext>,
    Path(room_id): Path<i64>,
    ValidatedJson(body): ValidatedJson<JoinRoomSchema>,
) -> ServerResult<Json<JoinResult>> {
    let result = context
        .lobby
        .rooms
        .join(&session.user(), room_id, body.live_difficulty.into())
        .await?;

    Ok(Json(result.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/rooms/{id}/results",
    tag = "rooms",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<PlayResult>, description = "Empty until every member has reported their result")
    )
)]
pub(crate) async fn room_results(
    _session: Session,
    State(context): State<ServerContext>,
    Path(room_id): Path<i64>,
) -> ServerResult<Json<Vec<PlayResult>>> {
    let results = context.lobby.rooms.results(room_id).await?;

    Ok(Json(results.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{id}/actions",
    tag = "rooms",
    request_body = RoomActionSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Action was performed.")
    )
)]
pub(crate) async fn perform_room_action(
    session: Session,
    State(context): State<ServerContext>,
    Path(room_id): Path<i64>,
    Json(body): Json<RoomActionSchema>,
) -> ServerResult<()> {
    let user_id = session.user().id;

    match body {
        RoomActionSchema::Start => context.lobby.rooms.start(user_id, room_id).await?,
        RoomActionSchema::Leave => context.lobby.rooms.leave(user_id, room_id).await?,
        RoomActionSchema::Finish {
            judge_count_perfect,
            judge_count_great,
            judge_count_good,
            judge_count_bad,
            judge_count_miss,
            score,
        } => {
            context
                .lobby
                .rooms
                .finish(
                    user_id,
                    room_id,
                    PlayResultData {
                        judge_count_perfect,
                        judge_count_great,
                        judge_count_good,
                        judge_count_bad,
                        judge_count_miss,
                        score,
                    },
                )
                .await?
        }
    };

    Ok(())
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_rooms))
        .route("/", post(create_room))
        .route("/:id", get(room))
        .route("/:id/members", post(join_room))
        .route("/:id/results", get(room_results))
        .route("/:id/actions", post(perform_room_action))
}
