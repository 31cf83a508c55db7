//! All schemas that are exposed from endpoints are defined here
//! along with the ToSerialized impls

use encore_lobby::{
    JoinRoomResult, MemberResult, RoomData, RoomMember as LobbyRoomMember, RoomSnapshot, UserData,
    WaitRoomStatus, MAX_USER_COUNT,
};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct User {
    id: i64,
    name: Option<String>,
    leader_card_id: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RegisterResult {
    token: String,
    user: User,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Room {
    room_id: i64,
    live_id: i64,
    joined_user_count: i64,
    max_user_count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RoomMember {
    user_id: i64,
    name: Option<String>,
    leader_card_id: Option<i64>,
    live_difficulty: i64,
    is_host: bool,
    is_me: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WaitRoom {
    status: RoomStatus,
    users: Vec<RoomMember>,
}

#[derive(Debug, Serialize, ToSchema)]
pub enum RoomStatus {
    Waiting,
    LiveStart,
    Dissolution,
}

#[derive(Debug, Serialize, ToSchema)]
pub enum JoinResult {
    Ok,
    RoomFull,
    Disbanded,
    OtherError,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PlayResult {
    user_id: i64,
    judge_count_perfect: i64,
    judge_count_great: i64,
    judge_count_good: i64,
    judge_count_bad: i64,
    judge_count_miss: i64,
    score: i64,
}

/// Helper trait to convert any type into a serialized version
pub trait ToSerialized<T>
where
    T: Serialize,
{
    fn to_serialized(&self) -> T;
}

impl<I, O> ToSerialized<Vec<O>> for Vec<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Vec<O> {
        self.iter().map(|x| x.to_serialized()).collect()
    }
}

impl ToSerialized<User> for UserData {
    fn to_serialized(&self) -> User {
        User {
            id: self.id,
            name: self.name.clone(),
            leader_card_id: self.leader_card_id,
        }
    }
}

impl ToSerialized<RegisterResult> for UserData {
    fn to_serialized(&self) -> RegisterResult {
        RegisterResult {
            token: self.token.clone().unwrap_or_default(),
            user: self.to_serialized(),
        }
    }
}

impl ToSerialized<Room> for RoomData {
    fn to_serialized(&self) -> Room {
        Room {
            room_id: self.room_id,
            live_id: self.live_id,
            joined_user_count: self.joined_user_count,
            max_user_count: MAX_USER_COUNT,
        }
    }
}

impl ToSerialized<RoomMember> for LobbyRoomMember {
    fn to_serialized(&self) -> RoomMember {
        RoomMember {
            user_id: self.user.id,
            name: self.user.name.clone(),
            leader_card_id: self.user.leader_card_id,
            live_difficulty: self.live_difficulty,
            is_host: self.is_host,
            is_me: self.is_me,
        }
    }
}

impl ToSerialized<WaitRoom> for RoomSnapshot {
    fn to_serialized(&self) -> WaitRoom {
        WaitRoom {
            status: self.status.to_serialized(),
            users: self.members.to_serialized(),
        }
    }
}

impl ToSerialized<RoomStatus> for WaitRoomStatus {
    fn to_serialized(&self) -> RoomStatus {
        match self {
            WaitRoomStatus::Waiting => RoomStatus::Waiting,
            WaitRoomStatus::LiveStart => RoomStatus::LiveStart,
            WaitRoomStatus::Dissolution => RoomStatus::Dissolution,
        }
    }
}

impl ToSerialized<JoinResult> for JoinRoomResult {
    fn to_serialized(&self) -> JoinResult {
        match self {
            JoinRoomResult::Ok => JoinResult::Ok,
            JoinRoomResult::RoomFull => JoinResult::RoomFull,
            JoinRoomResult::Disbanded => JoinResult::Disbanded,
            JoinRoomResult::OtherError => JoinResult::OtherError,
        }
    }
}

impl ToSerialized<PlayResult> for MemberResult {
    fn to_serialized(&self) -> PlayResult {
        PlayResult {
            user_id: self.user_id,
            judge_count_perfect: self.result.judge_count_perfect,
            judge_count_great: self.result.judge_count_great,
            judge_count_good: self.result.judge_count_good,
            judge_count_bad: self.result.judge_count_bad,
            judge_count_miss: self.result.judge_count_miss,
            score: self.result.score,
        }
    }
}
