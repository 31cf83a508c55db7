use async_trait::async_trait;
use thiserror::Error;

mod data;
pub use data::*;

mod sqlite;
pub use sqlite::*;

pub type Result<T> = std::result::Result<T, DatabaseError>;

#[derive(Debug, Error)]
pub enum DatabaseError {
    /// An unknown or internal error happened with the database
    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync>),
    /// A resource already exists
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        /// The resource in question
        resource: &'static str,
        /// The field that is conflicting
        field: &'static str,
        /// The conflicting value
        value: String,
    },
    /// A resource in the database doesn't exist
    #[error("{resource}:{identifier} doesn't exist")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
}

/// Helper trait to reduce boilerplate
pub trait IntoDatabaseError {
    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError;
    fn any(self) -> DatabaseError;
}

/// Helper trait to reduce boilerplate
pub trait DatabaseResult {
    /// Turns the Result into a conflict error if it's Ok()
    fn conflict_or_ok(self, resource: &'static str, field: &'static str, value: &str)
        -> Result<()>;
}

impl<T> DatabaseResult for Result<T> {
    fn conflict_or_ok(
        self,
        resource: &'static str,
        field: &'static str,
        value: &str,
    ) -> Result<()> {
        match self {
            Ok(_) => Err(DatabaseError::Conflict {
                resource,
                field,
                value: value.to_string(),
            }),
            Err(e) => match e {
                DatabaseError::NotFound {
                    resource: _,
                    identifier: _,
                } => Ok(()),
                e => Err(e),
            },
        }
    }
}

/// Represents a type that can fetch encore data from a database
#[async_trait]
pub trait Database: Send + Sync + 'static {
    async fn user_by_id(&self, user_id: PrimaryKey) -> Result<UserData>;
    async fn user_by_token(&self, token: &str) -> Result<UserData>;
    async fn create_user(&self, new_user: NewUser) -> Result<UserData>;
    async fn update_user(&self, updated_user: UpdatedUser) -> Result<UserData>;

    async fn room_by_id(&self, room_id: PrimaryKey) -> Result<RoomData>;
    /// Rooms playing the given live. A `live_id` of 0 returns every room.
    async fn rooms_by_live_id(&self, live_id: PrimaryKey) -> Result<Vec<RoomData>>;
    async fn create_room(&self, new_room: NewRoom) -> Result<RoomData>;
    async fn update_room_status(&self, room_id: PrimaryKey, status: WaitRoomStatus) -> Result<()>;

    async fn room_users(&self, room_id: PrimaryKey) -> Result<Vec<RoomUserData>>;
    async fn room_user(&self, room_id: PrimaryKey, user_id: PrimaryKey) -> Result<RoomUserData>;
    /// Adds a member to a room, keeping `joined_user_count` consistent.
    /// The capacity check, membership insert, and counter update happen
    /// in a single transaction.
    async fn join_room(&self, new_member: NewRoomUser, max_user_count: i64) -> Result<JoinOutcome>;
    /// Removes a member from a room, keeping `joined_user_count` consistent
    /// and transferring the host role if the host left. The room is marked
    /// as dissolved when the last member leaves.
    async fn leave_room(&self, room_id: PrimaryKey, user_id: PrimaryKey) -> Result<LeaveOutcome>;
    async fn store_room_user_result(&self, result: NewRoomUserResult) -> Result<()>;
}

/// What happened during a transactional room join
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined,
    /// The room is at capacity
    Full,
    /// The user already has a membership row in this room
    AlreadyMember,
    /// The room row does not exist
    Missing,
    /// The room exists but is not waiting for members
    Unavailable { status: i64 },
}

/// What happened during a transactional room leave
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    Left {
        remaining: i64,
        /// The member the host role was transferred to, if the leaver
        /// was the host and members remain
        new_host: Option<PrimaryKey>,
    },
    /// The user has no membership row in this room
    NotMember,
    /// The room row does not exist
    Missing,
}

#[derive(Debug)]
pub struct NewUser {
    pub name: Option<String>,
    pub token: String,
    pub leader_card_id: Option<PrimaryKey>,
}

#[derive(Debug)]
pub struct UpdatedUser {
    pub id: PrimaryKey,
    pub name: Option<String>,
    pub leader_card_id: Option<PrimaryKey>,
}

#[derive(Debug)]
pub struct NewRoom {
    pub live_id: PrimaryKey,
}

#[derive(Debug)]
pub struct NewRoomUser {
    pub room_id: PrimaryKey,
    pub user_id: PrimaryKey,
    pub live_difficulty: LiveDifficulty,
    pub is_host: bool,
}

#[derive(Debug)]
pub struct NewRoomUserResult {
    pub room_id: PrimaryKey,
    pub user_id: PrimaryKey,
    pub result: PlayResultData,
}
