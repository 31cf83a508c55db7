use sqlx::FromRow;

/// The type used for primary keys in the database.
pub type PrimaryKey = i64;

/// A registered player
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct UserData {
    pub id: PrimaryKey,
    pub name: Option<String>,
    /// The credential presented by the client to identify itself.
    /// Unique across all users.
    pub token: Option<String>,
    /// The game asset the user selected as their leader card
    pub leader_card_id: Option<PrimaryKey>,
}

/// A joinable game session
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct RoomData {
    pub room_id: PrimaryKey,
    /// The song being played in this room
    pub live_id: PrimaryKey,
    /// Kept consistent with the number of `room_user` rows by the
    /// join/leave transactions. The store itself does not enforce this.
    pub joined_user_count: i64,
    /// Raw status code, interpreted via [WaitRoomStatus]
    pub status: i64,
}

/// A user's membership in a room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomUserData {
    pub room_id: PrimaryKey,
    pub user: UserData,
    /// Raw difficulty code, interpreted via [LiveDifficulty]
    pub live_difficulty: i64,
    pub is_host: bool,
    /// Play results, present once the member has finished their live
    pub result: Option<PlayResultData>,
}

/// Judge counts and score a member reports after finishing a live
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayResultData {
    pub judge_count_perfect: i64,
    pub judge_count_great: i64,
    pub judge_count_good: i64,
    pub judge_count_bad: i64,
    pub judge_count_miss: i64,
    pub score: i64,
}

/// The status codes a room moves through, as stored in `room.status`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitRoomStatus {
    /// Members are waiting for the host to start the live
    Waiting = 1,
    /// The live started, clients may transition to the play screen
    LiveStart = 2,
    /// The room was disbanded
    Dissolution = 3,
}

impl WaitRoomStatus {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::Waiting),
            2 => Some(Self::LiveStart),
            3 => Some(Self::Dissolution),
            _ => None,
        }
    }

    pub fn code(self) -> i64 {
        self as i64
    }
}

/// The difficulty a member plays a live at, as stored in
/// `room_user.live_difficulty`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveDifficulty {
    Normal = 1,
    Hard = 2,
}

impl LiveDifficulty {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::Normal),
            2 => Some(Self::Hard),
            _ => None,
        }
    }

    pub fn code(self) -> i64 {
        self as i64
    }
}
