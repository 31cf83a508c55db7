use std::sync::Arc;

use log::{info, warn};
use thiserror::Error;

use crate::{
    Database, DatabaseError, JoinOutcome, LeaveOutcome, LiveDifficulty, NewRoom, NewRoomUser,
    NewRoomUserResult, PlayResultData, PrimaryKey, RoomData, UserData, WaitRoomStatus,
};

/// How many users fit in a single room
pub const MAX_USER_COUNT: i64 = 4;

pub type RoomId = PrimaryKey;

/// Manages the lifecycle of rooms: creation, joining, starting a live,
/// reporting results, and teardown.
pub struct RoomManager<Db> {
    db: Arc<Db>,
}

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("User is not the host of this room")]
    NotHost,
    #[error("User is not a member of this room")]
    NotInRoom,
    #[error("Room is unavailable")]
    RoomUnavailable,
    #[error(transparent)]
    Db(#[from] DatabaseError),
}

/// What a client is told after attempting to join a room. Everything but
/// `Ok` is a soft failure the client handles by itself, so these travel in
/// the response body rather than as errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinRoomResult {
    Ok,
    RoomFull,
    Disbanded,
    OtherError,
}

/// A member as seen by a polling client
#[derive(Debug, Clone)]
pub struct RoomMember {
    pub user: UserData,
    pub live_difficulty: i64,
    pub is_host: bool,
    /// Whether this member is the user that requested the snapshot
    pub is_me: bool,
}

/// The state a waiting client polls for
#[derive(Debug)]
pub struct RoomSnapshot {
    pub status: WaitRoomStatus,
    pub members: Vec<RoomMember>,
}

/// A member's reported play results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberResult {
    pub user_id: PrimaryKey,
    pub result: PlayResultData,
}

impl<Db> RoomManager<Db>
where
    Db: Database,
{
    pub fn new(db: &Arc<Db>) -> Self {
        Self { db: db.clone() }
    }

    /// Creates a new room and joins the creator as its host
    pub async fn create(
        &self,
        host: &UserData,
        live_id: PrimaryKey,
        difficulty: LiveDifficulty,
    ) -> Result<RoomData, RoomError> {
        let room = self.db.create_room(NewRoom { live_id }).await?;

        let outcome = self
            .db
            .join_room(
                NewRoomUser {
                    room_id: room.room_id,
                    user_id: host.id,
                    live_difficulty: difficulty,
                    is_host: true,
                },
                MAX_USER_COUNT,
            )
            .await?;

        if outcome != JoinOutcome::Joined {
            warn!(
                "Room {} became unavailable before its host could join",
                room.room_id
            );
            return Err(RoomError::RoomUnavailable);
        }

        info!(
            "User {} created room {} for live {}",
            host.id, room.room_id, live_id
        );

        Ok(self.db.room_by_id(room.room_id).await?)
    }

    /// Rooms for a live id that can still be joined. A live id of 0 lists
    /// every joinable room.
    pub async fn list(&self, live_id: PrimaryKey) -> Result<Vec<RoomData>, RoomError> {
        let rooms = self
            .db
            .rooms_by_live_id(live_id)
            .await?
            .into_iter()
            .filter(|r| {
                r.status == WaitRoomStatus::Waiting.code() && r.joined_user_count < MAX_USER_COUNT
            })
            .collect();

        Ok(rooms)
    }

    /// Attempts to join a room, reporting the outcome as the client sees it
    pub async fn join(
        &self,
        user: &UserData,
        room_id: RoomId,
        difficulty: LiveDifficulty,
    ) -> Result<JoinRoomResult, RoomError> {
        let outcome = self
            .db
            .join_room(
                NewRoomUser {
                    room_id,
                    user_id: user.id,
                    live_difficulty: difficulty,
                    is_host: false,
                },
                MAX_USER_COUNT,
            )
            .await?;

        let result = match outcome {
            JoinOutcome::Joined => {
                info!("User {} joined room {}", user.id, room_id);
                JoinRoomResult::Ok
            }
            JoinOutcome::Full => JoinRoomResult::RoomFull,
            JoinOutcome::Missing => JoinRoomResult::Disbanded,
            JoinOutcome::Unavailable { status } if status == WaitRoomStatus::Dissolution.code() => {
                JoinRoomResult::Disbanded
            }
            JoinOutcome::Unavailable { status: _ } | JoinOutcome::AlreadyMember => {
                JoinRoomResult::OtherError
            }
        };

        Ok(result)
    }

    /// The snapshot a waiting client polls for. A missing room reads as
    /// dissolved, since the poller only needs to know the room is gone.
    pub async fn wait(&self, user_id: PrimaryKey, room_id: RoomId) -> Result<RoomSnapshot, RoomError> {
        let room = match self.db.room_by_id(room_id).await {
            Ok(room) => room,
            Err(DatabaseError::NotFound {
                resource: _,
                identifier: _,
            }) => {
                return Ok(RoomSnapshot {
                    status: WaitRoomStatus::Dissolution,
                    members: vec![],
                })
            }
            Err(e) => return Err(e.into()),
        };

        let members = self
            .db
            .room_users(room_id)
            .await?
            .into_iter()
            .map(|m| RoomMember {
                is_me: m.user.id == user_id,
                live_difficulty: m.live_difficulty,
                is_host: m.is_host,
                user: m.user,
            })
            .collect();

        Ok(RoomSnapshot {
            status: WaitRoomStatus::from_code(room.status).unwrap_or(WaitRoomStatus::Waiting),
            members,
        })
    }

    /// Starts the live. Only the host may do this.
    pub async fn start(&self, user_id: PrimaryKey, room_id: RoomId) -> Result<(), RoomError> {
        let member = self
            .db
            .room_user(room_id, user_id)
            .await
            .map_err(not_in_room)?;

        if !member.is_host {
            return Err(RoomError::NotHost);
        }

        self.db
            .update_room_status(room_id, WaitRoomStatus::LiveStart)
            .await?;

        info!("Host {} started the live in room {}", user_id, room_id);

        Ok(())
    }

    /// Stores a member's results after they finished their live
    pub async fn finish(
        &self,
        user_id: PrimaryKey,
        room_id: RoomId,
        result: PlayResultData,
    ) -> Result<(), RoomError> {
        self.db
            .store_room_user_result(NewRoomUserResult {
                room_id,
                user_id,
                result,
            })
            .await
            .map_err(not_in_room)
    }

    /// All members' results, once every member has reported. Returns an
    /// empty list while results are still outstanding, so clients keep
    /// polling.
    pub async fn results(&self, room_id: RoomId) -> Result<Vec<MemberResult>, RoomError> {
        let members = self.db.room_users(room_id).await?;

        let results: Option<Vec<_>> = members
            .iter()
            .map(|m| {
                m.result.map(|result| MemberResult {
                    user_id: m.user.id,
                    result,
                })
            })
            .collect();

        Ok(results.unwrap_or_default())
    }

    /// Leaves a room, transferring the host role or dissolving the room as
    /// needed. Leaving an already-gone room is not an error.
    pub async fn leave(&self, user_id: PrimaryKey, room_id: RoomId) -> Result<(), RoomError> {
        match self.db.leave_room(room_id, user_id).await? {
            LeaveOutcome::Left {
                remaining,
                new_host,
            } => {
                info!("User {} left room {}", user_id, room_id);

                if let Some(new_host) = new_host {
                    info!("Host of room {} transferred to user {}", room_id, new_host);
                }

                if remaining == 0 {
                    info!("Room {} dissolved", room_id);
                }

                Ok(())
            }
            LeaveOutcome::Missing => Ok(()),
            LeaveOutcome::NotMember => Err(RoomError::NotInRoom),
        }
    }
}

fn not_in_room(e: DatabaseError) -> RoomError {
    match e {
        DatabaseError::NotFound {
            resource: _,
            identifier: _,
        } => RoomError::NotInRoom,
        e => RoomError::Db(e),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{NewUser, SqliteDatabase};

    async fn setup() -> (Arc<SqliteDatabase>, RoomManager<SqliteDatabase>) {
        let db = Arc::new(
            SqliteDatabase::in_memory()
                .await
                .expect("in-memory database opens"),
        );

        let manager = RoomManager::new(&db);
        (db, manager)
    }

    async fn user(db: &SqliteDatabase, token: &str) -> UserData {
        db.create_user(NewUser {
            name: Some(token.to_string()),
            token: token.to_string(),
            leader_card_id: None,
        })
        .await
        .expect("user is created")
    }

    fn results(score: i64) -> PlayResultData {
        PlayResultData {
            judge_count_perfect: 10,
            judge_count_great: 5,
            judge_count_good: 2,
            judge_count_bad: 1,
            judge_count_miss: 0,
            score,
        }
    }

    #[tokio::test]
    async fn test_create_joins_host() {
        let (db, manager) = setup().await;
        let host = user(&db, "host").await;

        let room = manager
            .create(&host, 100, LiveDifficulty::Normal)
            .await
            .expect("room is created");

        assert_eq!(room.joined_user_count, 1);

        let snapshot = manager
            .wait(host.id, room.room_id)
            .await
            .expect("snapshot is fetched");

        assert_eq!(snapshot.status, WaitRoomStatus::Waiting);
        assert_eq!(snapshot.members.len(), 1);
        assert!(snapshot.members[0].is_host);
        assert!(snapshot.members[0].is_me);
    }

    #[tokio::test]
    async fn test_list_filters_unjoinable_rooms() {
        let (db, manager) = setup().await;

        let host_a = user(&db, "a").await;
        let host_b = user(&db, "b").await;
        let host_c = user(&db, "c").await;

        let waiting = manager
            .create(&host_a, 100, LiveDifficulty::Normal)
            .await
            .expect("room is created");

        let started = manager
            .create(&host_b, 100, LiveDifficulty::Normal)
            .await
            .expect("room is created");
        manager
            .start(host_b.id, started.room_id)
            .await
            .expect("live starts");

        // A room for a different live
        manager
            .create(&host_c, 200, LiveDifficulty::Normal)
            .await
            .expect("room is created");

        let rooms = manager.list(100).await.expect("rooms are listed");
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].room_id, waiting.room_id);

        // Live id 0 lists every joinable room
        let rooms = manager.list(0).await.expect("rooms are listed");
        assert_eq!(rooms.len(), 2);
    }

    #[tokio::test]
    async fn test_join_results() {
        let (db, manager) = setup().await;
        let host = user(&db, "host").await;

        let room = manager
            .create(&host, 100, LiveDifficulty::Normal)
            .await
            .expect("room is created");

        // Duplicate join
        let result = manager
            .join(&host, room.room_id, LiveDifficulty::Hard)
            .await
            .expect("join resolves");
        assert_eq!(result, JoinRoomResult::OtherError);

        // Fill the room up
        for token in ["a", "b", "c"] {
            let member = user(&db, token).await;
            let result = manager
                .join(&member, room.room_id, LiveDifficulty::Normal)
                .await
                .expect("join resolves");
            assert_eq!(result, JoinRoomResult::Ok);
        }

        let straggler = user(&db, "late").await;
        let result = manager
            .join(&straggler, room.room_id, LiveDifficulty::Normal)
            .await
            .expect("join resolves");
        assert_eq!(result, JoinRoomResult::RoomFull);

        // Missing room
        let result = manager
            .join(&straggler, 999, LiveDifficulty::Normal)
            .await
            .expect("join resolves");
        assert_eq!(result, JoinRoomResult::Disbanded);
    }

    #[tokio::test]
    async fn test_join_started_room_is_rejected() {
        let (db, manager) = setup().await;
        let host = user(&db, "host").await;

        let room = manager
            .create(&host, 100, LiveDifficulty::Normal)
            .await
            .expect("room is created");

        manager
            .start(host.id, room.room_id)
            .await
            .expect("live starts");

        let late = user(&db, "late").await;
        let result = manager
            .join(&late, room.room_id, LiveDifficulty::Normal)
            .await
            .expect("join resolves");

        assert_eq!(result, JoinRoomResult::OtherError);
    }

    #[tokio::test]
    async fn test_only_host_can_start() {
        let (db, manager) = setup().await;
        let host = user(&db, "host").await;
        let member = user(&db, "member").await;
        let outsider = user(&db, "outsider").await;

        let room = manager
            .create(&host, 100, LiveDifficulty::Normal)
            .await
            .expect("room is created");

        manager
            .join(&member, room.room_id, LiveDifficulty::Normal)
            .await
            .expect("join resolves");

        let err = manager
            .start(member.id, room.room_id)
            .await
            .expect_err("non-host cannot start");
        assert!(matches!(err, RoomError::NotHost));

        let err = manager
            .start(outsider.id, room.room_id)
            .await
            .expect_err("outsider cannot start");
        assert!(matches!(err, RoomError::NotInRoom));

        manager
            .start(host.id, room.room_id)
            .await
            .expect("host starts the live");

        let snapshot = manager
            .wait(member.id, room.room_id)
            .await
            .expect("snapshot is fetched");
        assert_eq!(snapshot.status, WaitRoomStatus::LiveStart);
    }

    #[tokio::test]
    async fn test_results_wait_for_all_members() {
        let (db, manager) = setup().await;
        let host = user(&db, "host").await;
        let member = user(&db, "member").await;

        let room = manager
            .create(&host, 100, LiveDifficulty::Normal)
            .await
            .expect("room is created");
        manager
            .join(&member, room.room_id, LiveDifficulty::Hard)
            .await
            .expect("join resolves");

        manager
            .start(host.id, room.room_id)
            .await
            .expect("live starts");

        manager
            .finish(host.id, room.room_id, results(1000))
            .await
            .expect("host reports");

        // One member still playing, nothing to show yet
        let all = manager.results(room.room_id).await.expect("results resolve");
        assert!(all.is_empty());

        manager
            .finish(member.id, room.room_id, results(2000))
            .await
            .expect("member reports");

        let all = manager.results(room.room_id).await.expect("results resolve");
        assert_eq!(all.len(), 2);
        assert!(all.iter().any(|r| r.user_id == host.id && r.result.score == 1000));
        assert!(all.iter().any(|r| r.user_id == member.id && r.result.score == 2000));
    }

    #[tokio::test]
    async fn test_leave_and_dissolution() {
        let (db, manager) = setup().await;
        let host = user(&db, "host").await;
        let member = user(&db, "member").await;

        let room = manager
            .create(&host, 100, LiveDifficulty::Normal)
            .await
            .expect("room is created");
        manager
            .join(&member, room.room_id, LiveDifficulty::Normal)
            .await
            .expect("join resolves");

        // Host leaves, member inherits the room
        manager
            .leave(host.id, room.room_id)
            .await
            .expect("host leaves");

        let snapshot = manager
            .wait(member.id, room.room_id)
            .await
            .expect("snapshot is fetched");
        assert_eq!(snapshot.members.len(), 1);
        assert!(snapshot.members[0].is_host);

        // Last member leaves, room dissolves
        manager
            .leave(member.id, room.room_id)
            .await
            .expect("member leaves");

        let snapshot = manager
            .wait(member.id, room.room_id)
            .await
            .expect("snapshot is fetched");
        assert_eq!(snapshot.status, WaitRoomStatus::Dissolution);
        assert!(snapshot.members.is_empty());

        // Leaving a room you're not in is an error, leaving a gone room is not
        let err = manager
            .leave(host.id, room.room_id)
            .await
            .expect_err("host is no longer a member");
        assert!(matches!(err, RoomError::NotInRoom));

        manager
            .leave(host.id, 999)
            .await
            .expect("leaving a missing room is a no-op");
    }
}
