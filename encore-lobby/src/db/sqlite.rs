use std::str::FromStr;

use async_trait::async_trait;
use sqlx::{
    query, query_as,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Error as SqlxError, Row, SqlitePool,
};

use crate::{
    Database, DatabaseError, DatabaseResult, IntoDatabaseError, JoinOutcome, LeaveOutcome, NewRoom,
    NewRoomUser, NewRoomUserResult, NewUser, PlayResultData, PrimaryKey, Result, RoomData,
    RoomUserData, UpdatedUser, UserData, WaitRoomStatus,
};

/// The schema applied on connect. Mirrors the game backend's three tables.
/// Note: the tables deliberately declare no foreign keys between each other,
/// referential integrity is maintained by the lobby.
const CREATE_USER_TABLE: &str = "
CREATE TABLE IF NOT EXISTS user (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT,
    token TEXT UNIQUE,
    leader_card_id INTEGER
)";

const CREATE_ROOM_TABLE: &str = "
CREATE TABLE IF NOT EXISTS room (
    room_id INTEGER PRIMARY KEY AUTOINCREMENT,
    live_id INTEGER NOT NULL,
    joined_user_count INTEGER NOT NULL DEFAULT 0,
    status INTEGER NOT NULL DEFAULT 1
)";

const CREATE_ROOM_USER_TABLE: &str = "
CREATE TABLE IF NOT EXISTS room_user (
    room_id INTEGER NOT NULL,
    user_id INTEGER NOT NULL,
    live_difficulty INTEGER NOT NULL,
    is_host INTEGER NOT NULL DEFAULT 0,
    judge_count_perfect INTEGER,
    judge_count_great INTEGER,
    judge_count_good INTEGER,
    judge_count_bad INTEGER,
    judge_count_miss INTEGER,
    score INTEGER,
    PRIMARY KEY (room_id, user_id)
)";

/// An SQLite database implementation for encore
pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    pub async fn new(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| e.any())?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| e.any())?;

        Self::with_pool(pool).await
    }

    /// Opens an in-memory database. Restricted to a single connection,
    /// since every SQLite connection gets its own in-memory store.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| e.any())?;

        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self> {
        for statement in [CREATE_USER_TABLE, CREATE_ROOM_TABLE, CREATE_ROOM_USER_TABLE] {
            query(statement)
                .execute(&pool)
                .await
                .map_err(|e| e.any())?;
        }

        Ok(Self { pool })
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    async fn user_by_id(&self, user_id: PrimaryKey) -> Result<UserData> {
        query_as::<_, UserData>("SELECT * FROM user WHERE id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("user", "id"))
    }

    async fn user_by_token(&self, token: &str) -> Result<UserData> {
        query_as::<_, UserData>("SELECT * FROM user WHERE token = ?")
            .bind(token)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("user", "token"))
    }

    async fn create_user(&self, new_user: NewUser) -> Result<UserData> {
        self.user_by_token(&new_user.token)
            .await
            .conflict_or_ok("user", "token", &new_user.token)?;

        query_as::<_, UserData>(
            "INSERT INTO user (name, token, leader_card_id) VALUES (?, ?, ?) RETURNING *",
        )
        .bind(new_user.name)
        .bind(new_user.token)
        .bind(new_user.leader_card_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn update_user(&self, updated_user: UpdatedUser) -> Result<UserData> {
        let user = self.user_by_id(updated_user.id).await?;

        query("UPDATE user SET name = ?, leader_card_id = ? WHERE id = ?")
            .bind(updated_user.name.or(user.name))
            .bind(updated_user.leader_card_id.or(user.leader_card_id))
            .bind(updated_user.id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        self.user_by_id(updated_user.id).await
    }

    async fn room_by_id(&self, room_id: PrimaryKey) -> Result<RoomData> {
        query_as::<_, RoomData>("SELECT * FROM room WHERE room_id = ?")
            .bind(room_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("room", "id"))
    }

    async fn rooms_by_live_id(&self, live_id: PrimaryKey) -> Result<Vec<RoomData>> {
        // A live id of 0 is the wildcard the client sends to list every room
        if live_id == 0 {
            query_as::<_, RoomData>("SELECT * FROM room")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| e.any())
        } else {
            query_as::<_, RoomData>("SELECT * FROM room WHERE live_id = ?")
                .bind(live_id)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| e.any())
        }
    }

    async fn create_room(&self, new_room: NewRoom) -> Result<RoomData> {
        // joined_user_count and status take their declared defaults
        query_as::<_, RoomData>("INSERT INTO room (live_id) VALUES (?) RETURNING *")
            .bind(new_room.live_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.any())
    }

    async fn update_room_status(&self, room_id: PrimaryKey, status: WaitRoomStatus) -> Result<()> {
        let result = query("UPDATE room SET status = ? WHERE room_id = ?")
            .bind(status.code())
            .bind(room_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                resource: "room",
                identifier: "id",
            });
        }

        Ok(())
    }

    async fn room_users(&self, room_id: PrimaryKey) -> Result<Vec<RoomUserData>> {
        let rows = query(
            "
            SELECT
                room_user.room_id,
                room_user.user_id,
                room_user.live_difficulty,
                room_user.is_host,
                room_user.judge_count_perfect,
                room_user.judge_count_great,
                room_user.judge_count_good,
                room_user.judge_count_bad,
                room_user.judge_count_miss,
                room_user.score,
                user.name,
                user.token,
                user.leader_card_id
            FROM room_user
                INNER JOIN user ON room_user.user_id = user.id
            WHERE room_user.room_id = ?
            ORDER BY room_user.rowid",
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        rows.iter()
            .map(|r| room_user_from_row(r).map_err(|e| e.any()))
            .collect()
    }

    async fn room_user(&self, room_id: PrimaryKey, user_id: PrimaryKey) -> Result<RoomUserData> {
        let row = query(
            "
            SELECT
                room_user.room_id,
                room_user.user_id,
                room_user.live_difficulty,
                room_user.is_host,
                room_user.judge_count_perfect,
                room_user.judge_count_great,
                room_user.judge_count_good,
                room_user.judge_count_bad,
                room_user.judge_count_miss,
                room_user.score,
                user.name,
                user.token,
                user.leader_card_id
            FROM room_user
                INNER JOIN user ON room_user.user_id = user.id
            WHERE room_user.room_id = ? AND room_user.user_id = ?",
        )
        .bind(room_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("room member", "room_id:user_id"))?;

        room_user_from_row(&row).map_err(|e| e.any())
    }

    async fn join_room(&self, new_member: NewRoomUser, max_user_count: i64) -> Result<JoinOutcome> {
        let mut tx = self.pool.begin().await.map_err(|e| e.any())?;

        let room = query("SELECT joined_user_count, status FROM room WHERE room_id = ?")
            .bind(new_member.room_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| e.any())?;

        let Some(room) = room else {
            return Ok(JoinOutcome::Missing);
        };

        let status: i64 = room.try_get("status").map_err(|e| e.any())?;
        let joined_user_count: i64 = room.try_get("joined_user_count").map_err(|e| e.any())?;

        if status != WaitRoomStatus::Waiting.code() {
            return Ok(JoinOutcome::Unavailable { status });
        }

        if joined_user_count >= max_user_count {
            return Ok(JoinOutcome::Full);
        }

        let existing = query("SELECT user_id FROM room_user WHERE room_id = ? AND user_id = ?")
            .bind(new_member.room_id)
            .bind(new_member.user_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| e.any())?;

        if existing.is_some() {
            return Ok(JoinOutcome::AlreadyMember);
        }

        query(
            "
            INSERT INTO room_user (room_id, user_id, live_difficulty, is_host)
            VALUES (?, ?, ?, ?)",
        )
        .bind(new_member.room_id)
        .bind(new_member.user_id)
        .bind(new_member.live_difficulty.code())
        .bind(new_member.is_host)
        .execute(&mut *tx)
        .await
        .map_err(|e| e.any())?;

        query("UPDATE room SET joined_user_count = ? WHERE room_id = ?")
            .bind(joined_user_count + 1)
            .bind(new_member.room_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| e.any())?;

        tx.commit().await.map_err(|e| e.any())?;

        Ok(JoinOutcome::Joined)
    }

    async fn leave_room(&self, room_id: PrimaryKey, user_id: PrimaryKey) -> Result<LeaveOutcome> {
        let mut tx = self.pool.begin().await.map_err(|e| e.any())?;

        let room = query("SELECT joined_user_count FROM room WHERE room_id = ?")
            .bind(room_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| e.any())?;

        let Some(room) = room else {
            return Ok(LeaveOutcome::Missing);
        };

        let member = query("SELECT is_host FROM room_user WHERE room_id = ? AND user_id = ?")
            .bind(room_id)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| e.any())?;

        let Some(member) = member else {
            return Ok(LeaveOutcome::NotMember);
        };

        let was_host: bool = member.try_get("is_host").map_err(|e| e.any())?;
        let joined_user_count: i64 = room.try_get("joined_user_count").map_err(|e| e.any())?;

        query("DELETE FROM room_user WHERE room_id = ? AND user_id = ?")
            .bind(room_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| e.any())?;

        let remaining = (joined_user_count - 1).max(0);

        if remaining == 0 {
            query("UPDATE room SET joined_user_count = 0, status = ? WHERE room_id = ?")
                .bind(WaitRoomStatus::Dissolution.code())
                .bind(room_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| e.any())?;

            tx.commit().await.map_err(|e| e.any())?;

            return Ok(LeaveOutcome::Left {
                remaining: 0,
                new_host: None,
            });
        }

        query("UPDATE room SET joined_user_count = ? WHERE room_id = ?")
            .bind(remaining)
            .bind(room_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| e.any())?;

        let mut new_host = None;

        if was_host {
            // Transfer the host role to the longest-standing remaining member
            let next = query("SELECT user_id FROM room_user WHERE room_id = ? ORDER BY rowid LIMIT 1")
                .bind(room_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| e.any())?;

            if let Some(next) = next {
                let next_user_id: PrimaryKey = next.try_get("user_id").map_err(|e| e.any())?;

                query("UPDATE room_user SET is_host = 1 WHERE room_id = ? AND user_id = ?")
                    .bind(room_id)
                    .bind(next_user_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| e.any())?;

                new_host = Some(next_user_id);
            }
        }

        tx.commit().await.map_err(|e| e.any())?;

        Ok(LeaveOutcome::Left {
            remaining,
            new_host,
        })
    }

    async fn store_room_user_result(&self, new_result: NewRoomUserResult) -> Result<()> {
        let result = query(
            "
            UPDATE room_user SET
                judge_count_perfect = ?,
                judge_count_great = ?,
                judge_count_good = ?,
                judge_count_bad = ?,
                judge_count_miss = ?,
                score = ?
            WHERE room_id = ? AND user_id = ?",
        )
        .bind(new_result.result.judge_count_perfect)
        .bind(new_result.result.judge_count_great)
        .bind(new_result.result.judge_count_good)
        .bind(new_result.result.judge_count_bad)
        .bind(new_result.result.judge_count_miss)
        .bind(new_result.result.score)
        .bind(new_result.room_id)
        .bind(new_result.user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                resource: "room member",
                identifier: "room_id:user_id",
            });
        }

        Ok(())
    }
}

fn room_user_from_row(row: &SqliteRow) -> std::result::Result<RoomUserData, SqlxError> {
    let judge_count_perfect: Option<i64> = row.try_get("judge_count_perfect")?;

    // A member has a result once their judge counts were stored
    let result = match judge_count_perfect {
        Some(judge_count_perfect) => Some(PlayResultData {
            judge_count_perfect,
            judge_count_great: row
                .try_get::<Option<i64>, _>("judge_count_great")?
                .unwrap_or_default(),
            judge_count_good: row
                .try_get::<Option<i64>, _>("judge_count_good")?
                .unwrap_or_default(),
            judge_count_bad: row
                .try_get::<Option<i64>, _>("judge_count_bad")?
                .unwrap_or_default(),
            judge_count_miss: row
                .try_get::<Option<i64>, _>("judge_count_miss")?
                .unwrap_or_default(),
            score: row.try_get::<Option<i64>, _>("score")?.unwrap_or_default(),
        }),
        None => None,
    };

    Ok(RoomUserData {
        room_id: row.try_get("room_id")?,
        user: UserData {
            id: row.try_get("user_id")?,
            name: row.try_get("name")?,
            token: row.try_get("token")?,
            leader_card_id: row.try_get("leader_card_id")?,
        },
        live_difficulty: row.try_get("live_difficulty")?,
        is_host: row.try_get("is_host")?,
        result,
    })
}

impl IntoDatabaseError for SqlxError {
    fn any(self) -> DatabaseError {
        DatabaseError::Internal(Box::new(self))
    }

    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError {
        match self {
            SqlxError::RowNotFound => DatabaseError::NotFound {
                resource,
                identifier,
            },
            e => Self::any(e),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{LiveDifficulty, NewRoomUser};

    async fn database() -> SqliteDatabase {
        SqliteDatabase::in_memory()
            .await
            .expect("in-memory database opens")
    }

    fn new_user(token: &str) -> NewUser {
        NewUser {
            name: Some("rin".to_string()),
            token: token.to_string(),
            leader_card_id: Some(1),
        }
    }

    async fn joined_member(db: &SqliteDatabase, token: &str, room_id: PrimaryKey) -> UserData {
        let user = db.create_user(new_user(token)).await.expect("user is created");

        let outcome = db
            .join_room(
                NewRoomUser {
                    room_id,
                    user_id: user.id,
                    live_difficulty: LiveDifficulty::Normal,
                    is_host: false,
                },
                4,
            )
            .await
            .expect("join succeeds");

        assert_eq!(outcome, JoinOutcome::Joined);
        user
    }

    #[tokio::test]
    async fn test_duplicate_token_conflicts() {
        let db = database().await;

        db.create_user(new_user("tok")).await.expect("first user is created");
        let err = db
            .create_user(new_user("tok"))
            .await
            .expect_err("second user with the same token is rejected");

        assert!(matches!(err, DatabaseError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_schema_enforces_unique_constraints() {
        let db = database().await;

        // Unique token constraint on user, bypassing the pre-check
        query("INSERT INTO user (token) VALUES ('same')")
            .execute(&db.pool)
            .await
            .expect("first insert succeeds");
        query("INSERT INTO user (token) VALUES ('same')")
            .execute(&db.pool)
            .await
            .expect_err("duplicate token violates the unique constraint");

        // Composite primary key on room_user
        query("INSERT INTO room_user (room_id, user_id, live_difficulty, is_host) VALUES (1, 1, 1, 1)")
            .execute(&db.pool)
            .await
            .expect("first membership insert succeeds");
        query("INSERT INTO room_user (room_id, user_id, live_difficulty, is_host) VALUES (1, 1, 2, 0)")
            .execute(&db.pool)
            .await
            .expect_err("duplicate membership violates the primary key");
    }

    #[tokio::test]
    async fn test_room_status_defaults_to_waiting() {
        let db = database().await;

        let room = db
            .create_room(NewRoom { live_id: 10 })
            .await
            .expect("room is created");

        assert_eq!(room.status, WaitRoomStatus::Waiting.code());
        assert_eq!(room.joined_user_count, 0);
    }

    #[tokio::test]
    async fn test_ids_increase_monotonically() {
        let db = database().await;

        let mut user_ids = vec![];
        for token in ["a", "b", "c"] {
            user_ids.push(db.create_user(new_user(token)).await.expect("user is created").id);
        }

        let mut room_ids = vec![];
        for live_id in [1, 2, 3] {
            room_ids.push(
                db.create_room(NewRoom { live_id })
                    .await
                    .expect("room is created")
                    .room_id,
            );
        }

        assert!(user_ids.windows(2).all(|w| w[0] < w[1]));
        assert!(room_ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_round_trip_by_primary_key() {
        let db = database().await;

        let created = db.create_user(new_user("roundtrip")).await.expect("user is created");
        let fetched = db.user_by_id(created.id).await.expect("user is fetched");
        assert_eq!(created, fetched);

        let created = db
            .create_room(NewRoom { live_id: 7 })
            .await
            .expect("room is created");
        let fetched = db.room_by_id(created.room_id).await.expect("room is fetched");
        assert_eq!(created, fetched);
    }

    #[tokio::test]
    async fn test_join_keeps_member_count_consistent() {
        let db = database().await;

        let room = db
            .create_room(NewRoom { live_id: 1 })
            .await
            .expect("room is created");

        joined_member(&db, "one", room.room_id).await;
        joined_member(&db, "two", room.room_id).await;

        let room = db.room_by_id(room.room_id).await.expect("room is fetched");
        let members = db.room_users(room.room_id).await.expect("members are fetched");

        assert_eq!(room.joined_user_count, 2);
        assert_eq!(members.len(), 2);
    }

    #[tokio::test]
    async fn test_join_full_room() {
        let db = database().await;

        let room = db
            .create_room(NewRoom { live_id: 1 })
            .await
            .expect("room is created");

        for token in ["a", "b", "c", "d"] {
            joined_member(&db, token, room.room_id).await;
        }

        let straggler = db.create_user(new_user("e")).await.expect("user is created");
        let outcome = db
            .join_room(
                NewRoomUser {
                    room_id: room.room_id,
                    user_id: straggler.id,
                    live_difficulty: LiveDifficulty::Hard,
                    is_host: false,
                },
                4,
            )
            .await
            .expect("join resolves");

        assert_eq!(outcome, JoinOutcome::Full);
    }

    #[tokio::test]
    async fn test_join_missing_room() {
        let db = database().await;

        let user = db.create_user(new_user("lost")).await.expect("user is created");
        let outcome = db
            .join_room(
                NewRoomUser {
                    room_id: 999,
                    user_id: user.id,
                    live_difficulty: LiveDifficulty::Normal,
                    is_host: false,
                },
                4,
            )
            .await
            .expect("join resolves");

        assert_eq!(outcome, JoinOutcome::Missing);
    }

    #[tokio::test]
    async fn test_leave_transfers_host() {
        let db = database().await;

        let room = db
            .create_room(NewRoom { live_id: 1 })
            .await
            .expect("room is created");

        let host = db.create_user(new_user("host")).await.expect("user is created");
        db.join_room(
            NewRoomUser {
                room_id: room.room_id,
                user_id: host.id,
                live_difficulty: LiveDifficulty::Normal,
                is_host: true,
            },
            4,
        )
        .await
        .expect("host joins");

        let other = joined_member(&db, "other", room.room_id).await;

        let outcome = db
            .leave_room(room.room_id, host.id)
            .await
            .expect("leave resolves");

        assert_eq!(
            outcome,
            LeaveOutcome::Left {
                remaining: 1,
                new_host: Some(other.id)
            }
        );

        let member = db
            .room_user(room.room_id, other.id)
            .await
            .expect("member is fetched");

        assert!(member.is_host);
    }

    #[tokio::test]
    async fn test_leave_last_member_dissolves_room() {
        let db = database().await;

        let room = db
            .create_room(NewRoom { live_id: 1 })
            .await
            .expect("room is created");

        let only = joined_member(&db, "only", room.room_id).await;

        let outcome = db
            .leave_room(room.room_id, only.id)
            .await
            .expect("leave resolves");

        assert_eq!(
            outcome,
            LeaveOutcome::Left {
                remaining: 0,
                new_host: None
            }
        );

        let room = db.room_by_id(room.room_id).await.expect("room row remains");
        assert_eq!(room.status, WaitRoomStatus::Dissolution.code());
        assert_eq!(room.joined_user_count, 0);
    }

    #[tokio::test]
    async fn test_store_and_read_result() {
        let db = database().await;

        let room = db
            .create_room(NewRoom { live_id: 1 })
            .await
            .expect("room is created");
        let user = joined_member(&db, "player", room.room_id).await;

        let member = db
            .room_user(room.room_id, user.id)
            .await
            .expect("member is fetched");
        assert_eq!(member.result, None);

        let play_result = PlayResultData {
            judge_count_perfect: 100,
            judge_count_great: 20,
            judge_count_good: 3,
            judge_count_bad: 1,
            judge_count_miss: 0,
            score: 123456,
        };

        db.store_room_user_result(NewRoomUserResult {
            room_id: room.room_id,
            user_id: user.id,
            result: play_result,
        })
        .await
        .expect("result is stored");

        let member = db
            .room_user(room.room_id, user.id)
            .await
            .expect("member is fetched");
        assert_eq!(member.result, Some(play_result));
    }
}
