use std::sync::Arc;

use axum::extract::FromRef;
use encore_lobby::{Lobby, SqliteDatabase};

pub type ServerLobby = Lobby<SqliteDatabase>;

#[derive(Clone, FromRef)]
pub struct ServerContext {
    pub lobby: Arc<ServerLobby>,
}
