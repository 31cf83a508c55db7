mod auth;
mod db;
mod rooms;

use std::sync::Arc;

pub use auth::*;
pub use db::*;
pub use rooms::*;

/// The encore lobby system, facilitating room management, authentication,
/// and more.
pub struct Lobby<Db> {
    pub auth: Auth<Db>,
    pub rooms: RoomManager<Db>,
}

impl<Db> Lobby<Db>
where
    Db: Database,
{
    pub fn new(database: Db) -> Self {
        let database = Arc::new(database);

        Self {
            auth: Auth::new(&database),
            rooms: RoomManager::new(&database),
        }
    }
}
