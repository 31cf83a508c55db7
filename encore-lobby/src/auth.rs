use std::sync::Arc;

use log::info;
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use thiserror::Error;

use crate::{Database, DatabaseError, NewUser, PrimaryKey, UpdatedUser, UserData};

/// Token-based identity for the lobby. Users are identified by the
/// opaque token issued at registration, never by their row id.
pub struct Auth<Db> {
    db: Arc<Db>,
}

#[derive(Debug, Error)]
pub enum AuthError {
    /// The presented token doesn't belong to any user
    #[error("Invalid token")]
    InvalidToken,
    /// Something else went wrong with the database
    #[error(transparent)]
    Db(DatabaseError),
}

/// Profile fields supplied by a registering client
#[derive(Debug)]
pub struct NewProfile {
    pub name: Option<String>,
    pub leader_card_id: Option<PrimaryKey>,
}

impl<Db> Auth<Db>
where
    Db: Database,
{
    const TOKEN_LENGTH: usize = 32;

    pub fn new(db: &Arc<Db>) -> Self {
        Self { db: db.clone() }
    }

    /// Registers a user, issuing a fresh token
    pub async fn register(&self, new_profile: NewProfile) -> Result<UserData, AuthError> {
        let user = self
            .db
            .create_user(NewUser {
                name: new_profile.name,
                token: random_string(Self::TOKEN_LENGTH),
                leader_card_id: new_profile.leader_card_id,
            })
            .await
            .map_err(AuthError::Db)?;

        info!(
            "Registered user {} ({})",
            user.name.as_deref().unwrap_or("<unnamed>"),
            user.id
        );

        Ok(user)
    }

    /// Returns the user behind a token, if it exists
    pub async fn user(&self, token: &str) -> Result<UserData, AuthError> {
        self.db.user_by_token(token).await.map_err(|e| match e {
            DatabaseError::NotFound {
                resource: _,
                identifier: _,
            } => AuthError::InvalidToken,
            err => AuthError::Db(err),
        })
    }

    /// Updates a user's profile
    pub async fn update_user(&self, updated_user: UpdatedUser) -> Result<UserData, DatabaseError> {
        self.db.update_user(updated_user).await
    }
}

fn random_string(length: usize) -> String {
    let mut rng = thread_rng();

    std::iter::repeat(())
        .map(|_| rng.sample(Alphanumeric) as char)
        .take(length)
        .collect()
}
