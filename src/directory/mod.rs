//! User directory: the identity store behind login and user management.
//!
//! Handlers only see the [`UserDirectory`] trait, so the store can be swapped
//! (for a fixed set of accounts in tests, or an external directory) without
//! touching the API layer.

use async_trait::async_trait;

use crate::db::{DbPool, User, UserRole};

/// Fields needed to register an account. `password_hash` is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub email: &'a str,
    pub name: &'a str,
    pub password_hash: &'a str,
    pub role: UserRole,
    pub wallet_balance: f64,
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error>;

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, sqlx::Error>;

    async fn list(&self) -> Result<Vec<User>, sqlx::Error>;

    async fn create(&self, user: NewUser<'_>) -> Result<User, sqlx::Error>;
}

/// Directory backed by the `users` table
pub struct SqliteUserDirectory {
    db: DbPool,
}

impl SqliteUserDirectory {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserDirectory for SqliteUserDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        User::get_by_email(&self.db, email).await
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, sqlx::Error> {
        User::get_by_id(&self.db, id).await
    }

    async fn list(&self) -> Result<Vec<User>, sqlx::Error> {
        User::list(&self.db).await
    }

    async fn create(&self, user: NewUser<'_>) -> Result<User, sqlx::Error> {
        User::create(
            &self.db,
            user.email,
            user.name,
            user.password_hash,
            user.role,
            user.wallet_balance,
        )
        .await
    }
}
