//! User, role and login session models.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection, SqlitePool};

use crate::db::now_timestamp;

/// User roles with hierarchical permissions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Parks vehicles, pays for sessions, reads alerts
    Customer,
    /// Registers entries and exits, manages alerts, exports reports
    Operator,
    /// Full access including users, spaces and statistics
    Admin,
}

impl UserRole {
    /// Check if this role has at least the specified permission level
    pub fn has_at_least(&self, required: UserRole) -> bool {
        self.level() >= required.level()
    }

    /// Get the permission level (higher = more permissions)
    pub fn level(&self) -> u8 {
        match self {
            UserRole::Admin => 3,
            UserRole::Operator => 2,
            UserRole::Customer => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Operator => "operator",
            UserRole::Customer => "customer",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(UserRole::Admin),
            "operator" => Ok(UserRole::Operator),
            "customer" => Ok(UserRole::Customer),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Suspended,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Suspended => "suspended",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub role: String,
    pub status: String,
    pub wallet_balance: f64,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    /// Role as an enum. Rows are constrained by the schema, so an unknown
    /// value only appears if the table was edited by hand; it is treated as
    /// the least privileged role.
    pub fn role_enum(&self) -> UserRole {
        self.role.parse().unwrap_or(UserRole::Customer)
    }

    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active.as_str()
    }

    pub async fn create(
        db: &SqlitePool,
        email: &str,
        name: &str,
        password_hash: &str,
        role: UserRole,
        wallet_balance: f64,
    ) -> Result<User, sqlx::Error> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = now_timestamp();

        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, name, role, status, wallet_balance, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, 'active', ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(email)
        .bind(password_hash)
        .bind(name)
        .bind(role.as_str())
        .bind(wallet_balance)
        .bind(&now)
        .bind(&now)
        .execute(db)
        .await?;

        Self::get_by_id(db, &id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn get_by_id(db: &SqlitePool, id: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(db)
            .await
    }

    pub async fn get_by_email(db: &SqlitePool, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(db)
            .await
    }

    pub async fn list(db: &SqlitePool) -> Result<Vec<User>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM users ORDER BY created_at ASC")
            .fetch_all(db)
            .await
    }

    /// Take `amount` out of a wallet inside the caller's transaction.
    /// Returns false when the balance does not cover it.
    pub async fn debit_wallet(
        conn: &mut SqliteConnection,
        id: &str,
        amount: f64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET wallet_balance = wallet_balance - ?, updated_at = ?
            WHERE id = ? AND wallet_balance >= ?
            "#,
        )
        .bind(amount)
        .bind(now_timestamp())
        .bind(id)
        .bind(amount)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: String,
    pub status: String,
    pub wallet_balance: f64,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            role: user.role,
            status: user.status,
            wallet_balance: user.wallet_balance,
        }
    }
}

/// A login session backing one bearer token
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuthSession {
    pub id: String,
    pub user_id: String,
    pub token_hash: String,
    pub expires_at: String,
    pub created_at: String,
}

impl AuthSession {
    pub async fn create(
        db: &SqlitePool,
        user_id: &str,
        token_hash: &str,
        expires_at: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO auth_sessions (id, user_id, token_hash, expires_at, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .bind(now_timestamp())
        .execute(db)
        .await?;
        Ok(())
    }

    /// Find an unexpired session for a token hash
    pub async fn find_valid(
        db: &SqlitePool,
        token_hash: &str,
    ) -> Result<Option<AuthSession>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM auth_sessions WHERE token_hash = ? AND expires_at > ?")
            .bind(token_hash)
            .bind(now_timestamp())
            .fetch_optional(db)
            .await
    }

    pub async fn revoke(db: &SqlitePool, token_hash: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM auth_sessions WHERE token_hash = ?")
            .bind(token_hash)
            .execute(db)
            .await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserResponse,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub name: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub wallet_balance: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_in_memory;

    #[test]
    fn test_role_hierarchy() {
        assert!(UserRole::Admin.has_at_least(UserRole::Operator));
        assert!(UserRole::Admin.has_at_least(UserRole::Customer));
        assert!(UserRole::Operator.has_at_least(UserRole::Operator));
        assert!(!UserRole::Operator.has_at_least(UserRole::Admin));
        assert!(!UserRole::Customer.has_at_least(UserRole::Operator));
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("ADMIN".parse::<UserRole>().unwrap(), UserRole::Admin);
        assert_eq!("operator".parse::<UserRole>().unwrap(), UserRole::Operator);
        assert!("owner".parse::<UserRole>().is_err());
    }

    #[tokio::test]
    async fn test_wallet_debit_requires_balance() {
        let pool = init_in_memory().await.unwrap();
        let user = User::create(&pool, "c@example.com", "C", "x", UserRole::Customer, 5.0)
            .await
            .unwrap();

        let mut conn = pool.acquire().await.unwrap();
        assert!(User::debit_wallet(&mut conn, &user.id, 3.0).await.unwrap());
        assert!(!User::debit_wallet(&mut conn, &user.id, 3.0).await.unwrap());
        drop(conn);

        let user = User::get_by_id(&pool, &user.id).await.unwrap().unwrap();
        assert_eq!(user.wallet_balance, 2.0);
    }

    #[tokio::test]
    async fn test_expired_auth_session_is_ignored() {
        let pool = init_in_memory().await.unwrap();
        let user = User::create(&pool, "o@example.com", "O", "x", UserRole::Operator, 0.0)
            .await
            .unwrap();

        AuthSession::create(&pool, &user.id, "live", "2999-01-01T00:00:00.000Z")
            .await
            .unwrap();
        AuthSession::create(&pool, &user.id, "stale", "2000-01-01T00:00:00.000Z")
            .await
            .unwrap();

        assert!(AuthSession::find_valid(&pool, "live").await.unwrap().is_some());
        assert!(AuthSession::find_valid(&pool, "stale").await.unwrap().is_none());

        AuthSession::revoke(&pool, "live").await.unwrap();
        assert!(AuthSession::find_valid(&pool, "live").await.unwrap().is_none());
    }
}
