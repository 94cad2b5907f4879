//! Demo data seeders
//!
//! Creates one account per role plus a handful of spaces so a fresh install
//! can be tried from the CLI. Passwords are hashed like any other account.

use anyhow::Result;
use sqlx::SqlitePool;
use tracing::info;

use super::{ParkingSpace, User, UserRole};

pub struct DemoAccount {
    pub email: &'static str,
    pub name: &'static str,
    pub password: &'static str,
    pub role: UserRole,
    pub wallet_balance: f64,
}

pub const DEMO_ACCOUNTS: [DemoAccount; 3] = [
    DemoAccount {
        email: "customer@parkwise.local",
        name: "Demo Customer",
        password: "customer-demo-pass",
        role: UserRole::Customer,
        wallet_balance: 50.0,
    },
    DemoAccount {
        email: "operator@parkwise.local",
        name: "Demo Operator",
        password: "operator-demo-pass",
        role: UserRole::Operator,
        wallet_balance: 0.0,
    },
    DemoAccount {
        email: "admin@parkwise.local",
        name: "Demo Admin",
        password: "admin-demo-pass",
        role: UserRole::Admin,
        wallet_balance: 0.0,
    },
];

const DEMO_SPACES: [(&str, &str, &str); 6] = [
    ("A-01", "ground", "car"),
    ("A-02", "ground", "car"),
    ("A-03", "ground", "car"),
    ("M-01", "ground", "motorcycle"),
    ("T-01", "ground", "truck"),
    ("B-01", "first", "car"),
];

/// Seed demo accounts and spaces. Existing rows are left untouched, so the
/// seeder can be run repeatedly.
pub async fn seed_demo_data(pool: &SqlitePool) -> Result<()> {
    info!("Seeding demo accounts and spaces...");

    for account in &DEMO_ACCOUNTS {
        if User::get_by_email(pool, account.email).await?.is_some() {
            continue;
        }
        let hash = crate::api::auth::hash_password(account.password)
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?;
        User::create(
            pool,
            account.email,
            account.name,
            &hash,
            account.role,
            account.wallet_balance,
        )
        .await?;
        info!(email = account.email, role = %account.role, "Created demo account");
    }

    for (number, floor, vehicle_type) in DEMO_SPACES {
        if ParkingSpace::get_by_number(pool, number).await?.is_none() {
            ParkingSpace::create(pool, number, Some(floor), vehicle_type).await?;
        }
    }

    Ok(())
}
