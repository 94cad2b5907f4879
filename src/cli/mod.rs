//! CLI module for the Parkwise command-line interface.
//!
//! With no subcommand the binary runs the server. Every other subcommand
//! talks to a running server:
//! - `status` - check the server is reachable
//! - `login` / `logout` / `whoami` - manage the stored credentials
//! - `sessions`, `enter`, `exit`, `pay` - parking sessions (operator view)
//! - `stats` - dashboard counters (admin view)
//! - `alerts`, `spaces` - available to any logged-in user
//! - `export` - download a session report
//! - `seed`, `config check` - local maintenance, no server needed

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::api::ExportFormat;
use crate::client::{
    authorize, context::StoredUser, AccessDecision, ApiClient, ClientError, Destination,
    ExportParams, SessionContext,
};
use crate::config::Config;
use crate::db::{ParkingSessionResponse, PaymentMethod, UserRole};

/// CLI arguments structure
#[derive(Parser, Debug)]
#[command(name = "parkwise")]
#[command(author, version, about = "Parking lot sessions, payments and alerts", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "parkwise.toml")]
    pub config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// API URL to connect to
    #[arg(long, env = "PARKWISE_API_URL", default_value = "http://localhost:8080")]
    pub api_url: String,

    /// Credentials file (defaults to the user config dir)
    #[arg(long, env = "PARKWISE_CREDENTIALS")]
    pub credentials: Option<PathBuf>,

    /// Subcommand to run (if none, starts the server)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check that the server is up and show who is logged in
    Status,

    /// Log in and store the token
    Login {
        email: String,
        /// Password (prefer the environment variable over the flag)
        #[arg(long, env = "PARKWISE_PASSWORD")]
        password: String,
    },

    /// Revoke the stored token and forget it
    Logout,

    /// Show the logged-in user
    Whoami,

    /// List the most recent parking sessions
    Sessions {
        /// Only sessions with this status (active, finished, paid)
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Register a vehicle entering a space
    Enter {
        plate: String,
        /// Space number, e.g. A-01
        space: String,
        #[arg(short = 't', long, default_value = "car")]
        vehicle_type: String,
    },

    /// Register a vehicle leaving
    Exit {
        /// Session ID
        id: String,
    },

    /// Pay for a finished session
    Pay {
        /// Session ID
        id: String,
        #[arg(short, long, value_enum, default_value = "cash")]
        method: PayMethodArg,
    },

    /// Show session counters
    Stats,

    /// Show recent alerts
    Alerts {
        /// Number of alerts (default 3)
        #[arg(short = 'n', long)]
        limit: Option<i64>,
    },

    /// List parking spaces and whether they are occupied
    Spaces,

    /// Download a session report
    Export {
        /// pdf, excel or csv
        #[arg(short, long, default_value = "csv")]
        format: String,
        /// First day, YYYY-MM-DD
        #[arg(long)]
        start_date: Option<String>,
        /// Last day, YYYY-MM-DD
        #[arg(long)]
        end_date: Option<String>,
        #[arg(long)]
        status: Option<String>,
        /// Output file (default: sessions.<ext>)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Create demo accounts and spaces in the local database
    Seed,

    /// Configuration management commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Validate configuration file
    Check,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum PayMethodArg {
    Cash,
    Card,
    MobileMoney,
    Wallet,
}

impl From<PayMethodArg> for PaymentMethod {
    fn from(arg: PayMethodArg) -> Self {
        match arg {
            PayMethodArg::Cash => PaymentMethod::Cash,
            PayMethodArg::Card => PaymentMethod::Card,
            PayMethodArg::MobileMoney => PaymentMethod::MobileMoney,
            PayMethodArg::Wallet => PaymentMethod::Wallet,
        }
    }
}

impl Cli {
    fn credentials_path(&self) -> PathBuf {
        self.credentials
            .clone()
            .unwrap_or_else(SessionContext::default_path)
    }
}

// ============================================================================
// CLI Command Handlers
// ============================================================================

/// Run a CLI command
pub async fn run_command(cli: &Cli) -> Result<()> {
    let Some(command) = &cli.command else {
        // No subcommand means start the server - this is handled in main.rs
        return Ok(());
    };

    match command {
        Commands::Status => cmd_status(cli).await,
        Commands::Login { email, password } => cmd_login(cli, email, password).await,
        Commands::Logout => cmd_logout(cli).await,
        Commands::Whoami => cmd_whoami(cli).await,
        Commands::Sessions { status } => cmd_sessions(cli, status.as_deref()).await,
        Commands::Enter {
            plate,
            space,
            vehicle_type,
        } => cmd_enter(cli, plate, space, vehicle_type).await,
        Commands::Exit { id } => cmd_exit(cli, id).await,
        Commands::Pay { id, method } => cmd_pay(cli, id, (*method).into()).await,
        Commands::Stats => cmd_stats(cli).await,
        Commands::Alerts { limit } => cmd_alerts(cli, *limit).await,
        Commands::Spaces => cmd_spaces(cli).await,
        Commands::Export {
            format,
            start_date,
            end_date,
            status,
            output,
        } => {
            let params = ExportParams {
                format: format.clone(),
                start_date: start_date.clone(),
                end_date: end_date.clone(),
                status: status.clone(),
            };
            cmd_export(cli, params, output.clone()).await
        }
        Commands::Seed => cmd_seed(cli).await,
        Commands::Config(ConfigCommands::Check) => cmd_config_check(cli),
    }
}

/// A view the caller has been let into
struct Gated {
    ctx: SessionContext,
    client: ApiClient,
    user: StoredUser,
}

/// Load credentials and run them through the gate for a view
fn enter_view(cli: &Cli, required: Option<UserRole>) -> Result<Gated> {
    let mut ctx = SessionContext::load(cli.credentials_path())?;

    match authorize(&mut ctx, required) {
        AccessDecision::Allow(user) => {
            let client = ApiClient::new(&cli.api_url, ctx.token())?;
            Ok(Gated { ctx, client, user })
        }
        AccessDecision::Redirect(Destination::Login) => {
            anyhow::bail!("Not logged in. Run `parkwise login <email>` first.")
        }
        AccessDecision::Redirect(home) => {
            let needed = required.map(|r| r.as_str()).unwrap_or("a logged-in user");
            anyhow::bail!(
                "This view needs the {} role. Your home view is {}.",
                needed,
                home
            )
        }
    }
}

/// Map server errors for a gated call; an expired token wipes the stored login
fn server_error(gated: &mut Gated, err: ClientError) -> anyhow::Error {
    if err.status() == Some(reqwest::StatusCode::UNAUTHORIZED) {
        if let Err(e) = gated.ctx.clear() {
            tracing::warn!(error = %e, "Failed to clear credentials");
        }
        return anyhow::anyhow!("Your login has expired. Run `parkwise login <email>` again.");
    }
    anyhow::Error::new(err)
}

async fn cmd_status(cli: &Cli) -> Result<()> {
    let client = ApiClient::new(&cli.api_url, None)?;
    println!("Connecting to {}...", cli.api_url);

    let health = client
        .health()
        .await
        .context("Failed to connect to server. Is Parkwise running?")?;
    println!("Server:  {}", health.trim());

    let ctx = SessionContext::load(cli.credentials_path())?;
    match ctx.user() {
        Some(Ok(user)) if ctx.token().is_some_and(|t| !t.is_empty()) => {
            println!("Login:   {} ({})", user.email, user.role)
        }
        _ => println!("Login:   not logged in"),
    }
    Ok(())
}

async fn cmd_login(cli: &Cli, email: &str, password: &str) -> Result<()> {
    let client = ApiClient::new(&cli.api_url, None)?;
    let response = client
        .login(email, password)
        .await
        .context("Login failed")?;

    let mut ctx = SessionContext::load(cli.credentials_path())?;
    ctx.store(&response.token, &response.user)?;

    let home = crate::client::gate::default_destination(&response.user.role);
    println!(
        "Logged in as {} ({}). Home view: {}",
        response.user.name, response.user.role, home
    );
    Ok(())
}

async fn cmd_logout(cli: &Cli) -> Result<()> {
    let mut ctx = SessionContext::load(cli.credentials_path())?;
    if let Some(token) = ctx.token() {
        let client = ApiClient::new(&cli.api_url, Some(token))?;
        if let Err(e) = client.logout().await {
            tracing::warn!(error = %e, "Server did not accept logout");
        }
    }
    ctx.clear()?;
    println!("Logged out.");
    Ok(())
}

async fn cmd_whoami(cli: &Cli) -> Result<()> {
    let mut gated = enter_view(cli, None)?;
    let me = match gated.client.me().await {
        Ok(me) => me,
        Err(e) => return Err(server_error(&mut gated, e)),
    };

    println!("ID:      {}", me.id);
    println!("Name:    {}", me.name);
    println!("Email:   {}", me.email);
    println!("Role:    {}", me.role);
    println!("Wallet:  {:.2}", me.wallet_balance);
    Ok(())
}

async fn cmd_sessions(cli: &Cli, status: Option<&str>) -> Result<()> {
    let mut gated = enter_view(cli, Some(UserRole::Operator))?;
    let sessions = match gated.client.sessions(status).await {
        Ok(sessions) => sessions,
        Err(e) => return Err(server_error(&mut gated, e)),
    };

    if sessions.is_empty() {
        println!("No sessions found.");
        return Ok(());
    }

    println!();
    println!(
        "{:<36}  {:<12}  {:<10}  {:<8}  {:<24}  {:<9}  {:>8}",
        "ID", "PLATE", "TYPE", "SPACE", "ENTRY", "STATUS", "AMOUNT"
    );
    println!("{}", "-".repeat(120));
    for session in &sessions {
        print_session_row(session);
    }
    println!();
    Ok(())
}

fn print_session_row(session: &ParkingSessionResponse) {
    let amount = session
        .amount
        .map(|a| format!("{:.2}", a))
        .unwrap_or_else(|| "-".to_string());
    println!(
        "{:<36}  {:<12}  {:<10}  {:<8}  {:<24}  {:<9}  {:>8}",
        session.id,
        truncate(&session.vehicle.plate, 12),
        session.vehicle.vehicle_type,
        truncate(&session.space.number, 8),
        session.entry_time,
        session.status,
        amount
    );
}

async fn cmd_enter(cli: &Cli, plate: &str, space: &str, vehicle_type: &str) -> Result<()> {
    let mut gated = enter_view(cli, Some(UserRole::Operator))?;
    let session = match gated.client.enter(plate, vehicle_type, space).await {
        Ok(session) => session,
        Err(e) => return Err(server_error(&mut gated, e)),
    };

    println!(
        "[success] {} parked in {} (session {})",
        session.vehicle.plate, session.space.number, session.id
    );
    Ok(())
}

async fn cmd_exit(cli: &Cli, id: &str) -> Result<()> {
    let mut gated = enter_view(cli, Some(UserRole::Operator))?;
    let session = match gated.client.exit(id).await {
        Ok(session) => session,
        Err(e) => return Err(server_error(&mut gated, e)),
    };

    println!(
        "[success] {} left {} after {} min. Amount due: {:.2}",
        session.vehicle.plate,
        session.space.number,
        session.duration.unwrap_or_default(),
        session.amount.unwrap_or_default()
    );
    Ok(())
}

async fn cmd_pay(cli: &Cli, id: &str, method: PaymentMethod) -> Result<()> {
    let required = match method {
        PaymentMethod::Wallet => UserRole::Customer,
        _ => UserRole::Operator,
    };
    let mut gated = enter_view(cli, Some(required))?;
    let session = match gated.client.pay(id, method).await {
        Ok(session) => session,
        Err(e) => return Err(server_error(&mut gated, e)),
    };

    println!(
        "[success] Paid {:.2} by {} for {}",
        session.amount.unwrap_or_default(),
        method.as_str(),
        session.vehicle.plate
    );
    Ok(())
}

async fn cmd_stats(cli: &Cli) -> Result<()> {
    let mut gated = enter_view(cli, Some(UserRole::Admin))?;
    let stats = match gated.client.stats().await {
        Ok(stats) => stats,
        Err(e) => return Err(server_error(&mut gated, e)),
    };

    println!();
    println!("=== Parking Dashboard ===");
    println!();
    println!("  Total:      {}", stats.total);
    println!("  Active:     {}", stats.active);
    println!("  Completed:  {}", stats.completed);
    println!("  Paid:       {}", stats.paid);
    println!();
    Ok(())
}

async fn cmd_alerts(cli: &Cli, limit: Option<i64>) -> Result<()> {
    let mut gated = enter_view(cli, Some(UserRole::Customer))?;
    let alerts = match gated.client.alerts(limit).await {
        Ok(alerts) => alerts,
        Err(e) => return Err(server_error(&mut gated, e)),
    };

    if alerts.is_empty() {
        println!("No alerts.");
        return Ok(());
    }

    for alert in alerts {
        let marker = if alert.read { " " } else { "*" };
        println!(
            "{} [{:<7}] {}  {}",
            marker, alert.kind, alert.timestamp, alert.message
        );
    }
    Ok(())
}

async fn cmd_spaces(cli: &Cli) -> Result<()> {
    let mut gated = enter_view(cli, Some(UserRole::Customer))?;
    let spaces = match gated.client.spaces().await {
        Ok(spaces) => spaces,
        Err(e) => return Err(server_error(&mut gated, e)),
    };

    println!();
    println!("{:<10}  {:<10}  {:<12}  {:<8}", "NUMBER", "FLOOR", "TYPE", "STATE");
    println!("{}", "-".repeat(46));
    for space in spaces {
        println!(
            "{:<10}  {:<10}  {:<12}  {:<8}",
            space.number,
            space.floor.as_deref().unwrap_or("-"),
            space.vehicle_type,
            if space.occupied { "occupied" } else { "free" }
        );
    }
    println!();
    Ok(())
}

fn default_extension(format: &str) -> &'static str {
    match format.parse::<ExportFormat>() {
        Ok(ExportFormat::Pdf) => "pdf",
        Ok(ExportFormat::Excel) => "xlsx",
        Ok(ExportFormat::Csv) | Err(_) => "csv",
    }
}

async fn cmd_export(cli: &Cli, params: ExportParams, output: Option<PathBuf>) -> Result<()> {
    let mut gated = enter_view(cli, Some(UserRole::Operator))?;
    tracing::debug!(user = %gated.user.email, format = %params.format, "Requesting export");

    let body = match gated.client.export(&params).await {
        Ok(body) => body,
        Err(e) => {
            let err = server_error(&mut gated, e);
            eprintln!("[error] Export failed: {}", err);
            return Err(err);
        }
    };

    let output = output.unwrap_or_else(|| {
        PathBuf::from(format!("sessions.{}", default_extension(&params.format)))
    });
    std::fs::write(&output, &body)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!("[success] Wrote {} bytes to {}", body.len(), output.display());
    Ok(())
}

async fn cmd_seed(cli: &Cli) -> Result<()> {
    let config = Config::load(&cli.config)?;
    std::fs::create_dir_all(&config.database.data_dir).with_context(|| {
        format!(
            "Failed to create data directory {}",
            config.database.data_dir.display()
        )
    })?;

    let db = crate::db::init(&config.database).await?;
    crate::db::seed_demo_data(&db).await?;

    println!("Demo data ready. Accounts:");
    for account in &crate::db::DEMO_ACCOUNTS {
        println!("  {:<26} {:<9} {}", account.email, account.role.as_str(), account.password);
    }
    Ok(())
}

fn cmd_config_check(cli: &Cli) -> Result<()> {
    let config_path = &cli.config;

    println!("Checking configuration file: {}", config_path.display());
    println!();

    if !config_path.exists() {
        println!("[!!] Configuration file not found: {}", config_path.display());
        println!();
        println!("A default configuration will be used when starting the server.");
        println!("To create a custom configuration, copy parkwise.example.toml to parkwise.toml");
        return Ok(());
    }

    match Config::load(config_path) {
        Ok(config) => {
            println!("[OK] Configuration file is valid!");
            println!();
            println!("Server:");
            println!("  Host:         {}", config.server.host);
            println!("  API Port:     {}", config.server.api_port);
            println!("  Data Dir:     {}", config.database.data_dir.display());
            println!();
            println!("Pricing (per started hour):");
            println!("  Car:          {:.2}", config.pricing.car_hourly_rate);
            println!("  Truck:        {:.2}", config.pricing.truck_hourly_rate);
            println!("  Motorcycle:   {:.2}", config.pricing.motorcycle_hourly_rate);
            println!();
            println!("Security:");
            println!("  Token TTL:    {} h", config.auth.token_ttl_hours);
            println!(
                "  Login limit:  {}",
                if config.rate_limit.enabled {
                    format!(
                        "{} per {} s",
                        config.rate_limit.auth_requests_per_window,
                        config.rate_limit.window_seconds
                    )
                } else {
                    "disabled".to_string()
                }
            );
            Ok(())
        }
        Err(e) => {
            println!("[!!] Configuration file is invalid:");
            println!("     {:#}", e);
            anyhow::bail!("Invalid configuration")
        }
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
