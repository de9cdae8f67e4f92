use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use clap::{Parser, Subcommand};
use rand::Rng;
use tracing_subscriber::EnvFilter;

use muxi_core::credentials::{hash_password, validate_password, validate_username};
use muxi_core::models::Group;
use muxi_db::{Database, DatabaseConfig};

/// Bytes of entropy in a generated JWT secret.
const SECRET_BYTES: usize = 32;

#[derive(Parser)]
#[command(name = "muxi", version, about = "Operator tools for the MuXi backend")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,

    /// Create an account in the admin group
    CreateAdmin {
        #[arg(short, long)]
        username: String,

        /// Reads from ADMIN_PASSWORD if not provided
        #[arg(short, long, env = "ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Print a random base64 secret suitable for JWT_SECRET
    GenSecret,

    /// Invalidate every token issued to a user
    RevokeTokens {
        #[arg(long)]
        user_id: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("muxi=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Migrate => {
            let db = connect_db().await?;
            db.migrate().await.context("Failed to run migrations")?;
            println!("Migrations applied");
        }
        Commands::CreateAdmin { username, password } => {
            let db = connect_db().await?;
            cmd_create_admin(&db, username.trim(), &password).await?;
        }
        Commands::GenSecret => println!("{}", generate_secret()),
        Commands::RevokeTokens { user_id } => {
            let db = connect_db().await?;
            if !db.user_repo().bump_token_version(user_id).await? {
                anyhow::bail!("User {user_id} not found");
            }
            println!("Revoked all tokens of user {user_id}");
        }
    }

    Ok(())
}

/// Connect to PostgreSQL using DATABASE_URL.
async fn connect_db() -> Result<Database> {
    let config = DatabaseConfig::from_env()?;
    Database::connect(&config)
        .await
        .context("Failed to connect to database")
}

async fn cmd_create_admin(db: &Database, username: &str, password: &str) -> Result<()> {
    validate_username(username)?;
    validate_password(password)?;

    let hash = hash_password(password).await?;
    let user = db.user_repo().create(username, &hash, Group::Admin).await?;

    println!("Created admin '{}' (id {})", user.username, user.id);
    Ok(())
}

fn generate_secret() -> String {
    let mut secret = [0u8; SECRET_BYTES];
    rand::rng().fill(&mut secret);
    STANDARD.encode(secret)
}
