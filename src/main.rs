use sea_orm::{Database, DatabaseConnection};

use credence::config::{self, AuthSettings};
use credence::stores::RbacStore;
use migration::{Migrator, MigratorTrait};

/// Bootstrap entry: prepares the database an embedding application will use.
/// Connects, applies pending migrations, and seeds the role and permission
/// catalog. Safe to run repeatedly.
#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    config::init_logging().expect("Failed to initialize logging");

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite://auth.db?mode=rwc".to_string());

    let db: DatabaseConnection = Database::connect(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Connected to database: {}", database_url);

    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");
    tracing::info!("Database migrations completed");

    RbacStore::new()
        .seed_defaults(&db, chrono::Utc::now().timestamp())
        .await
        .expect("Failed to seed role and permission catalog");

    let settings = AuthSettings::from_env();
    tracing::info!(
        max_login_attempts = settings.security.max_login_attempts,
        lockout_duration_minutes = settings.security.lockout_duration_minutes,
        email_validation_enabled = settings.email_validation.enabled,
        "Bootstrap complete"
    );
}
