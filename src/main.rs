// src/main.rs

use std::{net::SocketAddr, sync::Arc, time::Duration};

use dotenvy::dotenv;
use exam_platform::{
    config::Config,
    models::user::{NewUser, Role, normalize_email},
    routes,
    state::AppState,
    store::{MemoryStore, PgStore, Store},
    upload::{UploadPipeline, cloudinary::CloudinaryHost},
    utils::hash::hash_password,
};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenv().ok();

    // Load configuration from environment
    let config = Config::from_env();

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => Arc::new(connect_postgres(url).await),
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store. Data is lost on restart.");
            Arc::new(MemoryStore::new())
        }
    };

    let uploads = match &config.cloudinary {
        Some(cdn) => match CloudinaryHost::new(cdn) {
            Ok(host) => {
                tracing::info!("Image uploads go to cloud '{}'", cdn.cloud_name);
                UploadPipeline::new(Arc::new(host))
            }
            Err(e) => {
                tracing::error!("Invalid Cloudinary settings, uploads disabled: {}", e);
                UploadPipeline::unconfigured()
            }
        },
        None => {
            tracing::warn!("Cloudinary not configured, image uploads are disabled.");
            UploadPipeline::unconfigured()
        }
    };

    // Seed Master User
    if let Err(e) = seed_master_user(store.as_ref(), &config).await {
        tracing::error!("Failed to seed master user: {:?}", e);
    }

    let state = AppState::new(store, config.clone(), uploads);
    let app = routes::create_router(state);

    let addr: SocketAddr = config
        .bind_addr
        .parse()
        .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 3000)));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listening address");

    axum::serve(listener, app).await.expect("Server error");
}

/// Connects with retry, then applies migrations.
async fn connect_postgres(url: &str) -> PgStore {
    let mut retry_count = 0;
    let pool = loop {
        match PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(url)
            .await
        {
            Ok(pool) => break pool,
            Err(e) => {
                retry_count += 1;
                if retry_count > 5 {
                    panic!("Failed to connect to database after 5 retries: {}", e);
                }
                tracing::warn!("Database not ready, retrying in 2s... (Attempt {})", retry_count);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    };

    tracing::info!("Database connected...");

    // Run Migrations Automatically
    tracing::info!("Running migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Migrations applied successfully.");

    PgStore::new(pool)
}

async fn seed_master_user(store: &dyn Store, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if let (Some(email), Some(password)) = (&config.master_email, &config.master_password) {
        let email = normalize_email(email);
        if store.get_user_by_email(&email).await?.is_none() {
            tracing::info!("Seeding master user: {}", email);
            store
                .create_user(NewUser {
                    email,
                    name: "Master".to_string(),
                    role: Role::Master,
                    phone: None,
                    password_hash: hash_password(password)?,
                })
                .await?;
            tracing::info!("Master user created successfully.");
        }
    }
    Ok(())
}
