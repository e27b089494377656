//! Mentora - mentorship session booking service

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mentora::{
    api::{self, AppState},
    config::Config,
    db::{
        self,
        repositories::{
            SqlxBookingRepository, SqlxLookupRepository, SqlxMessageRepository,
            SqlxSessionRepository, SqlxUserRepository, SqlxVerificationTokenRepository,
        },
    },
    services::{AccountService, BookingService, ContactService, Mailer, SmtpMailer},
    tasks::{jobs::JobContext, QueueDispatcher, ReminderSweep, TaskRunner},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mentora=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Mentora booking service...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    // Run migrations
    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    // Create repositories
    let user_repo = SqlxUserRepository::boxed(pool.clone());
    let token_repo = SqlxVerificationTokenRepository::boxed(pool.clone());
    let session_repo = SqlxSessionRepository::boxed(pool.clone());
    let booking_repo = SqlxBookingRepository::boxed(pool.clone());
    let lookup_repo = SqlxLookupRepository::boxed(pool.clone());
    let message_repo = SqlxMessageRepository::boxed(pool.clone());

    // Background task machinery: the dispatcher feeds the runner's channel
    let (dispatcher, job_rx) = QueueDispatcher::new();
    let dispatcher = Arc::new(dispatcher);
    let mailer: Arc<dyn Mailer> = Arc::new(SmtpMailer::new(&config.email)?);

    let runner = TaskRunner::new(
        job_rx,
        JobContext {
            mailer: mailer.clone(),
            bookings: booking_repo.clone(),
            app: config.app.clone(),
            tasks: config.tasks.clone(),
            delivery_failures: std::sync::atomic::AtomicU64::new(0),
        },
    );
    tokio::spawn(runner.run());

    let sweep = ReminderSweep::new(
        booking_repo.clone(),
        mailer,
        config.email.clone(),
        config.app.clone(),
        config.booking.clone(),
    );
    tokio::spawn(sweep.run());

    // Expired login sessions get cleaned up hourly
    {
        let sessions = session_repo.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(3600));
            loop {
                interval.tick().await;
                match sessions.delete_expired().await {
                    Ok(0) => {}
                    Ok(n) => tracing::debug!("Removed {} expired login sessions", n),
                    Err(e) => tracing::warn!("Session cleanup failed: {}", e),
                }
            }
        });
    }

    // Initialize services
    let accounts = Arc::new(AccountService::new(
        user_repo,
        token_repo,
        session_repo,
        dispatcher.clone(),
        config.app.clone(),
        config.booking.clone(),
    ));
    let bookings = Arc::new(BookingService::new(
        booking_repo,
        lookup_repo,
        dispatcher.clone(),
        config.email.clone(),
        config.app.clone(),
        config.booking.clone(),
    ));
    let contact = Arc::new(ContactService::new(
        message_repo,
        dispatcher,
        config.email.clone(),
    ));

    // Build application state
    let state = AppState {
        pool: pool.clone(),
        accounts,
        bookings,
        contact,
    };

    // Build router
    let app = api::build_router(state, &config.server.cors_origin);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    pool.close().await;
    Ok(())
}
