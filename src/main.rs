use fundledger::db::repo::settings;
use fundledger::{
    api, config::Config, db::init_db, DbPlanCatalog, HttpPlanCatalog, LedgerCoordinator,
    PlanCatalog, Repository,
};
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let port = config.port;

    // Initialize database and dependencies
    let pool = match init_db(&config.database_path).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };

    let repo = Arc::new(Repository::new(pool.clone()));

    // Stored settings win over the environment once they exist
    match repo.acquire().await {
        Ok(mut conn) => {
            match settings::seed_referral_settings(&mut conn, &config.referral_settings()).await {
                Ok(true) => tracing::info!("Seeded referral settings from configuration"),
                Ok(false) => {}
                Err(e) => {
                    eprintln!("Failed to seed referral settings: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Err(e) => {
            eprintln!("Failed to acquire connection: {}", e);
            std::process::exit(1);
        }
    }

    let catalog: Arc<dyn PlanCatalog> = match &config.plan_service_url {
        Some(url) => {
            tracing::info!("Using remote plan catalog at {}", url);
            Arc::new(HttpPlanCatalog::new(url.clone()))
        }
        None => Arc::new(DbPlanCatalog::new(pool)),
    };

    let coordinator = Arc::new(LedgerCoordinator::new(repo.clone(), catalog, &config));

    // Create router
    let app = api::create_router(api::AppState::new(repo, config, coordinator));

    // Bind to address
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!("Server listening on {}", addr);

    // Run server
    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}
