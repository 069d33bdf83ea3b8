mod models;
mod service;
mod config;
mod dtos;
mod error;
mod db;
mod ledger;
mod utils;
mod middleware;
mod handler;
mod routes;

use std::sync::Arc;

use axum::http::{header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE}, HeaderValue, Method};
use config::Config;
use crate::db::db::DBClient;
use crate::ledger::client::LedgerClient;
use dotenv::dotenv;
use routes::create_router;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::filter::LevelFilter;

use service::{
    agreement_service::AgreementService,
    chain_sync_service::ChainSyncService,
    chat_service::ChatService,
    evaluation_service::EvaluationService,
    proposal_service::ProposalService,
};

#[derive(Debug, Clone)]
pub struct AppState {
    pub env: Config,
    pub db_client: Arc<DBClient>,
    // Services
    pub proposal_service: Arc<ProposalService>,
    pub agreement_service: Arc<AgreementService>,
    pub evaluation_service: Arc<EvaluationService>,
    pub chain_sync_service: Arc<ChainSyncService>,
}

impl AppState {
    pub fn new(db_client: DBClient, ledger: LedgerClient, config: Config) -> Self {
        let db_client_arc = Arc::new(db_client);

        let chat_service = Arc::new(ChatService::new(&config));

        let proposal_service = Arc::new(ProposalService::new(
            db_client_arc.clone(),
            chat_service,
        ));
        let agreement_service = Arc::new(AgreementService::new(db_client_arc.clone()));
        let evaluation_service = Arc::new(EvaluationService::new(db_client_arc.clone()));
        let chain_sync_service = Arc::new(ChainSyncService::new(
            db_client_arc.clone(),
            Arc::new(ledger),
        ));

        Self {
            env: config,
            db_client: db_client_arc,
            proposal_service,
            agreement_service,
            evaluation_service,
            chain_sync_service,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::DEBUG)
        .init();

    dotenv().ok();

    let config = Config::init();

    // Connect to PostgreSQL
    let pool = match PgPoolOptions::new()
            .max_connections(20)
            .min_connections(5)
            .connect(&config.database_url)
            .await
    {
        Ok(pool) => {
            println!("✅ Connection to the database is successful!");
            pool
        }
        Err(err) => {
            println!("🔥 Failed to connect to the database: {:?}", err);
            std::process::exit(1);
        }
    };

    let ledger = match LedgerClient::new(&config) {
        Ok(client) => {
            println!("✅ Ledger signer ready: {}", client.signer_address());
            client
        }
        Err(err) => {
            println!("🔥 Failed to initialize the ledger client: {:?}", err);
            std::process::exit(1);
        }
    };

    let db_client = DBClient::new(pool);

    let allowed_origins = vec![
        "https://app.bazari.com.br".parse::<HeaderValue>().unwrap(),
        "http://localhost:5173".parse::<HeaderValue>().unwrap(),
        "http://localhost:8000".parse::<HeaderValue>().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE])
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::PATCH]);

    let app_state = Arc::new(AppState::new(db_client, ledger, config.clone()));

    let app = create_router(app_state.clone()).layer(cors);

    println!(
        "🚀 Server is running on http://localhost:{}",
        config.port
    );

    // Start background jobs
    let app_state_clone = app_state.clone();
    tokio::spawn(async move {
        service::background_jobs::start_proposal_expiry_job(app_state_clone).await;
    });

    // Start the chain sync worker (consumes chain_sync_jobs)
    let chain_sync_worker = app_state.chain_sync_service.clone();
    tokio::spawn(async move {
        // Shutdown when the process receives CTRL+C
        chain_sync_worker
            .run_forever(async { let _ = tokio::signal::ctrl_c().await; })
            .await;
    });

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", &config.port))
        .await
        .unwrap();

    axum::serve(listener, app).await.unwrap();
}
