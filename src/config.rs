#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub port: u16,
    // Ledger node configuration
    pub ledger_rpc_url: String,
    pub ledger_signer_key: String,
    // Messaging collaborator, optional
    pub chat_service_url: Option<String>,
}

impl Config {
    pub fn init() -> Config {
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let jwt_secret = std::env::var("JWT_SECRET_KEY").expect("JWT_SECRET_KEY must be set");

        let ledger_rpc_url = std::env::var("LEDGER_RPC_URL")
            .unwrap_or_else(|_| "http://localhost:9966".to_string());
        let ledger_signer_key =
            std::env::var("LEDGER_SIGNER_KEY").expect("LEDGER_SIGNER_KEY must be set");

        let chat_service_url = std::env::var("CHAT_SERVICE_URL").ok();

        Config {
            database_url,
            jwt_secret,
            port: 8000,
            ledger_rpc_url,
            ledger_signer_key,
            chat_service_url,
        }
    }
}
