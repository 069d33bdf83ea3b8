pub mod agreement_service;
pub mod background_jobs;
pub mod chain_sync_service;
pub mod chat_service;
pub mod error;
pub mod evaluation_service;
pub mod proposal_service;
