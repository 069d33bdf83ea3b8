use std::sync::Arc;

use tokio::time::{interval, Duration};

use crate::{db::proposaldb::ProposalExt, AppState};

/// Sweep that persists EXPIRED on live proposals past their deadline. Reads
/// already treat overdue rows as expired, the sweep makes it durable.
pub async fn start_proposal_expiry_job(app_state: Arc<AppState>) {
    let mut interval = interval(Duration::from_secs(600));

    loop {
        interval.tick().await;

        match app_state.db_client.expire_overdue_proposals().await {
            Ok(0) => {}
            Ok(expired) => tracing::info!("proposal expiry sweep flipped {} proposals", expired),
            Err(e) => tracing::error!("proposal expiry sweep failed: {}", e),
        }
    }
}
