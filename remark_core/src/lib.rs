pub mod entity;
pub mod ids;
pub mod models;
use tokio::sync::OnceCell;

use std::sync::Arc;

use crate::service::comments::CommentsService;

pub mod service;

pub mod error;

pub mod events;

pub mod config;

pub mod test_utils;

static REMARK_CORE: OnceCell<Arc<RemarkCore>> = OnceCell::const_new();

pub async fn core() -> Arc<RemarkCore> {
    REMARK_CORE
        .get_or_init(|| async move { Arc::new(RemarkCore::start().await.expect("failed to init")) })
        .await
        .clone()
}

/// Main runtime handle for Remark.
pub struct RemarkCore {
    pub config: config::RemarkConfig,

    /// Comment store façade shared by every caller in the process. Holding
    /// it here is what makes the event-handler and display-name registries
    /// process-wide.
    pub comments: Arc<CommentsService>,
}

impl RemarkCore {
    pub async fn start() -> Result<Self, Box<dyn std::error::Error>> {
        let config = config::get_or_init().await?;
        tracing::debug!(?config, "loaded configuration");

        // DB + migrations
        let db = models::open_or_create_db(&config).await;
        models::migrate_up(db.clone()).await;

        let comments = Arc::new(CommentsService::new(db));

        Ok(Self { config, comments })
    }
}

pub mod prelude {
    pub use super::ids;
    pub use super::entity;
    pub use super::models;

    pub use super::service;

    pub use super::error;

    pub use super::events;

    pub use super::config;
}
