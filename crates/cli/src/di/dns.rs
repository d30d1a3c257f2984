use dnsmux_application::ports::Upstream;
use dnsmux_application::use_cases::RouteQueryUseCase;
use dnsmux_domain::Config;
use dnsmux_infrastructure::dns::{build_router, BufferPool};
use std::sync::Arc;
use tracing::info;

/// Shared runtime state handed to every listener.
pub struct DnsServices {
    pub router: Arc<RouteQueryUseCase>,
    pub pool: BufferPool,
}

impl DnsServices {
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        info!(handlers = config.handlers.len(), "Provisioning routing table");

        let router = Arc::new(build_router(&config.handlers).await?);

        Ok(Self {
            router,
            pool: BufferPool::new(),
        })
    }

    pub fn upstream(&self) -> Arc<dyn Upstream> {
        self.router.clone()
    }
}
