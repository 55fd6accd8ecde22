//! # shop-accounts
//!
//! Account and cart HTTP service.
//!
//! ## Usage
//!
//! ```bash
//! # Set environment variables
//! export JWT_SECRET=change-me
//! export PORT=8080
//!
//! # Run the server
//! shop-accounts
//! ```

use shop_api::{routes, AppConfig, AppState};
use shop_memory::{MemoryAccountService, ProductCatalog};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    print_banner();

    let config = AppConfig::from_env()?;
    let addr = config.socket_addr()?;
    let is_prod = config.is_production();

    // Handler layer
    let catalog = ProductCatalog::load()?;
    info!("Products loaded: {}", catalog.products.len());
    let service = MemoryAccountService::new(catalog, config.token_codec());

    info!("Environment: {}", config.environment);
    info!(
        "Send-code limit: {} per {}s per client",
        config.send_code_limit, config.send_code_window_secs
    );

    let state = AppState::new(config, Arc::new(service));
    let app = routes::create_router(state)?;

    info!("🚀 shop-accounts starting on http://{}", addr);

    if !is_prod {
        info!("📝 Health: http://{}/health", addr);
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

fn print_banner() {
    println!(
        r#"
  🛒 shop-accounts 🛒
  ━━━━━━━━━━━━━━━━━━━━━━━
  Accounts & cart service
  Version: {}
  
"#,
        env!("CARGO_PKG_VERSION")
    );
}
