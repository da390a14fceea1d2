//! Petcare gateway - serves one pet's care controller over HTTP.
//!
//! # API Endpoints
//!
//! - `GET /pet` - Current view: stats, stage, diary, feedback, banners
//! - `POST /pet/select` - Make a pet active and load it
//! - `POST /pet/actions/{action}` - Feed, play, bathe or rest
//! - `POST /pet/refresh` - Reload from the server
//! - `POST /chat` - Assistant messages and slash-commands
//! - `GET /accessories` - Catalog and equip state
//! - `GET /telemetry/recent` - Local action journal
//! - `GET /health` - Health check

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use petcare::api::{AppState, router};
use petcare::config::Config;
use petcare::controller::{CareController, RefreshMode};
use petcare::remote::{AccessoryClient, ChatClient, PetApiClient, WalletClient, http_client};
use petcare::storage::Storage;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing with environment filter
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("petcare=info".parse()?))
        .init();

    // Load configuration from environment
    let config = Config::from_env();
    info!(port = config.port, api_url = %config.api_url, "Starting petcare gateway");

    // Shared HTTP client and credentials
    let client = http_client(config.request_timeout)?;
    let tokens = config.token_provider(&client);
    if tokens.is_none() {
        warn!("No credentials configured; backend calls are unauthenticated and chat is disabled");
    }

    // Initialize storage; the gateway runs without a journal if this fails
    let storage = match Storage::new(&config.database_url).await {
        Ok(storage) => {
            info!("Database initialized");
            Some(storage)
        }
        Err(e) => {
            warn!(error = %e, "Telemetry journal unavailable");
            None
        }
    };

    // Create backend clients and application state
    let api = PetApiClient::new(client.clone(), &config.api_url, tokens.clone());
    let wallet = WalletClient::new(client.clone(), &config.api_url, tokens.clone());
    let accessories = AccessoryClient::new(client.clone(), &config.api_url, tokens.clone());
    let chat = tokens
        .clone()
        .map(|tokens| ChatClient::new(client.clone(), &config.api_url, tokens));

    let controller = CareController::new(api, Some(wallet), storage.clone());
    let state = AppState::new(controller.clone(), chat, accessories, storage);

    // Load the configured pet before serving
    if let Some(pet_id) = &config.pet_id {
        controller.select_pet(pet_id);
        let closet = state.open_closet(pet_id);
        if let Err(e) = closet.load().await {
            warn!(error = %e, "Failed to load accessories");
        }
        if let Err(e) = controller.refresh_from_server(RefreshMode::Explicit).await {
            warn!(error = %e, "Initial load failed");
        }
        controller.refresh_balance().await;
    }

    // Start periodic refresh
    let _refresh = controller.spawn_refresh_loop(config.refresh_period);
    info!(period_secs = config.refresh_period.as_secs(), "Background refresh started");

    // Build router
    let app = router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Petcare is listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
            }
            controller.shutdown();
        })
        .await?;

    Ok(())
}
