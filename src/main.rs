//! bits-auth application entry point.
//!
//! Bootstraps the server:
//! 1. Load configuration from environment
//! 2. Open the user directory (Redis or in-memory)
//! 3. Spawn the expired-nonce sweep
//! 4. Build router with API routes, CORS and request tracing
//! 5. Start Axum server
//!
//! Also supports `keygen` subcommand for deriving wallet keys.

use axum::http::{header, HeaderValue, Method};
use bits_auth::{
    auth::encoding::{Base64, TextEncoding},
    auth::{nonce::NonceStore, session::AuthSession},
    cleanup,
    config::{Config, StoreBackend},
    routes::{self, AppState},
    storage::{MemoryDirectory, RedisDirectory, UserDirectory},
    wallet::LocalWallet,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

fn print_keygen_usage() {
    eprintln!("Usage: bits-auth keygen [<passphrase> <salt>]");
    eprintln!();
    eprintln!("Derive an Ed25519 wallet key from passphrase + salt (Argon2id) and");
    eprintln!("print its base58 address. Without arguments, generate a random key");
    eprintln!("and print the address and the base64 seed.");
    eprintln!();
    eprintln!("Example:");
    eprintln!("  bits-auth keygen 'correct horse battery staple' alice");
}

fn keygen(args: &[String]) -> i32 {
    match args {
        [] => {
            let wallet = LocalWallet::generate();
            println!("address: {}", wallet.identity());
            println!("seed:    {}", Base64.encode(&*wallet.seed()));
            0
        }
        [passphrase, salt] => match LocalWallet::from_passphrase(passphrase, salt) {
            Ok(wallet) => {
                println!("{}", wallet.identity());
                0
            }
            Err(e) => {
                eprintln!("Error deriving key: {}", e);
                1
            }
        },
        _ => {
            print_keygen_usage();
            1
        }
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    // No origins configured: deny all cross-origin requests
    if origins.is_empty() {
        return CorsLayer::new();
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() {
    // Check for keygen subcommand
    let args: Vec<String> = std::env::args().collect();
    if args.len() >= 2 && args[1] == "keygen" {
        std::process::exit(keygen(&args[2..]));
    }

    // Initialize tracing with env filter support (RUST_LOG)
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config from environment
    let config = Config::from_env().expect("Failed to load config");
    tracing::info!("Starting bits-auth on {}", config.bind_addr);

    let directory: Arc<dyn UserDirectory> = match config.store_backend {
        StoreBackend::Redis => {
            let url = config
                .redis_url
                .as_deref()
                .expect("REDIS_URL is required for the redis backend");
            Arc::new(
                RedisDirectory::connect(url)
                    .await
                    .expect("Failed to connect to Redis"),
            )
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory nonce storage; nonces do not survive restarts");
            Arc::new(MemoryDirectory::new())
        }
    };

    let nonces = NonceStore::new(directory, config.sign_in.nonce_ttl);
    tokio::spawn(cleanup::run_sweep_loop(
        nonces.clone(),
        config.sweep_interval,
    ));

    let state = AppState {
        auth: Arc::new(AuthSession::new(nonces, config.sign_in.clone())),
    };

    let app = routes::api_router()
        .layer(cors_layer(&config.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Bind to configured address
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .expect("Failed to bind");
    tracing::info!("Listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
}
