//! # Order Relay Service
//!
//! Binary entry point for the order relay HTTP service.
//!
//! This executable:
//! - Loads configuration from files and environment
//! - Initializes logging
//! - Constructs the vendor clients and the enrichment pipeline
//! - Starts the HTTP server from order-relay-api

use std::sync::Arc;

use order_relay_api::{start_server, AppState, LoggingConfig, ServiceConfig, ServiceError};
use order_relay_core::board::client::GraphqlBoardClient;
use order_relay_core::board::BoardGateway;
use order_relay_core::checkout::{CheckoutClient, LineItemSource};
use order_relay_core::export::docstore::HttpDocumentStore;
use order_relay_core::export::DocExporter;
use order_relay_core::notify::smtp::SmtpMailer;
use order_relay_core::notify::{Mailer, NotificationDispatcher};
use order_relay_core::records::{RecordSource, RecordsClient};
use order_relay_core::tracking::{ConversionTracker, PixelClient};
use order_relay_core::{EnrichmentPipeline, RecordUpserter, UpstreamError};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // -------------------------------------------------------------------------
    // Load configuration
    //
    // Sources (applied in order, later sources override earlier ones):
    //  1. /etc/order-relay/service.yaml          system-wide defaults
    //  2. ./config/service.yaml                  deployment-local override
    //  3. Path given by ORDER_RELAY_CONFIG_FILE  operator-specified file
    //  4. Environment variables prefixed ORDER_RELAY__ (double-underscore
    //     separator), e.g. ORDER_RELAY__SERVER__PORT=8080 sets server.port.
    //
    // Every section carries serde defaults, so absent files or an entirely
    // unconfigured environment still deserialize; `validate()` below decides
    // whether the result can actually run. A malformed file or an environment
    // variable that cannot be coerced to the right type IS a hard error
    // because it indicates deliberate-but-broken operator configuration.
    //
    // Logging is configured by this very file, so failures here can only go
    // to stderr.
    // -------------------------------------------------------------------------
    let mut config_builder = config::Config::builder()
        .add_source(
            config::File::with_name("/etc/order-relay/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        )
        .add_source(
            config::File::with_name("config/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        );

    // Optional explicit path supplied by the operator.
    let explicit_path = std::env::var("ORDER_RELAY_CONFIG_FILE").ok();
    if let Some(path) = explicit_path.as_deref().filter(|path| !path.is_empty()) {
        config_builder = config_builder.add_source(
            config::File::with_name(path)
                .required(true)
                .format(config::FileFormat::Yaml),
        );
    }

    let config = match config_builder
        .add_source(config::Environment::with_prefix("ORDER_RELAY").separator("__"))
        .build()
    {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to build configuration; aborting: {e}");
            std::process::exit(3);
        }
    };

    let service_config: ServiceConfig = match config.try_deserialize() {
        Ok(sc) => sc,
        Err(e) => {
            eprintln!(
                "Could not deserialize service configuration; aborting. \
                 Fix the configuration and restart: {e}"
            );
            std::process::exit(3);
        }
    };

    init_tracing(&service_config.logging);

    info!("Starting Order Relay Service");
    if let Some(path) = explicit_path.as_deref().filter(|path| !path.is_empty()) {
        info!(path = %path, "Loaded configuration from explicit path");
    }

    if let Err(e) = service_config.validate() {
        error!(error = %e, "Service configuration is invalid; aborting");
        std::process::exit(3);
    }

    // -------------------------------------------------------------------------
    // Construct clients and the enrichment pipeline
    //
    // Required clients abort startup when construction fails; the optional
    // export and tracking components are simply disabled when their
    // configuration sections are absent.
    // -------------------------------------------------------------------------
    let records: Arc<dyn RecordSource> = Arc::new(client_or_exit(
        "records client",
        RecordsClient::new(service_config.records.clone()),
    ));
    let gateway: Arc<dyn BoardGateway> = Arc::new(client_or_exit(
        "board client",
        GraphqlBoardClient::new(service_config.board.clone()),
    ));
    let line_items: Arc<dyn LineItemSource> = Arc::new(client_or_exit(
        "checkout client",
        CheckoutClient::new(service_config.checkout.clone()),
    ));
    let mailer: Arc<dyn Mailer> = Arc::new(client_or_exit(
        "mailer",
        SmtpMailer::new(&service_config.mail),
    ));

    let dispatcher = Arc::new(NotificationDispatcher::new(
        mailer,
        service_config.mail.admin_address.clone(),
    ));
    let upserter = Arc::new(RecordUpserter::new(
        records.clone(),
        gateway,
        service_config.board.clone(),
    ));

    let exporter = match &service_config.docstore {
        Some(docstore_config) => {
            let store = client_or_exit(
                "document store",
                HttpDocumentStore::new(docstore_config.clone()),
            );
            Some(Arc::new(DocExporter::new(
                Arc::new(store),
                docstore_config.clone(),
            )))
        }
        None => {
            info!("Document export is not configured; page export disabled");
            None
        }
    };

    let tracker: Option<Arc<dyn ConversionTracker>> = match &service_config.tracking {
        Some(tracking_config) => Some(Arc::new(client_or_exit(
            "conversion tracker",
            PixelClient::new(tracking_config.clone()),
        ))),
        None => {
            info!("Conversion tracking is not configured; tracking disabled");
            None
        }
    };

    let enrichment = Arc::new(EnrichmentPipeline::new(
        records,
        line_items,
        dispatcher.clone(),
        upserter.clone(),
        exporter,
        tracker,
    ));

    info!(
        host = %service_config.server.host,
        port = service_config.server.port,
        webhook_path = %service_config.webhook.endpoint_path,
        "Starting HTTP server"
    );

    let state = AppState::new(service_config, enrichment, dispatcher, upserter);

    // Start the server
    if let Err(e) = start_server(state).await {
        error!("Failed to start server: {}", e);

        let exit_code = match e {
            ServiceError::BindFailed { .. } => 1,
            ServiceError::ServerFailed { .. } => 2,
            ServiceError::Configuration(_) => 3,
        };

        std::process::exit(exit_code);
    }

    Ok(())
}

// ============================================================================
// Private helpers
// ============================================================================

/// Initializes the tracing subscriber from the logging section.
///
/// `RUST_LOG` overrides the configured level when set, which keeps ad-hoc
/// debugging possible without touching deployed configuration.
fn init_tracing(logging: &LoggingConfig) {
    let default_filter = format!(
        "order_relay_service={level},order_relay_api={level},order_relay_core={level},tower_http=info",
        level = logging.level
    );
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&default_filter));

    if logging.json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Unwraps a client constructor result, exiting with the configuration code
/// when it fails.
fn client_or_exit<T>(component: &'static str, result: Result<T, UpstreamError>) -> T {
    match result {
        Ok(client) => client,
        Err(err) => {
            error!(component, error = %err, "Failed to construct client; aborting");
            std::process::exit(3);
        }
    }
}
