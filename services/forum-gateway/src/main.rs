use actix_cors::Cors;
use actix_web::{dev::Service, middleware, web, App, HttpServer};
use anyhow::Context;
use dotenv::dotenv;
use forum_gateway::{
    config::{Config, LoggingConfig},
    database::PgStore,
    handlers,
    metrics::{self, HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION},
    nats::{EventPublisher, NatsProducer, NoopPublisher},
    security_middleware::TokenAuth,
    services::EconomyService,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_target(false);

    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = Config::from_env().context("Failed to load configuration")?;
    init_tracing(&config.logging);
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    info!("Starting Forum Gateway on port {}", config.server.port);

    metrics::register_metrics(prometheus::default_registry())
        .map_err(|e| anyhow::anyhow!("Failed to register metrics: {}", e))?;

    let store = PgStore::connect(&config.database)
        .await
        .context("Failed to connect to database")?;
    if config.database.run_migrations {
        store.migrate().await?;
    }

    let events: Arc<dyn EventPublisher> = if config.nats.enabled {
        Arc::new(
            NatsProducer::new(&config.nats.url, &config.nats.topic_prefix)
                .await
                .context("Failed to connect to NATS")?,
        )
    } else {
        warn!("NATS disabled; economy events will not be published");
        Arc::new(NoopPublisher)
    };

    let service = Arc::new(EconomyService::new(
        store.clone(),
        config.economy.clone(),
        events,
    )?);

    let enable_cors = config.server.enable_cors;
    HttpServer::new(move || {
        let cors = if enable_cors {
            Cors::permissive()
        } else {
            Cors::default()
        };

        App::new()
            .wrap(TokenAuth::new(store.clone()))
            .wrap(cors)
            .wrap_fn(|req, srv| {
                let method = req.method().to_string();
                let path = req.match_pattern().unwrap_or_else(|| "unmatched".to_string());
                let timer = HTTP_REQUEST_DURATION
                    .with_label_values(&[method.as_str(), path.as_str()])
                    .start_timer();
                let fut = srv.call(req);

                async move {
                    let res = fut.await;
                    timer.observe_duration();
                    let status = match &res {
                        Ok(response) => response.status(),
                        Err(err) => err.as_response_error().status_code(),
                    };
                    HTTP_REQUESTS_TOTAL
                        .with_label_values(&[method.as_str(), path.as_str(), status.as_str()])
                        .inc();
                    res
                }
            })
            .wrap(middleware::Logger::default())
            .wrap(middleware::NormalizePath::trim())
            .app_data(web::Data::new(service.clone()))
            .configure(handlers::configure_routes)
    })
    .workers(config.server.workers)
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await?;

    Ok(())
}
