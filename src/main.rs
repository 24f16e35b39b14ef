use std::{
    process,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Instant,
};

use futures::stream::{self, StreamExt};
use ogcache::{
    application::{
        error::AppError,
        metadata::MetadataTable,
        og_image::{ArtifactSource, OgContext, OgImageService},
    },
    config,
    infra::{
        artifacts::open_artifact_store, error::InfraError, http, http::HttpState,
        renderer::CommandRenderer, telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::from(InfraError::configuration(err.to_string())))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    let service = Arc::new(build_og_image_service(&settings)?);

    match command {
        config::Command::Serve(_) => run_serve(settings, service).await,
        config::Command::Render(args) => run_render(service, args).await,
        config::Command::Warm(args) => run_warm(settings, service, args).await,
    }
}

fn build_og_image_service(settings: &config::Settings) -> Result<OgImageService, AppError> {
    let table = MetadataTable::load(&settings.metadata.path, settings.metadata.fallback.clone())?;
    info!(
        target = "ogcache::startup",
        path = %settings.metadata.path.display(),
        entries = table.identifiers().len(),
        fallback = table.fallback_marker(),
        "Loaded OG metadata table"
    );

    let context = Arc::new(OgContext::new(table, settings.render.brand.clone()));
    let store = open_artifact_store(&settings.store)?;
    let renderer = Arc::new(CommandRenderer::from_settings(&settings.render));

    Ok(OgImageService::new(context, store, renderer).with_ttl(settings.store.ttl))
}

async fn run_serve(
    settings: config::Settings,
    service: Arc<OgImageService>,
) -> Result<(), AppError> {
    let state = HttpState {
        og_images: service,
        max_age_seconds: settings.response.max_age.get(),
    };
    let router = http::build_router(state, &settings.server.route);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "ogcache::serve",
        addr = %settings.server.addr,
        route = %settings.server.route,
        backend = ?settings.store.backend,
        "Listening"
    );

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(target = "ogcache::serve", error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!(target = "ogcache::serve", "Shutdown requested");
}

async fn run_render(service: Arc<OgImageService>, args: config::RenderArgs) -> Result<(), AppError> {
    let image = service.generate(&args.identifier).await?;

    tokio::fs::write(&args.output, &image.bytes)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "ogcache::render",
        identifier = %args.identifier,
        cache_key = %image.key,
        source = image.source.as_str(),
        bytes = image.bytes.len(),
        output = %args.output.display(),
        "Wrote OG image"
    );
    Ok(())
}

async fn run_warm(
    settings: config::Settings,
    service: Arc<OgImageService>,
    args: config::WarmArgs,
) -> Result<(), AppError> {
    if settings.store.backend == config::StoreBackend::Memory {
        warn!(
            target = "ogcache::warm",
            "Warming the in-memory store only lasts for this process"
        );
    }

    let concurrency = args.concurrency.clamp(1, 32);
    let identifiers: Vec<String> = service
        .context()
        .table
        .identifiers()
        .into_iter()
        .map(str::to_string)
        .collect();
    let total = identifiers.len();

    info!(
        target = "ogcache::warm",
        concurrency,
        identifiers = total,
        "Starting warm"
    );

    let started_at = Instant::now();
    let rendered = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));

    stream::iter(identifiers)
        .for_each_concurrent(Some(concurrency), |identifier| {
            let service = service.clone();
            let rendered = rendered.clone();
            let failed = failed.clone();
            async move {
                match service.generate(&identifier).await {
                    Ok(image) => {
                        if image.source == ArtifactSource::Rendered {
                            rendered.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                    Err(err) => {
                        failed.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            target = "ogcache::warm",
                            identifier = %identifier,
                            error = %err,
                            "Failed to warm OG image"
                        );
                    }
                }
            }
        })
        .await;

    let rendered = rendered.load(Ordering::Relaxed);
    let failed = failed.load(Ordering::Relaxed);
    info!(
        target = "ogcache::warm",
        identifiers = total,
        rendered,
        failed,
        elapsed_ms = started_at.elapsed().as_millis() as u64,
        "Warm finished"
    );

    if failed > 0 {
        return Err(AppError::unexpected(format!(
            "{failed} of {total} identifiers failed to render"
        )));
    }
    Ok(())
}
