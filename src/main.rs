use std::{process::ExitCode, sync::Arc};

use folio::{
    application::{
        error::AppError,
        repos::{ContentQuery, Repositories},
        services::{ServiceSettings, Services},
    },
    config,
    infra::{
        backend::{OfflineBackend, RestBackend},
        http::{self, HttpState},
        snapshot::SnapshotStore,
        telemetry,
    },
};
use serde::Serialize;
use serde_json::json;
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            report_application_error(&error);
            ExitCode::from(error.exit_code())
        }
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_writer(std::io::stderr)
        .with_max_level(Level::ERROR)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(&settings).await,
        config::Command::Posts(args) => run_posts(&settings, args).await,
        config::Command::Tags => run_tags(&settings).await,
        config::Command::Source => run_source(&settings).await,
        config::Command::Snapshot(args) => run_snapshot(&settings, args).await,
    }
}

async fn run_serve(settings: &config::Settings) -> Result<(), AppError> {
    let services = build_services(settings).await?;

    let info = services.content.get_data_source_info().await;
    info!(
        dynamic_available = info.is_dynamic_available,
        source = %info.data_source,
        policy = settings.resolver.fallback_policy.as_str(),
        "content sources ready"
    );

    http::serve(&settings.server, HttpState::new(services)).await?;
    Ok(())
}

async fn run_posts(settings: &config::Settings, args: config::PostsArgs) -> Result<(), AppError> {
    let services = build_services(settings).await?;

    match args.command {
        config::PostsCommand::List(list) => {
            let query = ContentQuery {
                tags: list.tags,
                search: list.search,
                limit: list.limit,
                offset: list.offset,
            };
            let resolved = services.content.get_published_records(query).await;
            print_json(&resolved)
        }
        config::PostsCommand::Show(show) => {
            let resolved = services
                .content
                .get_record_by_slug(&show.slug, show.include_unpublished)
                .await
                .map_err(|err| AppError::request(err.to_string()))?;
            match resolved.data {
                Some(record) => print_json(&record),
                None => Err(AppError::NotFound),
            }
        }
    }
}

async fn run_tags(settings: &config::Settings) -> Result<(), AppError> {
    let services = build_services(settings).await?;
    print_json(&services.content.list_tags().await)
}

async fn run_source(settings: &config::Settings) -> Result<(), AppError> {
    let services = build_services(settings).await?;
    let info = services.content.get_data_source_info().await;
    print_json(&json!({
        "is_dynamic_available": info.is_dynamic_available,
        "data_source": info.data_source,
        "backend_url": settings.backend.url.as_ref().map(|url| url.as_str()),
        "fallback_policy": settings.resolver.fallback_policy,
    }))
}

async fn run_snapshot(
    settings: &config::Settings,
    args: config::SnapshotArgs,
) -> Result<(), AppError> {
    match args.command {
        config::SnapshotCommand::Check(check) => {
            let path = check.file.as_deref().or(settings.snapshot.path.as_deref());
            let store = SnapshotStore::load(path).await?;
            let summary = store.summary();
            info!(records = summary.records, "snapshot is valid");
            print_json(&json!({
                "path": path.map(|path| path.display().to_string()),
                "records": summary.records,
                "published": summary.published,
                "drafts": summary.drafts,
                "tags": summary.tags,
            }))
        }
    }
}

async fn build_services(settings: &config::Settings) -> Result<Services, AppError> {
    let snapshot = Arc::new(SnapshotStore::load(settings.snapshot.path.as_deref()).await?);
    let repositories = build_repositories(settings)?;
    Ok(Services::build(
        repositories,
        snapshot,
        &ServiceSettings::from(settings),
    ))
}

fn build_repositories(settings: &config::Settings) -> Result<Repositories, AppError> {
    match settings.backend.url.as_ref() {
        Some(url) => {
            let backend = RestBackend::new(
                url.as_str(),
                settings.backend.api_key.as_deref(),
                settings.backend.timeout(),
            )?;
            info!(backend = %url, "using live backend");
            Ok(Repositories::from_backend(Arc::new(backend)))
        }
        None => {
            info!("no live backend configured; serving the static snapshot");
            Ok(Repositories::from_backend(Arc::new(OfflineBackend)))
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let out = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::request(format!("failed to render output: {err}")))?;
    println!("{out}");
    Ok(())
}
