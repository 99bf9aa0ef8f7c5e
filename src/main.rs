use std::{process, sync::Arc};

use serde::Serialize;
use time::OffsetDateTime;
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;
use uuid::Uuid;
use vigil::{
    application::{
        context::{ContextOptions, InspectionContext},
        defects::{DefectsGateway, DisabledDefects},
        error::AppError,
        remote::RemoteApi,
        repos::{InspectionQueryFilter, SyncStateFilter},
        sync::FlushOutcome,
    },
    config,
    domain::types::{InspectionStatus, SyncStatus},
    infra::{
        db::SqliteRepositories,
        error::InfraError,
        remote::{HttpRemote, OfflineRemote},
        telemetry,
    },
};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, kind = error.kind(), "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, kind = error.kind(), "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Status(config::StatusArgs::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    let repositories = init_repositories(&settings).await?;
    let result = match command {
        config::Command::Migrate => {
            info!(
                path = %settings.database.path.display(),
                "Database schema is up to date"
            );
            Ok(())
        }
        command => {
            let context = build_context(&repositories, &settings)?;
            run_command(&context, &settings, command).await
        }
    };

    repositories.close().await;
    result
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<SqliteRepositories>, AppError> {
    let pool = SqliteRepositories::connect(
        &settings.database.path,
        settings.database.max_connections.get(),
        settings.database.busy_timeout,
    )
    .await
    .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    SqliteRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(Arc::new(SqliteRepositories::new(pool)))
}

fn build_context(
    repositories: &Arc<SqliteRepositories>,
    settings: &config::Settings,
) -> Result<InspectionContext, AppError> {
    let (remote, defects): (Arc<dyn RemoteApi>, Arc<dyn DefectsGateway>) =
        match settings.sync.remote_url.as_ref() {
            Some(url) => {
                let http = Arc::new(HttpRemote::new(
                    url.as_str(),
                    settings.sync.api_token.clone(),
                    settings.sync.request_timeout,
                )?);
                (
                    http.clone() as Arc<dyn RemoteApi>,
                    http as Arc<dyn DefectsGateway>,
                )
            }
            None => {
                info!("No remote configured; working offline");
                (
                    Arc::new(OfflineRemote) as Arc<dyn RemoteApi>,
                    Arc::new(DisabledDefects) as Arc<dyn DefectsGateway>,
                )
            }
        };

    Ok(InspectionContext::new(
        repositories.stores(),
        remote,
        defects,
        ContextOptions {
            code_prefix: settings.inspections.code_prefix.clone(),
            request_timeout: settings.sync.request_timeout,
        },
    ))
}

async fn run_command(
    context: &InspectionContext,
    settings: &config::Settings,
    command: config::Command,
) -> Result<(), AppError> {
    match command {
        config::Command::Migrate => Ok(()),
        config::Command::Sync => {
            context.reconcile_on_startup().await?;
            let outcome = context.sync().await?;
            report_flush(&outcome);
            Ok(())
        }
        config::Command::Retry(args) => {
            context.reconcile_on_startup().await?;
            let outcome = context.force_retry(args.record_id).await?;
            report_flush(&outcome);
            Ok(())
        }
        config::Command::Status(args) => {
            context.start(settings.sync.sync_on_startup).await?;
            let mut filter = SyncStateFilter::default();
            if args.failed {
                filter.statuses.push(SyncStatus::Failed);
            }
            if args.needs_review {
                filter.needs_review = Some(true);
            }
            let states = context.sync_states(&filter).await?;
            let queued = context.sync_queue_count().await?;
            info!(queued, records = states.len(), "Sync status");
            print_json(&states)
        }
        config::Command::Summary => {
            context.start(settings.sync.sync_on_startup).await?;
            print_json(&context.summary().await?)
        }
        config::Command::Inspections(config::InspectionsCommand::List(args)) => {
            let filter = list_filter(args)?;
            let records = context.load_inspections(&filter).await?;
            print_json(&records)
        }
        config::Command::Inspections(config::InspectionsCommand::Show(args)) => {
            let id = match Uuid::parse_str(&args.reference) {
                Ok(id) => id,
                Err(_) => context.load_inspection_by_code(&args.reference).await?.id,
            };
            print_json(&context.load_inspection(id).await?)
        }
    }
}

fn list_filter(args: config::ListInspectionsArgs) -> Result<InspectionQueryFilter, AppError> {
    let statuses = args
        .statuses
        .iter()
        .map(|value| value.parse::<InspectionStatus>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(AppError::validation)?;

    Ok(InspectionQueryFilter {
        statuses,
        site_id: args.site_id,
        asset_id: args.asset_id,
        location_id: args.location_id,
        template_id: args.template_id,
        inspector_id: args.inspector_id,
        overdue_at: args.overdue.then(OffsetDateTime::now_utc),
        has_defects: args.has_defects.then_some(true),
        search: args.search,
        limit: Some(args.limit),
        offset: args.offset,
        ..InspectionQueryFilter::default()
    })
}

fn report_flush(outcome: &FlushOutcome) {
    match outcome {
        FlushOutcome::Completed(report) => info!(
            sent = report.sent,
            failed = report.failed,
            conflicts = report.conflicts,
            flagged = report.flagged,
            remaining = report.remaining,
            interrupted = report.interrupted,
            "Sync finished"
        ),
        FlushOutcome::Offline { pending } => info!(pending, "Remote unreachable; nothing sent"),
        FlushOutcome::AlreadyRunning => info!("A sync is already running"),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::unexpected(format!("failed to render output: {err}")))?;
    println!("{rendered}");
    Ok(())
}
