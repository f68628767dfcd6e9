use std::process;

use flog::{
    application::{auth::hash_password, error::AppError},
    config,
    infra::{
        error::InfraError,
        http::{self, AppState},
        telemetry,
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
    let (cli_args, settings) = config::load_with_cli().map_err(InfraError::from)?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    match command {
        config::Command::Serve(_) => {
            telemetry::init(&settings.logging)?;
            run_serve(settings).await
        }
        config::Command::HashPassword(args) => {
            println!("{}", hex::encode(hash_password(&args.password)));
            Ok(())
        }
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    if settings.auth.password_sha256.is_none() {
        warn!(
            target = "flog::serve",
            "auth.password_sha256 is not set; client API logins will be refused"
        );
    }

    let state = AppState::in_memory(&settings).await?;
    let router = http::build_router(state);

    let addr = settings.server.addr;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| InfraError::Bind { addr, source })?;
    info!(
        target = "flog::serve",
        addr = %addr,
        uploads = %settings.uploads.directory.display(),
        "listening"
    );

    axum::serve(listener, router.into_make_service())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}
