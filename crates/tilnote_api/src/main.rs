use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;
use tilnote_api::{build_router, AppState};
use tilnote_core::db::open_db;
use tilnote_core::{init_logging, AppConfig};
use tokio::net::TcpListener;

/// Optional path of the TOML config file.
const CONFIG_PATH_ENV: &str = "TILNOTE_CONFIG";

#[tokio::main]
async fn main() -> ExitCode {
    let config_path = std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from);
    let config = match AppConfig::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("tilnote-api: invalid configuration: {err}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(err) = init_logging(&config.logging, "api") {
        eprintln!("tilnote-api: failed to initialize logging: {err}");
        return ExitCode::FAILURE;
    }

    match serve(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=server_exit module=api status=error error={}", err);
            ExitCode::FAILURE
        }
    }
}

async fn serve(config: AppConfig) -> Result<(), String> {
    // Fail fast on an unreadable or too-new database before accepting traffic.
    open_db(&config.database.path)
        .map_err(|err| format!("failed to open database `{}`: {err}", config.database.path))?;

    let state = AppState::from_config(&config).map_err(|err| err.to_string())?;
    let address = config.server.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|err| format!("failed to bind `{address}`: {err}"))?;
    info!(
        "event=server_start module=api status=ok address={} database={}",
        address, config.database.path
    );

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| format!("server error: {err}"))?;

    info!("event=server_stop module=api status=ok");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("event=shutdown_signal module=api status=error error={}", err);
        std::future::pending::<()>().await;
    }
    info!("event=shutdown_signal module=api status=ok");
}
