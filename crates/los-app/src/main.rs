mod app_state;
mod cli;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use los_api::{ApiClient, ApiError};
use los_common::{LosError, ToastSink, UserId};
use los_config::LosConfig;
use los_realtime::EchoManager;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::identity::IdentityController;
use crate::app_state::settings;
use crate::app_state::store::QueryStore;
use crate::app_state::toasts::ConsoleToasts;
use crate::cli::{Command, ListenArgs};

const DEFAULT_LOG: &str = "los=info";

/// First non-empty directive: `RUST_LOG`, then `--log-level`, then config.
fn log_directive(rust_log: Option<&str>, cli: Option<&str>, config: &str) -> String {
    [rust_log, cli, Some(config)]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|d| !d.is_empty())
        .unwrap_or(DEFAULT_LOG)
        .to_string()
}

fn init_logging(cli_level: Option<&str>, config_level: &str) {
    let rust_log = std::env::var("RUST_LOG").ok();
    let directive = log_directive(rust_log.as_deref(), cli_level, config_level);
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|e| {
        eprintln!("Invalid log directive {directive:?} ({e}), using {DEFAULT_LOG}");
        EnvFilter::new(DEFAULT_LOG)
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn api_error(e: ApiError) -> LosError {
    LosError::Api(e.to_string())
}

struct Identity {
    token: String,
    user_id: UserId,
    /// Token minted by this process, revoked on exit.
    owned: bool,
}

async fn resolve_identity(api: &ApiClient, args: ListenArgs) -> Result<Identity, LosError> {
    match (args.token, args.email, args.password) {
        (Some(token), _, _) => {
            let user_id = match args.user_id {
                Some(id) => UserId::from(id),
                None => {
                    let user = api
                        .with_token(&token)
                        .current_user()
                        .await
                        .map_err(api_error)?;
                    user.id
                }
            };
            Ok(Identity {
                token,
                user_id,
                owned: false,
            })
        }
        (None, Some(email), Some(password)) => {
            let login = api.login(&email, &password).await.map_err(api_error)?;
            info!(user = %login.user.id, "Logged in");
            Ok(Identity {
                token: login.token,
                user_id: login.user.id,
                owned: true,
            })
        }
        _ => Err(LosError::Other(
            "either --token or --email with --password is required".into(),
        )),
    }
}

async fn listen(config: LosConfig, args: ListenArgs) -> Result<(), LosError> {
    let api = ApiClient::new(
        config.api.base_url.as_str(),
        config.api.prefix.as_str(),
        Duration::from_secs(u64::from(config.api.timeout_secs)),
    )
    .map_err(api_error)?;
    let identity = resolve_identity(&api, args).await?;

    let toasts = Arc::new(ConsoleToasts::new(config.notifications.toast_capacity as usize));
    let store = QueryStore::shared();
    let manager = EchoManager::new(settings::realtime_config(&config));
    let mut controller = IdentityController::new(
        manager,
        api.clone(),
        Arc::clone(&store),
        Arc::clone(&toasts) as Arc<dyn ToastSink>,
        settings::sound_player(&config.notifications),
        config.notifications.sound_enabled,
    );

    controller
        .sign_in(&identity.token, identity.user_id)
        .await
        .map_err(api_error)?;
    {
        let store = store.read().await;
        let counts = store.counts();
        info!(
            queries = store.queries().len(),
            pending = counts.raised_to_you.pending,
            state = ?controller.realtime_state(),
            "Listening for notifications (Ctrl-C to exit)"
        );
    }

    let expired = tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res?;
            false
        }
        _ = controller.expire_on_unauthorized() => true,
    };
    if let Some(user) = controller.user_id() {
        info!(user = %user, "Interrupted, signing out");
    }
    controller.sign_out().await;
    info!(toasts = toasts.visible_count(), "Signed out");

    if expired {
        return Err(api_error(ApiError::Unauthorized));
    }
    if identity.owned {
        if let Err(e) = api.with_token(identity.token).logout().await {
            warn!(error = %e, "Failed to revoke token");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    los_config::env::load_dotenv(Path::new(".env"));

    let args = cli::parse();

    let config = match los_config::load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("los-notify: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_logging(args.log_level.as_deref(), &config.logging.level);
    info!("los-notify v{} starting...", env!("CARGO_PKG_VERSION"));

    let result = match args.command {
        Command::Listen(listen_args) => listen(config, listen_args).await,
    };

    match result {
        Ok(()) => {
            info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "los-notify failed");
            ExitCode::FAILURE
        }
    }
}
