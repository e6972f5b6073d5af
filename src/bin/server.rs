use std::{
    fs::OpenOptions,
    net::SocketAddr,
    path::{Path, PathBuf},
    process::exit,
    sync::Arc,
};

use axum::{
    Router,
    extract::{MatchedPath, Request},
    middleware,
};
use axum_server::Handle;
use clap::Parser;
use rusqlite::Connection;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

use cashtrack::{
    AppConfig, AppState, Environment, OAuthCredentials, build_router, graceful_shutdown,
    logging_middleware,
};

/// The REST API server for CashTrack.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long, env = "DATABASE_PATH")]
    db_path: PathBuf,

    /// The port to serve the API from.
    #[arg(short, long, env = "PORT", default_value_t = 5000)]
    port: u16,

    /// The secret for signing auth tokens.
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,

    /// The secret for encrypting the OAuth state cookie. Defaults to a random key per process.
    #[arg(long, env = "SESSION_SECRET", hide_env_values = true)]
    session_secret: Option<String>,

    /// The deployment environment. Production marks the auth cookie `Secure` and `HttpOnly`.
    #[arg(long, env = "APP_ENV", value_enum, default_value_t = Environment::Development)]
    app_env: Environment,

    /// The directory uploaded media files are stored in.
    #[arg(long, env = "UPLOAD_DIR", default_value = "uploads")]
    upload_dir: PathBuf,

    /// The directory generated reports are archived in.
    #[arg(long, env = "REPORT_DIR", default_value = "reports")]
    report_dir: PathBuf,

    /// The externally visible base URL for OAuth callbacks. Defaults to `http://localhost:{port}`.
    #[arg(long, env = "PUBLIC_URL")]
    public_url: Option<String>,

    #[arg(long, env = "GOOGLE_CLIENT_ID")]
    google_client_id: Option<String>,

    #[arg(long, env = "GOOGLE_CLIENT_SECRET", hide_env_values = true)]
    google_client_secret: Option<String>,

    #[arg(long, env = "GITHUB_CLIENT_ID")]
    github_client_id: Option<String>,

    #[arg(long, env = "GITHUB_CLIENT_SECRET", hide_env_values = true)]
    github_client_secret: Option<String>,

    /// File path for the debug log.
    #[arg(long, env = "LOG_PATH", default_value = "debug.log")]
    log_path: PathBuf,
}

impl Args {
    fn into_config(self) -> AppConfig {
        AppConfig {
            jwt_secret: self.jwt_secret,
            session_secret: self.session_secret,
            environment: self.app_env,
            upload_dir: self.upload_dir,
            report_dir: self.report_dir,
            public_url: self
                .public_url
                .unwrap_or_else(|| format!("http://localhost:{}", self.port)),
            google: OAuthCredentials::from_parts(
                self.google_client_id,
                self.google_client_secret,
            ),
            github: OAuthCredentials::from_parts(
                self.github_client_id,
                self.github_client_secret,
            ),
            password_cost: bcrypt::DEFAULT_COST,
        }
    }
}

#[tokio::main]
async fn main() {
    // A missing .env file is fine, the variables may come from the environment.
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    setup_logging(&args.log_path);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));

    let conn = match Connection::open(&args.db_path) {
        Ok(conn) => conn,
        Err(error) => {
            tracing::error!("Could not open database {}: {error}", args.db_path.display());
            exit(1);
        }
    };

    let state = match AppState::new(conn, args.into_config()) {
        Ok(state) => state,
        Err(error) => {
            tracing::error!("Could not initialize the app: {error}");
            exit(1);
        }
    };

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    let router = build_router(state).layer(middleware::from_fn(logging_middleware));
    let router = add_tracing_layer(router);

    tracing::info!("HTTP server listening on {}", addr);
    if let Err(error) = axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service())
        .await
    {
        tracing::error!("Server error: {error}");
        exit(1);
    }
}

fn setup_logging(log_path: &Path) {
    let stdout_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_filter(env_filter_or("info"));

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .expect("Could not create log file");

    let debug_log = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(Arc::new(log_file))
        .with_filter(env_filter_or("debug"));

    tracing_subscriber::registry()
        .with(stdout_log)
        .with(debug_log)
        .init();
}

/// The filter from `RUST_LOG`, or `default` when it is unset or invalid.
fn env_filter_or(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

fn add_tracing_layer(router: Router) -> Router {
    let tracing_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request| {
            let method = req.method();
            let uri = req.uri();

            let matched_path = req
                .extensions()
                .get::<MatchedPath>()
                .map(|matched_path| matched_path.as_str());

            tracing::debug_span!("request", %method, %uri, matched_path)
        })
        // By default, `TraceLayer` will log 5xx responses but we're doing our specific
        // logging of errors so disable that
        .on_failure(());

    router.layer(tracing_layer)
}
