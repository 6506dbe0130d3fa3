use blog_common::snowflake::{ProcessId, WorkerId};
use blog_db::{BlogStore, DbClient, DbError, MemoryStore};
use mail::{LogMailer, MailError, Mailer, SmtpMailer};
use serde::Deserialize;
use server::{ServerState, Settings};
use std::{
    fmt::{self, Debug, Formatter},
    net::{IpAddr, SocketAddr},
    num::NonZeroUsize,
    sync::Arc,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod mail;
mod server;

#[derive(Debug, Error)]
enum InitError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("Error setting up the store: {0}")]
    Store(#[from] DbError),
    #[error("Error setting up the mailer: {0}")]
    Mailer(#[from] MailError),
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
}

const DEFAULT_POSTS_PER_PAGE: NonZeroUsize = NonZeroUsize::new(3).unwrap();

fn default_posts_per_page() -> NonZeroUsize {
    DEFAULT_POSTS_PER_PAGE
}

fn default_site_scheme() -> String {
    "http".to_owned()
}

fn default_mail_from() -> String {
    "admin@myblog.com".to_owned()
}

fn default_allowed_hosts() -> Vec<String> {
    vec!["localhost".to_owned(), "127.0.0.1".to_owned()]
}

fn default_smtp_port() -> u16 {
    587
}

#[derive(Clone, Eq, PartialEq, Hash, Deserialize)]
struct Env {
    server_address: IpAddr,
    server_port: u16,
    /// Serve seeded sample content from memory when unset.
    database_url: Option<String>,
    #[serde(default)]
    worker_id: WorkerId,
    #[serde(default)]
    process_id: ProcessId,
    #[serde(default = "default_posts_per_page")]
    posts_per_page: NonZeroUsize,
    #[serde(default = "default_site_scheme")]
    site_scheme: String,
    #[serde(default = "default_mail_from")]
    mail_from: String,
    /// Comma separated, checked before a request host ends up in outgoing mail.
    #[serde(default = "default_allowed_hosts")]
    allowed_hosts: Vec<String>,
    /// Only log outgoing mail when unset.
    smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    smtp_port: u16,
    smtp_username: Option<String>,
    smtp_password: Option<String>,
}

impl Debug for Env {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let redacted = |value: &Option<String>| value.as_ref().map(|_| "[redacted]");

        f.debug_struct("Env")
            .field("server_address", &self.server_address)
            .field("server_port", &self.server_port)
            .field("database_url", &redacted(&self.database_url))
            .field("worker_id", &self.worker_id)
            .field("process_id", &self.process_id)
            .field("posts_per_page", &self.posts_per_page)
            .field("site_scheme", &self.site_scheme)
            .field("mail_from", &self.mail_from)
            .field("allowed_hosts", &self.allowed_hosts)
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &redacted(&self.smtp_password))
            .finish()
    }
}

impl Env {
    fn settings(&self) -> Settings {
        Settings {
            posts_per_page: self.posts_per_page,
            site_scheme: self.site_scheme.clone(),
            mail_from: self.mail_from.clone(),
            allowed_hosts: self.allowed_hosts.clone(),
        }
    }

    async fn store(&self) -> Result<Arc<dyn BlogStore>, InitError> {
        if let Some(database_url) = &self.database_url {
            let client = DbClient::connect(database_url, self.worker_id, self.process_id).await?;
            client.migrate().await?;
            info!("Connected to database and applied migrations");

            return Ok(Arc::new(client));
        }

        warn!("DATABASE_URL is not set, serving sample content from memory");
        let store = MemoryStore::new(self.worker_id, self.process_id);
        store.seed_sample_content()?;

        Ok(Arc::new(store))
    }

    fn mailer(&self) -> Result<Arc<dyn Mailer>, InitError> {
        let Some(smtp_host) = &self.smtp_host else {
            warn!("SMTP_HOST is not set, outgoing mail will only be logged");
            return Ok(Arc::new(LogMailer));
        };

        let credentials = self.smtp_username.clone().zip(self.smtp_password.clone());
        let mailer = SmtpMailer::new(smtp_host, self.smtp_port, credentials)?;

        Ok(Arc::new(mailer))
    }
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "blog_api=debug,\
                blog_db=debug,\
                tower_http=debug,axum::rejection=trace,sqlx=debug"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn get_env() -> Result<Env, InitError> {
    if let Err(e) = dotenvy::dotenv() {
        if e.not_found() {
            debug!("No .dotenv file found");
        } else {
            return Err(e.into());
        }
    }

    envy::from_env().map_err(InitError::from)
}

/// Cancels `shutdown` on Ctrl-C or SIGTERM.
async fn watch_shutdown_signals(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Could not listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Could not listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    info!("Shutdown signal received, finishing open requests");
    shutdown.cancel();
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let env = get_env()?;
    debug!(?env, "Loaded environment");

    let state = ServerState {
        store: env.store().await?,
        mailer: env.mailer()?,
        settings: Arc::new(env.settings()),
    };

    let tracing_layer = TraceLayer::new_for_http();
    let app = server::routes().with_state(state).layer(tracing_layer);

    let server_address = SocketAddr::new(env.server_address, env.server_port);
    let listener = tokio::net::TcpListener::bind(server_address)
        .await
        .map_err(InitError::TcpBind)?;
    info!(%server_address, "Listening");

    let shutdown = CancellationToken::new();
    tokio::spawn(watch_shutdown_signals(shutdown.clone()));

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(InitError::TcpServe)?;

    Ok(())
}
