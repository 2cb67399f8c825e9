use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::services::{ServeDir, ServeFile};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use imovia::client::ApiClient;
use imovia::config::Config;
use imovia::crud::{CrudController, LogNotifier, Notifier};
use imovia::models::HasId;
use imovia::services::{
    BairrosResource, CidadesResource, EstadosResource, LocationsService, OwnersService,
    PropertiesService, ResourceService, UsersService,
};
use imovia::AppState;

#[derive(Parser, Debug)]
#[command(name = "imovia")]
#[command(author, version, about = "Session gateway and back-office client for a real-estate API", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "imovia.toml")]
    config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the gateway server (the default)
    Serve,
    /// Drive the admin resources through the gateway from the terminal
    Admin {
        /// Gateway origin to talk to
        #[arg(long, default_value = "http://localhost:3000", env = "IMOVIA_GATEWAY_URL")]
        gateway: String,
        #[command(subcommand)]
        action: AdminAction,
    },
}

#[derive(Subcommand, Debug)]
enum AdminAction {
    /// List a resource
    List { resource: Resource },
    /// Delete a record by id (asks the upstream, not a local store)
    Delete { resource: Resource, id: i64 },
}

#[derive(ValueEnum, Clone, Debug)]
enum Resource {
    Imoveis,
    Proprietarios,
    Usuarios,
    Estados,
    Cidades,
    Bairros,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(&cli.config)?;

    let log_level = cli
        .log_level
        .as_ref()
        .unwrap_or(&config.logging.level)
        .clone();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Admin { gateway, action } => admin(config, gateway, action).await,
    }
}

async fn serve(config: Config) -> Result<()> {
    tracing::info!("Starting imovia v{}", env!("CARGO_PKG_VERSION"));

    let static_dir = PathBuf::from(&config.server.static_dir);
    let addr = format!("{}:{}", config.server.host, config.server.port);

    let state = Arc::new(AppState::new(config)?);
    let api_router = imovia::api::create_router(state);

    // SPA static files behind the API routes; unknown paths fall back
    // to index.html for client-side routing.
    let index_file = static_dir.join("index.html");
    let serve_static = ServeDir::new(&static_dir).not_found_service(ServeFile::new(&index_file));

    let app = axum::Router::new()
        .merge(api_router)
        .fallback_service(serve_static)
        .layer(axum::middleware::from_fn(
            imovia::api::guard::admin_page_guard,
        ))
        .layer(axum::middleware::from_fn(
            imovia::api::guard::security_headers,
        ));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Gateway listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn admin(config: Config, gateway: String, action: AdminAction) -> Result<()> {
    let client = ApiClient::new(gateway);
    let notifier = LogNotifier;
    let locations = LocationsService::new(client.clone(), config.upstream.reference_ttl());

    match action {
        AdminAction::List { resource } => match resource {
            Resource::Imoveis => {
                list(PropertiesService::new(client), notifier, "imóvel", |p| {
                    p.nome.clone()
                })
                .await
            }
            Resource::Proprietarios => {
                list(OwnersService::new(client), notifier, "proprietário", |o| {
                    o.nome.clone()
                })
                .await
            }
            Resource::Usuarios => {
                list(UsersService::new(client), notifier, "usuário", |u| {
                    u.nome.clone()
                })
                .await
            }
            Resource::Estados => {
                list(EstadosResource(locations), notifier, "estado", |e| {
                    e.nome.clone()
                })
                .await
            }
            Resource::Cidades => {
                list(CidadesResource(locations), notifier, "cidade", |c| {
                    c.nome.clone()
                })
                .await
            }
            Resource::Bairros => {
                list(BairrosResource(locations), notifier, "bairro", |b| {
                    b.nome.clone()
                })
                .await
            }
        },
        AdminAction::Delete { resource, id } => match resource {
            Resource::Imoveis => delete(PropertiesService::new(client), notifier, "imóvel", id).await,
            Resource::Proprietarios => {
                delete(OwnersService::new(client), notifier, "proprietário", id).await
            }
            Resource::Usuarios => delete(UsersService::new(client), notifier, "usuário", id).await,
            Resource::Estados => delete(EstadosResource(locations), notifier, "estado", id).await,
            Resource::Cidades => delete(CidadesResource(locations), notifier, "cidade", id).await,
            Resource::Bairros => delete(BairrosResource(locations), notifier, "bairro", id).await,
        },
    }

    Ok(())
}

async fn list<S, N, F>(service: S, notifier: N, label: &str, name: F)
where
    S: ResourceService,
    N: Notifier,
    F: Fn(&S::Item) -> String,
{
    let mut controller = CrudController::new(service, notifier, label);
    controller.refresh().await;
    if let Some(error) = &controller.state.error {
        tracing::error!(%label, %error, "Listagem falhou");
        return;
    }
    for item in &controller.state.data {
        println!("{}\t{}", item.id(), name(item));
    }
    tracing::info!(count = controller.state.data.len(), %label, "Listagem concluída");
}

async fn delete<S, N>(service: S, notifier: N, label: &str, id: i64)
where
    S: ResourceService,
    N: Notifier,
{
    let mut controller = CrudController::new(service, notifier, label);
    controller.open_delete(id);
    controller.handle_delete().await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
