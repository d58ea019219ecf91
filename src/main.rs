use std::{net::SocketAddr, path::PathBuf};

use clap::{Parser, Subcommand};
use colored::*;
use tracing::info;
use uuid::Uuid;

use crate::{
    api::AppContext,
    config::{Config, DEFAULT_BIND, DEFAULT_MAX_UPLOAD_MB},
    models::user::Role,
    services::{
        projects::{delete_project, list_projects},
        users::{RegisterUserParameters, delete_user, list_users, register_user},
    },
    storage::{
        blobs::BlobStore,
        json::{DEFAULT_BACKUPS_KEPT, JsonFileStorage},
    },
};

mod api;
mod config;
mod models;
mod services;
mod storage;

#[derive(Parser)]
#[command(
    name = "tablero",
    about = "Project tracking server backed by flat JSON files"
)]
struct Cli {
    /// Directory holding users.json, projects.json and uploads/
    #[arg(long, global = true, env = "TABLERO_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API (default)
    Serve {
        /// Address to listen on
        #[arg(long, env = "TABLERO_BIND", default_value = DEFAULT_BIND)]
        bind: SocketAddr,

        /// Largest accepted upload, in megabytes
        #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_MB)]
        max_upload_mb: usize,

        /// Snapshots kept per collection, 0 disables them
        #[arg(long, default_value_t = DEFAULT_BACKUPS_KEPT)]
        backups: usize,
    },

    /// Manage users
    #[command(subcommand)]
    User(UserCommands),

    /// Manage projects
    #[command(subcommand)]
    Project(ProjectCommands),
}

#[derive(Debug, Subcommand)]
enum UserCommands {
    /// List all users
    List,
    /// Create an administrator account
    AddAdmin {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Delete a user by id
    Delete { id: Uuid },
}

#[derive(Debug, Subcommand)]
enum ProjectCommands {
    /// List all projects
    List,
    /// Delete a project and its files by id
    Delete { id: Uuid },
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("{} {}", "Error:".red().bold(), message);
    std::process::exit(1);
}

#[tokio::main]
async fn serve(config: Config) -> std::io::Result<()> {
    config.prepare_dirs()?;

    let context = AppContext {
        storage: JsonFileStorage::new(config.data_dir.clone())
            .with_backups_kept(config.backups_kept),
        blobs: BlobStore::new(config.uploads_dir()),
    };
    info!(
        data_dir = %config.data_dir.display(),
        uploads_dir = %context.blobs.dir().display(),
        backups_kept = config.backups_kept,
        "store ready"
    );
    let app = api::router(context, config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        bind = %config.bind,
        "tablero listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let data_dir = config::resolve_data_dir(cli.data_dir);
    let storage = JsonFileStorage::new(data_dir.clone());

    let command = cli.command.unwrap_or_else(|| Commands::Serve {
        bind: DEFAULT_BIND
            .parse()
            .unwrap_or_else(|e| fail(format!("invalid default bind address: {e}"))),
        max_upload_mb: DEFAULT_MAX_UPLOAD_MB,
        backups: DEFAULT_BACKUPS_KEPT,
    });

    match command {
        Commands::Serve {
            bind,
            max_upload_mb,
            backups,
        } => {
            let config = Config {
                data_dir,
                bind,
                max_upload_bytes: config::megabytes(max_upload_mb),
                backups_kept: backups,
            };
            if let Err(e) = serve(config) {
                fail(e);
            }
        }
        Commands::User(UserCommands::List) => {
            let users = list_users(&storage);
            if users.is_empty() {
                println!("No users");
            }
            for user in users {
                let role = match user.role {
                    Role::Admin => "admin".yellow(),
                    Role::User => "user".normal(),
                };
                println!(
                    "{}  {}  {}  {}  {}",
                    user.id.to_string().dimmed(),
                    user.username.bold(),
                    user.email,
                    role,
                    user.joined
                );
            }
        }
        Commands::User(UserCommands::AddAdmin {
            username,
            email,
            password,
        }) => {
            let parameters = RegisterUserParameters {
                username: Some(username),
                email: Some(email),
                password: Some(password),
                role: Role::Admin,
            };
            match register_user(&storage, parameters) {
                Ok(user) => println!("Created administrator {} ({})", user.username.bold(), user.id),
                Err(e) => fail(e),
            }
        }
        Commands::User(UserCommands::Delete { id }) => match delete_user(&storage, id) {
            Ok(user) => println!("Deleted user {}", user.username.bold()),
            Err(e) => fail(e),
        },
        Commands::Project(ProjectCommands::List) => {
            let projects = list_projects(&storage);
            if projects.is_empty() {
                println!("No projects");
            }
            for project in projects {
                println!(
                    "{}  {}  {}  {}%  {} files",
                    project.id.to_string().dimmed(),
                    project.display_id,
                    project.name.bold(),
                    project.progress,
                    project.files.len()
                );
            }
        }
        Commands::Project(ProjectCommands::Delete { id }) => {
            let blobs = BlobStore::new(config::uploads_dir(&data_dir));
            match delete_project(&storage, &blobs, id) {
                Ok(result) => {
                    println!("Deleted project {}", result.project.name.bold());
                    for server_name in result.failed_blob_removals {
                        eprintln!("  {} could not remove {}", "warning:".yellow(), server_name);
                    }
                }
                Err(e) => fail(e),
            }
        }
    }
}
