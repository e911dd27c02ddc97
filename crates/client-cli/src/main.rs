use anyhow::Result;
use clap::{Parser, Subcommand};
use shared::{ClientIn, Role, TicketCreatePublic, TicketListQuery, TicketStatus, UserCreate, UserUpdate};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod auth;
mod config;
mod render;

use api::{ApiClient, ApiError};

#[derive(Parser)]
#[command(name = "repairdesk")]
#[command(about = "Terminal client for the repairdesk ticket tracker")]
#[command(version)]
struct Cli {
    /// Server URL (overrides config)
    #[arg(long, global = true)]
    server: Option<String>,

    /// Auth token (overrides config)
    #[arg(long, global = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Login to the repairdesk server
    Login {
        username: String,
        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Logout from the repairdesk server
    Logout,
    /// Show current login status
    Whoami,
    /// Submit a ticket through the public intake form
    Submit {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        /// Client name
        #[arg(long)]
        name: String,
        /// Client email
        #[arg(long)]
        email: String,
        /// Client phone
        #[arg(long)]
        phone: Option<String>,
    },
    /// Work with tickets
    Tickets {
        #[command(subcommand)]
        action: TicketAction,
    },
    /// Manage user accounts (admin)
    Users {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Mint a short-lived read-only token (admin)
    ViewToken,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum TicketAction {
    /// List tickets, newest first
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 10)]
        size: u32,
        /// Substring of the title
        #[arg(long)]
        search: Option<String>,
        /// new, in_progress or done
        #[arg(long)]
        status: Option<TicketStatus>,
        /// Only tickets of this worker (admin)
        #[arg(long)]
        worker: Option<i64>,
    },
    /// Show one ticket
    Show { id: i64 },
    /// Assign a ticket to a worker (admin)
    Assign { id: i64, worker_id: i64 },
    /// Change a ticket's status
    Status { id: i64, status: TicketStatus },
    /// Mark a ticket as read
    Viewed {
        id: i64,
        /// Mark as unread instead
        #[arg(long)]
        unset: bool,
    },
    /// Per-worker counters (admin)
    Stats { worker_id: i64 },
}

#[derive(Subcommand)]
enum UserAction {
    /// List all accounts
    List,
    /// Create an account
    Create {
        username: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "worker")]
        role: Role,
    },
    /// Replace an account's name and role
    Update {
        id: i64,
        #[arg(long)]
        username: String,
        #[arg(long)]
        role: Role,
        /// Keeps the current password when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Delete an account, releasing its tickets
    Delete { id: i64 },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Set a configuration value
    Set {
        /// Configuration key (server, token)
        key: String,
        /// Configuration value
        value: String,
    },
    /// Get a configuration value
    Get {
        /// Configuration key
        key: String,
    },
    /// Show all configuration
    Show,
    /// Get the config file path
    Path,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "repairdesk=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        report(&err);
        std::process::exit(1);
    }
}

fn report(err: &anyhow::Error) {
    eprintln!("\x1b[31mError: {}\x1b[0m", err);
    if let Some(ApiError::Server { details, .. }) = err.downcast_ref::<ApiError>() {
        for detail in details {
            eprintln!("  - {}", detail);
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = config::Config::load().unwrap_or_default();
    let server = config.server_url(cli.server.as_deref());
    let token = cli.token.or_else(|| config.remote.token.clone());
    let client = ApiClient::new(server, token);
    tracing::debug!("Using server {}", client.base());

    match cli.command {
        Commands::Login { username, password } => {
            auth::login(&client, &mut config, &username, password).await?;
        }
        Commands::Logout => auth::logout(&mut config)?,
        Commands::Whoami => auth::whoami(&client).await?,
        Commands::Submit {
            title,
            description,
            name,
            email,
            phone,
        } => {
            let ticket = client
                .submit(&TicketCreatePublic {
                    title,
                    description,
                    client: ClientIn { name, email, phone },
                })
                .await?;
            println!("\x1b[32m✅ Ticket #{} submitted\x1b[0m", ticket.id);
        }
        Commands::Tickets { action } => handle_ticket_command(&client, action).await?,
        Commands::Users { action } => handle_user_command(&client, action).await?,
        Commands::ViewToken => {
            let token = client.view_token().await?;
            println!("{}", token.access_token);
        }
        Commands::Config { action } => handle_config_command(&mut config, action)?,
    }
    Ok(())
}

async fn handle_ticket_command(client: &ApiClient, action: TicketAction) -> Result<()> {
    match action {
        TicketAction::List {
            page,
            size,
            search,
            status,
            worker,
        } => {
            let query = TicketListQuery {
                page: Some(page),
                size: Some(size),
                search,
                status,
                worker_id: worker,
            };
            let page = client.list_tickets(&query).await?;
            println!("{}", render::ticket_page(&page));
        }
        TicketAction::Show { id } => {
            let ticket = client.ticket(id).await?;
            println!("{}", render::ticket_detail(&ticket));
        }
        TicketAction::Assign { id, worker_id } => {
            let ticket = client.assign(id, worker_id).await?;
            println!("{}", render::ticket_row(&ticket));
        }
        TicketAction::Status { id, status } => {
            let ticket = client.set_status(id, status).await?;
            println!("{}", render::ticket_row(&ticket));
        }
        TicketAction::Viewed { id, unset } => {
            let ticket = client.set_viewed(id, !unset).await?;
            println!("{}", render::ticket_row(&ticket));
        }
        TicketAction::Stats { worker_id } => {
            let stats = client.stats(worker_id).await?;
            println!("assigned:    {}", stats.assigned);
            println!("in_progress: {}", stats.in_progress);
        }
    }
    Ok(())
}

async fn handle_user_command(client: &ApiClient, action: UserAction) -> Result<()> {
    match action {
        UserAction::List => {
            for user in client.users().await? {
                println!("{}", render::user_row(&user));
            }
        }
        UserAction::Create {
            username,
            password,
            role,
        } => {
            let user = client
                .create_user(&UserCreate {
                    username,
                    password,
                    role,
                })
                .await?;
            println!("{}", render::user_row(&user));
        }
        UserAction::Update {
            id,
            username,
            role,
            password,
        } => {
            let user = client
                .update_user(
                    id,
                    &UserUpdate {
                        username,
                        role,
                        password,
                    },
                )
                .await?;
            println!("{}", render::user_row(&user));
        }
        UserAction::Delete { id } => {
            client.delete_user(id).await?;
            println!("Deleted user {}", id);
        }
    }
    Ok(())
}

fn handle_config_command(config: &mut config::Config, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Set { key, value } => {
            config.set(&key, value)?;
            config.save()?;
            println!("Configuration saved");
        }
        ConfigAction::Get { key } => println!("{}", config.get(&key)?),
        ConfigAction::Show => {
            for key in ["server", "token"] {
                println!("{}: {}", key, config.get(key)?);
            }
        }
        ConfigAction::Path => {
            let path = config::Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}
