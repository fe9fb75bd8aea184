use anyhow::Result;
use clap::{Parser, Subcommand};
use gcn_cli::api::ProductColor;
use gcn_cli::auth::SignupForm;
use gcn_cli::transport::cli::{self, CliContext};
use gcn_cli::Config;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "gcn")]
#[command(author, about = "GCN - terminal client for the compliance assistant", long_about = None)]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GCN_GIT_HASH"), ")"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Override the backend base URL from config.toml
    #[arg(long, global = true, env = "GCN_BASE_URL")]
    base_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat screen
    Chat {
        /// Prefill the query input
        message: Option<String>,
    },

    /// Ask a single question and print the answer
    Ask {
        /// The question
        query: String,

        /// Continue an existing chat
        #[arg(short, long)]
        chat: Option<String>,

        /// Print the answer as JSON
        #[arg(long)]
        json: bool,
    },

    /// Saved chats
    Chats {
        #[command(subcommand)]
        action: ChatsAction,
    },

    /// Manage products referenced with @mentions
    Products {
        #[command(subcommand)]
        action: ProductsAction,
    },

    /// Manage reference documents
    Docs {
        #[command(subcommand)]
        action: DocsAction,
    },

    /// Sign in
    Login {
        username: String,

        /// Password (prompted when omitted)
        #[arg(long, env = "GCN_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Create an account
    Signup {
        username: String,

        #[arg(long)]
        email: String,

        /// Organization (chosen interactively when omitted)
        #[arg(long)]
        organization: Option<String>,

        /// Password (prompted when omitted)
        #[arg(long, env = "GCN_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Sign out
    Logout,

    /// Show the signed-in account
    Whoami,

    /// Show backend progress messages
    Logs {
        /// Keep polling until Ctrl+C
        #[arg(short, long)]
        follow: bool,
    },

    /// Print a few sample questions
    Suggest,
}

#[derive(Subcommand)]
enum ChatsAction {
    /// List saved chats
    List {
        /// Only chats whose name contains this text
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Print the transcript of a chat
    History { chat_id: String },
    /// Delete a chat
    Delete { chat_id: String },
}

#[derive(Subcommand)]
enum ProductsAction {
    /// List products
    List,
    /// Add a product
    Add {
        title: String,
        #[arg(short, long, default_value = "")]
        info: String,
        /// red, purple, orange, green, blue or white
        #[arg(short, long, default_value = "blue")]
        color: ProductColor,
    },
    /// Edit a product
    Edit {
        id: String,
        #[arg(short, long)]
        title: Option<String>,
        #[arg(short, long)]
        info: Option<String>,
        #[arg(short, long)]
        color: Option<ProductColor>,
    },
    /// Delete a product
    Delete { id: String },
}

#[derive(Subcommand)]
enum DocsAction {
    /// List documents loaded on the server
    List {
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Upload PDF files
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Delete a document by name
    Delete {
        name: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

fn init_logging(verbose: bool, to_file: bool) -> Result<()> {
    let filter = if verbose {
        "gcn_cli=debug"
    } else {
        "gcn_cli=info"
    };
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    // The chat screen owns the terminal, so its logs go to a file
    if to_file {
        let path = Config::data_dir()?.join("gcn.log");
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(std::sync::Mutex::new(file)),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, matches!(cli.command, Commands::Chat { .. }))?;

    // Sample questions need neither config nor backend
    if let Commands::Suggest = cli.command {
        cli::run_suggest();
        return Ok(());
    }

    let mut config = Config::load()?;
    if let Some(base_url) = cli.base_url {
        config.backend.base_url = base_url;
    }
    let mut ctx = CliContext::new(config)?;

    match cli.command {
        Commands::Chat { message } => {
            cli::run_chat(ctx, message).await?;
        }
        Commands::Ask { query, chat, json } => {
            cli::run_ask(&mut ctx, &query, chat.as_deref(), json).await?;
        }
        Commands::Chats { action } => match action {
            ChatsAction::List { search } => {
                cli::run_chats_list(&ctx, search.as_deref()).await?;
            }
            ChatsAction::History { chat_id } => {
                cli::run_chat_history(&ctx, &chat_id).await?;
            }
            ChatsAction::Delete { chat_id } => {
                cli::run_chat_delete(&ctx, &chat_id).await?;
            }
        },
        Commands::Products { action } => match action {
            ProductsAction::List => cli::run_products_list(&ctx).await?,
            ProductsAction::Add { title, info, color } => {
                cli::run_product_add(&ctx, &title, &info, color).await?;
            }
            ProductsAction::Edit {
                id,
                title,
                info,
                color,
            } => {
                cli::run_product_edit(&ctx, &id, title, info, color).await?;
            }
            ProductsAction::Delete { id } => cli::run_product_delete(&ctx, &id).await?,
        },
        Commands::Docs { action } => match action {
            DocsAction::List { search } => cli::run_docs_list(&ctx, search.as_deref()).await?,
            DocsAction::Upload { files } => cli::run_docs_upload(&ctx, files).await?,
            DocsAction::Delete { name, yes } => cli::run_docs_delete(&ctx, &name, yes).await?,
        },
        Commands::Login { username, password } => {
            cli::run_login(&mut ctx, &username, password).await?;
        }
        Commands::Signup {
            username,
            email,
            organization,
            password,
        } => {
            let form = SignupForm {
                username,
                email,
                password: password.unwrap_or_default(),
                organization: organization.unwrap_or_default(),
            };
            cli::run_signup(&ctx, form).await?;
        }
        Commands::Logout => cli::run_logout(&mut ctx),
        Commands::Whoami => cli::run_whoami(&ctx),
        Commands::Logs { follow } => cli::run_logs(&ctx, follow).await?,
        Commands::Suggest => cli::run_suggest(),
    }

    Ok(())
}
