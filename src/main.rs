//! CLI entry point for folio

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use folio::Site;

#[derive(Parser)]
#[command(name = "folio")]
#[command(version)]
#[command(about = "Content engine for a personal portfolio and blog", long_about = None)]
struct Cli {
    /// Set the base directory (defaults to current directory)
    #[arg(short, long, global = true)]
    cwd: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the development server
    #[command(alias = "s")]
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "4000")]
        port: u16,

        /// IP address to bind to
        #[arg(short, long, default_value = "localhost")]
        ip: String,

        /// Open browser automatically
        #[arg(short, long)]
        open: bool,

        /// Disable live reload
        #[arg(long)]
        r#static: bool,
    },

    /// Build the static site
    #[command(alias = "g")]
    Build {
        /// Rebuild whenever content changes
        #[arg(short, long)]
        watch: bool,
    },

    /// List site content
    List {
        /// Type of content to list (post, tag)
        #[arg(default_value = "post")]
        r#type: String,
    },

    /// Remove the generated site
    Clean,

    /// Display version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug { "folio=debug,info" } else { "folio=info" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let base_dir = match cli.cwd {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    match cli.command {
        Commands::Serve {
            port,
            ip,
            open,
            r#static,
        } => {
            let site = Site::new(&base_dir)?;
            tracing::info!("Starting server at http://{}:{}", ip, port);
            folio::server::start(&site, &ip, port, !r#static, open).await?;
        }

        Commands::Build { watch } => {
            let site = Site::new(&base_dir)?;
            tracing::info!("Generating static files...");
            site.build()?;
            println!("Generated successfully!");

            if watch {
                folio::commands::build::watch(&site).await?;
            }
        }

        Commands::List { r#type } => {
            let site = Site::new(&base_dir)?;
            folio::commands::list::run(&site, &r#type)?;
        }

        Commands::Clean => {
            let site = Site::new(&base_dir)?;
            site.clean()?;
            println!("Cleaned successfully!");
        }

        Commands::Version => {
            println!("folio version {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
