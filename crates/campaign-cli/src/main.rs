mod config;
mod export_cmd;
mod extract_cmd;
mod render_cmd;
mod serve_cmd;
mod watch;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use clap::{CommandFactory, Parser, Subcommand};

use campaign_core::CampaignProject;
use campaign_core::template::{ClientLoader, ClientRegistry};

use config::{CampaignConfig, CliOverrides};

#[derive(Parser)]
#[command(
    name = "campaign",
    version,
    about = "Local development harness for personalization campaign templates"
)]
struct Cli {
    /// Campaign directory (overrides CAMPAIGN_DIR env var)
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a campaign.toml config file in the current directory
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Bundle the campaign files as template editor JSON
    Export {
        /// Compile styles.scss instead of reading styles.css
        #[arg(long)]
        compile_styles: bool,
        /// Write single-line JSON
        #[arg(long)]
        compact: bool,
        /// Output file path (defaults to stdout)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Template description
        #[arg(long, default_value = "Imported template")]
        description: String,
        /// Mark the template as public
        #[arg(long)]
        public: bool,
    },
    /// Print the campaign data extracted from server-side.ts
    Extract {
        /// Print bare JSON instead of the generated data module
        #[arg(long)]
        json: bool,
    },
    /// Apply the template once headlessly and print the resulting markup
    Render {
        /// Client behavior: declarative or popup
        #[arg(long)]
        client: Option<String>,
    },
    /// Run the dev server with hot reload
    Serve {
        /// Address to bind (overrides CAMPAIGN_BIND env var)
        #[arg(long)]
        bind: Option<String>,
        /// Port to listen on (overrides CAMPAIGN_PORT env var)
        #[arg(long)]
        port: Option<u16>,
        /// Client behavior: declarative or popup
        #[arg(long)]
        client: Option<String>,
    },
    /// Print shell completions
    Completions {
        /// Target shell
        shell: clap_complete::Shell,
    },
}

/// Pick the client loader for a campaign.
///
/// An explicit name must exist in the registry. Without one, the
/// declarative loader is used when `client-side.toml` exists, else the
/// built-in popup.
pub fn select_loader(project: &CampaignProject, name: Option<&str>) -> Result<Arc<dyn ClientLoader>> {
    let registry = ClientRegistry::with_builtins(&project.client_behavior_path());
    let name = match name {
        Some(name) => name,
        None if project.client_behavior_path().exists() => "declarative",
        None => "popup",
    };
    match registry.get(name) {
        Some(loader) => Ok(loader),
        None => bail!(
            "unknown client behavior {name:?} (available: {})",
            registry.list().join(", ")
        ),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries command output such as export JSON.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { force } => {
            config::cmd_init(force)?;
        }
        Commands::Export {
            compile_styles,
            compact,
            output,
            description,
            public,
        } => {
            let resolved = CampaignConfig::resolve(&CliOverrides::dir(cli.dir))?;
            let options = export_cmd::ExportArgs {
                compile_styles,
                compact,
                output,
                description,
                public,
            };
            export_cmd::run_export(&resolved.dir, &options)?;
        }
        Commands::Extract { json } => {
            let resolved = CampaignConfig::resolve(&CliOverrides::dir(cli.dir))?;
            extract_cmd::run_extract(&CampaignProject::new(&resolved.dir), json)?;
        }
        Commands::Render { client } => {
            let resolved = CampaignConfig::resolve(&CliOverrides::dir(cli.dir))?;
            let project = CampaignProject::new(&resolved.dir);
            let client = client.or(resolved.client);
            let html = render_cmd::run_render(&project, client.as_deref()).await?;
            println!("{html}");
        }
        Commands::Serve { bind, port, client } => {
            let resolved = CampaignConfig::resolve(&CliOverrides {
                dir: cli.dir,
                bind,
                port,
            })?;
            let client = client.or(resolved.client.clone());
            serve_cmd::run_serve(&resolved, client.as_deref()).await?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "campaign", &mut std::io::stdout());
        }
    }

    Ok(())
}

#[cfg(test)]
mod test_util {
    use std::sync::{Mutex, MutexGuard, PoisonError};

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Serialize tests that read or write process environment variables.
    pub fn lock_env() -> MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
