//! Cascade CLI entrypoint.

use clap::Parser;
use std::path::PathBuf;

mod commands;
mod config;
mod handlers;
mod logging;


use commands::{Commands, ConfigCommands};
use config::Settings;

#[derive(Parser)]
#[command(name = "cascade")]
#[command(author, version, about = "Downstream CI workflow generator", long_about = None)]
struct Cli {
    /// Settings file; defaults to the user config file
    #[arg(long, global = true, env = "CASCADE_SETTINGS")]
    settings: Option<PathBuf>,

    /// Increase log verbosity
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.log_json);

    let settings = Settings::load(cli.settings.as_deref())?;

    match cli.command {
        Commands::Generate {
            config,
            dep_tree,
            output,
            fragments,
            workflows,
        } => {
            handlers::generate(
                &settings,
                &config,
                &dep_tree,
                &output,
                fragments.as_deref(),
                &workflows,
            )?;
        }
        Commands::Setup(args) => {
            if let Err(e) = handlers::setup(&settings, &args).await {
                println!("::error::{:#}", e);
                std::process::exit(1);
            }
        }
        Commands::Graph {
            workflow,
            config,
            dep_tree,
        } => handlers::show_graph(&config, &dep_tree, &workflow)?,
        Commands::Schema { target } => handlers::schema(target)?,
        Commands::Config { command } => {
            let path = match cli.settings {
                Some(path) => path,
                None => Settings::config_path()?,
            };
            match command {
                ConfigCommands::Show => handlers::show_config(&settings, &path)?,
                ConfigCommands::Set { key, value } => handlers::set_config(&path, &key, &value)?,
            }
        }
    }

    Ok(())
}
