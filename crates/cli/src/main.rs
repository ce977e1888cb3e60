mod branches;
mod config;
mod output;
mod push;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::AppContext;
use crate::output::OutputFormat;

#[derive(Parser)]
#[command(
    name = "gitmigrate",
    version,
    about = "Push migrated git history to a size-limited remote in adaptive batches"
)]
struct Cli {
    /// Run as if started in <DIR>
    #[arg(short = 'C', global = true, value_name = "DIR")]
    dir: Option<PathBuf>,

    /// Config file (default: ~/.config/gitmigrate/gitmigrate.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output format for reports printed on stdout
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Push all branches and tags to the remote, batch by batch
    Push(push::PushArgs),

    /// List branches in push order
    Branches {
        /// List remote-tracking branches instead
        #[arg(long)]
        remote: bool,
    },

    /// Show the resolved configuration
    Config,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    let result = AppContext::load(cli.config.as_deref(), cli.dir).and_then(|ctx| {
        match cli.command {
            Commands::Push(args) => push::run(&ctx, args, cli.format),
            Commands::Branches { remote } => {
                branches::run(&ctx, remote, cli.format).map(|()| true)
            }
            Commands::Config => config::show_config(&ctx, cli.format).map(|()| true),
        }
    });

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
