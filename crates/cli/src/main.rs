//! redline - live review server for local files

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use redline_cli::config::Settings;
use redline_cli::logging::{self, LogTarget};
use redline_cli::cmd;
use std::path::PathBuf;
use std::process::ExitCode;

/// redline - review local files in the browser with live reload
#[derive(Parser)]
#[command(name = "redline")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the review server (foreground by default)
    Server(ServerArgs),
    /// Register a project directory
    Register {
        /// Project directory (defaults to current directory)
        #[arg(long)]
        project: Option<PathBuf>,
    },
    /// Start a review of one file and print its URL
    Review {
        /// File path relative to the project directory
        #[arg(long)]
        file: String,
        /// Project directory (defaults to current directory)
        #[arg(long)]
        project: Option<PathBuf>,
    },
    /// Print unresolved comments for one file
    Address {
        /// File path relative to the project directory
        #[arg(long)]
        file: String,
        /// Project directory (defaults to current directory)
        #[arg(long)]
        project: Option<PathBuf>,
    },
    /// Reply to a root comment as the agent
    Reply {
        /// ID of the comment to reply to
        #[arg(long)]
        comment_id: i64,
        /// Reply message
        #[arg(long)]
        message: String,
    },
    /// Resolve comments on a file, or one thread
    Resolve {
        /// Project directory (defaults to current directory)
        #[arg(long)]
        project: Option<PathBuf>,
        /// File path relative to the project directory
        #[arg(long, required_unless_present = "comment_id")]
        file: Option<String>,
        /// Resolve only the thread containing this comment
        #[arg(long, conflicts_with = "file")]
        comment_id: Option<i64>,
    },
}

#[derive(Args)]
struct ServerArgs {
    /// Detach and run in the background
    #[arg(long, conflicts_with_all = ["stop", "status"])]
    daemon: bool,
    /// Stop the background server
    #[arg(long, conflicts_with = "status")]
    stop: bool,
    /// Show whether the background server is running
    #[arg(long)]
    status: bool,
    #[arg(long, hide = true)]
    daemon_child: bool,
}

impl ServerArgs {
    fn log_target(&self) -> LogTarget {
        if self.daemon_child {
            LogTarget::Daemon
        } else if self.daemon || self.stop || self.status {
            LogTarget::Command
        } else {
            LogTarget::Foreground
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let settings = Settings::load()?;

    let target = match &cli.command {
        Commands::Server(args) => args.log_target(),
        _ => LogTarget::Command,
    };
    let _log_guard = logging::init(target, &settings.log_file())?;

    match cli.command {
        Commands::Server(args) => {
            if args.stop {
                cmd::stop::run(&settings).await?;
            } else if args.status {
                if !cmd::status::run(&settings).await? {
                    return Ok(ExitCode::FAILURE);
                }
            } else {
                cmd::start::run(&settings, args.daemon, args.daemon_child).await?;
            }
        }
        Commands::Register { project } => cmd::register::run(&settings, project.as_deref()).await?,
        Commands::Review { file, project } => {
            cmd::review::run(&settings, &file, project.as_deref()).await?
        }
        Commands::Address { file, project } => {
            cmd::address::run(&settings, &file, project.as_deref()).await?
        }
        Commands::Reply { comment_id, message } => {
            cmd::reply::run(&settings, comment_id, &message).await?
        }
        Commands::Resolve { project, file, comment_id } => {
            cmd::resolve::run(&settings, project.as_deref(), file.as_deref(), comment_id).await?
        }
    }

    Ok(ExitCode::SUCCESS)
}
