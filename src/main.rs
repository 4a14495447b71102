use clap::{Parser, Subcommand};
use colored::Colorize;
use env_logger::Env;
use log::{debug, error};
use std::process::ExitCode;

#[cfg(feature = "client")]
use cquizy::cli::{study_loop, StudyArgs};
#[cfg(feature = "server")]
use cquizy::server::{config::ServerConfig, start_server};

#[derive(Parser, Debug)]
#[command(name = "CQuizy")]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, env = "RUST_LOG", default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the question API
    #[cfg(feature = "server")]
    Serve(ServerConfig),
    /// Study the questions served by a running API
    #[cfg(feature = "client")]
    Study(StudyArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or(args.log_level)).init();
    debug!("[Setup] {:?}", args.command);

    let result: Result<(), String> = match args.command {
        #[cfg(feature = "server")]
        Commands::Serve(config) => start_server(config).await.map_err(|e| e.to_string()),
        #[cfg(feature = "client")]
        Commands::Study(study) => study_loop(study).await.map_err(|e| e.to_string()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("[Setup] {}", err);
            eprintln!("{}", err.bright_red());
            ExitCode::FAILURE
        }
    }
}
