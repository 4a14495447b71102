use clap::{Parser, Subcommand};
use colored::Colorize;
use env_logger::Env;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;

use cquizy::libcquizy::db;
use cquizy::libcquizy::question::{NewQuestion, Question, QuestionPayload};

#[derive(Parser, Debug)]
#[command(name = "CQuizy import/export")]
#[command(version, about = "Moves questions between JSON files and a CQuizy store", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, default_value = "info")]
    log_level: String,
    /// Remove every stored question before importing
    #[arg(short, long, default_value = "false")]
    refresh_db: bool,
    #[arg(short, long, value_name = "FILE", env = "CQUIZY_DB", default_value = "cquizy.db")]
    db: PathBuf,
    /// Import through a running API instead of writing the database file
    #[arg(long, value_name = "URL")]
    remote: Option<String>,

    json: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Import,
    Export,
}

#[derive(Serialize, Deserialize, Debug)]
struct QuestionFile<T> {
    questions: Vec<T>,
}

#[derive(Debug, Error)]
enum IoError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Cannot access file: {0}")]
    File(#[from] std::io::Error),
    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Remote(String),
}

fn validated(file: QuestionFile<QuestionPayload>) -> Vec<NewQuestion> {
    let mut by_category: BTreeMap<String, Vec<NewQuestion>> = BTreeMap::new();
    let mut rejected = 0;

    for (idx, payload) in file.questions.into_iter().enumerate() {
        match payload.into_new() {
            Ok(new) => by_category.entry(new.category.clone()).or_default().push(new),
            Err(errors) => {
                rejected += 1;
                let reasons: Vec<String> = errors
                    .iter()
                    .map(|e| format!("{}: {}", e.field, e.message))
                    .collect();
                error!(
                    "{}",
                    format!("├ ✘ Entry {} ({})", idx + 1, reasons.join(", "))
                        .red()
                        .strikethrough()
                );
            }
        }
    }

    let mut accepted = Vec::new();
    for (category, questions) in by_category {
        info!(
            "{}",
            format!("├ Category: {} ({} Questions)", category, questions.len()).blue()
        );
        for question in questions {
            info!(
                "{} {}",
                "│".blue(),
                format!("├ #{} {}", question.question_number, question.question).green()
            );
            accepted.push(question);
        }
    }
    if rejected > 0 {
        warn!("{}", format!("Skipped {} invalid entries", rejected).yellow());
    }
    accepted
}

fn import_local(args: &Args, questions: Vec<NewQuestion>) -> Result<usize, IoError> {
    let connection = db::create_or_open(&args.db)?;
    if args.refresh_db {
        Question::delete_all(&connection)?;
    }
    let mut imported = 0;
    for question in questions {
        Question::insert(&connection, question)?;
        imported += 1;
    }
    db::close_db(connection)?;
    Ok(imported)
}

cfg_if::cfg_if! {
    if #[cfg(feature = "client")] {
        async fn import_remote(url: &str, questions: Vec<NewQuestion>) -> Result<usize, IoError> {
            let client = cquizy::libcquizy::client::ApiClient::new(url)
                .map_err(|e| IoError::Remote(e.to_string()))?;
            let mut imported = 0;
            for question in &questions {
                client
                    .create_question(question)
                    .await
                    .map_err(|e| IoError::Remote(e.to_string()))?;
                imported += 1;
            }
            Ok(imported)
        }
    } else {
        async fn import_remote(url: &str, _questions: Vec<NewQuestion>) -> Result<usize, IoError> {
            Err(IoError::Remote(format!(
                "Cannot import into {url}: built without the `client` feature"
            )))
        }
    }
}

fn export(args: &Args) -> Result<usize, IoError> {
    let connection = db::create_or_open(&args.db)?;
    let questions = Question::get_all(&connection)?;
    db::close_db(connection)?;

    let count = questions.len();
    let json = serde_json::to_string_pretty(&QuestionFile { questions })?;
    std::fs::write(&args.json, json)?;
    Ok(count)
}

async fn run(args: &Args) -> Result<(), IoError> {
    info!(
        "{}",
        format!("File at {:?} and Database at {:?}", args.json, args.db).cyan()
    );

    match args.command {
        Commands::Import => {
            let json = std::fs::read_to_string(&args.json)?;
            let file: QuestionFile<QuestionPayload> = serde_json::from_str(&json)?;
            info!(
                "{}",
                format!("Importing data... ({} Questions)", file.questions.len()).blue()
            );

            let questions = validated(file);
            let imported = match &args.remote {
                Some(url) => import_remote(url, questions).await?,
                None => import_local(args, questions)?,
            };
            info!("{}", format!("Imported {} Questions", imported).green());
        }
        Commands::Export => {
            let exported = export(args)?;
            info!(
                "{}",
                format!("Exported {} Questions to {:?}", exported, args.json).green()
            );
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or(args.log_level.as_str())).init();

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err.to_string().red());
            ExitCode::FAILURE
        }
    }
}
