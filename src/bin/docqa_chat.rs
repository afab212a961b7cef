//! Interactive terminal front end.
//!
//! Uploads the configured document directory, then answers a single `--question` or reads
//! questions from stdin until `exit`, `quit`, `q`, or end of input.
use anyhow::{Context, Result};
use clap::Parser;
use docqa::{
    config,
    ingest::UploadReport,
    logging,
    orchestrator::{AskError, DocumentAssistant},
    remote::OpenAiClient,
};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(
    name = "docqa-chat",
    about = "Ask questions about a directory of PDF documents"
)]
struct Cli {
    /// Ask one question and exit instead of starting an interactive session.
    #[arg(long, short)]
    question: Option<String>,
    /// Override the document directory from the environment.
    #[arg(long)]
    pdf_dir: Option<PathBuf>,
}

const EXIT_WORDS: [&str; 3] = ["exit", "quit", "q"];

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::init_config().context("Failed to load configuration")?;
    logging::init_tracing(logging::LogSettings::chat());

    let mut settings = config.assistant_settings();
    if let Some(dir) = cli.pdf_dir {
        settings.document_dir = dir;
    }
    tokio::fs::create_dir_all(&settings.document_dir)
        .await
        .with_context(|| format!("Failed to create {}", settings.document_dir.display()))?;

    let client = Arc::new(
        OpenAiClient::new(
            &config.openai_base_url,
            &config.openai_api_key,
            Duration::from_secs(config.http_timeout_secs),
        )
        .context("Failed to build API client")?,
    );
    println!("Uploading documents from {} ...", settings.document_dir.display());
    let assistant = DocumentAssistant::setup(settings, client.clone(), client)
        .await
        .context("Failed to set up document assistant")?;
    print_summary(assistant.initial_report());

    if let Some(question) = cli.question {
        return match assistant.ask(&question).await {
            Ok(answer) => {
                println!("{}", answer.text);
                Ok(())
            }
            Err(error) => {
                eprintln!("{}", error.user_message());
                Err(error).context("Question was not answered")
            }
        };
    }

    println!("Ask a question about your documents (type 'exit' to quit).");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush().context("Failed to flush stdout")?;

        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if EXIT_WORDS.contains(&question.to_ascii_lowercase().as_str()) {
            break;
        }

        match assistant.ask(question).await {
            Ok(answer) => println!("\n{}\n", answer.text),
            Err(AskError::EmptyQuestion) => continue,
            Err(error) => {
                tracing::debug!(error = %error, "Question failed");
                println!("\n{}\n", error.user_message());
            }
        }
    }

    println!("Goodbye.");
    Ok(())
}

fn print_summary(report: &UploadReport) {
    println!(
        "Uploaded {} of {} documents ({} failed).",
        report.succeeded, report.total, report.failed
    );
    for failure in &report.failures {
        println!(
            "  {}: {}",
            failure.document,
            failure.error.as_deref().unwrap_or("unknown error")
        );
    }
}
