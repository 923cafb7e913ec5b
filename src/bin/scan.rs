use clap::Parser;
use idcard_ocr::poller::{
    self, submit_upload, CancelFlag, HttpStatusSource, PollOutcome, ScanResult, StatusPoller,
    UploadReply,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "idcard-scan")]
#[command(about = "Upload an ID card image and wait for the recognition result")]
#[command(version)]
struct Cli {
    /// JPEG or PNG image to scan
    image: PathBuf,

    /// Base URL of the gateway
    #[arg(long, env = "OCR_SERVER_URL", default_value = "http://localhost:8080")]
    server: String,

    /// Ask the server to run the job inline instead of polling
    #[arg(long)]
    sync: bool,

    /// Seconds between status queries
    #[arg(long, default_value_t = poller::POLL_INTERVAL.as_secs())]
    interval: u64,

    /// Seconds to wait before giving up
    #[arg(long, default_value_t = poller::POLL_BUDGET.as_secs())]
    timeout: u64,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(outcome) => report(&outcome),
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<PollOutcome, Box<dyn std::error::Error>> {
    let http = reqwest::Client::new();

    let reply = submit_upload(&http, &cli.server, &cli.image, cli.sync).await?;
    let job_id = match reply {
        UploadReply::Finished { payload, .. } => {
            return Ok(match payload.status {
                idcard_ocr::models::job::JobState::Done => {
                    PollOutcome::Done(ScanResult::from_result_value(payload.result.as_ref()))
                }
                status => PollOutcome::Failed {
                    status,
                    message: payload.error.unwrap_or_default(),
                },
            });
        }
        UploadReply::Queued { job_id } => job_id,
    };
    eprintln!("job {job_id} queued, waiting for result");

    let cancel = CancelFlag::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let poller = StatusPoller::new(HttpStatusSource::new(http, cli.server), cancel).with_timing(
        Duration::from_secs(cli.interval.max(1)),
        Duration::from_secs(cli.timeout),
    );
    Ok(poller.poll(&job_id).await)
}

fn report(outcome: &PollOutcome) -> ExitCode {
    match outcome {
        PollOutcome::Done(result) => {
            println!("{}", result.masked_text);
            if !result.fields.is_null() {
                match serde_json::to_string_pretty(&result.fields) {
                    Ok(fields) => println!("{fields}"),
                    Err(e) => eprintln!("could not render fields: {e}"),
                }
            }
            ExitCode::SUCCESS
        }
        other => {
            eprintln!("{}", other.describe());
            ExitCode::FAILURE
        }
    }
}
