mod confidence;
mod config;
mod document;
mod error;
mod invoice;
mod model;
mod normalize;
mod objects;
mod oracle;
mod parse;
mod pipeline;
mod prompts;
mod reconcile;
mod store;

use clap::{Parser, Subcommand};
use model::{HttpReasoningService, ModelInvoker};
use objects::FsObjectStore;
use pipeline::{ItemOutcome, Pipeline, WorkItem};
use std::path::{Path, PathBuf};
use store::{InvoiceStore, ItemStatus, StateStore};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "invoice_extract",
    about = "Extract, score and store invoices from mail attachments",
    version
)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = ".config/invoice_extract.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process work items, one JSON object per line
    Process {
        /// Queue file (defaults to stdin)
        #[arg(short, long)]
        queue: Option<PathBuf>,
    },
    /// Print the Oracle Fusion payload for a completed invoice
    Oracle {
        message_id: String,
        attachment_key: String,
    },
    /// Print record counts by status and list failed items
    Stats,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // init tracing
    tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let cfg = config::Config::load_or_default(&args.config)?;

    if let Some(parent) = Path::new(&cfg.db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let db = InvoiceStore::new(&cfg.db_path)?;

    match args.command {
        Command::Process { queue } => {
            let service = HttpReasoningService::new(&cfg.service)?;
            let invoker = ModelInvoker::new(service, cfg.models.clone());
            let objects = FsObjectStore::new(&cfg.storage.attachment_root);
            let pipeline = Pipeline::new(invoker, objects, db, cfg.storage.attachment_bucket.clone());
            process_queue(&pipeline, queue.as_deref()).await?;
            log_counts(pipeline.store())?;
        }
        Command::Oracle {
            message_id,
            attachment_key,
        } => {
            let Some(record) = db.get(&message_id, &attachment_key)? else {
                return Err(format!("no record for {message_id} / {attachment_key}").into());
            };
            if record.status != ItemStatus::Completed {
                return Err(format!("record is {}, not COMPLETED", record.status.as_str()).into());
            }
            let Some(invoice) = record.invoice() else {
                return Err("completed record has no extracted invoice".into());
            };
            info!(
                uid = %record.uid,
                updated_at = %record.updated_at,
                vendor = ?record.vendor_name,
                invoice_number = ?record.invoice_number,
                total = ?record.total_amount,
                currency = ?record.currency,
                confidence = ?record.confidence,
                model_used = ?record.model_used,
                "Loaded invoice record"
            );
            let payload = oracle::to_oracle_fusion(&invoice?, &cfg.oracle);
            println!("{}", serde_json::to_string_pretty(&payload)?);
            for problem in oracle::validate(&payload) {
                warn!(problem = %problem, "Oracle payload incomplete");
            }
        }
        Command::Stats => {
            log_counts(&db)?;
            for record in db.list_by_status(ItemStatus::Failed)? {
                warn!(
                    message_id = %record.message_id,
                    attachment_key = %record.attachment_key,
                    attachment_id = %record.attachment_id,
                    from = %record.from_addr,
                    subject = %record.subject,
                    received_at = %record.received_at,
                    errors = ?record.errors,
                    "Failed invoice"
                );
            }
        }
    }

    Ok(())
}

async fn process_queue<S, O, P>(
    pipeline: &Pipeline<S, O, InvoiceStore, P>,
    queue: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>>
where
    S: model::ReasoningService,
    O: objects::ObjectStore,
    P: model::FailoverPolicy,
{
    let reader: Box<dyn AsyncBufRead + Unpin> = match queue {
        Some(path) => Box::new(BufReader::new(tokio::fs::File::open(path).await?)),
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };

    let mut lines = reader.lines();
    let (mut completed, mut failed) = (0usize, 0usize);
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let item: WorkItem = match serde_json::from_str(&line) {
            Ok(item) => item,
            Err(e) => {
                warn!(error = %e, "Skipping malformed work item");
                continue;
            }
        };

        // Items arrive PENDING; the pipeline writes the terminal record.
        if let Err(e) = pipeline.store().upsert_pending(&item) {
            error!(message_id = %item.message_id, error = %e, "Failed to record pending item");
        }
        match pipeline.process(&item).await {
            ItemOutcome::Completed { confidence, model_used } => {
                info!(message_id = %item.message_id, confidence, model_used = %model_used, "COMPLETED");
                completed += 1;
            }
            ItemOutcome::Failed { error } => {
                info!(message_id = %item.message_id, error = %error, "FAILED");
                failed += 1;
            }
        }
    }

    info!(completed, failed, "Queue drained");
    Ok(())
}

fn log_counts(db: &InvoiceStore) -> Result<(), Box<dyn std::error::Error>> {
    let counts = db.get_counts()?;
    info!(
        invoices_total = counts.total,
        invoices_pending = counts.pending,
        invoices_completed = counts.completed,
        invoices_failed = counts.failed,
        "Database statistics"
    );
    Ok(())
}
