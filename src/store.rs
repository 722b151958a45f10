use crate::error::PipelineError;
use crate::invoice::CanonicalInvoice;
use crate::pipeline::WorkItem;
use rusqlite::{Connection, OptionalExtension, Result as SqliteResult, params};
use sha2::{Digest, Sha256};
use std::path::Path;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::info;

/// Processing state of a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    Pending,
    Completed,
    Failed,
}

impl ItemStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::Pending => "PENDING",
            ItemStatus::Completed => "COMPLETED",
            ItemStatus::Failed => "FAILED",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "COMPLETED" => ItemStatus::Completed,
            "FAILED" => ItemStatus::Failed,
            _ => ItemStatus::Pending,
        }
    }
}

/// Durable per-item state, keyed by `(message_id, attachment_key)`.
/// Every write replaces the whole record so redelivered items are idempotent.
pub trait StateStore {
    fn upsert_pending(&self, item: &WorkItem) -> Result<(), PipelineError>;
    fn upsert_completed(&self, item: &WorkItem, invoice: &CanonicalInvoice) -> Result<(), PipelineError>;
    fn upsert_failed(&self, item: &WorkItem, errors: &[String]) -> Result<(), PipelineError>;
    fn get(&self, message_id: &str, attachment_key: &str) -> Result<Option<StoredInvoice>, PipelineError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredInvoice {
    pub uid: String,
    pub message_id: String,
    pub attachment_key: String,
    pub attachment_id: String,
    pub status: ItemStatus,
    pub updated_at: String,
    pub received_at: String,
    pub from_addr: String,
    pub subject: String,
    /// Canonical invoice JSON (COMPLETED only).
    pub extracted_json: Option<String>,
    pub confidence: Option<f64>,
    pub vendor_name: Option<String>,
    pub invoice_number: Option<String>,
    pub currency: Option<String>,
    pub total_amount: Option<f64>,
    pub model_used: Option<String>,
    pub errors: Vec<String>,
}

impl StoredInvoice {
    pub fn invoice(&self) -> Option<Result<CanonicalInvoice, serde_json::Error>> {
        self.extracted_json.as_deref().map(serde_json::from_str)
    }
}

/// Counts of stored items by status.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub total: usize,
    pub pending: usize,
    pub completed: usize,
    pub failed: usize,
}

pub struct InvoiceStore {
    conn: Connection,
}

const SELECT_COLUMNS: &str = "uid, message_id, attachment_key, attachment_id, status, updated_at,
    received_at, from_addr, subject, extracted_json, confidence, vendor_name, invoice_number,
    currency, total_amount, model_used, errors";

pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default()
}

impl InvoiceStore {
    /// Create a new invoice store with SQLite backend
    pub fn new<P: AsRef<Path>>(db_path: P) -> SqliteResult<Self> {
        Self::init(Connection::open(db_path)?)
    }

    pub fn in_memory() -> SqliteResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> SqliteResult<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS invoices (
                uid TEXT PRIMARY KEY,
                message_id TEXT NOT NULL,
                attachment_key TEXT NOT NULL,
                attachment_id TEXT NOT NULL,
                status TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                received_at TEXT NOT NULL,
                from_addr TEXT NOT NULL,
                subject TEXT NOT NULL,
                extracted_json TEXT,
                confidence REAL,
                vendor_name TEXT,
                invoice_number TEXT,
                currency TEXT,
                total_amount REAL,
                model_used TEXT,
                errors TEXT NOT NULL DEFAULT '[]',
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_invoices_status ON invoices(status)",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_invoices_received_at ON invoices(received_at)",
            [],
        )?;

        info!("Invoice store initialized");
        Ok(Self { conn })
    }

    /// Stable record id for an item: SHA-256 over its key parts.
    pub fn generate_uid(message_id: &str, attachment_key: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(message_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(attachment_key.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Replace the record for `record.uid` wholesale.
    pub fn upsert(&self, record: &StoredInvoice) -> SqliteResult<()> {
        let errors = serde_json::to_string(&record.errors)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
        self.conn.execute(
            "INSERT INTO invoices
                (uid, message_id, attachment_key, attachment_id, status, updated_at, received_at,
                 from_addr, subject, extracted_json, confidence, vendor_name, invoice_number,
                 currency, total_amount, model_used, errors)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
             ON CONFLICT(uid) DO UPDATE SET
                attachment_id = excluded.attachment_id,
                status = excluded.status,
                updated_at = excluded.updated_at,
                received_at = excluded.received_at,
                from_addr = excluded.from_addr,
                subject = excluded.subject,
                extracted_json = excluded.extracted_json,
                confidence = excluded.confidence,
                vendor_name = excluded.vendor_name,
                invoice_number = excluded.invoice_number,
                currency = excluded.currency,
                total_amount = excluded.total_amount,
                model_used = excluded.model_used,
                errors = excluded.errors",
            params![
                record.uid,
                record.message_id,
                record.attachment_key,
                record.attachment_id,
                record.status.as_str(),
                record.updated_at,
                record.received_at,
                record.from_addr,
                record.subject,
                record.extracted_json,
                record.confidence,
                record.vendor_name,
                record.invoice_number,
                record.currency,
                record.total_amount,
                record.model_used,
                errors,
            ],
        )?;
        info!(uid = %record.uid, status = record.status.as_str(), "Invoice record stored");
        Ok(())
    }

    /// Get the record for one item.
    pub fn get(&self, message_id: &str, attachment_key: &str) -> SqliteResult<Option<StoredInvoice>> {
        let uid = Self::generate_uid(message_id, attachment_key);
        self.conn
            .query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM invoices WHERE uid = ?1"),
                params![uid],
                Self::row_to_record,
            )
            .optional()
    }

    /// All records in one status, newest first.
    pub fn list_by_status(&self, status: ItemStatus) -> SqliteResult<Vec<StoredInvoice>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM invoices WHERE status = ?1 ORDER BY received_at DESC"
        ))?;
        let rows = stmt.query_map(params![status.as_str()], Self::row_to_record)?;
        rows.collect()
    }

    /// Helper: map a row with the `SELECT_COLUMNS` projection to `StoredInvoice`.
    fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredInvoice> {
        let status: String = row.get(4)?;
        let errors: String = row.get(16)?;
        Ok(StoredInvoice {
            uid: row.get(0)?,
            message_id: row.get(1)?,
            attachment_key: row.get(2)?,
            attachment_id: row.get(3)?,
            status: ItemStatus::parse(&status),
            updated_at: row.get(5)?,
            received_at: row.get(6)?,
            from_addr: row.get(7)?,
            subject: row.get(8)?,
            extracted_json: row.get(9)?,
            confidence: row.get(10)?,
            vendor_name: row.get(11)?,
            invoice_number: row.get(12)?,
            currency: row.get(13)?,
            total_amount: row.get(14)?,
            model_used: row.get(15)?,
            errors: serde_json::from_str(&errors).unwrap_or_default(),
        })
    }

    /// Get count of records by processing status
    pub fn get_counts(&self) -> SqliteResult<StatusCounts> {
        let mut stmt = self
            .conn
            .prepare("SELECT status, COUNT(*) FROM invoices GROUP BY status")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, usize>(1)?)))?;

        let mut counts = StatusCounts::default();
        for row in rows {
            let (status, n) = row?;
            counts.total += n;
            match ItemStatus::parse(&status) {
                ItemStatus::Pending => counts.pending += n,
                ItemStatus::Completed => counts.completed += n,
                ItemStatus::Failed => counts.failed += n,
            }
        }
        Ok(counts)
    }

    fn envelope(item: &WorkItem, status: ItemStatus) -> StoredInvoice {
        StoredInvoice {
            uid: Self::generate_uid(&item.message_id, &item.attachment_key),
            message_id: item.message_id.clone(),
            attachment_key: item.attachment_key.clone(),
            attachment_id: item.attachment_id.clone(),
            status,
            updated_at: now_rfc3339(),
            received_at: item.received_at.clone(),
            from_addr: item.from.clone(),
            subject: item.subject.clone(),
            extracted_json: None,
            confidence: None,
            vendor_name: None,
            invoice_number: None,
            currency: None,
            total_amount: None,
            model_used: None,
            errors: Vec::new(),
        }
    }
}

impl StateStore for InvoiceStore {
    fn upsert_pending(&self, item: &WorkItem) -> Result<(), PipelineError> {
        Ok(self.upsert(&Self::envelope(item, ItemStatus::Pending))?)
    }

    fn upsert_completed(&self, item: &WorkItem, invoice: &CanonicalInvoice) -> Result<(), PipelineError> {
        let record = StoredInvoice {
            extracted_json: Some(serde_json::to_string(invoice)?),
            confidence: Some(invoice.meta.confidence_score),
            vendor_name: invoice.vendor.name.clone(),
            invoice_number: invoice.invoice.invoice_number.clone(),
            currency: invoice.invoice.currency.clone(),
            total_amount: invoice.invoice.total_amount,
            model_used: Some(invoice.meta.extraction_model.clone()),
            ..Self::envelope(item, ItemStatus::Completed)
        };
        Ok(self.upsert(&record)?)
    }

    fn upsert_failed(&self, item: &WorkItem, errors: &[String]) -> Result<(), PipelineError> {
        let record = StoredInvoice {
            errors: errors.to_vec(),
            ..Self::envelope(item, ItemStatus::Failed)
        };
        Ok(self.upsert(&record)?)
    }

    fn get(&self, message_id: &str, attachment_key: &str) -> Result<Option<StoredInvoice>, PipelineError> {
        Ok(InvoiceStore::get(self, message_id, attachment_key)?)
    }
}
