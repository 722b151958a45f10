// src/pipeline.rs

use crate::confidence::score;
use crate::document::prepare;
use crate::error::PipelineError;
use crate::invoice::{CanonicalInvoice, InvoiceMeta, VISUAL_PROCESSING_SNIPPET};
use crate::model::{FailoverPolicy, ModelInvoker, ReasoningService, UnusableModelPolicy};
use crate::normalize::{RawExtraction, normalize};
use crate::objects::ObjectStore;
use crate::parse::parse_model_json;
use crate::prompts::{extraction_prompt, repair_prompt};
use crate::reconcile::reconcile;
use crate::store::StateStore;
use serde::Deserialize;
use serde_json::Value;
use std::time::Instant;
use tracing::{Instrument, error, info, info_span, warn};

/// One attachment to extract, as delivered by the ingest queue.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItem {
    pub message_id: String,
    #[serde(default)]
    pub attachment_id: String,
    pub attachment_key: String,
    #[serde(default)]
    pub received_at: String,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub subject: String,
}

/// Terminal result of one item.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    Completed { confidence: f64, model_used: String },
    Failed { error: String },
}

/// Drives one work item through fetch, extraction, normalisation,
/// reconciliation and scoring, and persists exactly one terminal record.
pub struct Pipeline<S, O, St, P = UnusableModelPolicy> {
    invoker: ModelInvoker<S, P>,
    objects: O,
    store: St,
    bucket: String,
}

impl<S, O, St, P> Pipeline<S, O, St, P>
where
    S: ReasoningService,
    O: ObjectStore,
    St: StateStore,
    P: FailoverPolicy,
{
    pub fn new(invoker: ModelInvoker<S, P>, objects: O, store: St, bucket: impl Into<String>) -> Self {
        Self {
            invoker,
            objects,
            store,
            bucket: bucket.into(),
        }
    }

    pub fn store(&self) -> &St {
        &self.store
    }

    /// Process one item. Never fails: every error ends up in a FAILED record.
    pub async fn process(&self, item: &WorkItem) -> ItemOutcome {
        let span = info_span!(
            "extract",
            message_id = %item.message_id,
            attachment_key = %item.attachment_key
        );
        self.process_inner(item).instrument(span).await
    }

    async fn process_inner(&self, item: &WorkItem) -> ItemOutcome {
        let started = Instant::now();
        let primary = self.invoker.models().primary.as_str();

        let result = match self.extract(item).await {
            Ok(invoice) => self.store.upsert_completed(item, &invoice).map(|_| invoice),
            Err(e) => Err(e),
        };

        match result {
            Ok(invoice) => {
                let (filled, total) = invoice.coverage();
                info!(
                    confidence = invoice.meta.confidence_score,
                    model_used = %invoice.meta.extraction_model,
                    coverage = %format!("{filled}/{total}"),
                    fields_not_found = ?invoice.fields_not_found(),
                    warnings = invoice.meta.warnings.len(),
                    "Extraction completed"
                );
                info!(target: "metrics", metric = "ExtractionSuccess", value = 1, model = %invoice.meta.extraction_model);
                info!(
                    target: "metrics",
                    metric = "ExtractionDurationMs",
                    value = started.elapsed().as_millis() as u64,
                    model = %invoice.meta.extraction_model
                );
                ItemOutcome::Completed {
                    confidence: invoice.meta.confidence_score,
                    model_used: invoice.meta.extraction_model,
                }
            }
            Err(e) => {
                let message = e.to_string();
                error!(
                    message_id = %item.message_id,
                    attachment_key = %item.attachment_key,
                    error = %message,
                    "Extraction failed"
                );
                info!(target: "metrics", metric = "ExtractionFailure", value = 1, model = %primary);
                if let Err(store_err) = self.store.upsert_failed(item, std::slice::from_ref(&message)) {
                    error!(error = %store_err, "Failed to persist FAILED record");
                }
                ItemOutcome::Failed { error: message }
            }
        }
    }

    async fn extract(&self, item: &WorkItem) -> Result<CanonicalInvoice, PipelineError> {
        let bytes = self.objects.get(&self.bucket, &item.attachment_key).await?;
        info!(size = bytes.len(), "Fetched attachment");
        let document = prepare(&item.attachment_key, bytes);

        let primary = self.invoker.models().primary.as_str();
        let prompt = extraction_prompt("", true);
        let response = self
            .invoker
            .invoke(primary, &prompt, std::slice::from_ref(&document))
            .await?;

        let (raw, model_used) = match parse_model_json(&response.text) {
            Some(raw) => (raw, response.model_used),
            None => self.repair(primary, &response.text).await?,
        };

        let mut invoice = normalize(RawExtraction::classify(raw));
        let mut warnings = Vec::new();
        reconcile(&mut invoice, &mut warnings);

        invoice.meta = InvoiceMeta {
            message_id: item.message_id.clone(),
            received_at: item.received_at.clone(),
            from: item.from.clone(),
            subject: item.subject.clone(),
            attachment_key: item.attachment_key.clone(),
            extraction_model: model_used,
            confidence_score: 0.0,
            warnings,
            extracted_text_snippet: VISUAL_PROCESSING_SNIPPET.to_string(),
        };
        invoice.meta.confidence_score = score(&invoice);
        Ok(invoice)
    }

    /// One text-only retry asking the model to fix its own output.
    async fn repair(&self, model_id: &str, broken: &str) -> Result<(Value, String), PipelineError> {
        warn!(model_id = %model_id, "Model output was not valid JSON; requesting repair");
        let repaired = self.invoker.invoke(model_id, &repair_prompt(broken), &[]).await?;
        let raw = parse_model_json(&repaired.text).ok_or(PipelineError::ExtractionParse)?;
        Ok((raw, repaired.model_used))
    }
}
