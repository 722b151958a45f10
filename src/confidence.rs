// src/confidence.rs

use crate::invoice::{CanonicalInvoice, LineItem};

/// Ceilings applied after the checks are summed.
pub mod caps {
    /// Output looks like the prompt template echoed back, or the total is zero.
    pub const TEMPLATE: f64 = 0.2;
    /// Text-based extraction with almost no source text.
    pub const SHORT_SNIPPET: f64 = 0.35;
    /// Raw output needed reconciling.
    pub const RECONCILED: f64 = 0.85;
}

const CHECKS: f64 = 6.0;
const MIN_SNIPPET_CHARS: usize = 80;
const LINE_SUM_TOLERANCE: f64 = 0.01;

const PLACEHOLDERS: &[&str] = &[
    "seller name",
    "item",
    "number",
    "address or null",
    "vat number or null",
    "vat number",
    "eur/usd/etc",
    "eur/usd/etc.",
    "...",
];

/// Empty, or a value copied from the prompt's example shape.
pub fn is_placeholder(s: &str) -> bool {
    let v = s.trim().to_lowercase();
    v.is_empty() || PLACEHOLDERS.contains(&v.as_str()) || v.contains("or null")
}

fn positive(n: Option<f64>) -> bool {
    n.is_some_and(|n| n.is_finite() && n > 0.0)
}

/// Relative closeness; two zeros are equal.
fn close(a: f64, b: f64, tolerance: f64) -> bool {
    let max = a.abs().max(b.abs());
    if max == 0.0 {
        return a == b;
    }
    (a - b).abs() / max <= tolerance
}

fn is_real_line_item(item: &LineItem) -> bool {
    let desc = item.description.as_deref().unwrap_or_default();
    !is_placeholder(desc) && positive(item.amount)
}

/// Net amount (total - tax) agrees with the sum of line amounts within 1%.
fn arithmetic_consistent(invoice: &CanonicalInvoice) -> bool {
    let (Some(total), Some(tax)) = (invoice.invoice.total_amount, invoice.invoice.tax_amount) else {
        return false;
    };
    if !total.is_finite() || !tax.is_finite() || total <= 0.0 || tax < 0.0 {
        return false;
    }
    if invoice.line_items.is_empty() {
        return false;
    }
    let net = total - tax;
    let line_sum: f64 = invoice
        .line_items
        .iter()
        .filter_map(|li| li.amount)
        .filter(|a| a.is_finite())
        .sum();
    net > 0.0 && line_sum > 0.0 && close(net, line_sum, LINE_SUM_TOLERANCE)
}

fn looks_like_template(invoice: &CanonicalInvoice) -> bool {
    let vendor = invoice.vendor.name.as_deref().unwrap_or_default().trim();
    let number = invoice.invoice.invoice_number.as_deref().unwrap_or_default().trim();
    let currency = invoice.invoice.currency.as_deref().unwrap_or_default().trim();

    is_placeholder(vendor)
        || invoice
            .line_items
            .iter()
            .any(|li| is_placeholder(li.description.as_deref().unwrap_or_default()))
        || vendor.eq_ignore_ascii_case("seller name")
        || currency.to_lowercase().contains("eur/usd")
        || number.eq_ignore_ascii_case("number")
}

fn is_visual_processing(snippet: &str) -> bool {
    snippet.contains("visually by AI") || snippet.contains("PDF processed")
}

/// Trust score in `[0, 1]` for an extracted invoice.
///
/// Five presence/plausibility checks and one arithmetic cross-check each
/// contribute 1/6; caps then bound the result for template-like output,
/// zero totals, thin source text and reconciled extractions.
pub fn score(invoice: &CanonicalInvoice) -> f64 {
    let vendor = invoice.vendor.name.as_deref().unwrap_or_default().trim();
    let number = invoice.invoice.invoice_number.as_deref().unwrap_or_default().trim();
    let currency = invoice.invoice.currency.as_deref().unwrap_or_default().trim();

    let checks = [
        !is_placeholder(vendor) && vendor.chars().count() >= 3,
        !is_placeholder(number)
            && number.chars().any(|c| c.is_ascii_alphanumeric())
            && number.chars().any(|c| c.is_ascii_digit()),
        currency.len() == 3 && currency.chars().all(|c| c.is_ascii_uppercase()) && currency != "ETC",
        positive(invoice.invoice.total_amount),
        invoice.line_items.iter().any(is_real_line_item),
        arithmetic_consistent(invoice),
    ];
    let passed = checks.iter().filter(|&&ok| ok).count() as f64;
    let mut conf = (passed / CHECKS).clamp(0.0, 1.0);

    if looks_like_template(invoice) {
        conf = conf.min(caps::TEMPLATE);
    }
    if invoice.invoice.total_amount == Some(0.0) {
        conf = conf.min(caps::TEMPLATE);
    }

    let snippet = invoice.meta.extracted_text_snippet.trim();
    if !snippet.is_empty() && snippet.chars().count() < MIN_SNIPPET_CHARS && !is_visual_processing(snippet) {
        conf = conf.min(caps::SHORT_SNIPPET);
    }

    if invoice.has_reconciliation_warning() {
        conf = conf.min(caps::RECONCILED);
    }

    conf
}
