// src/reconcile.rs

use crate::invoice::{CanonicalInvoice, Warning, WarningRule};
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

pub const PREPAYMENT: &str = "Prepayment";

static PROFORMA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)pro\s*forma|proforma").unwrap());

// Longer labels come first so "PO Number" is stripped whole rather than as "PO".
static PO_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)^\s*(?:
            n[úu]mero\s+de\s+orden\s+de\s+compra
          | orden\s+de\s+compra
          | n[úu]mero\s+de\s+pedido
          | bon\s+de\s+commande
          | num[ée]ro\s+de\s+commande
          | bestellnummer
          | auftragsnummer
          | ordine\s+d['’]?\s*acquisto
          | numero\s+ordine
          | 注文書番号 | 注文番号 | 発注番号 | 発注書番号
          | purchase\s*order\s*(?:no\.?|number|nr\.?|n[oº°])?
          | order\s*(?:no\.?|number|nr\.?|n[oº°])
          | p\.?\s*o\.?\s*(?:no\.?|number|nr\.?)?
        )\s*[:\#：]?\s*",
    )
    .unwrap()
});

static NON_CODE_CHARS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^A-Za-z0-9\-/.]").unwrap());

/// Apply the business corrections in place, logging one warning per change.
pub fn reconcile(invoice: &mut CanonicalInvoice, warnings: &mut Vec<Warning>) {
    tag_proforma(invoice, warnings);
    sanitize_purchase_order(invoice, warnings);
}

/// Proforma invoices are booked as prepayments.
fn tag_proforma(invoice: &mut CanonicalInvoice, warnings: &mut Vec<Warning>) {
    let Some(current) = invoice.invoice.invoice_type.as_deref().map(str::trim) else {
        return;
    };
    if !PROFORMA.is_match(current) || current == PREPAYMENT {
        return;
    }
    let detail = format!("{current} -> {PREPAYMENT}");
    debug!(%detail, "tagging proforma invoice as prepayment");
    invoice.invoice.invoice_type = Some(PREPAYMENT.to_string());
    warnings.push(Warning::new(WarningRule::TaggedPrepaymentFromProforma, detail));
}

fn sanitize_purchase_order(invoice: &mut CanonicalInvoice, warnings: &mut Vec<Warning>) {
    let raw = invoice
        .invoice
        .purchase_order_number
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_string();

    if raw.is_empty() || raw == "null" {
        invoice.invoice.purchase_order_number = None;
        return;
    }

    let cleaned = sanitize_purchase_order_number(&raw);
    if let Some(code) = &cleaned {
        if *code != raw {
            let detail = format!("{raw} -> {code}");
            debug!(%detail, "sanitized purchase order number");
            warnings.push(Warning::new(WarningRule::SanitizedPurchaseOrderNumber, detail));
        }
    }
    invoice.invoice.purchase_order_number = cleaned;
}

/// Strip labels and stray characters from a PO number. `None` unless the
/// result has at least one digit and three characters.
pub fn sanitize_purchase_order_number(input: &str) -> Option<String> {
    let unlabelled = PO_LABEL.replace(input.trim(), "");
    let code = NON_CODE_CHARS.replace_all(&unlabelled, "").into_owned();

    if !code.chars().any(|c| c.is_ascii_digit()) || code.len() < 3 {
        return None;
    }
    Some(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoice_with(invoice_type: Option<&str>, po: Option<&str>) -> CanonicalInvoice {
        let mut inv = CanonicalInvoice::default();
        inv.invoice.invoice_type = invoice_type.map(str::to_string);
        inv.invoice.purchase_order_number = po.map(str::to_string);
        inv
    }

    fn tokens(warnings: &[Warning]) -> Vec<String> {
        warnings.iter().map(|w| w.rule.token()).collect()
    }

    #[test]
    fn test_proforma_becomes_prepayment() {
        for raw in ["Pro Forma", "PROFORMA", "pro  forma invoice", "Proforma"] {
            let mut inv = invoice_with(Some(raw), None);
            let mut warnings = Vec::new();
            reconcile(&mut inv, &mut warnings);
            assert_eq!(inv.invoice.invoice_type.as_deref(), Some(PREPAYMENT), "{raw}");
            assert_eq!(tokens(&warnings), vec!["tagged_prepayment_from_proforma"]);
        }
    }

    #[test]
    fn test_other_types_untouched() {
        let mut inv = invoice_with(Some("Standard"), None);
        let mut warnings = Vec::new();
        reconcile(&mut inv, &mut warnings);
        assert_eq!(inv.invoice.invoice_type.as_deref(), Some("Standard"));

        let mut inv = invoice_with(Some("Prepayment"), None);
        reconcile(&mut inv, &mut warnings);
        assert_eq!(inv.invoice.invoice_type.as_deref(), Some("Prepayment"));
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_po_label_stripped() {
        let mut inv = invoice_with(None, Some("PO: AB-123"));
        let mut warnings = Vec::new();
        reconcile(&mut inv, &mut warnings);
        assert_eq!(inv.invoice.purchase_order_number.as_deref(), Some("AB-123"));
        assert_eq!(tokens(&warnings), vec!["sanitized_purchase_order_number"]);
        assert_eq!(warnings[0].detail, "PO: AB-123 -> AB-123");
    }

    #[test]
    fn test_po_without_digit_dropped() {
        let mut inv = invoice_with(None, Some("xx"));
        let mut warnings = Vec::new();
        reconcile(&mut inv, &mut warnings);
        assert_eq!(inv.invoice.purchase_order_number, None);
    }

    #[test]
    fn test_clean_po_kept_without_warning() {
        let mut inv = invoice_with(None, Some("4500012345"));
        let mut warnings = Vec::new();
        reconcile(&mut inv, &mut warnings);
        assert_eq!(inv.invoice.purchase_order_number.as_deref(), Some("4500012345"));
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_missing_or_literal_null_po() {
        for po in [None, Some("null"), Some("   ")] {
            let mut inv = invoice_with(None, po);
            let mut warnings = Vec::new();
            reconcile(&mut inv, &mut warnings);
            assert_eq!(inv.invoice.purchase_order_number, None);
            assert!(warnings.is_empty());
        }
    }

    #[test]
    fn test_localized_labels() {
        assert_eq!(sanitize_purchase_order_number("P.O. #4500-77").as_deref(), Some("4500-77"));
        assert_eq!(sanitize_purchase_order_number("Purchase Order No. 778899").as_deref(), Some("778899"));
        assert_eq!(sanitize_purchase_order_number("Order Number: X/2024/5").as_deref(), Some("X/2024/5"));
        assert_eq!(sanitize_purchase_order_number("Bestellnummer: 12345").as_deref(), Some("12345"));
        assert_eq!(sanitize_purchase_order_number("Bon de commande # BC-991").as_deref(), Some("BC-991"));
        assert_eq!(sanitize_purchase_order_number("Ordine d'acquisto 2024.11").as_deref(), Some("2024.11"));
        assert_eq!(sanitize_purchase_order_number("Número de pedido: 556").as_deref(), Some("556"));
        assert_eq!(sanitize_purchase_order_number("注文番号：JP-1234").as_deref(), Some("JP-1234"));
    }

    #[test]
    fn test_too_short_or_no_digits() {
        assert_eq!(sanitize_purchase_order_number("PO 12"), None);
        assert_eq!(sanitize_purchase_order_number("N/A"), None);
        assert_eq!(sanitize_purchase_order_number("see attached"), None);
    }
}
