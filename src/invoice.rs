// src/invoice.rs

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Snippet recorded when the model read the attachment itself rather than extracted text.
pub const VISUAL_PROCESSING_SNIPPET: &str = "(PDF processed visually by AI)";

/// The invoice issuer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vendor {
    pub name: Option<String>,
    pub tax_id: Option<String>,
    pub address: Option<String>,
}

/// Invoice header fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceHeader {
    pub invoice_number: Option<String>,
    pub purchase_order_number: Option<String>,
    pub invoice_type: Option<String>,
    pub invoice_date: Option<String>,
    pub due_date: Option<String>,
    pub currency: Option<String>,
    pub total_amount: Option<f64>,
    pub tax_amount: Option<f64>,
}

/// A single invoice line item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,
    pub description: Option<String>,
    pub quantity: Option<f64>,
    pub unit_price: Option<f64>,
    pub amount: Option<f64>,
}

/// What a warning records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarningRule {
    TaggedPrepaymentFromProforma,
    SanitizedPurchaseOrderNumber,
    /// A field was reconciled against inconsistent raw output.
    Reconciled(String),
    /// A token this build does not know, kept as-is.
    Other(String),
}

impl WarningRule {
    pub fn token(&self) -> String {
        match self {
            WarningRule::TaggedPrepaymentFromProforma => "tagged_prepayment_from_proforma".to_string(),
            WarningRule::SanitizedPurchaseOrderNumber => "sanitized_purchase_order_number".to_string(),
            WarningRule::Reconciled(field) => format!("reconciled_{field}"),
            WarningRule::Other(token) => token.clone(),
        }
    }

    pub fn from_token(token: &str) -> Self {
        match token {
            "tagged_prepayment_from_proforma" => WarningRule::TaggedPrepaymentFromProforma,
            "sanitized_purchase_order_number" => WarningRule::SanitizedPurchaseOrderNumber,
            _ => match token.strip_prefix("reconciled_") {
                Some(field) => WarningRule::Reconciled(field.to_string()),
                None => WarningRule::Other(token.to_string()),
            },
        }
    }

    pub fn is_reconciliation(&self) -> bool {
        matches!(self, WarningRule::Reconciled(_))
    }
}

/// One entry in an invoice's warning log. Persisted as its token; `detail`
/// is for logs only.
#[derive(Debug, Clone, PartialEq)]
pub struct Warning {
    pub rule: WarningRule,
    pub detail: String,
}

impl Warning {
    pub fn new(rule: WarningRule, detail: impl Into<String>) -> Self {
        Self {
            rule,
            detail: detail.into(),
        }
    }
}

impl Serialize for Warning {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.rule.token())
    }
}

impl<'de> Deserialize<'de> for Warning {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let token = String::deserialize(deserializer)?;
        Ok(Warning::new(WarningRule::from_token(&token), String::new()))
    }
}

/// Provenance of an extraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceMeta {
    pub message_id: String,
    pub received_at: String,
    pub from: String,
    pub subject: String,
    pub attachment_key: String,
    pub extraction_model: String,
    pub confidence_score: f64,
    pub warnings: Vec<Warning>,
    pub extracted_text_snippet: String,
}

/// The canonical invoice record persisted for every completed work item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalInvoice {
    pub vendor: Vendor,
    pub invoice: InvoiceHeader,
    pub line_items: Vec<LineItem>,
    #[serde(default)]
    pub meta: InvoiceMeta,
}

impl CanonicalInvoice {
    /// Names of the canonical scalar fields that came back empty.
    pub fn fields_not_found(&self) -> Vec<&'static str> {
        let v = &self.vendor;
        let i = &self.invoice;
        [
            ("vendor.name", v.name.is_some()),
            ("vendor.taxId", v.tax_id.is_some()),
            ("vendor.address", v.address.is_some()),
            ("invoice.invoiceNumber", i.invoice_number.is_some()),
            ("invoice.purchaseOrderNumber", i.purchase_order_number.is_some()),
            ("invoice.invoiceType", i.invoice_type.is_some()),
            ("invoice.invoiceDate", i.invoice_date.is_some()),
            ("invoice.dueDate", i.due_date.is_some()),
            ("invoice.currency", i.currency.is_some()),
            ("invoice.totalAmount", i.total_amount.is_some()),
            ("invoice.taxAmount", i.tax_amount.is_some()),
        ]
        .into_iter()
        .filter(|(_, present)| !present)
        .map(|(name, _)| name)
        .collect()
    }

    /// How many canonical scalar fields were extracted (out of the total).
    pub fn coverage(&self) -> (usize, usize) {
        let total = 11;
        (total - self.fields_not_found().len(), total)
    }

    pub fn has_reconciliation_warning(&self) -> bool {
        self.meta.warnings.iter().any(|w| w.rule.is_reconciliation())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serialized_shape_is_camel_case() {
        let mut invoice = CanonicalInvoice::default();
        invoice.vendor.tax_id = Some("DE123".into());
        invoice.invoice.total_amount = Some(10.5);
        invoice.meta.warnings.push(Warning::new(
            WarningRule::SanitizedPurchaseOrderNumber,
            "PO: 12 -> 12",
        ));
        let v = serde_json::to_value(&invoice).unwrap();
        assert_eq!(v["vendor"]["taxId"], "DE123");
        assert_eq!(v["invoice"]["totalAmount"], 10.5);
        assert_eq!(v["invoice"]["purchaseOrderNumber"], json!(null));
        assert_eq!(v["meta"]["warnings"], json!(["sanitized_purchase_order_number"]));
        assert_eq!(v["lineItems"], json!([]));
    }

    #[test]
    fn test_warning_tokens() {
        for rule in [
            WarningRule::TaggedPrepaymentFromProforma,
            WarningRule::SanitizedPurchaseOrderNumber,
            WarningRule::Reconciled("total_amount".into()),
            WarningRule::Other("custom".into()),
        ] {
            assert_eq!(WarningRule::from_token(&rule.token()), rule);
        }
        assert!(WarningRule::from_token("reconciled_total_amount").is_reconciliation());
        assert!(!WarningRule::TaggedPrepaymentFromProforma.is_reconciliation());
    }

    #[test]
    fn test_coverage() {
        let mut invoice = CanonicalInvoice::default();
        assert_eq!(invoice.coverage(), (0, 11));
        invoice.vendor.name = Some("Acme".into());
        invoice.invoice.currency = Some("EUR".into());
        assert_eq!(invoice.coverage(), (2, 11));
        assert!(!invoice.fields_not_found().contains(&"vendor.name"));
        assert!(invoice.fields_not_found().contains(&"invoice.totalAmount"));
    }
}
