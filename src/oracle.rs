// src/oracle.rs
//
// Projection of a canonical invoice onto the Oracle Fusion Payables
// interface-invoice payload.

use crate::invoice::{CanonicalInvoice, LineItem};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use time::macros::format_description;
use time::{Date, OffsetDateTime};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SupplierRef {
    pub supplier_id: Option<u64>,
    pub supplier_number: Option<String>,
    pub supplier_site: Option<String>,
}

/// Chart-of-accounts segments used when a line carries no accounting of its own.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DistributionDefaults {
    pub account: Option<String>,
    pub cost_center: Option<String>,
    pub department: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub source: String,
    pub business_unit: String,
    pub default_invoice_type: String,
    /// Vendor name (exact match) -> supplier identification.
    pub supplier_mapping: HashMap<String, SupplierRef>,
    pub default_distribution: Option<DistributionDefaults>,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            source: "INVOICE_EXTRACTOR".to_string(),
            business_unit: "US1 Business Unit".to_string(),
            default_invoice_type: "Standard".to_string(),
            supplier_mapping: HashMap::new(),
            default_distribution: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct OracleFusionInvoice {
    pub source: String,
    pub invoice_number: String,
    pub invoice_amount: f64,
    pub invoice_date: String,
    pub invoice_currency: String,
    pub invoice_type: String,
    pub business_unit: String,
    pub gl_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_received_date: Option<String>,
    pub supplier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplier_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplier_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplier_site: Option<String>,
    #[serde(rename = "lines")]
    pub lines: Vec<OracleLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct OracleLine {
    pub line_number: u32,
    pub line_type: String,
    pub line_amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<f64>,
    #[serde(rename = "distributions")]
    pub distributions: Vec<OracleDistribution>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct OracleDistribution {
    pub distribution_line_number: u32,
    pub distribution_line_type: String,
    pub amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distribution_combination: Option<String>,
}

/// Map a canonical invoice to the Oracle Fusion payload, dating GL entries
/// today when the invoice has no date.
pub fn to_oracle_fusion(invoice: &CanonicalInvoice, config: &OracleConfig) -> OracleFusionInvoice {
    transform(invoice, config, OffsetDateTime::now_utc().date())
}

fn transform(invoice: &CanonicalInvoice, config: &OracleConfig, today: Date) -> OracleFusionInvoice {
    let header = &invoice.invoice;
    let vendor_name = invoice.vendor.name.clone().unwrap_or_default();
    let supplier = config.supplier_mapping.get(&vendor_name).cloned().unwrap_or_default();
    let invoice_date = header.invoice_date.clone().unwrap_or_default();

    let gl_date = if invoice_date.is_empty() {
        today
            .format(format_description!("[year]-[month]-[day]"))
            .unwrap_or_default()
    } else {
        invoice_date.clone()
    };

    let received = invoice.meta.received_at.split('T').next().unwrap_or_default();

    OracleFusionInvoice {
        source: config.source.clone(),
        invoice_number: header.invoice_number.clone().unwrap_or_default(),
        invoice_amount: header.total_amount.unwrap_or(0.0),
        invoice_date,
        invoice_currency: header.currency.clone().unwrap_or_else(|| "USD".to_string()),
        invoice_type: header
            .invoice_type
            .clone()
            .unwrap_or_else(|| config.default_invoice_type.clone()),
        business_unit: config.business_unit.clone(),
        gl_date,
        invoice_received_date: (!received.is_empty()).then(|| received.to_string()),
        supplier: vendor_name,
        supplier_number: supplier.supplier_number,
        supplier_id: supplier.supplier_id,
        supplier_site: supplier.supplier_site,
        lines: invoice
            .line_items
            .iter()
            .enumerate()
            .map(|(index, item)| line(index, item, config))
            .collect(),
    }
}

fn line(index: usize, item: &LineItem, config: &OracleConfig) -> OracleLine {
    let amount = item.amount.unwrap_or(0.0);
    OracleLine {
        line_number: item.line_number.unwrap_or(index as u32 + 1),
        line_type: "Item".to_string(),
        line_amount: amount,
        description: item.description.clone(),
        quantity: item.quantity,
        unit_price: item.unit_price,
        distributions: vec![OracleDistribution {
            distribution_line_number: 1,
            distribution_line_type: "Item".to_string(),
            amount,
            distribution_combination: distribution_combination(config),
        }],
    }
}

/// `costCenter-account-department`, or `None` when no segment is configured.
fn distribution_combination(config: &OracleConfig) -> Option<String> {
    let d = config.default_distribution.as_ref()?;
    if d.account.is_none() && d.cost_center.is_none() && d.department.is_none() {
        return None;
    }
    Some(format!(
        "{}-{}-{}",
        d.cost_center.as_deref().unwrap_or("000"),
        d.account.as_deref().unwrap_or("0000"),
        d.department.as_deref().unwrap_or("000"),
    ))
}

/// Required-field check before submission. Empty means valid.
pub fn validate(invoice: &OracleFusionInvoice) -> Vec<String> {
    let mut errors = Vec::new();
    let required = [
        ("Source", &invoice.source),
        ("InvoiceNumber", &invoice.invoice_number),
        ("InvoiceDate", &invoice.invoice_date),
        ("InvoiceCurrency", &invoice.invoice_currency),
        ("BusinessUnit", &invoice.business_unit),
    ];
    for (name, value) in required {
        if value.trim().is_empty() {
            errors.push(format!("{name} is required"));
        }
    }
    if !invoice.invoice_amount.is_finite() {
        errors.push("InvoiceAmount is required".to_string());
    }
    if invoice.supplier.is_empty() && invoice.supplier_number.is_none() && invoice.supplier_id.is_none() {
        errors.push("Supplier identification required (Supplier, SupplierNumber, or SupplierId)".to_string());
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn config() -> OracleConfig {
        let mut config = OracleConfig::default();
        config.supplier_mapping.insert(
            "Acme Corporation".into(),
            SupplierRef {
                supplier_id: Some(12345),
                supplier_site: Some("MAIN".into()),
                ..Default::default()
            },
        );
        config.default_distribution = Some(DistributionDefaults {
            account: Some("5000".into()),
            cost_center: Some("100".into()),
            department: None,
        });
        config
    }

    fn acme() -> CanonicalInvoice {
        let mut inv = CanonicalInvoice::default();
        inv.vendor.name = Some("Acme Corporation".into());
        inv.invoice.invoice_number = Some("INV-7".into());
        inv.invoice.invoice_date = Some("2024-04-30".into());
        inv.invoice.currency = Some("EUR".into());
        inv.invoice.total_amount = Some(119.0);
        inv.line_items = vec![
            LineItem {
                description: Some("Widgets".into()),
                amount: Some(60.0),
                ..Default::default()
            },
            LineItem {
                line_number: Some(7),
                description: Some("Gadgets".into()),
                amount: Some(40.0),
                ..Default::default()
            },
        ];
        inv.meta.received_at = "2024-05-01T10:00:00Z".into();
        inv
    }

    #[test]
    fn test_header_and_supplier_mapping() {
        let out = transform(&acme(), &config(), date!(2024 - 06 - 01));
        assert_eq!(out.source, "INVOICE_EXTRACTOR");
        assert_eq!(out.invoice_amount, 119.0);
        assert_eq!(out.invoice_type, "Standard");
        assert_eq!(out.gl_date, "2024-04-30");
        assert_eq!(out.invoice_received_date.as_deref(), Some("2024-05-01"));
        assert_eq!(out.supplier_id, Some(12345));
        assert_eq!(out.supplier_site.as_deref(), Some("MAIN"));
        assert!(validate(&out).is_empty());
    }

    #[test]
    fn test_lines_and_distributions() {
        let out = transform(&acme(), &config(), date!(2024 - 06 - 01));
        assert_eq!(out.lines[0].line_number, 1);
        assert_eq!(out.lines[1].line_number, 7);
        let dist = &out.lines[0].distributions;
        assert_eq!(dist.len(), 1);
        assert_eq!(dist[0].amount, 60.0);
        assert_eq!(dist[0].distribution_combination.as_deref(), Some("100-5000-000"));
    }

    #[test]
    fn test_defaults_for_missing_fields() {
        let mut inv = CanonicalInvoice::default();
        inv.vendor.name = Some("Unknown GmbH".into());
        let out = transform(&inv, &OracleConfig::default(), date!(2024 - 06 - 01));
        assert_eq!(out.invoice_currency, "USD");
        assert_eq!(out.invoice_amount, 0.0);
        assert_eq!(out.gl_date, "2024-06-01");
        assert_eq!(out.supplier_id, None);
        assert!(out.lines.is_empty());

        let errors = validate(&out);
        assert_eq!(errors, vec!["InvoiceNumber is required", "InvoiceDate is required"]);
    }

    #[test]
    fn test_no_distribution_config() {
        let out = transform(&acme(), &OracleConfig::default(), date!(2024 - 06 - 01));
        assert_eq!(out.lines[0].distributions[0].distribution_combination, None);
    }

    #[test]
    fn test_missing_supplier_identification() {
        let out = transform(&CanonicalInvoice::default(), &OracleConfig::default(), date!(2024 - 06 - 01));
        assert!(validate(&out).iter().any(|e| e.starts_with("Supplier identification")));
    }

    #[test]
    fn test_pascal_case_payload() {
        let out = transform(&acme(), &config(), date!(2024 - 06 - 01));
        let v = serde_json::to_value(&out).unwrap();
        assert_eq!(v["InvoiceNumber"], "INV-7");
        assert_eq!(v["SupplierId"], 12345);
        assert_eq!(v["lines"][0]["LineType"], "Item");
        assert_eq!(v["lines"][0]["distributions"][0]["DistributionLineNumber"], 1);
        assert!(v.get("SupplierNumber").is_none());
    }
}
