// src/normalize.rs

use crate::invoice::{CanonicalInvoice, InvoiceHeader, LineItem, Vendor};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

type Object = Map<String, Value>;

/// Shape of the model's JSON, decided once.
#[derive(Debug, Clone, PartialEq)]
pub enum RawExtraction {
    /// `vendor` and `invoice` are both objects.
    Structured {
        vendor: Object,
        invoice: Object,
        root: Object,
    },
    /// Anything else: fields are looked up by synonym on the top-level object.
    Flat(Object),
}

impl RawExtraction {
    pub fn classify(raw: Value) -> Self {
        let Value::Object(mut root) = raw else {
            return RawExtraction::Flat(Object::new());
        };
        let both_objects = root.get("vendor").is_some_and(Value::is_object)
            && root.get("invoice").is_some_and(Value::is_object);
        if !both_objects {
            return RawExtraction::Flat(root);
        }
        let vendor = take_object(&mut root, "vendor");
        let invoice = take_object(&mut root, "invoice");
        RawExtraction::Structured {
            vendor,
            invoice,
            root,
        }
    }
}

fn take_object(obj: &mut Object, key: &str) -> Object {
    match obj.remove(key) {
        Some(Value::Object(inner)) => inner,
        _ => Object::new(),
    }
}

// ---------------------------------------------------------------------------
// Synonym tables
// ---------------------------------------------------------------------------

/// Synonyms per canonical field on the structured path. Only these two fields
/// tolerate alternative names there.
mod structured {
    pub const PURCHASE_ORDER_NUMBER: &[&str] = &["purchaseOrderNumber", "poNumber", "po", "purchaseOrder"];
    pub const INVOICE_TYPE: &[&str] = &["invoiceType", "type"];
}

/// Synonyms per canonical field on the flat path, in priority order.
mod flat {
    pub const VENDOR_NAME: &[&str] = &["vendorName", "vendor_name", "supplierName", "name"];
    pub const TAX_ID: &[&str] = &["taxId", "vatNumber", "vat"];
    pub const ADDRESS: &[&str] = &["vendorAddress", "address"];
    pub const INVOICE_NUMBER: &[&str] = &["invoiceNumber", "invoice_number", "number"];
    pub const PURCHASE_ORDER_NUMBER: &[&str] = &[
        "purchaseOrderNumber",
        "poNumber",
        "po_number",
        "po",
        "purchaseOrder",
        "purchase_order",
    ];
    pub const INVOICE_TYPE: &[&str] = &["invoiceType", "invoice_type", "type"];
    pub const INVOICE_DATE: &[&str] = &["invoiceDate", "invoice_date", "date"];
    pub const DUE_DATE: &[&str] = &["dueDate", "due_date"];
    pub const CURRENCY: &[&str] = &["currency"];
    pub const TOTAL_AMOUNT: &[&str] = &["totalAmount", "total", "amount"];
    pub const TAX_AMOUNT: &[&str] = &["taxAmount", "tax", "vat"];
    pub const LINE_ITEMS: &[&str] = &["lineItems", "items", "lines"];
}

mod line {
    pub const LINE_NUMBER: &[&str] = &["lineNumber", "line_number"];
    pub const DESCRIPTION: &[&str] = &["description"];
    pub const QUANTITY: &[&str] = &["quantity", "qty"];
    pub const UNIT_PRICE: &[&str] = &["unitPrice", "unit_price"];
    pub const AMOUNT: &[&str] = &["amount"];
}

/// First non-null value among `keys`.
fn lookup<'a>(obj: &'a Object, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
}

fn text(obj: &Object, keys: &[&str]) -> Option<String> {
    lookup(obj, keys).and_then(value_to_text)
}

fn number(obj: &Object, keys: &[&str]) -> Option<f64> {
    lookup(obj, keys).and_then(parse_number)
}

/// Render a JSON scalar (or a small address-like object) as text.
fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => join_parts(items.iter()),
        Value::Object(obj) => {
            let known = ADDRESS_PARTS.iter().filter_map(|k| obj.get(*k));
            let rest = obj
                .iter()
                .filter(|(k, _)| !ADDRESS_PARTS.contains(&k.as_str()))
                .map(|(_, v)| v);
            join_parts(known.chain(rest))
        }
    }
}

/// Reading order for address objects.
const ADDRESS_PARTS: &[&str] = &["line1", "line2", "city", "state", "postalCode", "country"];

fn join_parts<'a>(values: impl Iterator<Item = &'a Value>) -> Option<String> {
    let parts: Vec<String> = values
        .filter_map(value_to_text)
        .filter(|s| !s.trim().is_empty())
        .collect();
    (!parts.is_empty()).then(|| parts.join(", "))
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Map any extraction shape onto the canonical invoice. `meta` is left at its
/// default for the caller to fill in.
pub fn normalize(raw: RawExtraction) -> CanonicalInvoice {
    match raw {
        RawExtraction::Structured {
            vendor,
            invoice,
            root,
        } => CanonicalInvoice {
            vendor: Vendor {
                name: text(&vendor, &["name"]),
                tax_id: text(&vendor, &["taxId"]),
                address: text(&vendor, &["address"]),
            },
            invoice: InvoiceHeader {
                invoice_number: text(&invoice, &["invoiceNumber"]),
                purchase_order_number: text(&invoice, structured::PURCHASE_ORDER_NUMBER),
                invoice_type: text(&invoice, structured::INVOICE_TYPE),
                invoice_date: text(&invoice, &["invoiceDate"]),
                due_date: text(&invoice, &["dueDate"]),
                currency: text(&invoice, &["currency"]),
                total_amount: number(&invoice, &["totalAmount"]),
                tax_amount: number(&invoice, &["taxAmount"]),
            },
            line_items: line_items(root.get("lineItems")),
            meta: Default::default(),
        },
        RawExtraction::Flat(obj) => CanonicalInvoice {
            vendor: Vendor {
                name: text(&obj, flat::VENDOR_NAME),
                tax_id: text(&obj, flat::TAX_ID),
                address: text(&obj, flat::ADDRESS),
            },
            invoice: InvoiceHeader {
                invoice_number: text(&obj, flat::INVOICE_NUMBER),
                purchase_order_number: text(&obj, flat::PURCHASE_ORDER_NUMBER),
                invoice_type: text(&obj, flat::INVOICE_TYPE),
                invoice_date: text(&obj, flat::INVOICE_DATE),
                due_date: text(&obj, flat::DUE_DATE),
                currency: text(&obj, flat::CURRENCY),
                total_amount: number(&obj, flat::TOTAL_AMOUNT),
                tax_amount: number(&obj, flat::TAX_AMOUNT),
            },
            line_items: line_items(lookup(&obj, flat::LINE_ITEMS)),
            meta: Default::default(),
        },
    }
}

/// Line items in their original order; anything that is not a list yields none.
fn line_items(value: Option<&Value>) -> Vec<LineItem> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(Value::as_object)
        .map(|item| LineItem {
            line_number: lookup(item, line::LINE_NUMBER)
                .and_then(Value::as_u64)
                .and_then(|n| u32::try_from(n).ok()),
            description: text(item, line::DESCRIPTION),
            quantity: number(item, line::QUANTITY),
            unit_price: number(item, line::UNIT_PRICE),
            amount: number(item, line::AMOUNT),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Money parsing
// ---------------------------------------------------------------------------

static FLOAT_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?(?:\d+(?:\.\d*)?|\.\d+)").unwrap());

/// Numbers pass through; strings go through [`parse_money`]; anything else is `None`.
pub fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_money(s),
        _ => None,
    }
}

/// Parse a money string such as `"€ 1.234,56"`, `"$1,234.56"` or `"100,00"`.
///
/// Everything but digits, `.`, `,` and `-` is dropped. With both separators
/// present, the one that appears last is the decimal point. A single `,` on
/// its own is a decimal comma; a separator repeated with no other kind present
/// is a thousands separator.
pub fn parse_money(input: &str) -> Option<f64> {
    let s: String = input
        .trim()
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-'))
        .collect();
    if s.is_empty() {
        return None;
    }

    let commas = s.matches(',').count();
    let dots = s.matches('.').count();
    let normalized = match (commas, dots) {
        (0, 0) => s,
        (0, 1) => s,
        (1, 0) => s.replacen(',', ".", 1),
        (_, 0) => s.replace(',', ""),
        (0, _) => s.replace('.', ""),
        _ => {
            let last_comma = s.rfind(',').unwrap_or(0);
            let last_dot = s.rfind('.').unwrap_or(0);
            if last_comma > last_dot {
                // 1.234,56
                s.replace('.', "").replacen(',', ".", 1)
            } else {
                // 1,234.56
                s.replace(',', "")
            }
        }
    };

    let prefix = FLOAT_PREFIX.find(&normalized)?;
    prefix.as_str().parse::<f64>().ok().filter(|n| n.is_finite())
}
