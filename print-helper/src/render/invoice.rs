//! Invoice model and the receipt content shared by every render form
//!
//! Upstream producers (manual entry, OCR extraction) are loose about types:
//! text fields may arrive as numbers, money as numeric strings. Deserialization
//! accepts both and falls back to empty/zero rather than rejecting the payload.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

pub const TITLE: &str = "INVOICE";
pub const FOOTER: &str = "Thank you!";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    #[serde(default, deserialize_with = "lenient_text")]
    pub invoice_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub timestamp: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub lines: Vec<InvoiceLine>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub subtotal: f64,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub discount_total: f64,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub tax_total: f64,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub grand_total: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceLine {
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: Option<String>,
    /// Absent means one unit
    #[serde(default, deserialize_with = "lenient_quantity")]
    pub qty: Option<f64>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub unit_price: f64,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub line_total: f64,
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

fn number_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

fn lenient_amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(number_of(&value).unwrap_or(0.0))
}

fn lenient_quantity<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(number_of(&value))
}

/// Two decimals, as printed on every receipt form
pub fn money(amount: f64) -> String {
    format!("{:.2}", amount)
}

/// Whole quantities print without decimals
pub fn quantity(qty: f64) -> String {
    if qty.fract() == 0.0 && qty.abs() < 1e15 {
        format!("{}", qty as i64)
    } else {
        format!("{}", qty)
    }
}

/// One item block: name row and `qty x price = total` row
#[derive(Debug, Clone, PartialEq)]
pub struct ItemRow {
    pub name: String,
    pub detail: String,
}

impl InvoiceLine {
    pub fn qty_or_default(&self) -> f64 {
        self.qty.unwrap_or(1.0)
    }

    pub fn row(&self) -> ItemRow {
        ItemRow {
            name: self.name.clone().unwrap_or_default(),
            detail: format!(
                "{} x {} = {}",
                quantity(self.qty_or_default()),
                money(self.unit_price),
                money(self.line_total)
            ),
        }
    }
}

impl Invoice {
    pub fn has_discount(&self) -> bool {
        self.discount_total != 0.0
    }

    /// Number and timestamp, each only when present
    pub fn header(&self) -> Vec<&str> {
        [self.invoice_number.as_deref(), self.timestamp.as_deref()]
            .into_iter()
            .flatten()
            .collect()
    }

    pub fn rows(&self) -> Vec<ItemRow> {
        self.lines.iter().map(InvoiceLine::row).collect()
    }

    /// Subtotal, discount (only when non-zero) and tax rows
    pub fn totals(&self) -> Vec<String> {
        let mut rows = vec![format!("Subtotal: {}", money(self.subtotal))];
        if self.has_discount() {
            rows.push(format!("Discount: -{}", money(self.discount_total)));
        }
        rows.push(format!("Tax: {}", money(self.tax_total)));
        rows
    }

    pub fn grand_total_row(&self) -> String {
        format!("TOTAL: {}", money(self.grand_total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lenient_fields() {
        let invoice: Invoice = serde_json::from_value(json!({
            "invoiceNumber": 1042,
            "customerName": "",
            "lines": [
                { "name": "Tea", "qty": "2", "unitPrice": "10", "lineTotal": 20 },
                { "name": "Cake", "unitPrice": null, "lineTotal": "oops" }
            ],
            "subtotal": "20.5",
            "grandTotal": 20.5
        }))
        .unwrap();

        assert_eq!(invoice.invoice_number.as_deref(), Some("1042"));
        assert_eq!(invoice.customer_name, None);
        assert_eq!(invoice.lines[0].qty, Some(2.0));
        assert_eq!(invoice.lines[0].unit_price, 10.0);
        assert_eq!(invoice.lines[1].qty_or_default(), 1.0);
        assert_eq!(invoice.lines[1].unit_price, 0.0);
        assert_eq!(invoice.lines[1].line_total, 0.0);
        assert_eq!(invoice.subtotal, 20.5);
        assert_eq!(invoice.tax_total, 0.0);
    }

    #[test]
    fn test_row_formatting() {
        let line = InvoiceLine {
            name: Some("Tea".into()),
            qty: Some(2.0),
            unit_price: 10.0,
            line_total: 20.0,
        };
        assert_eq!(line.row().detail, "2 x 10.00 = 20.00");

        let half = InvoiceLine {
            qty: Some(1.5),
            unit_price: 3.0,
            line_total: 4.5,
            ..Default::default()
        };
        assert_eq!(half.row().detail, "1.5 x 3.00 = 4.50");
        assert_eq!(half.row().name, "");

        let zero = InvoiceLine {
            qty: Some(0.0),
            ..Default::default()
        };
        assert_eq!(zero.row().detail, "0 x 0.00 = 0.00");
    }

    #[test]
    fn test_discount_row_only_when_nonzero() {
        let mut invoice = Invoice {
            subtotal: 20.0,
            tax_total: 1.5,
            ..Default::default()
        };
        assert_eq!(invoice.totals(), vec!["Subtotal: 20.00", "Tax: 1.50"]);

        invoice.discount_total = 2.0;
        assert_eq!(
            invoice.totals(),
            vec!["Subtotal: 20.00", "Discount: -2.00", "Tax: 1.50"]
        );
    }
}
