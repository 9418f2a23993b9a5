//! Plain-text receipt for devices that cannot rasterize a PDF

use pos_printer::{pad_text, text_width};

use super::RECEIPT_COLUMNS;
use super::invoice::{FOOTER, Invoice, TITLE};

fn centered(s: &str, width: usize) -> String {
    let pad = width.saturating_sub(text_width(s)) / 2;
    format!("{}{}", " ".repeat(pad), s)
}

/// Render the receipt as CRLF-separated fixed-width text
///
/// The grand total is right-aligned to the receipt width.
pub fn render(invoice: &Invoice) -> String {
    let separator = "-".repeat(RECEIPT_COLUMNS);
    let mut lines: Vec<String> = Vec::with_capacity(12 + invoice.lines.len() * 2);

    lines.push(centered(TITLE, RECEIPT_COLUMNS));
    lines.extend(invoice.header().into_iter().map(str::to_string));
    if let Some(customer) = &invoice.customer_name {
        lines.push(centered(customer, RECEIPT_COLUMNS));
    }
    lines.push(separator.clone());

    for row in invoice.rows() {
        lines.push(row.name);
        lines.push(row.detail);
    }

    lines.push(separator);
    lines.extend(invoice.totals());
    lines.push(pad_text(&invoice.grand_total_row(), RECEIPT_COLUMNS, true));
    lines.push(String::new());
    lines.push(centered(FOOTER, RECEIPT_COLUMNS));

    lines.join("\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::invoice::InvoiceLine;

    fn tea() -> Invoice {
        Invoice {
            lines: vec![InvoiceLine {
                name: Some("Tea".into()),
                qty: Some(2.0),
                unit_price: 10.0,
                line_total: 20.0,
            }],
            subtotal: 20.0,
            grand_total: 20.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_tea_receipt() {
        let text = render(&tea());
        let lines: Vec<&str> = text.split("\r\n").collect();

        assert!(lines.contains(&"2 x 10.00 = 20.00"));
        let total = format!("{:>width$}", "TOTAL: 20.00", width = RECEIPT_COLUMNS);
        assert!(lines.contains(&total.as_str()));
        assert!(lines.contains(&"Tax: 0.00"));
        assert!(!text.contains("Discount"));
        assert_eq!(lines[0].trim(), "INVOICE");
        assert_eq!(lines.last().map(|l| l.trim()), Some("Thank you!"));
        assert!(!text.replace("\r\n", "").contains('\n'));
    }

    #[test]
    fn test_header_block() {
        let mut invoice = tea();
        invoice.invoice_number = Some("INV-7".into());
        invoice.customer_name = Some("Ana".into());
        invoice.discount_total = 1.0;

        let text = render(&invoice);
        let lines: Vec<&str> = text.split("\r\n").collect();
        assert_eq!(lines[1], "INV-7");
        assert_eq!(lines[2].trim(), "Ana");
        assert_eq!(lines[3], "-".repeat(RECEIPT_COLUMNS));
        assert!(lines.contains(&"Discount: -1.00"));
    }
}
