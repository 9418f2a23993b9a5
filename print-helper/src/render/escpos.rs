//! ESC/POS byte stream for the raw share fallback

use pos_printer::EscPosBuilder;

use super::RECEIPT_COLUMNS;
use super::invoice::{FOOTER, Invoice, TITLE};

/// GS V 66 n: feed n dots then partial cut
const CUT_FEED_DOTS: u8 = 0x10;

pub fn render(invoice: &Invoice) -> Vec<u8> {
    let mut b = EscPosBuilder::new(RECEIPT_COLUMNS);

    b.center();
    b.line(TITLE);
    for field in invoice.header() {
        b.line(field);
    }
    if let Some(customer) = &invoice.customer_name {
        b.line(customer);
    }

    b.left();
    b.sep_single();
    for row in invoice.rows() {
        b.line(&row.name);
        b.line(&row.detail);
    }
    b.sep_single();
    for total in invoice.totals() {
        b.line(&total);
    }
    b.right().bold();
    b.line(&invoice.grand_total_row());
    b.bold_off();

    b.center();
    b.line(FOOTER);
    b.left();
    b.blank_lines(3);
    b.cut_feed(CUT_FEED_DOTS);

    b.build()
}
