//! Single-page 48 mm thermal PDF
//!
//! Built directly with `lopdf` using the standard Courier faces, so no font
//! embedding is needed and glyph widths are fixed (0.6 em).

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use pos_printer::encode_text;

use super::RenderError;
use super::invoice::{FOOTER, Invoice, TITLE};

/// 48 mm in points
pub const PAGE_WIDTH: f32 = 48.0 / 25.4 * 72.0;
pub const MARGIN: f32 = 6.0;
pub const MIN_HEIGHT: f32 = 300.0;
/// Height budget per layout unit
pub const UNIT_HEIGHT: f32 = 12.0;

const SIZE_TITLE: f32 = 12.0;
const SIZE_SMALL: f32 = 8.0;
const SIZE_NORMAL: f32 = 9.0;
const GLYPH_EM: f32 = 0.6;
const LEADING: f32 = 1.2;

/// Page height for an invoice
///
/// Units: 5 header, 2 per line item, 6 totals (5 without discount), 4 spacing.
pub fn page_height(invoice: &Invoice) -> f32 {
    let totals = if invoice.has_discount() { 6 } else { 5 };
    let units = 5 + 2 * invoice.lines.len() + totals + 4;
    (units as f32 * UNIT_HEIGHT).max(MIN_HEIGHT)
}

#[derive(Clone, Copy)]
enum Align {
    Left,
    Center,
    Right,
}

#[derive(Clone, Copy)]
enum Face {
    Regular,
    Bold,
}

impl Face {
    fn resource(self) -> &'static str {
        match self {
            Face::Regular => "F1",
            Face::Bold => "F2",
        }
    }
}

/// Top-down text cursor emitting content stream operations
struct Layout {
    ops: Vec<Operation>,
    y: f32,
}

impl Layout {
    fn new(height: f32) -> Self {
        Self {
            ops: Vec::new(),
            y: height - MARGIN,
        }
    }

    fn usable_width() -> f32 {
        PAGE_WIDTH - MARGIN * 2.0
    }

    fn text(&mut self, s: &str, size: f32, face: Face, align: Align) {
        for chunk in wrap(s, max_chars(size)) {
            self.y -= size * LEADING;
            let width = chunk.chars().count() as f32 * size * GLYPH_EM;
            let x = match align {
                Align::Left => MARGIN,
                Align::Center => MARGIN + ((Self::usable_width() - width) / 2.0).max(0.0),
                Align::Right => (PAGE_WIDTH - MARGIN - width).max(MARGIN),
            };
            self.ops.push(Operation::new("BT", vec![]));
            self.ops.push(Operation::new(
                "Tf",
                vec![face.resource().into(), Object::Real(size)],
            ));
            self.ops.push(Operation::new(
                "Td",
                vec![Object::Real(x), Object::Real(self.y)],
            ));
            self.ops.push(Operation::new(
                "Tj",
                vec![Object::string_literal(encode_text(&chunk))],
            ));
            self.ops.push(Operation::new("ET", vec![]));
        }
    }

    /// Vertical gap in multiples of the current small line
    fn gap(&mut self, lines: f32) {
        self.y -= lines * SIZE_SMALL * LEADING;
    }

    fn rule(&mut self) {
        self.y -= 2.0;
        self.ops.push(Operation::new("w", vec![Object::Real(0.5)]));
        self.ops.push(Operation::new(
            "m",
            vec![Object::Real(MARGIN), Object::Real(self.y)],
        ));
        self.ops.push(Operation::new(
            "l",
            vec![Object::Real(PAGE_WIDTH - MARGIN), Object::Real(self.y)],
        ));
        self.ops.push(Operation::new("S", vec![]));
        self.y -= 2.0;
    }
}

fn max_chars(size: f32) -> usize {
    ((Layout::usable_width() / (size * GLYPH_EM)).floor() as usize).max(1)
}

/// Greedy word wrap; words longer than a line are split
fn wrap(s: &str, max: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in s.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > max {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            lines.push(word.drain(..max).collect());
        }
        let word: String = word.into_iter().collect();
        if word.is_empty() {
            continue;
        }
        let used = current.chars().count();
        if used > 0 && used + 1 + word.chars().count() > max {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

fn font(base: &str) -> lopdf::Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => base,
        "Encoding" => "WinAnsiEncoding",
    }
}

/// Lay the receipt out top-down on a page of the given height
fn compose(invoice: &Invoice, height: f32) -> Layout {
    let mut layout = Layout::new(height);

    layout.text(TITLE, SIZE_TITLE, Face::Bold, Align::Center);
    for field in invoice.header() {
        layout.text(field, SIZE_SMALL, Face::Regular, Align::Center);
    }
    layout.gap(0.3);
    if let Some(customer) = &invoice.customer_name {
        layout.text(customer, SIZE_NORMAL, Face::Regular, Align::Center);
    }
    layout.gap(0.4);
    layout.rule();

    for row in invoice.rows() {
        layout.text(&row.name, SIZE_SMALL, Face::Regular, Align::Left);
        layout.text(&row.detail, SIZE_SMALL, Face::Regular, Align::Left);
    }
    layout.gap(0.2);
    layout.rule();

    for total in invoice.totals() {
        layout.text(&total, SIZE_SMALL, Face::Regular, Align::Left);
    }
    layout.text(
        &invoice.grand_total_row(),
        SIZE_NORMAL,
        Face::Bold,
        Align::Right,
    );
    layout.gap(0.4);
    layout.text(FOOTER, SIZE_SMALL, Face::Regular, Align::Center);
    layout
}

/// Final page height: the unit formula, grown when wrapped rows need more
pub fn render_height(invoice: &Invoice) -> f32 {
    // Layout is translation invariant, so a zero-height pass measures extent
    let measured = -compose(invoice, 0.0).y + MARGIN;
    page_height(invoice).max(measured)
}

/// Render the invoice as PDF bytes
pub fn render(invoice: &Invoice) -> Result<Vec<u8>, RenderError> {
    let height = render_height(invoice);
    let layout = compose(invoice, height);

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let regular_id = doc.add_object(font("Courier"));
    let bold_id = doc.add_object(font("Courier-Bold"));
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular_id,
            "F2" => bold_id,
        },
    });

    let content = Content {
        operations: layout.ops,
    };
    let encoded = content.encode().map_err(|e| RenderError::Pdf(e.to_string()))?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => vec![page_id.into()],
        "Count" => Object::Integer(1),
        "Resources" => resources_id,
        "MediaBox" => vec![
            Object::Real(0.0),
            Object::Real(0.0),
            Object::Real(PAGE_WIDTH),
            Object::Real(height),
        ],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).map_err(|e| RenderError::Pdf(e.to_string()))?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::invoice::InvoiceLine;

    fn with_lines(n: usize) -> Invoice {
        Invoice {
            lines: (0..n)
                .map(|i| InvoiceLine {
                    name: Some(format!("Item {}", i)),
                    qty: Some(1.0),
                    unit_price: 2.5,
                    line_total: 2.5,
                })
                .collect(),
            subtotal: 2.5 * n as f64,
            grand_total: 2.5 * n as f64,
            ..Default::default()
        }
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn test_height_monotonic_with_floor() {
        let mut previous = 0.0;
        for n in 1..60 {
            let h = page_height(&with_lines(n));
            assert!(h >= MIN_HEIGHT);
            assert!(h >= previous, "height shrank at {} lines", n);
            previous = h;
        }
        // 5 + 2*1 + 5 + 4 = 16 units, under the floor
        assert_eq!(page_height(&with_lines(1)), MIN_HEIGHT);
        // 5 + 2*20 + 5 + 4 = 54 units
        assert_eq!(page_height(&with_lines(20)), 54.0 * UNIT_HEIGHT);
    }

    #[test]
    fn test_discount_adds_a_unit() {
        let mut invoice = with_lines(20);
        let without = page_height(&invoice);
        invoice.discount_total = 1.0;
        assert_eq!(page_height(&invoice), without + UNIT_HEIGHT);
    }

    #[test]
    fn test_pdf_document() {
        let mut invoice = with_lines(1);
        invoice.lines[0] = InvoiceLine {
            name: Some("Tea".into()),
            qty: Some(2.0),
            unit_price: 10.0,
            line_total: 20.0,
        };
        invoice.grand_total = 20.0;

        let bytes = render(&invoice).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));
        assert!(contains(&bytes, b"(2 x 10.00 = 20.00)"));
        assert!(contains(&bytes, b"(TOTAL: 20.00)"));
        assert!(contains(&bytes, b"/Courier-Bold"));

        let parsed = Document::load_mem(&bytes).unwrap();
        assert_eq!(parsed.get_pages().len(), 1);
    }

    fn baselines(bytes: &[u8]) -> Vec<f32> {
        let doc = Document::load_mem(bytes).unwrap();
        let page_id = *doc.get_pages().values().next().unwrap();
        let content = Content::decode(&doc.get_page_content(page_id).unwrap()).unwrap();
        content
            .operations
            .iter()
            .filter(|op| op.operator == "Td")
            .map(|op| op.operands[1].as_float().unwrap())
            .collect()
    }

    #[test]
    fn test_long_names_grow_page() {
        let mut invoice = with_lines(20);
        for (i, line) in invoice.lines.iter_mut().enumerate() {
            line.name = Some(format!("Organic Whole Milk 1 Gallon {}", i));
        }
        invoice.discount_total = 1.0;

        let height = render_height(&invoice);
        assert!(height > page_height(&invoice));

        let bytes = render(&invoice).unwrap();
        let ys = baselines(&bytes);
        let lowest = ys.iter().copied().fold(f32::MAX, f32::min);
        assert!(lowest >= MARGIN - 0.01, "content below page bottom: {}", lowest);
        assert!(ys.iter().all(|y| *y <= height));
        assert!(contains(&bytes, b"(TOTAL: 50.00)"));
        assert!(contains(&bytes, b"(Thank you!)"));
    }

    #[test]
    fn test_short_names_keep_formula_height() {
        let invoice = with_lines(20);
        assert_eq!(render_height(&invoice), page_height(&invoice));
        let ys = baselines(&render(&invoice).unwrap());
        assert!(ys.iter().all(|y| *y >= MARGIN - 0.01));
    }

    #[test]
    fn test_wrap() {
        assert_eq!(wrap("Green Tea", 25), vec!["Green Tea"]);
        assert_eq!(
            wrap("Extra large oat milk latte with syrup", 12),
            vec!["Extra large", "oat milk", "latte with", "syrup"]
        );
        assert_eq!(wrap("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
        assert_eq!(wrap("", 4), vec![""]);
    }
}
