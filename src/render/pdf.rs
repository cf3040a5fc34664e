//! Fixed-layout PDF rendering with lopdf
//!
//! A4 portrait, base-14 Helvetica, absolute coordinates in points from the
//! bottom-left corner. Item rows flow onto extra pages when the body fills.
//! Text is encoded as Latin-1; characters outside it print as `?`.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};

use crate::render::{DocumentRenderer, InvoiceDocument, RenderError};

const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;
const MARGIN: f32 = 50.0;
const ROW_HEIGHT: f32 = 18.0;
const BODY_FLOOR: f32 = 110.0;

const QTY_COLUMN: f32 = 380.0;
const AMOUNT_RIGHT: f32 = PAGE_WIDTH - MARGIN;
const DESCRIPTION_MAX_CHARS: usize = 55;

const DETAILS_LEFT: f32 = 340.0;
const TOTALS_LEFT: f32 = 340.0;
const TOTALS_BLOCK_HEIGHT: f32 = 110.0;

const HEADER_SHADE: f32 = 0.85;
const ROW_SHADE: f32 = 0.95;
const TOTALS_SHADE: f32 = 0.92;

const PAYMENT_TERMS: &str = "Due on Receipt";

const REGULAR: &str = "F1";
const BOLD: &str = "F2";

/// Renders invoices as single- or multi-page PDFs
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfRenderer;

impl PdfRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentRenderer for PdfRenderer {
    fn content_type(&self) -> &'static str {
        "application/pdf"
    }

    fn render(&self, document: &InvoiceDocument) -> Result<Vec<u8>, RenderError> {
        let pages = layout(document);
        assemble(pages)
    }
}

/// Operations for one page, with a cursor moving down the body
struct PageCanvas {
    ops: Vec<Operation>,
    y: f32,
}

impl PageCanvas {
    fn new() -> Self {
        Self {
            ops: Vec::new(),
            y: PAGE_HEIGHT - MARGIN,
        }
    }

    fn text(&mut self, font: &str, size: f32, x: f32, y: f32, text: &str) {
        self.ops.extend([
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![Object::Name(font.as_bytes().to_vec()), size.into()]),
            Operation::new("Td", vec![x.into(), y.into()]),
            Operation::new(
                "Tj",
                vec![Object::String(latin1(text), StringFormat::Literal)],
            ),
            Operation::new("ET", vec![]),
        ]);
    }

    fn text_right(&mut self, font: &str, size: f32, right: f32, y: f32, text: &str) {
        let x = right - approx_width(text, size, font == BOLD);
        self.text(font, size, x, y, text);
    }

    fn rule(&mut self, y: f32) {
        self.ops.extend([
            Operation::new("w", vec![0.5f32.into()]),
            Operation::new("m", vec![MARGIN.into(), y.into()]),
            Operation::new("l", vec![(PAGE_WIDTH - MARGIN).into(), y.into()]),
            Operation::new("S", vec![]),
        ]);
    }

    /// Filled rectangle in `gray` (0 black, 1 white); graphics state is restored
    fn shade(&mut self, x: f32, y: f32, width: f32, height: f32, gray: f32) {
        self.ops.extend([
            Operation::new("q", vec![]),
            Operation::new("g", vec![gray.into()]),
            Operation::new("re", vec![x.into(), y.into(), width.into(), height.into()]),
            Operation::new("f", vec![]),
            Operation::new("Q", vec![]),
        ]);
    }

    fn frame(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.ops.extend([
            Operation::new("w", vec![0.75f32.into()]),
            Operation::new("re", vec![x.into(), y.into(), width.into(), height.into()]),
            Operation::new("S", vec![]),
        ]);
    }

    fn needs_break(&self, height: f32) -> bool {
        self.y - height < BODY_FLOOR
    }
}

fn layout(document: &InvoiceDocument) -> Vec<Vec<Operation>> {
    let mut pages = Vec::new();
    let mut page = PageCanvas::new();

    // Sender block on the left
    let top = page.y;
    page.text(BOLD, 18.0, MARGIN, top - 18.0, &document.sender.name);
    let mut sender_y = top - 36.0;
    for line in document
        .sender
        .address_lines
        .iter()
        .chain(std::iter::once(&document.sender.email))
        .chain(document.sender.phone.iter())
    {
        page.text(REGULAR, 10.0, MARGIN, sender_y, line);
        sender_y -= 14.0;
    }
    if let Some(tax_id) = &document.sender.tax_id {
        page.text(REGULAR, 10.0, MARGIN, sender_y, &format!("Tax ID: {tax_id}"));
        sender_y -= 14.0;
    }

    // Title and details box on the right
    page.text_right(BOLD, 24.0, AMOUNT_RIGHT, top - 20.0, "INVOICE");
    page.text_right(REGULAR, 9.0, AMOUNT_RIGHT, top - 34.0, &document.brand_name);

    let details = [
        ("Invoice #", document.invoice_number.clone()),
        ("Issue Date", document.display_date(document.issued_at)),
        ("Terms", PAYMENT_TERMS.to_string()),
        ("Due Date", document.display_date(document.due_date)),
        ("Status", document.status.to_string()),
    ];
    let box_height = details.len() as f32 * 14.0 + 12.0;
    let box_top = top - 48.0;
    let box_bottom = box_top - box_height;
    page.frame(DETAILS_LEFT, box_bottom, AMOUNT_RIGHT - DETAILS_LEFT, box_height);
    let mut detail_y = box_top - 16.0;
    for (label, value) in &details {
        page.text(BOLD, 9.0, DETAILS_LEFT + 8.0, detail_y, label);
        page.text_right(REGULAR, 9.0, AMOUNT_RIGHT - 8.0, detail_y, value);
        detail_y -= 14.0;
    }

    // Bill-to block
    page.y = sender_y.min(box_bottom) - 24.0;
    page.text(BOLD, 11.0, MARGIN, page.y, "Bill To");
    page.y -= 16.0;
    page.text(REGULAR, 10.0, MARGIN, page.y, &document.client_name);
    page.y -= 14.0;
    page.text(REGULAR, 10.0, MARGIN, page.y, &document.client_email);
    page.y -= 30.0;

    table_header(&mut page);

    for (index, line) in document.lines.iter().enumerate() {
        if page.needs_break(ROW_HEIGHT) {
            pages.push(std::mem::take(&mut page.ops));
            page = PageCanvas::new();
            table_header(&mut page);
        }
        if index % 2 == 1 {
            page.shade(
                MARGIN,
                page.y - 5.0,
                PAGE_WIDTH - 2.0 * MARGIN,
                ROW_HEIGHT,
                ROW_SHADE,
            );
        }
        page.text(
            REGULAR,
            10.0,
            MARGIN + 4.0,
            page.y,
            &truncate(&line.description, DESCRIPTION_MAX_CHARS),
        );
        page.text(REGULAR, 10.0, QTY_COLUMN, page.y, &line.quantity.to_string());
        page.text_right(
            REGULAR,
            10.0,
            AMOUNT_RIGHT - 4.0,
            page.y,
            &document.display_amount(line.amount),
        );
        page.y -= ROW_HEIGHT;
    }

    // Totals box and terms stay together
    if page.needs_break(TOTALS_BLOCK_HEIGHT) {
        pages.push(std::mem::take(&mut page.ops));
        page = PageCanvas::new();
    }
    page.rule(page.y + ROW_HEIGHT - 6.0);

    let totals_top = page.y - 4.0;
    let totals_height = 44.0;
    page.shade(
        TOTALS_LEFT,
        totals_top - totals_height,
        AMOUNT_RIGHT - TOTALS_LEFT,
        totals_height,
        TOTALS_SHADE,
    );
    page.frame(
        TOTALS_LEFT,
        totals_top - totals_height,
        AMOUNT_RIGHT - TOTALS_LEFT,
        totals_height,
    );
    let amount = document.display_amount(document.total);
    page.text(REGULAR, 10.0, TOTALS_LEFT + 8.0, totals_top - 16.0, "Subtotal");
    page.text_right(REGULAR, 10.0, AMOUNT_RIGHT - 8.0, totals_top - 16.0, &amount);
    page.text(BOLD, 12.0, TOTALS_LEFT + 8.0, totals_top - 34.0, "Total");
    page.text_right(BOLD, 12.0, AMOUNT_RIGHT - 8.0, totals_top - 34.0, &amount);

    let terms_y = totals_top - totals_height - 24.0;
    page.text(BOLD, 10.0, MARGIN, terms_y, "Terms & Conditions");
    page.text(
        REGULAR,
        9.0,
        MARGIN,
        terms_y - 14.0,
        &format!(
            "Payment is due on receipt. Please pay {} by {}.",
            amount,
            document.display_date(document.due_date)
        ),
    );
    page.text(
        REGULAR,
        9.0,
        MARGIN,
        terms_y - 26.0,
        &format!("Questions about this invoice? Contact {}.", document.sender.email),
    );

    // Footer on the last page
    if let Some(link) = &document.payment_link {
        page.text(BOLD, 10.0, MARGIN, 80.0, "Pay online:");
        page.text(REGULAR, 8.0, MARGIN, 66.0, link);
    }
    page.text(
        REGULAR,
        8.0,
        MARGIN,
        40.0,
        &format!("Generated by {}", document.brand_name),
    );

    pages.push(page.ops);
    pages
}

fn table_header(page: &mut PageCanvas) {
    page.shade(
        MARGIN,
        page.y - 6.0,
        PAGE_WIDTH - 2.0 * MARGIN,
        ROW_HEIGHT,
        HEADER_SHADE,
    );
    page.text(BOLD, 10.0, MARGIN + 4.0, page.y, "Description");
    page.text(BOLD, 10.0, QTY_COLUMN, page.y, "Qty");
    page.text_right(BOLD, 10.0, AMOUNT_RIGHT - 4.0, page.y, "Amount");
    page.y -= ROW_HEIGHT + 4.0;
}

fn assemble(pages: Vec<Vec<Operation>>) -> Result<Vec<u8>, RenderError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            REGULAR => regular_id,
            BOLD => bold_id,
        },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for operations in pages {
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id: ObjectId = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let page_count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => Object::Integer(page_count),
            "Resources" => resources_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(PAGE_WIDTH),
                Object::Real(PAGE_HEIGHT),
            ],
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    Ok(bytes)
}

fn latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let head: String = text.chars().take(max_chars - 3).collect();
        format!("{head}...")
    }
}

// Helvetica averages ~0.5em per glyph; bold runs wider
fn approx_width(text: &str, size: f32, bold: bool) -> f32 {
    let em = if bold { 0.58 } else { 0.52 };
    text.chars().count() as f32 * size * em
}
