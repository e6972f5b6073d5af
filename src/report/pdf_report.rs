use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfLayerReference};

use crate::{
    Error,
    expense::{Expense, date_format::DATE_FORMAT},
};

const TITLE: &str = "Expense Report";
const PAGE_WIDTH: Mm = Mm(210.0);
const PAGE_HEIGHT: Mm = Mm(297.0);
const LAYER_NAME: &str = "Layer 1";

const TITLE_FONT_SIZE: f32 = 16.0;
const TITLE_Y: f32 = 277.0;
const LINE_FONT_SIZE: f32 = 12.0;
const LINE_INDENT: f32 = 25.0;
const LINE_HEIGHT: f32 = 6.0;
/// Where the first line of the first page goes, below the title.
const FIRST_PAGE_TOP: f32 = 262.0;
/// Where the first line of every later page goes.
const PAGE_TOP: f32 = 277.0;
const PAGE_BOTTOM: f32 = 20.0;

/// Where one line of the report is drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
struct LinePosition {
    /// Zero based page number.
    page: usize,
    /// Distance from the bottom of the page in millimetres.
    y: f32,
}

/// Lay out `count` lines top to bottom, starting a new page when one fills up.
fn line_positions(count: usize) -> Vec<LinePosition> {
    let mut positions = Vec::with_capacity(count);
    let mut page = 0;
    let mut y = FIRST_PAGE_TOP;

    for _ in 0..count {
        if y < PAGE_BOTTOM {
            page += 1;
            y = PAGE_TOP;
        }

        positions.push(LinePosition { page, y });
        y -= LINE_HEIGHT;
    }

    positions
}

fn report_line(index: usize, expense: &Expense) -> Result<String, Error> {
    let date = expense
        .date
        .format(DATE_FORMAT)
        .map_err(|error| Error::ReportError(error.to_string()))?;

    Ok(format!(
        "{}. {date} - {} - ${}",
        index + 1,
        expense.category,
        expense.amount
    ))
}

/// Roughly centre `text` on the page, assuming Helvetica's average glyph width of half an em.
fn centred_x(text: &str, font_size: f32) -> Mm {
    const MM_PER_POINT: f32 = 0.3528;
    let text_width = text.chars().count() as f32 * font_size * 0.5 * MM_PER_POINT;

    Mm(((PAGE_WIDTH.0 - text_width) / 2.0).max(0.0))
}

/// Draw `expenses` as an A4 PDF titled "Expense Report", one numbered line per expense.
///
/// # Errors
///
/// Returns an [Error::ReportError] if the document could not be written.
pub fn render_pdf(expenses: &[Expense]) -> Result<Vec<u8>, Error> {
    let (document, first_page, first_layer) =
        PdfDocument::new(TITLE, PAGE_WIDTH, PAGE_HEIGHT, LAYER_NAME);
    let font = document
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(pdf_error)?;

    let mut layer = document.get_page(first_page).get_layer(first_layer);
    layer.use_text(
        TITLE,
        TITLE_FONT_SIZE,
        centred_x(TITLE, TITLE_FONT_SIZE),
        Mm(TITLE_Y),
        &font,
    );

    let mut current_page = 0;
    for (index, (expense, position)) in expenses
        .iter()
        .zip(line_positions(expenses.len()))
        .enumerate()
    {
        if position.page != current_page {
            let (page, page_layer) = document.add_page(PAGE_WIDTH, PAGE_HEIGHT, LAYER_NAME);
            layer = document.get_page(page).get_layer(page_layer);
            current_page = position.page;
        }

        draw_line(&layer, &report_line(index, expense)?, position.y, &font);
    }

    document
        .save_to_bytes()
        .map_err(pdf_error)
}

fn pdf_error(error: printpdf::Error) -> Error {
    Error::ReportError(format!("{error:?}"))
}

fn draw_line(layer: &PdfLayerReference, text: &str, y: f32, font: &IndirectFontRef) {
    layer.use_text(text, LINE_FONT_SIZE, Mm(LINE_INDENT), Mm(y), font);
}
