//! Sheet layout: draw the summary page and one order sheet per store.
//!
//! The laid-out document is the "screen" the exporter captures from. Page 0
//! is the summary index; page `i + 1` is store `i`. Store pages are A4 wide
//! and grow taller when the item table does not fit, so a rasterised sheet
//! keeps the same proportions as a long printout.
//!
//! Geometry is computed in PDF points with a top-left origin and flipped
//! only when handed to pdfium, which uses a bottom-left origin.

use crate::config::Locale;
use crate::error::DispatchError;
use crate::model::StoreOrder;
use chrono::NaiveDate;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use tracing::debug;

// ── Geometry ─────────────────────────────────────────────────────────────────

const STORE_MARGIN: f32 = 42.5; // 15 mm
const SUMMARY_MARGIN: f32 = 56.7; // 20 mm

const TITLE_H: f32 = 22.0;
const INFO_H: f32 = 20.0;
const HEADER_ROW_H: f32 = 18.0;
const ITEM_ROW_H: f32 = 16.0;
const TOTAL_ROW_H: f32 = 18.0;
const SIGNATURE_GAP: f32 = 34.0;
const SIGNATURE_H: f32 = 30.0;

const SUMMARY_TITLE_H: f32 = 70.0;
const SUMMARY_ROW_H: f32 = 20.0;
const SUMMARY_COL_GAP: f32 = 28.0;
const SUMMARY_FOOTER_H: f32 = 60.0;

const TABLE_FONT: f32 = 7.5;
const HEADER_FONT: f32 = 8.0;

/// Fixed widths of the info strip; `None` takes the remaining space.
const INFO_COLUMNS: [Option<f32>; 7] = [
    Some(50.0),
    Some(70.0),
    None,
    Some(50.0),
    Some(70.0),
    Some(50.0),
    Some(50.0),
];

/// Fixed widths of the item table; `None` columns share the remaining space.
const TABLE_COLUMNS: [Option<f32>; 9] = [
    Some(40.0),
    Some(65.0),
    Some(32.0),
    Some(32.0),
    Some(45.0),
    Some(45.0),
    None,
    None,
    Some(32.0),
];

/// Printed labels for one locale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetLabels {
    pub sheet_title: &'static str,
    pub pos_code: &'static str,
    pub level: &'static str,
    pub fixture_type: &'static str,
    pub columns: [&'static str; 9],
    pub total_quantity: &'static str,
    pub sign: &'static str,
    pub check: &'static str,
    pub date: &'static str,
    pub summary_title: &'static str,
    pub summary_subtitle: &'static str,
    pub pieces: &'static str,
    pub system: &'static str,
    /// Middle part of the paginated file name.
    pub file_label: &'static str,
}

impl SheetLabels {
    pub fn for_locale(locale: Locale) -> Self {
        match locale {
            Locale::En => Self {
                sheet_title: "Dispatch List",
                pos_code: "Store Code",
                level: "Level",
                fixture_type: "Fixture Type",
                columns: [
                    "Artwork", "Fixture", "W", "H", "W (bleed)", "H (bleed)", "Material",
                    "Process", "Qty",
                ],
                total_quantity: "Total quantity:",
                sign: "DISPATCHER (SIGN)",
                check: "WAREHOUSE (CHECK)",
                date: "DATE",
                summary_title: "DISPATCH SUMMARY",
                summary_subtitle: "DISPATCH SUMMARY CATALOG INDEX",
                pieces: "PCS",
                system: "DISPATCH SYSTEM",
                file_label: "Dispatch",
            },
            Locale::Zh => Self {
                sheet_title: "配货清单",
                pos_code: "店铺编号",
                level: "店铺级别",
                fixture_type: "器架类型",
                columns: [
                    "画面选图", "器架", "宽", "高", "宽（出血）", "高（出血）", "材质", "工艺",
                    "数量",
                ],
                total_quantity: "合计数量：",
                sign: "配货负责人 (SIGN)",
                check: "仓储复核 (CHECK)",
                date: "DATE",
                summary_title: "配货单总目录",
                summary_subtitle: "DISPATCH SUMMARY CATALOG INDEX",
                pieces: "PCS",
                system: "DISPATCH SYSTEM",
                file_label: "配货汇总",
            },
        }
    }
}

/// Inputs to [`layout_document`] beyond the orders themselves.
#[derive(Debug, Clone)]
pub struct LayoutOptions {
    /// Page width and minimum page height, in points.
    pub page_size: (f32, f32),
    pub brand: String,
    pub labels: SheetLabels,
    pub font_path: Option<PathBuf>,
    /// Date stamped on every sheet.
    pub date: NaiveDate,
}

/// Height in points of a store sheet with `item_count` rows.
pub fn store_sheet_height(item_count: usize, min_height: f32) -> f32 {
    let needed = STORE_MARGIN * 2.0
        + TITLE_H
        + INFO_H
        + HEADER_ROW_H
        + ITEM_ROW_H * item_count as f32
        + TOTAL_ROW_H
        + SIGNATURE_GAP
        + SIGNATURE_H;
    needed.max(min_height)
}

/// Height in points of the summary page listing `store_count` stores.
pub fn summary_height(store_count: usize, min_height: f32) -> f32 {
    let rows = store_count.div_ceil(2);
    let needed = SUMMARY_MARGIN * 2.0
        + SUMMARY_TITLE_H
        + 30.0
        + SUMMARY_ROW_H * rows as f32
        + SUMMARY_FOOTER_H;
    needed.max(min_height)
}

/// Split `total` between fixed columns and evenly between flexible ones.
pub fn column_widths<const N: usize>(columns: &[Option<f32>; N], total: f32) -> [f32; N] {
    let fixed: f32 = columns.iter().flatten().sum();
    let flex_count = columns.iter().filter(|w| w.is_none()).count().max(1);
    let flex = ((total - fixed) / flex_count as f32).max(0.0);
    let mut out = [0.0; N];
    for (slot, w) in out.iter_mut().zip(columns.iter()) {
        *slot = w.unwrap_or(flex);
    }
    out
}

/// Rough advance width of `text` at `size` points.
///
/// Latin glyphs average about half an em, CJK glyphs a full em. Good enough
/// to centre labels and truncate overflowing cells.
pub fn text_width(text: &str, size: f32) -> f32 {
    text.chars()
        .map(|c| if c.is_ascii() { 0.55 } else { 1.0 })
        .sum::<f32>()
        * size
}

/// Truncate `text` so it fits `max_width` points, marking the cut with `..`.
pub fn fit_text(text: &str, max_width: f32, size: f32) -> String {
    if text_width(text, size) <= max_width {
        return text.to_string();
    }
    let budget = max_width - text_width("..", size);
    let mut out = String::new();
    let mut used = 0.0;
    for c in text.chars() {
        let w = if c.is_ascii() { 0.55 } else { 1.0 } * size;
        if used + w > budget {
            break;
        }
        used += w;
        out.push(c);
    }
    out.push_str("..");
    out
}

// ── Document ────────────────────────────────────────────────────────────────

#[derive(Clone, Copy)]
struct Fonts {
    regular: PdfFontToken,
    bold: PdfFontToken,
}

/// Lay out the summary page plus one sheet per store and return the PDF bytes.
pub fn layout_document(
    pdfium: &Pdfium,
    orders: &[StoreOrder],
    opts: &LayoutOptions,
) -> Result<Vec<u8>, DispatchError> {
    let fail = |e: PdfiumError| DispatchError::LayoutFailed(format!("{e:?}"));

    let mut document = pdfium.create_new_pdf().map_err(fail)?;

    let fonts = match &opts.font_path {
        Some(path) => {
            let token = document
                .fonts_mut()
                .load_true_type_from_file(path, true)
                .map_err(|e| {
                    DispatchError::LayoutFailed(format!(
                        "font '{}' could not be loaded: {e:?}",
                        path.display()
                    ))
                })?;
            Fonts {
                regular: token,
                bold: token,
            }
        }
        None => Fonts {
            regular: document.fonts_mut().helvetica(),
            bold: document.fonts_mut().helvetica_bold(),
        },
    };

    let (width, min_height) = opts.page_size;

    let height = summary_height(orders.len(), min_height);
    let page = document
        .pages_mut()
        .create_page_at_end(PdfPagePaperSize::Custom(
            PdfPoints::new(width),
            PdfPoints::new(height),
        ))
        .map_err(fail)?;
    draw_summary(&mut Canvas::new(page, width, height), orders, opts, fonts).map_err(fail)?;

    for order in orders {
        let height = store_sheet_height(order.items.len(), min_height);
        let page = document
            .pages_mut()
            .create_page_at_end(PdfPagePaperSize::Custom(
                PdfPoints::new(width),
                PdfPoints::new(height),
            ))
            .map_err(fail)?;
        draw_store_sheet(&mut Canvas::new(page, width, height), order, opts, fonts)
            .map_err(fail)?;
    }

    let bytes = document.save_to_bytes().map_err(fail)?;
    debug!(
        "Laid out {} sheets + summary → {} bytes",
        orders.len(),
        bytes.len()
    );
    Ok(bytes)
}

/// Top-left-origin drawing over a pdfium page.
struct Canvas<'a> {
    page: PdfPage<'a>,
    width: f32,
    height: f32,
}

impl<'a> Canvas<'a> {
    fn new(page: PdfPage<'a>, width: f32, height: f32) -> Self {
        Self {
            page,
            width,
            height,
        }
    }

    fn text(
        &mut self,
        x: f32,
        top: f32,
        size: f32,
        font: PdfFontToken,
        text: &str,
    ) -> Result<(), PdfiumError> {
        if text.is_empty() {
            return Ok(());
        }
        // Baseline sits roughly 0.8 em below the top of the line box.
        let baseline = self.height - top - size * 0.8;
        self.page.objects_mut().create_text_object(
            PdfPoints::new(x),
            PdfPoints::new(baseline),
            text,
            font,
            PdfPoints::new(size),
        )?;
        Ok(())
    }

    /// Text vertically centred in a box, left-aligned with padding.
    #[allow(clippy::too_many_arguments)]
    fn cell_text(
        &mut self,
        left: f32,
        top: f32,
        w: f32,
        h: f32,
        size: f32,
        font: PdfFontToken,
        text: &str,
    ) -> Result<(), PdfiumError> {
        let fitted = fit_text(text, w - 4.0, size);
        self.text(left + 2.0, top + (h - size) / 2.0, size, font, &fitted)
    }

    /// Text centred both ways in a box.
    #[allow(clippy::too_many_arguments)]
    fn centred_text(
        &mut self,
        left: f32,
        top: f32,
        w: f32,
        h: f32,
        size: f32,
        font: PdfFontToken,
        text: &str,
    ) -> Result<(), PdfiumError> {
        let fitted = fit_text(text, w - 4.0, size);
        let x = left + (w - text_width(&fitted, size)) / 2.0;
        self.text(x, top + (h - size) / 2.0, size, font, &fitted)
    }

    fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, stroke: f32) -> Result<(), PdfiumError> {
        self.page.objects_mut().create_path_object_line(
            PdfPoints::new(x1),
            PdfPoints::new(self.height - y1),
            PdfPoints::new(x2),
            PdfPoints::new(self.height - y2),
            PdfColor::new(0, 0, 0, 255),
            PdfPoints::new(stroke),
        )?;
        Ok(())
    }

    fn rect(
        &mut self,
        left: f32,
        top: f32,
        w: f32,
        h: f32,
        stroke: Option<f32>,
        fill: Option<PdfColor>,
    ) -> Result<(), PdfiumError> {
        let rect = PdfRect::new(
            PdfPoints::new(self.height - top - h),
            PdfPoints::new(left),
            PdfPoints::new(self.height - top),
            PdfPoints::new(left + w),
        );
        self.page.objects_mut().create_path_object_rect(
            rect,
            stroke.map(|_| PdfColor::new(0, 0, 0, 255)),
            stroke.map(PdfPoints::new),
            fill,
        )?;
        Ok(())
    }
}

fn light_grey() -> PdfColor {
    PdfColor::new(245, 245, 245, 255)
}

fn draw_summary(
    canvas: &mut Canvas<'_>,
    orders: &[StoreOrder],
    opts: &LayoutOptions,
    fonts: Fonts,
) -> Result<(), PdfiumError> {
    let labels = &opts.labels;
    let left = SUMMARY_MARGIN;
    let content_w = canvas.width - SUMMARY_MARGIN * 2.0;
    let mut y = SUMMARY_MARGIN;

    canvas.rect(left, y, content_w, SUMMARY_TITLE_H, Some(3.0), None)?;
    canvas.centred_text(left, y + 12.0, content_w, 28.0, 20.0, fonts.bold, labels.summary_title)?;
    canvas.centred_text(
        left,
        y + 42.0,
        content_w,
        14.0,
        6.5,
        fonts.regular,
        labels.summary_subtitle,
    )?;
    y += SUMMARY_TITLE_H + 30.0;

    let col_w = (content_w - SUMMARY_COL_GAP) / 2.0;
    for (idx, order) in orders.iter().enumerate() {
        let x = left + (idx % 2) as f32 * (col_w + SUMMARY_COL_GAP);
        let top = y + (idx / 2) as f32 * SUMMARY_ROW_H;
        let pieces = format!("{} {}", order.items.len(), labels.pieces);
        let pieces_w = text_width(&pieces, 7.0) + 6.0;

        canvas.text(x, top + 5.0, 9.0, fonts.bold, &format!("{:02}", idx + 1))?;
        canvas.text(x + 20.0, top + 5.0, 9.0, fonts.bold, &fit_text(&order.pos_code, 60.0, 9.0))?;
        let name_w = (col_w - 82.0 - pieces_w).max(0.0);
        canvas.text(x + 82.0, top + 5.0, 9.0, fonts.regular, &fit_text(&order.pos_name, name_w, 9.0))?;
        canvas.rect(
            x + col_w - pieces_w,
            top + 4.0,
            pieces_w,
            11.0,
            Some(0.3),
            Some(light_grey()),
        )?;
        canvas.text(x + col_w - pieces_w + 3.0, top + 6.0, 7.0, fonts.bold, &pieces)?;
        canvas.line(x, top + SUMMARY_ROW_H - 1.0, x + col_w, top + SUMMARY_ROW_H - 1.0, 0.3)?;
    }

    let footer = format!(
        "{} {}  -  GEN: {}",
        opts.brand.to_uppercase(),
        labels.system,
        opts.date.format("%Y-%m-%d")
    );
    let footer_top = canvas.height - SUMMARY_MARGIN - 14.0;
    canvas.centred_text(left, footer_top, content_w, 14.0, 7.0, fonts.bold, &footer)?;
    Ok(())
}

fn draw_store_sheet(
    canvas: &mut Canvas<'_>,
    order: &StoreOrder,
    opts: &LayoutOptions,
    fonts: Fonts,
) -> Result<(), PdfiumError> {
    let labels = &opts.labels;
    let left = STORE_MARGIN;
    let content_w = canvas.width - STORE_MARGIN * 2.0;
    let mut y = STORE_MARGIN;

    // Title bar
    canvas.rect(left, y, content_w, TITLE_H, Some(1.5), None)?;
    let title = format!("{} {}", opts.brand, labels.sheet_title);
    canvas.centred_text(left, y, content_w, TITLE_H, 12.0, fonts.bold, &title)?;
    y += TITLE_H;

    // Store info strip
    let info = [
        (labels.pos_code, true),
        (order.pos_code.as_str(), false),
        (order.pos_name.as_str(), false),
        (labels.level, true),
        (order.level.as_str(), false),
        (labels.fixture_type, true),
        (order.fixture_type.as_str(), false),
    ];
    let widths = column_widths(&INFO_COLUMNS, content_w);
    let mut x = left;
    for ((text, is_label), w) in info.iter().zip(widths) {
        let fill = is_label.then(light_grey);
        canvas.rect(x, y, w, INFO_H, Some(0.75), fill)?;
        let font = if *is_label { fonts.bold } else { fonts.regular };
        canvas.centred_text(x, y, w, INFO_H, HEADER_FONT, font, text)?;
        x += w;
    }
    y += INFO_H;

    // Item table
    let widths = column_widths(&TABLE_COLUMNS, content_w);
    let mut x = left;
    for (label, w) in labels.columns.iter().zip(widths) {
        canvas.rect(x, y, w, HEADER_ROW_H, Some(0.75), None)?;
        canvas.centred_text(x, y, w, HEADER_ROW_H, HEADER_FONT, fonts.bold, label)?;
        x += w;
    }
    y += HEADER_ROW_H;

    for item in &order.items {
        let quantity = item.quantity.to_string();
        let cells = [
            item.id.as_str(),
            item.fixture.as_str(),
            item.width.as_str(),
            item.height.as_str(),
            item.bleed_width.as_str(),
            item.bleed_height.as_str(),
            item.material.as_str(),
            item.process.as_str(),
            quantity.as_str(),
        ];
        let mut x = left;
        for (i, (text, w)) in cells.iter().zip(widths).enumerate() {
            canvas.rect(x, y, w, ITEM_ROW_H, Some(0.5), None)?;
            if i == cells.len() - 1 {
                canvas.centred_text(x, y, w, ITEM_ROW_H, TABLE_FONT, fonts.bold, text)?;
            } else if i >= 6 {
                canvas.cell_text(x, y, w, ITEM_ROW_H, TABLE_FONT - 0.5, fonts.regular, text)?;
            } else {
                canvas.centred_text(x, y, w, ITEM_ROW_H, TABLE_FONT, fonts.regular, text)?;
            }
            x += w;
        }
        y += ITEM_ROW_H;
    }

    // Total row
    let qty_w = widths[widths.len() - 1];
    let label_w = content_w - qty_w;
    canvas.rect(left, y, label_w, TOTAL_ROW_H, Some(0.75), None)?;
    let total_label_w = text_width(labels.total_quantity, HEADER_FONT);
    canvas.text(
        left + label_w - total_label_w - 12.0,
        y + (TOTAL_ROW_H - HEADER_FONT) / 2.0,
        HEADER_FONT,
        fonts.bold,
        labels.total_quantity,
    )?;
    canvas.rect(left + label_w, y, qty_w, TOTAL_ROW_H, Some(0.75), None)?;
    canvas.centred_text(
        left + label_w,
        y,
        qty_w,
        TOTAL_ROW_H,
        HEADER_FONT,
        fonts.bold,
        &order.total_quantity().to_string(),
    )?;
    y += TOTAL_ROW_H + SIGNATURE_GAP;

    // Signature strip
    let col_w = (content_w - 2.0 * 24.0) / 3.0;
    let date = format!("{}: {}", labels.date, opts.date.format("%Y-%m-%d"));
    for (i, text) in [labels.sign, labels.check].iter().enumerate() {
        let x = left + i as f32 * (col_w + 24.0);
        canvas.line(x, y, x + col_w, y, 1.5)?;
        canvas.text(x, y + 8.0, HEADER_FONT, fonts.bold, text)?;
    }
    let x = left + 2.0 * (col_w + 24.0);
    canvas.line(x, y, x + col_w, y, 1.5)?;
    canvas.text(
        x + col_w - text_width(&date, HEADER_FONT),
        y + 8.0,
        HEADER_FONT,
        fonts.regular,
        &date,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_sheets_keep_a4_height() {
        let a4 = 841.89;
        assert_eq!(store_sheet_height(0, a4), a4);
        assert_eq!(store_sheet_height(10, a4), a4);
    }

    #[test]
    fn long_sheets_grow() {
        let a4 = 841.89;
        let h = store_sheet_height(100, a4);
        assert!(h > a4);
        assert!((store_sheet_height(101, a4) - h - ITEM_ROW_H).abs() < 0.01);
    }

    #[test]
    fn summary_grows_by_row_pairs() {
        let base = summary_height(0, 0.0);
        let rows = |n: usize| ((summary_height(n, 0.0) - base) / SUMMARY_ROW_H).round() as usize;
        assert_eq!(rows(1), 1);
        assert_eq!(rows(2), 1);
        assert_eq!(rows(3), 2);
        assert_eq!(rows(40), 20);
    }

    #[test]
    fn column_widths_fill_the_row() {
        let widths = column_widths(&TABLE_COLUMNS, 510.0);
        let sum: f32 = widths.iter().sum();
        assert!((sum - 510.0).abs() < 0.01, "sum = {sum}");
        assert_eq!(widths[6], widths[7]);
        assert_eq!(widths[0], 40.0);
    }

    #[test]
    fn fit_text_truncates_long_values() {
        assert_eq!(fit_text("Rack", 100.0, 8.0), "Rack");
        let cut = fit_text("A very long material description", 40.0, 8.0);
        assert!(cut.ends_with(".."));
        assert!(text_width(&cut, 8.0) <= 40.0 + 0.01);
    }

    #[test]
    fn cjk_counts_full_em() {
        assert_eq!(text_width("店铺", 10.0), 20.0);
        assert!((text_width("ab", 10.0) - 11.0).abs() < 0.001);
    }

    #[test]
    fn labels_per_locale() {
        assert_eq!(SheetLabels::for_locale(Locale::En).file_label, "Dispatch");
        assert_eq!(SheetLabels::for_locale(Locale::Zh).file_label, "配货汇总");
        assert_eq!(SheetLabels::for_locale(Locale::Zh).columns[8], "数量");
    }
}
