//! Page furniture: banner, caption and the placeholder notice. Positions
//! here are PDF user space (bottom-left origin).

use pdf_writer::{Content, Name, Str};

use crate::attachments::Placeholder;
use crate::fonts::{FontEntry, to_winansi_bytes};
use crate::model::PageGeometry;

const BANNER_FONT_SIZE: f32 = 10.0;
const CAPTION_FONT_SIZE: f32 = 8.0;

fn show_text(content: &mut Content, font: &FontEntry, size: f32, x: f32, y: f32, text: &str) {
    content
        .begin_text()
        .set_font(Name(font.pdf_name.as_bytes()), size)
        .next_line(x, y)
        .show(Str(&to_winansi_bytes(text)))
        .end_text();
}

fn show_centered(content: &mut Content, font: &FontEntry, size: f32, center_x: f32, y: f32, text: &str) {
    let x = center_x - font.text_width(text, size) / 2.0;
    show_text(content, font, size, x, y, text);
}

/// Banner text in the band under the top margin, with a rule beneath it.
pub(super) fn draw_banner(content: &mut Content, font: &FontEntry, geometry: &PageGeometry, text: &str) {
    let page_h = geometry.height as f32;
    let left = geometry.margin as f32;
    let width = geometry.content_width() as f32;
    let band_top = page_h - geometry.margin as f32;
    let band_h = geometry.banner_height as f32;
    if band_h <= 0.0 {
        return;
    }

    let size = BANNER_FONT_SIZE.min(band_h * 0.6);
    let baseline = band_top - (band_h + size * 0.7) / 2.0;
    content.set_fill_rgb(0.2, 0.2, 0.2);
    show_text(content, font, size, left, baseline, &font.fit_text(text, size, width));

    let rule_y = band_top - band_h + 2.0;
    content.set_line_width(0.5);
    content.set_stroke_rgb(0.6, 0.6, 0.6);
    content.move_to(left, rule_y);
    content.line_to(left + width, rule_y);
    content.stroke();
}

/// Small centered caption in the bottom margin.
pub(super) fn draw_caption(content: &mut Content, font: &FontEntry, geometry: &PageGeometry, text: &str) {
    let margin = geometry.margin as f32;
    if margin < CAPTION_FONT_SIZE {
        return;
    }
    let center = geometry.width as f32 / 2.0;
    let baseline = (margin - CAPTION_FONT_SIZE * 0.7) / 2.0;
    let fitted = font.fit_text(text, CAPTION_FONT_SIZE, geometry.content_width() as f32);
    content.set_fill_rgb(0.4, 0.4, 0.4);
    show_centered(content, font, CAPTION_FONT_SIZE, center, baseline, &fitted);
}

/// Framed notice standing in for an attachment that failed to load.
pub(super) fn draw_placeholder(
    content: &mut Content,
    font: &FontEntry,
    geometry: &PageGeometry,
    placeholder: &Placeholder,
) {
    let page_h = geometry.height as f32;
    let body = geometry.body();
    let box_w = body.w as f32;
    let box_h = (body.h as f32).min(140.0);
    let x = body.x as f32;
    let top = page_h - body.y as f32 - (body.h as f32 - box_h) / 2.0;
    let bottom = top - box_h;

    content.save_state();
    content.set_fill_rgb(0.96, 0.96, 0.96);
    content.set_stroke_rgb(0.55, 0.55, 0.55);
    content.set_line_width(1.0);
    content.rect(x, bottom, box_w, box_h);
    content.fill_nonzero_and_stroke();
    content.restore_state();

    let center = x + box_w / 2.0;
    let text_w = (box_w - 20.0).max(0.0);
    let title_y = top - box_h * 0.35;
    content.set_fill_rgb(0.3, 0.3, 0.3);
    show_centered(content, font, 14.0, center, title_y, "Attachment unavailable");
    let reason = font.fit_text(&placeholder.reason, 9.0, text_w);
    show_centered(content, font, 9.0, center, title_y - 24.0, &reason);
    let reference = font.fit_text(&placeholder.truncated_source_ref, 9.0, text_w);
    show_centered(content, font, 9.0, center, title_y - 38.0, &reference);
}
