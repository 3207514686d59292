//! Annotated copy of the submitted photo: resized to the display size the
//! daemon reported, with one labeled box per detected face.

use ab_glyph::{FontVec, PxScale};
use anyhow::{Context, Result};
use facegate_core::{AnnotatedFace, BoundingBox, DisplaySize, UNKNOWN_DISPLAY_LABEL};
use image::imageops::FilterType;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use std::path::{Path, PathBuf};

const KNOWN: Rgb<u8> = Rgb([0, 200, 83]);
const UNKNOWN: Rgb<u8> = Rgb([229, 57, 53]);
const LABEL_TEXT: Rgb<u8> = Rgb([255, 255, 255]);
const LABEL_SCALE: f32 = 14.0;
const LABEL_PADDING: u32 = 2;

/// Fonts tried when `--font` is not given.
const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/noto/NotoSans-Regular.ttf",
];

/// Load the label font: the explicit path, else the first system candidate.
///
/// `Ok(None)` means no font was given and none of the candidates exist; boxes
/// are then drawn without labels.
pub fn load_font(explicit: Option<&Path>) -> Result<Option<FontVec>> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match FONT_CANDIDATES.iter().map(PathBuf::from).find(|p| p.exists()) {
            Some(path) => path,
            None => return Ok(None),
        },
    };
    let bytes = std::fs::read(&path).with_context(|| format!("reading font {}", path.display()))?;
    let font = FontVec::try_from_vec(bytes)
        .map_err(|e| anyhow::anyhow!("parsing font {}: {e}", path.display()))?;
    tracing::debug!(font = %path.display(), "preview font loaded");
    Ok(Some(font))
}

pub fn write_preview(
    photo: &[u8],
    display: &DisplaySize,
    faces: &[AnnotatedFace],
    font: Option<&FontVec>,
    out: &Path,
) -> Result<()> {
    let source = image::load_from_memory(photo).context("decoding photo for preview")?;
    let width = display.width.round().max(1.0) as u32;
    let height = display.height.round().max(1.0) as u32;
    let mut canvas = image::imageops::resize(&source.to_rgb8(), width, height, FilterType::Triangle);

    if font.is_none() && !faces.is_empty() {
        tracing::warn!("no font available; preview boxes are drawn without labels");
    }
    for face in faces {
        draw_face(&mut canvas, face, font);
    }

    canvas
        .save(out)
        .with_context(|| format!("writing preview to {}", out.display()))?;
    Ok(())
}

/// One face: a two-pixel outline, plus a filled label tag when a font is given.
pub fn draw_face(canvas: &mut RgbImage, face: &AnnotatedFace, font: Option<&FontVec>) {
    let color = if face.label == UNKNOWN_DISPLAY_LABEL {
        UNKNOWN
    } else {
        KNOWN
    };
    let outer = face_rect(&face.bbox);
    draw_hollow_rect_mut(canvas, outer, color);
    if outer.width() > 2 && outer.height() > 2 {
        let inner = Rect::at(outer.left() + 1, outer.top() + 1).of_size(outer.width() - 2, outer.height() - 2);
        draw_hollow_rect_mut(canvas, inner, color);
    }

    let Some(font) = font else {
        return;
    };
    let scale = PxScale::from(LABEL_SCALE);
    let (text_w, text_h) = text_size(scale, font, &face.label);
    let tag_w = text_w + 2 * LABEL_PADDING;
    let tag_h = text_h + 2 * LABEL_PADDING;
    let (x, y) = label_origin(outer, tag_h);
    draw_filled_rect_mut(canvas, Rect::at(x, y).of_size(tag_w.max(1), tag_h.max(1)), color);
    draw_text_mut(
        canvas,
        LABEL_TEXT,
        x + LABEL_PADDING as i32,
        y + LABEL_PADDING as i32,
        scale,
        font,
        &face.label,
    );
}

fn face_rect(bbox: &BoundingBox) -> Rect {
    Rect::at(bbox.x.round() as i32, bbox.y.round() as i32)
        .of_size((bbox.width.round() as u32).max(1), (bbox.height.round() as u32).max(1))
}

/// Top-left corner of the label tag: above the box, or just inside its top
/// edge when the box touches the top of the image.
fn label_origin(face: Rect, tag_height: u32) -> (i32, i32) {
    let above = face.top() - tag_height as i32;
    if above >= 0 {
        (face.left(), above)
    } else {
        (face.left(), face.top().max(0))
    }
}
