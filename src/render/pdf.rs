//! `LayoutDocument` to PDF via `printpdf` builtin fonts.

use std::io::BufWriter;

use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Line, Mm, PdfDocument, PdfLayerReference, Point, Rgb,
};

use super::layout::{DrawOp, LayoutDocument};
use super::RenderError;

const LAYER: &str = "Layer 1";

pub fn to_pdf_bytes(doc: &LayoutDocument) -> Result<Vec<u8>, RenderError> {
    let spec = doc.spec;
    let (pdf, page1, layer1) = PdfDocument::new(&doc.title, Mm(spec.width), Mm(spec.height), LAYER);
    let font = pdf
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| RenderError::Font(e.to_string()))?;
    let bold = pdf
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| RenderError::Font(e.to_string()))?;

    for (i, page) in doc.pages.iter().enumerate() {
        let layer = if i == 0 {
            pdf.get_page(page1).get_layer(layer1)
        } else {
            let (p, l) = pdf.add_page(Mm(spec.width), Mm(spec.height), LAYER);
            pdf.get_page(p).get_layer(l)
        };
        layer.set_outline_color(Color::Rgb(Rgb::new(0.0, 0.0, 0.0, None)));
        layer.set_outline_thickness(0.5);

        // Layout y grows downwards; PDF y grows upwards.
        let flip = |y: f32| Mm(spec.height - y);

        for op in &page.ops {
            match op {
                DrawOp::Text { x, y, size, bold: is_bold, text, .. } => {
                    let face: &IndirectFontRef = if *is_bold { &bold } else { &font };
                    layer.use_text(text.as_str(), *size, Mm(*x), flip(*y), face);
                }
                DrawOp::Rect { x, y, width, height, .. } => {
                    let points = [
                        (*x, *y),
                        (*x + *width, *y),
                        (*x + *width, *y + *height),
                        (*x, *y + *height),
                    ];
                    stroke(&layer, &points, true, &flip);
                }
                DrawOp::Rule { x1, x2, y, .. } => {
                    stroke(&layer, &[(*x1, *y), (*x2, *y)], false, &flip);
                }
            }
        }
    }

    let mut buf = BufWriter::new(Vec::new());
    pdf.save(&mut buf)
        .map_err(|e| RenderError::Save(e.to_string()))?;
    buf.into_inner()
        .map_err(|e| RenderError::Save(e.to_string()))
}

fn stroke(layer: &PdfLayerReference, points: &[(f32, f32)], closed: bool, flip: &dyn Fn(f32) -> Mm) {
    let line = Line {
        points: points
            .iter()
            .map(|(x, y)| (Point::new(Mm(*x), flip(*y)), false))
            .collect(),
        is_closed: closed,
    };
    layer.add_line(line);
}
