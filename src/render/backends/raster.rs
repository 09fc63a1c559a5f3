use std::any::Any;
use std::sync::Arc;

use skrifa::outline::OutlinePen;
use tiny_skia::{FillRule, LineCap, Paint, PathBuilder, Pixmap, Rect, Stroke, Transform};

use crate::render::backend::{ErasedSurface, RenderBackend, RgbImage, SurfaceSize};
use crate::render::fonts::FontBook;
use crate::render::{Color, DisplayItem, RenderError, RenderList};

/// CPU backend drawing into a `tiny-skia` pixmap.
pub struct RasterBackend {
    fonts: Arc<FontBook>,
}

impl RasterBackend {
    pub fn new(fonts: Arc<FontBook>) -> Self {
        Self { fonts }
    }

    fn draw_item(&self, pixmap: &mut Pixmap, item: &DisplayItem) {
        match item {
            DisplayItem::Clear { color } => {
                pixmap.fill(sk_color(*color));
            }
            DisplayItem::Rect { x, y, w, h, color } => {
                if let Some(rect) = Rect::from_xywh(*x, *y, *w, *h) {
                    pixmap.fill_rect(rect, &paint(*color, false), Transform::identity(), None);
                }
            }
            DisplayItem::Line { x0, y0, x1, y1, width, color } => {
                let mut pb = PathBuilder::new();
                pb.move_to(*x0, *y0);
                pb.line_to(*x1, *y1);
                if let Some(path) = pb.finish() {
                    let stroke = Stroke { width: *width, line_cap: LineCap::Butt, ..Stroke::default() };
                    pixmap.stroke_path(&path, &paint(*color, false), &stroke, Transform::identity(), None);
                }
            }
            DisplayItem::Ellipse { cx, cy, radius, fill, outline, outline_width } => {
                // Outline disc first, then the fill disc inset by the outline width.
                if let Some(outer) = PathBuilder::from_circle(*cx, *cy, *radius) {
                    pixmap.fill_path(&outer, &paint(*outline, true), FillRule::Winding, Transform::identity(), None);
                }
                let inner_radius = radius - outline_width;
                if inner_radius > 0.0 {
                    if let Some(inner) = PathBuilder::from_circle(*cx, *cy, inner_radius) {
                        pixmap.fill_path(&inner, &paint(*fill, true), FillRule::Winding, Transform::identity(), None);
                    }
                }
            }
            DisplayItem::TextRun { x, y, text, size, color } => {
                let mut pen = PathPen(PathBuilder::new());
                self.fonts.face(*size).draw_text(text, *size, *x, *y, &mut pen);
                if let Some(path) = pen.0.finish() {
                    pixmap.fill_path(&path, &paint(*color, true), FillRule::Winding, Transform::identity(), None);
                }
            }
            DisplayItem::Point { x, y, color } => {
                if let Some(rect) = Rect::from_xywh(*x as f32, *y as f32, 1.0, 1.0) {
                    pixmap.fill_rect(rect, &paint(*color, false), Transform::identity(), None);
                }
            }
        }
    }
}

impl RenderBackend for RasterBackend {
    fn name(&self) -> &'static str {
        "RasterBackend"
    }

    fn create_surface(&self, size: SurfaceSize) -> Result<Box<dyn ErasedSurface>, RenderError> {
        let pixmap = Pixmap::new(size.width, size.height).ok_or(RenderError::SurfaceAllocation {
            width: size.width,
            height: size.height,
        })?;
        Ok(Box::new(RasterSurface { pixmap, size }))
    }

    fn render(&mut self, list: &RenderList, surface: &mut dyn ErasedSurface) -> Result<(), RenderError> {
        let s = surface
            .as_any_mut()
            .downcast_mut::<RasterSurface>()
            .ok_or(RenderError::ForeignSurface(self.name()))?;

        for item in &list.items {
            self.draw_item(&mut s.pixmap, item);
        }
        Ok(())
    }

    fn snapshot(&mut self, surface: &mut dyn ErasedSurface) -> Result<RgbImage, RenderError> {
        let s = surface
            .as_any_mut()
            .downcast_mut::<RasterSurface>()
            .ok_or(RenderError::ForeignSurface(self.name()))?;

        let mut rgb = Vec::with_capacity(s.pixmap.pixels().len() * 3);
        for px in s.pixmap.pixels() {
            let c = px.demultiply();
            rgb.extend_from_slice(&[c.red(), c.green(), c.blue()]);
        }
        Ok(RgbImage::from_raw(rgb, s.size.width, s.size.height))
    }
}

pub struct RasterSurface {
    pixmap: Pixmap,
    size: SurfaceSize,
}

impl ErasedSurface for RasterSurface {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Collects glyph contours into a `tiny-skia` path.
struct PathPen(PathBuilder);

impl OutlinePen for PathPen {
    fn move_to(&mut self, x: f32, y: f32) {
        self.0.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.0.line_to(x, y);
    }

    fn quad_to(&mut self, cx0: f32, cy0: f32, x: f32, y: f32) {
        self.0.quad_to(cx0, cy0, x, y);
    }

    fn curve_to(&mut self, cx0: f32, cy0: f32, cx1: f32, cy1: f32, x: f32, y: f32) {
        self.0.cubic_to(cx0, cy0, cx1, cy1, x, y);
    }

    fn close(&mut self) {
        self.0.close();
    }
}

fn sk_color(c: Color) -> tiny_skia::Color {
    tiny_skia::Color::from_rgba8(c.r, c.g, c.b, c.a)
}

fn paint(c: Color, anti_alias: bool) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(c.r, c.g, c.b, c.a);
    paint.anti_alias = anti_alias;
    paint
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backend::ErasedSurface;

    const BG: Color = Color::rgb(34, 60, 34);

    fn run(list: &RenderList, width: u32, height: u32) -> RgbImage {
        let mut backend = RasterBackend::new(Arc::new(FontBook::builtin()));
        let mut surface = backend.create_surface(SurfaceSize { width, height }).unwrap();
        backend.render(list, surface.as_mut()).unwrap();
        backend.snapshot(surface.as_mut()).unwrap()
    }

    #[test]
    fn clear_and_rect() {
        let mut list = RenderList::new();
        list.add_command(DisplayItem::Clear { color: BG });
        list.add_command(DisplayItem::Rect { x: 2.0, y: 2.0, w: 3.0, h: 3.0, color: Color::rgb(255, 0, 0) });

        let img = run(&list, 10, 10);
        assert_eq!(img.pixel(0, 0), Some([34, 60, 34]));
        assert_eq!(img.pixel(3, 3), Some([255, 0, 0]));
        assert_eq!(img.pixel(5, 5), Some([34, 60, 34]));
    }

    #[test]
    fn translucent_point_blends_over_background() {
        let mut list = RenderList::new();
        list.add_command(DisplayItem::Clear { color: Color::rgb(0, 0, 0) });
        list.add_command(DisplayItem::Point { x: 1, y: 1, color: Color::from_u8(255, 255, 255, 128) });

        let img = run(&list, 4, 4);
        let [r, g, b] = img.pixel(1, 1).unwrap();
        assert!((120..=136).contains(&r));
        assert_eq!(r, g);
        assert_eq!(g, b);
        assert_eq!(img.pixel(2, 1), Some([0, 0, 0]));
    }

    #[test]
    fn ellipse_has_outline_and_fill() {
        let mut list = RenderList::new();
        list.add_command(DisplayItem::Clear { color: BG });
        list.add_command(DisplayItem::Ellipse {
            cx: 20.0,
            cy: 20.0,
            radius: 12.0,
            fill: Color::rgb(255, 255, 100),
            outline: Color::rgb(255, 255, 255),
            outline_width: 1.0,
        });

        let img = run(&list, 40, 40);
        assert_eq!(img.pixel(20, 20), Some([255, 255, 100]));
        assert_eq!(img.pixel(0, 0), Some([34, 60, 34]));
    }

    #[test]
    fn builtin_text_paints_pixels() {
        let mut list = RenderList::new();
        list.add_command(DisplayItem::Clear { color: BG });
        list.add_command(DisplayItem::TextRun {
            x: 0.0,
            y: 0.0,
            text: "MM".into(),
            size: 20,
            color: Color::rgb(255, 255, 255),
        });

        let img = run(&list, 40, 30);
        // Middle of the first block glyph
        assert_eq!(img.pixel(6, 10), Some([255, 255, 255]));
    }

    #[test]
    fn foreign_surface_is_rejected() {
        struct Other;
        impl ErasedSurface for Other {
            fn as_any_mut(&mut self) -> &mut dyn Any {
                self
            }
        }

        let mut backend = RasterBackend::new(Arc::new(FontBook::builtin()));
        let err = backend.render(&RenderList::new(), &mut Other).unwrap_err();
        assert!(matches!(err, RenderError::ForeignSurface("RasterBackend")));
    }
}
