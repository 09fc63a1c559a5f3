//! Render list and display items.
//!
//! The board layout never touches pixels directly. It emits an ordered list
//! of [`DisplayItem`] commands into a [`RenderList`], which a
//! [`RenderBackend`](crate::render::backend::RenderBackend) later executes on
//! a surface. Keeping the two apart lets the layout be inspected in tests
//! without rasterizing anything.
//!
//! Coordinates follow the raster convention: `(0, 0)` is the top-left pixel,
//! `x` grows to the right and `y` grows downwards.
//!
//! # Example
//!
//! ```rust
//! use tutorboard::render::{Color, DisplayItem, RenderList};
//!
//! let mut list = RenderList::new();
//!
//! list.add_command(DisplayItem::Clear { color: Color::rgb(34, 60, 34) });
//!
//! list.add_command(DisplayItem::Rect {
//!     x: 10.0,
//!     y: 20.0,
//!     w: 100.0,
//!     h: 50.0,
//!     color: Color::rgb(255, 255, 255),
//! });
//! assert_eq!(list.items.len(), 2);
//! ```

/// RGBA color used for drawing commands.
///
/// Channels are 8-bit. An alpha below 255 means the item is blended
/// source-over onto whatever is already on the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn from_u8(r: u8, g: u8, b: u8, a: u8) -> Color {
        Color { r, g, b, a }
    }

    /// Creates a fully opaque color.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Color {
        Color { r, g, b, a: 255 }
    }

    /// Returns the same color with a different alpha.
    pub const fn with_alpha(self, a: u8) -> Color {
        Color { a, ..self }
    }
}

/// One drawing command of a board.
#[derive(Clone, Debug, PartialEq)]
pub enum DisplayItem {
    /// Fill the whole surface.
    Clear { color: Color },

    /// Axis-aligned filled rectangle, top-left at `(x, y)`. Not antialiased.
    Rect { x: f32, y: f32, w: f32, h: f32, color: Color },

    /// Draw a straight line segment with butt caps.
    Line {
        x0: f32,
        y0: f32,
        x1: f32,
        y1: f32,
        /// Stroke width in pixels.
        width: f32,
        color: Color,
    },

    /// Draw a filled circle with an outline.
    Ellipse {
        /// Center x-coordinate.
        cx: f32,
        /// Center y-coordinate.
        cy: f32,
        radius: f32,
        fill: Color,
        outline: Color,
        /// Outline width in pixels, drawn inside the radius.
        outline_width: f32,
    },

    /// Draw a text run whose ascender line sits at `y`.
    TextRun {
        x: f32,
        /// Top of the line box, not the baseline.
        y: f32,
        text: String,
        /// Pixel size; picks the face from the font book.
        size: u32,
        color: Color,
    },

    /// Plot a single pixel, blended with its alpha.
    Point { x: i32, y: i32, color: Color },
}

/// Drawing commands in paint order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RenderList {
    pub items: Vec<DisplayItem>,
}

impl RenderList {
    pub fn new() -> Self {
        RenderList { items: Vec::new() }
    }

    pub fn add_command(&mut self, command: DisplayItem) {
        self.items.push(command);
    }

    /// Adds the four bands of a rectangle outline of the given `thickness`.
    ///
    /// The band grows inwards from the outer edge `(x, y, w, h)`, so the
    /// outline never paints outside the given bounds.
    pub fn add_frame(&mut self, x: f32, y: f32, w: f32, h: f32, thickness: f32, color: Color) {
        let t = thickness.min(w / 2.0).min(h / 2.0);
        self.add_command(DisplayItem::Rect { x, y, w, h: t, color });
        self.add_command(DisplayItem::Rect { x, y: y + h - t, w, h: t, color });
        self.add_command(DisplayItem::Rect { x, y: y + t, w: t, h: h - 2.0 * t, color });
        self.add_command(DisplayItem::Rect { x: x + w - t, y: y + t, w: t, h: h - 2.0 * t, color });
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterates over the text runs in paint order.
    pub fn text_runs(&self) -> impl Iterator<Item = (&str, f32, f32, u32)> {
        self.items.iter().filter_map(|item| match item {
            DisplayItem::TextRun { text, x, y, size, .. } => Some((text.as_str(), *x, *y, *size)),
            _ => None,
        })
    }
}
