pub mod backend;

/// Rendering backends.
pub mod backends {
    /// CPU rasterizer on `tiny-skia`
    pub mod raster;
}

pub mod board;
mod errors;
pub mod fonts;
mod render_list;

pub use board::{BoardConfig, BoardConfigBuilder, BoardConfigError, BoardLayout, BoardRenderer, Operation, RenderRequest};
pub use errors::RenderError;
pub use fonts::{FontBook, TextMeasure};
pub use render_list::*;
