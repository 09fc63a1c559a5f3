#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Cannot allocate a {width}x{height} surface")]
    SurfaceAllocation { width: u32, height: u32 },

    #[error("Backend {0} used with a foreign surface")]
    ForeignSurface(&'static str),

    #[error("PNG encoding failed: {0}")]
    Encoding(#[from] png::EncodingError),

    #[error("Invalid board configuration: {0}")]
    Config(#[from] crate::render::board::BoardConfigError),
}
