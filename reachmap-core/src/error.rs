use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("calculation resolution {calc} must be finer than bulk resolution {bulk}")]
    InvalidResolution { bulk: u8, calc: u8 },
    #[error("unsupported geometry: {0}")]
    UnsupportedGeometry(String),
    #[error("no routing edges found in region")]
    RegionEmpty,
    #[error("snapping timed out: {0}")]
    SnapTimeout(String),
    #[error("no starting points survived snapping")]
    NoStartsSurvived,
    #[error("archive I/O error: {0}")]
    ArchiveIo(#[from] std::io::Error),
    #[error("archive corrupt: {0}")]
    ArchiveCorrupt(String),
    #[error("cancellation requested")]
    CancelRequested,
    #[error("invalid data: {0}")]
    InvalidData(String),
    #[error("GeoJSON error: {0}")]
    GeoJsonError(String),
    #[error("H3 error: {0}")]
    H3Error(#[from] h3o::error::InvalidGeometry),
}

impl Error {
    /// Soft errors abort a single bulk cell but not the whole precompute run.
    pub fn is_per_bulk(&self) -> bool {
        matches!(
            self,
            Self::RegionEmpty | Self::SnapTimeout(_) | Self::NoStartsSurvived
        )
    }
}
