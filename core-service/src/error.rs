use thiserror::Error;

/// Errors surfaced by [`MusicSession`](crate::MusicSession).
#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Runtime(#[from] core_runtime::Error),

    #[error("Catalog error: {0}")]
    Catalog(#[from] core_catalog::CatalogError),

    #[error("Playback error: {0}")]
    Playback(#[from] core_playback::PlaybackError),
}

pub type Result<T> = std::result::Result<T, CoreError>;
