#[derive(Debug, thiserror::Error)]
pub enum GenError {
    /// Local back-off: the caller should re-roll at its own level.
    #[error("generation needs a re-roll")]
    TryAgain,

    /// The retry budget for this production was exhausted.
    #[error("retry budget exhausted while generating {production}")]
    Exhausted { production: &'static str },

    #[error(transparent)]
    Catalog(#[from] isofuzz_catalog::CatalogError),
}
