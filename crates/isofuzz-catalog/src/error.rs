use smol_str::SmolStr;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("type `{ty}` referenced by `{referrer}` is not registered")]
    UnresolvedType { ty: SmolStr, referrer: SmolStr },

    #[error("table `{0}` registered twice")]
    DuplicateTable(SmolStr),

    #[error("type `{0}` registered twice")]
    DuplicateType(SmolStr),
}
