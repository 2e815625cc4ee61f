use thiserror::Error;

pub(crate) type SyncResult<T> = Result<T, SyncError>;

/// Failures of a single poll item. None of these stop the process; the
/// poll loop logs them and moves on to the next session or tick.
#[derive(Debug, Error)]
pub(crate) enum SyncError {
    #[error("{service} request failed: {detail}")]
    Transport {
        service: &'static str,
        detail: String,
    },

    #[error("{service} returned an unexpected response: {detail}")]
    InvalidResponse {
        service: &'static str,
        detail: String,
    },

    #[error("no catalog series found for '{title}': {reason}")]
    LookupNotFound { title: String, reason: String },

    #[error("'{title}' matches {candidates} catalog series")]
    LookupAmbiguous { title: String, candidates: usize },

    #[error("invalid episode data for series {series_id}: {detail}")]
    InvalidCatalogData { series_id: i64, detail: String },
}

impl SyncError {
    /// Lookup failures mean "skip this session", not "something broke".
    pub(crate) fn is_lookup(&self) -> bool {
        matches!(
            self,
            Self::LookupNotFound { .. } | Self::LookupAmbiguous { .. }
        )
    }
}
