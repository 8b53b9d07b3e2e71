/// Errors surfaced by the pipeline components.
///
/// Persistence failures are recoverable everywhere they occur: the
/// predictor falls back to retraining and the collector skips the
/// affected record, so these variants are logged far more often than
/// they are propagated.
#[derive(Debug, thiserror::Error)]
pub enum TrafficError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("model artifact I/O error: {0}")]
    ArtifactIo(#[from] std::io::Error),

    #[error("model artifact format error: {0}")]
    ArtifactFormat(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}
