//! Stored evaluations: per employee/period inputs plus the latest engine output.

pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use repository::{
    EvaluationRecord, EvaluationRepository, EvaluationStatus, EvaluationView,
    MemoryEvaluationRepository, RepositoryError,
};
pub use router::{records_router, StatsUpload};
pub use service::{EvaluationService, RecordServiceError};
