pub mod cache;
pub mod confidence;
pub mod config;
pub mod domain;
pub mod errors;
pub mod estimator;
pub mod gateway;
pub mod learning;
pub mod parser;
pub mod phases;
pub mod policy;
pub mod prompt;
pub mod scoring;

pub use cache::EstimateCache;
pub use confidence::ConfidenceCalculator;
pub use domain::estimate::{
    round_hours, Complexity, Estimate, EstimationMethod, Phase, PhaseBreakdown, STANDARD_PHASES,
};
pub use domain::history::HistoryRecord;
pub use domain::request::{EstimationRequest, PhasePlan};
pub use domain::ticket::{
    Comment, FixVersion, LinkedIssue, StatusChange, TicketId, TicketSnapshot, TimeTracking,
};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use estimator::Estimator;
pub use gateway::{GatewayError, ModelGateway};
pub use learning::{
    AccuracyStats, ComplexityAdjustments, HistoryStore, HistoryStoreError, ImprovedEstimate,
    LearningSystem,
};
pub use parser::ResponseParser;
pub use phases::{Allocation, PhaseAllocator};
pub use policy::{PolicyContext, PolicyPipeline};
pub use prompt::PromptBuilder;
pub use scoring::{ComplexityScorer, ScoredComplexity};
