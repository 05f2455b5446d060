//! The estimation service: cache check, model path with heuristic
//! fallback, policy pipeline, confidence scoring, learning adjustment,
//! history recording, cache store.
//!
//! Owned collaborators are injected once at construction; there is no
//! module-level state, so lifecycle and test isolation stay controllable.

use rust_decimal::Decimal;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cache::EstimateCache;
use crate::confidence::ConfidenceCalculator;
use crate::domain::estimate::{Estimate, EstimationMethod};
use crate::domain::request::EstimationRequest;
use crate::errors::{ApplicationError, DomainError};
use crate::gateway::ModelGateway;
use crate::learning::{AccuracyStats, ComplexityAdjustments, HistoryStore, LearningSystem};
use crate::parser::ResponseParser;
use crate::phases::PhaseAllocator;
use crate::policy::{adjustments, PolicyContext, PolicyPipeline};
use crate::prompt::PromptBuilder;
use crate::scoring::ComplexityScorer;

const FALLBACK_CONFIDENCE: u8 = 60;

pub struct Estimator<G, S> {
    scorer: ComplexityScorer,
    allocator: PhaseAllocator,
    prompt_builder: PromptBuilder,
    parser: ResponseParser,
    policy: PolicyPipeline,
    confidence: ConfidenceCalculator,
    cache: EstimateCache,
    learning: LearningSystem<S>,
    gateway: Option<G>,
}

impl<G: ModelGateway, S: HistoryStore> Estimator<G, S> {
    pub fn new(gateway: Option<G>, learning: LearningSystem<S>) -> Self {
        Self {
            scorer: ComplexityScorer::new(),
            allocator: PhaseAllocator::new(),
            prompt_builder: PromptBuilder::new(),
            parser: ResponseParser::new(),
            policy: PolicyPipeline::new(),
            confidence: ConfidenceCalculator::new(),
            cache: EstimateCache::new(),
            learning,
            gateway,
        }
    }

    pub fn learning(&self) -> &LearningSystem<S> {
        &self.learning
    }

    /// Drop all memoized estimates. Exists for test isolation.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub async fn estimate(
        &self,
        request: &EstimationRequest,
    ) -> Result<Estimate, ApplicationError> {
        if request.description.trim().is_empty() {
            return Err(DomainError::EmptyDescription.into());
        }

        let correlation_id = Uuid::new_v4().to_string();
        let cache_key = EstimateCache::key_for(request);
        if let Some(cached) = self.cache.get(&cache_key) {
            debug!(
                event_name = "estimator.cache_hit",
                correlation_id = %correlation_id,
                "returning memoized estimate"
            );
            return Ok(cached);
        }

        let estimate = match &self.gateway {
            Some(gateway) => match self.model_estimate(gateway, request, &correlation_id).await {
                Ok(estimate) => estimate,
                Err(ApplicationError::Gateway(reason)) => {
                    warn!(
                        event_name = "estimator.gateway_fallback",
                        correlation_id = %correlation_id,
                        reason = %reason,
                        "model gateway unavailable, using rule-based estimation"
                    );
                    self.heuristic_estimate(request)
                }
                Err(other) => return Err(other),
            },
            None => self.heuristic_estimate(request),
        };

        self.record_history(request, &estimate, &correlation_id).await;
        self.cache.store(cache_key, estimate.clone());

        info!(
            event_name = "estimator.completed",
            correlation_id = %correlation_id,
            method = estimate.method.as_str(),
            complexity = estimate.complexity.as_str(),
            total_hours = %estimate.total_hours,
            "estimation completed"
        );
        Ok(estimate)
    }

    async fn model_estimate(
        &self,
        gateway: &G,
        request: &EstimationRequest,
        correlation_id: &str,
    ) -> Result<Estimate, ApplicationError> {
        let prompt = self.prompt_builder.build(&request.description, request.ticket.as_ref());
        let reply = gateway
            .complete(&prompt)
            .await
            .map_err(|error| ApplicationError::Gateway(error.to_string()))?;

        let mut estimate = self.parser.parse(&reply);

        // A caller-supplied phase plan re-derives the breakdown from the
        // model's total before the policy stages run.
        if !request.phase_plan.is_default() {
            let allocation = self.allocator.allocate(estimate.total_hours, &request.phase_plan);
            estimate.phases = allocation.phases;
            estimate.total_hours = allocation.total_hours;
        }

        let adjustments_map = self.learned_adjustments(correlation_id).await;
        let ctx =
            PolicyContext { ticket: request.ticket.as_ref(), adjustments: &adjustments_map };

        let mut estimate = self.policy.apply(estimate, &ctx)?;
        estimate.confidence = self.confidence.calculate(&estimate, request.ticket.as_ref());

        // Learning adjustment is applied last, outside the capping
        // sequence, and only on the structured-parse success path.
        estimate = adjustments::apply_learning(estimate, &ctx);
        estimate.validate().map_err(ApplicationError::from)?;

        Ok(estimate)
    }

    fn heuristic_estimate(&self, request: &EstimationRequest) -> Estimate {
        let scored = self.scorer.score(&request.description, request.ticket.as_ref());
        let allocation = self.allocator.allocate(scored.base_hours, &request.phase_plan);

        Estimate {
            total_hours: allocation.total_hours,
            complexity: scored.complexity,
            confidence: FALLBACK_CONFIDENCE,
            reasoning: format!("Rule-based fallback estimation: {}.", scored.note),
            risk_factors: Vec::new(),
            phases: allocation.phases,
            method: EstimationMethod::RuleBasedFallback,
        }
    }

    /// Learned factors are advisory: a store failure degrades to "no
    /// adjustments" instead of failing the estimation.
    async fn learned_adjustments(&self, correlation_id: &str) -> ComplexityAdjustments {
        match self.learning.complexity_adjustments().await {
            Ok(adjustments) => adjustments,
            Err(error) => {
                warn!(
                    event_name = "estimator.learning_degraded",
                    correlation_id = %correlation_id,
                    error = %error,
                    "history store unavailable, skipping learned adjustments"
                );
                ComplexityAdjustments::default()
            }
        }
    }

    /// History persistence must never abort the estimation response; a
    /// failed write is reported as a degraded-mode warning.
    async fn record_history(
        &self,
        request: &EstimationRequest,
        estimate: &Estimate,
        correlation_id: &str,
    ) {
        let ticket_id = request
            .ticket
            .as_ref()
            .and_then(|ticket| ticket.key.as_ref())
            .map(|key| key.0.clone())
            .unwrap_or_else(|| "unspecified".to_string());

        if let Err(error) = self
            .learning
            .record_estimation(&ticket_id, &request.description, estimate, None)
            .await
        {
            warn!(
                event_name = "estimator.history_degraded",
                correlation_id = %correlation_id,
                error = %error,
                "failed to persist history record, estimate still returned"
            );
        }
    }

    pub async fn record_actual(
        &self,
        ticket: &str,
        actual_hours: Decimal,
    ) -> Result<bool, ApplicationError> {
        if actual_hours <= Decimal::ZERO {
            return Err(DomainError::InvalidActualHours(actual_hours.to_string()).into());
        }

        self.learning
            .update_actual_hours(ticket, actual_hours)
            .await
            .map_err(|error| ApplicationError::Persistence(error.to_string()))
    }

    pub async fn accuracy_stats(&self) -> Result<AccuracyStats, ApplicationError> {
        self.learning
            .accuracy_stats()
            .await
            .map_err(|error| ApplicationError::Persistence(error.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use rust_decimal::Decimal;

    use crate::domain::estimate::{Complexity, EstimationMethod, Phase};
    use crate::domain::history::HistoryRecord;
    use crate::domain::request::EstimationRequest;
    use crate::domain::ticket::{TicketId, TicketSnapshot};
    use crate::errors::{ApplicationError, DomainError};
    use crate::gateway::{GatewayError, ModelGateway};
    use crate::learning::{HistoryStore, HistoryStoreError, LearningSystem};

    use super::Estimator;

    struct CannedGateway {
        reply: Result<String, GatewayError>,
    }

    #[async_trait]
    impl ModelGateway for CannedGateway {
        async fn complete(&self, _prompt: &str) -> Result<String, GatewayError> {
            self.reply.clone()
        }
    }

    #[derive(Default)]
    struct VecHistoryStore {
        records: Mutex<Vec<HistoryRecord>>,
    }

    #[async_trait]
    impl HistoryStore for VecHistoryStore {
        async fn append(&self, record: HistoryRecord) -> Result<(), HistoryStoreError> {
            self.records.lock().expect("store lock").push(record);
            Ok(())
        }

        async fn update_most_recent(
            &self,
            ticket: &str,
            actual_hours: Decimal,
        ) -> Result<bool, HistoryStoreError> {
            let mut records = self.records.lock().expect("store lock");
            for record in records.iter_mut().rev() {
                if record.ticket == ticket {
                    record.record_actual(actual_hours);
                    return Ok(true);
                }
            }
            Ok(false)
        }

        async fn load_all(&self) -> Result<Vec<HistoryRecord>, HistoryStoreError> {
            Ok(self.records.lock().expect("store lock").clone())
        }
    }

    fn model_reply(total: u32, complexity: &str) -> String {
        format!(
            r#"{{
                "total_hours": {total},
                "complexity": "{complexity}",
                "confidence": 82,
                "reasoning": "structured model estimate",
                "risk_factors": [],
                "phases": {{
                    "requirements": {req},
                    "design": {design},
                    "development": {dev},
                    "testing": {test},
                    "deployment": {deploy}
                }}
            }}"#,
            req = total as f64 * 0.15,
            design = total as f64 * 0.20,
            dev = total as f64 * 0.48,
            test = total as f64 * 0.15,
            deploy = total as f64 * 0.02,
        )
    }

    fn estimator_with_reply(
        reply: Result<String, GatewayError>,
    ) -> Estimator<CannedGateway, VecHistoryStore> {
        Estimator::new(
            Some(CannedGateway { reply }),
            LearningSystem::new(VecHistoryStore::default()),
        )
    }

    fn no_model_estimator() -> Estimator<CannedGateway, VecHistoryStore> {
        Estimator::new(None, LearningSystem::new(VecHistoryStore::default()))
    }

    #[tokio::test]
    async fn empty_description_is_a_validation_error() {
        let estimator = no_model_estimator();
        let error = estimator
            .estimate(&EstimationRequest::new("   "))
            .await
            .expect_err("empty description rejected");

        assert_eq!(error, ApplicationError::Domain(DomainError::EmptyDescription));
    }

    #[tokio::test]
    async fn model_path_runs_policy_and_confidence() {
        let estimator = estimator_with_reply(Ok(model_reply(100, "Medium")));
        let estimate = estimator
            .estimate(&EstimationRequest::new("Extend the invoicing service"))
            .await
            .expect("model path succeeds");

        assert_eq!(estimate.method, EstimationMethod::AiPowered);
        assert_eq!(estimate.total_hours, Decimal::from(100));
        // Confidence comes from the calculator, not the model's 82.
        assert!((90..=95).contains(&estimate.confidence));
        estimate.validate().expect("invariant holds");
    }

    #[tokio::test]
    async fn gateway_failure_falls_back_to_heuristics() {
        let estimator = estimator_with_reply(Err(GatewayError::Timeout { timeout_secs: 30 }));
        let estimate = estimator
            .estimate(&EstimationRequest::new(
                "Create a simple login form with username and password",
            ))
            .await
            .expect("fallback succeeds");

        assert_eq!(estimate.method, EstimationMethod::RuleBasedFallback);
        assert_eq!(estimate.complexity, Complexity::Low);
        assert_eq!(estimate.total_hours, Decimal::from(40));
        assert_eq!(estimate.confidence, 60);
    }

    #[tokio::test]
    async fn heuristic_path_preserves_the_upgrade_override() {
        let estimator = no_model_estimator();
        let estimate = estimator
            .estimate(&EstimationRequest::new(
                "Upgrade React Native from 0.76 to 0.79 with Objective-C to Swift migration \
                 of the payment module",
            ))
            .await
            .expect("heuristic path succeeds");

        assert_eq!(estimate.complexity, Complexity::High);
        assert_eq!(estimate.total_hours, Decimal::from(300));
    }

    #[tokio::test]
    async fn identical_requests_hit_the_cache_byte_for_byte() {
        let estimator = estimator_with_reply(Ok(model_reply(100, "Medium")));
        let request = EstimationRequest::new("Extend the invoicing service");

        let first = estimator.estimate(&request).await.expect("first call");
        let second = estimator.estimate(&request).await.expect("second call");
        assert_eq!(first, second);

        // Only the first call recorded history; the second was a pure
        // cache hit.
        let records =
            estimator.learning().store().records.lock().expect("store lock").clone();
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn security_ticket_is_capped_through_the_model_path() {
        let estimator = estimator_with_reply(Ok(model_reply(200, "High")));
        let ticket = TicketSnapshot {
            key: Some(TicketId("SEC-9".to_string())),
            summary: "BlackDuck CVE remediation".to_string(),
            ..TicketSnapshot::default()
        };
        let request = EstimationRequest::new("Remediate reported issues").with_ticket(ticket);

        let estimate = estimator.estimate(&request).await.expect("model path succeeds");
        assert_eq!(estimate.total_hours, Decimal::from(32));
        assert_eq!(estimate.complexity, Complexity::Low);
        assert_eq!(estimate.phases.get(&Phase::Development), Some(Decimal::from(24)));
    }

    #[tokio::test]
    async fn actual_hours_round_trip_updates_history() {
        let estimator = estimator_with_reply(Ok(model_reply(100, "Medium")));
        let ticket = TicketSnapshot {
            key: Some(TicketId("PROJ-7".to_string())),
            summary: "Invoicing".to_string(),
            ..TicketSnapshot::default()
        };
        let request = EstimationRequest::new("Extend the invoicing service").with_ticket(ticket);
        estimator.estimate(&request).await.expect("estimate recorded");

        let updated =
            estimator.record_actual("PROJ-7", Decimal::from(90)).await.expect("update works");
        assert!(updated);

        let missing =
            estimator.record_actual("PROJ-404", Decimal::from(10)).await.expect("lookup works");
        assert!(!missing);

        let rejected = estimator.record_actual("PROJ-7", Decimal::ZERO).await;
        assert!(matches!(rejected, Err(ApplicationError::Domain(_))));
    }
}
