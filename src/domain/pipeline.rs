//! Per-tick orchestration of the four stages.
//!
//! Order within a tick: features, signals, risks (read from the broker's
//! holdings), execution. The pipeline owns every piece of state; the broker
//! is borrowed per tick.

use tracing::{debug, warn};

use crate::domain::bar::Tick;
use crate::domain::config::PipelineConfig;
use crate::domain::error::PipelineError;
use crate::domain::execution::{ExecutionCoordinator, ExecutionOutcome};
use crate::domain::feature_engine::FeatureEngine;
use crate::domain::feature_row::FeatureRow;
use crate::domain::risk::{RiskMonitor, RiskSignal};
use crate::domain::signal::{SignalGenerator, TradingSignal};
use crate::ports::broker_port::BrokerPort;
use crate::ports::feature_log_port::FeatureLogPort;
use crate::ports::notify_port::NotifyPort;
use crate::ports::scorer_port::ScorerPort;

/// What one tick produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Instruments whose snapshot was recomputed.
    pub refreshed: Vec<String>,
    pub signals: Vec<TradingSignal>,
    pub risks: Vec<RiskSignal>,
    pub outcomes: Vec<ExecutionOutcome>,
}

impl TickReport {
    pub fn orders(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, ExecutionOutcome::Submitted { .. }))
            .count()
    }
}

pub struct Pipeline {
    engine: FeatureEngine,
    generator: SignalGenerator,
    risk: RiskMonitor,
    coordinator: ExecutionCoordinator,
    feature_log: Option<Box<dyn FeatureLogPort>>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            engine: FeatureEngine::new(config.features),
            generator: SignalGenerator::new(config.signal),
            risk: RiskMonitor::new(config.risk),
            coordinator: ExecutionCoordinator::new(config.execution),
            feature_log: None,
        }
    }

    pub fn with_scorer(mut self, scorer: Box<dyn ScorerPort>) -> Self {
        self.generator = self.generator.with_scorer(scorer);
        self
    }

    pub fn with_notifier(mut self, notifier: Box<dyn NotifyPort>) -> Self {
        self.coordinator = self.coordinator.with_notifier(notifier);
        self
    }

    pub fn with_feature_log(mut self, log: Box<dyn FeatureLogPort>) -> Self {
        self.feature_log = Some(log);
        self
    }

    pub fn register(&mut self, instrument: &str) {
        self.engine.register(instrument);
    }

    pub fn engine(&self) -> &FeatureEngine {
        &self.engine
    }

    pub fn generator(&self) -> &SignalGenerator {
        &self.generator
    }

    pub fn coordinator(&self) -> &ExecutionCoordinator {
        &self.coordinator
    }

    /// Runs all four stages for one tick. Per-instrument failures are logged
    /// by the stage that hit them and never abort the tick.
    pub fn on_tick(&mut self, tick: &Tick, broker: &mut dyn BrokerPort) -> TickReport {
        let refreshed = self.engine.apply_tick(tick);
        let signals = self.generator.generate(tick, &self.engine);
        self.log_features(&signals);

        let risks = self.risk.check_risks(&broker.holdings());
        let outcomes = self.coordinator.execute(&signals, &risks, broker);
        debug!(
            timestamp = %tick.timestamp,
            refreshed = refreshed.len(),
            signals = signals.len(),
            risks = risks.len(),
            outcomes = outcomes.len(),
            "tick processed"
        );

        TickReport {
            refreshed,
            signals,
            risks,
            outcomes,
        }
    }

    /// Flushes the feature log, if any.
    pub fn finish(&mut self) -> Result<(), PipelineError> {
        match self.feature_log.as_mut() {
            Some(log) => log.flush(),
            None => Ok(()),
        }
    }

    fn log_features(&mut self, signals: &[TradingSignal]) {
        let Some(log) = self.feature_log.as_mut() else {
            return;
        };
        for signal in signals {
            let Some(snapshot) = self.engine.snapshot(&signal.instrument) else {
                continue;
            };
            let row = FeatureRow::new(signal, snapshot);
            if let Err(e) = log.append(&row) {
                warn!(instrument = %signal.instrument, error = %e, "feature row not written");
            }
        }
    }
}
