// ─────────────────────────────────────────────────────────────────────
// Deadman Kernel — Pipeline
// ─────────────────────────────────────────────────────────────────────
//! Composes classifier, intent core, safety gate, and execution
//! adapter under a fixed per-event order:
//!
//!   1. Record the agent event; fold it into the fingerprint.
//!   2. Classify activity (fault => defensive RUNAWAY state).
//!   3. Derive intent (fault => zero-confidence PAUSE).
//!   4. Gate the intent (fault => rejecting decision, no veto tag);
//!      account the event against the budget window.
//!   5. Execute only when allowed; otherwise synthesize BLOCKED.
//!   6. Fold intent, decision, and result; flush buffered ERROR
//!      records; return the tuple.

use std::sync::Arc;

use deadman_types::{
    ActivityMode, ActivityState, AgentEvent, Clock, ExecutionResult, HealthState, Intensity,
    Intent, IntentDecision, KernelConfig, KernelResult, SafetyDecision, SystemEvent,
};

use deadman_core::{ActivityClassifier, ActivityEngine, IntentCore, SafetyGate};

use crate::adapter::ExecutionAdapter;
use crate::fingerprint::Fingerprint;
use crate::sink::TelemetrySink;

/// Everything one event produced, in stage order.
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub state: ActivityState,
    pub intent: IntentDecision,
    pub decision: SafetyDecision,
    pub result: ExecutionResult,
}

/// Result of a batch run: the telemetry log and the session fingerprint.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub telemetry: Vec<SystemEvent>,
    pub fingerprint: String,
}

/// The synchronous decision pipeline. One instance per agent session;
/// must not be entered re-entrantly.
pub struct Pipeline {
    config: KernelConfig,
    clock: Arc<dyn Clock>,
    engine: Box<dyn ActivityEngine>,
    intent_core: IntentCore,
    gate: SafetyGate,
    adapter: Box<dyn ExecutionAdapter>,
    sink: Option<Arc<dyn TelemetrySink>>,
    log: Vec<SystemEvent>,
    fingerprint: Fingerprint,
    previous_state: Option<ActivityState>,
    previous_health: HealthState,
}

impl Pipeline {
    pub fn new(
        config: KernelConfig,
        clock: Arc<dyn Clock>,
        adapter: Box<dyn ExecutionAdapter>,
    ) -> KernelResult<Self> {
        config.validate()?;
        let engine = Box::new(ActivityClassifier::new(config.clone(), Arc::clone(&clock)));
        let intent_core = IntentCore::new(config.clone(), Arc::clone(&clock));
        let gate = SafetyGate::new(config.clone(), Arc::clone(&clock));
        Ok(Self {
            config,
            clock,
            engine,
            intent_core,
            gate,
            adapter,
            sink: None,
            log: Vec::new(),
            fingerprint: Fingerprint::new(),
            previous_state: None,
            previous_health: HealthState::pristine(),
        })
    }

    /// Substitute the activity engine (test seam for fault injection).
    pub fn with_engine(mut self, engine: Box<dyn ActivityEngine>) -> Self {
        self.engine = engine;
        self
    }

    /// Attach a downstream telemetry sink.
    pub fn with_sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Run one event through all four stages.
    ///
    /// Stage faults degrade defensively and the loop continues; an
    /// `Err` here is an orchestration fault the caller must decide on.
    pub fn process(&mut self, event: &AgentEvent) -> KernelResult<ProcessOutcome> {
        let now_ms = self.clock.now_ms();
        let mut errors: Vec<SystemEvent> = Vec::new();

        self.emit(SystemEvent::AgentEvent {
            event: event.clone(),
        });
        self.fingerprint.fold("event", event)?;

        // Stage 2: classify. A faulting engine forces the most
        // defensive state so the gate stops the agent.
        let state = match self.engine.process(event) {
            Ok(state) => state,
            Err(err) => {
                log::error!("activity engine failed, forcing RUNAWAY: {err}");
                errors.push(SystemEvent::Error {
                    component: "ActivityEngine".to_string(),
                    error: err.to_string(),
                });
                ActivityState::new(
                    Intensity::High,
                    ActivityMode::Runaway,
                    format!("activity engine failure: {err}"),
                    now_ms,
                )?
            }
        };
        let state_change = match &self.previous_state {
            Some(previous)
                if previous.mode != state.mode || previous.intensity != state.intensity =>
            {
                Some(SystemEvent::StateChange {
                    previous: previous.clone(),
                    current: state.clone(),
                })
            }
            _ => None,
        };
        if let Some(record) = state_change {
            self.emit(record);
        }
        self.previous_state = Some(state.clone());

        // Stage 3: intent. A fault degrades to a zero-confidence PAUSE,
        // which the gate rejects on its confidence floor.
        self.intent_core.update(event);
        let intent = match self.intent_core.decide(&state) {
            Ok(intent) => intent,
            Err(err) => {
                log::error!("intent core failed, degrading to PAUSE: {err}");
                errors.push(SystemEvent::Error {
                    component: "IntentCore".to_string(),
                    error: err.to_string(),
                });
                IntentDecision::new(
                    Intent::Pause,
                    0.0,
                    format!("intent core failure: {err}"),
                    now_ms,
                )?
            }
        };

        // Stage 4: gate, then account the event.
        let decision = match self.gate.evaluate(&intent, &state) {
            Ok(decision) => decision,
            Err(err) => {
                log::error!("safety gate failed, rejecting: {err}");
                errors.push(SystemEvent::Error {
                    component: "SafetyGate".to_string(),
                    error: err.to_string(),
                });
                SafetyDecision {
                    allowed: false,
                    remaining_budget: 0,
                    reason: format!("SafetyGate error: {err}"),
                    veto: None,
                    timestamp_ms: now_ms,
                }
            }
        };
        self.gate.record_event(event.token_count, event.tool_calls);
        self.emit(SystemEvent::Intent {
            intent: intent.clone(),
            decision: decision.clone(),
        });

        // Stage 5: execution invariant. The adapter is only reachable
        // through an allowed decision.
        let result = if !decision.allowed {
            ExecutionResult::blocked(now_ms)
        } else {
            match self.adapter.execute(&decision) {
                Ok(result) => result,
                Err(err) => {
                    log::error!("execution adapter failed: {err}");
                    errors.push(SystemEvent::Error {
                        component: "ExecutionAdapter".to_string(),
                        error: err.to_string(),
                    });
                    ExecutionResult::failed(now_ms)
                }
            }
        };
        self.emit(SystemEvent::Execution {
            result: result.clone(),
        });

        self.fingerprint.fold("intent", &intent)?;
        self.fingerprint.fold("decision", &decision)?;
        self.fingerprint.fold("result", &result)?;

        self.observe_health();
        for error in errors {
            self.emit(error);
        }

        Ok(ProcessOutcome {
            state,
            intent,
            decision,
            result,
        })
    }

    /// Process a batch in order and report the collected telemetry
    /// plus the final session fingerprint.
    pub fn run(&mut self, events: &[AgentEvent]) -> KernelResult<RunReport> {
        for event in events {
            self.process(event)?;
        }
        Ok(RunReport {
            telemetry: self.log.clone(),
            fingerprint: self.fingerprint.hex(),
        })
    }

    /// Host feedback: fold an execution outcome into the gate's health
    /// accounting. Never called from `process` itself.
    pub fn record_execution_result(
        &mut self,
        result: &ExecutionResult,
        preceding: &SafetyDecision,
    ) {
        self.gate.record_execution_result(result, preceding);
        self.observe_health();
    }

    /// One health recovery step, host-driven.
    pub fn tick_recovery(&mut self) {
        self.gate.tick_recovery();
        self.observe_health();
    }

    /// Reset every component and start a fresh fingerprint.
    pub fn reset(&mut self) {
        self.engine.reset();
        self.intent_core.reset();
        self.gate.reset();
        self.fingerprint = Fingerprint::new();
        self.log.clear();
        self.previous_state = None;
        self.previous_health = HealthState::pristine();
    }

    pub fn health(&self) -> &HealthState {
        self.gate.health()
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn fingerprint_hex(&self) -> String {
        self.fingerprint.hex()
    }

    pub fn telemetry(&self) -> &[SystemEvent] {
        &self.log
    }

    fn observe_health(&mut self) {
        let current = self.gate.health().clone();
        if current.status != self.previous_health.status {
            self.emit(SystemEvent::HealthChange {
                previous: self.previous_health.clone(),
                current: current.clone(),
            });
        }
        self.previous_health = current;
    }

    /// Telemetry is strictly downstream: a sink failure is logged and
    /// swallowed, never allowed to abort the decision loop.
    fn emit(&mut self, event: SystemEvent) {
        if let Some(sink) = &self.sink {
            if let Err(err) = sink.record(&event) {
                log::warn!("telemetry sink failed: {err}");
            }
        }
        self.log.push(event);
    }
}
