//! Staged canary rollout gate for DPC policy-enforcement versions.
//!
//! Four ordered stages, advanced one at a time by an external caller who
//! supplies the observed error rate and heartbeat loss rate for the
//! current stage. A breach of either threshold rolls the rollout back
//! and terminates it; reaching the end of the stage list completes it.

use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Stage {
    pub name: &'static str,
    pub percent: u8,
    pub observation_hours: u32,
}

pub const STAGES: [Stage; 4] = [
    Stage {
        name: "CANARY",
        percent: 1,
        observation_hours: 24,
    },
    Stage {
        name: "STAGED",
        percent: 10,
        observation_hours: 24,
    },
    Stage {
        name: "BROAD",
        percent: 50,
        observation_hours: 12,
    },
    Stage {
        name: "GA",
        percent: 100,
        observation_hours: 0,
    },
];

#[derive(Debug, Clone, Copy)]
pub struct CanaryThresholds {
    pub error_rate_threshold: f64,
    pub heartbeat_loss_threshold: f64,
}

impl Default for CanaryThresholds {
    fn default() -> Self {
        Self {
            error_rate_threshold: 0.02,
            heartbeat_loss_threshold: 0.05,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StageSnapshot {
    pub active: bool,
    pub version: Option<String>,
    pub stage: &'static str,
    pub percent: u8,
    pub observation_hours: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationResult {
    NoActiveRollout,
    RolledBack { reason: String },
    Promoted { stage: &'static str, percent: u8 },
    GaComplete,
}

/// Process-wide canary rollout gate; one rollout is in flight at a time.
pub struct CanaryController {
    thresholds: CanaryThresholds,
    active: bool,
    version: Option<String>,
    stage_index: usize,
}

impl CanaryController {
    pub fn new(thresholds: CanaryThresholds) -> Self {
        Self {
            thresholds,
            active: false,
            version: None,
            stage_index: 0,
        }
    }

    pub fn start_rollout(&mut self, version: String) -> StageSnapshot {
        self.active = true;
        self.version = Some(version);
        self.stage_index = 0;
        self.snapshot()
    }

    pub fn evaluate_and_advance(
        &mut self,
        error_rate: f64,
        heartbeat_loss_rate: f64,
    ) -> EvaluationResult {
        if !self.active {
            return EvaluationResult::NoActiveRollout;
        }

        if error_rate >= self.thresholds.error_rate_threshold {
            self.active = false;
            return EvaluationResult::RolledBack {
                reason: format!(
                    "error rate {error_rate:.4} at or above threshold {:.4}",
                    self.thresholds.error_rate_threshold
                ),
            };
        }

        if heartbeat_loss_rate >= self.thresholds.heartbeat_loss_threshold {
            self.active = false;
            return EvaluationResult::RolledBack {
                reason: format!(
                    "heartbeat loss rate {heartbeat_loss_rate:.4} at or above threshold {:.4}",
                    self.thresholds.heartbeat_loss_threshold
                ),
            };
        }

        if self.stage_index < STAGES.len() - 1 {
            self.stage_index += 1;
            let stage = STAGES[self.stage_index];
            EvaluationResult::Promoted {
                stage: stage.name,
                percent: stage.percent,
            }
        } else {
            self.active = false;
            EvaluationResult::GaComplete
        }
    }

    pub fn current_status(&self) -> StageSnapshot {
        self.snapshot()
    }

    fn snapshot(&self) -> StageSnapshot {
        let stage = STAGES[self.stage_index];
        StageSnapshot {
            active: self.active,
            version: self.version.clone(),
            stage: stage.name,
            percent: stage.percent,
            observation_hours: stage.observation_hours,
        }
    }
}

impl Default for CanaryController {
    fn default() -> Self {
        Self::new(CanaryThresholds::default())
    }
}
