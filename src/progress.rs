use crate::event::StreamEvent;
use serde::Serialize;

/// The progress of the step currently running upstream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressState {
    pub step: String,
    /// Percent complete as reported upstream (0-100, passed through unvalidated).
    pub progress: f64,
    pub message: String,
}

/// Folds lifecycle events into a single current-step `ProgressState`.
///
/// The tracker models exactly one running step. Progress events that omit the step name
/// are attributed to the step last announced by `step_start`; an upstream producer that
/// interleaves several steps cannot be represented (see `is_interleaved`).
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    state: Option<ProgressState>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> Option<&ProgressState> {
        self.state.as_ref()
    }

    /// Applies one event to the tracked state.
    pub fn apply(&mut self, event: &StreamEvent) {
        self.state = Self::reduce(self.state.as_ref(), event);
    }

    pub fn clear(&mut self) {
        self.state = None;
    }

    /// Computes the next state from the previous one. Pure.
    pub fn reduce(prev: Option<&ProgressState>, event: &StreamEvent) -> Option<ProgressState> {
        match event {
            StreamEvent::StepStart { step, message } => Some(ProgressState {
                step: step.clone(),
                progress: 0.0,
                message: message
                    .clone()
                    .unwrap_or_else(|| format!("Starting {}...", step)),
            }),
            StreamEvent::Progress {
                step,
                progress,
                message,
            } => {
                let step = prev
                    .map(|p| p.step.clone())
                    .or_else(|| step.clone())
                    .unwrap_or_default();
                let message = message
                    .clone()
                    .unwrap_or_else(|| format!("Processing {}... {}%", step, progress));
                Some(ProgressState {
                    step,
                    progress: *progress,
                    message,
                })
            }
            StreamEvent::StepComplete { step, .. } => Some(ProgressState {
                step: step.clone(),
                progress: 100.0,
                message: format!("{} completed", step),
            }),
            StreamEvent::WorkflowStart { .. }
            | StreamEvent::WorkflowComplete { .. }
            | StreamEvent::Unrecognized { .. } => prev.cloned(),
        }
    }

    /// True when a progress event names a step other than the one currently tracked.
    pub fn is_interleaved(prev: Option<&ProgressState>, event: &StreamEvent) -> bool {
        match (prev, event) {
            (
                Some(current),
                StreamEvent::Progress {
                    step: Some(step), ..
                },
            ) => *step != current.step,
            _ => false,
        }
    }
}
