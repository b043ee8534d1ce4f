use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::catalog::require_style;
use crate::error::{DecodeError, StyleNotFound};
use crate::imaging::UploadedImage;
use crate::llm::{GenerationError, HairstyleGenerator};
use crate::workflow::state::{GenerationRequest, Workflow, WorkflowEvent, WorkflowState};

struct SessionInner<G> {
    workflow: Mutex<Workflow>,
    snapshots: watch::Sender<WorkflowState>,
    generator: G,
}

impl<G> SessionInner<G> {
    fn dispatch(&self, event: WorkflowEvent) -> Option<GenerationRequest> {
        let outcome_attempt = match &event {
            WorkflowEvent::GenerationSucceeded { attempt, .. }
            | WorkflowEvent::GenerationFailed { attempt, .. } => Some(*attempt),
            _ => None,
        };
        let mut workflow = self.workflow.lock();
        let from = workflow.state().step();
        let request = workflow.handle(event);
        let state = workflow.state().clone();
        if state.step() != from {
            info!("Workflow {} -> {}", from.as_str(), state.step().as_str());
        }
        // Published under the lock so subscribers see transitions in order.
        let changed = self.snapshots.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
        if let Some(attempt) = outcome_attempt.filter(|_| !changed) {
            debug!("Discarding result of abandoned attempt {}", attempt);
        }
        request
    }
}

/// The single owner of a user's workflow state. Presentation code reads
/// snapshots and sends intents; generation runs on a background task.
pub struct Session<G> {
    inner: Arc<SessionInner<G>>,
}

impl<G> Clone for Session<G> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<G: HairstyleGenerator + 'static> Session<G> {
    pub fn new(generator: G) -> Self {
        let (snapshots, _) = watch::channel(WorkflowState::Upload);
        Self {
            inner: Arc::new(SessionInner {
                workflow: Mutex::new(Workflow::new()),
                snapshots,
                generator,
            }),
        }
    }

    pub fn snapshot(&self) -> WorkflowState {
        self.inner.workflow.lock().state().clone()
    }

    /// Receives every state change after subscription.
    pub fn subscribe(&self) -> watch::Receiver<WorkflowState> {
        self.inner.snapshots.subscribe()
    }

    /// Validates and stores the user's photo. Undecodable bytes are rejected
    /// here and never reach the state machine.
    pub fn select_image(&self, bytes: Vec<u8>) -> Result<(), DecodeError> {
        let image = UploadedImage::from_bytes(bytes)?;
        self.select_uploaded_image(image);
        Ok(())
    }

    pub fn select_uploaded_image(&self, image: UploadedImage) {
        self.inner.dispatch(WorkflowEvent::ImageSelected(image));
    }

    pub fn select_style(&self, id: &str) -> Result<(), StyleNotFound> {
        let style = require_style(id)?;
        self.inner
            .dispatch(WorkflowEvent::StyleChosen(style.id.to_string()));
        Ok(())
    }

    /// Starts a generation if an image and a style are selected. Returns the
    /// handle of the task that will deliver the outcome, or `None` when the
    /// request was not accepted.
    pub fn apply_generation(&self) -> Option<JoinHandle<()>> {
        let Some(request) = self.inner.dispatch(WorkflowEvent::ApplyRequested) else {
            debug!("Apply ignored: no image/style selected or not in SELECT_STYLE");
            return None;
        };

        let inner = Arc::clone(&self.inner);
        Some(tokio::spawn(async move {
            let attempt = request.attempt;
            let style_name = request.style.name;

            let worker_inner = Arc::clone(&inner);
            let worker = tokio::spawn(async move {
                worker_inner
                    .generator
                    .generate(
                        &request.image,
                        request.style.name,
                        request.style.description,
                    )
                    .await
            });

            let outcome = match worker.await {
                Ok(outcome) => outcome,
                Err(err) => {
                    error!("Generation task for {} aborted: {}", style_name, err);
                    Err(GenerationError::Upstream {
                        status: None,
                        message: "Generation was interrupted unexpectedly. Please try again."
                            .to_string(),
                    })
                }
            };

            let event = match outcome {
                Ok(result) => {
                    info!("Generated {} ({} bytes)", style_name, result.len());
                    WorkflowEvent::GenerationSucceeded { attempt, result }
                }
                Err(err) => {
                    warn!("Generation failed for {}: {}", style_name, err);
                    WorkflowEvent::GenerationFailed { attempt, error: err }
                }
            };

            inner.dispatch(event);
        }))
    }

    pub fn reset_to_upload(&self) {
        self.inner.dispatch(WorkflowEvent::ResetRequested);
    }

    pub fn try_another_style(&self) {
        self.inner.dispatch(WorkflowEvent::TryAnotherRequested);
    }

    pub fn dismiss_error(&self) {
        self.inner.dispatch(WorkflowEvent::ErrorDismissed);
    }
}
