use std::mem;

use crate::catalog::{find_style, HairstyleOption};
use crate::imaging::UploadedImage;
use crate::llm::{ErrorKind, GenerationError};

const DEFAULT_FAILURE_MESSAGE: &str = "Failed to generate hairstyle. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Upload,
    SelectStyle,
    Processing,
    Result,
}

impl Step {
    pub fn as_str(self) -> &'static str {
        match self {
            Step::Upload => "UPLOAD",
            Step::SelectStyle => "SELECT_STYLE",
            Step::Processing => "PROCESSING",
            Step::Result => "RESULT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedResult {
    pub original: UploadedImage,
    pub result: UploadedImage,
    pub style_applied: String,
}

/// A failed attempt as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureNotice {
    pub message: String,
    pub kind: ErrorKind,
}

/// Session view state. Each variant carries exactly the fields its step
/// requires, so an image-less `Processing` cannot be constructed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum WorkflowState {
    #[default]
    Upload,
    SelectStyle {
        image: UploadedImage,
        selected_style_id: Option<String>,
        error: Option<FailureNotice>,
    },
    Processing {
        image: UploadedImage,
        selected_style_id: String,
        attempt: u64,
    },
    Result {
        image: UploadedImage,
        selected_style_id: String,
        result: GeneratedResult,
    },
}

impl WorkflowState {
    pub fn step(&self) -> Step {
        match self {
            WorkflowState::Upload => Step::Upload,
            WorkflowState::SelectStyle { .. } => Step::SelectStyle,
            WorkflowState::Processing { .. } => Step::Processing,
            WorkflowState::Result { .. } => Step::Result,
        }
    }

    pub fn uploaded_image(&self) -> Option<&UploadedImage> {
        match self {
            WorkflowState::Upload => None,
            WorkflowState::SelectStyle { image, .. }
            | WorkflowState::Processing { image, .. }
            | WorkflowState::Result { image, .. } => Some(image),
        }
    }

    pub fn selected_style_id(&self) -> Option<&str> {
        match self {
            WorkflowState::Upload => None,
            WorkflowState::SelectStyle {
                selected_style_id, ..
            } => selected_style_id.as_deref(),
            WorkflowState::Processing {
                selected_style_id, ..
            }
            | WorkflowState::Result {
                selected_style_id, ..
            } => Some(selected_style_id),
        }
    }

    pub fn selected_style(&self) -> Option<&'static HairstyleOption> {
        self.selected_style_id().and_then(find_style)
    }

    pub fn generated_result(&self) -> Option<&GeneratedResult> {
        match self {
            WorkflowState::Result { result, .. } => Some(result),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&FailureNotice> {
        match self {
            WorkflowState::SelectStyle { error, .. } => error.as_ref(),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        self.failure().map(|notice| notice.message.as_str())
    }

    /// Id of the in-flight generation, if any.
    pub fn attempt(&self) -> Option<u64> {
        match self {
            WorkflowState::Processing { attempt, .. } => Some(*attempt),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub enum WorkflowEvent {
    ImageSelected(UploadedImage),
    StyleChosen(String),
    ApplyRequested,
    GenerationSucceeded { attempt: u64, result: UploadedImage },
    GenerationFailed { attempt: u64, error: GenerationError },
    ResetRequested,
    TryAnotherRequested,
    ErrorDismissed,
}

/// Emitted when entering `Processing`; the caller runs the generation and
/// reports back with the same `attempt`.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub attempt: u64,
    pub image: UploadedImage,
    pub style: &'static HairstyleOption,
}

/// Owns the [`WorkflowState`]; [`Workflow::handle`] is the only way to change it.
#[derive(Debug, Default)]
pub struct Workflow {
    state: WorkflowState,
    last_attempt: u64,
}

impl Workflow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    /// Applies `event`. Events that are not valid for the current step, fail
    /// their guard, or refer to an abandoned attempt leave the state untouched.
    pub fn handle(&mut self, event: WorkflowEvent) -> Option<GenerationRequest> {
        let current = mem::take(&mut self.state);
        let (next, request) = self.transition(current, event);
        self.state = next;
        request
    }

    fn transition(
        &mut self,
        state: WorkflowState,
        event: WorkflowEvent,
    ) -> (WorkflowState, Option<GenerationRequest>) {
        use WorkflowEvent as E;
        use WorkflowState as S;

        match (state, event) {
            (S::Upload, E::ImageSelected(image)) if !image.is_empty() => (
                S::SelectStyle {
                    image,
                    selected_style_id: None,
                    error: None,
                },
                None,
            ),

            (
                S::SelectStyle {
                    image,
                    selected_style_id,
                    error,
                },
                E::StyleChosen(id),
            ) => {
                let selected_style_id = match find_style(&id) {
                    Some(style) => Some(style.id.to_string()),
                    None => selected_style_id,
                };
                (
                    S::SelectStyle {
                        image,
                        selected_style_id,
                        error,
                    },
                    None,
                )
            }

            (
                S::SelectStyle {
                    image,
                    selected_style_id: Some(id),
                    error,
                },
                E::ApplyRequested,
            ) => match find_style(&id) {
                Some(style) => {
                    self.last_attempt += 1;
                    let attempt = self.last_attempt;
                    let request = GenerationRequest {
                        attempt,
                        image: image.clone(),
                        style,
                    };
                    (
                        S::Processing {
                            image,
                            selected_style_id: id,
                            attempt,
                        },
                        Some(request),
                    )
                }
                None => (
                    S::SelectStyle {
                        image,
                        selected_style_id: Some(id),
                        error,
                    },
                    None,
                ),
            },

            (
                S::Processing {
                    image,
                    selected_style_id,
                    attempt,
                },
                E::GenerationSucceeded {
                    attempt: finished,
                    result,
                },
            ) if finished == attempt => {
                let style_applied = find_style(&selected_style_id)
                    .map(|style| style.name.to_string())
                    .unwrap_or_else(|| selected_style_id.clone());
                let result = GeneratedResult {
                    original: image.clone(),
                    result,
                    style_applied,
                };
                (
                    S::Result {
                        image,
                        selected_style_id,
                        result,
                    },
                    None,
                )
            }

            (
                S::Processing {
                    image,
                    selected_style_id,
                    attempt,
                },
                E::GenerationFailed {
                    attempt: finished,
                    error,
                },
            ) if finished == attempt => {
                let mut message = error.to_string();
                if message.trim().is_empty() {
                    message = DEFAULT_FAILURE_MESSAGE.to_string();
                }
                (
                    S::SelectStyle {
                        image,
                        selected_style_id: Some(selected_style_id),
                        error: Some(FailureNotice {
                            message,
                            kind: error.kind(),
                        }),
                    },
                    None,
                )
            }

            (
                S::SelectStyle { .. } | S::Processing { .. } | S::Result { .. },
                E::ResetRequested,
            ) => (S::Upload, None),

            (
                S::Result {
                    image,
                    selected_style_id,
                    ..
                },
                E::TryAnotherRequested,
            ) => (
                S::SelectStyle {
                    image,
                    selected_style_id: Some(selected_style_id),
                    error: None,
                },
                None,
            ),

            (
                S::SelectStyle {
                    image,
                    selected_style_id,
                    ..
                },
                E::ErrorDismissed,
            ) => (
                S::SelectStyle {
                    image,
                    selected_style_id,
                    error: None,
                },
                None,
            ),

            (state, _) => (state, None),
        }
    }
}
