//! Intake state machine: name → contact → resume.
//!
//! Progresses linearly: Idle → CollectingName → CollectingContact →
//! CollectingResume → Idle. Collected values live inside the state variant,
//! so a contact can only exist alongside a name. `step` is pure; the caller
//! applies the returned state and acts on the outcome.

use std::fmt;

use serde::Serialize;

use super::record::Resume;
use crate::channels::Attachment;

/// The field an intake step is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Name,
    Contact,
    Resume,
}

impl Field {
    /// Prompt shown when the step is entered.
    pub fn prompt(&self) -> &'static str {
        match self {
            Field::Name => "Please enter your *full name*:",
            Field::Contact => {
                "Great! Now send a way to reach you (Telegram, WhatsApp or phone):"
            }
            Field::Resume => "Attach your resume (PDF or DOC file):",
        }
    }

    /// Prompt shown after rejected input.
    pub fn reprompt(&self) -> &'static str {
        match self {
            Field::Name => "Please send your full name as a text message:",
            Field::Contact => "Please send your contact details as a text message:",
            Field::Resume => {
                "Please attach your resume as a file, or describe your experience in a message:"
            }
        }
    }
}

/// Per-user intake state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum IntakeState {
    #[default]
    Idle,
    CollectingName,
    CollectingContact {
        name: String,
    },
    CollectingResume {
        name: String,
        contact: String,
    },
}

impl IntakeState {
    /// Whether an intake is in progress.
    pub fn is_collecting(&self) -> bool {
        !matches!(self, Self::Idle)
    }

    /// The field the current step expects, if any.
    pub fn awaiting(&self) -> Option<Field> {
        match self {
            Self::Idle => None,
            Self::CollectingName => Some(Field::Name),
            Self::CollectingContact { .. } => Some(Field::Contact),
            Self::CollectingResume { .. } => Some(Field::Resume),
        }
    }

    pub fn collected_name(&self) -> Option<&str> {
        match self {
            Self::CollectingContact { name } | Self::CollectingResume { name, .. } => Some(name),
            Self::Idle | Self::CollectingName => None,
        }
    }

    pub fn collected_contact(&self) -> Option<&str> {
        match self {
            Self::CollectingResume { contact, .. } => Some(contact),
            _ => None,
        }
    }

    /// Enter the first step. `None` when an intake is already running, so
    /// values collected so far are never overwritten by a second start.
    pub fn begin(&self) -> Option<IntakeState> {
        match self {
            Self::Idle => Some(Self::CollectingName),
            _ => None,
        }
    }
}

impl fmt::Display for IntakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::CollectingName => "collecting_name",
            Self::CollectingContact { .. } => "collecting_contact",
            Self::CollectingResume { .. } => "collecting_resume",
        };
        write!(f, "{s}")
    }
}

/// Input offered to the current intake step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeInput {
    Text(String),
    Attachment(Attachment),
    Command(String),
}

/// Collected values of a finished intake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedIntake {
    pub name: String,
    pub contact: String,
    pub resume: Resume,
}

/// What a step produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Input accepted; ask for the next field.
    Advanced(Field),
    /// Input rejected; ask for the same field again.
    Rejected(Field),
    /// All three fields collected.
    Completed(CompletedIntake),
    /// No intake is running.
    NotCollecting,
}

/// Result of a step: the state to store and what happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub next: IntakeState,
    pub outcome: StepOutcome,
}

impl Step {
    fn stay(state: &IntakeState, outcome: StepOutcome) -> Self {
        Self {
            next: state.clone(),
            outcome,
        }
    }
}

/// Non-empty trimmed text, or `None`.
fn field_value(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Apply one input to the current state.
pub fn step(state: &IntakeState, input: IntakeInput) -> Step {
    use IntakeState::*;

    match (state, input) {
        (Idle, _) => Step::stay(state, StepOutcome::NotCollecting),

        (CollectingName, IntakeInput::Text(text)) => match field_value(&text) {
            Some(name) => Step {
                next: CollectingContact { name },
                outcome: StepOutcome::Advanced(Field::Contact),
            },
            None => Step::stay(state, StepOutcome::Rejected(Field::Name)),
        },
        (CollectingName, IntakeInput::Attachment(_) | IntakeInput::Command(_)) => {
            Step::stay(state, StepOutcome::Rejected(Field::Name))
        }

        (CollectingContact { name }, IntakeInput::Text(text)) => match field_value(&text) {
            Some(contact) => Step {
                next: CollectingResume {
                    name: name.clone(),
                    contact,
                },
                outcome: StepOutcome::Advanced(Field::Resume),
            },
            None => Step::stay(state, StepOutcome::Rejected(Field::Contact)),
        },
        (CollectingContact { .. }, IntakeInput::Attachment(_) | IntakeInput::Command(_)) => {
            Step::stay(state, StepOutcome::Rejected(Field::Contact))
        }

        (CollectingResume { name, contact }, IntakeInput::Attachment(attachment)) => Step {
            next: Idle,
            outcome: StepOutcome::Completed(CompletedIntake {
                name: name.clone(),
                contact: contact.clone(),
                resume: Resume::Attachment(attachment),
            }),
        },
        (CollectingResume { name, contact }, IntakeInput::Text(text)) => {
            match field_value(&text) {
                Some(text) => Step {
                    next: Idle,
                    outcome: StepOutcome::Completed(CompletedIntake {
                        name: name.clone(),
                        contact: contact.clone(),
                        resume: Resume::Text { text },
                    }),
                },
                None => Step::stay(state, StepOutcome::Rejected(Field::Resume)),
            }
        }
        (CollectingResume { .. }, IntakeInput::Command(_)) => {
            Step::stay(state, StepOutcome::Rejected(Field::Resume))
        }
    }
}
