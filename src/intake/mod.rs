//! Application intake: the ordered three-step flow and the record it produces.

pub mod record;
pub mod state;

pub use record::{Applicant, ApplicationRecord, Resume, TEXT_RESUME_LABEL};
pub use state::{CompletedIntake, Field, IntakeInput, IntakeState, Step, StepOutcome, step};
