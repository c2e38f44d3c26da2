//! Four-step token creation wizard

pub mod draft;
pub mod machine;
pub mod schema;

pub use draft::{DraftPatch, TokenDraft};
pub use machine::{WizardStateMachine, WizardStep};
