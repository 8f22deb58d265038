//! Interactive prompts.
//!
//! The engines never talk to a terminal directly: anything that needs an
//! answer goes through the [`Prompter`] trait and gets its result back by
//! value. [`prompt::TermPrompter`] is the stdin/stdout implementation the
//! binary wires in; tests script their own.

pub mod prompt;

use crate::error::Result;

/// One selectable option: a stable value plus its display label.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectOption {
    /// Returned to the caller when chosen.
    pub value: String,
    /// Shown to the user.
    pub label: String,
    /// Secondary description, e.g. `feature` vs `state`.
    pub detail: String,
}

impl SelectOption {
    /// Build an option whose value doubles as its label.
    #[must_use]
    pub fn new(value: impl Into<String>, label: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
            detail: detail.into(),
        }
    }
}

/// Blocking question-and-answer surface.
///
/// Every method returns by value; user cancellation surfaces as
/// [`crate::error::VaryError::Cancelled`].
pub trait Prompter {
    /// Yes/no question.
    fn confirm(&mut self, message: &str) -> Result<bool>;

    /// Pick one option; returns the chosen option's value.
    fn select(&mut self, title: &str, options: &[SelectOption]) -> Result<String>;

    /// Free-text input validated by `validate` until it passes.
    fn input(
        &mut self,
        title: &str,
        validate: &dyn Fn(&str) -> std::result::Result<(), String>,
    ) -> Result<String>;
}
