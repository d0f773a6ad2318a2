//! Try-stack records for structured exception handling.

/// Which part of a TRY block the context is currently inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionHandlingState {
    /// Between TRY and the catch/finally handlers.
    Try,
    /// Inside the catch handler.
    Catch,
    /// Inside the finally handler.
    Finally,
}

/// One entry of a context's try-stack.
///
/// Offsets reference instruction boundaries within the owning script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TryContext {
    /// Target of the catch handler, if declared.
    pub catch_position: Option<usize>,
    /// Target of the finally handler, if declared.
    pub finally_position: Option<usize>,
    /// Where ENDFINALLY resumes; set by ENDTRY.
    pub end_position: usize,
    /// Current handler state.
    pub state: ExceptionHandlingState,
}

impl TryContext {
    /// Creates a record for a TRY with the given handler targets.
    pub fn new(catch_position: Option<usize>, finally_position: Option<usize>) -> Self {
        Self {
            catch_position,
            finally_position,
            end_position: 0,
            state: ExceptionHandlingState::Try,
        }
    }

    /// True when a finally handler is declared.
    pub fn has_finally(&self) -> bool {
        self.finally_position.is_some()
    }
}
