use crate::error::ErrorVerbosity;

pub trait StateProvider {
    /// Returns the error verbosity.
    fn error_verbosity(&self) -> ErrorVerbosity;
}
