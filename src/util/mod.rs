//! Language-support primitives the core state machine and router rely on.

pub mod exit;
pub mod handle_errors;
pub mod unique_function;

pub use exit::exit;
pub use handle_errors::{handle_errors, set_default_error_handler, Matcher};
pub use unique_function::UniqueFunction;
