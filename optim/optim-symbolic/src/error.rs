//! Error types for symbolic construction and evaluation.

use thiserror::Error;

/// Errors that can occur while building or evaluating symbolic functions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SymbolicError {
    /// A function input contains something other than a bare symbol.
    #[error("function {function}: input {input} element {index} is not a symbol")]
    InputNotSymbolic {
        /// Function name.
        function: String,
        /// Input position.
        input: usize,
        /// Element position inside the input.
        index: usize,
    },

    /// The same symbol is used twice across a function's inputs.
    #[error("function {function}: symbol {name} appears more than once in the inputs")]
    DuplicateSymbol {
        /// Function name.
        function: String,
        /// Symbol name.
        name: String,
    },

    /// An output depends on a symbol that is not an input.
    #[error("function {function}: output depends on free symbol {name}")]
    FreeSymbol {
        /// Function name.
        function: String,
        /// Symbol name.
        name: String,
    },

    /// Wrong number of arguments.
    #[error("function {function}: expected {expected} arguments, got {actual}")]
    ArgumentCount {
        /// Function name.
        function: String,
        /// Expected count.
        expected: usize,
        /// Provided count.
        actual: usize,
    },

    /// Argument length does not match the input length.
    #[error("function {function}: argument {input} has length {actual}, expected {expected}")]
    ArgumentShape {
        /// Function name.
        function: String,
        /// Input position.
        input: usize,
        /// Expected length.
        expected: usize,
        /// Provided length.
        actual: usize,
    },

    /// Index or range outside a vector.
    #[error("index {index} out of range for vector of length {len}")]
    OutOfRange {
        /// Requested index (or range end).
        index: usize,
        /// Vector length.
        len: usize,
    },

    /// Differentiation requested on a graph that still contains calls.
    #[error("expression contains nested function calls; expand before differentiating")]
    NotExpanded,
}

/// Result type for symbolic operations.
pub type Result<T> = std::result::Result<T, SymbolicError>;
