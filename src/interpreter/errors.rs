//! Control Flow Errors
//!
//! Error types used to implement script control flow:
//! - goto: jump to a label in the current script
//! - exit: leave the current script (`EXIT /B`) or the interpreter (`EXIT`)
//! - label not found, recursion limit, interruption: fatal to a batch run
//! - execution limits: runaway scripts
//!
//! All control flow errors carry stdout/stderr to accumulate output
//! as they propagate through the execution stack.

use std::fmt;

/// Base trait for control flow errors that carry stdout/stderr.
pub trait ControlFlowError: std::error::Error {
    fn stdout(&self) -> &str;
    fn stderr(&self) -> &str;
    fn stdout_mut(&mut self) -> &mut String;
    fn stderr_mut(&mut self) -> &mut String;

    /// Prepend output from the current context before re-throwing.
    fn prepend_output(&mut self, stdout: &str, stderr: &str) {
        let new_stdout = format!("{}{}", stdout, self.stdout());
        let new_stderr = format!("{}{}", stderr, self.stderr());
        *self.stdout_mut() = new_stdout;
        *self.stderr_mut() = new_stderr;
    }

    /// Remove and return the carried stdout/stderr.
    fn take_output(&mut self) -> (String, String) {
        let stdout = std::mem::take(self.stdout_mut());
        let stderr = std::mem::take(self.stderr_mut());
        (stdout, stderr)
    }
}

macro_rules! impl_control_flow_error {
    ($ty:ty) => {
        impl std::error::Error for $ty {}

        impl ControlFlowError for $ty {
            fn stdout(&self) -> &str { &self.stdout }
            fn stderr(&self) -> &str { &self.stderr }
            fn stdout_mut(&mut self) -> &mut String { &mut self.stdout }
            fn stderr_mut(&mut self) -> &mut String { &mut self.stderr }
        }
    };
}

/// Raised by `GOTO label`; the script runner moves the program counter.
#[derive(Debug, Clone)]
pub struct GotoError {
    pub label: String,
    pub stdout: String,
    pub stderr: String,
}

impl GotoError {
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into(), stdout: String::new(), stderr: String::new() }
    }

    /// `GOTO :EOF` returns from the current script or subroutine.
    pub fn is_eof(&self) -> bool {
        self.label.trim_start_matches(':').eq_ignore_ascii_case("EOF")
    }
}

impl fmt::Display for GotoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "goto {}", self.label)
    }
}

impl_control_flow_error!(GotoError);

/// Raised by `EXIT`. With `/B` only the current script context ends.
#[derive(Debug, Clone)]
pub struct ExitError {
    pub exit_code: i32,
    pub batch_only: bool,
    pub stdout: String,
    pub stderr: String,
}

impl ExitError {
    pub fn new(exit_code: i32, batch_only: bool) -> Self {
        Self { exit_code, batch_only, stdout: String::new(), stderr: String::new() }
    }
}

impl fmt::Display for ExitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "exit {}", self.exit_code)
    }
}

impl_control_flow_error!(ExitError);

/// `GOTO`/`CALL` named a label that does not exist.
#[derive(Debug, Clone)]
pub struct LabelNotFoundError {
    pub label: String,
    pub stdout: String,
    pub stderr: String,
}

impl LabelNotFoundError {
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into(), stdout: String::new(), stderr: String::new() }
    }

    pub fn message(&self) -> String {
        format!(
            "The system cannot find the batch label specified - {}\n",
            self.label.trim_start_matches(':')
        )
    }
}

impl fmt::Display for LabelNotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "label not found: {}", self.label)
    }
}

impl_control_flow_error!(LabelNotFoundError);

/// Nested `CALL`s exceeded the configured depth.
#[derive(Debug, Clone)]
pub struct RecursionLimitError {
    pub depth: usize,
    pub stdout: String,
    pub stderr: String,
}

impl RecursionLimitError {
    pub fn new(depth: usize) -> Self {
        Self { depth, stdout: String::new(), stderr: String::new() }
    }

    pub fn message(&self) -> String {
        format!(
            "****** B A T C H   R E C U R S I O N  exceeds STACK limits ******\nRecursion Count={}\n",
            self.depth
        )
    }
}

impl fmt::Display for RecursionLimitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "call depth limit exceeded ({})", self.depth)
    }
}

impl_control_flow_error!(RecursionLimitError);

/// The user pressed Ctrl-C while a batch script was running.
#[derive(Debug, Clone, Default)]
pub struct InterruptedError {
    pub stdout: String,
    pub stderr: String,
}

impl fmt::Display for InterruptedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "interrupted")
    }
}

impl_control_flow_error!(InterruptedError);

/// Type of execution limit that was exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitType {
    Commands,
}

/// Error thrown when execution limits are exceeded.
#[derive(Debug, Clone)]
pub struct ExecutionLimitError {
    pub message: String,
    pub limit_type: LimitType,
    pub stdout: String,
    pub stderr: String,
}

impl ExecutionLimitError {
    pub const EXIT_CODE: i32 = 126;

    pub fn new(message: impl Into<String>, limit_type: LimitType) -> Self {
        Self {
            message: message.into(),
            limit_type,
            stdout: String::new(),
            stderr: String::new(),
        }
    }
}

impl fmt::Display for ExecutionLimitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl_control_flow_error!(ExecutionLimitError);

/// Union of all interpreter control flow errors.
#[derive(Debug, Clone)]
pub enum InterpreterError {
    Goto(GotoError),
    Exit(ExitError),
    LabelNotFound(LabelNotFoundError),
    RecursionLimit(RecursionLimitError),
    Interrupted(InterruptedError),
    ExecutionLimit(ExecutionLimitError),
}

impl InterpreterError {
    pub fn prepend_output(&mut self, stdout: &str, stderr: &str) {
        if stdout.is_empty() && stderr.is_empty() {
            return;
        }
        match self {
            InterpreterError::Goto(e) => e.prepend_output(stdout, stderr),
            InterpreterError::Exit(e) => e.prepend_output(stdout, stderr),
            InterpreterError::LabelNotFound(e) => e.prepend_output(stdout, stderr),
            InterpreterError::RecursionLimit(e) => e.prepend_output(stdout, stderr),
            InterpreterError::Interrupted(e) => e.prepend_output(stdout, stderr),
            InterpreterError::ExecutionLimit(e) => e.prepend_output(stdout, stderr),
        }
    }

    /// Builder form of [`InterpreterError::prepend_output`].
    pub fn with_output(mut self, stdout: &str, stderr: &str) -> Self {
        self.prepend_output(stdout, stderr);
        self
    }

    /// Remove and return the carried stdout/stderr.
    pub fn take_output(&mut self) -> (String, String) {
        let (stdout, stderr) = match self {
            InterpreterError::Goto(e) => (&mut e.stdout, &mut e.stderr),
            InterpreterError::Exit(e) => (&mut e.stdout, &mut e.stderr),
            InterpreterError::LabelNotFound(e) => (&mut e.stdout, &mut e.stderr),
            InterpreterError::RecursionLimit(e) => (&mut e.stdout, &mut e.stderr),
            InterpreterError::Interrupted(e) => (&mut e.stdout, &mut e.stderr),
            InterpreterError::ExecutionLimit(e) => (&mut e.stdout, &mut e.stderr),
        };
        (std::mem::take(stdout), std::mem::take(stderr))
    }

    pub fn stdout(&self) -> &str {
        match self {
            InterpreterError::Goto(e) => e.stdout(),
            InterpreterError::Exit(e) => e.stdout(),
            InterpreterError::LabelNotFound(e) => e.stdout(),
            InterpreterError::RecursionLimit(e) => e.stdout(),
            InterpreterError::Interrupted(e) => e.stdout(),
            InterpreterError::ExecutionLimit(e) => e.stdout(),
        }
    }

    pub fn stderr(&self) -> &str {
        match self {
            InterpreterError::Goto(e) => e.stderr(),
            InterpreterError::Exit(e) => e.stderr(),
            InterpreterError::LabelNotFound(e) => e.stderr(),
            InterpreterError::RecursionLimit(e) => e.stderr(),
            InterpreterError::Interrupted(e) => e.stderr(),
            InterpreterError::ExecutionLimit(e) => e.stderr(),
        }
    }

    /// Fatal errors abort the whole batch run, not just one line.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            InterpreterError::LabelNotFound(_)
                | InterpreterError::RecursionLimit(_)
                | InterpreterError::Interrupted(_)
                | InterpreterError::ExecutionLimit(_)
        )
    }
}

impl fmt::Display for InterpreterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterpreterError::Goto(e) => write!(f, "{}", e),
            InterpreterError::Exit(e) => write!(f, "{}", e),
            InterpreterError::LabelNotFound(e) => write!(f, "{}", e),
            InterpreterError::RecursionLimit(e) => write!(f, "{}", e),
            InterpreterError::Interrupted(e) => write!(f, "{}", e),
            InterpreterError::ExecutionLimit(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for InterpreterError {}

// Implement From for each error type
impl From<GotoError> for InterpreterError {
    fn from(e: GotoError) -> Self { InterpreterError::Goto(e) }
}

impl From<ExitError> for InterpreterError {
    fn from(e: ExitError) -> Self { InterpreterError::Exit(e) }
}

impl From<LabelNotFoundError> for InterpreterError {
    fn from(e: LabelNotFoundError) -> Self { InterpreterError::LabelNotFound(e) }
}

impl From<RecursionLimitError> for InterpreterError {
    fn from(e: RecursionLimitError) -> Self { InterpreterError::RecursionLimit(e) }
}

impl From<InterruptedError> for InterpreterError {
    fn from(e: InterruptedError) -> Self { InterpreterError::Interrupted(e) }
}

impl From<ExecutionLimitError> for InterpreterError {
    fn from(e: ExecutionLimitError) -> Self { InterpreterError::ExecutionLimit(e) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepend_output_accumulates() {
        let mut err: InterpreterError = GotoError::new("end").into();
        err.prepend_output("b\n", "");
        err.prepend_output("a\n", "warn\n");
        assert_eq!(err.stdout(), "a\nb\n");
        assert_eq!(err.stderr(), "warn\n");
    }

    #[test]
    fn test_take_output_empties_error() {
        let mut exit = ExitError::new(2, true);
        exit.prepend_output("out\n", "err\n");
        assert_eq!(exit.take_output(), ("out\n".to_string(), "err\n".to_string()));
        assert_eq!(exit.stdout(), "");
        assert_eq!(exit.stderr(), "");
    }

    #[test]
    fn test_goto_eof() {
        assert!(GotoError::new(":EOF").is_eof());
        assert!(GotoError::new("eof").is_eof());
        assert!(!GotoError::new(":EOFX").is_eof());
    }

    #[test]
    fn test_label_not_found_message() {
        let err = LabelNotFoundError::new(":missing");
        assert_eq!(
            err.message(),
            "The system cannot find the batch label specified - missing\n"
        );
    }

    #[test]
    fn test_fatal_classification() {
        assert!(!InterpreterError::from(ExitError::new(0, true)).is_fatal());
        assert!(!InterpreterError::from(GotoError::new("x")).is_fatal());
        assert!(InterpreterError::from(RecursionLimitError::new(3)).is_fatal());
        assert!(InterpreterError::from(InterruptedError::default()).is_fatal());
    }
}
