use thiserror::Error;

use crate::frontend::SemanticError;

/// Everything that can stop the pipeline between the typed AST and the
/// assembly listing
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("aborting due to {} previous error(s)", .0.len())]
    Semantic(Vec<SemanticError>),
    #[error(transparent)]
    Internal(#[from] InternalError),
    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),
    #[error("assembler exited with {0}")]
    Assembler(std::process::ExitStatus),
}

/// A broken invariant inside lowering or code generation. These are compiler
/// bugs, never problems with the user's program.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("internal compiler error: {message}")]
pub struct InternalError {
    pub message: String,
}

macro_rules! function {
    () => {{
        fn f() {}
        fn type_name_of<T>(_: T) -> &'static str {
            std::any::type_name::<T>()
        }
        type_name_of(f)
            .rsplit("::")
            .find(|&part| part != "f" && part != "{{closure}}")
            .unwrap_or("<unknown>")
    }};
}

pub(crate) use function;

/// Builds an [`InternalError`] tagged with the place that raised it
macro_rules! internal_error {
    ($($arg:tt)*) => {{
        let message = format!($($arg)*);

        #[cfg(feature = "error-backtrace")]
        let message = format!(
            "{} (in {}::{} at {}:{}:{})",
            message,
            module_path!(),
            $crate::error::function!(),
            file!(),
            line!(),
            column!()
        );

        $crate::error::InternalError { message }
    }};
}

pub(crate) use internal_error;
