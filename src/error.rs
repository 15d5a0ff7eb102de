//! Error types for Clasp

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Clasp operations
pub type Result<T> = std::result::Result<T, Error>;

/// Exit code used for usage errors
pub const USAGE_EXIT_CODE: i32 = 2;

/// Exit code used when the user aborts (end of input, interrupt)
pub const ABORT_EXIT_CODE: i32 = 1;

/// Main error type for Clasp
#[derive(Error, Debug)]
pub enum Error {
    /// Command line usage errors (bad options, missing parameters, ...)
    #[error("{0}")]
    Usage(#[from] UsageError),

    /// Non-usage fatal interruption, e.g. end of input while prompting
    #[error("Aborted!")]
    Abort,

    /// Stop processing right now and exit with the given code
    #[error("Exit requested with code {0}")]
    Exit(i32),

    /// Application-declared failure with its own exit code
    #[error("{message}")]
    Failure { message: String, exit_code: i32 },

    /// Invalid command definitions or manifests
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Placeholder interpolation errors in manifest templates
    #[error("Interpolation error: {0}")]
    Interpolation(#[from] InterpolationError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// YAML parsing errors
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// A usage error carrying a free-form message
    pub fn usage(message: impl Into<String>) -> Self {
        Error::Usage(UsageError::new(UsageErrorKind::Message(message.into())))
    }

    /// A validation error for a parameter value. The parameter hint is
    /// attached by the scheduler if the callback didn't supply one.
    pub fn bad_parameter(message: impl Into<String>) -> Self {
        Error::Usage(UsageError::new(UsageErrorKind::BadParameter {
            param_hint: None,
            message: message.into(),
        }))
    }

    /// An application failure that exits with `exit_code`
    pub fn failure(message: impl Into<String>, exit_code: i32) -> Self {
        Error::Failure {
            message: message.into(),
            exit_code,
        }
    }

    /// The process exit code conventionally associated with this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Usage(e) => e.exit_code(),
            Error::Abort => ABORT_EXIT_CODE,
            Error::Exit(code) => *code,
            Error::Failure { exit_code, .. } => *exit_code,
            _ => 1,
        }
    }

    /// Returns the usage error inside, if any
    pub fn as_usage(&self) -> Option<&UsageError> {
        match self {
            Error::Usage(e) => Some(e),
            _ => None,
        }
    }
}

/// A command line usage error together with the command level it arose in
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind}")]
pub struct UsageError {
    /// What went wrong
    pub kind: UsageErrorKind,

    /// Command path of the level that raised the error, e.g. `prog sub`
    pub command_path: Option<String>,

    /// Usage line of that level
    pub usage: Option<String>,

    /// First help option spelling of that level, e.g. `--help`
    pub help_option: Option<String>,
}

impl UsageError {
    pub fn new(kind: UsageErrorKind) -> Self {
        UsageError {
            kind,
            command_path: None,
            usage: None,
            help_option: None,
        }
    }

    /// Attach the level that raised the error. The innermost level wins, so
    /// outer levels never overwrite what is already there.
    pub fn with_level(
        mut self,
        command_path: String,
        usage: String,
        help_option: Option<String>,
    ) -> Self {
        if self.command_path.is_none() {
            self.command_path = Some(command_path);
            self.usage = Some(usage);
            self.help_option = help_option;
        }
        self
    }

    pub fn exit_code(&self) -> i32 {
        USAGE_EXIT_CODE
    }

    /// The message without usage line or help hint
    pub fn format_message(&self) -> String {
        self.kind.to_string()
    }

    /// The help hint shown below the message, e.g.
    /// `Try 'prog --help' for help.`
    pub fn help_hint(&self) -> Option<String> {
        match (&self.command_path, &self.help_option) {
            (Some(path), Some(help)) => Some(format!("Try '{} {}' for help.", path, help)),
            _ => None,
        }
    }
}

/// Kinds of usage errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UsageErrorKind {
    #[error("No such option: {name}")]
    NoSuchOption { name: String },

    #[error("{message}")]
    BadOptionUsage { option: String, message: String },

    #[error("{0}")]
    BadArgumentUsage(String),

    #[error("Missing {param_type} {param_hint}.")]
    MissingParameter {
        param_hint: String,
        param_type: String,
    },

    #[error("{}", describe_bad_parameter(.param_hint.as_deref(), .message))]
    BadParameter {
        param_hint: Option<String>,
        message: String,
    },

    #[error("Got unexpected extra argument{} ({})", plural(.0.len()), .0.join(" "))]
    UnexpectedExtraArgs(Vec<String>),

    #[error("No such command '{0}'.")]
    NoSuchCommand(String),

    #[error("Missing command.")]
    MissingCommand,

    #[error("{0}")]
    Message(String),
}

impl UsageErrorKind {
    /// Fill in the parameter hint on validation errors that lack one
    pub fn augment(self, hint: &str) -> Self {
        match self {
            UsageErrorKind::BadParameter {
                param_hint: None,
                message,
            } => UsageErrorKind::BadParameter {
                param_hint: Some(hint.to_string()),
                message,
            },
            other => other,
        }
    }
}

fn describe_bad_parameter(hint: Option<&str>, message: &str) -> String {
    match hint {
        Some(hint) => format!("Invalid value for {}: {}", hint, message),
        None => format!("Invalid value: {}", message),
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

/// Command definition and manifest errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to find manifest file (searched: {0})")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Parameter name '{0}' is used more than once in command '{1}'")]
    DuplicateNames(String, String),

    #[error("Option spelling '{0}' must start with a prefix character")]
    InvalidOptionName(String),

    #[error("Could not infer a name for parameter from {0:?}")]
    UnnamedParameter(Vec<String>),

    #[error("Variadic argument '{0}' must be the last argument")]
    VariadicNotLast(String),

    #[error("Failed to read manifest '{path}': {error}")]
    ReadFile { path: PathBuf, error: String },
}

/// Placeholder interpolation errors
#[derive(Error, Debug)]
pub enum InterpolationError {
    #[error("Variable '{0}' is not defined")]
    UndefinedVariable(String),

    #[error("Recursive interpolation detected")]
    RecursiveInterpolation,
}

/// Specialized result type for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Specialized result type for interpolation operations
pub type InterpolationResult<T> = std::result::Result<T, InterpolationError>;

/// Whether an error is the "exit now" effect rather than a failure
pub fn is_exit(err: &Error) -> bool {
    matches!(err, Error::Exit(_))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_parameter_augment() {
        let kind = UsageErrorKind::BadParameter {
            param_hint: None,
            message: "too small".to_string(),
        };
        let kind = kind.augment("'--count'");
        assert_eq!(kind.to_string(), "Invalid value for '--count': too small");
    }

    #[test]
    fn test_augment_keeps_existing_hint() {
        let kind = UsageErrorKind::BadParameter {
            param_hint: Some("'SRC'".to_string()),
            message: "nope".to_string(),
        };
        let kind = kind.augment("'--other'");
        assert_eq!(kind.to_string(), "Invalid value for 'SRC': nope");
    }

    #[test]
    fn test_extra_args_message() {
        let one = UsageErrorKind::UnexpectedExtraArgs(vec!["x".to_string()]);
        assert_eq!(one.to_string(), "Got unexpected extra argument (x)");
        let two = UsageErrorKind::UnexpectedExtraArgs(vec!["x".to_string(), "y".to_string()]);
        assert_eq!(two.to_string(), "Got unexpected extra arguments (x y)");
    }

    #[test]
    fn test_innermost_level_wins() {
        let err = UsageError::new(UsageErrorKind::MissingCommand)
            .with_level("prog sub".into(), "Usage: prog sub".into(), Some("--help".into()))
            .with_level("prog".into(), "Usage: prog".into(), Some("--help".into()));
        assert_eq!(err.command_path.as_deref(), Some("prog sub"));
        assert_eq!(err.help_hint().unwrap(), "Try 'prog sub --help' for help.");
    }

    #[test]
    fn test_missing_parameter_message() {
        let kind = UsageErrorKind::MissingParameter {
            param_hint: "'-n' / '--name'".to_string(),
            param_type: "option".to_string(),
        };
        assert_eq!(kind.to_string(), "Missing option '-n' / '--name'.");
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(Error::usage("bad").exit_code(), USAGE_EXIT_CODE);
        assert_eq!(Error::Abort.exit_code(), ABORT_EXIT_CODE);
        assert_eq!(Error::Exit(0).exit_code(), 0);
        assert_eq!(Error::failure("boom", 7).exit_code(), 7);
        assert!(is_exit(&Error::Exit(3)));
    }
}
