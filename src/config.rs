use std::{fmt, str::FromStr};

/// When expressions are compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompilerMode {
    /// Always interpret.
    #[default]
    Off,
    /// Compile after the first interpreted evaluation; compiled failures
    /// propagate.
    Immediate,
    /// Compile once the expression is hot; compiled failures fall back to
    /// the interpreter.
    Mixed,
}

impl FromStr for CompilerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" => Ok(CompilerMode::Off),
            "immediate" => Ok(CompilerMode::Immediate),
            "mixed" => Ok(CompilerMode::Mixed),
            other => Err(format!(
                "unknown compiler mode '{}', expected off, immediate or mixed",
                other
            )),
        }
    }
}

impl fmt::Display for CompilerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CompilerMode::Off => "off",
            CompilerMode::Immediate => "immediate",
            CompilerMode::Mixed => "mixed",
        })
    }
}

pub const COMPILER_MODE_ENV: &str = "ANISE_COMPILER_MODE";

pub const DEFAULT_COMPILE_THRESHOLD: u32 = 100;
pub const DEFAULT_MAX_FAILED_COMPILATIONS: u32 = 100;
pub const DEFAULT_MAX_EXPRESSION_LENGTH: usize = 10_000;
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 32;
pub const DEFAULT_MAX_CONCATENATED_LENGTH: usize = 100_000;
pub const DEFAULT_MAX_REPEATED_TEXT_SIZE: usize = 256;
pub const DEFAULT_MAX_REGEX_LENGTH: usize = 1_000;
pub const DEFAULT_MAX_ARRAY_ELEMENTS: usize = 256 * 1024;

/// Settings shared by every expression a parser produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserConfig {
    pub compiler_mode: CompilerMode,
    /// Interpreted evaluations before a MIXED expression compiles
    pub compile_threshold: u32,
    /// Failed compilations after which an expression stops trying
    pub max_failed_compilations: u32,
    pub max_expression_length: usize,
    /// Nested sub-expressions (parentheses, collections, arguments, prefix
    /// operators) the parser accepts before giving up
    pub max_nesting_depth: usize,
    pub max_concatenated_length: usize,
    pub max_repeated_text_size: usize,
    pub max_regex_length: usize,
    pub max_array_elements: usize,
}

impl ParserConfig {
    /// Defaults with the compiler off, ignoring the environment.
    pub fn interpreted() -> Self {
        ParserConfig {
            compiler_mode: CompilerMode::Off,
            compile_threshold: DEFAULT_COMPILE_THRESHOLD,
            max_failed_compilations: DEFAULT_MAX_FAILED_COMPILATIONS,
            max_expression_length: DEFAULT_MAX_EXPRESSION_LENGTH,
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
            max_concatenated_length: DEFAULT_MAX_CONCATENATED_LENGTH,
            max_repeated_text_size: DEFAULT_MAX_REPEATED_TEXT_SIZE,
            max_regex_length: DEFAULT_MAX_REGEX_LENGTH,
            max_array_elements: DEFAULT_MAX_ARRAY_ELEMENTS,
        }
    }

    pub fn with_compiler_mode(mut self, mode: CompilerMode) -> Self {
        self.compiler_mode = mode;
        self
    }

    pub fn with_compile_threshold(mut self, threshold: u32) -> Self {
        self.compile_threshold = threshold;
        self
    }

    pub fn with_max_expression_length(mut self, max: usize) -> Self {
        self.max_expression_length = max;
        self
    }

    pub fn with_max_nesting_depth(mut self, max: usize) -> Self {
        self.max_nesting_depth = max;
        self
    }
}

impl Default for ParserConfig {
    /// Reads the compiler mode from `ANISE_COMPILER_MODE`; an unset or
    /// unrecognized value means `off`.
    fn default() -> Self {
        let mode = match std::env::var(COMPILER_MODE_ENV) {
            Ok(raw) => raw.parse().unwrap_or_else(|err: String| {
                tracing::warn!("{}: {}", COMPILER_MODE_ENV, err);
                CompilerMode::Off
            }),
            Err(_) => CompilerMode::Off,
        };
        ParserConfig::interpreted().with_compiler_mode(mode)
    }
}

#[test]
fn test_compiler_mode_from_str() {
    assert_eq!("MIXED".parse::<CompilerMode>(), Ok(CompilerMode::Mixed));
    assert_eq!(" off ".parse::<CompilerMode>(), Ok(CompilerMode::Off));
    assert!("eager".parse::<CompilerMode>().is_err());
}
