//! Error types for every stage of the engine.
//!
//! Lexical and parse errors abort parsing and always carry the offending
//! position. Evaluation errors carry a stable message code (see
//! [`EvalErrorKind::code`]) and, once known, the position of the node that
//! raised them. [`AccessError`] is what resolution strategies report; the
//! navigation nodes wrap it into an evaluation error.

use thiserror::Error;

fn at(position: &Option<usize>) -> String {
    match position {
        Some(p) => format!(" (position {})", p),
        None => String::new(),
    }
}

/// What went wrong while tokenizing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexErrorKind {
    #[error("non-terminating quoted string")]
    UnterminatedString,

    #[error("non-terminating double-quoted string")]
    UnterminatedDoubleQuotedString,

    #[error("unexpected escape character")]
    UnexpectedEscape,

    #[error("unsupported character '{0}'")]
    UnsupportedCharacter(char),

    #[error("missing expected character '{0}'")]
    MissingCharacter(char),

    #[error("real number cannot be suffixed with a long (L or l) suffix")]
    RealCannotBeLong,

    #[error("the hexadecimal literal '{0}' is malformed")]
    MalformedHex(String),

    #[error("the exponent of '{0}' is malformed")]
    MalformedExponent(String),
}

/// A tokenizer failure at a character offset.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} (position {position})")]
pub struct LexError {
    pub kind: LexErrorKind,
    pub position: usize,
}

impl LexError {
    pub fn new(kind: LexErrorKind, position: usize) -> Self {
        LexError { kind, position }
    }
}

/// What went wrong while parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error(transparent)]
    Lexical(#[from] LexErrorKind),

    #[error("expression is empty")]
    Empty,

    #[error("unexpected token. expected '{expected}' but was '{found}'")]
    UnexpectedToken { expected: String, found: String },

    #[error("unexpectedly ran out of input")]
    OutOfData,

    #[error("after parsing a valid expression, there is still more data in the expression: '{0}'")]
    MoreInput(String),

    #[error("unexpected data after '.': '{0}'")]
    UnexpectedDataAfterDot(String),

    #[error("problem parsing left operand of '{0}'")]
    LeftOperandProblem(String),

    #[error("problem parsing right operand of '{0}'")]
    RightOperandProblem(String),

    #[error("expected a selection or projection expression")]
    MissingSelectionExpression,

    #[error("unexpectedly ran out of arguments")]
    RunOutOfArguments,

    #[error("a bean reference must be followed by an identifier or a quoted name")]
    InvalidBeanReference,

    #[error("the value '{0}' cannot be parsed as an int")]
    NotAnInteger(String),

    #[error("the value '{0}' cannot be parsed as a long")]
    NotALong(String),

    #[error("the value '{0}' cannot be parsed as a real number")]
    NotAReal(String),

    #[error("expression of length {length} exceeds the maximum of {max}")]
    ExpressionTooLong { length: usize, max: usize },

    #[error("expression is nested more than {max} levels deep")]
    NestingTooDeep { max: usize },

    #[error("no ending suffix '{suffix}' for the template expression")]
    UnclosedTemplate { suffix: String },

    #[error("no expression defined within delimiter '{delimiter}'")]
    EmptyTemplateExpression { delimiter: String },

    #[error("found closing '{found}' without a matching opening bracket")]
    UnbalancedBracket { found: char },
}

/// A parse failure at a character offset.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} (position {position})")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub position: usize,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, position: usize) -> Self {
        ParseError { kind, position }
    }
}

impl From<LexError> for ParseError {
    fn from(e: LexError) -> Self {
        ParseError::new(ParseErrorKind::Lexical(e.kind), e.position)
    }
}

/// Failure reported by a resolution strategy (accessor, resolver,
/// executor, bean resolver).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    /// The member was found and invoked, but the invocation itself failed.
    #[error("{0}")]
    Invocation(String),

    /// The cached or resolved handle does not apply to this target.
    #[error("{0}")]
    Incompatible(String),
}

impl AccessError {
    pub fn invocation(message: impl Into<String>) -> Self {
        AccessError::Invocation(message.into())
    }

    pub fn incompatible(message: impl Into<String>) -> Self {
        AccessError::Incompatible(message.into())
    }
}

/// Every evaluation failure, each with a stable message code.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalErrorKind {
    #[error("type conversion problem, cannot convert from {from} to {to}")]
    TypeConversion { from: String, to: String },

    #[error("property or field '{name}' cannot be found on object of type '{type_name}' - maybe not public or not valid?")]
    PropertyNotReadable { name: String, type_name: String },

    #[error("property or field '{0}' cannot be found on null")]
    PropertyNotReadableOnNull(String),

    #[error("property or field '{name}' cannot be set on object of type '{type_name}' - maybe not public or not writable?")]
    PropertyNotWritable { name: String, type_name: String },

    #[error("property or field '{0}' cannot be set on null")]
    PropertyNotWritableOnNull(String),

    #[error("could not access property '{name}': {cause}")]
    PropertyReadFailed { name: String, cause: String },

    #[error("could not write property '{name}': {cause}")]
    PropertyWriteFailed { name: String, cause: String },

    #[error("method {signature} cannot be found on type {type_name}")]
    MethodNotFound { signature: String, type_name: String },

    #[error("method call: attempted to call method {0} on null context object")]
    MethodOnNull(String),

    #[error("method call of '{name}' is ambiguous, supported type conversions allow multiple variants to match on type {type_name}")]
    AmbiguousMethod { name: String, type_name: String },

    #[error("could not access method '{name}' on type {type_name}: {cause}")]
    MethodInvocationFailed { name: String, type_name: String, cause: String },

    #[error("constructor call: no suitable constructor found on type {type_name} for arguments {arguments}")]
    ConstructorNotFound { type_name: String, arguments: String },

    #[error("constructor call of '{type_name}' is ambiguous")]
    AmbiguousConstructor { type_name: String },

    #[error("a problem occurred whilst attempting to construct an object of type '{type_name}': {cause}")]
    ConstructorInvocationFailed { type_name: String, cause: String },

    #[error("type cannot be found '{0}'")]
    TypeNotFound(String),

    #[error("function '{0}' could not be found")]
    FunctionNotDefined(String),

    #[error("the variable '{name}' of type {type_name} cannot be invoked as a function")]
    FunctionNotInvocable { name: String, type_name: String },

    #[error("only static functions can be registered and invoked, '{0}' is not static")]
    FunctionMustBeStatic(String),

    #[error("incorrect number of arguments for function '{name}': {actual} supplied but function takes {expected}")]
    IncorrectArgumentCount { name: String, expected: usize, actual: usize },

    #[error("a problem occurred whilst attempting to call the function '{name}': {cause}")]
    FunctionInvocationFailed { name: String, cause: String },

    #[error("no bean resolver registered in the context to resolve access to bean '{0}'")]
    BeanResolverMissing(String),

    #[error("a problem occurred whilst attempting to resolve bean '{name}': {cause}")]
    BeanResolutionFailed { name: String, cause: String },

    #[error("expression '{0}' is not assignable")]
    NotAssignable(String),

    #[error("the variable '{0}' cannot be assigned")]
    VariableNotAssignable(String),

    #[error("the collection cannot be modified")]
    UnmodifiableCollection,

    #[error("the expression component '{0}' does not support increment")]
    OperandNotIncrementable(String),

    #[error("the expression component '{0}' does not support decrement")]
    OperandNotDecrementable(String),

    #[error("the operator '{operator}' is not supported between objects of type '{left}' and '{right}'")]
    OperatorNotSupported { operator: String, left: String, right: String },

    #[error("division by zero")]
    DivisionByZero,

    #[error("arithmetic overflow in '{0}'")]
    ArithmeticOverflow(String),

    #[error("cannot compare instances of {left} and {right}")]
    NotComparable { left: String, right: String },

    #[error("result of selection criteria is not boolean")]
    SelectionCriteriaNotBoolean,

    #[error("cannot perform selection on input data of type '{0}'")]
    InvalidSelectionTarget(String),

    #[error("projection is not supported on the type '{0}'")]
    ProjectionNotSupported(String),

    #[error("cannot index into a null value")]
    IndexIntoNull,

    #[error("indexing into type '{0}' is not supported")]
    IndexingNotSupported(String),

    #[error("array index out of bounds, array has size {size}, index of {index} is invalid")]
    ArrayIndexOutOfBounds { size: usize, index: i64 },

    #[error("collection index out of bounds, collection has size {size}, index of {index} is invalid")]
    CollectionIndexOutOfBounds { size: usize, index: i64 },

    #[error("string index out of bounds, string has length {size}, index of {index} is invalid")]
    StringIndexOutOfBounds { size: usize, index: i64 },

    #[error("right operand for the 'between' operator has to be a two-element list")]
    BetweenRightOperand,

    #[error("right operand for the 'instanceof' operator must be a type, not '{0}'")]
    InstanceofNeedsType(String),

    #[error("first operand for the 'matches' operator must be a string, not '{0}'")]
    InvalidMatchesInput(String),

    #[error("second operand for the 'matches' operator must be a string, not '{0}'")]
    InvalidMatchesPattern(String),

    #[error("pattern '{pattern}' is not valid: {cause}")]
    InvalidPattern { pattern: String, cause: String },

    #[error("regular expression of length {0} exceeds the maximum allowed length")]
    MaxRegexLengthExceeded(usize),

    #[error("concatenated string of length {0} exceeds the maximum allowed length")]
    MaxConcatenatedStringLength(usize),

    #[error("repeated text of size {0} exceeds the maximum allowed size")]
    MaxRepeatedTextSize(usize),

    #[error("repeat count {0} for text must not be negative")]
    NegativeRepeatCount(i32),

    #[error("a required array dimension has not been specified")]
    MissingArrayDimension,

    #[error("array initializer size does not match array dimensions: expected {expected}, found {actual}")]
    InitializerLengthIncorrect { expected: usize, actual: usize },

    #[error("multi-dimensional arrays cannot be initialized with an initializer")]
    MultidimArrayInitializer,

    #[error("array of {0} elements exceeds the allowed threshold")]
    ArrayTooLarge(usize),

    #[error("array dimension {0} is negative")]
    NegativeArraySize(i64),

    #[error("compiled code expected a value of type {expected} but found {actual}")]
    CompiledTypeMismatch { expected: String, actual: String },

    #[error("a problem occurred whilst running compiled code: {0}")]
    CompiledExpressionFailed(Box<EvaluationError>),
}

impl EvalErrorKind {
    /// Stable message code, independent of the rendered text.
    pub fn code(&self) -> &'static str {
        use EvalErrorKind::*;
        match self {
            TypeConversion { .. } => "TYPE_CONVERSION_ERROR",
            PropertyNotReadable { .. } => "PROPERTY_OR_FIELD_NOT_READABLE",
            PropertyNotReadableOnNull(_) => "PROPERTY_OR_FIELD_NOT_READABLE_ON_NULL",
            PropertyNotWritable { .. } => "PROPERTY_OR_FIELD_NOT_WRITABLE",
            PropertyNotWritableOnNull(_) => "PROPERTY_OR_FIELD_NOT_WRITABLE_ON_NULL",
            PropertyReadFailed { .. } => "EXCEPTION_DURING_PROPERTY_READ",
            PropertyWriteFailed { .. } => "EXCEPTION_DURING_PROPERTY_WRITE",
            MethodNotFound { .. } => "METHOD_NOT_FOUND",
            MethodOnNull(_) => "METHOD_CALL_ON_NULL_OBJECT_NOT_ALLOWED",
            AmbiguousMethod { .. } => "MULTIPLE_POSSIBLE_METHODS",
            MethodInvocationFailed { .. } => "EXCEPTION_DURING_METHOD_INVOCATION",
            ConstructorNotFound { .. } => "CONSTRUCTOR_NOT_FOUND",
            AmbiguousConstructor { .. } => "MULTIPLE_POSSIBLE_CONSTRUCTORS",
            ConstructorInvocationFailed { .. } => "CONSTRUCTOR_INVOCATION_PROBLEM",
            TypeNotFound(_) => "TYPE_NOT_FOUND",
            FunctionNotDefined(_) => "FUNCTION_NOT_DEFINED",
            FunctionNotInvocable { .. } => "FUNCTION_REFERENCE_CANNOT_BE_INVOKED",
            FunctionMustBeStatic(_) => "FUNCTION_MUST_BE_STATIC",
            IncorrectArgumentCount { .. } => "INCORRECT_NUMBER_OF_ARGUMENTS_TO_FUNCTION",
            FunctionInvocationFailed { .. } => "EXCEPTION_DURING_FUNCTION_CALL",
            BeanResolverMissing(_) => "NO_BEAN_RESOLVER_REGISTERED",
            BeanResolutionFailed { .. } => "EXCEPTION_DURING_BEAN_RESOLUTION",
            NotAssignable(_) => "NOT_ASSIGNABLE",
            VariableNotAssignable(_) => "VARIABLE_NOT_ASSIGNABLE",
            UnmodifiableCollection => "UNMODIFIABLE_COLLECTION",
            OperandNotIncrementable(_) => "OPERAND_NOT_INCREMENTABLE",
            OperandNotDecrementable(_) => "OPERAND_NOT_DECREMENTABLE",
            OperatorNotSupported { .. } => "OPERATOR_NOT_SUPPORTED_BETWEEN_TYPES",
            DivisionByZero => "DIVISION_BY_ZERO",
            ArithmeticOverflow(_) => "ARITHMETIC_OVERFLOW",
            NotComparable { .. } => "NOT_COMPARABLE",
            SelectionCriteriaNotBoolean => "RESULT_OF_SELECTION_CRITERIA_IS_NOT_BOOLEAN",
            InvalidSelectionTarget(_) => "INVALID_TYPE_FOR_SELECTION",
            ProjectionNotSupported(_) => "PROJECTION_NOT_SUPPORTED_ON_TYPE",
            IndexIntoNull => "CANNOT_INDEX_INTO_NULL_VALUE",
            IndexingNotSupported(_) => "INDEXING_NOT_SUPPORTED_FOR_TYPE",
            ArrayIndexOutOfBounds { .. } => "ARRAY_INDEX_OUT_OF_BOUNDS",
            CollectionIndexOutOfBounds { .. } => "COLLECTION_INDEX_OUT_OF_BOUNDS",
            StringIndexOutOfBounds { .. } => "STRING_INDEX_OUT_OF_BOUNDS",
            BetweenRightOperand => "BETWEEN_RIGHT_OPERAND_MUST_BE_TWO_ELEMENT_LIST",
            InstanceofNeedsType(_) => "INSTANCEOF_OPERATOR_NEEDS_CLASS_OPERAND",
            InvalidMatchesInput(_) => "INVALID_FIRST_OPERAND_FOR_MATCHES_OPERATOR",
            InvalidMatchesPattern(_) => "INVALID_SECOND_OPERAND_FOR_MATCHES_OPERATOR",
            InvalidPattern { .. } => "INVALID_PATTERN",
            MaxRegexLengthExceeded(_) => "MAX_REGEX_LENGTH_EXCEEDED",
            MaxConcatenatedStringLength(_) => "MAX_CONCATENATED_STRING_LENGTH_EXCEEDED",
            MaxRepeatedTextSize(_) => "MAX_REPEATED_TEXT_SIZE_EXCEEDED",
            NegativeRepeatCount(_) => "NEGATIVE_REPEATED_TEXT_COUNT",
            MissingArrayDimension => "MISSING_ARRAY_DIMENSION",
            InitializerLengthIncorrect { .. } => "INITIALIZER_LENGTH_INCORRECT",
            MultidimArrayInitializer => "MULTIDIM_ARRAY_INITIALIZER_NOT_SUPPORTED",
            ArrayTooLarge(_) => "MAX_ARRAY_ELEMENTS_THRESHOLD_EXCEEDED",
            NegativeArraySize(_) => "NEGATIVE_ARRAY_SIZE",
            CompiledTypeMismatch { .. } => "COMPILED_TYPE_MISMATCH",
            CompiledExpressionFailed(_) => "EXCEPTION_RUNNING_COMPILED_EXPRESSION",
        }
    }
}

/// An evaluation failure with the position of the node that raised it.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}{}", at(.position))]
pub struct EvaluationError {
    pub kind: EvalErrorKind,
    pub position: Option<usize>,
}

impl EvaluationError {
    pub fn new(kind: EvalErrorKind) -> Self {
        EvaluationError {
            kind,
            position: None,
        }
    }

    pub fn at(kind: EvalErrorKind, position: usize) -> Self {
        EvaluationError {
            kind,
            position: Some(position),
        }
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Fills in the position if the error does not carry one yet.
    pub fn or_position(mut self, position: usize) -> Self {
        if self.position.is_none() {
            self.position = Some(position);
        }
        self
    }

    /// Overwrites the position; compound expressions use this to point at
    /// the failing step.
    pub fn with_position(mut self, position: usize) -> Self {
        self.position = Some(position);
        self
    }
}

impl From<EvalErrorKind> for EvaluationError {
    fn from(kind: EvalErrorKind) -> Self {
        EvaluationError::new(kind)
    }
}

/// Either stage of using an expression string: parsing or evaluating it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("evaluation error: {0}")]
    Evaluation(#[from] EvaluationError),
}
