use crate::{
    CompilerMode, ExpressionParser, ParserConfig, StandardEvaluationContext, Value, parser::parse_ast,
};

use super::{CliError, json_to_value, value_to_json};

/// Options for `anise eval`
#[derive(Debug, Clone)]
pub struct EvalOptions {
    /// The expression to evaluate
    pub expression: String,
    /// JSON document used as the root object
    pub input: Option<String>,
    /// Variables as `name=value`; values that parse as JSON are converted,
    /// anything else is a string
    pub vars: Vec<String>,
    /// Only validate syntax
    pub syntax_only: bool,
    /// Overrides `ANISE_COMPILER_MODE`
    pub compiler_mode: Option<CompilerMode>,
    /// Number of evaluations; the last result is reported
    pub repeat: u32,
}

impl Default for EvalOptions {
    fn default() -> Self {
        EvalOptions {
            expression: String::new(),
            input: None,
            vars: Vec::new(),
            syntax_only: false,
            compiler_mode: None,
            repeat: 1,
        }
    }
}

/// Result of `anise eval`
#[derive(Debug, Clone, PartialEq)]
pub enum EvalOutcome {
    /// The expression parsed (only with `syntax_only`)
    SyntaxValid,
    /// The result of the last evaluation and whether it ran compiled
    Success {
        value: serde_json::Value,
        compiled: bool,
    },
}

/// Splits `name=value` into a variable name and its value.
pub fn parse_variable(raw: &str) -> Result<(String, Value), CliError> {
    let Some((name, value)) = raw.split_once('=') else {
        return Err(CliError::InvalidVariable(raw.to_string()));
    };
    let name = name.trim();
    if name.is_empty() {
        return Err(CliError::InvalidVariable(raw.to_string()));
    }
    let value = match serde_json::from_str(value) {
        Ok(json) => json_to_value(json),
        Err(_) => Value::string(value),
    };
    Ok((name.to_string(), value))
}

/// Parses and evaluates an expression.
pub fn execute_eval(options: &EvalOptions) -> Result<EvalOutcome, CliError> {
    let mut config = ParserConfig::default();
    if let Some(mode) = options.compiler_mode {
        config = config.with_compiler_mode(mode);
    }
    let expression = ExpressionParser::new(config).parse_expression(&options.expression)?;
    if options.syntax_only {
        return Ok(EvalOutcome::SyntaxValid);
    }
    if options.repeat == 0 {
        return Err(CliError::InvalidRepeat);
    }

    let root = match &options.input {
        Some(input) if !input.trim().is_empty() => json_to_value(serde_json::from_str(input)?),
        _ => Value::Null,
    };
    let ctx = StandardEvaluationContext::with_root(root);
    for raw in &options.vars {
        let (name, value) = parse_variable(raw)?;
        ctx.set_variable(&name, value);
    }

    let mut value = Value::Null;
    for _ in 0..options.repeat {
        value = expression.evaluate(&ctx)?;
    }
    tracing::debug!(
        expression = %options.expression,
        repeat = options.repeat,
        compiled = expression.is_compiled(),
        "evaluated"
    );
    Ok(EvalOutcome::Success {
        value: value_to_json(&value),
        compiled: expression.is_compiled(),
    })
}

/// Parses an expression and renders its syntax tree.
pub fn execute_ast(expression: &str) -> Result<String, CliError> {
    Ok(parse_ast(expression, &ParserConfig::interpreted())?.to_ast_string())
}

#[test]
fn test_execute_eval_with_input_and_variables() {
    use pretty_assertions::assert_eq;

    let options = EvalOptions {
        expression: "name + ' is ' + #age".to_string(),
        input: Some(r#"{"name": "Ada"}"#.to_string()),
        vars: vec!["age=36".to_string()],
        ..EvalOptions::default()
    };
    assert_eq!(
        execute_eval(&options).unwrap(),
        EvalOutcome::Success {
            value: serde_json::json!("Ada is 36"),
            compiled: false,
        }
    );
}

#[test]
fn test_execute_eval_repeat_compiles() {
    let options = EvalOptions {
        expression: "2 * 21".to_string(),
        compiler_mode: Some(CompilerMode::Immediate),
        repeat: 3,
        ..EvalOptions::default()
    };
    let EvalOutcome::Success { value, compiled } = execute_eval(&options).unwrap() else {
        panic!("expected a result");
    };
    assert_eq!(value, serde_json::json!(42));
    assert!(compiled);
}

#[test]
fn test_parse_variable() {
    assert_eq!(parse_variable("s=hello").unwrap(), ("s".to_string(), Value::string("hello")));
    assert_eq!(parse_variable("n=[1]").unwrap().1.to_string(), "[1]");
    assert!(matches!(parse_variable("novalue"), Err(CliError::InvalidVariable(_))));
}

#[test]
fn test_syntax_only_skips_evaluation() {
    let options = EvalOptions {
        expression: "1 / 0".to_string(),
        syntax_only: true,
        ..EvalOptions::default()
    };
    assert_eq!(execute_eval(&options).unwrap(), EvalOutcome::SyntaxValid);
}

#[test]
fn test_evaluation_errors_carry_their_code() {
    let options = EvalOptions {
        expression: "1 / 0".to_string(),
        ..EvalOptions::default()
    };
    let err = execute_eval(&options).unwrap_err();
    assert!(matches!(err, CliError::Eval(_)));
    assert!(err.to_string().starts_with("Evaluation error [DIVISION_BY_ZERO]: "));
}
