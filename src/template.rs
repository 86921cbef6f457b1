//! Template expressions: literal text with embedded expressions.
//!
//! ```text
//! Hello #{name}, you have #{messages.size()} new messages
//! ```
//!
//! Delimiters default to `#{` and `}`. Brackets inside an embedded
//! expression must balance and quoted strings may contain anything, so
//! `#{ {'a':'}'}['a'] }` finds the right closing delimiter.

use crate::{
    context::EvaluationContext,
    error::{EvaluationError, LexErrorKind, ParseError, ParseErrorKind},
    expression::Expression,
    parser::ExpressionParser,
    types::builtins,
    value::Value,
};

/// The delimiters of embedded expressions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateContext {
    pub prefix: String,
    pub suffix: String,
}

impl Default for TemplateContext {
    fn default() -> Self {
        TemplateContext {
            prefix: "#{".to_string(),
            suffix: "}".to_string(),
        }
    }
}

impl TemplateContext {
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        TemplateContext {
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }
}

#[derive(Debug)]
pub enum TemplatePart {
    Literal(String),
    Expression(Expression),
}

/// A parsed template.
///
/// # Example
///
/// ```
/// use anise_lang::{ExpressionParser, StandardEvaluationContext, Value};
/// use anise_lang::template::TemplateContext;
///
/// let parser = ExpressionParser::default();
/// let template = parser
///     .parse_template("1 + 1 = #{1 + 1}", &TemplateContext::default())
///     .unwrap();
/// let ctx = StandardEvaluationContext::new();
/// assert_eq!(template.evaluate(&ctx).unwrap(), Value::string("1 + 1 = 2"));
/// ```
#[derive(Debug)]
pub struct TemplateExpression {
    source: String,
    parts: Vec<TemplatePart>,
}

fn chars_match(chars: &[char], at: usize, needle: &[char]) -> bool {
    chars.len() >= at + needle.len() && chars[at..at + needle.len()] == *needle
}

fn find(chars: &[char], needle: &[char], from: usize) -> Option<usize> {
    (from..chars.len()).find(|&i| chars_match(chars, i, needle))
}

fn closing_for(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}

/// Position of the suffix closing the expression that starts at `from`,
/// skipping balanced brackets and quoted strings. `None` when there is no
/// such suffix.
fn end_of_expression(chars: &[char], suffix: &[char], from: usize) -> Result<Option<usize>, ParseError> {
    if find(chars, suffix, from).is_none() {
        return Ok(None);
    }
    let mut open: Vec<(char, usize)> = Vec::new();
    let mut pos = from;
    while pos < chars.len() {
        if open.is_empty() && chars_match(chars, pos, suffix) {
            return Ok(Some(pos));
        }
        match chars[pos] {
            c @ ('(' | '[' | '{') => open.push((c, pos)),
            c @ (')' | ']' | '}') => match open.pop() {
                Some((opened, _)) if closing_for(opened) == c => {}
                _ => {
                    return Err(ParseError::new(
                        ParseErrorKind::UnbalancedBracket { found: c },
                        pos,
                    ));
                }
            },
            quote @ ('\'' | '"') => {
                let Some(end) = (pos + 1..chars.len()).find(|&i| chars[i] == quote) else {
                    return Err(ParseError::new(
                        ParseErrorKind::Lexical(LexErrorKind::UnterminatedString),
                        pos,
                    ));
                };
                pos = end;
            }
            _ => {}
        }
        pos += 1;
    }
    match open.pop() {
        Some((opened, at)) => Err(ParseError::new(
            ParseErrorKind::Lexical(LexErrorKind::MissingCharacter(closing_for(opened))),
            at,
        )),
        None => Ok(None),
    }
}

impl TemplateExpression {
    pub fn parse(
        text: &str,
        template: &TemplateContext,
        parser: &ExpressionParser,
    ) -> Result<Self, ParseError> {
        let chars: Vec<char> = text.chars().collect();
        let prefix: Vec<char> = template.prefix.chars().collect();
        let suffix: Vec<char> = template.suffix.chars().collect();
        let delimiter = format!("{}{}", template.prefix, template.suffix);
        let mut parts = Vec::new();
        let mut start = 0;

        while start < chars.len() {
            let Some(prefix_at) = find(&chars, &prefix, start) else {
                parts.push(TemplatePart::Literal(chars[start..].iter().collect()));
                break;
            };
            if prefix_at > start {
                parts.push(TemplatePart::Literal(chars[start..prefix_at].iter().collect()));
            }
            let body_start = prefix_at + prefix.len();
            let Some(suffix_at) = end_of_expression(&chars, &suffix, body_start)? else {
                return Err(ParseError::new(
                    ParseErrorKind::UnclosedTemplate {
                        suffix: template.suffix.clone(),
                    },
                    prefix_at,
                ));
            };
            let body: String = chars[body_start..suffix_at].iter().collect();
            let trimmed = body.trim();
            if trimmed.is_empty() {
                return Err(ParseError::new(
                    ParseErrorKind::EmptyTemplateExpression {
                        delimiter: delimiter.clone(),
                    },
                    prefix_at,
                ));
            }
            let offset = body_start + body.chars().take_while(|c| c.is_whitespace()).count();
            let expression = parser
                .parse_expression(trimmed)
                .map_err(|e| ParseError::new(e.kind, e.position + offset))?;
            parts.push(TemplatePart::Expression(expression));
            start = suffix_at + suffix.len();
        }

        Ok(TemplateExpression {
            source: text.to_string(),
            parts,
        })
    }

    pub fn expression_string(&self) -> &str {
        &self.source
    }

    pub fn parts(&self) -> &[TemplatePart] {
        &self.parts
    }

    /// Evaluates the template. A template that is a single embedded
    /// expression yields that expression's value unchanged; otherwise the
    /// parts are joined as text, with null contributing nothing.
    pub fn evaluate(&self, ctx: &dyn EvaluationContext) -> Result<Value, EvaluationError> {
        match self.parts.as_slice() {
            [] => Ok(Value::string("")),
            [TemplatePart::Expression(expression)] => expression.evaluate(ctx),
            parts => {
                let mut text = String::new();
                for part in parts {
                    match part {
                        TemplatePart::Literal(literal) => text.push_str(literal),
                        TemplatePart::Expression(expression) => {
                            let value = expression.evaluate(ctx)?;
                            if let Value::String(s) =
                                ctx.type_converter().convert_value(&value, &builtins().string)?
                            {
                                text.push_str(&s);
                            }
                        }
                    }
                }
                Ok(Value::String(text))
            }
        }
    }

    /// Evaluates and renders the result as text.
    pub fn evaluate_string(&self, ctx: &dyn EvaluationContext) -> Result<String, EvaluationError> {
        Ok(match self.evaluate(ctx)? {
            Value::Null => String::new(),
            Value::String(s) => s,
            other => other.to_string(),
        })
    }
}

#[test]
fn test_brackets_and_quotes_in_embedded_expressions() {
    let parser = ExpressionParser::default();
    let template = TemplateExpression::parse(
        "x#{ {'a':'}'}['a'] }y",
        &TemplateContext::default(),
        &parser,
    )
    .unwrap();
    assert_eq!(template.parts().len(), 3);
    let ctx = crate::context::StandardEvaluationContext::new();
    assert_eq!(template.evaluate_string(&ctx).unwrap(), "x}y");
}

#[test]
fn test_template_errors() {
    let parser = ExpressionParser::default();
    let ctx = TemplateContext::default();
    let unclosed = TemplateExpression::parse("a #{1 + 2", &ctx, &parser).unwrap_err();
    assert!(matches!(unclosed.kind, ParseErrorKind::UnclosedTemplate { .. }));
    assert_eq!(unclosed.position, 2);

    let empty = TemplateExpression::parse("#{  }", &ctx, &parser).unwrap_err();
    assert!(matches!(empty.kind, ParseErrorKind::EmptyTemplateExpression { .. }));

    let stray = TemplateExpression::parse("#{ a) }", &ctx, &parser).unwrap_err();
    assert_eq!(stray.kind, ParseErrorKind::UnbalancedBracket { found: ')' });
}
