mod common;

use anise_lang::{
    ExpressionParser, ParseErrorKind, ParserConfig, StandardEvaluationContext, TemplateContext,
    Value,
};
use common::{context_with, person, person_in};
use pretty_assertions::assert_eq;

fn parser() -> ExpressionParser {
    ExpressionParser::new(ParserConfig::interpreted())
}

fn render(text: &str, root: Value) -> String {
    let template = parser()
        .parse_template(text, &TemplateContext::default())
        .unwrap();
    template.evaluate_string(&context_with(root)).unwrap()
}

#[test]
fn test_literal_and_embedded_parts() {
    let test_cases = vec![
        ("Hello #{name}", "Hello Ada"),
        ("#{name} is #{age}", "Ada is 36"),
        ("#{name}#{age}", "Ada36"),
        ("no expressions here", "no expressions here"),
        ("", ""),
        ("#{name.toUpperCase()}!", "ADA!"),
        ("lives in #{address?.city ?: 'nowhere'}", "lives in nowhere"),
        ("braces #{ {1, 2}.size() } inside", "braces 2 inside"),
    ];

    for (input, expected) in test_cases {
        assert_eq!(render(input, person("Ada", 36)), expected, "template: {}", input);
    }
}

#[test]
fn test_single_expression_keeps_its_value() {
    let template = parser()
        .parse_template("#{age}", &TemplateContext::default())
        .unwrap();
    let ctx = context_with(person("Ada", 36));
    assert_eq!(template.evaluate(&ctx).unwrap(), Value::Int(36));
    assert_eq!(template.evaluate_string(&ctx).unwrap(), "36");
}

#[test]
fn test_null_renders_as_nothing() {
    assert_eq!(render("[#{address}]", person("Ada", 36)), "[]");
    assert_eq!(render("#{address}", person("Ada", 36)), "");
}

#[test]
fn test_custom_delimiters() {
    let delimiters = TemplateContext::new("${", "}");
    let template = parser()
        .parse_template("${name} from ${address.city}, not #{name}", &delimiters)
        .unwrap();
    let ctx = context_with(person_in("Ada", 36, "London"));
    assert_eq!(
        template.evaluate_string(&ctx).unwrap(),
        "Ada from London, not #{name}"
    );

    let wide = TemplateContext::new("<<", ">>");
    let template = parser().parse_template("<<1 + 1>> and <<'>'>>", &wide).unwrap();
    assert_eq!(
        template
            .evaluate_string(&StandardEvaluationContext::new())
            .unwrap(),
        "2 and >"
    );
}

#[test]
fn test_quoted_suffix_does_not_close_the_expression() {
    assert_eq!(render("x#{'}' + name}y", person("Ada", 36)), "x}Aday");
}

#[test]
fn test_expression_string_is_the_source() {
    let text = "Hello #{name}";
    let template = parser()
        .parse_template(text, &TemplateContext::default())
        .unwrap();
    assert_eq!(template.expression_string(), text);
    assert_eq!(template.parts().len(), 2);
}

#[test]
fn test_template_parse_errors() {
    let delimiters = TemplateContext::default();
    let test_cases = vec![
        (
            "a #{1 + 2",
            ParseErrorKind::UnclosedTemplate {
                suffix: "}".to_string(),
            },
            2,
        ),
        (
            "#{ }",
            ParseErrorKind::EmptyTemplateExpression {
                delimiter: "#{}".to_string(),
            },
            0,
        ),
        (
            "ab #{1 +} c",
            ParseErrorKind::RightOperandProblem("+".to_string()),
            7,
        ),
    ];

    for (input, kind, position) in test_cases {
        let err = parser().parse_template(input, &delimiters).unwrap_err();
        assert_eq!(err.kind, kind, "template: {}", input);
        assert_eq!(err.position, position, "template: {}", input);
    }
}

#[test]
fn test_evaluation_errors_surface() {
    let template = parser()
        .parse_template("hi #{nickname}", &TemplateContext::default())
        .unwrap();
    let err = template
        .evaluate(&context_with(person("Ada", 36)))
        .unwrap_err();
    assert_eq!(err.code(), "PROPERTY_OR_FIELD_NOT_READABLE");
}
