// tests/parser_tests.rs

use anise_lang::ast::{BinaryOp, NodeKind, SelectionVariant, Span, StepOp};
use anise_lang::error::{LexErrorKind, ParseError, ParseErrorKind};
use anise_lang::parser::parse_ast;
use anise_lang::{ExpressionParser, ParserConfig, Value};
use pretty_assertions::assert_eq;

fn ast(text: &str) -> String {
    parse_ast(text, &ParserConfig::interpreted())
        .unwrap()
        .to_ast_string()
}

fn error(text: &str) -> ParseError {
    parse_ast(text, &ParserConfig::interpreted()).unwrap_err()
}

// ============================================================================
// Precedence and associativity
// ============================================================================

#[test]
fn test_comparison() {
    let node = parse_ast("price > 100", &ParserConfig::interpreted()).unwrap();
    assert!(matches!(
        node.kind,
        NodeKind::Binary {
            op: BinaryOp::GreaterThan,
            ..
        }
    ));
    assert_eq!(node.span, Span::new(0, 11));
}

#[test]
fn test_parentheses() {
    // Should be: Multiply(Add(1, 2), 3)
    let node = parse_ast("(1 + 2) * 3", &ParserConfig::interpreted()).unwrap();
    match node.kind {
        NodeKind::Binary {
            op: BinaryOp::Multiply,
            left,
            right,
        } => {
            assert!(matches!(left.kind, NodeKind::Binary { op: BinaryOp::Add, .. }));
            assert!(matches!(right.kind, NodeKind::Int(3)));
        }
        other => panic!("expected a multiplication, got {:?}", other),
    }
}

#[test]
fn test_operator_precedence() {
    let test_cases = vec![
        ("1 + 2 * 3", "(1 + (2 * 3))"),
        ("1 - 2 - 3", "((1 - 2) - 3)"),
        ("8 / 4 % 3", "((8 / 4) % 3)"),
        ("2 * 3 ^ 2", "(2 * (3 ^ 2))"),
        ("a and b or c", "((a and b) or c)"),
        ("a && b || !c", "((a and b) or !c)"),
        ("a or b and c", "(a or (b and c))"),
        ("1 + 2 > 2 and true", "(((1 + 2) > 2) and true)"),
        ("x == 1 ? 'one' : 'other'", "((x == 1) ? 'one' : 'other')"),
        ("a ? b : c ? d : e", "(a ? b : (c ? d : e))"),
        ("name ?: 'none'", "(name ?: 'none')"),
        ("x = 1 + 2", "(x = (1 + 2))"),
    ];

    for (input, expected) in test_cases {
        assert_eq!(ast(input), expected, "input: {}", input);
    }
}

#[test]
fn test_textual_operators() {
    assert_eq!(ast("a lt b"), "(a < b)");
    assert_eq!(ast("a GE b"), "(a >= b)");
    assert_eq!(ast("a eq b"), "(a == b)");
    assert_eq!(ast("10 div 2 mod 3"), "((10 / 2) % 3)");
    assert_eq!(ast("not true"), "!true");
    assert_eq!(ast("'abc' matches '[a-c]+'"), "('abc' matches '[a-c]+')");
    assert_eq!(ast("x instanceof T(Integer)"), "(x instanceof T(Integer))");
    assert_eq!(ast("3 between {1, 5}"), "(3 between {1,5})");
}

#[test]
fn test_relational_operators_do_not_chain() {
    let err = error("1 < 2 < 3");
    assert_eq!(err.kind, ParseErrorKind::MoreInput("<".to_string()));
    assert_eq!(err.position, 6);
}

#[test]
fn test_missing_operands_become_null() {
    assert_eq!(ast("?: 'fallback'"), "(null ?: 'fallback')");
    assert_eq!(ast("value ?:"), "(value ?: null)");
}

// ============================================================================
// Unary and step operators
// ============================================================================

#[test]
fn test_unary_operators() {
    assert_eq!(ast("-5"), "-5");
    assert_eq!(ast("+x"), "+x");
    assert_eq!(ast("!!flag"), "!(!flag)");
    assert_eq!(ast("-(-x)"), "-(-x)");
    assert_eq!(ast("-2 ^ 2"), "(-2 ^ 2)");
}

#[test]
fn test_increment_and_decrement() {
    let node = parse_ast("counter++", &ParserConfig::interpreted()).unwrap();
    assert!(matches!(
        node.kind,
        NodeKind::Step {
            op: StepOp::Increment,
            prefix: false,
            ..
        }
    ));
    let node = parse_ast("--counter", &ParserConfig::interpreted()).unwrap();
    assert!(matches!(
        node.kind,
        NodeKind::Step {
            op: StepOp::Decrement,
            prefix: true,
            ..
        }
    ));
    assert_eq!(ast("#i++"), "#i++");
}

// ============================================================================
// Literals
// ============================================================================

#[test]
fn test_literals() {
    let test_cases = vec![
        ("42", "42"),
        ("0x1F", "31"),
        ("7L", "7L"),
        ("1.5f", "1.5f"),
        ("2.5", "2.5"),
        ("'it''s'", "'it''s'"),
        ("\"double\"", "'double'"),
        ("TRUE", "true"),
        ("null", "null"),
    ];

    for (input, expected) in test_cases {
        assert_eq!(ast(input), expected, "input: {}", input);
    }
}

#[test]
fn test_string_literal_unquoting() {
    let node = parse_ast("\"say \"\"hi\"\"\"", &ParserConfig::interpreted()).unwrap();
    assert!(matches!(&node.kind, NodeKind::String(s) if s == "say \"hi\""));
}

#[test]
fn test_number_out_of_range() {
    assert_eq!(
        error("2147483648").kind,
        ParseErrorKind::NotAnInteger("2147483648".to_string())
    );
    assert_eq!(ast("2147483648L"), "2147483648L");
}

#[test]
fn test_inline_collections() {
    assert_eq!(ast("{}"), "{}");
    assert_eq!(ast("{:}"), "{:}");
    assert_eq!(ast("{1, 2, {3}}"), "{1,2,{3}}");
    assert_eq!(ast("{name: 'Ada', 'born': 1815}"), "{name:'Ada','born':1815}");
}

#[test]
fn test_constant_inline_collections_are_folded() {
    let node = parse_ast("{1, {2, 3}}", &ParserConfig::interpreted()).unwrap();
    let NodeKind::InlineList { constant, .. } = &node.kind else {
        panic!("expected an inline list");
    };
    let Some(Value::List(list)) = constant else {
        panic!("expected a folded list");
    };
    assert!(list.is_read_only());
    assert_eq!(list.read().len(), 2);

    let node = parse_ast("{1, x}", &ParserConfig::interpreted()).unwrap();
    assert!(matches!(node.kind, NodeKind::InlineList { constant: None, .. }));

    let node = parse_ast("{a: 1}", &ParserConfig::interpreted()).unwrap();
    assert!(matches!(node.kind, NodeKind::InlineMap { constant: Some(_), .. }));
}

// ============================================================================
// Navigation
// ============================================================================

#[test]
fn test_compound_navigation() {
    assert_eq!(ast("order.customer.name"), "order.customer.name");
    assert_eq!(ast("order?.customer?.name"), "order?.customer?.name");
    assert_eq!(ast("orders[0].lines['sku']"), "orders[0].lines['sku']");
    assert_eq!(ast("name.substring(0, 3)"), "name.substring(0,3)");
    assert_eq!(ast("'abc'.length()"), "'abc'.length()");
    assert_eq!(ast("3.toString()"), "3.toString()");
}

#[test]
fn test_compound_structure() {
    let node = parse_ast("a.b[0]", &ParserConfig::interpreted()).unwrap();
    let NodeKind::Compound(children) = &node.kind else {
        panic!("expected a compound expression");
    };
    let kinds: Vec<&str> = children.iter().map(|c| c.kind_name()).collect();
    assert_eq!(kinds, vec!["PropertyOrFieldReference", "PropertyOrFieldReference", "Indexer"]);
    assert_eq!(node.span, Span::new(0, 6));
}

#[test]
fn test_selection_and_projection() {
    assert_eq!(ast("list.?[#this > 1]"), "list.?[(#this > 1)]");
    assert_eq!(ast("list.^[#this > 1]"), "list.^[(#this > 1)]");
    assert_eq!(ast("list.$[#this > 1]"), "list.$[(#this > 1)]");
    assert_eq!(ast("people.![name]"), "people.![name]");
    assert_eq!(ast("people?.![name]"), "people?.![name]");

    let node = parse_ast("list.^[true]", &ParserConfig::interpreted()).unwrap();
    let NodeKind::Compound(children) = &node.kind else {
        panic!("expected a compound expression");
    };
    assert!(matches!(
        children[1].kind,
        NodeKind::Selection {
            variant: SelectionVariant::First,
            ..
        }
    ));
}

#[test]
fn test_variables_functions_and_beans() {
    assert_eq!(ast("#root"), "#root");
    assert_eq!(ast("#this.name"), "#this.name");
    assert_eq!(ast("#reverse('abc', 2)"), "#reverse('abc',2)");
    assert_eq!(ast("@service.run()"), "@service.run()");
    assert_eq!(ast("&factory"), "&factory");
    assert_eq!(ast("@'name.with.dots'"), "@'name.with.dots'");
}

#[test]
fn test_types_and_constructors() {
    assert_eq!(ast("T(lang.Math).PI"), "T(lang.Math).PI");
    assert_eq!(ast("T(String[][])"), "T(String[][])");
    assert_eq!(ast("new BigDecimal('1.50')"), "new BigDecimal('1.50')");
    assert_eq!(ast("new int[3][]"), "new int[3][]");
    assert_eq!(ast("new String[]{'a', 'b'}"), "new String[]{'a','b'}");
}

#[test]
fn test_keywords_as_map_keys() {
    assert_eq!(ast("map[T]"), "map[T]");
    assert_eq!(ast("map[new]"), "map[new]");
    assert_eq!(ast("map[null]"), "map[null]");
}

// ============================================================================
// Round trip
// ============================================================================

#[test]
fn test_ast_string_reparses_to_the_same_tree() {
    let sources = vec![
        "1 + 2 * 3 - -4",
        "a ?: b ? c : d",
        "{1, 2, 3}.?[#this % 2 == 0].![#this * 10]",
        "T(Math).max(1, 2) between {0, 5}",
        "person?.address?.city ?: 'unknown'",
        "new String[]{'x'}[0] matches '[a-z]'",
        "#fn(x = 3, !y)",
        "map['a''b'][0]++",
        "-(-1)",
        "{k: {1, 2}, 'q': {:}}",
        "@'a.b'.c and &d or true",
    ];

    for source in sources {
        let first = ast(source);
        let second = ast(&first);
        assert_eq!(first, second, "source: {}", source);
    }
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_parse_errors() {
    let test_cases = vec![
        ("", ParseErrorKind::Empty, 0),
        ("1 +", ParseErrorKind::RightOperandProblem("+".to_string()), 2),
        ("* 2", ParseErrorKind::LeftOperandProblem("*".to_string()), 0),
        ("foo(1, 2", ParseErrorKind::RunOutOfArguments, 3),
        ("a.", ParseErrorKind::OutOfData, 1),
        ("a.+", ParseErrorKind::UnexpectedDataAfterDot("+".to_string()), 1),
        ("(1 + 2", ParseErrorKind::OutOfData, 6),
        ("@ 1", ParseErrorKind::InvalidBeanReference, 0),
        ("list.?[]", ParseErrorKind::MissingSelectionExpression, 5),
        ("1 2", ParseErrorKind::MoreInput("2".to_string()), 2),
        ("x + 'open", ParseErrorKind::Lexical(LexErrorKind::UnterminatedString), 4),
    ];

    for (input, kind, position) in test_cases {
        let err = error(input);
        assert_eq!((err.kind, err.position), (kind, position), "input: {}", input);
    }
}

#[test]
fn test_expression_length_limit() {
    let parser = ExpressionParser::new(ParserConfig::interpreted().with_max_expression_length(5));
    let err = parser.parse_expression("1 + 2 + 3").unwrap_err();
    assert_eq!(
        err.kind,
        ParseErrorKind::ExpressionTooLong { length: 9, max: 5 }
    );
    assert!(parser.parse_expression("1 + 2").is_ok());
}

#[test]
fn test_deep_nesting_is_a_parse_error() {
    let max = anise_lang::config::DEFAULT_MAX_NESTING_DEPTH;
    let nested = |depth: usize| format!("{}1{}", "(".repeat(depth), ")".repeat(depth));

    assert_eq!(ast(&nested(max - 1)), "1");
    let err = error(&nested(4_000));
    assert_eq!(err.kind, ParseErrorKind::NestingTooDeep { max });
    assert_eq!(err.position, max);

    let err = error(&format!("{}1{}", "{".repeat(4_000), "}".repeat(4_000)));
    assert_eq!(err.kind, ParseErrorKind::NestingTooDeep { max });
    let err = error(&format!("{}1", "!".repeat(4_000)));
    assert_eq!(err.kind, ParseErrorKind::NestingTooDeep { max });

    let relaxed = ParserConfig::interpreted().with_max_nesting_depth(max + 8);
    assert!(parse_ast(&nested(max + 4), &relaxed).is_ok());
}
