mod common;

use std::str::FromStr;

use anise_lang::{
    EvaluationContext, ExpressionParser, ParserConfig, StandardEvaluationContext, Value,
};
use common::{context_with, person, person_in};
use indexmap::IndexMap;
use num_bigint::BigInt;
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;

fn parser() -> ExpressionParser {
    ExpressionParser::new(ParserConfig::interpreted())
}

fn eval_on(expr_str: &str, ctx: &dyn EvaluationContext) -> Result<Value, String> {
    let expr = parser().parse_expression(expr_str).map_err(|e| e.to_string())?;
    expr.evaluate(ctx).map_err(|e| format!("{}: {}", e.code(), e))
}

fn eval_expr(expr_str: &str) -> Value {
    eval_on(expr_str, &StandardEvaluationContext::new()).unwrap()
}

fn error_code(expr_str: &str, ctx: &dyn EvaluationContext) -> &'static str {
    let expr = parser().parse_expression(expr_str).unwrap();
    expr.evaluate(ctx).unwrap_err().code()
}

fn strings(items: &[&str]) -> Value {
    Value::list(items.iter().map(|s| Value::string(*s)).collect())
}

fn ints(items: &[i32]) -> Value {
    Value::list(items.iter().map(|n| Value::Int(*n)).collect())
}

// ============================================================================
// Literals and arithmetic
// ============================================================================

#[test]
fn test_literals() {
    assert_eq!(eval_expr("42"), Value::Int(42));
    assert_eq!(eval_expr("0xFF"), Value::Int(255));
    assert_eq!(eval_expr("42L"), Value::Long(42));
    assert_eq!(eval_expr("1.5"), Value::Double(1.5));
    assert_eq!(eval_expr("1.5f"), Value::Float(1.5));
    assert_eq!(eval_expr("'it''s'"), Value::string("it's"));
    assert_eq!(eval_expr("null"), Value::Null);
    assert_eq!(eval_expr("false"), Value::Boolean(false));
}

#[test]
fn test_numeric_ladder() {
    let test_cases = vec![
        ("1 + 2", Value::Int(3)),
        ("1 + 2L", Value::Long(3)),
        ("1 + 1.5f", Value::Float(2.5)),
        ("1L + 1.5f", Value::Float(2.5)),
        ("1.5f + 0.5", Value::Double(2.0)),
        ("7 / 2", Value::Int(3)),
        ("7 % 3", Value::Int(1)),
        ("7.0 / 2", Value::Double(3.5)),
        ("2 ^ 10", Value::Int(1024)),
        ("2 ^ 40", Value::Long(1_099_511_627_776)),
        ("2147483647 + 1", Value::Int(i32::MIN)),
        ("-5", Value::Int(-5)),
    ];

    for (input, expected) in test_cases {
        assert_eq!(eval_expr(input), expected, "input: {}", input);
    }
}

#[test]
fn test_arbitrary_precision_numbers() {
    assert_eq!(
        eval_expr("new BigDecimal('1.50') + 1"),
        Value::BigDecimal(Decimal::from_str("2.50").unwrap())
    );
    assert_eq!(eval_expr("new BigDecimal('1.50').scale()"), Value::Int(2));
    assert_eq!(
        eval_expr("new BigInteger('9223372036854775807') + 1"),
        Value::BigInteger(BigInt::from_str("9223372036854775808").unwrap())
    );
    assert_eq!(
        eval_expr("new BigInteger('2') ^ 100"),
        Value::BigInteger(BigInt::from(2).pow(100))
    );
}

#[test]
fn test_division_by_zero() {
    let ctx = StandardEvaluationContext::new();
    assert_eq!(error_code("1 / 0", &ctx), "DIVISION_BY_ZERO");
    assert_eq!(error_code("1L % 0", &ctx), "DIVISION_BY_ZERO");
    assert_eq!(eval_expr("1.0 / 0"), Value::Double(f64::INFINITY));
}

#[test]
fn test_string_operators() {
    assert_eq!(eval_expr("'a' + 1"), Value::string("a1"));
    assert_eq!(eval_expr("1 + 'a'"), Value::string("1a"));
    assert_eq!(eval_expr("'a' + null"), Value::string("anull"));
    assert_eq!(eval_expr("'ab' * 2"), Value::string("abab"));
    assert_eq!(eval_expr("'d' - 3"), Value::string("a"));
}

// ============================================================================
// Relational and logical operators
// ============================================================================

#[test]
fn test_comparisons() {
    let test_cases = vec![
        ("1 == 1L", true),
        ("1 == 1.0", true),
        ("2 > 1.5", true),
        ("'a' < 'b'", true),
        ("'abc' == 'abc'", true),
        ("null == null", true),
        ("null != 'x'", true),
        ("1 ge 1", true),
        ("3 between {1, 5}", true),
        ("'m' between {'a', 'k'}", false),
        ("'abc' matches '[a-c]+'", true),
        ("'abcd' matches '[a-c]+'", false),
        ("'a' instanceof T(String)", true),
        ("1L instanceof T(Number)", true),
        ("null instanceof T(Object)", false),
    ];

    for (input, expected) in test_cases {
        assert_eq!(eval_expr(input), Value::Boolean(expected), "input: {}", input);
    }
}

#[test]
fn test_comparison_errors() {
    let ctx = StandardEvaluationContext::new();
    assert_eq!(error_code("1 < 'a'", &ctx), "NOT_COMPARABLE");
    assert_eq!(
        error_code("1 between {1}", &ctx),
        "BETWEEN_RIGHT_OPERAND_MUST_BE_TWO_ELEMENT_LIST"
    );
    assert_eq!(
        error_code("1 instanceof 'x'", &ctx),
        "INSTANCEOF_OPERATOR_NEEDS_CLASS_OPERAND"
    );
    assert_eq!(error_code("'a' matches '('", &ctx), "INVALID_PATTERN");
}

#[test]
fn test_logical_operators_short_circuit() {
    // an undefined function fails if it is ever called
    assert_eq!(eval_expr("false and #undefined()"), Value::Boolean(false));
    assert_eq!(eval_expr("true or #undefined()"), Value::Boolean(true));
    assert_eq!(eval_expr("!false && 'x' == 'x'"), Value::Boolean(true));
    assert_eq!(eval_expr("false and (1/0 == 0)"), Value::Boolean(false));
    assert_eq!(eval_expr("true or (1/0 == 0)"), Value::Boolean(true));

    let ctx = StandardEvaluationContext::new();
    assert_eq!(error_code("true and #undefined()", &ctx), "FUNCTION_NOT_DEFINED");
    assert_eq!(error_code("null or true", &ctx), "TYPE_CONVERSION_ERROR");
}

#[test]
fn test_ternary_and_elvis() {
    assert_eq!(eval_expr("1 > 0 ? 'pos' : 'neg'"), Value::string("pos"));
    assert_eq!(eval_expr("null ?: 'fallback'"), Value::string("fallback"));
    assert_eq!(eval_expr("'' ?: 'fallback'"), Value::string("fallback"));
    assert_eq!(eval_expr("'value' ?: 'fallback'"), Value::string("value"));
    assert_eq!(eval_expr("0 ?: 'fallback'"), Value::Int(0));

    let ctx = StandardEvaluationContext::new();
    assert_eq!(error_code("'maybe' ? 1 : 2", &ctx), "TYPE_CONVERSION_ERROR");
}

// ============================================================================
// Collections
// ============================================================================

#[test]
fn test_inline_collections() {
    assert_eq!(eval_expr("{1, 2, 3}"), ints(&[1, 2, 3]));
    assert_eq!(eval_expr("{}"), ints(&[]));

    let mut expected = IndexMap::new();
    expected.insert(Value::string("name"), Value::string("Ada"));
    expected.insert(Value::string("born"), Value::Int(1815));
    assert_eq!(eval_expr("{name: 'Ada', 'born': 1815}"), Value::map(expected));
    assert_eq!(eval_expr("{:}"), Value::map(IndexMap::new()));
}

#[test]
fn test_selection() {
    assert_eq!(eval_expr("{1, 2, 3, 4}.?[#this % 2 == 0]"), ints(&[2, 4]));
    assert_eq!(eval_expr("{1, 2, 3, 4}.^[#this % 2 == 0]"), Value::Int(2));
    assert_eq!(eval_expr("{1, 2, 3, 4}.$[#this % 2 == 0]"), Value::Int(4));
    assert_eq!(eval_expr("{1, 2, 3}.^[#this > 5]"), Value::Null);
    assert_eq!(eval_expr("{'a', 'b', 'c'}.?[#index > 0]"), strings(&["b", "c"]));
}

#[test]
fn test_map_selection_and_projection() {
    let ctx = StandardEvaluationContext::new();
    let selected = eval_on("{a: 1, b: 2, c: 3}.?[value > 1]", &ctx).unwrap();
    assert_eq!(selected.to_string(), "{b=2, c=3}");
    let first = eval_on("{a: 1, b: 2, c: 3}.^[value > 1]", &ctx).unwrap();
    assert_eq!(first.to_string(), "{b=2}");
    assert_eq!(eval_on("{a: 1}.$[value > 1]", &ctx).unwrap(), Value::Null);
    assert_eq!(eval_on("{a: 1, b: 2}.![key]", &ctx).unwrap(), strings(&["a", "b"]));
}

#[test]
fn test_projection() {
    assert_eq!(eval_expr("{1, 2, 3}.![#this * 2]"), ints(&[2, 4, 6]));
    assert_eq!(eval_expr("{'a', 'bb'}.![length()]"), ints(&[1, 2]));
    assert_eq!(eval_expr("{1, 2, 3}.?[#this > 1].![#this * 10]"), ints(&[20, 30]));
}

#[test]
fn test_selection_errors() {
    let ctx = StandardEvaluationContext::new();
    assert_eq!(
        error_code("{1, 2}.?[#this]", &ctx),
        "RESULT_OF_SELECTION_CRITERIA_IS_NOT_BOOLEAN"
    );
    assert_eq!(error_code("'abc'.?[true]", &ctx), "INVALID_TYPE_FOR_SELECTION");
    assert_eq!(error_code("'abc'.![#this]", &ctx), "PROJECTION_NOT_SUPPORTED_ON_TYPE");

    assert_eq!(eval_on("null?.?[#this > 1]", &ctx).unwrap(), Value::Null);
    assert_eq!(eval_on("#root?.?[#this > 1]", &ctx).unwrap(), Value::Null);
    assert_eq!(error_code("null.?[#this > 1]", &ctx), "INVALID_TYPE_FOR_SELECTION");
}

#[test]
fn test_indexing() {
    let ctx = StandardEvaluationContext::new();
    assert_eq!(eval_on("{1, 2, 3}[1]", &ctx).unwrap(), Value::Int(2));
    assert_eq!(eval_on("'abc'[1]", &ctx).unwrap(), Value::string("b"));
    assert_eq!(eval_on("{a: 1}['a']", &ctx).unwrap(), Value::Int(1));
    assert_eq!(eval_on("{a: 1}[a]", &ctx).unwrap(), Value::Int(1));
    assert_eq!(eval_on("{a: 1}['missing']", &ctx).unwrap(), Value::Null);
    assert_eq!(eval_on("new String[]{'x', 'y'}[1]", &ctx).unwrap(), Value::string("y"));

    assert_eq!(error_code("{1}[5]", &ctx), "COLLECTION_INDEX_OUT_OF_BOUNDS");
    assert_eq!(error_code("'abc'[3]", &ctx), "STRING_INDEX_OUT_OF_BOUNDS");
    ctx.set_variable("arr", Value::array(&anise_lang::builtins().integer, vec![Value::Int(1)]));
    assert_eq!(error_code("#arr[1]", &ctx), "ARRAY_INDEX_OUT_OF_BOUNDS");
    assert_eq!(error_code("null[0]", &ctx), "CANNOT_INDEX_INTO_NULL_VALUE");
    assert_eq!(error_code("true[0]", &ctx), "INDEXING_NOT_SUPPORTED_FOR_TYPE");
}

#[test]
fn test_indexer_keys_evaluate_against_the_root() {
    let mut root = IndexMap::new();
    root.insert(Value::string("position"), Value::Int(1));
    root.insert(Value::string("items"), ints(&[10, 20]));
    let ctx = StandardEvaluationContext::with_root(Value::map(root));
    assert_eq!(eval_on("items[position]", &ctx).unwrap(), Value::Int(20));
}

#[test]
fn test_map_indexer_takes_a_bare_name_as_the_key() {
    let mut root = IndexMap::new();
    root.insert(Value::string("key"), Value::string("b"));
    root.insert(
        Value::string("inner"),
        Value::map(IndexMap::from([(Value::string("key"), Value::string("a"))])),
    );
    let ctx = StandardEvaluationContext::with_root(Value::map(root));
    assert_eq!(eval_on("inner[key]", &ctx).unwrap(), Value::string("a"));
}

#[test]
fn test_array_construction() {
    let ctx = StandardEvaluationContext::new();
    assert_eq!(eval_on("new int[3]", &ctx).unwrap().to_string(), "[0, 0, 0]");
    assert_eq!(eval_on("new boolean[1]", &ctx).unwrap().to_string(), "[false]");
    assert_eq!(eval_on("new String[2]", &ctx).unwrap().to_string(), "[null, null]");
    assert_eq!(eval_on("new int[2][3]", &ctx).unwrap().to_string(), "[[0, 0, 0], [0, 0, 0]]");
    assert_eq!(eval_on("new int[]{1, 2}.length", &ctx).unwrap(), Value::Int(2));

    assert_eq!(error_code("new int[-1]", &ctx), "NEGATIVE_ARRAY_SIZE");
    assert_eq!(error_code("new int[]", &ctx), "MISSING_ARRAY_DIMENSION");
    assert_eq!(error_code("new int[3]{1, 2}", &ctx), "INITIALIZER_LENGTH_INCORRECT");
    assert_eq!(
        error_code("new int[][]{{1}}", &ctx),
        "MULTIDIM_ARRAY_INITIALIZER_NOT_SUPPORTED"
    );
}

// ============================================================================
// Navigation over host objects
// ============================================================================

#[test]
fn test_property_navigation() {
    let ctx = context_with(person_in("Ada", 36, "London"));
    assert_eq!(eval_on("name", &ctx).unwrap(), Value::string("Ada"));
    assert_eq!(eval_on("adult", &ctx).unwrap(), Value::Boolean(true));
    assert_eq!(eval_on("address.city", &ctx).unwrap(), Value::string("London"));
    assert_eq!(eval_on("#root.age + 1", &ctx).unwrap(), Value::Int(37));
    assert_eq!(eval_on("#this.name.length()", &ctx).unwrap(), Value::Int(3));
    assert_eq!(eval_on("['name']", &ctx).unwrap(), Value::string("Ada"));
}

#[test]
fn test_is_prefix_reads_boolean_getters_only() {
    let ctx = context_with(person("Ada", 36));
    assert_eq!(eval_on("adult", &ctx).unwrap(), Value::Boolean(true));
    assert_eq!(error_code("registered", &ctx), "PROPERTY_OR_FIELD_NOT_READABLE");
    assert_eq!(eval_on("isRegistered()", &ctx).unwrap(), Value::string("pending"));
}

#[test]
fn test_null_safe_navigation() {
    let ctx = context_with(person("Ada", 36));
    assert_eq!(eval_on("address?.city", &ctx).unwrap(), Value::Null);
    assert_eq!(eval_on("address?.city?.length()", &ctx).unwrap(), Value::Null);
    assert_eq!(
        error_code("address.city", &ctx),
        "PROPERTY_OR_FIELD_NOT_READABLE_ON_NULL"
    );
    assert_eq!(
        error_code("address.city.length()", &ctx),
        "PROPERTY_OR_FIELD_NOT_READABLE_ON_NULL"
    );
    assert_eq!(error_code("nickname", &ctx), "PROPERTY_OR_FIELD_NOT_READABLE");
}

#[test]
fn test_error_positions_point_at_the_failing_node() {
    let ctx = context_with(person("Ada", 36));
    let expr = parser().parse_expression("name + nickname").unwrap();
    let err = expr.evaluate(&ctx).unwrap_err();
    assert_eq!(err.code(), "PROPERTY_OR_FIELD_NOT_READABLE");
    assert_eq!(err.position, Some(7));
}

#[test]
fn test_method_calls() {
    let ctx = context_with(person("Ada", 36));
    assert_eq!(eval_on("greet('Bob')", &ctx).unwrap(), Value::string("Hello Bob, I am Ada"));
    assert_eq!(eval_on("name.toUpperCase()", &ctx).unwrap(), Value::string("ADA"));
    assert_eq!(eval_on("'abcdef'.substring(1, 3)", &ctx).unwrap(), Value::string("bc"));
    assert_eq!(eval_on("'a,b,,'.split(',').length", &ctx).unwrap(), Value::Int(2));
    assert_eq!(eval_on("{1, 2}.size()", &ctx).unwrap(), Value::Int(2));
    assert_eq!(eval_on("address?.toString()", &ctx).unwrap(), Value::Null);

    assert_eq!(error_code("greet()", &ctx), "METHOD_NOT_FOUND");
    assert_eq!(error_code("fail()", &ctx), "EXCEPTION_DURING_METHOD_INVOCATION");
    assert_eq!(
        error_code("address.toString()", &ctx),
        "METHOD_CALL_ON_NULL_OBJECT_NOT_ALLOWED"
    );
}

#[test]
fn test_method_arguments_see_the_root() {
    let ctx = context_with(person("Ada", 36));
    assert_eq!(eval_on("'x'.concat(name)", &ctx).unwrap(), Value::string("xAda"));
}

#[test]
fn test_overload_resolution() {
    let ctx = context_with(person("Ada", 36));
    assert_eq!(eval_on("describe('text')", &ctx).unwrap(), Value::string("string"));
    assert_eq!(eval_on("describe(1)", &ctx).unwrap(), Value::string("object"));
    assert_eq!(eval_on("weigh(5L)", &ctx).unwrap(), Value::string("number"));
    assert_eq!(eval_on("weigh('five')", &ctx).unwrap(), Value::string("object"));
}

#[test]
fn test_argument_conversion() {
    let ctx = StandardEvaluationContext::new();
    assert_eq!(eval_on("'abc'.substring('1')", &ctx).unwrap(), Value::string("bc"));
    assert_eq!(eval_on("T(Math).max(1L, 2L)", &ctx).unwrap(), Value::Long(2));
}

#[test]
fn test_types_and_statics() {
    let ctx = StandardEvaluationContext::new();
    assert_eq!(eval_on("T(Math).max(3, 7)", &ctx).unwrap(), Value::Int(7));
    assert_eq!(eval_on("T(Integer).MAX_VALUE", &ctx).unwrap(), Value::Int(i32::MAX));
    assert_eq!(eval_on("T(lang.Integer).name", &ctx).unwrap(), Value::string("lang.Integer"));
    assert_eq!(eval_on("T(Integer).parseInt('12') + 1", &ctx).unwrap(), Value::Int(13));
    assert_eq!(eval_on("T(String[]).name", &ctx).unwrap(), Value::string("lang.String[]"));
    assert_eq!(error_code("T(NoSuchType)", &ctx), "TYPE_NOT_FOUND");
}

#[test]
fn test_constructors() {
    let ctx = context_with(Value::Null);
    assert_eq!(eval_on("new Person('Ann', 30).name", &ctx).unwrap(), Value::string("Ann"));
    assert_eq!(eval_on("new demo.Person('Ann', 30).age", &ctx).unwrap(), Value::Int(30));
    assert_eq!(eval_on("new String('s')", &ctx).unwrap(), Value::string("s"));
    assert_eq!(error_code("new Person('Ann')", &ctx), "CONSTRUCTOR_NOT_FOUND");
}

// ============================================================================
// Variables, functions and assignment
// ============================================================================

#[test]
fn test_variables() {
    let ctx = StandardEvaluationContext::new();
    ctx.set_variable("greeting", Value::string("hi"));
    assert_eq!(eval_on("#greeting + '!'", &ctx).unwrap(), Value::string("hi!"));
    assert_eq!(eval_on("#unset", &ctx).unwrap(), Value::Null);
    assert_eq!(eval_on("#x = 5", &ctx).unwrap(), Value::Int(5));
    assert_eq!(ctx.lookup_variable("x"), Some(Value::Int(5)));
}

#[test]
fn test_increment_and_decrement() {
    let ctx = StandardEvaluationContext::new();
    ctx.set_variable("i", Value::Int(1));
    assert_eq!(eval_on("#i++", &ctx).unwrap(), Value::Int(1));
    assert_eq!(ctx.lookup_variable("i"), Some(Value::Int(2)));
    assert_eq!(eval_on("++#i", &ctx).unwrap(), Value::Int(3));
    assert_eq!(eval_on("--#i", &ctx).unwrap(), Value::Int(2));

    assert_eq!(error_code("1++", &ctx), "OPERAND_NOT_INCREMENTABLE");
    assert_eq!(error_code("--'a'", &ctx), "OPERAND_NOT_DECREMENTABLE");
}

#[test]
fn test_property_assignment() {
    let ctx = context_with(person("Ada", 36));
    assert_eq!(eval_on("name = 'Grace'", &ctx).unwrap(), Value::string("Grace"));
    assert_eq!(eval_on("name", &ctx).unwrap(), Value::string("Grace"));
    assert_eq!(error_code("age = 1", &ctx), "PROPERTY_OR_FIELD_NOT_WRITABLE");
    assert_eq!(error_code("#root = 1", &ctx), "VARIABLE_NOT_ASSIGNABLE");
    assert_eq!(error_code("'a' = 1", &ctx), "NOT_ASSIGNABLE");
}

#[test]
fn test_collection_assignment() {
    let list = Value::list(vec![Value::Int(1), Value::Int(2)]);
    let ctx = StandardEvaluationContext::with_root(list.clone());
    assert_eq!(eval_on("[0] = 10", &ctx).unwrap(), Value::Int(10));
    assert_eq!(list, ints(&[10, 2]));
    assert_eq!(error_code("{1, 2}[0] = 3", &ctx), "UNMODIFIABLE_COLLECTION");

    let map = Value::map(IndexMap::new());
    let ctx = StandardEvaluationContext::with_root(map.clone());
    eval_on("['k'] = 'v'", &ctx).unwrap();
    eval_on("other = 'w'", &ctx).unwrap();
    assert_eq!(map.to_string(), "{k=v, other=w}");
}

#[test]
fn test_expression_assign_and_writability() {
    let ctx = context_with(person("Ada", 36));
    let name = parser().parse_expression("name").unwrap();
    assert!(name.is_writable(&ctx).unwrap());
    name.assign(&ctx, Value::string("Lin")).unwrap();
    assert_eq!(name.evaluate(&ctx).unwrap(), Value::string("Lin"));

    let age = parser().parse_expression("age").unwrap();
    assert!(!age.is_writable(&ctx).unwrap());
    let literal = parser().parse_expression("'x'").unwrap();
    assert!(!literal.is_writable(&ctx).unwrap());
}

#[test]
fn test_registered_functions() {
    use anise_lang::error::AccessError;
    use anise_lang::types::MethodInfo;

    let b = anise_lang::builtins();
    let ctx = StandardEvaluationContext::new();
    ctx.register_function(
        "reverse",
        MethodInfo::static_fn("reverse", vec![b.string.clone()], |args| match args {
            [Value::String(s)] => Ok(Value::String(s.chars().rev().collect())),
            _ => Err(AccessError::incompatible("expected a string")),
        }),
    )
    .unwrap();
    ctx.register_function(
        "explode",
        MethodInfo::static_fn("explode", vec![], |_| Err(AccessError::invocation("bang"))),
    )
    .unwrap();

    assert_eq!(eval_on("#reverse('abc')", &ctx).unwrap(), Value::string("cba"));
    assert_eq!(eval_on("#reverse(123)", &ctx).unwrap(), Value::string("321"));
    assert_eq!(
        eval_on("{'ab', 'cd'}.![#reverse(#this)]", &ctx).unwrap(),
        strings(&["ba", "dc"])
    );
    assert_eq!(
        error_code("#reverse('a', 'b')", &ctx),
        "INCORRECT_NUMBER_OF_ARGUMENTS_TO_FUNCTION"
    );
    assert_eq!(error_code("#explode()", &ctx), "EXCEPTION_DURING_FUNCTION_CALL");
    assert_eq!(error_code("#missing()", &ctx), "FUNCTION_NOT_DEFINED");

    ctx.set_variable("notAFunction", Value::Int(1));
    assert_eq!(
        error_code("#notAFunction()", &ctx),
        "FUNCTION_REFERENCE_CANNOT_BE_INVOKED"
    );
}

#[test]
fn test_varargs_functions() {
    let ctx = StandardEvaluationContext::new();
    assert_eq!(
        eval_on("T(String).join('-', 'a', 'b', 'c')", &ctx).unwrap(),
        Value::string("a-b-c")
    );
    assert_eq!(eval_on("T(String).join('-')", &ctx).unwrap(), Value::string(""));
}

#[test]
fn test_evaluate_as_rust_types() {
    let ctx = StandardEvaluationContext::new();
    let expr = parser().parse_expression("'7'").unwrap();
    assert_eq!(expr.evaluate_as::<i64>(&ctx).unwrap(), 7);
    assert_eq!(expr.evaluate_as::<String>(&ctx).unwrap(), "7");
    let flag = parser().parse_expression("'true'").unwrap();
    assert!(flag.evaluate_as::<bool>(&ctx).unwrap());
    let bad = parser().parse_expression("'seven'").unwrap();
    assert!(bad.evaluate_as::<i32>(&ctx).is_err());
}

#[test]
fn test_evaluate_with_root() {
    let ctx = StandardEvaluationContext::new();
    let expr = parser().parse_expression("#root * 2").unwrap();
    assert_eq!(expr.evaluate_with_root(&ctx, Value::Int(21)).unwrap(), Value::Int(42));
    assert_eq!(anise_lang::eval("{1, 2}.size() + 1").unwrap(), Value::Int(3));
}

// ============================================================================
// Accessor caching
// ============================================================================

#[derive(Debug, Default)]
struct CountingAccessor {
    can_read_calls: std::sync::atomic::AtomicUsize,
}

impl anise_lang::resolve::PropertyAccessor for CountingAccessor {
    fn can_read(
        &self,
        _ctx: &dyn EvaluationContext,
        _target: &Value,
        name: &str,
    ) -> Result<bool, anise_lang::AccessError> {
        self.can_read_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(name == "answer")
    }

    fn read(
        &self,
        _ctx: &dyn EvaluationContext,
        _target: &Value,
        _name: &str,
    ) -> Result<anise_lang::TypedValue, anise_lang::AccessError> {
        Ok(anise_lang::TypedValue::new(Value::Int(42)))
    }
}

#[test]
fn test_resolved_accessor_is_cached_per_node() {
    let accessor = std::sync::Arc::new(CountingAccessor::default());
    let mut ctx = StandardEvaluationContext::new();
    ctx.add_property_accessor(accessor.clone());

    // two instances of the same runtime type share the resolved accessor
    let expr = parser().parse_expression("answer").unwrap();
    for root in [person("Ada", 36), person("Bob", 20), person("Ada", 36)] {
        assert_eq!(expr.evaluate_with_root(&ctx, root).unwrap(), Value::Int(42));
    }
    assert_eq!(
        accessor
            .can_read_calls
            .load(std::sync::atomic::Ordering::SeqCst),
        1
    );
}
