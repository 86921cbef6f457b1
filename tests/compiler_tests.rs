mod common;

use anise_lang::{
    CompilerMode, EvaluationContext, ExpressionParser, ParserConfig, StandardEvaluationContext,
    Value,
};
use common::{context_with, person, person_in};
use pretty_assertions::assert_eq;

fn parser(mode: CompilerMode) -> ExpressionParser {
    ExpressionParser::new(ParserConfig::interpreted().with_compiler_mode(mode))
}

fn mixed(threshold: u32) -> ExpressionParser {
    ExpressionParser::new(
        ParserConfig::interpreted()
            .with_compiler_mode(CompilerMode::Mixed)
            .with_compile_threshold(threshold),
    )
}

#[test]
fn test_compiled_results_match_interpreted_results() {
    let ctx = context_with(person_in("Ada", 36, "London"));
    ctx.set_variable("factor", Value::Int(3));
    let expressions = [
        "1 + 2 * 3",
        "7 / 2 + 1L",
        "2.5 * 2",
        "'abc' + 1 + 'd'",
        "name",
        "name.toUpperCase()",
        "name.length() > 2 and adult",
        "age * #factor",
        "age > 50 ? 'senior' : 'junior'",
        "address.city",
        "address?.city ?: 'nowhere'",
        "#root.name + #this.age",
        "greet('Bob')",
        "T(Math).max(age, 40)",
        "T(Integer).MAX_VALUE",
        "{1, 2, 3}[1] + {a: 5}['a']",
        "name[0]",
        "!(age < 18) or false",
        "name matches 'A.*'",
        "age instanceof T(Integer)",
        "-age",
        "new BigDecimal('1.5') + 1",
    ];

    let interpreter = parser(CompilerMode::Off);
    let compiler = parser(CompilerMode::Immediate);
    for text in expressions {
        let expected = interpreter.parse_expression(text).unwrap().evaluate(&ctx).unwrap();
        let expr = compiler.parse_expression(text).unwrap();
        for _ in 0..3 {
            assert_eq!(expr.evaluate(&ctx).unwrap(), expected, "expression: {}", text);
        }
        assert!(expr.is_compiled(), "expression should compile: {}", text);
    }
}

#[test]
fn test_off_mode_never_compiles() {
    let expr = parser(CompilerMode::Off).parse_expression("1 + 1").unwrap();
    for _ in 0..200 {
        expr.evaluate_default().unwrap();
    }
    assert!(!expr.is_compiled());
    assert!(expr.compile());
    assert!(expr.is_compiled());
}

#[test]
fn test_mixed_mode_compiles_after_threshold() {
    let expr = mixed(3).parse_expression("#root * 2").unwrap();
    let ctx = StandardEvaluationContext::new();
    for _ in 0..2 {
        assert_eq!(expr.evaluate_with_root(&ctx, Value::Int(4)).unwrap(), Value::Int(8));
        assert!(!expr.is_compiled());
    }
    assert_eq!(expr.evaluate_with_root(&ctx, Value::Int(4)).unwrap(), Value::Int(8));
    assert!(expr.is_compiled());
    assert_eq!(expr.evaluate_with_root(&ctx, Value::Int(5)).unwrap(), Value::Int(10));
}

#[test]
fn test_default_threshold_is_one_hundred() {
    let config = ParserConfig::interpreted().with_compiler_mode(CompilerMode::Mixed);
    assert_eq!(config.compile_threshold, 100);
    assert_eq!(config.max_failed_compilations, 100);

    let expr = ExpressionParser::new(config).parse_expression("1 + 1").unwrap();
    for _ in 0..99 {
        expr.evaluate_default().unwrap();
    }
    assert!(!expr.is_compiled());
    expr.evaluate_default().unwrap();
    assert!(expr.is_compiled());
}

#[test]
fn test_mixed_mode_reverts_when_operand_types_change() {
    let expr = mixed(2).parse_expression("#root + 1").unwrap();
    let ctx = StandardEvaluationContext::new();
    expr.evaluate_with_root(&ctx, Value::Int(1)).unwrap();
    expr.evaluate_with_root(&ctx, Value::Int(1)).unwrap();
    assert!(expr.is_compiled());

    assert_eq!(expr.evaluate_with_root(&ctx, Value::Long(1)).unwrap(), Value::Long(2));
    assert!(!expr.is_compiled());
    assert_eq!(
        expr.evaluate_with_root(&ctx, Value::string("a")).unwrap(),
        Value::string("a1")
    );
}

#[test]
fn test_mixed_mode_reverts_when_root_type_changes() {
    let expr = mixed(2).parse_expression("name").unwrap();
    let ctx = context_with(person("Ada", 36));
    expr.evaluate(&ctx).unwrap();
    expr.evaluate(&ctx).unwrap();
    assert!(expr.is_compiled());

    let mut map = indexmap::IndexMap::new();
    map.insert(Value::string("name"), Value::string("from a map"));
    assert_eq!(
        expr.evaluate_with_root(&ctx, Value::map(map)).unwrap(),
        Value::string("from a map")
    );
    assert!(!expr.is_compiled());
}

#[test]
fn test_immediate_mode_wraps_compiled_failures() {
    let expr = parser(CompilerMode::Immediate).parse_expression("#root + 1").unwrap();
    let ctx = StandardEvaluationContext::new();
    expr.evaluate_with_root(&ctx, Value::Int(1)).unwrap();
    assert!(expr.is_compiled());

    let err = expr.evaluate_with_root(&ctx, Value::Long(1)).unwrap_err();
    assert_eq!(err.code(), "EXCEPTION_RUNNING_COMPILED_EXPRESSION");
    assert!(expr.is_compiled());
}

#[test]
fn test_compiled_errors_keep_their_meaning() {
    let expr = parser(CompilerMode::Immediate).parse_expression("10 / #d").unwrap();
    let ctx = StandardEvaluationContext::new();
    ctx.set_variable("d", Value::Int(2));
    expr.evaluate(&ctx).unwrap();
    assert!(expr.is_compiled());

    ctx.set_variable("d", Value::Int(0));
    let err = expr.evaluate(&ctx).unwrap_err();
    assert_eq!(err.code(), "EXCEPTION_RUNNING_COMPILED_EXPRESSION");
}

#[test]
fn test_uncompilable_expressions_stay_interpreted() {
    let ctx = StandardEvaluationContext::new();
    ctx.set_variable("i", Value::Int(0));
    let expressions = [
        ("{1, 2, 3}.?[#this > 1]", None),
        ("{1, 2}.![#this * 2]", None),
        ("2 between {1, 3}", Some(Value::Boolean(true))),
        ("#i = 5", Some(Value::Int(5))),
        ("new int[2]", None),
        ("{a: #i}", None),
    ];

    let compiler = parser(CompilerMode::Immediate);
    for (text, expected) in expressions {
        let expr = compiler.parse_expression(text).unwrap();
        for _ in 0..5 {
            let value = expr.evaluate(&ctx).unwrap();
            if let Some(expected) = &expected {
                assert_eq!(&value, expected, "expression: {}", text);
            }
        }
        assert!(!expr.is_compiled(), "expression should not compile: {}", text);
    }
}

#[test]
fn test_unvisited_branches_stay_interpreted() {
    // `city` has never been read, so there is nothing to specialize on
    let ctx = context_with(person("Ada", 36));
    let expr = parser(CompilerMode::Immediate)
        .parse_expression("address?.city")
        .unwrap();
    for _ in 0..3 {
        assert_eq!(expr.evaluate(&ctx).unwrap(), Value::Null);
    }
    assert!(!expr.is_compiled());
}

#[test]
fn test_failed_compilations_are_budgeted() {
    let mut config = ParserConfig::interpreted().with_compiler_mode(CompilerMode::Immediate);
    config.max_failed_compilations = 2;
    let expr = ExpressionParser::new(config)
        .parse_expression("{1, 2}.?[#this > 1]")
        .unwrap();
    for _ in 0..10 {
        assert_eq!(
            expr.evaluate_default().unwrap(),
            Value::list(vec![Value::Int(2)])
        );
    }
    assert!(!expr.compile());

    expr.revert_to_interpreted();
    assert!(!expr.compile());
}

#[test]
fn test_rebound_function_is_not_called_by_compiled_code() {
    use anise_lang::types::MethodInfo;

    let ctx = StandardEvaluationContext::new();
    ctx.register_function("one", MethodInfo::static_fn("one", vec![], |_| Ok(Value::Int(1))))
        .unwrap();
    let expr = mixed(2).parse_expression("#one() + 1").unwrap();
    assert_eq!(expr.evaluate(&ctx).unwrap(), Value::Int(2));
    assert_eq!(expr.evaluate(&ctx).unwrap(), Value::Int(2));
    assert!(expr.is_compiled());

    ctx.register_function("one", MethodInfo::static_fn("one", vec![], |_| Ok(Value::Int(10))))
        .unwrap();
    assert_eq!(expr.evaluate(&ctx).unwrap(), Value::Int(11));
    assert!(!expr.is_compiled());
}

#[test]
fn test_compiled_expressions_are_shared_across_threads() {
    let expr = std::sync::Arc::new(
        parser(CompilerMode::Immediate)
            .parse_expression("#root * #root")
            .unwrap(),
    );
    let handles: Vec<_> = (0..4)
        .map(|n| {
            let expr = expr.clone();
            std::thread::spawn(move || {
                let ctx = StandardEvaluationContext::new();
                (0..50)
                    .map(|_| expr.evaluate_with_root(&ctx, Value::Int(n)).unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();
    for (n, handle) in handles.into_iter().enumerate() {
        let n = n as i32;
        assert!(handle.join().unwrap().iter().all(|v| *v == Value::Int(n * n)));
    }
    assert!(expr.is_compiled());
}

#[test]
fn test_context_lookup_is_live_in_compiled_code() {
    let ctx = StandardEvaluationContext::new();
    ctx.set_variable("x", Value::Int(1));
    let expr = parser(CompilerMode::Immediate).parse_expression("#x").unwrap();
    expr.evaluate(&ctx).unwrap();
    assert!(expr.is_compiled());
    ctx.set_variable("x", Value::string("changed"));
    assert_eq!(expr.evaluate(&ctx).unwrap(), Value::string("changed"));
    assert_eq!(ctx.lookup_variable("x"), Some(Value::string("changed")));
}

/// Answers `path` with "interpreted" when read through the accessor and
/// "compiled" when read through its specialized form.
#[derive(Debug)]
struct PathAccessor;

impl anise_lang::resolve::PropertyAccessor for PathAccessor {
    fn can_read(
        &self,
        _ctx: &dyn EvaluationContext,
        _target: &Value,
        name: &str,
    ) -> Result<bool, anise_lang::AccessError> {
        Ok(name == "path")
    }

    fn read(
        &self,
        _ctx: &dyn EvaluationContext,
        _target: &Value,
        _name: &str,
    ) -> Result<anise_lang::TypedValue, anise_lang::AccessError> {
        Ok(anise_lang::TypedValue::new(Value::string("interpreted")))
    }

    fn specialize_read(
        &self,
        _target_type: &anise_lang::TypeRef,
        _is_static: bool,
        _name: &str,
    ) -> Option<anise_lang::resolve::ReadFn> {
        Some(std::sync::Arc::new(|_| Ok(Value::string("compiled"))))
    }
}

#[test]
fn test_compiled_path_takes_over_after_threshold() {
    let mut ctx = context_with(person("Ada", 36));
    ctx.add_property_accessor(std::sync::Arc::new(PathAccessor));
    let expr = mixed(5).parse_expression("path").unwrap();

    let seen: Vec<Value> = (0..8).map(|_| expr.evaluate(&ctx).unwrap()).collect();
    let interpreted = Value::string("interpreted");
    let compiled = Value::string("compiled");
    assert_eq!(
        seen,
        vec![
            interpreted.clone(),
            interpreted.clone(),
            interpreted.clone(),
            interpreted.clone(),
            interpreted,
            compiled.clone(),
            compiled.clone(),
            compiled,
        ]
    );
}

#[test]
fn test_immediate_mode_compiles_after_first_evaluation() {
    let mut ctx = context_with(person("Ada", 36));
    ctx.add_property_accessor(std::sync::Arc::new(PathAccessor));
    let expr = parser(CompilerMode::Immediate).parse_expression("path").unwrap();

    assert_eq!(expr.evaluate(&ctx).unwrap(), Value::string("interpreted"));
    assert!(expr.is_compiled());
    assert_eq!(expr.evaluate(&ctx).unwrap(), Value::string("compiled"));
}

/// Resolves `path` but never offers a specialized reader, counting how
/// often the compiler asks for one.
#[derive(Debug, Default)]
struct OpaqueAccessor {
    specialize_calls: std::sync::atomic::AtomicUsize,
}

impl anise_lang::resolve::PropertyAccessor for OpaqueAccessor {
    fn can_read(
        &self,
        _ctx: &dyn EvaluationContext,
        _target: &Value,
        name: &str,
    ) -> Result<bool, anise_lang::AccessError> {
        Ok(name == "path")
    }

    fn read(
        &self,
        _ctx: &dyn EvaluationContext,
        _target: &Value,
        _name: &str,
    ) -> Result<anise_lang::TypedValue, anise_lang::AccessError> {
        Ok(anise_lang::TypedValue::new(Value::string("interpreted")))
    }

    fn specialize_read(
        &self,
        _target_type: &anise_lang::TypeRef,
        _is_static: bool,
        _name: &str,
    ) -> Option<anise_lang::resolve::ReadFn> {
        self.specialize_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        None
    }
}

#[test]
fn test_failed_compilation_waits_for_another_threshold() {
    let accessor = std::sync::Arc::new(OpaqueAccessor::default());
    let mut ctx = context_with(person("Ada", 36));
    ctx.add_property_accessor(accessor.clone());
    let expr = mixed(3).parse_expression("path").unwrap();

    for _ in 0..8 {
        assert_eq!(expr.evaluate(&ctx).unwrap(), Value::string("interpreted"));
    }
    assert!(!expr.is_compiled());
    // attempts after the 3rd and 6th evaluations only
    assert_eq!(
        accessor
            .specialize_calls
            .load(std::sync::atomic::Ordering::SeqCst),
        2
    );
}
