// tests/lexer_tests.rs

use anise_lang::ast::{Token, TokenKind};
use anise_lang::error::LexErrorKind;
use anise_lang::lexer::{Lexer, tokenize};
use pretty_assertions::assert_eq;

fn kinds(text: &str) -> Vec<TokenKind> {
    tokenize(text).unwrap().into_iter().map(|t| t.kind).collect()
}

// ============================================================================
// Single Character Tokens
// ============================================================================

#[test]
fn test_single_char_tokens() {
    let test_cases = vec![
        ("+", TokenKind::Plus),
        ("-", TokenKind::Minus),
        ("*", TokenKind::Star),
        ("/", TokenKind::Div),
        ("%", TokenKind::Mod),
        ("^", TokenKind::Power),
        ("(", TokenKind::LParen),
        (")", TokenKind::RParen),
        ("[", TokenKind::LSquare),
        ("]", TokenKind::RSquare),
        ("{", TokenKind::LCurly),
        ("}", TokenKind::RCurly),
        (",", TokenKind::Comma),
        (":", TokenKind::Colon),
        (".", TokenKind::Dot),
        ("#", TokenKind::Hash),
        ("@", TokenKind::BeanRef),
        ("&", TokenKind::FactoryBeanRef),
        ("?", TokenKind::QMark),
        ("!", TokenKind::Not),
        ("=", TokenKind::Assign),
        ("<", TokenKind::Lt),
        (">", TokenKind::Gt),
    ];

    for (input, expected) in test_cases {
        let mut lexer = Lexer::new(input);
        let token = lexer.next_token().unwrap().unwrap();
        assert_eq!(token.kind, expected, "input: {}", input);
        assert_eq!((token.start, token.end), (0, 1), "input: {}", input);
        assert_eq!(lexer.next_token().unwrap(), None);
    }
}

// ============================================================================
// Multi Character Tokens
// ============================================================================

#[test]
fn test_two_char_tokens() {
    let test_cases = vec![
        ("==", TokenKind::Eq),
        ("!=", TokenKind::Ne),
        ("<=", TokenKind::Le),
        (">=", TokenKind::Ge),
        ("&&", TokenKind::SymbolicAnd),
        ("||", TokenKind::SymbolicOr),
        ("++", TokenKind::Inc),
        ("--", TokenKind::Dec),
        ("?:", TokenKind::Elvis),
        ("?.", TokenKind::SafeNavi),
        ("?[", TokenKind::Select),
        ("^[", TokenKind::SelectFirst),
        ("$[", TokenKind::SelectLast),
        ("![", TokenKind::Project),
    ];

    for (input, expected) in test_cases {
        let tokens = tokenize(input).unwrap();
        assert_eq!(tokens, vec![Token::symbol(expected, 0, 2)], "input: {}", input);
    }
}

#[test]
fn test_textual_operators_are_case_insensitive() {
    assert_eq!(
        kinds("a EQ b Gt c le d"),
        vec![
            TokenKind::Identifier,
            TokenKind::Eq,
            TokenKind::Identifier,
            TokenKind::Gt,
            TokenKind::Identifier,
            TokenKind::Le,
            TokenKind::Identifier,
        ]
    );
}

#[test]
fn test_textual_operator_after_dot_is_a_property() {
    assert_eq!(
        kinds("a.ne"),
        vec![TokenKind::Identifier, TokenKind::Dot, TokenKind::Identifier]
    );
    assert_eq!(
        kinds("a?.div"),
        vec![TokenKind::Identifier, TokenKind::SafeNavi, TokenKind::Identifier]
    );
}

#[test]
fn test_dollar_starts_identifier_unless_selecting() {
    let tokens = tokenize("$name").unwrap();
    assert_eq!(tokens, vec![Token::new(TokenKind::Identifier, "$name", 0, 5)]);
    assert_eq!(kinds("list.$[true]")[2], TokenKind::SelectLast);
}

// ============================================================================
// Numbers
// ============================================================================

#[test]
fn test_number_literals() {
    let test_cases = vec![
        ("42", TokenKind::LiteralInt, "42"),
        ("42L", TokenKind::LiteralLong, "42"),
        ("42l", TokenKind::LiteralLong, "42"),
        ("0xFF", TokenKind::LiteralHexInt, "FF"),
        ("0x1aL", TokenKind::LiteralHexLong, "1a"),
        ("3.14", TokenKind::LiteralReal, "3.14"),
        ("1e10", TokenKind::LiteralReal, "1e10"),
        ("2.5E-3", TokenKind::LiteralReal, "2.5E-3"),
        ("2.5d", TokenKind::LiteralReal, "2.5"),
        ("2.5f", TokenKind::LiteralRealFloat, "2.5"),
        ("7F", TokenKind::LiteralRealFloat, "7"),
    ];

    for (input, kind, text) in test_cases {
        let tokens = tokenize(input).unwrap();
        assert_eq!(tokens.len(), 1, "input: {}", input);
        assert_eq!(tokens[0].kind, kind, "input: {}", input);
        assert_eq!(tokens[0].text, text, "input: {}", input);
        assert_eq!(tokens[0].start, 0);
    }
}

#[test]
fn test_int_then_method_call() {
    assert_eq!(
        kinds("3.toString()"),
        vec![
            TokenKind::LiteralInt,
            TokenKind::Dot,
            TokenKind::Identifier,
            TokenKind::LParen,
            TokenKind::RParen,
        ]
    );
}

#[test]
fn test_malformed_numbers() {
    assert_eq!(tokenize("3.5L").unwrap_err().kind, LexErrorKind::RealCannotBeLong);
    assert!(matches!(
        tokenize("0x").unwrap_err().kind,
        LexErrorKind::MalformedHex(_)
    ));
    let err = tokenize("1 + 2e").unwrap_err();
    assert!(matches!(err.kind, LexErrorKind::MalformedExponent(_)));
    assert_eq!(err.position, 4);
}

// ============================================================================
// Strings
// ============================================================================

#[test]
fn test_string_literals_keep_quotes() {
    let tokens = tokenize("'it''s' \"say \"\"hi\"\"\"").unwrap();
    assert_eq!(tokens[0], Token::new(TokenKind::LiteralString, "'it''s'", 0, 7));
    assert_eq!(tokens[1].kind, TokenKind::LiteralString);
    assert_eq!(tokens[1].text, "\"say \"\"hi\"\"\"");
}

#[test]
fn test_unterminated_strings() {
    let single = tokenize("x + 'abc").unwrap_err();
    assert_eq!(single.kind, LexErrorKind::UnterminatedString);
    assert_eq!(single.position, 4);

    let double = tokenize("\"abc").unwrap_err();
    assert_eq!(double.kind, LexErrorKind::UnterminatedDoubleQuotedString);
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_unsupported_characters() {
    let err = tokenize("a ~ b").unwrap_err();
    assert_eq!(err.kind, LexErrorKind::UnsupportedCharacter('~'));
    assert_eq!(err.position, 2);

    assert_eq!(tokenize("a \\ b").unwrap_err().kind, LexErrorKind::UnexpectedEscape);
}

#[test]
fn test_positions_skip_whitespace() {
    let tokens = tokenize("  foo  ==\n bar").unwrap();
    let spans: Vec<(usize, usize)> = tokens.iter().map(|t| (t.start, t.end)).collect();
    assert_eq!(spans, vec![(2, 5), (7, 9), (11, 14)]);
}
