use crate::ast::{Token, TokenKind};
use crate::error::{LexError, LexErrorKind};

/// Word forms of operators, matched case-insensitively.
const TEXTUAL_OPERATORS: [(&str, TokenKind); 9] = [
    ("div", TokenKind::Div),
    ("eq", TokenKind::Eq),
    ("ge", TokenKind::Ge),
    ("gt", TokenKind::Gt),
    ("le", TokenKind::Le),
    ("lt", TokenKind::Lt),
    ("mod", TokenKind::Mod),
    ("ne", TokenKind::Ne),
    ("not", TokenKind::Not),
];

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    last_kind: Option<TokenKind>,
}

/// Splits `text` into tokens.
pub fn tokenize(text: &str) -> Result<Vec<Token>, LexError> {
    let mut lexer = Lexer::new(text);
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next_token()? {
        tokens.push(token);
    }
    Ok(tokens)
}

fn is_identifier_start(ch: char) -> bool {
    ch == '_' || ch == '$' || ((ch as u32) < 256 && ch.is_alphabetic())
}

fn is_identifier_part(ch: char) -> bool {
    is_identifier_start(ch) || ch.is_ascii_digit()
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            position: 0,
            last_kind: None,
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char() {
            if matches!(ch, ' ' | '\t' | '\r' | '\n') {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn slice(&self, start: usize, end: usize) -> String {
        self.input[start..end].iter().collect()
    }

    fn error(&self, kind: LexErrorKind, position: usize) -> LexError {
        LexError::new(kind, position)
    }

    /// One-char token, or the two-char token when the next char is `second`.
    fn one_or_two(&mut self, single: TokenKind, second: char, double: TokenKind) -> Token {
        let start = self.position;
        if self.peek_char(1) == Some(second) {
            self.position += 2;
            Token::symbol(double, start, start + 2)
        } else {
            self.advance();
            Token::symbol(single, start, start + 1)
        }
    }

    fn single(&mut self, kind: TokenKind) -> Token {
        let start = self.position;
        self.advance();
        Token::symbol(kind, start, start + 1)
    }

    fn double(&mut self, kind: TokenKind) -> Token {
        let start = self.position;
        self.position += 2;
        Token::symbol(kind, start, start + 2)
    }

    fn read_identifier(&mut self) -> Token {
        let start = self.position;
        while let Some(ch) = self.current_char() {
            if is_identifier_part(ch) {
                self.advance();
            } else {
                break;
            }
        }
        let text = self.slice(start, self.position);

        // `foo.ne` names a property, not an operator
        let after_dot = matches!(
            self.last_kind,
            Some(TokenKind::Dot) | Some(TokenKind::SafeNavi)
        );
        if !after_dot && (text.len() == 2 || text.len() == 3) {
            let lower = text.to_ascii_lowercase();
            if let Some((_, kind)) = TEXTUAL_OPERATORS.iter().find(|(w, _)| *w == lower) {
                return Token::new(*kind, text, start, self.position);
            }
        }
        Token::new(TokenKind::Identifier, text, start, self.position)
    }

    /// Reads a quoted string; a doubled quote stands for one quote char.
    /// The token text keeps the surrounding quotes.
    fn read_string(&mut self, quote: char) -> Result<Token, LexError> {
        let start = self.position;
        self.advance(); // opening quote

        loop {
            match self.current_char() {
                Some(ch) if ch == quote => {
                    if self.peek_char(1) == Some(quote) {
                        self.position += 2;
                    } else {
                        self.advance();
                        break;
                    }
                }
                Some(_) => self.advance(),
                None => {
                    let kind = if quote == '\'' {
                        LexErrorKind::UnterminatedString
                    } else {
                        LexErrorKind::UnterminatedDoubleQuotedString
                    };
                    return Err(self.error(kind, start));
                }
            }
        }

        Ok(Token::new(
            TokenKind::LiteralString,
            self.slice(start, self.position),
            start,
            self.position,
        ))
    }

    fn read_digits(&mut self) -> usize {
        let start = self.position;
        while self.current_char().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        self.position - start
    }

    fn read_number(&mut self) -> Result<Token, LexError> {
        let start = self.position;

        if self.current_char() == Some('0') && matches!(self.peek_char(1), Some('x' | 'X')) {
            self.position += 2;
            let digits_start = self.position;
            while self.current_char().is_some_and(|c| c.is_ascii_hexdigit()) {
                self.advance();
            }
            let digits = self.slice(digits_start, self.position);
            if digits.is_empty() {
                return Err(self.error(LexErrorKind::MalformedHex(self.slice(start, self.position)), start));
            }
            if matches!(self.current_char(), Some('L' | 'l')) {
                let token = Token::new(TokenKind::LiteralHexLong, digits, start, self.position);
                self.advance();
                return Ok(token);
            }
            return Ok(Token::new(TokenKind::LiteralHexInt, digits, start, self.position));
        }

        self.read_digits();
        let mut is_real = false;

        if self.current_char() == Some('.') {
            let dot = self.position;
            self.advance();
            if self.read_digits() == 0 {
                // `3.toString()`: an int followed by a dot
                self.position = dot;
                return Ok(Token::new(TokenKind::LiteralInt, self.slice(start, dot), start, dot));
            }
            is_real = true;
        }

        let end_of_number = self.position;

        match self.current_char() {
            Some('L' | 'l') => {
                if is_real {
                    return Err(self.error(LexErrorKind::RealCannotBeLong, start));
                }
                let token = Token::new(
                    TokenKind::LiteralLong,
                    self.slice(start, end_of_number),
                    start,
                    end_of_number,
                );
                self.advance();
                Ok(token)
            }
            Some('e' | 'E') => {
                self.advance();
                if matches!(self.current_char(), Some('+' | '-')) {
                    self.advance();
                }
                if self.read_digits() == 0 {
                    return Err(self.error(
                        LexErrorKind::MalformedExponent(self.slice(start, self.position)),
                        start,
                    ));
                }
                let text = self.slice(start, self.position);
                Ok(self.real_with_suffix(text, start))
            }
            Some('f' | 'F' | 'd' | 'D') => {
                let text = self.slice(start, end_of_number);
                Ok(self.real_with_suffix(text, start))
            }
            _ if is_real => Ok(Token::new(
                TokenKind::LiteralReal,
                self.slice(start, end_of_number),
                start,
                end_of_number,
            )),
            _ => Ok(Token::new(
                TokenKind::LiteralInt,
                self.slice(start, end_of_number),
                start,
                end_of_number,
            )),
        }
    }

    /// Consumes an optional `f`/`d` suffix after the digits in `text`.
    fn real_with_suffix(&mut self, text: String, start: usize) -> Token {
        let kind = match self.current_char() {
            Some('f' | 'F') => {
                self.advance();
                TokenKind::LiteralRealFloat
            }
            Some('d' | 'D') => {
                self.advance();
                TokenKind::LiteralReal
            }
            _ => TokenKind::LiteralReal,
        };
        Token::new(kind, text, start, self.position)
    }

    pub fn next_token(&mut self) -> Result<Option<Token>, LexError> {
        self.skip_whitespace();

        let token = match self.current_char() {
            None => return Ok(None),
            Some('+') => self.one_or_two(TokenKind::Plus, '+', TokenKind::Inc),
            Some('-') => self.one_or_two(TokenKind::Minus, '-', TokenKind::Dec),
            Some('*') => self.single(TokenKind::Star),
            Some('/') => self.single(TokenKind::Div),
            Some('%') => self.single(TokenKind::Mod),
            Some(':') => self.single(TokenKind::Colon),
            Some('.') => self.single(TokenKind::Dot),
            Some(',') => self.single(TokenKind::Comma),
            Some('(') => self.single(TokenKind::LParen),
            Some(')') => self.single(TokenKind::RParen),
            Some('[') => self.single(TokenKind::LSquare),
            Some(']') => self.single(TokenKind::RSquare),
            Some('{') => self.single(TokenKind::LCurly),
            Some('}') => self.single(TokenKind::RCurly),
            Some('#') => self.single(TokenKind::Hash),
            Some('@') => self.single(TokenKind::BeanRef),
            Some('^') => self.one_or_two(TokenKind::Power, '[', TokenKind::SelectFirst),
            Some('!') => match self.peek_char(1) {
                Some('=') => self.double(TokenKind::Ne),
                Some('[') => self.double(TokenKind::Project),
                _ => self.single(TokenKind::Not),
            },
            Some('=') => self.one_or_two(TokenKind::Assign, '=', TokenKind::Eq),
            Some('&') => self.one_or_two(TokenKind::FactoryBeanRef, '&', TokenKind::SymbolicAnd),
            Some('|') => {
                if self.peek_char(1) == Some('|') {
                    self.double(TokenKind::SymbolicOr)
                } else {
                    return Err(self.error(LexErrorKind::MissingCharacter('|'), self.position));
                }
            }
            Some('?') => match self.peek_char(1) {
                Some('[') => self.double(TokenKind::Select),
                Some(':') => self.double(TokenKind::Elvis),
                Some('.') => self.double(TokenKind::SafeNavi),
                _ => self.single(TokenKind::QMark),
            },
            Some('$') if self.peek_char(1) == Some('[') => self.double(TokenKind::SelectLast),
            Some('>') => self.one_or_two(TokenKind::Gt, '=', TokenKind::Ge),
            Some('<') => self.one_or_two(TokenKind::Lt, '=', TokenKind::Le),
            Some('\'') => self.read_string('\'')?,
            Some('"') => self.read_string('"')?,
            Some('\\') => {
                return Err(self.error(LexErrorKind::UnexpectedEscape, self.position));
            }
            Some(ch) if ch.is_ascii_digit() => self.read_number()?,
            Some(ch) if is_identifier_start(ch) => self.read_identifier(),
            Some(ch) => {
                return Err(self.error(LexErrorKind::UnsupportedCharacter(ch), self.position));
            }
        };

        self.last_kind = Some(token.kind);
        Ok(Some(token))
    }
}

#[cfg(test)]
fn kinds(text: &str) -> Vec<TokenKind> {
    tokenize(text).unwrap().into_iter().map(|t| t.kind).collect()
}

#[test]
fn test_textual_operators() {
    assert_eq!(
        kinds("a DIV b mod c ne d NOT e"),
        vec![
            TokenKind::Identifier,
            TokenKind::Div,
            TokenKind::Identifier,
            TokenKind::Mod,
            TokenKind::Identifier,
            TokenKind::Ne,
            TokenKind::Identifier,
            TokenKind::Not,
            TokenKind::Identifier,
        ]
    );
}

#[test]
fn test_longest_match() {
    assert_eq!(
        kinds("?[ ?. ?: ? ^[ ^ $[ ![ != ! ++ --"),
        vec![
            TokenKind::Select,
            TokenKind::SafeNavi,
            TokenKind::Elvis,
            TokenKind::QMark,
            TokenKind::SelectFirst,
            TokenKind::Power,
            TokenKind::SelectLast,
            TokenKind::Project,
            TokenKind::Ne,
            TokenKind::Not,
            TokenKind::Inc,
            TokenKind::Dec,
        ]
    );
}

#[test]
fn test_int_followed_by_dot() {
    let tokens = tokenize("3.toString()").unwrap();
    assert_eq!(tokens[0].kind, TokenKind::LiteralInt);
    assert_eq!(tokens[0].text, "3");
    assert_eq!(tokens[1].kind, TokenKind::Dot);
}

#[test]
fn test_single_pipe_is_an_error() {
    let err = tokenize("a | b").unwrap_err();
    assert_eq!(err.kind, LexErrorKind::MissingCharacter('|'));
    assert_eq!(err.position, 2);
}
