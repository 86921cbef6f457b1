use std::fmt;

/// Kind of a lexical token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Literals
    /// Decimal int literal
    ///
    /// # Examples
    /// ```text
    /// 42
    /// 0
    /// ```
    LiteralInt,

    /// Decimal long literal, suffixed with `L` or `l`
    ///
    /// # Examples
    /// ```text
    /// 42L
    /// ```
    LiteralLong,

    /// Hexadecimal int literal
    ///
    /// # Examples
    /// ```text
    /// 0xFF
    /// 0X1a
    /// ```
    LiteralHexInt,

    /// Hexadecimal long literal
    LiteralHexLong,

    /// Quoted string, the token text keeps its quotes
    ///
    /// # Examples
    /// ```text
    /// 'hello'
    /// "it's"
    /// 'it''s'
    /// ```
    LiteralString,

    /// Real number parsed as a double
    ///
    /// # Examples
    /// ```text
    /// 3.14
    /// 1e10
    /// 2.5d
    /// ```
    LiteralReal,

    /// Real number suffixed with `f` or `F`
    LiteralRealFloat,

    /// Identifier or keyword
    ///
    /// Starts with a letter, `_` or `$`, continues with letters, digits, `_`
    /// or `$`. Keywords such as `true`, `new` or `T` are identifiers at this
    /// stage; the parser gives them meaning.
    Identifier,

    // Delimiters
    LParen,
    RParen,
    LSquare,
    RSquare,
    LCurly,
    RCurly,
    Comma,
    Colon,
    Dot,
    Hash,

    // Arithmetic
    Plus,
    Minus,
    Star,
    Div,
    Mod,
    Power,
    Inc,
    Dec,

    // Relational
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Instanceof,
    Matches,
    Between,

    // Logical
    Not,
    SymbolicAnd,
    SymbolicOr,

    /// Assignment (`=`)
    Assign,

    /// Ternary condition marker (`?`)
    QMark,

    /// Elvis operator (`?:`)
    ///
    /// # Examples
    /// ```text
    /// name ?: 'unknown'
    /// ```
    Elvis,

    /// Null-safe navigation (`?.`)
    ///
    /// # Examples
    /// ```text
    /// person?.address?.city
    /// ```
    SafeNavi,

    /// Selection of every matching element (`?[`)
    Select,

    /// Selection of the first matching element (`^[`)
    SelectFirst,

    /// Selection of the last matching element (`$[`)
    SelectLast,

    /// Projection (`![`)
    ///
    /// # Examples
    /// ```text
    /// people.![name]
    /// ```
    Project,

    /// Bean reference prefix (`@`)
    BeanRef,

    /// Factory bean reference prefix (`&`)
    FactoryBeanRef,
}

impl TokenKind {
    /// Source form used in error messages.
    pub fn describe(&self) -> &'static str {
        use TokenKind::*;
        match self {
            LiteralInt | LiteralHexInt => "int literal",
            LiteralLong | LiteralHexLong => "long literal",
            LiteralString => "string literal",
            LiteralReal | LiteralRealFloat => "real literal",
            Identifier => "identifier",
            LParen => "(",
            RParen => ")",
            LSquare => "[",
            RSquare => "]",
            LCurly => "{",
            RCurly => "}",
            Comma => ",",
            Colon => ":",
            Dot => ".",
            Hash => "#",
            Plus => "+",
            Minus => "-",
            Star => "*",
            Div => "/",
            Mod => "%",
            Power => "^",
            Inc => "++",
            Dec => "--",
            Eq => "==",
            Ne => "!=",
            Lt => "<",
            Le => "<=",
            Gt => ">",
            Ge => ">=",
            Instanceof => "instanceof",
            Matches => "matches",
            Between => "between",
            Not => "!",
            SymbolicAnd => "&&",
            SymbolicOr => "||",
            Assign => "=",
            QMark => "?",
            Elvis => "?:",
            SafeNavi => "?.",
            Select => "?[",
            SelectFirst => "^[",
            SelectLast => "$[",
            Project => "![",
            BeanRef => "@",
            FactoryBeanRef => "&",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// A token with its text and its `[start, end)` char offsets in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub start: usize,
    pub end: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, start: usize, end: usize) -> Self {
        Token {
            kind,
            text: text.into(),
            start,
            end,
        }
    }

    pub fn symbol(kind: TokenKind, start: usize, end: usize) -> Self {
        Token::new(kind, kind.describe(), start, end)
    }

    pub fn is_identifier(&self) -> bool {
        self.kind == TokenKind::Identifier
    }

    /// Identifier whose text matches `word`, ignoring ASCII case.
    pub fn is_keyword(&self, word: &str) -> bool {
        self.kind == TokenKind::Identifier && self.text.eq_ignore_ascii_case(word)
    }

    pub fn is_numeric_relational_operator(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Gt
                | TokenKind::Ge
                | TokenKind::Lt
                | TokenKind::Le
                | TokenKind::Eq
                | TokenKind::Ne
        )
    }

    /// Text as it should appear in error messages.
    pub fn display_text(&self) -> &str {
        if self.text.is_empty() {
            self.kind.describe()
        } else {
            &self.text
        }
    }
}
