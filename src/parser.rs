use crate::{
    ast::{
        BinaryOp, Node, NodeKind, SelectionVariant, Slot, Span, StepOp, Token,
        TokenKind, UnaryOp,
    },
    config::{DEFAULT_MAX_NESTING_DEPTH, ParserConfig},
    error::{ParseError, ParseErrorKind},
    expression::Expression,
    lexer,
    template::{TemplateContext, TemplateExpression},
    value::Value,
};
use indexmap::IndexMap;

type ParseResult<T> = Result<T, ParseError>;

/// Parses expression strings into [`Expression`]s sharing one configuration.
#[derive(Debug, Clone, Default)]
pub struct ExpressionParser {
    config: ParserConfig,
}

impl ExpressionParser {
    pub fn new(config: ParserConfig) -> Self {
        ExpressionParser { config }
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub fn parse_expression(&self, text: &str) -> ParseResult<Expression> {
        let ast = parse_ast(text, &self.config)?;
        Ok(Expression::new(text, ast, self.config.clone()))
    }

    /// Parses literal text with embedded `#{...}` expressions (or whatever
    /// delimiters `template` names).
    pub fn parse_template(
        &self,
        text: &str,
        template: &TemplateContext,
    ) -> ParseResult<TemplateExpression> {
        TemplateExpression::parse(text, template, self)
    }
}

/// Parses `text` into a syntax tree.
pub fn parse_ast(text: &str, config: &ParserConfig) -> ParseResult<Node> {
    let length = text.chars().count();
    if length > config.max_expression_length {
        return Err(ParseError::new(
            ParseErrorKind::ExpressionTooLong {
                length,
                max: config.max_expression_length,
            },
            0,
        ));
    }
    Parser::new(text)?
        .with_max_nesting_depth(config.max_nesting_depth)
        .parse()
}

pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
    source_length: usize,
    depth: usize,
    max_depth: usize,
}

fn is_qualified_id_piece(token: &Token) -> bool {
    match token.kind {
        TokenKind::Dot | TokenKind::Identifier => true,
        TokenKind::LiteralString => false,
        _ => {
            !token.text.is_empty()
                && token
                    .text
                    .chars()
                    .all(|c| c.is_alphanumeric() || c == '_' || c == '$')
        }
    }
}

/// Strips the quotes of a string literal and collapses doubled quotes.
fn unquote(text: &str) -> String {
    let mut chars = text.chars();
    let quote = chars.next().unwrap_or('\'');
    let inner: String = text
        .chars()
        .skip(1)
        .take(text.chars().count().saturating_sub(2))
        .collect();
    let doubled: String = [quote, quote].iter().collect();
    inner.replace(&doubled, &quote.to_string())
}

/// Constant value of an inline-collection element, if it has one.
fn folded_element(node: &Node) -> Option<Value> {
    match &node.kind {
        NodeKind::InlineList { constant, .. } | NodeKind::InlineMap { constant, .. } => {
            constant.clone()
        }
        _ if node.is_literal() => node.constant_value(),
        _ => None,
    }
}

fn fold_list(elements: &[Node]) -> Option<Value> {
    let values: Option<Vec<Value>> = elements.iter().map(folded_element).collect();
    values.map(Value::read_only_list)
}

fn fold_map(entries: &[(Node, Node)]) -> Option<Value> {
    let mut folded = IndexMap::new();
    for (key, value) in entries {
        let key = match &key.kind {
            NodeKind::Property { name, .. } => Value::string(name.clone()),
            _ => folded_element(key)?,
        };
        folded.insert(key, folded_element(value)?);
    }
    Some(Value::read_only_map(folded))
}

impl Parser {
    pub fn new(text: &str) -> ParseResult<Self> {
        Ok(Parser {
            tokens: lexer::tokenize(text)?,
            position: 0,
            source_length: text.chars().count(),
            depth: 0,
            max_depth: DEFAULT_MAX_NESTING_DEPTH,
        })
    }

    pub fn with_max_nesting_depth(mut self, max: usize) -> Self {
        self.max_depth = max;
        self
    }

    /// Enters one level of nesting; every call is paired with `leave`.
    fn enter(&mut self) -> ParseResult<()> {
        self.depth += 1;
        if self.depth > self.max_depth {
            let position = self.peek().map_or(self.source_length, |t| t.start);
            return Err(self.error(ParseErrorKind::NestingTooDeep { max: self.max_depth }, position));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().is_some_and(|t| t.kind == kind)
    }

    fn check_any(&self, kinds: &[TokenKind]) -> bool {
        self.peek().is_some_and(|t| kinds.contains(&t.kind))
    }

    /// Identifier token with the given text, ignoring ASCII case.
    fn check_keyword(&self, word: &str) -> bool {
        self.peek().is_some_and(|t| t.is_keyword(word))
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    /// Consumes the next token if it is of `kind`.
    fn accept(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn error(&self, kind: ParseErrorKind, position: usize) -> ParseError {
        ParseError::new(kind, position)
    }

    fn out_of_data(&self) -> ParseError {
        self.error(ParseErrorKind::OutOfData, self.source_length)
    }

    fn expect(&mut self, kind: TokenKind) -> ParseResult<Token> {
        match self.advance() {
            None => Err(self.out_of_data()),
            Some(t) if t.kind == kind => Ok(t),
            Some(t) => Err(self.error(
                ParseErrorKind::UnexpectedToken {
                    expected: kind.describe().to_string(),
                    found: t.display_text().to_string(),
                },
                t.start,
            )),
        }
    }

    fn left_operand(&self, operand: Option<Node>, operator: &Token) -> ParseResult<Node> {
        operand.ok_or_else(|| {
            self.error(
                ParseErrorKind::LeftOperandProblem(operator.display_text().to_string()),
                operator.start,
            )
        })
    }

    fn right_operand(&self, operand: Option<Node>, operator: &Token) -> ParseResult<Node> {
        operand.ok_or_else(|| {
            self.error(
                ParseErrorKind::RightOperandProblem(operator.display_text().to_string()),
                operator.start,
            )
        })
    }

    fn binary(op: BinaryOp, left: Node, right: Node) -> Node {
        let span = left.span.to(right.span);
        Node::new(
            NodeKind::Binary {
                op,
                left: left.boxed(),
                right: right.boxed(),
            },
            span,
        )
    }

    /// Parses a whole expression; trailing tokens are an error.
    pub fn parse(&mut self) -> ParseResult<Node> {
        let ast = match self.parse_expression()? {
            Some(ast) => ast,
            None => {
                return Err(match self.peek() {
                    Some(t) => self.error(
                        ParseErrorKind::MoreInput(t.display_text().to_string()),
                        t.start,
                    ),
                    None => self.error(ParseErrorKind::Empty, 0),
                });
            }
        };
        if let Some(t) = self.peek() {
            return Err(self.error(
                ParseErrorKind::MoreInput(t.display_text().to_string()),
                t.start,
            ));
        }
        Ok(ast)
    }

    /// A full expression, nested one level deeper than the caller.
    fn parse_expression(&mut self) -> ParseResult<Option<Node>> {
        self.enter()?;
        let expr = self.parse_assignment();
        self.leave();
        expr
    }

    /// Assignment, elvis and ternary, the lowest tier.
    fn parse_assignment(&mut self) -> ParseResult<Option<Node>> {
        let expr = self.parse_or()?;
        let Some(t) = self.peek().cloned() else {
            return Ok(expr);
        };

        // a missing left-hand side stands for null
        let implicit_null = || Node::new(NodeKind::Null, Span::new(t.start, t.start));

        match t.kind {
            TokenKind::Assign => {
                let target = expr.unwrap_or_else(implicit_null);
                self.advance();
                let value = self.parse_or()?;
                let value = self.right_operand(value, &t)?;
                let span = target.span.to(value.span);
                Ok(Some(Node::new(
                    NodeKind::Assign {
                        target: target.boxed(),
                        value: value.boxed(),
                    },
                    span,
                )))
            }
            TokenKind::Elvis => {
                let value = expr.unwrap_or_else(implicit_null);
                self.advance();
                let fallback = match self.parse_expression()? {
                    Some(node) => node,
                    None => Node::new(NodeKind::Null, Span::new(t.end, t.end)),
                };
                let span = value.span.to(fallback.span);
                Ok(Some(Node::new(
                    NodeKind::Elvis {
                        value: value.boxed(),
                        fallback: fallback.boxed(),
                    },
                    span,
                )))
            }
            TokenKind::QMark => {
                let condition = expr.unwrap_or_else(implicit_null);
                self.advance();
                let if_true = self.parse_expression()?;
                let if_true = self.right_operand(if_true, &t)?;
                self.expect(TokenKind::Colon)?;
                let if_false = self.parse_expression()?;
                let if_false = self.right_operand(if_false, &t)?;
                let span = condition.span.to(if_false.span);
                Ok(Some(Node::new(
                    NodeKind::Ternary {
                        condition: condition.boxed(),
                        if_true: if_true.boxed(),
                        if_false: if_false.boxed(),
                    },
                    span,
                )))
            }
            _ => Ok(expr),
        }
    }

    fn parse_or(&mut self) -> ParseResult<Option<Node>> {
        let mut expr = self.parse_and()?;
        while self.check_keyword("or") || self.check(TokenKind::SymbolicOr) {
            let Some(t) = self.advance() else { break };
            let right = self.parse_and()?;
            let left = self.left_operand(expr, &t)?;
            let right = self.right_operand(right, &t)?;
            expr = Some(Self::binary(BinaryOp::Or, left, right));
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> ParseResult<Option<Node>> {
        let mut expr = self.parse_comparison()?;
        while self.check_keyword("and") || self.check(TokenKind::SymbolicAnd) {
            let Some(t) = self.advance() else { break };
            let right = self.parse_comparison()?;
            let left = self.left_operand(expr, &t)?;
            let right = self.right_operand(right, &t)?;
            expr = Some(Self::binary(BinaryOp::And, left, right));
        }
        Ok(expr)
    }

    /// Relational operators do not chain: `a < b < c` is an error.
    fn relational_operator(&self) -> Option<BinaryOp> {
        let t = self.peek()?;
        match t.kind {
            TokenKind::Eq => Some(BinaryOp::Equal),
            TokenKind::Ne => Some(BinaryOp::NotEqual),
            TokenKind::Lt => Some(BinaryOp::LessThan),
            TokenKind::Le => Some(BinaryOp::LessEqual),
            TokenKind::Gt => Some(BinaryOp::GreaterThan),
            TokenKind::Ge => Some(BinaryOp::GreaterEqual),
            TokenKind::Identifier if t.is_keyword("instanceof") => Some(BinaryOp::Instanceof),
            TokenKind::Identifier if t.is_keyword("matches") => Some(BinaryOp::Matches),
            TokenKind::Identifier if t.is_keyword("between") => Some(BinaryOp::Between),
            _ => None,
        }
    }

    fn parse_comparison(&mut self) -> ParseResult<Option<Node>> {
        let expr = self.parse_additive()?;
        let Some(op) = self.relational_operator() else {
            return Ok(expr);
        };
        let Some(t) = self.advance() else {
            return Ok(expr);
        };
        let right = self.parse_additive()?;
        let left = self.left_operand(expr, &t)?;
        let right = self.right_operand(right, &t)?;
        Ok(Some(Self::binary(op, left, right)))
    }

    fn parse_additive(&mut self) -> ParseResult<Option<Node>> {
        let mut expr = self.parse_multiplicative()?;
        while self.check_any(&[TokenKind::Plus, TokenKind::Minus]) {
            let Some(t) = self.advance() else { break };
            let op = if t.kind == TokenKind::Plus {
                BinaryOp::Add
            } else {
                BinaryOp::Subtract
            };
            let right = self.parse_multiplicative()?;
            let right = self.right_operand(right, &t)?;
            let left = self.left_operand(expr, &t)?;
            expr = Some(Self::binary(op, left, right));
        }
        Ok(expr)
    }

    fn parse_multiplicative(&mut self) -> ParseResult<Option<Node>> {
        let mut expr = self.parse_power()?;
        while self.check_any(&[TokenKind::Star, TokenKind::Div, TokenKind::Mod]) {
            let Some(t) = self.advance() else { break };
            let op = match t.kind {
                TokenKind::Star => BinaryOp::Multiply,
                TokenKind::Div => BinaryOp::Divide,
                _ => BinaryOp::Modulo,
            };
            let right = self.parse_power()?;
            let left = self.left_operand(expr, &t)?;
            let right = self.right_operand(right, &t)?;
            expr = Some(Self::binary(op, left, right));
        }
        Ok(expr)
    }

    /// `^` and postfix `++`/`--`.
    fn parse_power(&mut self) -> ParseResult<Option<Node>> {
        let expr = self.parse_unary()?;

        if self.check(TokenKind::Power) {
            let Some(t) = self.advance() else {
                return Ok(expr);
            };
            let right = self.parse_unary()?;
            let right = self.right_operand(right, &t)?;
            let left = self.left_operand(expr, &t)?;
            return Ok(Some(Self::binary(BinaryOp::Power, left, right)));
        }

        if let Some(operand) = expr {
            if self.check_any(&[TokenKind::Inc, TokenKind::Dec]) {
                if let Some(t) = self.advance() {
                    let op = if t.kind == TokenKind::Inc {
                        StepOp::Increment
                    } else {
                        StepOp::Decrement
                    };
                    let span = Span::new(operand.span.start, t.end);
                    return Ok(Some(Node::new(
                        NodeKind::Step {
                            op,
                            prefix: false,
                            operand: operand.boxed(),
                        },
                        span,
                    )));
                }
            }
            return Ok(Some(operand));
        }
        Ok(None)
    }

    fn parse_unary(&mut self) -> ParseResult<Option<Node>> {
        if self.check_any(&[TokenKind::Not, TokenKind::Plus, TokenKind::Minus]) {
            let Some(t) = self.advance() else {
                return Ok(None);
            };
            let operand = self.parse_nested_unary()?;
            let operand = self.right_operand(operand, &t)?;
            let op = match t.kind {
                TokenKind::Not => UnaryOp::Not,
                TokenKind::Plus => UnaryOp::Plus,
                _ => UnaryOp::Minus,
            };
            let span = Span::new(t.start, operand.span.end);
            return Ok(Some(Node::new(
                NodeKind::Unary {
                    op,
                    operand: operand.boxed(),
                },
                span,
            )));
        }

        if self.check_any(&[TokenKind::Inc, TokenKind::Dec]) {
            let Some(t) = self.advance() else {
                return Ok(None);
            };
            let operand = self.parse_nested_unary()?;
            let operand = self.right_operand(operand, &t)?;
            let op = if t.kind == TokenKind::Inc {
                StepOp::Increment
            } else {
                StepOp::Decrement
            };
            let span = Span::new(t.start, operand.span.end);
            return Ok(Some(Node::new(
                NodeKind::Step {
                    op,
                    prefix: true,
                    operand: operand.boxed(),
                },
                span,
            )));
        }

        self.parse_primary()
    }

    fn parse_nested_unary(&mut self) -> ParseResult<Option<Node>> {
        self.enter()?;
        let operand = self.parse_unary();
        self.leave();
        operand
    }

    /// A start node followed by any number of dotted nodes and indexers.
    fn parse_primary(&mut self) -> ParseResult<Option<Node>> {
        let Some(start) = self.parse_start_node()? else {
            return Ok(None);
        };
        let mut nodes = vec![];
        while let Some(node) = self.parse_access()? {
            nodes.push(node);
        }
        if nodes.is_empty() {
            return Ok(Some(start));
        }
        let span = start.span.to(nodes[nodes.len() - 1].span);
        let mut children = vec![start];
        children.extend(nodes);
        Ok(Some(Node::new(NodeKind::Compound(children), span)))
    }

    fn parse_access(&mut self) -> ParseResult<Option<Node>> {
        if self.check_any(&[TokenKind::Dot, TokenKind::SafeNavi]) {
            return self.parse_dotted_node().map(Some);
        }
        if self.check(TokenKind::LSquare) {
            return self.parse_indexer();
        }
        Ok(None)
    }

    fn parse_dotted_node(&mut self) -> ParseResult<Node> {
        let Some(t) = self.advance() else {
            return Err(self.out_of_data());
        };
        let null_safe = t.kind == TokenKind::SafeNavi;

        if let Some(node) = self.parse_method_or_property(null_safe)? {
            return Ok(node);
        }
        if let Some(node) = self.parse_function_or_var()? {
            return Ok(node);
        }
        if let Some(node) = self.parse_projection(null_safe)? {
            return Ok(node);
        }
        if let Some(node) = self.parse_selection(null_safe)? {
            return Ok(node);
        }

        match self.peek() {
            None => Err(self.error(ParseErrorKind::OutOfData, t.start)),
            Some(next) => Err(self.error(
                ParseErrorKind::UnexpectedDataAfterDot(next.display_text().to_string()),
                t.start,
            )),
        }
    }

    fn parse_start_node(&mut self) -> ParseResult<Option<Node>> {
        if let Some(node) = self.parse_literal()? {
            return Ok(Some(node));
        }
        if let Some(node) = self.parse_paren_expression()? {
            return Ok(Some(node));
        }
        if let Some(node) = self.parse_type_reference()? {
            return Ok(Some(node));
        }
        if let Some(node) = self.parse_null_reference() {
            return Ok(Some(node));
        }
        if let Some(node) = self.parse_constructor()? {
            return Ok(Some(node));
        }
        if let Some(node) = self.parse_method_or_property(false)? {
            return Ok(Some(node));
        }
        if let Some(node) = self.parse_function_or_var()? {
            return Ok(Some(node));
        }
        if let Some(node) = self.parse_bean_reference()? {
            return Ok(Some(node));
        }
        if let Some(node) = self.parse_projection(false)? {
            return Ok(Some(node));
        }
        if let Some(node) = self.parse_selection(false)? {
            return Ok(Some(node));
        }
        if let Some(node) = self.parse_indexer()? {
            return Ok(Some(node));
        }
        self.parse_inline_list_or_map()
    }

    fn parse_literal(&mut self) -> ParseResult<Option<Node>> {
        let Some(t) = self.peek().cloned() else {
            return Ok(None);
        };
        let span = Span::new(t.start, t.end);
        let kind = match t.kind {
            TokenKind::LiteralInt => NodeKind::Int(t.text.parse::<i32>().map_err(|_| {
                self.error(ParseErrorKind::NotAnInteger(t.text.clone()), t.start)
            })?),
            TokenKind::LiteralHexInt => NodeKind::Int(
                i32::from_str_radix(&t.text, 16).map_err(|_| {
                    self.error(ParseErrorKind::NotAnInteger(format!("0x{}", t.text)), t.start)
                })?,
            ),
            TokenKind::LiteralLong => NodeKind::Long(t.text.parse::<i64>().map_err(|_| {
                self.error(ParseErrorKind::NotALong(t.text.clone()), t.start)
            })?),
            TokenKind::LiteralHexLong => NodeKind::Long(
                i64::from_str_radix(&t.text, 16).map_err(|_| {
                    self.error(ParseErrorKind::NotALong(format!("0x{}", t.text)), t.start)
                })?,
            ),
            TokenKind::LiteralReal => NodeKind::Double(t.text.parse::<f64>().map_err(|_| {
                self.error(ParseErrorKind::NotAReal(t.text.clone()), t.start)
            })?),
            TokenKind::LiteralRealFloat => NodeKind::Float(t.text.parse::<f32>().map_err(|_| {
                self.error(ParseErrorKind::NotAReal(t.text.clone()), t.start)
            })?),
            TokenKind::LiteralString => NodeKind::String(unquote(&t.text)),
            TokenKind::Identifier if t.is_keyword("true") => NodeKind::Boolean(true),
            TokenKind::Identifier if t.is_keyword("false") => NodeKind::Boolean(false),
            _ => return Ok(None),
        };
        self.advance();
        Ok(Some(Node::new(kind, span)))
    }

    fn parse_paren_expression(&mut self) -> ParseResult<Option<Node>> {
        if !self.check(TokenKind::LParen) {
            return Ok(None);
        }
        self.advance();
        let Some(expr) = self.parse_expression()? else {
            return Err(match self.peek() {
                Some(t) => self.error(
                    ParseErrorKind::UnexpectedToken {
                        expected: "expression".to_string(),
                        found: t.display_text().to_string(),
                    },
                    t.start,
                ),
                None => self.out_of_data(),
            });
        };
        self.expect(TokenKind::RParen)?;
        Ok(Some(expr))
    }

    /// A keyword directly followed by `]` is a map key, as in `map[T]`.
    fn keyword_as_map_key(&mut self) -> Option<Node> {
        if self.tokens.get(self.position + 1)?.kind != TokenKind::RSquare {
            return None;
        }
        let t = self.advance()?;
        Some(Node::new(
            NodeKind::Property {
                name: t.text,
                null_safe: false,
                cache: Box::default(),
            },
            Span::new(t.start, t.end),
        ))
    }

    fn parse_type_reference(&mut self) -> ParseResult<Option<Node>> {
        if !self.peek().is_some_and(|t| t.is_identifier() && t.text == "T") {
            return Ok(None);
        }
        if let Some(key) = self.keyword_as_map_key() {
            return Ok(Some(key));
        }
        let Some(t) = self.advance() else {
            return Ok(None);
        };
        self.expect(TokenKind::LParen)?;
        let name = self.parse_qualified_id()?;
        let mut dimensions = 0;
        while self.accept(TokenKind::LSquare) {
            self.expect(TokenKind::RSquare)?;
            dimensions += 1;
        }
        let close = self.expect(TokenKind::RParen)?;
        Ok(Some(Node::new(
            NodeKind::TypeReference {
                name: name.boxed(),
                dimensions,
                resolved: Slot::empty(),
            },
            Span::new(t.start, close.end),
        )))
    }

    fn parse_null_reference(&mut self) -> Option<Node> {
        if !self.check_keyword("null") {
            return None;
        }
        if let Some(key) = self.keyword_as_map_key() {
            return Some(key);
        }
        let t = self.advance()?;
        Some(Node::new(NodeKind::Null, Span::new(t.start, t.end)))
    }

    fn parse_constructor(&mut self) -> ParseResult<Option<Node>> {
        if !self.check_keyword("new") {
            return Ok(None);
        }
        if let Some(key) = self.keyword_as_map_key() {
            return Ok(Some(key));
        }
        let Some(t) = self.advance() else {
            return Ok(None);
        };
        let type_name = self.parse_qualified_id()?;

        if self.check(TokenKind::LSquare) {
            let mut dimensions = vec![];
            let mut end = type_name.span.end;
            while self.accept(TokenKind::LSquare) {
                if self.check(TokenKind::RSquare) {
                    dimensions.push(None);
                } else {
                    let size = self.parse_expression()?;
                    let size = size.ok_or_else(|| self.out_of_data())?;
                    dimensions.push(Some(size));
                }
                end = self.expect(TokenKind::RSquare)?.end;
            }
            let initializer = self.parse_inline_list_or_map()?;
            if let Some(init) = &initializer {
                end = init.span.end;
            }
            return Ok(Some(Node::new(
                NodeKind::ArrayConstructor {
                    type_name: type_name.boxed(),
                    dimensions,
                    initializer: initializer.map(Node::boxed),
                },
                Span::new(t.start, end),
            )));
        }

        if !self.check(TokenKind::LParen) {
            return Err(match self.peek() {
                Some(next) => self.error(
                    ParseErrorKind::UnexpectedToken {
                        expected: "(".to_string(),
                        found: next.display_text().to_string(),
                    },
                    next.start,
                ),
                None => self.out_of_data(),
            });
        }
        let (args, end) = self.parse_arguments()?;
        Ok(Some(Node::new(
            NodeKind::Constructor {
                type_name: type_name.boxed(),
                args,
                cache: Box::default(),
            },
            Span::new(t.start, end),
        )))
    }

    fn parse_method_or_property(&mut self, null_safe: bool) -> ParseResult<Option<Node>> {
        if !self.check(TokenKind::Identifier) {
            return Ok(None);
        }
        let Some(t) = self.advance() else {
            return Ok(None);
        };
        if self.check(TokenKind::LParen) {
            let (args, end) = self.parse_arguments()?;
            return Ok(Some(Node::new(
                NodeKind::Method {
                    name: t.text,
                    args,
                    null_safe,
                    cache: Box::default(),
                },
                Span::new(t.start, end),
            )));
        }
        Ok(Some(Node::new(
            NodeKind::Property {
                name: t.text,
                null_safe,
                cache: Box::default(),
            },
            Span::new(t.start, t.end),
        )))
    }

    fn parse_function_or_var(&mut self) -> ParseResult<Option<Node>> {
        if !self.check(TokenKind::Hash) {
            return Ok(None);
        }
        let Some(hash) = self.advance() else {
            return Ok(None);
        };
        let name = self.expect(TokenKind::Identifier)?;
        if self.check(TokenKind::LParen) {
            let (args, end) = self.parse_arguments()?;
            return Ok(Some(Node::new(
                NodeKind::Function {
                    name: name.text,
                    args,
                    resolved: Slot::empty(),
                },
                Span::new(hash.start, end),
            )));
        }
        Ok(Some(Node::new(
            NodeKind::Variable(name.text),
            Span::new(hash.start, name.end),
        )))
    }

    fn parse_bean_reference(&mut self) -> ParseResult<Option<Node>> {
        if !self.check_any(&[TokenKind::BeanRef, TokenKind::FactoryBeanRef]) {
            return Ok(None);
        }
        let Some(t) = self.advance() else {
            return Ok(None);
        };
        let (name, end) = match self.peek().cloned() {
            Some(n) if n.kind == TokenKind::Identifier => {
                self.advance();
                (n.text, n.end)
            }
            Some(n) if n.kind == TokenKind::LiteralString => {
                self.advance();
                (unquote(&n.text), n.end)
            }
            _ => return Err(self.error(ParseErrorKind::InvalidBeanReference, t.start)),
        };
        Ok(Some(Node::new(
            NodeKind::Bean {
                name,
                factory: t.kind == TokenKind::FactoryBeanRef,
            },
            Span::new(t.start, end),
        )))
    }

    fn parse_projection(&mut self, null_safe: bool) -> ParseResult<Option<Node>> {
        if !self.check(TokenKind::Project) {
            return Ok(None);
        }
        let Some(t) = self.advance() else {
            return Ok(None);
        };
        let expression = self.parse_expression()?;
        let expression = expression
            .ok_or_else(|| self.error(ParseErrorKind::MissingSelectionExpression, t.start))?;
        let close = self.expect(TokenKind::RSquare)?;
        Ok(Some(Node::new(
            NodeKind::Projection {
                expression: expression.boxed(),
                null_safe,
            },
            Span::new(t.start, close.end),
        )))
    }

    fn parse_selection(&mut self, null_safe: bool) -> ParseResult<Option<Node>> {
        let variant = match self.peek().map(|t| t.kind) {
            Some(TokenKind::Select) => SelectionVariant::All,
            Some(TokenKind::SelectFirst) => SelectionVariant::First,
            Some(TokenKind::SelectLast) => SelectionVariant::Last,
            _ => return Ok(None),
        };
        let Some(t) = self.advance() else {
            return Ok(None);
        };
        let criteria = self.parse_expression()?;
        let criteria = criteria
            .ok_or_else(|| self.error(ParseErrorKind::MissingSelectionExpression, t.start))?;
        let close = self.expect(TokenKind::RSquare)?;
        Ok(Some(Node::new(
            NodeKind::Selection {
                variant,
                criteria: criteria.boxed(),
                null_safe,
            },
            Span::new(t.start, close.end),
        )))
    }

    fn parse_indexer(&mut self) -> ParseResult<Option<Node>> {
        if !self.check(TokenKind::LSquare) {
            return Ok(None);
        }
        let Some(t) = self.advance() else {
            return Ok(None);
        };
        let index = self.parse_expression()?;
        let index = match index {
            Some(index) => index,
            None => {
                return Err(match self.peek() {
                    Some(next) => self.error(
                        ParseErrorKind::UnexpectedToken {
                            expected: "expression".to_string(),
                            found: next.display_text().to_string(),
                        },
                        next.start,
                    ),
                    None => self.out_of_data(),
                });
            }
        };
        let close = self.expect(TokenKind::RSquare)?;
        Ok(Some(Node::new(
            NodeKind::Indexer {
                index: index.boxed(),
                cache: Box::default(),
                indexed: Slot::empty(),
            },
            Span::new(t.start, close.end),
        )))
    }

    /// `{}` empty list, `{:}` empty map, `{a, b}` list, `{k: v}` map.
    fn parse_inline_list_or_map(&mut self) -> ParseResult<Option<Node>> {
        if !self.check(TokenKind::LCurly) {
            return Ok(None);
        }
        let Some(open) = self.advance() else {
            return Ok(None);
        };

        if self.check(TokenKind::RCurly) {
            let close = self.expect(TokenKind::RCurly)?;
            return Ok(Some(self.inline_list(vec![], Span::new(open.start, close.end))));
        }
        if self.accept(TokenKind::Colon) {
            let close = self.expect(TokenKind::RCurly)?;
            return Ok(Some(self.inline_map(vec![], Span::new(open.start, close.end))));
        }

        let first = self.parse_expression()?;
        let first = first.ok_or_else(|| self.error(ParseErrorKind::OutOfData, open.start))?;

        if self.check(TokenKind::RCurly) {
            let close = self.expect(TokenKind::RCurly)?;
            return Ok(Some(
                self.inline_list(vec![first], Span::new(open.start, close.end)),
            ));
        }
        if self.accept(TokenKind::Comma) {
            let mut elements = vec![first];
            loop {
                let element = self.parse_expression()?;
                elements.push(element.ok_or_else(|| self.out_of_data())?);
                if !self.accept(TokenKind::Comma) {
                    break;
                }
            }
            let close = self.expect(TokenKind::RCurly)?;
            return Ok(Some(self.inline_list(elements, Span::new(open.start, close.end))));
        }
        if self.accept(TokenKind::Colon) {
            let value = self.parse_expression()?;
            let mut entries = vec![(first, value.ok_or_else(|| self.out_of_data())?)];
            while self.accept(TokenKind::Comma) {
                let key = self.parse_expression()?;
                let key = key.ok_or_else(|| self.out_of_data())?;
                self.expect(TokenKind::Colon)?;
                let value = self.parse_expression()?;
                entries.push((key, value.ok_or_else(|| self.out_of_data())?));
            }
            let close = self.expect(TokenKind::RCurly)?;
            return Ok(Some(self.inline_map(entries, Span::new(open.start, close.end))));
        }
        Err(self.error(ParseErrorKind::OutOfData, open.start))
    }

    fn inline_list(&self, elements: Vec<Node>, span: Span) -> Node {
        let constant = fold_list(&elements);
        Node::new(NodeKind::InlineList { elements, constant }, span)
    }

    fn inline_map(&self, entries: Vec<(Node, Node)>, span: Span) -> Node {
        let constant = fold_map(&entries);
        Node::new(NodeKind::InlineMap { entries, constant }, span)
    }

    /// `(a, b, ...)`; returns the arguments and the end of the closing paren.
    fn parse_arguments(&mut self) -> ParseResult<(Vec<Node>, usize)> {
        let open = self.expect(TokenKind::LParen)?;
        let mut args = vec![];
        loop {
            match self.peek() {
                None => {
                    return Err(self.error(ParseErrorKind::RunOutOfArguments, open.start));
                }
                Some(t) if t.kind == TokenKind::RParen => break,
                Some(_) => {}
            }
            let arg = self.parse_expression()?;
            match arg {
                Some(arg) => args.push(arg),
                None => {
                    return Err(match self.peek() {
                        Some(t) => self.error(
                            ParseErrorKind::UnexpectedToken {
                                expected: "argument".to_string(),
                                found: t.display_text().to_string(),
                            },
                            t.start,
                        ),
                        None => self.error(ParseErrorKind::RunOutOfArguments, open.start),
                    });
                }
            }
            if !self.accept(TokenKind::Comma) {
                break;
            }
        }
        if self.peek().is_none() {
            return Err(self.error(ParseErrorKind::RunOutOfArguments, open.start));
        }
        let close = self.expect(TokenKind::RParen)?;
        Ok((args, close.end))
    }

    fn parse_qualified_id(&mut self) -> ParseResult<Node> {
        let mut pieces = vec![];
        let mut span: Option<Span> = None;
        while let Some(t) = self.peek() {
            if !is_qualified_id_piece(t) {
                break;
            }
            let t = t.clone();
            self.advance();
            let piece_span = Span::new(t.start, t.end);
            span = Some(span.map_or(piece_span, |s| s.to(piece_span)));
            if t.kind != TokenKind::Dot {
                pieces.push(Node::new(NodeKind::Identifier(t.text), piece_span));
            }
        }
        match span {
            Some(span) if !pieces.is_empty() => {
                Ok(Node::new(NodeKind::QualifiedIdentifier(pieces), span))
            }
            _ => Err(match self.peek() {
                Some(t) => self.error(
                    ParseErrorKind::UnexpectedToken {
                        expected: "qualified ID".to_string(),
                        found: t.display_text().to_string(),
                    },
                    t.start,
                ),
                None => self.out_of_data(),
            }),
        }
    }
}

#[cfg(test)]
fn ast(text: &str) -> String {
    parse_ast(text, &ParserConfig::default())
        .unwrap()
        .to_ast_string()
}

#[test]
fn test_precedence() {
    assert_eq!(ast("1 + 2 * 3"), "(1 + (2 * 3))");
    assert_eq!(ast("a or b and c"), "(a or (b and c))");
    assert_eq!(ast("-2 ^ 2"), "(-2 ^ 2)");
    assert_eq!(ast("x = y"), "(x = y)");
    assert_eq!(ast("a ?: b ? c : d"), "(a ?: (b ? c : d))");
}

#[test]
fn test_keywords_as_map_keys() {
    assert_eq!(ast("map[T]"), "map[T]");
    assert_eq!(ast("map[new]"), "map[new]");
    assert_eq!(ast("map[null]"), "map[null]");
}

#[test]
fn test_trailing_input_is_rejected() {
    let err = parse_ast("1 2", &ParserConfig::default()).unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::MoreInput("2".to_string()));
    assert_eq!(err.position, 2);
}

#[test]
fn test_nesting_depth_is_limited() {
    let config = ParserConfig::interpreted().with_max_nesting_depth(8);
    let nested = |depth: usize| format!("{}1{}", "(".repeat(depth), ")".repeat(depth));

    // the outermost expression is the first level
    assert!(parse_ast(&nested(7), &config).is_ok());
    let err = parse_ast(&nested(8), &config).unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::NestingTooDeep { max: 8 });
    assert_eq!(err.position, 8);

    let err = parse_ast(&format!("{}1", "-".repeat(20)), &config).unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::NestingTooDeep { max: 8 });
}
