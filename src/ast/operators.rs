/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    // Arithmetic
    /// Addition or string concatenation (`+`)
    Add,
    /// Subtraction (`-`)
    Subtract,
    /// Multiplication or string repetition (`*`)
    Multiply,
    /// Division (`/`, `div`)
    Divide,
    /// Remainder (`%`, `mod`)
    Modulo,
    /// Exponentiation (`^`)
    Power,

    // Logical
    /// Logical AND (`and`, `&&`), short-circuiting
    And,
    /// Logical OR (`or`, `||`), short-circuiting
    Or,

    // Relational
    /// Equal (`==`, `eq`)
    Equal,
    /// Not equal (`!=`, `ne`)
    NotEqual,
    /// Less than (`<`, `lt`)
    LessThan,
    /// Less than or equal (`<=`, `le`)
    LessEqual,
    /// Greater than (`>`, `gt`)
    GreaterThan,
    /// Greater than or equal (`>=`, `ge`)
    GreaterEqual,
    /// Type test against a type reference (`instanceof`)
    Instanceof,
    /// Full regular-expression match (`matches`)
    Matches,
    /// Inclusive range test against a two-element list (`between`)
    Between,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Power => "^",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::LessThan => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::Instanceof => "instanceof",
            BinaryOp::Matches => "matches",
            BinaryOp::Between => "between",
        }
    }

    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            BinaryOp::Add
                | BinaryOp::Subtract
                | BinaryOp::Multiply
                | BinaryOp::Divide
                | BinaryOp::Modulo
                | BinaryOp::Power
        )
    }

    pub fn is_ordering(&self) -> bool {
        matches!(
            self,
            BinaryOp::LessThan
                | BinaryOp::LessEqual
                | BinaryOp::GreaterThan
                | BinaryOp::GreaterEqual
        )
    }
}

/// Prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// Numeric identity (`+x`)
    Plus,
    /// Negation (`-x`)
    Minus,
    /// Logical not (`!x`, `not x`)
    Not,
}

impl UnaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOp::Plus => "+",
            UnaryOp::Minus => "-",
            UnaryOp::Not => "!",
        }
    }
}

/// Increment and decrement, on writable operands only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepOp {
    Increment,
    Decrement,
}

impl StepOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            StepOp::Increment => "++",
            StepOp::Decrement => "--",
        }
    }
}

/// Which elements a selection keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectionVariant {
    /// `?[...]`, every match
    All,
    /// `^[...]`, the first match
    First,
    /// `$[...]`, the last match
    Last,
}

impl SelectionVariant {
    pub fn prefix(&self) -> &'static str {
        match self {
            SelectionVariant::All => "?[",
            SelectionVariant::First => "^[",
            SelectionVariant::Last => "$[",
        }
    }
}
