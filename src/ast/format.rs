//! Renders a tree back to expression text.
//!
//! Binary operators, ternaries, elvis and assignments are parenthesized, so
//! parsing the output yields a tree that renders identically.

use std::fmt::{self, Display, Formatter, Write};

use crate::ast::{Node, NodeKind};
use crate::value::Value;

fn write_args(f: &mut Formatter<'_>, args: &[Node]) -> fmt::Result {
    f.write_char('(')?;
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            f.write_char(',')?;
        }
        write!(f, "{}", arg)?;
    }
    f.write_char(')')
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

impl Display for Node {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        use NodeKind::*;
        match &self.kind {
            Int(n) => write!(f, "{}", n),
            Long(n) => write!(f, "{}L", n),
            Float(n) => write!(f, "{}f", Value::Float(*n)),
            Double(n) => write!(f, "{}", Value::Double(*n)),
            String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Boolean(b) => write!(f, "{}", b),
            Null => f.write_str("null"),

            InlineList { elements, .. } => {
                f.write_char('{')?;
                for (i, e) in elements.iter().enumerate() {
                    if i > 0 {
                        f.write_char(',')?;
                    }
                    write!(f, "{}", e)?;
                }
                f.write_char('}')
            }
            InlineMap { entries, .. } => {
                if entries.is_empty() {
                    return f.write_str("{:}");
                }
                f.write_char('{')?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_char(',')?;
                    }
                    write!(f, "{}:{}", k, v)?;
                }
                f.write_char('}')
            }

            Identifier(name) => f.write_str(name),
            QualifiedIdentifier(parts) => {
                for (i, p) in parts.iter().enumerate() {
                    if i > 0 {
                        f.write_char('.')?;
                    }
                    write!(f, "{}", p)?;
                }
                Ok(())
            }

            Compound(children) => {
                for (i, child) in children.iter().enumerate() {
                    write!(f, "{}", child)?;
                    if let Some(next) = children.get(i + 1) {
                        if next.is_null_safe() {
                            f.write_str("?.")?;
                        } else if !matches!(next.kind, Indexer { .. }) {
                            f.write_char('.')?;
                        }
                    }
                }
                Ok(())
            }
            Property { name, .. } => f.write_str(name),
            Method { name, args, .. } => {
                f.write_str(name)?;
                write_args(f, args)
            }
            Indexer { index, .. } => write!(f, "[{}]", index),
            Selection {
                variant, criteria, ..
            } => write!(f, "{}{}]", variant.prefix(), criteria),
            Projection { expression, .. } => write!(f, "![{}]", expression),
            Variable(name) => write!(f, "#{}", name),
            Function { name, args, .. } => {
                write!(f, "#{}", name)?;
                write_args(f, args)
            }
            Bean { name, factory } => {
                f.write_char(if *factory { '&' } else { '@' })?;
                if is_plain_identifier(name) {
                    f.write_str(name)
                } else {
                    write!(f, "'{}'", name.replace('\'', "''"))
                }
            }
            TypeReference {
                name, dimensions, ..
            } => {
                write!(f, "T({}", name)?;
                for _ in 0..*dimensions {
                    f.write_str("[]")?;
                }
                f.write_char(')')
            }
            Constructor {
                type_name, args, ..
            } => {
                write!(f, "new {}", type_name)?;
                write_args(f, args)
            }
            ArrayConstructor {
                type_name,
                dimensions,
                initializer,
            } => {
                write!(f, "new {}", type_name)?;
                for d in dimensions {
                    match d {
                        Some(size) => write!(f, "[{}]", size)?,
                        None => f.write_str("[]")?,
                    }
                }
                if let Some(init) = initializer {
                    write!(f, "{}", init)?;
                }
                Ok(())
            }

            Binary { op, left, right } => write!(f, "({} {} {})", left, op.symbol(), right),
            // `-(-x)` must not render as `--x`
            Unary { op, operand } if matches!(operand.kind, Unary { .. } | Step { .. }) => {
                write!(f, "{}({})", op.symbol(), operand)
            }
            Unary { op, operand } => write!(f, "{}{}", op.symbol(), operand),
            Step {
                op,
                prefix,
                operand,
            } => {
                if *prefix {
                    write!(f, "{}{}", op.symbol(), operand)
                } else {
                    write!(f, "{}{}", operand, op.symbol())
                }
            }
            Ternary {
                condition,
                if_true,
                if_false,
            } => write!(f, "({} ? {} : {})", condition, if_true, if_false),
            Elvis { value, fallback } => write!(f, "({} ?: {})", value, fallback),
            Assign { target, value } => write!(f, "({} = {})", target, value),
        }
    }
}

impl Node {
    pub fn is_null_safe(&self) -> bool {
        match &self.kind {
            NodeKind::Property { null_safe, .. }
            | NodeKind::Method { null_safe, .. }
            | NodeKind::Selection { null_safe, .. }
            | NodeKind::Projection { null_safe, .. } => *null_safe,
            _ => false,
        }
    }

    /// The node rendered back to expression text.
    pub fn to_ast_string(&self) -> String {
        self.to_string()
    }
}
