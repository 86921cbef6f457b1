//! # Anise Expression Language - Abstract Syntax Tree
//!
//! This module defines the tree the parser produces and the interpreter and
//! compiler consume.
//!
//! ## Architecture Overview
//!
//! - **[tokens]** - Lexical tokens produced by the lexer
//! - **[expressions]** - The [`Node`] type and its ~37 kinds
//! - **[operators]** - Binary, unary and step operators, selection variants
//! - **[format]** - Rendering a tree back to expression text
//!
//! ## Quick Start
//!
//! ```text
//! people.?[age > 30].![name.toUpperCase()]
//! ```
//!
//! Selects the people older than thirty, then projects their upper-cased
//! names.
//!
//! ## Core Concepts
//!
//! ### Compound expressions
//!
//! A navigation chain is one `Compound` node whose first child is a start
//! node (literal, variable, property, method call, ...) and whose other
//! children are evaluated against the result of the previous one:
//!
//! ```text
//! person.address?.city        // Compound[person, address, ?.city]
//! orders[0].total             // Compound[orders, [0], total]
//! ```
//!
//! ### Active object and scope root
//!
//! Property and method nodes always resolve against the *active object*.
//! Arguments, indices and selection criteria are evaluated with the scope
//! root (the root object, or the current element inside selection and
//! projection) as the active object:
//!
//! ```text
//! list[index]                 // `index` is read from the root
//! people.?[age > #threshold]  // `age` is read from each element
//! ```
//!
//! ### Null-safe navigation
//!
//! `?.` short-circuits on null instead of failing:
//!
//! ```text
//! person?.address?.city       // null when person or address is null
//! ```
//!
//! ### Learned types
//!
//! Each node records the type of the values it produces and the resolution
//! handle it used. When a hot expression is compiled, those records drive
//! the specialization.
pub mod expressions;
pub mod format;
pub mod operators;
pub mod tokens;

pub use expressions::{
    AccessorCache, CachedAccessor, CachedExecutor, ConstructorCache, IndexedKind, MethodCache, Node,
    NodeKind, Slot, Span,
};
pub use operators::{BinaryOp, SelectionVariant, StepOp, UnaryOp};
pub use tokens::{Token, TokenKind};
