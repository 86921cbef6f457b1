use crate::{
    ast::BinaryOp,
    error::{EvalErrorKind, EvaluationError},
    resolve::OperatorOverloader,
    value::Value,
};

/// Overloads nothing.
#[derive(Debug, Default)]
pub struct StandardOperatorOverloader;

impl OperatorOverloader for StandardOperatorOverloader {
    fn overrides_operation(
        &self,
        _op: BinaryOp,
        _left: &Value,
        _right: &Value,
    ) -> Result<bool, EvaluationError> {
        Ok(false)
    }

    fn operate(
        &self,
        op: BinaryOp,
        left: &Value,
        right: &Value,
    ) -> Result<Value, EvaluationError> {
        Err(EvalErrorKind::OperatorNotSupported {
            operator: op.symbol().to_string(),
            left: left.type_name().to_string(),
            right: right.type_name().to_string(),
        }
        .into())
    }
}
