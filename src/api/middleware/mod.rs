//! API middleware stack.
//!
//! Execution order (outermost → innermost):
//! 1. Operator identity: rejects requests without `X-Operator-Id`
//! 2. Access log: method, path, operator and response status

pub mod audit;
pub mod operator;
