// src/engine/kernels.rs
//
// Numeric kernels for labeled blocks: named elementwise operations and
// reductions over Value cells. The container layers decide which cells
// participate and how results are re-labeled; this module only computes.

use crate::core::value::Value;
use crate::core::variable::Variable;
use crate::engine::error::{Error, Result};
use std::collections::HashMap;

/// Named binary operation entries, registered against both the
/// single-array and container types instead of operator overloading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Named unary operation entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Abs,
}

/// Reduction kernels applied over named dimensions. Null cells are
/// skipped; `Count` counts the cells that are not null.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    Sum,
    Mean,
    Min,
    Max,
    Count,
}

/// Elementwise combination of two cells. The missing-value sentinel
/// propagates through arithmetic and comparisons alike.
pub fn apply_binop(a: &Value, b: &Value, op: BinOp) -> Result<Value> {
    if a.is_null() || b.is_null() {
        return Ok(Value::Null);
    }
    match op {
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div => numeric_binop(a, b, op),
        BinOp::Eq => Ok(Value::Bool(cells_equal(a, b))),
        BinOp::Ne => Ok(Value::Bool(!cells_equal(a, b))),
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            let ord = a.compare(b).ok_or_else(|| {
                Error::type_err(format!("cannot compare {} with {}", a, b))
            })?;
            use std::cmp::Ordering::*;
            let keep = match op {
                BinOp::Lt => ord == Less,
                BinOp::Le => ord != Greater,
                BinOp::Gt => ord == Greater,
                BinOp::Ge => ord != Less,
                _ => unreachable!(),
            };
            Ok(Value::Bool(keep))
        }
    }
}

fn cells_equal(a: &Value, b: &Value) -> bool {
    match (a.as_float(), b.as_float()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn numeric_binop(a: &Value, b: &Value, op: BinOp) -> Result<Value> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) if op != BinOp::Div => Ok(Value::Int(match op {
            BinOp::Add => x + y,
            BinOp::Sub => x - y,
            BinOp::Mul => x * y,
            _ => unreachable!(),
        })),
        _ => {
            let (x, y) = match (a.as_float(), b.as_float()) {
                (Some(x), Some(y)) => (x, y),
                _ => {
                    return Err(Error::type_err(format!(
                        "unsupported operand types for arithmetic: {} and {}",
                        a.value_type(),
                        b.value_type()
                    )))
                }
            };
            if op == BinOp::Div && y == 0.0 {
                return Err(Error::value("division by zero in elementwise divide"));
            }
            Ok(Value::Float(match op {
                BinOp::Add => x + y,
                BinOp::Sub => x - y,
                BinOp::Mul => x * y,
                BinOp::Div => x / y,
                _ => unreachable!(),
            }))
        }
    }
}

pub fn apply_unop(a: &Value, op: UnOp) -> Result<Value> {
    match (a, op) {
        (Value::Null, _) => Ok(Value::Null),
        (Value::Int(x), UnOp::Neg) => Ok(Value::Int(-x)),
        (Value::Int(x), UnOp::Abs) => Ok(Value::Int(x.abs())),
        (Value::Float(x), UnOp::Neg) => Ok(Value::Float(-x)),
        (Value::Float(x), UnOp::Abs) => Ok(Value::Float(x.abs())),
        _ => Err(Error::type_err(format!(
            "unsupported operand type for unary op: {}",
            a.value_type()
        ))),
    }
}

impl Reduction {
    /// Reduce one lane of cells to a single cell.
    pub fn apply(&self, lane: &[Value]) -> Result<Value> {
        let cells: Vec<&Value> = lane.iter().filter(|v| !v.is_null()).collect();
        match self {
            Reduction::Count => Ok(Value::Int(cells.len() as i64)),
            Reduction::Sum => {
                if cells.is_empty() {
                    return Ok(Value::Int(0));
                }
                sum_cells(&cells)
            }
            Reduction::Mean => {
                if cells.is_empty() {
                    return Ok(Value::Null);
                }
                let total = sum_cells(&cells)?;
                let total = total.as_float().ok_or_else(|| {
                    Error::type_err("mean is only defined for numeric cells")
                })?;
                Ok(Value::Float(total / cells.len() as f64))
            }
            Reduction::Min | Reduction::Max => {
                let mut best: Option<&Value> = None;
                for v in &cells {
                    best = Some(match best {
                        None => v,
                        Some(b) => {
                            let ord = v.compare(b).ok_or_else(|| {
                                Error::type_err(format!("cannot compare {} with {}", v, b))
                            })?;
                            let take = if *self == Reduction::Min {
                                ord == std::cmp::Ordering::Less
                            } else {
                                ord == std::cmp::Ordering::Greater
                            };
                            if take {
                                v
                            } else {
                                b
                            }
                        }
                    });
                }
                Ok(best.cloned().unwrap_or(Value::Null))
            }
        }
    }
}

fn sum_cells(cells: &[&Value]) -> Result<Value> {
    let all_int = cells.iter().all(|v| matches!(v, Value::Int(_)));
    if all_int {
        Ok(Value::Int(cells.iter().map(|v| v.as_int().unwrap_or(0)).sum()))
    } else {
        let mut total = 0.0;
        for v in cells {
            total += v.as_float().ok_or_else(|| {
                Error::type_err(format!(
                    "cannot sum cells of type {}",
                    v.value_type()
                ))
            })?;
        }
        Ok(Value::Float(total))
    }
}

/// Elementwise combination of two variables, broadcasting by dimension
/// name: the result ranges over the union of both operands' dimensions
/// (left operand's order first). Shared dimensions must agree on size.
pub fn variable_binop(a: &Variable, b: &Variable, op: BinOp) -> Result<Variable> {
    let mut dims: Vec<String> = a.dims().to_vec();
    for d in b.dims() {
        if !dims.contains(d) {
            dims.push(d.clone());
        }
    }

    let mut sizes: HashMap<String, usize> = HashMap::new();
    for (d, &n) in a.dims().iter().zip(a.shape()) {
        sizes.insert(d.clone(), n);
    }
    for (d, &n) in b.dims().iter().zip(b.shape()) {
        if let Some(&existing) = sizes.get(d) {
            if existing != n {
                return Err(Error::value(format!(
                    "conflicting sizes for dimension '{}': {} vs {}",
                    d, existing, n
                )));
            }
        } else {
            sizes.insert(d.clone(), n);
        }
    }

    let left = a.broadcast_to(&dims, &sizes)?;
    let right = b.broadcast_to(&dims, &sizes)?;
    let lv = left.values()?;
    let rv = right.values()?;
    let data = lv
        .iter()
        .zip(rv.iter())
        .map(|(x, y)| apply_binop(x, y, op))
        .collect::<Result<Vec<_>>>()?;
    Variable::new(dims, left.shape().to_vec(), data)
}

/// Elementwise combination of a variable with one scalar cell.
pub fn variable_binop_scalar(a: &Variable, scalar: &Value, op: BinOp) -> Result<Variable> {
    let values = a.values()?;
    let data = values
        .iter()
        .map(|x| apply_binop(x, scalar, op))
        .collect::<Result<Vec<_>>>()?;
    Variable::new(a.dims().to_vec(), a.shape().to_vec(), data)
}

/// Elementwise unary operation.
pub fn variable_unop(a: &Variable, op: UnOp) -> Result<Variable> {
    let values = a.values()?;
    let data = values
        .iter()
        .map(|x| apply_unop(x, op))
        .collect::<Result<Vec<_>>>()?;
    Variable::new(a.dims().to_vec(), a.shape().to_vec(), data)
}
