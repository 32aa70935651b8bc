//! Numerical kernel backend.
//!
//! Kernel operations in the registry delegate here by name. The numerics
//! themselves live outside this crate; [`ReferenceKernels`] is a small
//! pure-Rust backend covering a handful of real-valued BLAS-style
//! routines and reports every other kernel as not linked.

use mockall::automock;
use thiserror::Error;

use crate::eval::Value;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum KernelError {
    #[error("kernel {0} is not linked into this image")]
    NotLinked(String),
    #[error("{name}() takes {expected} arguments ({found} given)")]
    Arity {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("{name}(): {reason}")]
    InvalidArgument { name: String, reason: String },
}

pub type KernelResult<T> = Result<T, KernelError>;

#[automock]
pub trait KernelBackend: Send + Sync {
    /// Runs the kernel operation `name`.
    fn invoke(&self, name: &str, args: &[Value]) -> KernelResult<Value>;

    /// Builds the field values of a native composite type.
    fn construct(&self, type_name: &str, args: &[Value]) -> KernelResult<Vec<(String, Value)>>;

    /// Version of the linked exchange-correlation library.
    fn xc_version(&self) -> String;
}

#[derive(Debug, Clone)]
pub struct ReferenceKernels {
    xc_version: String,
}

impl Default for ReferenceKernels {
    fn default() -> Self {
        Self::new("5.1.0")
    }
}

impl ReferenceKernels {
    pub fn new(xc_version: impl Into<String>) -> Self {
        Self {
            xc_version: xc_version.into(),
        }
    }
}

fn arity(name: &str, args: &[Value], expected: usize) -> KernelResult<()> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(KernelError::Arity {
            name: name.to_string(),
            expected,
            found: args.len(),
        })
    }
}

fn invalid(name: &str, reason: impl Into<String>) -> KernelError {
    KernelError::InvalidArgument {
        name: name.to_string(),
        reason: reason.into(),
    }
}

fn scalar(name: &str, value: &Value) -> KernelResult<f64> {
    value
        .as_f64()
        .ok_or_else(|| invalid(name, format!("expected a number, got {}", value.type_name())))
}

fn vector(name: &str, value: &Value) -> KernelResult<Vec<f64>> {
    value
        .as_f64_list()
        .ok_or_else(|| invalid(name, format!("expected a list of numbers, got {}", value.type_name())))
}

fn same_length(name: &str, a: &[f64], b: &[f64]) -> KernelResult<()> {
    if a.len() == b.len() {
        Ok(())
    } else {
        Err(invalid(
            name,
            format!("length mismatch: {} and {}", a.len(), b.len()),
        ))
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Packs a symmetric matrix into its upper triangle; off-diagonal entries
/// hold `a[i][j] + a[j][i]`.
fn pack(name: &str, matrix: &Value) -> KernelResult<Value> {
    let Value::List(rows) = matrix else {
        return Err(invalid(name, "expected a square matrix"));
    };
    let rows = rows
        .iter()
        .map(|row| vector(name, row))
        .collect::<KernelResult<Vec<_>>>()?;
    let n = rows.len();
    if rows.iter().any(|row| row.len() != n) {
        return Err(invalid(name, "expected a square matrix"));
    }
    let mut packed = Vec::with_capacity(n * (n + 1) / 2);
    for i in 0..n {
        packed.push(rows[i][i]);
        for j in i + 1..n {
            packed.push(rows[i][j] + rows[j][i]);
        }
    }
    Ok(Value::from(packed))
}

/// Inverse of the averaging pack: fills both triangles from the packed
/// upper triangle.
fn unpack(name: &str, packed: &Value) -> KernelResult<Value> {
    let packed = vector(name, packed)?;
    let mut n = 0;
    while n * (n + 1) / 2 < packed.len() {
        n += 1;
    }
    if n * (n + 1) / 2 != packed.len() {
        return Err(invalid(
            name,
            format!("{} is not a triangular number", packed.len()),
        ));
    }
    let mut matrix = vec![vec![0.0; n]; n];
    let mut values = packed.into_iter();
    for i in 0..n {
        for j in i..n {
            let value = values.next().unwrap_or_default();
            matrix[i][j] = value;
            matrix[j][i] = value;
        }
    }
    Ok(Value::List(matrix.into_iter().map(Value::from).collect()))
}

impl KernelBackend for ReferenceKernels {
    #[tracing::instrument(level = "debug", skip(self, args))]
    fn invoke(&self, name: &str, args: &[Value]) -> KernelResult<Value> {
        match name {
            "scal" => {
                arity(name, args, 2)?;
                let alpha = scalar(name, &args[0])?;
                let x = vector(name, &args[1])?;
                Ok(Value::from(x.into_iter().map(|v| alpha * v).collect::<Vec<_>>()))
            }
            "axpy" => {
                arity(name, args, 3)?;
                let alpha = scalar(name, &args[0])?;
                let x = vector(name, &args[1])?;
                let y = vector(name, &args[2])?;
                same_length(name, &x, &y)?;
                Ok(Value::from(
                    x.iter().zip(&y).map(|(x, y)| alpha * x + y).collect::<Vec<_>>(),
                ))
            }
            "dotu" | "dotc" | "utilities_vdot" => {
                arity(name, args, 2)?;
                let a = vector(name, &args[0])?;
                let b = vector(name, &args[1])?;
                same_length(name, &a, &b)?;
                Ok(Value::Float(dot(&a, &b)))
            }
            "utilities_vdot_self" => {
                arity(name, args, 1)?;
                let a = vector(name, &args[0])?;
                Ok(Value::Float(dot(&a, &a)))
            }
            "pack" => {
                arity(name, args, 1)?;
                pack(name, &args[0])
            }
            "unpack" => {
                arity(name, args, 1)?;
                unpack(name, &args[0])
            }
            _ => Err(KernelError::NotLinked(name.to_string())),
        }
    }

    fn construct(&self, type_name: &str, args: &[Value]) -> KernelResult<Vec<(String, Value)>> {
        match type_name {
            "Spline" => {
                arity(type_name, args, 3)?;
                let Value::Integer(l) = args[0] else {
                    return Err(invalid(type_name, "angular momentum must be an int"));
                };
                let rcut = scalar(type_name, &args[1])?;
                if rcut <= 0.0 {
                    return Err(invalid(type_name, "cutoff must be positive"));
                }
                let values = vector(type_name, &args[2])?;
                Ok(vec![
                    ("l".to_string(), Value::Integer(l)),
                    ("rcut".to_string(), Value::Float(rcut)),
                    ("values".to_string(), Value::from(values)),
                ])
            }
            _ => Err(KernelError::NotLinked(type_name.to_string())),
        }
    }

    fn xc_version(&self) -> String {
        self.xc_version.clone()
    }
}
