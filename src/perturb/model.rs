//! Perturbation model variants.
//!
//! Models arrive from external configuration as already-validated records;
//! this module only defines their shape. The variant set is closed: adding a
//! model kind or bounds mode forces every `match` in the dispatcher to be
//! revisited.

use crate::error::Error;
use crate::tree::FieldPath;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fixed elementwise-arithmetic operator set for scale operations.
///
/// The string -> enum boundary is where unknown operator names are rejected;
/// past it, exhaustive matching makes them unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Operator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
    Remainder,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Add => "add",
            Operator::Subtract => "subtract",
            Operator::Multiply => "multiply",
            Operator::Divide => "divide",
            Operator::Power => "power",
            Operator::Remainder => "remainder",
        }
    }

    /// Apply the operator to one (profile, delta) element pair.
    pub fn apply(&self, lhs: f64, rhs: f64) -> f64 {
        match self {
            Operator::Add => lhs + rhs,
            Operator::Subtract => lhs - rhs,
            Operator::Multiply => lhs * rhs,
            Operator::Divide => lhs / rhs,
            Operator::Power => lhs.powf(rhs),
            Operator::Remainder => lhs % rhs,
        }
    }
}

impl FromStr for Operator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(Operator::Add),
            "subtract" => Ok(Operator::Subtract),
            "multiply" => Ok(Operator::Multiply),
            "divide" => Ok(Operator::Divide),
            "power" => Ok(Operator::Power),
            "remainder" => Ok(Operator::Remainder),
            other => Err(Error::UnknownOperator(other.to_string())),
        }
    }
}

impl TryFrom<String> for Operator {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Operator> for String {
    fn from(op: Operator) -> Self {
        op.as_str().to_string()
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the stochastic sampler resolves its error bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundsMode {
    #[default]
    Auto,
    Symmetric,
    Asymmetric,
}

/// Deterministic elementwise arithmetic on one target field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleOperation {
    pub target: FieldPath,
    pub operator: Operator,
    pub value: f64,
    /// When set, `value` is a multiple of the error bound instead of an
    /// absolute delta.
    #[serde(default)]
    pub scale_to_error: bool,
}

/// Normal resampling of one target field around its nominal values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StochasticSampler {
    pub target: FieldPath,
    #[serde(default)]
    pub bounds: BoundsMode,
}

/// Closed tagged union over all perturbation variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PerturbationModel {
    Scale(ScaleOperation),
    Sample(StochasticSampler),
}

impl PerturbationModel {
    pub fn target(&self) -> &FieldPath {
        match self {
            PerturbationModel::Scale(op) => &op.target,
            PerturbationModel::Sample(sampler) => &sampler.target,
        }
    }
}

impl fmt::Display for PerturbationModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PerturbationModel::Scale(op) => write!(
                f,
                "scale({} {} {}, scale_to_error={})",
                op.target, op.operator, op.value, op.scale_to_error
            ),
            PerturbationModel::Sample(s) => {
                write!(f, "sample({}, bounds={:?})", s.target, s.bounds)
            }
        }
    }
}
