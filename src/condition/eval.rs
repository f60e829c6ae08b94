//! Evaluation of compiled condition trees.
//!
//! Evaluation never mutates pet state. Runtime failures (a type mismatch,
//! division by zero, a non-finite number) make the whole predicate false and
//! are logged as warnings.

use glam::Vec2;
use log::warn;
use thiserror::Error;

use super::CompiledPredicate;
use super::parser::{ArithOp, Attribute, CmpOp, Expr, FunctionCall, LogicalOp, Value};
use crate::components::pet::{Facing, PetSnapshot};
use crate::resources::environment::Environment;

/// Tolerance used by `==` and `!=` on numbers.
const EQ_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    #[error("division by zero")]
    DivisionByZero,
    #[error("non-finite result")]
    NonFinite,
}

/// Evaluate `pred` for `pet` in `env`.
pub fn evaluate(
    pred: &CompiledPredicate,
    pet: &PetSnapshot,
    env: &Environment,
    rng: &mut fastrand::Rng,
) -> bool {
    match eval_expr(&pred.expr, pet, env, rng).and_then(expect_bool) {
        Ok(result) => result,
        Err(e) => {
            warn!("Condition '{}' evaluated to false: {}", pred.source, e);
            false
        }
    }
}

/// Evaluate an expression to a [`Value`].
pub fn eval_expr(
    expr: &Expr,
    pet: &PetSnapshot,
    env: &Environment,
    rng: &mut fastrand::Rng,
) -> Result<Value, EvalError> {
    match expr {
        Expr::Literal(v) => Ok(*v),
        Expr::AttributeRef(attr) => Ok(read_attribute(*attr, pet, env)),
        Expr::Comparison { op, lhs, rhs } => {
            let a = eval_expr(lhs, pet, env, rng)?;
            let b = eval_expr(rhs, pet, env, rng)?;
            compare(*op, a, b).map(Value::Bool)
        }
        Expr::Logical { op, lhs, rhs } => {
            let a = expect_bool(eval_expr(lhs, pet, env, rng)?)?;
            let result = match op {
                LogicalOp::And => a && expect_bool(eval_expr(rhs, pet, env, rng)?)?,
                LogicalOp::Or => a || expect_bool(eval_expr(rhs, pet, env, rng)?)?,
            };
            Ok(Value::Bool(result))
        }
        Expr::Not(inner) => Ok(Value::Bool(!expect_bool(eval_expr(inner, pet, env, rng)?)?)),
        Expr::Arithmetic { op, lhs, rhs } => {
            let a = expect_number(eval_expr(lhs, pet, env, rng)?)?;
            let b = expect_number(eval_expr(rhs, pet, env, rng)?)?;
            let result = match op {
                ArithOp::Add => a + b,
                ArithOp::Sub => a - b,
                ArithOp::Mul => a * b,
                ArithOp::Div | ArithOp::Rem if b == 0.0 => {
                    return Err(EvalError::DivisionByZero);
                }
                ArithOp::Div => a / b,
                ArithOp::Rem => a % b,
            };
            finite(result)
        }
        Expr::Negate(inner) => {
            let n = expect_number(eval_expr(inner, pet, env, rng)?)?;
            finite(-n)
        }
        Expr::Call(call) => eval_call(call, pet, env, rng),
    }
}

fn eval_call(
    call: &FunctionCall,
    pet: &PetSnapshot,
    env: &Environment,
    rng: &mut fastrand::Rng,
) -> Result<Value, EvalError> {
    match call {
        FunctionCall::IsOn(kind) => Ok(Value::Bool(pet.flags.is_on(*kind))),
        FunctionCall::Random(p) => {
            let p = expect_number(eval_expr(p, pet, env, rng)?)?;
            Ok(Value::Bool(rng.f64() < p))
        }
        FunctionCall::MathRandom => Ok(Value::Number(rng.f64())),
        FunctionCall::Abs(inner) => {
            let n = expect_number(eval_expr(inner, pet, env, rng)?)?;
            Ok(Value::Number(n.abs()))
        }
        FunctionCall::Min(a, b) | FunctionCall::Max(a, b) => {
            let a = expect_number(eval_expr(a, pet, env, rng)?)?;
            let b = expect_number(eval_expr(b, pet, env, rng)?)?;
            let result = if matches!(call, FunctionCall::Min(..)) {
                a.min(b)
            } else {
                a.max(b)
            };
            Ok(Value::Number(result))
        }
    }
}

/// Anchor point: bottom-center of the pet rectangle.
pub fn anchor_point(pet: &PetSnapshot) -> Vec2 {
    Vec2::new(pet.position.x + pet.size.x * 0.5, pet.position.y + pet.size.y)
}

fn read_attribute(attr: Attribute, pet: &PetSnapshot, env: &Environment) -> Value {
    let num = |v: f32| Value::Number(v as f64);
    let flags = &pet.flags;
    match attr {
        Attribute::X => num(pet.position.x),
        Attribute::Y => num(pet.position.y),
        Attribute::Vx => num(pet.velocity.x),
        Attribute::Vy => num(pet.velocity.y),
        Attribute::Width => num(pet.size.x),
        Attribute::Height => num(pet.size.y),
        Attribute::AnchorX => num(anchor_point(pet).x),
        Attribute::AnchorY => num(anchor_point(pet).y),
        Attribute::OnFloor => Value::Bool(flags.on_floor),
        Attribute::OnCeiling => Value::Bool(flags.on_ceiling),
        Attribute::OnLeftWall => Value::Bool(flags.on_left_wall),
        Attribute::OnRightWall => Value::Bool(flags.on_right_wall),
        Attribute::CloseToLeftWall => Value::Bool(flags.close_to_left_wall),
        Attribute::CloseToRightWall => Value::Bool(flags.close_to_right_wall),
        Attribute::RightFloor => Value::Bool(flags.right_floor),
        Attribute::LeftFloor => Value::Bool(flags.left_floor),
        Attribute::RightCeiling => Value::Bool(flags.right_ceiling),
        Attribute::LeftCeiling => Value::Bool(flags.left_ceiling),
        Attribute::IsDragging => Value::Bool(pet.is_dragging),
        Attribute::IsThrown => Value::Bool(pet.is_thrown),
        Attribute::LookRight => Value::Bool(pet.facing == Facing::Right),
        Attribute::BorderLine(kind) => num(env.bounds.line(kind)),
        Attribute::ScreenWidth => num(env.screen_width),
        Attribute::ScreenHeight => num(env.screen_height),
        Attribute::WorkAreaLeft => Value::Number(0.0),
        Attribute::WorkAreaTop => Value::Number(0.0),
        Attribute::WorkAreaRight => num(env.screen_width),
        Attribute::WorkAreaBottom => num(env.screen_height),
    }
}

fn compare(op: CmpOp, a: Value, b: Value) -> Result<bool, EvalError> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => Ok(match op {
            CmpOp::Lt => a < b,
            CmpOp::Le => a <= b,
            CmpOp::Gt => a > b,
            CmpOp::Ge => a >= b,
            CmpOp::Eq => (a - b).abs() < EQ_EPSILON,
            CmpOp::Ne => (a - b).abs() >= EQ_EPSILON,
        }),
        (Value::Bool(a), Value::Bool(b)) => match op {
            CmpOp::Eq => Ok(a == b),
            CmpOp::Ne => Ok(a != b),
            _ => Err(EvalError::TypeMismatch {
                expected: "number",
                found: "bool",
            }),
        },
        (Value::Number(_), other) | (other, Value::Number(_)) => Err(EvalError::TypeMismatch {
            expected: "number",
            found: other.type_name(),
        }),
    }
}

fn expect_bool(v: Value) -> Result<bool, EvalError> {
    match v {
        Value::Bool(b) => Ok(b),
        other => Err(EvalError::TypeMismatch {
            expected: "bool",
            found: other.type_name(),
        }),
    }
}

fn expect_number(v: Value) -> Result<f64, EvalError> {
    match v {
        Value::Number(n) if n.is_finite() => Ok(n),
        Value::Number(_) => Err(EvalError::NonFinite),
        other => Err(EvalError::TypeMismatch {
            expected: "number",
            found: other.type_name(),
        }),
    }
}

fn finite(n: f64) -> Result<Value, EvalError> {
    if n.is_finite() {
        Ok(Value::Number(n))
    } else {
        Err(EvalError::NonFinite)
    }
}
