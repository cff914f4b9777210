//! The `Math` namespace

use super::super::control::EvalResult;
use super::super::expressions::pow;
use super::super::values::Val;
use super::super::Interpreter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathFunc {
    Abs,
    Floor,
    Ceil,
    Round,
    Trunc,
    Sign,
    Sqrt,
    Cbrt,
    Pow,
    Min,
    Max,
    Random,
    Log,
    Log2,
    Log10,
    Exp,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Atan2,
    Hypot,
}

pub const FUNCTIONS: &[(&str, MathFunc)] = &[
    ("abs", MathFunc::Abs),
    ("floor", MathFunc::Floor),
    ("ceil", MathFunc::Ceil),
    ("round", MathFunc::Round),
    ("trunc", MathFunc::Trunc),
    ("sign", MathFunc::Sign),
    ("sqrt", MathFunc::Sqrt),
    ("cbrt", MathFunc::Cbrt),
    ("pow", MathFunc::Pow),
    ("min", MathFunc::Min),
    ("max", MathFunc::Max),
    ("random", MathFunc::Random),
    ("log", MathFunc::Log),
    ("log2", MathFunc::Log2),
    ("log10", MathFunc::Log10),
    ("exp", MathFunc::Exp),
    ("sin", MathFunc::Sin),
    ("cos", MathFunc::Cos),
    ("tan", MathFunc::Tan),
    ("asin", MathFunc::Asin),
    ("acos", MathFunc::Acos),
    ("atan", MathFunc::Atan),
    ("atan2", MathFunc::Atan2),
    ("hypot", MathFunc::Hypot),
];

pub const CONSTANTS: &[(&str, f64)] = &[
    ("PI", std::f64::consts::PI),
    ("E", std::f64::consts::E),
    ("LN2", std::f64::consts::LN_2),
    ("LN10", std::f64::consts::LN_10),
    ("LOG2E", std::f64::consts::LOG2_E),
    ("LOG10E", std::f64::consts::LOG10_E),
    ("SQRT2", std::f64::consts::SQRT_2),
    ("SQRT1_2", std::f64::consts::FRAC_1_SQRT_2),
];

impl<'c> Interpreter<'c> {
    pub(crate) fn math_func(&mut self, func: MathFunc, args: Vec<Val>) -> EvalResult {
        let mut numbers = Vec::with_capacity(args.len());
        for value in &args {
            numbers.push(self.to_number(value)?);
        }
        let x = numbers.first().copied().unwrap_or(f64::NAN);
        let y = numbers.get(1).copied().unwrap_or(f64::NAN);

        let result = match func {
            MathFunc::Abs => x.abs(),
            MathFunc::Floor => x.floor(),
            MathFunc::Ceil => x.ceil(),
            MathFunc::Round => round_half_up(x),
            MathFunc::Trunc => x.trunc(),
            MathFunc::Sign => {
                if x.is_nan() || x == 0.0 {
                    x
                } else {
                    x.signum()
                }
            }
            MathFunc::Sqrt => x.sqrt(),
            MathFunc::Cbrt => x.cbrt(),
            MathFunc::Pow => pow(x, y),
            MathFunc::Min => numbers.iter().try_fold(f64::INFINITY, |acc, &n| {
                if n.is_nan() {
                    None
                } else {
                    Some(acc.min(n))
                }
            })
            .unwrap_or(f64::NAN),
            MathFunc::Max => numbers.iter().try_fold(f64::NEG_INFINITY, |acc, &n| {
                if n.is_nan() {
                    None
                } else {
                    Some(acc.max(n))
                }
            })
            .unwrap_or(f64::NAN),
            MathFunc::Random => self.next_random(),
            MathFunc::Log => x.ln(),
            MathFunc::Log2 => x.log2(),
            MathFunc::Log10 => x.log10(),
            MathFunc::Exp => x.exp(),
            MathFunc::Sin => x.sin(),
            MathFunc::Cos => x.cos(),
            MathFunc::Tan => x.tan(),
            MathFunc::Asin => x.asin(),
            MathFunc::Acos => x.acos(),
            MathFunc::Atan => x.atan(),
            MathFunc::Atan2 => x.atan2(y),
            MathFunc::Hypot => {
                if numbers.iter().any(|n| n.is_infinite()) {
                    f64::INFINITY
                } else {
                    numbers.iter().map(|n| n * n).sum::<f64>().sqrt()
                }
            }
        };
        Ok(Val::Num(result))
    }
}

/// `Math.round`: halves round toward +Infinity
fn round_half_up(x: f64) -> f64 {
    if !x.is_finite() {
        return x;
    }
    let floor = x.floor();
    if x - floor >= 0.5 {
        floor + 1.0
    } else {
        floor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_half_up() {
        assert_eq!(round_half_up(2.5), 3.0);
        assert_eq!(round_half_up(-2.5), -2.0);
        assert_eq!(round_half_up(-2.6), -3.0);
        assert_eq!(round_half_up(0.49999999999999994), 0.0);
        assert!(round_half_up(f64::NAN).is_nan());
    }
}
