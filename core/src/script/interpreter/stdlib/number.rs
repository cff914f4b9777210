//! `Number` statics, `Number.prototype` and `Boolean.prototype`

use super::super::control::EvalResult;
use super::super::realm::ErrorKind;
use super::super::values::Val;
use super::super::Interpreter;
use super::arg;
use crate::script::number::number_to_string;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberMethod {
    ToFixed,
    ToPrecision,
    ToString,
    ValueOf,
    // Statics
    IsInteger,
    IsSafeInteger,
    IsFinite,
    IsNaN,
}

pub const PROTOTYPE: &[(&str, NumberMethod)] = &[
    ("toFixed", NumberMethod::ToFixed),
    ("toPrecision", NumberMethod::ToPrecision),
    ("toString", NumberMethod::ToString),
    ("toLocaleString", NumberMethod::ToString),
    ("valueOf", NumberMethod::ValueOf),
];

pub const STATICS: &[(&str, NumberMethod)] = &[
    ("isInteger", NumberMethod::IsInteger),
    ("isSafeInteger", NumberMethod::IsSafeInteger),
    ("isFinite", NumberMethod::IsFinite),
    ("isNaN", NumberMethod::IsNaN),
];

const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

pub const CONSTANTS: &[(&str, f64)] = &[
    ("MAX_SAFE_INTEGER", MAX_SAFE_INTEGER),
    ("MIN_SAFE_INTEGER", -MAX_SAFE_INTEGER),
    ("EPSILON", f64::EPSILON),
    ("MAX_VALUE", f64::MAX),
    ("MIN_VALUE", 5e-324),
    ("POSITIVE_INFINITY", f64::INFINITY),
    ("NEGATIVE_INFINITY", f64::NEG_INFINITY),
    ("NaN", f64::NAN),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanMethod {
    ToString,
    ValueOf,
}

impl<'c> Interpreter<'c> {
    pub(crate) fn number_method(&mut self, method: NumberMethod, this: Val, args: Vec<Val>) -> EvalResult {
        let integral = |value: &Val| matches!(value, Val::Num(n) if n.is_finite() && n.fract() == 0.0);
        match method {
            NumberMethod::IsInteger => return Ok(Val::Bool(integral(&arg(&args, 0)))),
            NumberMethod::IsSafeInteger => {
                let value = arg(&args, 0);
                let safe = matches!(value, Val::Num(n) if n.abs() <= MAX_SAFE_INTEGER);
                return Ok(Val::Bool(integral(&value) && safe));
            }
            NumberMethod::IsFinite => {
                return Ok(Val::Bool(matches!(arg(&args, 0), Val::Num(n) if n.is_finite())))
            }
            NumberMethod::IsNaN => {
                return Ok(Val::Bool(matches!(arg(&args, 0), Val::Num(n) if n.is_nan())))
            }
            _ => {}
        }

        let Val::Num(n) = this else {
            let name = PROTOTYPE
                .iter()
                .find(|(_, m)| *m == method)
                .map_or("valueOf", |(name, _)| *name);
            return self.throw(
                ErrorKind::TypeError,
                format!("Number.prototype.{} requires that 'this' be a Number", name),
            );
        };

        match method {
            NumberMethod::ToFixed => {
                let digits = self.to_integer(&arg(&args, 0))?;
                if !(0.0..=100.0).contains(&digits) {
                    return self.throw(
                        ErrorKind::RangeError,
                        "toFixed() digits argument must be between 0 and 100",
                    );
                }
                Ok(Val::string(to_fixed(n, digits as usize)))
            }
            NumberMethod::ToPrecision => {
                let precision = match arg(&args, 0) {
                    Val::Undefined => return Ok(Val::string(number_to_string(n))),
                    value => self.to_integer(&value)?,
                };
                if !n.is_finite() {
                    return Ok(Val::string(number_to_string(n)));
                }
                if !(1.0..=100.0).contains(&precision) {
                    return self.throw(
                        ErrorKind::RangeError,
                        "toPrecision() argument must be between 1 and 100",
                    );
                }
                Ok(Val::string(to_precision(n, precision as usize)))
            }
            NumberMethod::ToString => {
                let radix = match arg(&args, 0) {
                    Val::Undefined => 10.0,
                    value => self.to_integer(&value)?,
                };
                if !(2.0..=36.0).contains(&radix) {
                    return self.throw(
                        ErrorKind::RangeError,
                        "toString() radix must be between 2 and 36",
                    );
                }
                Ok(Val::string(if radix == 10.0 {
                    number_to_string(n)
                } else {
                    to_radix_string(n, radix as u32)
                }))
            }
            _ => Ok(Val::Num(n)),
        }
    }

    pub(crate) fn boolean_method(&mut self, method: BooleanMethod, this: Val) -> EvalResult {
        let Val::Bool(b) = this else {
            return self.throw(
                ErrorKind::TypeError,
                "Boolean.prototype.valueOf requires that 'this' be a Boolean",
            );
        };
        Ok(match method {
            BooleanMethod::ToString => Val::string(if b { "true" } else { "false" }),
            BooleanMethod::ValueOf => Val::Bool(b),
        })
    }
}

/* ===================== Formatting ===================== */

/// `n.toFixed(digits)`: exact ties round away from zero
pub fn to_fixed(n: f64, digits: usize) -> String {
    if !n.is_finite() || n.abs() >= 1e21 {
        return number_to_string(n);
    }
    let magnitude = n.abs();
    let scale = 10f64.powi(digits as i32);
    let scaled = magnitude * scale;
    let body = if scaled - scaled.trunc() == 0.5 {
        format!("{:.*}", digits, (scaled.trunc() + 1.0) / scale)
    } else {
        format!("{:.*}", digits, magnitude)
    };
    if n < 0.0 {
        format!("-{}", body)
    } else {
        body
    }
}

/// `n.toPrecision(precision)` for finite `n`
pub fn to_precision(n: f64, precision: usize) -> String {
    if n == 0.0 {
        return match precision {
            1 => "0".to_string(),
            _ => format!("0.{}", "0".repeat(precision - 1)),
        };
    }
    let sign = if n < 0.0 { "-" } else { "" };
    let scientific = format!("{:.*e}", precision - 1, n.abs());
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((scientific.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if exponent < -6 || exponent >= precision as i32 {
        let exp_sign = if exponent >= 0 { "+" } else { "-" };
        return format!("{}{}e{}{}", sign, mantissa, exp_sign, exponent.abs());
    }
    let decimals = (precision as i32 - 1 - exponent).max(0) as usize;
    format!("{}{:.*}", sign, decimals, n.abs())
}

/// `n.toString(radix)` for radix other than 10
pub fn to_radix_string(n: f64, radix: u32) -> String {
    if !n.is_finite() || n == 0.0 {
        return number_to_string(n);
    }
    let base = radix as f64;
    let mut integer = n.abs().trunc();
    let mut fraction = n.abs() - integer;

    let mut digits = Vec::new();
    while integer >= 1.0 {
        let digit = (integer % base) as u32;
        digits.push(char::from_digit(digit, radix).unwrap_or('0'));
        integer = (integer / base).trunc();
    }
    if digits.is_empty() {
        digits.push('0');
    }
    digits.reverse();

    let mut out: String = digits.into_iter().collect();
    if fraction > 0.0 {
        out.push('.');
        let mut emitted = 0;
        while fraction > 0.0 && emitted < 52 {
            fraction *= base;
            let digit = fraction.trunc();
            out.push(char::from_digit(digit as u32, radix).unwrap_or('0'));
            fraction -= digit;
            emitted += 1;
        }
    }
    if n < 0.0 {
        format!("-{}", out)
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_fixed() {
        assert_eq!(to_fixed(3.14159, 2), "3.14");
        assert_eq!(to_fixed(2.5, 0), "3");
        assert_eq!(to_fixed(1.25, 1), "1.3");
        assert_eq!(to_fixed(-2.5, 0), "-3");
        assert_eq!(to_fixed(1.005, 2), "1.00");
        assert_eq!(to_fixed(0.0, 2), "0.00");
        assert_eq!(to_fixed(42.0, 0), "42");
        assert_eq!(to_fixed(1e21, 2), "1e+21");
    }

    #[test]
    fn test_to_precision() {
        assert_eq!(to_precision(123.456, 4), "123.5");
        assert_eq!(to_precision(0.000123, 2), "0.00012");
        assert_eq!(to_precision(123456.0, 2), "1.2e+5");
        assert_eq!(to_precision(0.0, 3), "0.00");
        assert_eq!(to_precision(9.99, 2), "10");
    }

    #[test]
    fn test_radix() {
        assert_eq!(to_radix_string(255.0, 16), "ff");
        assert_eq!(to_radix_string(-10.0, 2), "-1010");
        assert_eq!(to_radix_string(0.5, 2), "0.1");
        assert_eq!(to_radix_string(35.0, 36), "z");
    }
}
