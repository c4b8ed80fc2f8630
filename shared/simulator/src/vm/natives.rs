use super::value::{format_number, string_to_number, Value};
use super::Error;
use crate::rng::SeededRng;
use rand::Rng;
use std::f64::consts::{E, LN_10, LN_2, LOG10_E, LOG2_E, PI, SQRT_2};

/// The avatar's side of the sandbox. Every capability a script has over the
/// battle goes through this trait.
pub trait Host {
    fn log(&mut self, value: f64);
    fn scan(&mut self, degree: f64, resolution: f64) -> f64;
    fn cannon(&mut self, degree: f64, range: f64) -> bool;
    fn drive(&mut self, degree: f64, speed: f64);
    fn stop(&mut self);
    fn damage(&self) -> f64;
    fn speed(&self) -> f64;
    fn loc_x(&self) -> f64;
    fn loc_y(&self) -> f64;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Primitive {
    Log,
    Scan,
    Cannon,
    Drive,
    Stop,
    Damage,
    Health,
    Speed,
    LocX,
    LocY,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MathFn {
    Abs,
    Sqrt,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Atan2,
    SinDeg,
    CosDeg,
    TanDeg,
    AsinDeg,
    AcosDeg,
    AtanDeg,
    Floor,
    Ceil,
    Round,
    Min,
    Max,
    Pow,
    Exp,
    Log,
    Random,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Native {
    Api(Primitive),
    Math(MathFn),
    IsNaN,
    IsFinite,
    ParseFloat,
    ParseInt,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Namespace {
    Math,
}

impl Native {
    pub fn name(&self) -> &'static str {
        match self {
            Native::Api(p) => match p {
                Primitive::Log => "log",
                Primitive::Scan => "scan",
                Primitive::Cannon => "cannon",
                Primitive::Drive => "drive",
                Primitive::Stop => "stop",
                Primitive::Damage => "damage",
                Primitive::Health => "health",
                Primitive::Speed => "speed",
                Primitive::LocX => "loc_x",
                Primitive::LocY => "loc_y",
            },
            Native::Math(_) => "Math function",
            Native::IsNaN => "isNaN",
            Native::IsFinite => "isFinite",
            Native::ParseFloat => "parseFloat",
            Native::ParseInt => "parseInt",
        }
    }
}

/// Value of a predefined global, if `name` is one.
pub fn global(name: &str) -> Option<Value> {
    let api = |p| Some(Value::Native(Native::Api(p)));
    match name {
        "log" => api(Primitive::Log),
        "scan" => api(Primitive::Scan),
        "cannon" => api(Primitive::Cannon),
        "drive" | "swim" => api(Primitive::Drive),
        "stop" => api(Primitive::Stop),
        "damage" => api(Primitive::Damage),
        "health" => api(Primitive::Health),
        "speed" => api(Primitive::Speed),
        "loc_x" | "getX" => api(Primitive::LocX),
        "loc_y" | "getY" => api(Primitive::LocY),
        "Math" => Some(Value::Namespace(Namespace::Math)),
        "Infinity" => Some(Value::Number(f64::INFINITY)),
        "NaN" => Some(Value::Number(f64::NAN)),
        "undefined" => Some(Value::Undefined),
        "isNaN" => Some(Value::Native(Native::IsNaN)),
        "isFinite" => Some(Value::Native(Native::IsFinite)),
        "parseFloat" => Some(Value::Native(Native::ParseFloat)),
        "parseInt" => Some(Value::Native(Native::ParseInt)),
        _ => None,
    }
}

pub fn member(namespace: Namespace, name: &str) -> Value {
    match namespace {
        Namespace::Math => math_member(name).unwrap_or(Value::Undefined),
    }
}

fn math_member(name: &str) -> Option<Value> {
    let f = |m| Some(Value::Native(Native::Math(m)));
    match name {
        "PI" => Some(Value::Number(PI)),
        "E" => Some(Value::Number(E)),
        "LN2" => Some(Value::Number(LN_2)),
        "LN10" => Some(Value::Number(LN_10)),
        "LOG2E" => Some(Value::Number(LOG2_E)),
        "LOG10E" => Some(Value::Number(LOG10_E)),
        "SQRT2" => Some(Value::Number(SQRT_2)),
        "SQRT1_2" => Some(Value::Number(SQRT_2 / 2.0)),
        "abs" => f(MathFn::Abs),
        "sqrt" => f(MathFn::Sqrt),
        "sin" => f(MathFn::Sin),
        "cos" => f(MathFn::Cos),
        "tan" => f(MathFn::Tan),
        "asin" => f(MathFn::Asin),
        "acos" => f(MathFn::Acos),
        "atan" => f(MathFn::Atan),
        "atan2" => f(MathFn::Atan2),
        "sin_deg" => f(MathFn::SinDeg),
        "cos_deg" => f(MathFn::CosDeg),
        "tan_deg" => f(MathFn::TanDeg),
        "asin_deg" => f(MathFn::AsinDeg),
        "acos_deg" => f(MathFn::AcosDeg),
        "atan_deg" => f(MathFn::AtanDeg),
        "floor" => f(MathFn::Floor),
        "ceil" => f(MathFn::Ceil),
        "round" => f(MathFn::Round),
        "min" => f(MathFn::Min),
        "max" => f(MathFn::Max),
        "pow" => f(MathFn::Pow),
        "exp" => f(MathFn::Exp),
        "log" => f(MathFn::Log),
        "random" => f(MathFn::Random),
        _ => None,
    }
}

/// Reads a numeric argument for an avatar primitive. Missing, undefined or
/// null arguments take `default` when there is one; anything else that is not a
/// number is a TypeError.
fn require_number(
    native: Native,
    args: &[Value],
    index: usize,
    default: Option<f64>,
) -> Result<f64, Error> {
    match (args.get(index), default) {
        (None | Some(Value::Undefined | Value::Null), Some(default)) => Ok(default),
        (Some(Value::Number(n)), _) if !n.is_nan() => Ok(*n),
        (arg, _) => Err(Error::type_error(&format!(
            "{}: argument {} must be a number, got {}",
            native.name(),
            index + 1,
            arg.cloned().unwrap_or(Value::Undefined)
        ))),
    }
}

fn number_arg(args: &[Value], index: usize) -> f64 {
    args.get(index).map_or(f64::NAN, Value::to_number)
}

pub fn call(
    native: Native,
    args: &[Value],
    host: &mut dyn Host,
    rng: &mut SeededRng,
) -> Result<Value, Error> {
    Ok(match native {
        Native::Api(primitive) => return call_primitive(native, primitive, args, host),
        Native::Math(f) => Value::Number(call_math(f, args, rng)),
        Native::IsNaN => Value::Bool(number_arg(args, 0).is_nan()),
        Native::IsFinite => Value::Bool(number_arg(args, 0).is_finite()),
        Native::ParseFloat => Value::Number(parse_float(&arg_string(args, 0))),
        Native::ParseInt => {
            let radix = args.get(1).map_or(0.0, Value::to_number);
            Value::Number(parse_int(&arg_string(args, 0), radix))
        }
    })
}

fn call_primitive(
    native: Native,
    primitive: Primitive,
    args: &[Value],
    host: &mut dyn Host,
) -> Result<Value, Error> {
    Ok(match primitive {
        Primitive::Log => {
            host.log(number_arg(args, 0));
            Value::Undefined
        }
        Primitive::Scan => {
            let degree = require_number(native, args, 0, None)?;
            let resolution = require_number(native, args, 1, Some(5.0))?;
            Value::Number(host.scan(degree, resolution))
        }
        Primitive::Cannon => {
            let degree = require_number(native, args, 0, None)?;
            let range = require_number(native, args, 1, None)?;
            Value::Bool(host.cannon(degree, range))
        }
        Primitive::Drive => {
            let degree = require_number(native, args, 0, None)?;
            let speed = require_number(native, args, 1, Some(50.0))?;
            host.drive(degree, speed);
            Value::Undefined
        }
        Primitive::Stop => {
            host.stop();
            Value::Undefined
        }
        Primitive::Damage => Value::Number(host.damage()),
        Primitive::Health => Value::Number(100.0 - host.damage()),
        Primitive::Speed => Value::Number(host.speed()),
        Primitive::LocX => Value::Number(host.loc_x()),
        Primitive::LocY => Value::Number(host.loc_y()),
    })
}

fn call_math(f: MathFn, args: &[Value], rng: &mut SeededRng) -> f64 {
    let x = number_arg(args, 0);
    match f {
        MathFn::Abs => x.abs(),
        MathFn::Sqrt => x.sqrt(),
        MathFn::Sin => x.sin(),
        MathFn::Cos => x.cos(),
        MathFn::Tan => x.tan(),
        MathFn::Asin => x.asin(),
        MathFn::Acos => x.acos(),
        MathFn::Atan => x.atan(),
        MathFn::Atan2 => x.atan2(number_arg(args, 1)),
        MathFn::SinDeg => x.to_radians().sin(),
        MathFn::CosDeg => x.to_radians().cos(),
        MathFn::TanDeg => x.to_radians().tan(),
        MathFn::AsinDeg => x.asin().to_degrees(),
        MathFn::AcosDeg => x.acos().to_degrees(),
        MathFn::AtanDeg => x.atan().to_degrees(),
        MathFn::Floor => x.floor(),
        MathFn::Ceil => x.ceil(),
        MathFn::Round => {
            // Halves round up, towards positive infinity.
            let r = x.round();
            if x - r == 0.5 {
                r + 1.0
            } else {
                r
            }
        }
        MathFn::Min => fold_numbers(args, f64::INFINITY, f64::min),
        MathFn::Max => fold_numbers(args, f64::NEG_INFINITY, f64::max),
        MathFn::Pow => x.powf(number_arg(args, 1)),
        MathFn::Exp => x.exp(),
        MathFn::Log => x.ln(),
        MathFn::Random => rng.gen::<f64>(),
    }
}

// f64::min ignores NaN, Math.min does not.
fn fold_numbers(args: &[Value], init: f64, f: fn(f64, f64) -> f64) -> f64 {
    let mut acc = init;
    for arg in args {
        let n = arg.to_number();
        if n.is_nan() {
            return f64::NAN;
        }
        acc = f(acc, n);
    }
    acc
}

fn arg_string(args: &[Value], index: usize) -> String {
    match args.get(index) {
        Some(Value::Number(n)) => format_number(*n),
        Some(v) => v.to_string(),
        None => "undefined".to_string(),
    }
}

fn parse_float(s: &str) -> f64 {
    let s = s.trim_start();
    let mut end = 0;
    let mut best = f64::NAN;
    let chars: Vec<char> = s.chars().collect();
    // Longest prefix that still parses as a decimal literal.
    while end < chars.len() {
        end += 1;
        let prefix: String = chars[..end].iter().collect();
        let parsed = match prefix.as_str() {
            "Infinity" | "+Infinity" => f64::INFINITY,
            "-Infinity" => f64::NEG_INFINITY,
            p if p.ends_with(['e', 'E', '+', '-', '.']) => continue,
            _ => string_to_number(&prefix),
        };
        if !parsed.is_nan() {
            best = parsed;
        } else if !prefix.starts_with(['I', '+', '-']) {
            break;
        }
    }
    best
}

fn parse_int(s: &str, radix: f64) -> f64 {
    let mut s = s.trim_start();
    let mut sign = 1.0;
    if let Some(rest) = s.strip_prefix('-') {
        sign = -1.0;
        s = rest;
    } else if let Some(rest) = s.strip_prefix('+') {
        s = rest;
    }
    let mut radix = if radix.is_finite() { radix.trunc() as u32 } else { 0 };
    if radix == 0 || radix == 16 {
        if let Some(rest) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            s = rest;
            radix = 16;
        }
    }
    if radix == 0 {
        radix = 10;
    }
    if !(2..=36).contains(&radix) {
        return f64::NAN;
    }
    let mut result: Option<f64> = None;
    for c in s.chars() {
        match c.to_digit(radix) {
            Some(d) => result = Some(result.unwrap_or(0.0) * radix as f64 + d as f64),
            None => break,
        }
    }
    result.map_or(f64::NAN, |n| sign * n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::new_rng;

    struct NullHost;

    impl Host for NullHost {
        fn log(&mut self, _value: f64) {}
        fn scan(&mut self, degree: f64, resolution: f64) -> f64 {
            degree + resolution
        }
        fn cannon(&mut self, _degree: f64, _range: f64) -> bool {
            true
        }
        fn drive(&mut self, _degree: f64, _speed: f64) {}
        fn stop(&mut self) {}
        fn damage(&self) -> f64 {
            30.0
        }
        fn speed(&self) -> f64 {
            0.0
        }
        fn loc_x(&self) -> f64 {
            0.0
        }
        fn loc_y(&self) -> f64 {
            0.0
        }
    }

    fn call_api(primitive: Primitive, args: &[Value]) -> Result<Value, Error> {
        call(
            Native::Api(primitive),
            args,
            &mut NullHost,
            &mut new_rng(0),
        )
    }

    #[test]
    fn test_primitive_defaults() {
        let v = call_api(Primitive::Scan, &[Value::Number(10.0)]).unwrap();
        assert!(v.strict_eq(&Value::Number(15.0)));
        let v = call_api(Primitive::Health, &[]).unwrap();
        assert!(v.strict_eq(&Value::Number(70.0)));
    }

    #[test]
    fn test_null_takes_default() {
        let v = call_api(Primitive::Scan, &[Value::Number(0.0), Value::Null]).unwrap();
        assert!(v.strict_eq(&Value::Number(5.0)));
        assert!(call_api(Primitive::Drive, &[Value::Number(90.0), Value::Null]).is_ok());
        assert!(call_api(Primitive::Scan, &[Value::Null]).is_err());
        assert!(call_api(Primitive::Cannon, &[Value::Number(0.0), Value::Null]).is_err());
    }

    #[test]
    fn test_primitive_type_errors() {
        assert!(call_api(Primitive::Scan, &[]).is_err());
        assert!(call_api(Primitive::Scan, &[Value::Number(f64::NAN)]).is_err());
        assert!(call_api(Primitive::Cannon, &[Value::Number(0.0)]).is_err());
        assert!(call_api(Primitive::Drive, &[Value::from("north")]).is_err());
        assert!(call_api(Primitive::Stop, &[Value::from("ignored")]).is_ok());
    }

    #[test]
    fn test_math() {
        let mut rng = new_rng(1);
        let args = [Value::Number(90.0)];
        assert!((call_math(MathFn::SinDeg, &args, &mut rng) - 1.0).abs() < 1e-12);
        let round = |x: f64| call_math(MathFn::Round, &[Value::Number(x)], &mut new_rng(1));
        assert_eq!(round(-2.5), -2.0);
        assert_eq!(round(2.5), 3.0);
        assert_eq!(round(0.49999999999999994), 0.0);
        assert_eq!(round(-0.6), -1.0);
        assert_eq!(round(4503599627370495.0), 4503599627370495.0);
        assert!(round(f64::NAN).is_nan());
        assert_eq!(
            call_math(MathFn::Min, &[Value::Number(3.0), Value::Number(-1.0)], &mut rng),
            -1.0
        );
        assert!(call_math(MathFn::Max, &[Value::Number(3.0), Value::Undefined], &mut rng).is_nan());
        assert_eq!(call_math(MathFn::Max, &[], &mut rng), f64::NEG_INFINITY);
        let r = call_math(MathFn::Random, &[], &mut rng);
        assert!((0.0..1.0).contains(&r));
    }

    #[test]
    fn test_parse() {
        assert_eq!(parse_float("  3.5px"), 3.5);
        assert_eq!(parse_float("-1e2"), -100.0);
        assert_eq!(parse_float("Infinity"), f64::INFINITY);
        assert!(parse_float("abc").is_nan());
        assert_eq!(parse_int("42.9", 0.0), 42.0);
        assert_eq!(parse_int("-0x1f", 0.0), -31.0);
        assert_eq!(parse_int("101", 2.0), 5.0);
        assert!(parse_int("z", 10.0).is_nan());
    }
}
