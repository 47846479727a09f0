//! Value-producing runtime types used by the standard functions of the prelude
//! (`Format`, `Replace`, `Substr`, `Chr`, `Floor`, `Length`, `Print`).

use crate::config::{ConfigRecord, Value};
use crate::error::{Error, Result};
use crate::runtime::{BoxedValue, BuildContext, Constructor, Object, ObjectRef, RuntimeTypeRegistry};
use regex::{Captures, Regex};
use std::any::Any;
use std::rc::Rc;
use std::sync::OnceLock;

pub fn register(registry: &mut RuntimeTypeRegistry) {
    registry.register("StringFunction", Constructor::Single(string_function));
    registry.register("NumericFunction", Constructor::Single(numeric_function));
    registry.register("PrintAction", Constructor::Single(print_action));
}

fn string_function(record: &ConfigRecord, _ctx: &BuildContext) -> Result<ObjectRef> {
    let what = record.string("what")?;
    let result = match what.as_str() {
        "Format" => {
            let arg = record.get("arg")?;
            let how = record.string_or("how", "")?;
            format_value(&arg, &how)?
        }
        "Replace" => {
            let s = record.string("arg")?;
            let from = record.string("replacewhat")?;
            let to = record.string("withwhat")?;
            if from.is_empty() {
                s
            } else {
                s.replace(&from, &to)
            }
        }
        "Substr" => {
            let s = record.string("arg")?;
            substr(&s, record.integer("pos")?, record.integer("chars")?)
        }
        "Chr" => {
            let code = record.integer("arg")?;
            u32::try_from(code)
                .ok()
                .and_then(char::from_u32)
                .map(String::from)
                .ok_or_else(|| Error::field("arg", format!("{} is not a valid character code", code)))?
        }
        other => {
            return Err(Error::construction(format!(
                "unknown string function '{}'",
                other
            )));
        }
    };
    Ok(Rc::new(BoxedValue::new("StringFunction", Value::String(result))))
}

fn numeric_function(record: &ConfigRecord, _ctx: &BuildContext) -> Result<ObjectRef> {
    let what = record.string("what")?;
    let result = match what.as_str() {
        "Floor" => record.number("arg")?.floor(),
        "Length" => match record.get("arg")? {
            Value::String(s) => s.chars().count() as f64,
            Value::Array(items) => items.len() as f64,
            other => {
                return Err(Error::field(
                    "arg",
                    format!("Length expects a string or an array, found {}", other.kind()),
                ));
            }
        },
        other => {
            return Err(Error::construction(format!(
                "unknown numeric function '{}'",
                other
            )));
        }
    };
    Ok(Rc::new(BoxedValue::new("NumericFunction", Value::Number(result))))
}

/// Result of `Print(...)`: the text has already been written when this exists.
#[derive(Debug)]
pub struct PrintAction {
    pub text: String,
}

impl Object for PrintAction {
    fn type_name(&self) -> &'static str {
        "PrintAction"
    }

    fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

fn print_action(record: &ConfigRecord, _ctx: &BuildContext) -> Result<ObjectRef> {
    let text = display_value(&record.get("what")?)?;
    println!("{}", text);
    Ok(Rc::new(PrintAction { text }))
}

/// Plain-text rendering of a value, as used by `Print` and `Format`.
pub fn display_value(value: &Value) -> Result<String> {
    Ok(match value {
        Value::Number(n) => format_number(*n),
        Value::Bool(b) => b.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) => {
            let parts = items
                .iter()
                .map(|item| display_value(&item.resolve()?))
                .collect::<Result<Vec<_>>>()?;
            format!("({})", parts.join(":"))
        }
        Value::Record(r) => format!("{:?}", r),
        Value::Function(_) | Value::Object(_) => format!("{:?}", value),
    })
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// printf-style formatting of a single argument.
fn format_value(arg: &Value, how: &str) -> Result<String> {
    if how.is_empty() {
        return display_value(arg);
    }

    static DIRECTIVE: OnceLock<Regex> = OnceLock::new();
    let re = DIRECTIVE.get_or_init(|| {
        Regex::new(r"%(?P<flags>[-+ 0]*)(?P<width>\d+)?(?:\.(?P<prec>\d+))?(?P<conv>[dieEfgsx%])")
            .expect("format directive regex is valid")
    });

    let text = display_value(arg)?;
    let number = match arg {
        Value::Number(n) => Some(*n),
        _ => None,
    };

    let mut failure = None;
    let out = re.replace_all(how, |caps: &Captures| {
        let conv = &caps["conv"];
        if conv == "%" {
            return "%".to_string();
        }
        let flags = caps.name("flags").map_or("", |m| m.as_str());
        let width: usize = caps.name("width").map_or(0, |m| m.as_str().parse().unwrap_or(0));
        let prec: Option<usize> = caps.name("prec").and_then(|m| m.as_str().parse().ok());

        let body = match (conv, number) {
            ("d" | "i", Some(n)) => with_sign(flags, n, format!("{}", n.trunc().abs() as i64)),
            ("x", Some(n)) => format!("{:x}", n.trunc() as i64),
            ("f", Some(n)) => with_sign(flags, n, format!("{:.*}", prec.unwrap_or(6), n.abs())),
            ("e" | "E", Some(n)) => {
                let s = with_sign(flags, n, format!("{:.*e}", prec.unwrap_or(6), n.abs()));
                if conv == "E" { s.to_uppercase() } else { s }
            }
            ("g", Some(n)) => with_sign(flags, n, format_number(n.abs())),
            ("s", _) => match prec {
                Some(p) => text.chars().take(p).collect(),
                None => text.clone(),
            },
            (_, None) => {
                failure.get_or_insert_with(|| {
                    Error::field("how", format!("'%{}' needs a numeric argument", conv))
                });
                String::new()
            }
            _ => String::new(),
        };
        pad(flags, width, body)
    });

    match failure {
        Some(err) => Err(err),
        None => Ok(out.into_owned()),
    }
}

fn with_sign(flags: &str, n: f64, digits: String) -> String {
    if n < 0.0 {
        format!("-{}", digits)
    } else if flags.contains('+') {
        format!("+{}", digits)
    } else if flags.contains(' ') {
        format!(" {}", digits)
    } else {
        digits
    }
}

fn pad(flags: &str, width: usize, body: String) -> String {
    let len = body.chars().count();
    if len >= width {
        return body;
    }
    let fill = width - len;
    if flags.contains('-') {
        format!("{}{}", body, " ".repeat(fill))
    } else if flags.contains('0') {
        match body.strip_prefix(['-', '+']) {
            Some(digits) => format!("{}{}{}", &body[..1], "0".repeat(fill), digits),
            None => format!("{}{}", "0".repeat(fill), body),
        }
    } else {
        format!("{}{}", " ".repeat(fill), body)
    }
}

/// Character-based substring; a negative start counts from the end.
fn substr(s: &str, pos: i64, chars: i64) -> String {
    let len = s.chars().count() as i64;
    let start = if pos < 0 { (len + pos).max(0) } else { pos.min(len) };
    let take = chars.max(0) as usize;
    s.chars().skip(start as usize).take(take).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn printf_style_format() {
        let n = Value::Number(3.14159);
        assert_eq!(format_value(&n, "%.2f").unwrap(), "3.14");
        assert_eq!(format_value(&Value::Number(7.0), "[%03d]").unwrap(), "[007]");
        assert_eq!(format_value(&Value::Number(-7.0), "%5d").unwrap(), "   -7");
        assert_eq!(format_value(&Value::String("ab".into()), "<%-4s>").unwrap(), "<ab  >");
        assert_eq!(format_value(&Value::Number(42.0), "").unwrap(), "42");
        assert_eq!(format_value(&Value::Number(1.0), "100%%").unwrap(), "100%");
        assert!(format_value(&Value::String("x".into()), "%d").is_err());
    }

    #[test]
    fn substrings() {
        assert_eq!(substr("network", 0, 3), "net");
        assert_eq!(substr("network", -4, 4), "work");
        assert_eq!(substr("net", 10, 2), "");
    }
}
