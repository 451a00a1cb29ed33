// src/engine/virtuals.rs
//
// Derived coordinate fields: dotted names like `time.month` resolved
// against a datetime-like coordinate on demand. Pure functions over the
// coordinate's cells, keyed by a fixed registry of component names.

use crate::core::value::Value;
use crate::core::variable::Variable;
use crate::engine::error::{Error, Result};
use chrono::{Datelike, NaiveDateTime, Timelike};

pub const COMPONENTS: &[&str] = &[
    "year",
    "month",
    "day",
    "hour",
    "minute",
    "second",
    "dayofyear",
    "dayofweek",
    "season",
];

/// Split a dotted virtual-field key into (coordinate, component), if the
/// component is recognized.
pub fn split_key(name: &str) -> Option<(&str, &str)> {
    let (base, component) = name.rsplit_once('.')?;
    COMPONENTS.contains(&component).then_some((base, component))
}

fn component_of(t: NaiveDateTime, component: &str) -> Value {
    match component {
        "year" => Value::Int(t.year() as i64),
        "month" => Value::Int(t.month() as i64),
        "day" => Value::Int(t.day() as i64),
        "hour" => Value::Int(t.hour() as i64),
        "minute" => Value::Int(t.minute() as i64),
        "second" => Value::Int(t.second() as i64),
        "dayofyear" => Value::Int(t.ordinal() as i64),
        "dayofweek" => Value::Int(t.weekday().num_days_from_monday() as i64),
        "season" => Value::Str(
            match t.month() {
                12 | 1 | 2 => "DJF",
                3 | 4 | 5 => "MAM",
                6 | 7 | 8 => "JJA",
                _ => "SON",
            }
            .to_string(),
        ),
        _ => Value::Null,
    }
}

/// Derive a read-only component variable from a datetime-like variable.
pub fn derive_variable(base: &Variable, component: &str) -> Result<Variable> {
    let values = base.values()?;
    let derived = values
        .iter()
        .map(|v| match v {
            Value::DateTime(t) => Ok(component_of(*t, component)),
            Value::Null => Ok(Value::Null),
            other => Err(Error::type_err(format!(
                "cannot derive '{}' from non-datetime cell {}",
                component, other
            ))),
        })
        .collect::<Result<Vec<_>>>()?;
    Variable::new(base.dims().to_vec(), base.shape().to_vec(), derived)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn t(y: i32, m: u32, d: u32) -> Value {
        Value::DateTime(NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(0, 0, 0).unwrap())
    }

    #[test]
    fn test_split_key_recognizes_components() {
        assert_eq!(split_key("time.month"), Some(("time", "month")));
        assert_eq!(split_key("time.bogus"), None);
        assert_eq!(split_key("plain"), None);
    }

    #[test]
    fn test_derive_components() {
        let base = Variable::new_1d("time", vec![t(2000, 1, 15), t(2000, 7, 1)]);
        let months = derive_variable(&base, "month").unwrap();
        assert_eq!(
            months.values().unwrap().as_ref(),
            &[Value::Int(1), Value::Int(7)]
        );
        let seasons = derive_variable(&base, "season").unwrap();
        assert_eq!(
            seasons.values().unwrap().as_ref(),
            &[Value::from("DJF"), Value::from("JJA")]
        );
        let doy = derive_variable(&base, "dayofyear").unwrap();
        assert_eq!(
            doy.values().unwrap().as_ref(),
            &[Value::Int(15), Value::Int(183)]
        );
    }

    #[test]
    fn test_derive_from_non_datetime_fails() {
        let base = Variable::new_1d("x", vec![Value::Int(1)]);
        assert!(derive_variable(&base, "month").is_err());
    }
}
