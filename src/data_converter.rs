//! Value conversion between storage and domain representations
//!
//! Column values do not always round-trip cleanly through MySQL: tinyint
//! flags come back as integers, DECIMAL comes back as text, UUIDs live in
//! char columns. The schema resolver pairs each column with a conversion
//! code of the form `D<column family>-><domain tag>` (export) or
//! `<domain tag>->D<column family>` (import) and asks the converter
//! whether a routine is registered for it. Unregistered codes mean the
//! value passes through untouched.

use crate::entity_catalog::PropertyInformation;
use crate::value::SqlValue;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use lazy_static::lazy_static;
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised while converting values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConvertError {
    #[error("No conversion routine registered under '{0}'")]
    UnknownConversion(String),

    #[error("Cannot convert value for property '{property}': {message}")]
    InvalidValue { property: String, message: String },
}

impl ConvertError {
    pub fn invalid_value(property: impl Into<String>, message: impl Into<String>) -> Self {
        ConvertError::InvalidValue {
            property: property.into(),
            message: message.into(),
        }
    }
}

/// Converts values crossing the storage boundary.
///
/// `export` runs on values read from result rows, `import` on domain
/// values about to be bound as statement parameters.
pub trait DataConverter: Send + Sync {
    /// Returns the conversion routine registered for a code, if any.
    fn conversion_for(&self, code: &str) -> Option<String>;

    /// Applies a named conversion to a value read from storage.
    fn export(
        &self,
        conversion: &str,
        value: &Value,
        property: &PropertyInformation,
    ) -> Result<Value, ConvertError>;

    /// Applies a named conversion to a domain value bound for storage.
    fn import(
        &self,
        conversion: &str,
        value: &Value,
        property: &PropertyInformation,
    ) -> Result<SqlValue, ConvertError>;
}

/// Converts a JSON scalar into a bind value without any registered
/// conversion. Arrays and objects are rejected.
pub fn scalar_bind_value(property: &str, value: &Value) -> Result<SqlValue, ConvertError> {
    SqlValue::from_json(value)
        .ok_or_else(|| ConvertError::invalid_value(property, "value is not a SQL scalar"))
}

type ExportFn = fn(&Value, &PropertyInformation) -> Result<Value, ConvertError>;
type ImportFn = fn(&Value, &PropertyInformation) -> Result<SqlValue, ConvertError>;

lazy_static! {
    static ref EXPORT_CONVERSIONS: HashMap<&'static str, ExportFn> = {
        let mut m: HashMap<&'static str, ExportFn> = HashMap::new();
        m.insert("Dtinyint->Oboolean", export_boolean);
        m.insert("Dint->Oboolean", export_boolean);
        m.insert("Ddatetime->Odatetime", export_datetime);
        m.insert("Dtimestamp->Odatetime", export_datetime);
        m.insert("Ddate->Odate", export_date);
        m.insert("Dtime->Otime", export_time);
        m.insert("Dchar->Ouuid", export_uuid);
        m.insert("Dvarchar->Ouuid", export_uuid);
        m.insert("Ddecimal->Ofloat", export_float);
        m.insert("Dint->Ofloat", export_float);
        m.insert("Dtext->Ojson", export_json);
        m.insert("Dvarchar->Ojson", export_json);
        m
    };
    static ref IMPORT_CONVERSIONS: HashMap<&'static str, ImportFn> = {
        let mut m: HashMap<&'static str, ImportFn> = HashMap::new();
        m.insert("Oboolean->Dtinyint", import_boolean);
        m.insert("Oboolean->Dint", import_boolean);
        m.insert("Odatetime->Ddatetime", import_datetime);
        m.insert("Odatetime->Dtimestamp", import_datetime);
        m.insert("Odate->Ddate", import_date);
        m.insert("Otime->Dtime", import_time);
        m.insert("Ouuid->Dchar", import_uuid);
        m.insert("Ouuid->Dvarchar", import_uuid);
        m.insert("Ojson->Dtext", import_json);
        m.insert("Ojson->Dvarchar", import_json);
        m
    };
}

/// Converter backed by the built-in conversion table.
#[derive(Debug, Default, Clone)]
pub struct DefaultDataConverter;

impl DataConverter for DefaultDataConverter {
    fn conversion_for(&self, code: &str) -> Option<String> {
        EXPORT_CONVERSIONS
            .contains_key(code)
            .then(|| code.to_string())
            .or_else(|| IMPORT_CONVERSIONS.contains_key(code).then(|| code.to_string()))
    }

    fn export(
        &self,
        conversion: &str,
        value: &Value,
        property: &PropertyInformation,
    ) -> Result<Value, ConvertError> {
        let run = EXPORT_CONVERSIONS
            .get(conversion)
            .ok_or_else(|| ConvertError::UnknownConversion(conversion.to_string()))?;
        run(value, property)
    }

    fn import(
        &self,
        conversion: &str,
        value: &Value,
        property: &PropertyInformation,
    ) -> Result<SqlValue, ConvertError> {
        let run = IMPORT_CONVERSIONS
            .get(conversion)
            .ok_or_else(|| ConvertError::UnknownConversion(conversion.to_string()))?;
        run(value, property)
    }
}

fn export_boolean(value: &Value, property: &PropertyInformation) -> Result<Value, ConvertError> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Bool(b) => Ok(Value::Bool(*b)),
        Value::Number(n) => Ok(Value::Bool(n.as_i64().unwrap_or(0) != 0)),
        Value::String(s) => Ok(Value::Bool(s != "0" && !s.is_empty())),
        _ => Err(ConvertError::invalid_value(
            &property.name,
            "expected a boolean flag",
        )),
    }
}

fn export_datetime(value: &Value, property: &PropertyInformation) -> Result<Value, ConvertError> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::String(s) => {
            let parsed = parse_datetime(s)
                .ok_or_else(|| ConvertError::invalid_value(&property.name, format!("'{s}' is not a datetime")))?;
            Ok(Value::String(parsed.format("%Y-%m-%dT%H:%M:%S").to_string()))
        }
        _ => Err(ConvertError::invalid_value(
            &property.name,
            "expected a datetime string",
        )),
    }
}

fn export_date(value: &Value, property: &PropertyInformation) -> Result<Value, ConvertError> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::String(s) => {
            let parsed = NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map_err(|_| ConvertError::invalid_value(&property.name, format!("'{s}' is not a date")))?;
            Ok(Value::String(parsed.format("%Y-%m-%d").to_string()))
        }
        _ => Err(ConvertError::invalid_value(
            &property.name,
            "expected a date string",
        )),
    }
}

fn export_time(value: &Value, property: &PropertyInformation) -> Result<Value, ConvertError> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::String(s) => {
            let parsed = NaiveTime::parse_from_str(s, "%H:%M:%S")
                .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
                .map_err(|_| ConvertError::invalid_value(&property.name, format!("'{s}' is not a time")))?;
            Ok(Value::String(parsed.format("%H:%M:%S").to_string()))
        }
        _ => Err(ConvertError::invalid_value(
            &property.name,
            "expected a time string",
        )),
    }
}

fn export_uuid(value: &Value, property: &PropertyInformation) -> Result<Value, ConvertError> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::String(s) => {
            let parsed = Uuid::parse_str(s)
                .map_err(|_| ConvertError::invalid_value(&property.name, format!("'{s}' is not a UUID")))?;
            Ok(Value::String(parsed.to_string()))
        }
        _ => Err(ConvertError::invalid_value(
            &property.name,
            "expected a UUID string",
        )),
    }
}

fn export_float(value: &Value, property: &PropertyInformation) -> Result<Value, ConvertError> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Number(n) => {
            let f = n
                .as_f64()
                .ok_or_else(|| ConvertError::invalid_value(&property.name, "number is not a float"))?;
            Ok(serde_json::Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or(Value::Null))
        }
        Value::String(s) => {
            let f: f64 = s
                .parse()
                .map_err(|_| ConvertError::invalid_value(&property.name, format!("'{s}' is not a number")))?;
            Ok(serde_json::Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or(Value::Null))
        }
        _ => Err(ConvertError::invalid_value(
            &property.name,
            "expected a numeric value",
        )),
    }
}

fn export_json(value: &Value, property: &PropertyInformation) -> Result<Value, ConvertError> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::String(s) => serde_json::from_str(s)
            .map_err(|e| ConvertError::invalid_value(&property.name, format!("invalid JSON: {e}"))),
        _ => Err(ConvertError::invalid_value(
            &property.name,
            "expected a JSON string",
        )),
    }
}

fn import_boolean(value: &Value, property: &PropertyInformation) -> Result<SqlValue, ConvertError> {
    match value {
        Value::Null => Ok(SqlValue::Null),
        Value::Bool(b) => Ok(SqlValue::Int(i64::from(*b))),
        Value::Number(n) => Ok(SqlValue::Int(i64::from(n.as_i64().unwrap_or(0) != 0))),
        _ => Err(ConvertError::invalid_value(
            &property.name,
            "expected a boolean",
        )),
    }
}

fn import_datetime(value: &Value, property: &PropertyInformation) -> Result<SqlValue, ConvertError> {
    match value {
        Value::Null => Ok(SqlValue::Null),
        Value::String(s) => parse_datetime(s)
            .map(SqlValue::DateTime)
            .ok_or_else(|| ConvertError::invalid_value(&property.name, format!("'{s}' is not a datetime"))),
        _ => Err(ConvertError::invalid_value(
            &property.name,
            "expected a datetime string",
        )),
    }
}

fn import_date(value: &Value, property: &PropertyInformation) -> Result<SqlValue, ConvertError> {
    match value {
        Value::Null => Ok(SqlValue::Null),
        Value::String(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(SqlValue::Date)
            .map_err(|_| ConvertError::invalid_value(&property.name, format!("'{s}' is not a date"))),
        _ => Err(ConvertError::invalid_value(
            &property.name,
            "expected a date string",
        )),
    }
}

fn import_time(value: &Value, property: &PropertyInformation) -> Result<SqlValue, ConvertError> {
    match value {
        Value::Null => Ok(SqlValue::Null),
        Value::String(s) => NaiveTime::parse_from_str(s, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
            .map(SqlValue::Time)
            .map_err(|_| ConvertError::invalid_value(&property.name, format!("'{s}' is not a time"))),
        _ => Err(ConvertError::invalid_value(
            &property.name,
            "expected a time string",
        )),
    }
}

fn import_uuid(value: &Value, property: &PropertyInformation) -> Result<SqlValue, ConvertError> {
    match value {
        Value::Null => Ok(SqlValue::Null),
        Value::String(s) => Uuid::parse_str(s)
            .map(|u| SqlValue::Text(u.to_string()))
            .map_err(|_| ConvertError::invalid_value(&property.name, format!("'{s}' is not a UUID"))),
        _ => Err(ConvertError::invalid_value(
            &property.name,
            "expected a UUID string",
        )),
    }
}

fn import_json(value: &Value, property: &PropertyInformation) -> Result<SqlValue, ConvertError> {
    match value {
        Value::Null => Ok(SqlValue::Null),
        other => serde_json::to_string(other)
            .map(SqlValue::Text)
            .map_err(|e| ConvertError::invalid_value(&property.name, e.to_string())),
    }
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .ok()
}
