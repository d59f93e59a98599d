//! # Dynamic Values and Scan Targets
//!
//! This module defines the two halves of the column-map contract: [`Value`],
//! an owned dynamic value a model hands to the engine for binding into a
//! statement, and [`ScanTarget`], a write-target the engine can decode a
//! result column into. Both sides are restricted to the types the sqlx `Any`
//! driver can transport; uuid and timestamp values travel as strings, with
//! an explicit cast on the PostgreSQL placeholder.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{
    Arguments, Row,
    any::{AnyArguments, AnyRow},
};
use uuid::Uuid;

use crate::database::Drivers;

/// An owned dynamic value for one column of one statement.
///
/// Constructed at the call site through the `From` impls below, so a column
/// map reads as `("name", item.name.clone().into())`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i32),
    BigInt(i64),
    Double(f64),
    Text(String),
    Uuid(Uuid),
    DateTime(DateTime<Utc>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Explicit cast appended to a PostgreSQL placeholder for values that
    /// travel as strings under the `Any` driver.
    pub(crate) fn placeholder_cast(&self, driver: Drivers) -> &'static str {
        if driver != Drivers::Postgres {
            return "";
        }
        match self {
            Value::Uuid(_) => "::UUID",
            Value::DateTime(_) => "::TIMESTAMPTZ",
            _ => "",
        }
    }

    /// Binds this value as the next positional argument.
    pub(crate) fn bind(&self, driver: Drivers, args: &mut AnyArguments<'_>) {
        match self {
            Value::Null => {
                let _ = args.add(Option::<String>::None);
            }
            Value::Bool(v) => {
                let _ = args.add(*v);
            }
            Value::Int(v) => {
                let _ = args.add(*v);
            }
            Value::BigInt(v) => {
                let _ = args.add(*v);
            }
            Value::Double(v) => {
                let _ = args.add(*v);
            }
            Value::Text(v) => {
                let _ = args.add(v.clone());
            }
            Value::Uuid(v) => {
                let _ = args.add(v.hyphenated().to_string());
            }
            Value::DateTime(v) => {
                let _ = args.add(format_datetime(v, driver));
            }
        }
    }
}

macro_rules! impl_value_from {
    ($($t:ty => $variant:ident),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_value_from!(
    bool => Bool,
    i32 => Int,
    i64 => BigInt,
    f64 => Double,
    String => Text,
    Uuid => Uuid,
    DateTime<Utc> => DateTime
);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

/// Column name to value, the write side of the column-map contract.
pub type ValueMap = HashMap<&'static str, Value>;

/// Map entries ordered by column name, for reproducible statements.
pub(crate) fn sorted_entries(map: ValueMap) -> Vec<(&'static str, Value)> {
    let mut entries: Vec<_> = map.into_iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
}

/// A location the engine can decode one result column into.
pub trait ScanTarget {
    fn scan_from(&mut self, row: &AnyRow, idx: usize) -> Result<(), sqlx::Error>;
}

/// Column name to write-target, the read side of the column-map contract.
/// Produced fresh by a model on every call.
pub type TargetMap<'a> = HashMap<&'static str, &'a mut dyn ScanTarget>;

macro_rules! impl_scan_primitive {
    ($($t:ty),*) => {
        $(
            impl ScanTarget for $t {
                fn scan_from(&mut self, row: &AnyRow, idx: usize) -> Result<(), sqlx::Error> {
                    *self = row.try_get::<$t, _>(idx)?;
                    Ok(())
                }
            }

            impl ScanTarget for Option<$t> {
                fn scan_from(&mut self, row: &AnyRow, idx: usize) -> Result<(), sqlx::Error> {
                    *self = row.try_get::<Option<$t>, _>(idx)?;
                    Ok(())
                }
            }
        )*
    };
}

impl_scan_primitive!(bool, i16, i32, i64, f32, f64, String);

impl ScanTarget for Uuid {
    fn scan_from(&mut self, row: &AnyRow, idx: usize) -> Result<(), sqlx::Error> {
        let raw: String = row.try_get(idx)?;
        *self = raw.parse().map_err(|e: uuid::Error| sqlx::Error::Decode(e.into()))?;
        Ok(())
    }
}

impl ScanTarget for Option<Uuid> {
    fn scan_from(&mut self, row: &AnyRow, idx: usize) -> Result<(), sqlx::Error> {
        let raw: Option<String> = row.try_get(idx)?;
        *self = match raw {
            Some(raw) => Some(raw.parse().map_err(|e: uuid::Error| sqlx::Error::Decode(e.into()))?),
            None => None,
        };
        Ok(())
    }
}

impl ScanTarget for DateTime<Utc> {
    fn scan_from(&mut self, row: &AnyRow, idx: usize) -> Result<(), sqlx::Error> {
        let raw: String = row.try_get(idx)?;
        *self = parse_datetime(&raw).map_err(|e| sqlx::Error::Decode(e.into()))?;
        Ok(())
    }
}

impl ScanTarget for Option<DateTime<Utc>> {
    fn scan_from(&mut self, row: &AnyRow, idx: usize) -> Result<(), sqlx::Error> {
        let raw: Option<String> = row.try_get(idx)?;
        *self = match raw {
            Some(raw) => Some(parse_datetime(&raw).map_err(|e| sqlx::Error::Decode(e.into()))?),
            None => None,
        };
        Ok(())
    }
}

fn format_datetime(v: &DateTime<Utc>, driver: Drivers) -> String {
    match driver {
        Drivers::Postgres => v.to_rfc3339_opts(SecondsFormat::Micros, true),
        _ => v.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
    }
}

fn parse_datetime(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|v| v.with_timezone(&Utc))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f").map(|v| v.and_utc()))
}
