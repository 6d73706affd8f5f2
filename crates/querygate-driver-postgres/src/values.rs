//! Decoding PostgreSQL result columns into [`Value`]

use postgres_types::{FromSql, Kind, Type};
use querygate_core::Value;
use tokio_postgres::Row as PgRow;

type DecodeError = Box<dyn std::error::Error + Sync + Send>;

/// NUMERIC decoded to its exact decimal text
#[derive(Debug)]
struct NumericText(String);

impl<'a> FromSql<'a> for NumericText {
    fn from_sql(_: &Type, raw: &'a [u8]) -> Result<Self, DecodeError> {
        decode_numeric(raw).map(Self)
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }
}

/// Catch-all for types without a dedicated decoder.
///
/// Only types whose binary payload is their text form are kept as strings.
/// Anything else (interval, inet, ranges, unlisted arrays) becomes NULL.
#[derive(Debug)]
struct Fallback(Value);

impl<'a> FromSql<'a> for Fallback {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, DecodeError> {
        if !is_text_payload(ty) {
            tracing::debug!(pg_type = ty.name(), "no decoder for column type, using NULL");
            return Ok(Self(Value::Null));
        }
        Ok(Self(Value::String(std::str::from_utf8(raw)?.to_string())))
    }

    fn accepts(_: &Type) -> bool {
        true
    }
}

fn is_text_payload(ty: &Type) -> bool {
    match ty.kind() {
        Kind::Enum(_) => true,
        Kind::Domain(inner) => <String as FromSql>::accepts(inner) || is_text_payload(inner),
        _ => matches!(ty.name(), "citext" | "xml"),
    }
}

/// Decodes the binary NUMERIC wire format: a header of digit count, weight,
/// sign and display scale followed by base-10000 digit groups.
fn decode_numeric(raw: &[u8]) -> Result<String, DecodeError> {
    let word = |offset: usize| -> Result<u16, DecodeError> {
        raw.get(offset..offset + 2)
            .map(|b| u16::from_be_bytes([b[0], b[1]]))
            .ok_or_else(|| "truncated NUMERIC payload".into())
    };

    let ndigits = word(0)? as usize;
    let weight = word(2)? as i16 as i32;
    let sign = word(4)?;
    let dscale = word(6)? as usize;

    match sign {
        0x0000 | 0x4000 => {}
        0xC000 => return Ok("NaN".to_string()),
        0xD000 => return Ok("Infinity".to_string()),
        0xF000 => return Ok("-Infinity".to_string()),
        other => return Err(format!("invalid NUMERIC sign: {:#06x}", other).into()),
    }

    let groups = (0..ndigits)
        .map(|i| word(8 + i * 2))
        .collect::<Result<Vec<u16>, _>>()?;
    if groups.iter().any(|g| *g > 9999) {
        return Err("NUMERIC digit group out of range".into());
    }

    // Group i is worth 10000^(weight - i)
    let group_at = |position: i32| -> u16 {
        usize::try_from(weight - position)
            .ok()
            .and_then(|i| groups.get(i).copied())
            .unwrap_or(0)
    };

    let mut integer = String::new();
    for exponent in (0..=weight).rev() {
        let group = group_at(exponent);
        if integer.is_empty() {
            if group != 0 {
                integer.push_str(&group.to_string());
            }
        } else {
            integer.push_str(&format!("{:04}", group));
        }
    }
    if integer.is_empty() {
        integer.push('0');
    }

    let mut fraction = String::new();
    let mut exponent = -1;
    while fraction.len() < dscale {
        fraction.push_str(&format!("{:04}", group_at(exponent)));
        exponent -= 1;
    }
    fraction.truncate(dscale);

    let is_zero = groups.iter().all(|g| *g == 0);
    let mut text = String::new();
    if sign == 0x4000 && !is_zero {
        text.push('-');
    }
    text.push_str(&integer);
    if !fraction.is_empty() {
        text.push('.');
        text.push_str(&fraction);
    }
    Ok(text)
}

fn get<'a, T: FromSql<'a>>(row: &'a PgRow, idx: usize, wrap: impl FnOnce(T) -> Value) -> Value {
    match row.try_get::<_, Option<T>>(idx) {
        Ok(Some(value)) => wrap(value),
        Ok(None) => Value::Null,
        Err(e) => {
            tracing::debug!(column = idx, error = %e, "could not decode column, using NULL");
            Value::Null
        }
    }
}

fn array<'a, T: FromSql<'a>>(row: &'a PgRow, idx: usize, wrap: fn(T) -> Value) -> Value {
    get::<Vec<Option<T>>>(row, idx, |items| {
        Value::Array(
            items
                .into_iter()
                .map(|item| item.map(wrap).unwrap_or(Value::Null))
                .collect(),
        )
    })
}

/// Decodes one column of a result row. Undecodable values become NULL.
pub(crate) fn postgres_to_value(row: &PgRow, idx: usize) -> Value {
    match row.columns()[idx].type_().name() {
        "bool" => get(row, idx, Value::Bool),
        "int2" => get(row, idx, Value::Int16),
        "int4" => get(row, idx, Value::Int32),
        "int8" => get(row, idx, Value::Int64),
        "oid" => get::<u32>(row, idx, |v| Value::Int64(v as i64)),
        "float4" => get(row, idx, Value::Float32),
        "float8" => get(row, idx, Value::Float64),
        "numeric" => get(row, idx, |v: NumericText| Value::Decimal(v.0)),
        "text" | "varchar" | "bpchar" | "name" | "unknown" => get(row, idx, Value::String),
        "bytea" => get(row, idx, Value::Bytes),
        "uuid" => get(row, idx, Value::Uuid),
        "json" | "jsonb" => get(row, idx, Value::Json),
        "date" => get(row, idx, Value::Date),
        "time" => get(row, idx, Value::Time),
        "timestamp" => get(row, idx, Value::DateTime),
        "timestamptz" => get(row, idx, Value::DateTimeUtc),
        "_bool" => array(row, idx, Value::Bool),
        "_int2" => array(row, idx, Value::Int16),
        "_int4" => array(row, idx, Value::Int32),
        "_int8" => array(row, idx, Value::Int64),
        "_float4" => array(row, idx, Value::Float32),
        "_float8" => array(row, idx, Value::Float64),
        "_numeric" => array(row, idx, |v: NumericText| Value::Decimal(v.0)),
        "_text" | "_varchar" | "_bpchar" | "_name" => array(row, idx, Value::String),
        "_bytea" => array(row, idx, Value::Bytes),
        "_uuid" => array(row, idx, Value::Uuid),
        "_json" | "_jsonb" => array(row, idx, Value::Json),
        "_date" => array(row, idx, Value::Date),
        "_timestamp" => array(row, idx, Value::DateTime),
        "_timestamptz" => array(row, idx, Value::DateTimeUtc),
        _ => get(row, idx, |v: Fallback| v.0),
    }
}
