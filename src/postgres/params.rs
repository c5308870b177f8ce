use std::error::Error;

use chrono::NaiveDateTime;
use tokio_postgres::types::{IsNull, ToSql, Type, to_sql_checked};
use tokio_util::bytes;

use crate::types::RowValues;

/// Borrow arguments as driver parameters for a prepared statement, whose
/// parameter types come from the server.
pub(crate) fn as_refs(params: &[RowValues]) -> Vec<&(dyn ToSql + Sync)> {
    let mut references = Vec::with_capacity(params.len());
    for p in params {
        references.push(p as &(dyn ToSql + Sync));
    }
    references
}

/// Pair each argument with a type derived from its own value. Used when no
/// server-side statement description is available.
pub(crate) fn typed_params(params: &[RowValues]) -> Vec<(&(dyn ToSql + Sync), Type)> {
    params
        .iter()
        .map(|p| (p as &(dyn ToSql + Sync), inferred_type(p)))
        .collect()
}

/// The wire type a value is sent as when the server has not described the
/// statement.
#[must_use]
pub fn inferred_type(value: &RowValues) -> Type {
    match value {
        RowValues::Int(_) => Type::INT8,
        RowValues::Float(_) => Type::FLOAT8,
        RowValues::Text(_) => Type::TEXT,
        RowValues::Bool(_) => Type::BOOL,
        RowValues::Timestamp(_) => Type::TIMESTAMP,
        RowValues::JSON(_) => Type::JSONB,
        RowValues::Blob(_) => Type::BYTEA,
        RowValues::Null => Type::UNKNOWN,
    }
}

fn timestamp_to_sql(
    dt: &NaiveDateTime,
    ty: &Type,
    out: &mut bytes::BytesMut,
) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
    match *ty {
        Type::TIMESTAMPTZ => dt.and_utc().to_sql(ty, out),
        Type::DATE => dt.date().to_sql(ty, out),
        _ => dt.to_sql(ty, out),
    }
}

impl ToSql for RowValues {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut bytes::BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            RowValues::Int(i) => match *ty {
                Type::INT2 => i16::try_from(*i)?.to_sql(ty, out),
                Type::INT4 => i32::try_from(*i)?.to_sql(ty, out),
                _ => (*i).to_sql(ty, out),
            },
            #[allow(clippy::cast_possible_truncation)]
            RowValues::Float(f) => match *ty {
                Type::FLOAT4 => (*f as f32).to_sql(ty, out),
                _ => (*f).to_sql(ty, out),
            },
            RowValues::Text(s) => s.to_sql(ty, out),
            RowValues::Bool(b) => (*b).to_sql(ty, out),
            RowValues::Timestamp(dt) => timestamp_to_sql(dt, ty, out),
            RowValues::Null => Ok(IsNull::Yes),
            RowValues::JSON(jsval) => jsval.to_sql(ty, out),
            RowValues::Blob(bytes) => bytes.to_sql(ty, out),
        }
    }

    fn accepts(ty: &Type) -> bool {
        matches!(
            *ty,
            Type::INT2
                | Type::INT4
                | Type::INT8
                | Type::FLOAT4
                | Type::FLOAT8
                | Type::TEXT
                | Type::VARCHAR
                | Type::BPCHAR
                | Type::NAME
                | Type::BOOL
                | Type::TIMESTAMP
                | Type::TIMESTAMPTZ
                | Type::DATE
                | Type::JSON
                | Type::JSONB
                | Type::BYTEA
                // untyped NULL
                | Type::UNKNOWN
        )
    }

    to_sql_checked!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inferred_types_follow_the_value() {
        assert_eq!(inferred_type(&RowValues::Int(1)), Type::INT8);
        assert_eq!(inferred_type(&RowValues::Text("x".into())), Type::TEXT);
        assert_eq!(inferred_type(&RowValues::Null), Type::UNKNOWN);
        assert_eq!(inferred_type(&RowValues::JSON(serde_json::json!({}))), Type::JSONB);
    }

    #[test]
    fn ints_narrow_to_the_target_column() {
        let mut buf = bytes::BytesMut::new();
        RowValues::Int(7).to_sql(&Type::INT4, &mut buf).unwrap();
        assert_eq!(buf.len(), 4);

        let mut buf = bytes::BytesMut::new();
        assert!(RowValues::Int(i64::from(i32::MAX) + 1)
            .to_sql(&Type::INT4, &mut buf)
            .is_err());
    }

    #[test]
    fn null_is_accepted_untyped() {
        assert!(<RowValues as ToSql>::accepts(&Type::UNKNOWN));
        let mut buf = bytes::BytesMut::new();
        assert!(matches!(
            RowValues::Null.to_sql(&Type::UNKNOWN, &mut buf),
            Ok(IsNull::Yes)
        ));
    }
}
