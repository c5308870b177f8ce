use std::any::Any;

use crate::error::NeonPgError;
use crate::types::RowValues;

/// Copy `values` into typed destinations.
///
/// Destination slots may be `String`, `i32`, `i64`, `bool`, `f64` or
/// `RowValues` (an untyped passthrough). Anything else is a scan error.
///
/// # Errors
/// Returns [`NeonPgError::Scan`] on an arity mismatch, a value whose kind
/// does not fit its destination, or an unsupported destination type.
pub fn scan_values(
    source: &str,
    values: &[RowValues],
    dest: &mut [&mut dyn Any],
) -> Result<(), NeonPgError> {
    if dest.len() != values.len() {
        return Err(NeonPgError::Scan(format!(
            "{source}: scan dest count {} != column count {}",
            dest.len(),
            values.len()
        )));
    }
    for (idx, (slot, value)) in dest.iter_mut().zip(values).enumerate() {
        assign_scan_value(source, idx, &mut **slot, value)?;
    }
    Ok(())
}

fn assign_scan_value(
    source: &str,
    idx: usize,
    dest: &mut dyn Any,
    value: &RowValues,
) -> Result<(), NeonPgError> {
    let mismatch = |expected: &str| {
        NeonPgError::Scan(format!(
            "{source}: expected {expected} at column {idx}, got {}",
            value.kind()
        ))
    };

    if let Some(d) = dest.downcast_mut::<String>() {
        *d = value.as_text().ok_or_else(|| mismatch("string"))?.to_string();
    } else if let Some(d) = dest.downcast_mut::<i64>() {
        *d = *value.as_int().ok_or_else(|| mismatch("i64"))?;
    } else if let Some(d) = dest.downcast_mut::<i32>() {
        let wide = *value.as_int().ok_or_else(|| mismatch("i32"))?;
        *d = i32::try_from(wide).map_err(|_| {
            NeonPgError::Scan(format!("{source}: value at column {idx} overflows i32"))
        })?;
    } else if let Some(d) = dest.downcast_mut::<bool>() {
        *d = *value.as_bool().ok_or_else(|| mismatch("bool"))?;
    } else if let Some(d) = dest.downcast_mut::<f64>() {
        *d = value.as_float().ok_or_else(|| mismatch("f64"))?;
    } else if let Some(d) = dest.downcast_mut::<RowValues>() {
        *d = value.clone();
    } else {
        return Err(NeonPgError::Scan(format!(
            "{source}: unsupported scan target type at column {idx}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scans_every_supported_kind() {
        let values = vec![
            RowValues::Text("a".into()),
            RowValues::Int(7),
            RowValues::Int(-3),
            RowValues::Bool(true),
            RowValues::Float(2.5),
            RowValues::Null,
        ];
        let (mut s, mut wide, mut narrow, mut b, mut f) = (String::new(), 0i64, 0i32, false, 0f64);
        let mut any = RowValues::Int(0);
        scan_values(
            "test",
            &values,
            &mut [&mut s, &mut wide, &mut narrow, &mut b, &mut f, &mut any],
        )
        .unwrap();
        assert_eq!((s.as_str(), wide, narrow, b, f), ("a", 7, -3, true, 2.5));
        assert_eq!(any, RowValues::Null);
    }

    #[test]
    fn arity_mismatch_is_descriptive() {
        let mut id = 0i64;
        let err = scan_values("test", &[RowValues::Int(1), RowValues::Int(2)], &mut [&mut id])
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "neon-pg: scan error: test: scan dest count 1 != column count 2"
        );
    }

    #[test]
    fn kind_mismatch_names_column() {
        let mut name = String::new();
        let err = scan_values("test", &[RowValues::Int(1)], &mut [&mut name]).unwrap_err();
        assert!(err.to_string().contains("expected string at column 0, got int"));
    }

    #[test]
    fn unsupported_target_is_an_error_not_a_panic() {
        let mut target: u8 = 0;
        let err = scan_values("test", &[RowValues::Int(1)], &mut [&mut target]).unwrap_err();
        assert!(err.to_string().contains("unsupported scan target type at column 0"));
    }

    #[test]
    fn i32_overflow_is_reported() {
        let mut narrow = 0i32;
        let err = scan_values("test", &[RowValues::Int(i64::MAX)], &mut [&mut narrow]).unwrap_err();
        assert!(matches!(err, NeonPgError::Scan(_)));
    }
}
