// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Numeric ABI between host and guest.
//!
//! Guests expose plain numeric functions. The host speaks `f64` on its side
//! and converts to whatever the guest declared, following the JavaScript
//! embedding's rules (`ToInt32` for `i32`, truncation for `i64`).

use crate::errors::{HostError, HostResult};
use wasmtime::{Val, ValType};

/// JavaScript `ToInt32`: NaN and infinities become 0, everything else wraps.
pub fn to_int32(value: f64) -> i32 {
    if !value.is_finite() {
        return 0;
    }
    value.trunc().rem_euclid(4_294_967_296.0) as u32 as i32
}

/// JavaScript `ToUint32`.
pub fn to_uint32(value: f64) -> u32 {
    to_int32(value) as u32
}

/// Convert a host argument into a guest value of type `ty`.
pub fn coerce_arg(export: &str, ty: &ValType, value: f64) -> HostResult<Val> {
    match ty {
        ValType::I32 => Ok(Val::I32(to_int32(value))),
        ValType::I64 => Ok(Val::I64(if value.is_finite() { value.trunc() as i64 } else { 0 })),
        ValType::F32 => Ok(Val::F32((value as f32).to_bits())),
        ValType::F64 => Ok(Val::F64(value.to_bits())),
        other => Err(HostError::AbiMismatch {
            export: export.to_string(),
            reason: format!("parameter type {:?} is not numeric", other),
        }),
    }
}

/// Read a numeric guest value as `f64`.
pub fn val_to_f64(value: &Val) -> Option<f64> {
    match value {
        Val::I32(v) => Some(f64::from(*v)),
        Val::I64(v) => Some(*v as f64),
        Val::F32(bits) => Some(f64::from(f32::from_bits(*bits))),
        Val::F64(bits) => Some(f64::from_bits(*bits)),
        _ => None,
    }
}

/// Zero of a numeric type, used to fill result slots.
pub fn zero_value(export: &str, ty: &ValType) -> HostResult<Val> {
    coerce_arg(export, ty, 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_int32_wraps_like_javascript() {
        assert_eq!(to_int32(3.9), 3);
        assert_eq!(to_int32(-3.9), -3);
        assert_eq!(to_int32(2_147_483_648.0), i32::MIN);
        assert_eq!(to_int32(4_294_967_296.0 + 5.0), 5);
        assert_eq!(to_int32(f64::NAN), 0);
        assert_eq!(to_int32(f64::INFINITY), 0);
    }

    #[test]
    fn test_to_uint32() {
        assert_eq!(to_uint32(-1.0), u32::MAX);
        assert_eq!(to_uint32(1024.0), 1024);
    }

    #[test]
    fn test_coerce_numeric_types() {
        assert_eq!(coerce_arg("f", &ValType::I32, 7.5).unwrap().i32(), Some(7));
        assert_eq!(coerce_arg("f", &ValType::I64, -2.5).unwrap().i64(), Some(-2));
        assert_eq!(coerce_arg("f", &ValType::F64, 0.25).unwrap().f64(), Some(0.25));
        assert_eq!(coerce_arg("f", &ValType::F32, 0.5).unwrap().f32(), Some(0.5));
    }

    #[test]
    fn test_non_numeric_rejected() {
        match coerce_arg("f", &ValType::V128, 1.0) {
            Err(HostError::AbiMismatch { export, .. }) => assert_eq!(export, "f"),
            other => panic!("Expected AbiMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_val_round_trip_through_f64() {
        assert_eq!(val_to_f64(&Val::I32(-4)), Some(-4.0));
        assert_eq!(val_to_f64(&Val::F64(1.5f64.to_bits())), Some(1.5));
    }
}
