//! Fixed little-endian wire types for comlist negotiation and halo payloads.

use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert_eq;
use std::mem::{align_of, size_of};

pub fn cast_slice<T: Pod>(v: &[T]) -> &[u8] {
    bytemuck::cast_slice(v)
}

/// Decode a received buffer into owned records. Works for any alignment of `v`.
pub fn decode_records<T: Pod>(v: &[u8]) -> Vec<T> {
    v.chunks_exact(size_of::<T>())
        .map(bytemuck::pod_read_unaligned)
        .collect()
}

pub fn expect_exact_len(actual: usize, expected: usize) -> Result<(), String> {
    if actual == expected {
        Ok(())
    } else {
        Err(format!("expected {expected} bytes, got {actual}"))
    }
}

/// Per-parity record count (size handshake).
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireCount {
    pub n_le: u32,
}

impl WireCount {
    pub fn new(n: usize) -> Self {
        Self {
            n_le: (n as u32).to_le(),
        }
    }
    pub fn get(&self) -> usize {
        u32::from_le(self.n_le) as usize
    }
}

/// A global site index carried on the wire.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireSite {
    pub global_le: u64,
}

impl WireSite {
    pub fn of(global: u64) -> Self {
        Self {
            global_le: global.to_le(),
        }
    }
    pub fn get(&self) -> u64 {
        u64::from_le(self.global_le)
    }
}

// --- f64 payloads ---

/// Append `values` to `buf` as little-endian f64.
pub fn pack_f64(values: &[f64], buf: &mut Vec<u8>) {
    buf.reserve(values.len() * size_of::<f64>());
    for v in values {
        buf.extend_from_slice(&v.to_le_bytes());
    }
}

/// Decode little-endian f64 values from `bytes` into `out`.
/// Caller guarantees `bytes.len() == out.len() * 8`.
pub fn unpack_f64(bytes: &[u8], out: &mut [f64]) {
    for (dst, chunk) in out.iter_mut().zip(bytes.chunks_exact(size_of::<f64>())) {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(chunk);
        *dst = f64::from_le_bytes(raw);
    }
}

// ===== Compile-time layout checks ===========================================

const_assert_eq!(size_of::<WireCount>(), 4);
const_assert_eq!(size_of::<WireSite>(), 8);
const_assert_eq!(align_of::<WireSite>(), align_of::<u64>());
