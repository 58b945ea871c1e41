// Copyright 2025 STARGA Inc.
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at:
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Part of the MIND project (Machine Intelligence Native Design).

//! Content hashing for graph nodes.
//!
//! Node identity for deduplication and computation caching is a digest of the
//! node's kind, shape and payload. Payload values are hashed in their native
//! representation: a floating constant hashes its `f64` bits and an integral
//! constant hashes its `i64`, each under a distinct category tag, so `3.0` and
//! `3` never collide.
//!
//! # Example
//!
//! ```
//! use mind_lazy::hash::scalar_hash;
//! use mind_lazy::types::Scalar;
//!
//! assert_eq!(scalar_hash(&Scalar::Float(3.5)), scalar_hash(&Scalar::Float(3.5)));
//! assert_ne!(scalar_hash(&Scalar::Float(3.0)), scalar_hash(&Scalar::Int(3)));
//! ```

use std::fmt;

use sha2::{Digest, Sha256};

use crate::types::{Scalar, Shape};

const TAG_U64: u8 = 0x01;
const TAG_I64: u8 = 0x02;
const TAG_F64: u8 = 0x03;
const TAG_STR: u8 = 0x04;
const TAG_HASH: u8 = 0x05;

/// 128-bit content digest used as node identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash([u8; 16]);

impl ContentHash {
    /// The all-zero hash, used as the seed of empty combinations.
    pub const ZERO: ContentHash = ContentHash([0; 16]);

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Order-sensitive combination of two hashes.
    pub fn combine(self, other: ContentHash) -> ContentHash {
        let mut hasher = ContentHasher::new();
        hasher.write_hash(self).write_hash(other);
        hasher.finish()
    }

    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(32);
        for byte in self.0 {
            out.push_str(&format!("{byte:02x}"));
        }
        out
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

/// Incremental hasher over typed fields.
///
/// Every field is written with a type tag (and strings with a length prefix)
/// so that distinct field sequences cannot produce the same byte stream.
#[derive(Clone, Default)]
pub struct ContentHasher {
    inner: Sha256,
}

impl ContentHasher {
    pub fn new() -> Self {
        Self { inner: Sha256::new() }
    }

    pub fn write_u64(&mut self, value: u64) -> &mut Self {
        self.inner.update([TAG_U64]);
        self.inner.update(value.to_le_bytes());
        self
    }

    pub fn write_i64(&mut self, value: i64) -> &mut Self {
        self.inner.update([TAG_I64]);
        self.inner.update(value.to_le_bytes());
        self
    }

    /// Hashes the raw bit pattern; `-0.0` and `0.0` are distinct.
    pub fn write_f64(&mut self, value: f64) -> &mut Self {
        self.inner.update([TAG_F64]);
        self.inner.update(value.to_bits().to_le_bytes());
        self
    }

    pub fn write_str(&mut self, value: &str) -> &mut Self {
        self.inner.update([TAG_STR]);
        self.inner.update((value.len() as u64).to_le_bytes());
        self.inner.update(value.as_bytes());
        self
    }

    pub fn write_hash(&mut self, value: ContentHash) -> &mut Self {
        self.inner.update([TAG_HASH]);
        self.inner.update(value.0);
        self
    }

    pub fn write_shape(&mut self, shape: &Shape) -> &mut Self {
        self.write_str(shape.scalar_type().name());
        self.write_u64(shape.rank() as u64);
        for dim in shape.dims() {
            self.write_u64(*dim as u64);
        }
        self
    }

    pub fn finish(self) -> ContentHash {
        let digest = self.inner.finalize();
        let mut out = [0u8; 16];
        out.copy_from_slice(&digest[..16]);
        ContentHash(out)
    }
}

pub fn hash_f64(value: f64) -> ContentHash {
    let mut hasher = ContentHasher::new();
    hasher.write_f64(value);
    hasher.finish()
}

pub fn hash_i64(value: i64) -> ContentHash {
    let mut hasher = ContentHasher::new();
    hasher.write_i64(value);
    hasher.finish()
}

/// Hash of a scalar constant in its native representation.
///
/// Floating values hash their `f64` bits, integral values (including booleans)
/// hash their `i64` value.
pub fn scalar_hash(value: &Scalar) -> ContentHash {
    if value.is_floating_point() {
        hash_f64(value.to_f64())
    } else {
        hash_i64(value.to_i64())
    }
}

pub fn shape_hash(shape: &Shape) -> ContentHash {
    let mut hasher = ContentHasher::new();
    hasher.write_shape(shape);
    hasher.finish()
}
