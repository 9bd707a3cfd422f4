use serde::{Deserialize, Serialize};

/// Number of 32-bit words needed to hold `bits` bits.
#[inline]
#[must_use]
pub fn word_count(bits: u32) -> usize {
    bits.div_ceil(32) as usize
}

/// A fixed-width logic value.
///
/// Every bit is carried by a pair of vectors: `avec` holds the asserted value
/// and `bvec` the ambiguity mask. A bit is `1` when both are set, `0` when
/// both are clear and undefined (`x`) when only `bvec` is set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Signal {
    pub bits: u32,
    pub avec: Vec<u32>,
    pub bvec: Vec<u32>,
}

impl Signal {
    pub fn new(bits: u32, avec: Vec<u32>, bvec: Vec<u32>) -> Self {
        Self { bits, avec, bvec }
    }

    fn filled(bits: u32, a: u32, b: u32) -> Self {
        let words = word_count(bits);
        Self::new(bits, vec![a; words], vec![b; words])
    }

    /// All bits low.
    pub fn zeros(bits: u32) -> Self {
        Self::filled(bits, 0, 0)
    }

    /// All bits high.
    pub fn ones(bits: u32) -> Self {
        Self::filled(bits, !0, !0)
    }

    /// All bits undefined.
    pub fn xes(bits: u32) -> Self {
        Self::filled(bits, 0, !0)
    }
}

/// Host-facing encoding of a [`Signal`].
///
/// Field names are fixed by the host protocol: `{ _bits, _avec, _bvec }`.
/// Only the structural shape is checked on decode; width/vector mismatches
/// are left for the engine to reject.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct WireSignal {
    #[serde(rename = "_bits")]
    pub bits: u32,
    #[serde(rename = "_avec")]
    pub avec: Vec<u32>,
    #[serde(rename = "_bvec")]
    pub bvec: Vec<u32>,
}

/// Encodes a signal for the host. The vectors are copied, never shared.
pub fn encode(signal: &Signal) -> WireSignal {
    WireSignal {
        bits: signal.bits,
        avec: signal.avec.clone(),
        bvec: signal.bvec.clone(),
    }
}

/// Decodes a host-supplied signal.
pub fn decode(wire: WireSignal) -> Signal {
    Signal::new(wire.bits, wire.avec, wire.bvec)
}

impl From<&Signal> for WireSignal {
    fn from(signal: &Signal) -> Self {
        encode(signal)
    }
}

impl From<WireSignal> for Signal {
    fn from(wire: WireSignal) -> Self {
        decode(wire)
    }
}
