//! Wire contracts shared by every connection leg.
//!
//! A connection carries an interleaved sequence of binary frames (raw PCM16)
//! and text frames (JSON control messages tagged by `type`). The codec here
//! is the single source of truth for both: [`frames`] defines the closed
//! control vocabularies per leg, [`pcm`] owns the even-length PCM16
//! invariant.

pub mod frames;
pub mod pcm;
