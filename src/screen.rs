//! Screen relay: single-slot, TTL-bound cache of the latest captured frame
//! per target.
//!
//! Agents push frames as opaque encoded strings (typically base64 JPEG);
//! the relay never inspects or re-encodes the payload. Each push overwrites
//! the previous frame. A pull that finds the frame older than
//! [`SCREEN_TTL_MS`] clears the slot and reports it expired, so a stalled
//! stream is distinguishable from one that never started.

use serde::{Deserialize, Serialize};

use crate::clock::now_ms;
use crate::store::{Store, StoreError};

/// A frame older than this is treated as absent and the slot cleared.
pub const SCREEN_TTL_MS: u64 = 15_000;

/// Payloads shorter than this are rejected as junk captures.
pub const MIN_FRAME_BYTES: usize = 100;

/// Quality hint applied when the agent does not send one.
pub const DEFAULT_QUALITY: u32 = 70;

fn screen_key(id: &str) -> String {
    format!("screen:{id}")
}

/// The stored frame, returned to the controller verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenFrame {
    /// Opaque encoded image payload, passed through unchanged.
    pub screen: String,
    /// Milliseconds since epoch at push time.
    pub timestamp: u64,
    /// Encoder quality hint.
    pub quality: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum ScreenError {
    #[error("frame payload too small ({0} bytes, minimum 100)")]
    FrameTooSmall(usize),

    /// The target never pushed a frame (or its slot was cleared).
    #[error("no screen data")]
    NotFound,

    /// A frame existed but aged past the TTL; the slot has been cleared.
    #[error("screen data expired")]
    Expired,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Per-target latest-frame slots over the shared store.
#[derive(Clone)]
pub struct ScreenRelay {
    store: Store,
}

impl ScreenRelay {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Store a new frame for `target_id`, overwriting any prior one.
    ///
    /// Undersized payloads are rejected; the original controller dropped
    /// them client-side, and the relay enforces the same floor so a
    /// misbehaving agent cannot blank the stream.
    pub async fn push(
        &self,
        target_id: &str,
        screen: String,
        quality: Option<u32>,
    ) -> Result<(), ScreenError> {
        if screen.len() < MIN_FRAME_BYTES {
            return Err(ScreenError::FrameTooSmall(screen.len()));
        }

        let key = screen_key(target_id);
        let frame = ScreenFrame {
            screen,
            timestamp: now_ms(),
            quality: quality.unwrap_or(DEFAULT_QUALITY),
        };
        // Slot lock: an expired pull's clear must not interleave with this
        // write and delete a frame that was just refreshed.
        let _slot = self.store.lock(&key).await;
        self.store.put_json(&key, &frame).await?;
        Ok(())
    }

    /// Fetch the current frame for `target_id`.
    ///
    /// `NotFound` if nothing is stored; `Expired` (after clearing the slot)
    /// if the stored frame aged past [`SCREEN_TTL_MS`]. Expiry is one-shot:
    /// the pull after an expired one reports `NotFound`.
    pub async fn pull(&self, target_id: &str) -> Result<ScreenFrame, ScreenError> {
        let key = screen_key(target_id);
        let _slot = self.store.lock(&key).await;

        let Some(frame) = self.store.get_json::<ScreenFrame>(&key).await? else {
            return Err(ScreenError::NotFound);
        };

        if now_ms().saturating_sub(frame.timestamp) > SCREEN_TTL_MS {
            self.store.delete(&key).await?;
            return Err(ScreenError::Expired);
        }

        Ok(frame)
    }
}
