// Operation identifiers - payer + valid start + nonce
//
// The id stamped on an operation never changes across retries. Chunks of one
// logical submission derive their ids from the first chunk's id by a fixed
// offset, so rebuilding chunks always reproduces the same ids.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use crate::types::{AccountId, ParseIdError, Timestamp};

/// Offset between the valid starts of consecutive chunks
pub const CHUNK_ID_STEP: Duration = Duration::from_nanos(1);

/// Chunks one operation id may derive. Every generated id reserves this many
/// valid starts, so no later id lands on a derived chunk id.
pub const MAX_CHUNKS_PER_OPERATION: u32 = 1_000;

/// Valid starts are backdated by a random amount in this range so that a
/// node whose clock lags ours still accepts the operation
const BACKDATE_MIN_NANOS: i64 = 5_000_000_000;
const BACKDATE_MAX_NANOS: i64 = 8_000_000_000;

/// Last valid start handed out by this process, in unix nanos
static LAST_VALID_START: AtomicI64 = AtomicI64::new(0);

/// Identifier of one logical operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OperationId {
    /// Account paying for the operation
    pub payer: AccountId,
    /// Start of the validity window
    pub valid_start: Timestamp,
    /// Random per-generation nonce, guards against other processes sharing the payer
    pub nonce: u32,
}

impl OperationId {
    pub fn new(payer: AccountId, valid_start: Timestamp, nonce: u32) -> Self {
        Self {
            payer,
            valid_start,
            nonce,
        }
    }

    /// Fresh id for `payer`, later than any id this process generated or
    /// could derive from one
    pub fn generate(payer: AccountId) -> Self {
        let mut rng = rand::thread_rng();
        let backdate = rng.gen_range(BACKDATE_MIN_NANOS..BACKDATE_MAX_NANOS);
        let candidate = Timestamp::now().as_unix_nanos() as i64 - backdate;

        let mut last = LAST_VALID_START.load(Ordering::Relaxed);
        let valid_start = loop {
            let next = candidate.max(last + i64::from(MAX_CHUNKS_PER_OPERATION));
            match LAST_VALID_START.compare_exchange_weak(
                last,
                next,
                Ordering::SeqCst,
                Ordering::Relaxed,
            ) {
                Ok(_) => break next,
                Err(current) => last = current,
            }
        };

        Self {
            payer,
            valid_start: Timestamp::from_unix_nanos(valid_start as i128),
            nonce: rng.gen(),
        }
    }

    /// Id of chunk `index` of the submission whose first chunk is `base`.
    /// Pure: no clock and no randomness.
    pub fn derive_chunk(base: &OperationId, index: u32) -> Self {
        Self {
            payer: base.payer,
            valid_start: base.valid_start.plus(CHUNK_ID_STEP * index),
            nonce: base.nonce,
        }
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}@{}.{:09}/{}",
            self.payer, self.valid_start.seconds, self.valid_start.nanos, self.nonce
        )
    }
}

impl FromStr for OperationId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseIdError(s.to_string());

        let (payer, rest) = s.split_once('@').ok_or_else(err)?;
        let (start, nonce) = match rest.split_once('/') {
            Some((start, nonce)) => (start, nonce.parse::<u32>().map_err(|_| err())?),
            None => (rest, 0),
        };
        let (secs, nanos) = start.split_once('.').ok_or_else(err)?;

        Ok(Self {
            payer: payer.parse()?,
            valid_start: Timestamp::new(
                secs.parse().map_err(|_| err())?,
                nanos.parse().map_err(|_| err())?,
            ),
            nonce,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_is_strictly_increasing() {
        let payer = AccountId::from_num(1001);
        let mut previous = OperationId::generate(payer);
        for _ in 0..1000 {
            let next = OperationId::generate(payer);
            assert!(next.valid_start > previous.valid_start);
            previous = next;
        }
    }

    #[test]
    fn test_generate_skips_derived_chunk_ids() {
        let payer = AccountId::from_num(1001);
        let first = OperationId::generate(payer);
        let second = OperationId::generate(payer);

        let last_chunk = OperationId::derive_chunk(&first, MAX_CHUNKS_PER_OPERATION - 1);
        assert!(second.valid_start > last_chunk.valid_start);
    }

    #[test]
    fn test_generate_is_backdated() {
        let now = Timestamp::now();
        let id = OperationId::generate(AccountId::from_num(2));
        assert!(id.valid_start < now);
        assert!(id.valid_start > now.minus(Duration::from_secs(9)));
    }

    #[test]
    fn test_derive_chunk_is_pure() {
        let base = OperationId::new(AccountId::from_num(7), Timestamp::new(100, 5), 42);
        assert_eq!(OperationId::derive_chunk(&base, 0), base);

        let third = OperationId::derive_chunk(&base, 2);
        assert_eq!(third.valid_start, Timestamp::new(100, 7));
        assert_eq!(third.payer, base.payer);
        assert_eq!(third.nonce, base.nonce);
        assert_eq!(OperationId::derive_chunk(&base, 2), third);
    }

    #[test]
    fn test_display_parse() {
        let id = OperationId::new(AccountId::from_num(1001), Timestamp::new(1_700_000_000, 123), 9);
        let text = id.to_string();
        assert_eq!(text, "0.0.1001@1700000000.000000123/9");
        assert_eq!(text.parse::<OperationId>().unwrap(), id);
        assert!("0.0.1001".parse::<OperationId>().is_err());
    }
}
