// Types shared by the SDK - entity ids, timestamps, balances

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Amount in base units (10^12 = 1 KRAT)
pub type Balance = u64;

/// One KRAT in base units
pub const KRAT: Balance = 1_000_000_000_000;

// =============================================================================
// ENTITY IDS
// =============================================================================

/// Error parsing a `shard.realm.num` id
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid entity id `{0}` (expected shard.realm.num)")]
pub struct ParseIdError(pub String);

fn parse_entity(s: &str) -> Result<(u64, u64, u64), ParseIdError> {
    let parts: Vec<&str> = s.trim().split('.').collect();
    if parts.len() != 3 {
        return Err(ParseIdError(s.to_string()));
    }
    let num = |p: &str| p.parse::<u64>().map_err(|_| ParseIdError(s.to_string()));
    Ok((num(parts[0])?, num(parts[1])?, num(parts[2])?))
}

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name {
            pub shard: u64,
            pub realm: u64,
            pub num: u64,
        }

        impl $name {
            pub const fn new(shard: u64, realm: u64, num: u64) -> Self {
                Self { shard, realm, num }
            }

            /// Id in shard 0, realm 0
            pub const fn from_num(num: u64) -> Self {
                Self::new(0, 0, num)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}.{}.{}", self.shard, self.realm, self.num)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let (shard, realm, num) = parse_entity(s)?;
                Ok(Self::new(shard, realm, num))
            }
        }

        // Strings in config files, fixed tuples on the wire
        impl Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                if serializer.is_human_readable() {
                    serializer.collect_str(self)
                } else {
                    (self.shard, self.realm, self.num).serialize(serializer)
                }
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                if deserializer.is_human_readable() {
                    let s = String::deserialize(deserializer)?;
                    s.parse().map_err(serde::de::Error::custom)
                } else {
                    let (shard, realm, num) = <(u64, u64, u64)>::deserialize(deserializer)?;
                    Ok(Self::new(shard, realm, num))
                }
            }
        }
    };
}

entity_id!(
    /// Ledger-assigned account id; consensus nodes are identified by one too
    AccountId
);
entity_id!(
    /// File entity id
    FileId
);
entity_id!(
    /// Consensus topic id
    TopicId
);
entity_id!(
    /// Smart contract id
    ContractId
);

// =============================================================================
// TIMESTAMP
// =============================================================================

/// Wall-clock instant with nanosecond precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: u32,
}

const NANOS_PER_SEC: i128 = 1_000_000_000;

impl Timestamp {
    pub fn new(seconds: i64, nanos: u32) -> Self {
        Self::from_unix_nanos(seconds as i128 * NANOS_PER_SEC + nanos as i128)
    }

    pub fn now() -> Self {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(d) => Self::from_unix_nanos(d.as_nanos() as i128),
            Err(_) => Self::default(),
        }
    }

    pub fn from_unix_nanos(total: i128) -> Self {
        Self {
            seconds: total.div_euclid(NANOS_PER_SEC) as i64,
            nanos: total.rem_euclid(NANOS_PER_SEC) as u32,
        }
    }

    pub fn as_unix_nanos(&self) -> i128 {
        self.seconds as i128 * NANOS_PER_SEC + self.nanos as i128
    }

    pub fn plus(&self, offset: Duration) -> Self {
        Self::from_unix_nanos(self.as_unix_nanos() + offset.as_nanos() as i128)
    }

    pub fn minus(&self, offset: Duration) -> Self {
        Self::from_unix_nanos(self.as_unix_nanos() - offset.as_nanos() as i128)
    }

    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.seconds, self.nanos).single()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.to_rfc3339()),
            None => write!(f, "{}.{:09}", self.seconds, self.nanos),
        }
    }
}

// =============================================================================
// LEDGER VALUES
// =============================================================================

/// Signed balance change applied to one account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountTransfer {
    pub account_id: AccountId,
    /// Negative for debits
    pub amount: i128,
}

impl AccountTransfer {
    pub fn new(account_id: AccountId, amount: i128) -> Self {
        Self { account_id, amount }
    }
}

/// Address book entry for one consensus node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAddress {
    pub account_id: AccountId,
    /// Service endpoints, e.g. `http://10.0.0.1:50211`
    pub endpoints: Vec<String>,
    #[serde(default)]
    pub description: String,
}

/// Account information answered by the network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub account_id: AccountId,
    pub key: crate::crypto::PublicKey,
    pub balance: Balance,
    pub memo: String,
    pub expiration: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_parse_display() {
        let id: AccountId = "0.0.1001".parse().unwrap();
        assert_eq!(id, AccountId::new(0, 0, 1001));
        assert_eq!(id.to_string(), "0.0.1001");
        assert!("0.0".parse::<AccountId>().is_err());
        assert!("0.x.3".parse::<TopicId>().is_err());
    }

    #[test]
    fn test_entity_id_serde_forms() {
        let id = AccountId::from_num(3);
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"0.0.3\"");

        let bytes = bincode::serialize(&id).unwrap();
        let back: AccountId = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_timestamp_offsets() {
        let ts = Timestamp::new(10, 999_999_999);
        let next = ts.plus(Duration::from_nanos(1));
        assert_eq!(next, Timestamp::new(11, 0));
        assert_eq!(next.minus(Duration::from_nanos(1)), ts);
        assert!(next > ts);
    }
}
