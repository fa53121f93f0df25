//! Strongly-typed identifiers for requests, targets and jobs.
//!
//! Every id renders as `<prefix>_<uuid>` and only parses back with its own
//! prefix, so a target id can never be mistaken for a request id in logs
//! or config.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

fn parse_prefixed(prefix: &str, s: &str) -> Result<Uuid> {
    let raw = s
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('_'))
        .ok_or_else(|| Error::InvalidId(format!("expected '{prefix}_' prefix: {s}")))?;
    Uuid::parse_str(raw).map_err(|e| Error::InvalidId(format!("{s}: {e}")))
}

macro_rules! define_ids {
    ($($(#[$meta:meta])* $name:ident => $prefix:literal),+ $(,)?) => {$(
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub const PREFIX: &'static str = $prefix;

            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}_{}", Self::PREFIX, self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                parse_prefixed(Self::PREFIX, s).map(Self)
            }
        }
    )+};
}

define_ids! {
    /// Identifies one built request.
    RequestId => "req",
    /// Identifies a view-like target across its lifetime.
    TargetId => "tgt",
    /// Identifies a single execution of a request.
    JobId => "job",
}
