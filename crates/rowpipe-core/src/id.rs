//! Strongly-typed identifiers used across the pipeline.
//!
//! Downstream crates should not pass raw integers around for positions or
//! transaction ids.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! new_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Ord, PartialOrd,
        )]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            pub const fn new(v: u64) -> Self {
                Self(v)
            }
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

// Position of an item in the upstream stream, assigned by the feeder.
new_id!(Seq);
new_id!(TxId);

impl Seq {
    pub const ZERO: Seq = Seq(0);

    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}
