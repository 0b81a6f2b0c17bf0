//! Convenient re-exports for downstream crates.

pub use crate::cancel::CancellationToken;
pub use crate::config::FilterConfig;
pub use crate::error::{Error, Result};
pub use crate::id::{Seq, TxId};
pub use crate::schema::{ColDescriptor, ParamTypes, ScanSpecs, SqlValueType};
pub use crate::tx::TxContext;
pub use crate::types::{Params, Row, Value};
