//! Feature cursor over a forward-only statement.
//!
//! Each row is turned into one [`MssqlFeature`]: scalar columns become
//! attribute values and spatial columns are decoded into geometry parts.

mod cursor;
mod feature;

pub use cursor::{MssqlFeatureset, STRING_BUFFER_CAPACITY};
pub use feature::{AttributeContext, MssqlFeature};
