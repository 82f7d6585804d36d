//! Criteria input types.

mod criteria;
mod value;

pub use criteria::CriteriaSpec;
pub use value::{Map, MapKey, Value};
