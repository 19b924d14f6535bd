//! Request parameters
//!
//! - `ParamValue`: closed union of primitives and primitive lists
//! - `ParameterBag`: named values that produce one derived product

mod bag;
mod value;

pub use bag::ParameterBag;
pub use value::{ParamValue, Scalar};
