//! Numeric transform seam
//!
//! The transform that turns raw time-series into counts and asymmetry is an
//! external collaborator. It sees only the parameter bag; anything it reads
//! from elsewhere would bypass the fingerprint.

use muse_foundation::ParameterBag;
use thiserror::Error;

/// Failure reported by a transform
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ComputeFailure {
    pub message: String,
}

impl ComputeFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for ComputeFailure {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for ComputeFailure {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Result of a transform call
pub type ComputeResult<T> = std::result::Result<T, ComputeFailure>;

/// Pure functions producing the derived products
pub trait Transform {
    type Product;

    /// Summed/subtracted period counts of one group
    fn group_counts(&self, params: &ParameterBag) -> ComputeResult<Self::Product>;

    /// Asymmetry estimate of one group
    fn group_asymmetry(&self, params: &ParameterBag) -> ComputeResult<Self::Product>;

    /// Forward/backward asymmetry of one pair
    fn pair_asymmetry(&self, params: &ParameterBag) -> ComputeResult<Self::Product>;
}

impl<X: Transform + ?Sized> Transform for &X {
    type Product = X::Product;

    fn group_counts(&self, params: &ParameterBag) -> ComputeResult<Self::Product> {
        (**self).group_counts(params)
    }

    fn group_asymmetry(&self, params: &ParameterBag) -> ComputeResult<Self::Product> {
        (**self).group_asymmetry(params)
    }

    fn pair_asymmetry(&self, params: &ParameterBag) -> ComputeResult<Self::Product> {
        (**self).pair_asymmetry(params)
    }
}
