// src/model/failover.rs

use crate::error::ProviderError;

/// Decides whether a failed primary call is worth one retry on the fallback model.
pub trait FailoverPolicy: Send + Sync {
    fn should_fail_over(&self, err: &ProviderError) -> bool;
}

/// Fail over only when the provider says the primary model itself is unusable
/// (no on-demand throughput, profile required, retired, bad id, rejected
/// request shape, missing subscription).
#[derive(Debug, Default, Clone, Copy)]
pub struct UnusableModelPolicy;

impl FailoverPolicy for UnusableModelPolicy {
    fn should_fail_over(&self, err: &ProviderError) -> bool {
        err.kind.is_model_unusable()
    }
}
