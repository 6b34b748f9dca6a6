//! Target identity of a client: which contract, under which logical name.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::contract::CallContract;

/// Identifies a client for equality, hashing, display and observability labels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetIdentity {
    contract: String,
    name: String,
}

impl TargetIdentity {
    pub fn new(contract: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            contract: contract.into(),
            name: name.into(),
        }
    }

    /// Identity named after the contract itself.
    pub fn of(contract: &CallContract) -> Self {
        Self::new(contract.name(), contract.name())
    }

    /// Identity with a custom logical name (used in metrics/logging).
    pub fn named(contract: &CallContract, name: impl Into<String>) -> Self {
        Self::new(contract.name(), name)
    }

    pub fn contract(&self) -> &str {
        &self.contract
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Structural hash of both fields.
    pub fn hash_code(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

impl fmt::Display for TargetIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TargetIdentity{{contract={}, name='{}'}}", self.contract, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_equality() {
        let a = TargetIdentity::new("GreetingService", "greetings");
        let b = TargetIdentity::new("GreetingService", "greetings");
        let c = TargetIdentity::new("GreetingService", "other");

        assert_eq!(a, b);
        assert_eq!(a.hash_code(), b.hash_code());
        assert_ne!(a, c);
    }

    #[test]
    fn test_display() {
        let target = TargetIdentity::new("GreetingService", "greetings");
        assert_eq!(
            target.to_string(),
            "TargetIdentity{contract=GreetingService, name='greetings'}"
        );
    }
}
