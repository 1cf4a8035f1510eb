//! Explicit registry of idempotent methods.

use std::collections::HashSet;

use job_core::{JobDescriptor, JobMetadata, MethodKey};

/// Methods flagged idempotent at registration time.
#[derive(Debug, Clone, Default)]
pub struct IdempotentMethods {
    methods: HashSet<MethodKey>,
}

impl IdempotentMethods {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flag `type_name.method`.
    pub fn with(mut self, type_name: impl Into<String>, method: impl Into<String>) -> Self {
        self.insert(MethodKey::new(type_name, method));
        self
    }

    /// Flag a method. Returns `false` if it was already flagged.
    pub fn insert(&mut self, key: MethodKey) -> bool {
        self.methods.insert(key)
    }

    pub fn contains(&self, key: &MethodKey) -> bool {
        self.methods.contains(key)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

impl JobMetadata for IdempotentMethods {
    fn is_idempotent(&self, job: &JobDescriptor) -> bool {
        self.methods.contains(&job.method_key())
    }
}
