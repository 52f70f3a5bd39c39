//! Sandbox configuration with builder pattern.

/// Default instruction budget applied when a call does not pick one.
pub const DEFAULT_QUOTA: u32 = 500_000;

/// Engine-level configuration for the Lua sandbox.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Instruction budget used when a call leaves the quota unspecified.
    pub default_quota: u32,
    /// Maximum memory the Lua state may allocate, in bytes. None = unlimited.
    pub max_memory: Option<usize>,
    /// Accept precompiled chunks instead of rejecting them.
    ///
    /// Deployment-time capability flag; only enable it when the selected
    /// runtime is known to verify bytecode safely.
    pub allow_bytecode: bool,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            default_quota: DEFAULT_QUOTA,
            max_memory: None,
            allow_bytecode: false,
        }
    }
}

impl SandboxConfig {
    /// Create a new builder for SandboxConfig.
    pub fn builder() -> SandboxConfigBuilder {
        SandboxConfigBuilder::default()
    }
}

/// Builder for creating SandboxConfig instances.
#[derive(Debug, Clone, Default)]
pub struct SandboxConfigBuilder {
    default_quota: Option<u32>,
    max_memory: Option<usize>,
    allow_bytecode: Option<bool>,
}

impl SandboxConfigBuilder {
    /// Set the default instruction budget.
    pub fn default_quota(mut self, quota: u32) -> Self {
        self.default_quota = Some(quota);
        self
    }

    /// Set the maximum memory limit in bytes.
    pub fn max_memory(mut self, bytes: usize) -> Self {
        self.max_memory = Some(bytes);
        self
    }

    /// Allow precompiled chunks to be loaded.
    pub fn allow_bytecode(mut self, allow: bool) -> Self {
        self.allow_bytecode = Some(allow);
        self
    }

    /// Build the SandboxConfig.
    pub fn build(self) -> SandboxConfig {
        let default = SandboxConfig::default();
        SandboxConfig {
            default_quota: self.default_quota.unwrap_or(default.default_quota),
            max_memory: self.max_memory.or(default.max_memory),
            allow_bytecode: self.allow_bytecode.unwrap_or(default.allow_bytecode),
        }
    }
}
