//! Core execution engine for the Lua sandbox.

use mlua::{ChunkMode, FromLuaMulti, Function, IntoLuaMulti, Lua, Table};

use crate::error::{Result, SandboxError};
use crate::sandbox::catalog;
use crate::sandbox::config::SandboxConfig;
use crate::sandbox::guard;
use crate::sandbox::quota::{self, Quota, QuotaGuard};
use crate::sandbox::scope::Instance;

/// Per-call options for `run` and `protect`.
#[derive(Debug, Clone, Default)]
pub struct SandboxOptions {
    /// Caller-supplied environment table, consulted before the base catalog.
    ///
    /// The caller keeps ownership; the sandbox reads it by reference and
    /// never mutates it.
    pub env: Option<Table>,
    /// Instruction budget for the call.
    pub quota: Quota,
}

impl SandboxOptions {
    /// Create options with the default quota and no environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the caller-supplied environment.
    pub fn env(mut self, env: Table) -> Self {
        self.env = Some(env);
        self
    }

    /// Set an explicit instruction budget.
    pub fn quota(mut self, limit: u32) -> Self {
        self.quota = Quota::Limited(limit);
        self
    }

    /// Disable the instruction budget entirely.
    pub fn no_quota(mut self) -> Self {
        self.quota = Quota::Unlimited;
        self
    }
}

/// A sandboxed Lua execution engine.
///
/// Owns one Lua state and one base catalog. Executions through the same
/// engine share the catalog but never each other's writes: every `run` gets a
/// fresh shadow overlay, and every `protect` handle gets its own persistent
/// one.
pub struct LuaSandbox {
    config: SandboxConfig,
    lua: Lua,
    base: Table,
}

impl LuaSandbox {
    /// Create a new sandbox engine with the given configuration.
    pub fn new(config: SandboxConfig) -> Result<Self> {
        let lua = Lua::new();

        if let Some(limit) = config.max_memory {
            lua.set_memory_limit(limit).map_err(|e| {
                SandboxError::RuntimeInit(anyhow::anyhow!("failed to set memory limit: {}", e))
            })?;
        }

        let base = catalog::build(&lua).map_err(|e| {
            SandboxError::RuntimeInit(anyhow::anyhow!("failed to build base catalog: {}", e))
        })?;
        catalog::scrub_string_library(&lua).map_err(|e| {
            SandboxError::RuntimeInit(anyhow::anyhow!("failed to scrub string library: {}", e))
        })?;

        Ok(Self { config, lua, base })
    }

    /// Create a sandbox engine with the default configuration.
    pub fn with_defaults() -> Result<Self> {
        Self::new(SandboxConfig::default())
    }

    /// Access the underlying Lua state, e.g. to build environment tables.
    pub fn lua(&self) -> &Lua {
        &self.lua
    }

    /// Whether this engine rejects precompiled chunks.
    pub fn bytecode_blocked(&self) -> bool {
        !self.config.allow_bytecode
    }

    /// Whether the selected Lua runtime supports instruction quotas.
    pub fn quota_supported() -> bool {
        quota::quota_supported()
    }

    /// Execute a snippet once and discard all of its shadow state.
    ///
    /// `args` are passed to the chunk as `...`; the chunk's return values are
    /// preserved in order (bind to a tuple or `MultiValue` for more than
    /// one). Any runtime error, quota abort, or guard rejection is returned
    /// as a [`SandboxError`], and the base catalog is left untouched on every
    /// path.
    pub fn run<S, A, R>(&self, source: S, options: SandboxOptions, args: A) -> Result<R>
    where
        S: AsRef<[u8]>,
        A: IntoLuaMulti,
        R: FromLuaMulti,
    {
        guard::check_source(source.as_ref(), self.config.allow_bytecode)?;
        let instance = Instance::compose(&self.lua, &self.base, options.env)
            .map_err(SandboxError::from_lua)?;
        let function = self.compile(source.as_ref(), &instance)?;
        invoke(
            &self.lua,
            &function,
            options.quota,
            self.config.default_quota,
            args,
        )
    }

    /// Compile a snippet once and bind it to a persistent sandbox instance.
    ///
    /// The returned handle re-executes the same chunk on every call, against
    /// the same shadow overlay, with fresh quota accounting per invocation.
    pub fn protect<S>(&self, source: S, options: SandboxOptions) -> Result<Protected>
    where
        S: AsRef<[u8]>,
    {
        guard::check_source(source.as_ref(), self.config.allow_bytecode)?;
        // Capability mismatches surface here, not on the first invocation.
        options.quota.resolve(self.config.default_quota)?;
        let instance = Instance::compose(&self.lua, &self.base, options.env)
            .map_err(SandboxError::from_lua)?;
        let function = self.compile(source.as_ref(), &instance)?;
        Ok(Protected {
            lua: self.lua.clone(),
            function,
            quota: options.quota,
            default_quota: self.config.default_quota,
            _instance: instance,
        })
    }

    fn compile(&self, source: &[u8], instance: &Instance) -> Result<Function> {
        let mut chunk = self
            .lua
            .load(source)
            .set_name("sandbox")
            .set_environment(instance.scope().clone());
        if !self.config.allow_bytecode {
            chunk = chunk.set_mode(ChunkMode::Text);
        }
        chunk.into_function().map_err(SandboxError::from_lua)
    }
}

/// A compiled chunk bound to one persistent sandbox instance.
///
/// Obtained from [`LuaSandbox::protect`]. Shadow state written by one
/// invocation stays visible to later invocations of this handle and to
/// nothing else. An error on one invocation does not poison the handle.
pub struct Protected {
    lua: Lua,
    function: Function,
    quota: Quota,
    default_quota: u32,
    _instance: Instance,
}

impl std::fmt::Debug for Protected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Protected")
            .field("quota", &self.quota)
            .field("default_quota", &self.default_quota)
            .finish_non_exhaustive()
    }
}

impl Protected {
    /// Invoke the chunk with fresh quota accounting.
    pub fn call<A, R>(&self, args: A) -> Result<R>
    where
        A: IntoLuaMulti,
        R: FromLuaMulti,
    {
        invoke(
            &self.lua,
            &self.function,
            self.quota,
            self.default_quota,
            args,
        )
    }
}

/// Run a compiled chunk under the quota hook, tearing the hook down on every
/// exit path.
fn invoke<A, R>(lua: &Lua, function: &Function, quota: Quota, default_quota: u32, args: A) -> Result<R>
where
    A: IntoLuaMulti,
    R: FromLuaMulti,
{
    let hook = QuotaGuard::install(lua, quota, default_quota)?;

    #[cfg(feature = "tracing")]
    tracing::trace!("executing sandboxed chunk");

    let result = function.call::<R>(args).map_err(SandboxError::from_lua);

    // The abort surfaces inside the sandbox as an ordinary error, so a
    // `pcall` in the chunk can swallow it. The trip flag is authoritative:
    // an exhausted budget fails the call no matter what the chunk returned.
    if let Some(hook) = &hook {
        if hook.tripped() {
            return Err(SandboxError::QuotaExceeded {
                limit: u64::from(hook.limit()),
            });
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_execution() {
        let sandbox = LuaSandbox::with_defaults().unwrap();
        let sum: i64 = sandbox
            .run("return 1 + 1", SandboxOptions::default(), ())
            .unwrap();
        assert_eq!(sum, 2);
    }

    #[test]
    fn test_arguments_reach_the_chunk() {
        let sandbox = LuaSandbox::with_defaults().unwrap();
        let sum: i64 = sandbox
            .run(
                "local a, b = ... return a + b",
                SandboxOptions::default(),
                (20, 22),
            )
            .unwrap();
        assert_eq!(sum, 42);
    }

    #[test]
    fn test_compile_error_reported() {
        let sandbox = LuaSandbox::with_defaults().unwrap();
        let err = sandbox
            .run::<_, _, ()>("return return", SandboxOptions::default(), ())
            .unwrap_err();
        assert!(err.is_compile());
    }

    #[test]
    fn test_runtime_error_keeps_message() {
        let sandbox = LuaSandbox::with_defaults().unwrap();
        let err = sandbox
            .run::<_, _, ()>("error('foo')", SandboxOptions::default(), ())
            .unwrap_err();
        assert!(err.is_runtime());
        assert!(err.to_string().contains("foo"));
    }

    #[test]
    fn test_protected_handle_reuses_overlay() {
        let sandbox = LuaSandbox::with_defaults().unwrap();
        let counter = sandbox
            .protect("n = (n or 0) + 1 return n", SandboxOptions::default())
            .unwrap();

        assert_eq!(counter.call::<_, i64>(()).unwrap(), 1);
        assert_eq!(counter.call::<_, i64>(()).unwrap(), 2);
        assert_eq!(counter.call::<_, i64>(()).unwrap(), 3);

        // Not visible to a fresh run or a second handle.
        let fresh: Option<i64> = sandbox.run("return n", SandboxOptions::default(), ()).unwrap();
        assert_eq!(fresh, None);
        let other = sandbox
            .protect("n = (n or 0) + 1 return n", SandboxOptions::default())
            .unwrap();
        assert_eq!(other.call::<_, i64>(()).unwrap(), 1);
    }

    #[test]
    fn test_protected_handle_is_debuggable() {
        let sandbox = LuaSandbox::with_defaults().unwrap();
        let handle = sandbox
            .protect("return 1", SandboxOptions::default())
            .unwrap();
        let repr = format!("{handle:?}");
        assert!(repr.contains("Protected"));
        assert!(repr.contains("quota"));
    }

    #[test]
    fn test_memory_limit_is_enforced() {
        let config = SandboxConfig::builder().max_memory(1024 * 1024).build();
        let sandbox = LuaSandbox::new(config).unwrap();
        let err = sandbox
            .run::<_, _, ()>(
                "local t = {} for i = 1, 1e7 do t[i] = i end",
                SandboxOptions::new().no_quota(),
                (),
            )
            .unwrap_err();
        assert!(err.is_memory_limit());
    }
}
