//! # Lua Sandbox
//!
//! Execute untrusted Lua snippets against a restricted capability surface.
//!
//! Each engine owns an embedded Lua state (via mlua) and exposes a curated
//! base catalog of safe globals through a composed, layered scope. It
//! enforces the following boundaries:
//!
//! - **State isolation**: writes by sandboxed code land in a per-execution
//!   shadow overlay; the base catalog and any caller-supplied environment are
//!   never mutated, on any exit path.
//! - **Instruction quotas**: a configurable step budget aborts runaway code
//!   deterministically via the interpreter's count hook.
//! - **Memory limits**: an optional allocation cap on the Lua state.
//! - **Source-only input**: precompiled chunks are rejected before
//!   compilation unless explicitly allowed at deployment time.
//!
//! ## Example
//!
//! ```rust
//! use lua_sandbox_rs::prelude::*;
//!
//! # fn main() -> Result<()> {
//! let sandbox = LuaSandbox::with_defaults()?;
//!
//! let sum: i64 = sandbox.run("return 2 + 3", SandboxOptions::default(), ())?;
//! assert_eq!(sum, 5);
//!
//! // A protected handle keeps its shadow state across invocations.
//! let counter = sandbox.protect("n = (n or 0) + 1 return n", SandboxOptions::default())?;
//! assert_eq!(counter.call::<_, i64>(())?, 1);
//! assert_eq!(counter.call::<_, i64>(())?, 2);
//! # Ok(())
//! # }
//! ```
//!
//! ## Security Model
//!
//! Sandboxed code only ever sees the composed scope:
//!
//! 1. **Base catalog**: a static allow-list of safe functions and module
//!    members, copied once per engine; no `io`, `debug`, `load`, or process
//!    access.
//! 2. **Shadow overlay**: global and module-member writes are redirected into
//!    per-instance storage, so one execution cannot poison another.
//! 3. **Quota aborts are final**: the abort surfaces inside the sandbox as an
//!    ordinary error, but catching it with `pcall` does not help; the call
//!    still fails with a quota error, and `coroutine` is absent from the
//!    catalog so no code runs outside the counting hook.
//! 4. **Cooperative preemption**: the quota fires at instruction boundaries;
//!    code that never crosses one (a single non-yielding native call) cannot
//!    be interrupted by it. This is an inherent limit of hook-based
//!    cancellation, not a configuration problem.

pub mod error;
pub mod prelude;
pub mod sandbox;

// Re-export main types at crate root for convenience
pub use error::{Result, SandboxError};
pub use sandbox::config::{SandboxConfig, SandboxConfigBuilder, DEFAULT_QUOTA};
pub use sandbox::executor::{LuaSandbox, Protected, SandboxOptions};
pub use sandbox::quota::{quota_supported, Quota};
pub use sandbox::scope::GLOBALS_NAME;
