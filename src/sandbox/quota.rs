//! Instruction quota enforcement via the interpreter's count hook.
//!
//! The hook fires at every instruction boundary and counts against the
//! budget. Exhaustion trips a flag shared with the guard before the abort is
//! raised, so a script that catches the abort with `pcall` still fails the
//! call: once tripped, every further instruction re-raises, and the guard
//! reports the exhaustion to the host after the protected call returns.
//!
//! The quota is cooperative: the hook only runs at instruction boundaries,
//! so a single native call that never yields to the interpreter cannot be
//! interrupted by this mechanism.

use std::cell::Cell;
use std::rc::Rc;

use mlua::{HookTriggers, Lua, VmState};
use thiserror::Error;

use crate::error::{Result, SandboxError};

/// Instruction budget applied to one protected call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Quota {
    /// Use the engine's configured default budget.
    #[default]
    Default,
    /// Abort after this many interpreter instructions.
    Limited(u32),
    /// Run without any instruction hook.
    Unlimited,
}

impl Quota {
    /// Resolve this policy to a concrete instruction limit, if any.
    ///
    /// An explicit limit on a runtime without count hooks is a capability
    /// mismatch and fails fast; the default budget degrades to unbounded
    /// there instead of failing every call.
    pub(crate) fn resolve(self, default_limit: u32) -> Result<Option<u32>> {
        match self {
            Quota::Unlimited => Ok(None),
            Quota::Limited(limit) => {
                if quota_supported() {
                    Ok(Some(limit.max(1)))
                } else {
                    Err(SandboxError::QuotaUnsupported)
                }
            }
            Quota::Default => {
                if quota_supported() {
                    Ok(Some(default_limit.max(1)))
                } else {
                    Ok(None)
                }
            }
        }
    }
}

/// Whether the selected Lua runtime can count and interrupt instructions.
pub fn quota_supported() -> bool {
    cfg!(not(feature = "luajit"))
}

/// Raised from inside the instruction hook when the budget runs out.
#[derive(Debug, Error)]
#[error("instruction quota of {0} exceeded")]
pub(crate) struct QuotaHit(pub u64);

/// Scoped installation of the instruction hook.
///
/// The hook is removed on drop, so it is gone on every exit path of the
/// protected call and cannot observe unrelated executions afterwards.
pub(crate) struct QuotaGuard<'a> {
    lua: &'a Lua,
    limit: u32,
    tripped: Rc<Cell<bool>>,
}

impl<'a> QuotaGuard<'a> {
    pub(crate) fn install(lua: &'a Lua, quota: Quota, default_limit: u32) -> Result<Option<Self>> {
        let Some(limit) = quota.resolve(default_limit)? else {
            return Ok(None);
        };

        #[cfg(feature = "tracing")]
        tracing::trace!(limit, "installing instruction hook");

        let tripped = Rc::new(Cell::new(false));
        let flag = Rc::clone(&tripped);
        let used = Cell::new(0u32);
        let triggers = HookTriggers {
            every_nth_instruction: Some(1),
            ..Default::default()
        };
        lua.set_hook(triggers, move |_lua, _debug| -> mlua::Result<VmState> {
            // Once tripped, every instruction re-raises, so code that caught
            // the abort cannot make progress on a fresh budget.
            if flag.get() {
                return Err(mlua::Error::external(QuotaHit(u64::from(limit))));
            }
            let count = used.get() + 1;
            used.set(count);
            if count > limit {
                flag.set(true);
                return Err(mlua::Error::external(QuotaHit(u64::from(limit))));
            }
            Ok(VmState::Continue)
        });

        Ok(Some(Self {
            lua,
            limit,
            tripped,
        }))
    }

    /// Whether the budget was exhausted at any point during the call.
    ///
    /// Checked by the caller after the protected call returns: the abort is
    /// raised as an in-language error, so sandboxed code can intercept it,
    /// but it cannot un-trip the quota.
    pub(crate) fn tripped(&self) -> bool {
        self.tripped.get()
    }

    pub(crate) fn limit(&self) -> u32 {
        self.limit
    }
}

impl Drop for QuotaGuard<'_> {
    fn drop(&mut self) {
        self.lua.remove_hook();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_unlimited() {
        assert_eq!(Quota::Unlimited.resolve(500).unwrap(), None);
    }

    #[cfg(not(feature = "luajit"))]
    #[test]
    fn test_resolve_default_and_explicit() {
        assert_eq!(Quota::Default.resolve(500).unwrap(), Some(500));
        assert_eq!(Quota::Limited(20).resolve(500).unwrap(), Some(20));
        // A zero limit still installs a hook rather than disabling it.
        assert_eq!(Quota::Limited(0).resolve(500).unwrap(), Some(1));
    }

    #[cfg(feature = "luajit")]
    #[test]
    fn test_explicit_limit_fails_without_count_hooks() {
        assert!(matches!(
            Quota::Limited(20).resolve(500),
            Err(SandboxError::QuotaUnsupported)
        ));
        assert_eq!(Quota::Default.resolve(500).unwrap(), None);
    }

    #[cfg(not(feature = "luajit"))]
    #[test]
    fn test_guard_aborts_and_removes_hook() {
        let lua = Lua::new();
        {
            let guard = QuotaGuard::install(&lua, Quota::Limited(10), 500)
                .unwrap()
                .unwrap();
            let result = lua.load("for i = 1, 1000 do end").exec();
            assert!(result.is_err());
            assert!(guard.tripped());
        }
        // Hook is gone once the guard is dropped.
        lua.load("for i = 1, 1000 do end").exec().unwrap();
    }

    #[cfg(not(feature = "luajit"))]
    #[test]
    fn test_guard_stays_tripped_when_abort_is_caught() {
        let lua = Lua::new();
        let guard = QuotaGuard::install(&lua, Quota::Limited(50), 500)
            .unwrap()
            .unwrap();
        // The script swallows the abort; the trip flag still records it.
        let _ = lua
            .load("pcall(function() for i = 1, 1000 do end end)")
            .exec();
        assert!(guard.tripped());
    }

    #[cfg(not(feature = "luajit"))]
    #[test]
    fn test_guard_untripped_within_budget() {
        let lua = Lua::new();
        let guard = QuotaGuard::install(&lua, Quota::Limited(10_000), 500)
            .unwrap()
            .unwrap();
        lua.load("for i = 1, 10 do end").exec().unwrap();
        assert!(!guard.tripped());
    }
}
