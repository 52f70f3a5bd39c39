//! Composed global scope: layered name resolution with write shadowing.
//!
//! Each execution gets a scope table whose metatable resolves global reads
//! through the caller environment, then the instance's shadow overlay, then
//! the base catalog. Writes never reach the catalog or the caller's tables:
//! top-level caller entries are read-only from inside the sandbox, and every
//! other write lands in the overlay. Tables reached through the chain are
//! presented behind per-instance proxies so that member writes shadow the
//! written name only, leaving siblings visible and the original untouched.
//!
//! Proxies resolve members through `__index`, which `pairs`/`next` do not
//! consult: iterating a proxied module yields only the members the sandbox
//! has shadowed, not the underlying table's contents. Keyed access is the
//! supported surface; enumeration of proxied modules is not.

use std::cell::RefCell;
use std::rc::Rc;

use mlua::{Lua, Table, Value};

/// Reserved name through which sandboxed code addresses its own global table.
///
/// A caller environment may override it with any value, including `false`;
/// that value is returned verbatim. When the environment leaves it undefined,
/// the name resolves to the live composed scope itself.
pub const GLOBALS_NAME: &str = "_G";

/// One sandbox instance: a composed scope plus its shadow overlay.
///
/// A one-shot `run` builds an instance and drops it when the call returns, so
/// overlay state never survives the call. A protected handle keeps its
/// instance alive, so overlay state accumulates across invocations of that
/// handle and nothing else.
pub(crate) struct Instance {
    scope: Table,
}

impl Instance {
    /// Build the composed scope for one instance.
    ///
    /// `base` is the engine's catalog table; `env` is the caller-supplied
    /// environment, held by reference for the duration of the instance and
    /// never cloned, so cyclic and self-referential environments resolve
    /// through the caller's own reference graph.
    pub(crate) fn compose(lua: &Lua, base: &Table, env: Option<Table>) -> mlua::Result<Self> {
        let scope = lua.create_table()?;
        let proxies = lua.create_table()?;
        // Created lazily on the first intercepted write.
        let overlay: Rc<RefCell<Option<Table>>> = Rc::new(RefCell::new(None));

        let index = {
            let env = env.clone();
            let overlay = Rc::clone(&overlay);
            let base = base.clone();
            let proxies = proxies.clone();
            lua.create_function(move |lua, (scope, key): (Table, Value)| {
                if is_globals_key(&key) {
                    if let Some(env) = &env {
                        let value: Value = env.get(key.clone())?;
                        if !value.is_nil() {
                            return Ok(value);
                        }
                    }
                    return Ok(Value::Table(scope));
                }
                if let Some(env) = &env {
                    // env.get honors the environment's own metatable chain.
                    let value: Value = env.get(key.clone())?;
                    if !value.is_nil() {
                        return wrap_value(lua, &proxies, value);
                    }
                }
                if let Some(overlay) = overlay.borrow().as_ref() {
                    let value: Value = overlay.raw_get(key.clone())?;
                    if !value.is_nil() {
                        return Ok(value);
                    }
                }
                let value: Value = base.raw_get(key)?;
                wrap_value(lua, &proxies, value)
            })?
        };

        let newindex = {
            let env = env.clone();
            let overlay = Rc::clone(&overlay);
            lua.create_function(move |lua, (_scope, key, value): (Table, Value, Value)| {
                if let Some(env) = &env {
                    let existing: Value = env.get(key.clone())?;
                    if !existing.is_nil() {
                        // Caller-owned top-level entry: silently discarded.
                        return Ok(());
                    }
                }
                let mut slot = overlay.borrow_mut();
                let overlay = match slot.as_ref() {
                    Some(table) => table.clone(),
                    None => {
                        let table = lua.create_table()?;
                        *slot = Some(table.clone());
                        table
                    }
                };
                overlay.raw_set(key, value)
            })?
        };

        let meta = lua.create_table()?;
        meta.set("__index", index)?;
        meta.set("__newindex", newindex)?;
        meta.set("__metatable", false)?;
        scope.set_metatable(Some(meta));

        Ok(Self { scope })
    }

    pub(crate) fn scope(&self) -> &Table {
        &self.scope
    }
}

fn is_globals_key(key: &Value) -> bool {
    match key {
        Value::String(s) => s.to_str().map(|s| &*s == GLOBALS_NAME).unwrap_or(false),
        _ => false,
    }
}

fn wrap_value(lua: &Lua, proxies: &Table, value: Value) -> mlua::Result<Value> {
    match value {
        Value::Table(table) => Ok(Value::Table(wrap_table(lua, proxies, table)?)),
        other => Ok(other),
    }
}

/// Return the instance's proxy for `target`, creating it on first use.
///
/// Proxies are memoized per underlying table, so repeated lookups of the same
/// table compare equal inside the sandbox and cycles terminate. Reads fall
/// through to the live target; writes land raw in the proxy, shadowing only
/// the written member.
fn wrap_table(lua: &Lua, proxies: &Table, target: Table) -> mlua::Result<Table> {
    if let Value::Table(existing) = proxies.raw_get::<Value>(target.clone())? {
        return Ok(existing);
    }

    let proxy = lua.create_table()?;
    let meta = lua.create_table()?;
    let index = {
        let target = target.clone();
        let proxies = proxies.clone();
        lua.create_function(move |lua, (_proxy, key): (Table, Value)| {
            let value: Value = target.get(key)?;
            wrap_value(lua, &proxies, value)
        })?
    };
    meta.set("__index", index)?;
    meta.set("__metatable", false)?;
    proxy.set_metatable(Some(meta));

    proxies.raw_set(target, proxy.clone())?;
    Ok(proxy)
}
