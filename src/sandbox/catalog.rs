//! Base catalog: the static allow-list of safe globals.
//!
//! Built once per engine by copying the listed names out of the freshly
//! created Lua state. Sandboxed code only ever reaches these values through
//! the composed scope, never the catalog table itself.

use mlua::{Lua, Table, Value};

/// Safe globals and module members exposed to every sandbox by default.
///
/// Deliberately absent: `load`/`require` and friends, metatable and raw
/// access primitives, `io`, `debug`, the dangerous parts of `os`,
/// `string.rep`/`string.dump`, and all of `coroutine`: the instruction hook
/// lives on the main thread, so code running inside a coroutine would
/// execute outside the quota.
const SAFE_ENTRIES: &[&str] = &[
    "_VERSION",
    "assert",
    "error",
    "ipairs",
    "next",
    "pairs",
    "pcall",
    "print",
    "select",
    "tonumber",
    "tostring",
    "type",
    "unpack",
    "xpcall",
    "math.abs",
    "math.acos",
    "math.asin",
    "math.atan",
    "math.ceil",
    "math.cos",
    "math.deg",
    "math.exp",
    "math.floor",
    "math.fmod",
    "math.huge",
    "math.log",
    "math.max",
    "math.maxinteger",
    "math.min",
    "math.mininteger",
    "math.modf",
    "math.pi",
    "math.rad",
    "math.random",
    "math.sin",
    "math.sqrt",
    "math.tan",
    "math.tointeger",
    "math.type",
    "os.clock",
    "os.date",
    "os.difftime",
    "os.time",
    "string.byte",
    "string.char",
    "string.find",
    "string.format",
    "string.gmatch",
    "string.gsub",
    "string.len",
    "string.lower",
    "string.match",
    "string.reverse",
    "string.sub",
    "string.upper",
    "table.concat",
    "table.insert",
    "table.pack",
    "table.remove",
    "table.sort",
    "table.unpack",
];

/// Copy the allow-listed names into a fresh catalog table.
///
/// Names absent from the running Lua version (`unpack` on 5.4,
/// `math.maxinteger` on 5.1) copy as nil and simply stay unset.
pub(crate) fn build(lua: &Lua) -> mlua::Result<Table> {
    let globals = lua.globals();
    let base = lua.create_table()?;
    for entry in SAFE_ENTRIES {
        match entry.split_once('.') {
            Some((module, name)) => {
                let target: Table = match base.raw_get::<Value>(module)? {
                    Value::Table(table) => table,
                    _ => {
                        let table = lua.create_table()?;
                        base.raw_set(module, table.clone())?;
                        table
                    }
                };
                let source: Table = globals.get(module)?;
                target.raw_set(name, source.get::<Value>(name)?)?;
            }
            None => base.raw_set(*entry, globals.get::<Value>(*entry)?)?,
        }
    }
    Ok(base)
}

/// Remove catalog-excluded members from the engine's own string library.
///
/// String values reach the real string library through their metatable,
/// bypassing the composed scope, so members the catalog refuses to expose
/// must also disappear from the library itself.
pub(crate) fn scrub_string_library(lua: &Lua) -> mlua::Result<()> {
    let strings: Table = lua.globals().get("string")?;
    strings.raw_set("rep", Value::Nil)?;
    strings.raw_set("dump", Value::Nil)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_contains_safe_entries() {
        let lua = Lua::new();
        let base = build(&lua).unwrap();

        assert!(!base.get::<Value>("assert").unwrap().is_nil());
        assert!(!base.get::<Value>("tostring").unwrap().is_nil());
        let string_mod: Table = base.get("string").unwrap();
        assert!(!string_mod.get::<Value>("upper").unwrap().is_nil());
        let os_mod: Table = base.get("os").unwrap();
        assert!(!os_mod.get::<Value>("time").unwrap().is_nil());
    }

    #[test]
    fn test_catalog_omits_dangerous_entries() {
        let lua = Lua::new();
        let base = build(&lua).unwrap();

        assert!(base.get::<Value>("io").unwrap().is_nil());
        assert!(base.get::<Value>("debug").unwrap().is_nil());
        assert!(base.get::<Value>("coroutine").unwrap().is_nil());
        assert!(base.get::<Value>("load").unwrap().is_nil());
        assert!(base.get::<Value>("rawset").unwrap().is_nil());
        let os_mod: Table = base.get("os").unwrap();
        assert!(os_mod.get::<Value>("execute").unwrap().is_nil());
        assert!(os_mod.get::<Value>("remove").unwrap().is_nil());
        let string_mod: Table = base.get("string").unwrap();
        assert!(string_mod.get::<Value>("rep").unwrap().is_nil());
        assert!(string_mod.get::<Value>("dump").unwrap().is_nil());
    }

    #[test]
    fn test_scrub_closes_string_metatable_path() {
        let lua = Lua::new();
        scrub_string_library(&lua).unwrap();

        let reachable: bool = lua.load("return ('x').rep ~= nil").eval().unwrap();
        assert!(!reachable);
        let dump: bool = lua.load("return ('x').dump ~= nil").eval().unwrap();
        assert!(!dump);
        // The rest of the library is still intact.
        let upper: String = lua.load("return ('x'):upper()").eval().unwrap();
        assert_eq!(upper, "X");
    }
}
