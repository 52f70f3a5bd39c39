//! Demonstrates the distinct failure causes the sandbox reports.
//!
//! Run with: cargo run --example error_handling

use lua_sandbox_rs::prelude::*;

fn main() -> anyhow::Result<()> {
    let sandbox = LuaSandbox::with_defaults()?;

    // Syntax errors are caught at compile time
    println!("\n=== Test 1: Compile error ===");
    match sandbox.run::<_, _, ()>("return return", SandboxOptions::default(), ()) {
        Ok(()) => println!("unexpected success"),
        Err(e) => println!("compile error ({}): {}", e.is_compile(), e),
    }

    // Runtime errors carry the script's message
    println!("\n=== Test 2: Runtime error ===");
    match sandbox.run::<_, _, ()>("error('something broke')", SandboxOptions::default(), ()) {
        Ok(()) => println!("unexpected success"),
        Err(e) => println!("runtime error ({}): {}", e.is_runtime(), e),
    }

    // Runaway loops hit the instruction quota
    println!("\n=== Test 3: Quota exhaustion ===");
    if LuaSandbox::quota_supported() {
        match sandbox.run::<_, _, ()>(
            "for i = 1, 1000000 do end",
            SandboxOptions::new().quota(10_000),
            (),
        ) {
            Ok(()) => println!("unexpected success"),
            Err(e) => println!("quota error ({}): {}", e.is_quota_exceeded(), e),
        }
    } else {
        println!("instruction quotas unavailable on this Lua runtime");
    }

    // Catching the abort inside the script does not help
    println!("\n=== Test 4: Quota exhaustion behind pcall ===");
    if LuaSandbox::quota_supported() {
        match sandbox.run::<_, _, bool>(
            "return pcall(function() for i = 1, 1000000 do end end)",
            SandboxOptions::new().quota(10_000),
            (),
        ) {
            Ok(caught) => println!("unexpected success: {}", caught),
            Err(e) => println!("quota error ({}): {}", e.is_quota_exceeded(), e),
        }
    } else {
        println!("instruction quotas unavailable on this Lua runtime");
    }

    // Precompiled chunks are refused before anything runs
    println!("\n=== Test 5: Binary input ===");
    match sandbox.run::<_, _, ()>(&b"\x1bLua"[..], SandboxOptions::default(), ()) {
        Ok(()) => println!("unexpected success"),
        Err(e) => println!("guard error ({}): {}", e.is_binary_rejected(), e),
    }

    // Unavailable capabilities resolve to nil rather than raising
    println!("\n=== Test 6: Restricted surface ===");
    let io_present: bool = sandbox.run("return io ~= nil", SandboxOptions::default(), ())?;
    println!("io visible inside the sandbox: {}", io_present);

    Ok(())
}
