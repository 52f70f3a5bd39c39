//! Basic example of executing Lua snippets in the sandbox.
//!
//! Run with: cargo run --example basic_execution

use lua_sandbox_rs::prelude::*;

fn main() -> anyhow::Result<()> {
    // Configure the sandbox
    let config = SandboxConfig::builder()
        .default_quota(100_000)
        .max_memory(32 * 1024 * 1024) // 32MB
        .build();

    println!("Creating sandbox with config: {:?}", config);
    let sandbox = LuaSandbox::new(config)?;

    // Execute simple arithmetic
    println!("\n=== Test 1: Simple arithmetic ===");
    match sandbox.run::<_, _, i64>("return 1 + 1", SandboxOptions::default(), ()) {
        Ok(sum) => println!("result: {}", sum),
        Err(e) => eprintln!("Error: {}", e),
    }

    // Pass arguments and collect multiple return values
    println!("\n=== Test 2: Arguments and multiple returns ===");
    let code = "local a, b = ... return a + b, a * b";
    match sandbox.run::<_, _, (i64, i64)>(code, SandboxOptions::default(), (6, 7)) {
        Ok((sum, product)) => println!("sum: {}, product: {}", sum, product),
        Err(e) => eprintln!("Error: {}", e),
    }

    // Provide read-only values through a caller environment
    println!("\n=== Test 3: Caller environment ===");
    let env = sandbox.lua().create_table()?;
    env.set("greeting", "hello")?;
    match sandbox.run::<_, _, String>(
        "return greeting .. ', sandbox'",
        SandboxOptions::new().env(env),
        (),
    ) {
        Ok(text) => println!("result: {}", text),
        Err(e) => eprintln!("Error: {}", e),
    }

    // Compile once, call many times with private accumulated state
    println!("\n=== Test 4: Protected handle ===");
    let counter = sandbox.protect(
        "n = (n or 0) + 1 return n",
        SandboxOptions::default(),
    )?;
    for _ in 0..3 {
        match counter.call::<_, i64>(()) {
            Ok(n) => println!("count: {}", n),
            Err(e) => eprintln!("Error: {}", e),
        }
    }
    // A fresh run sees none of the handle's state
    let fresh: Option<i64> = sandbox.run("return n", SandboxOptions::default(), ())?;
    println!("visible to a fresh run: {:?}", fresh);

    Ok(())
}
