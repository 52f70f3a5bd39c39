//! Input guard rejecting precompiled chunks before compilation.

use crate::error::{Result, SandboxError};

/// First byte of a precompiled Lua chunk header (`"\x1bLua"`).
const BINARY_MARKER: u8 = 0x1b;

/// Classify the snippet before it reaches the compiler.
///
/// Runs before any instance, overlay, or hook state is created, so a rejected
/// chunk leaves no trace in the engine.
pub(crate) fn check_source(source: &[u8], allow_bytecode: bool) -> Result<()> {
    if !allow_bytecode && source.first() == Some(&BINARY_MARKER) {
        return Err(SandboxError::BinaryInputRejected);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_source_passes() {
        assert!(check_source(b"return 1 + 1", false).is_ok());
        assert!(check_source(b"", false).is_ok());
    }

    #[test]
    fn test_binary_chunk_rejected() {
        let err = check_source(b"\x1bLua\x54\x00", false).unwrap_err();
        assert!(err.is_binary_rejected());
    }

    #[test]
    fn test_deployment_flag_allows_binary() {
        assert!(check_source(b"\x1bLua\x54\x00", true).is_ok());
    }
}
