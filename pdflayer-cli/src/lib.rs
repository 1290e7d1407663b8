// All core functionality is in pdflayer-core
// This CLI acts as a thin wrapper around the core library

// CLI-specific modules
pub mod output;

// Re-export core types for convenience
pub use pdflayer_core::*;
