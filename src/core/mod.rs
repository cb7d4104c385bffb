/*!
 * Core Module
 * Synchronization primitives, error handling and shared abstractions
 */

pub mod errors;
pub mod hints;
pub mod sync;
pub mod traits;

// Re-export for convenience
pub use errors::*;
pub use traits::*;
