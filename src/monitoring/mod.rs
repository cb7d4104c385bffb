/*!
 * Monitoring
 * Structured tracing setup for binaries, tests and benchmarks
 */

mod tracer;

pub use tracer::{init_tracing, span_operation, try_init_tracing, OperationSpan};
