/*!
 * Monitoring
 * Tracing setup and wait instrumentation
 */

mod tracer;

pub use tracer::{init_tracing, span_wait, try_init_tracing, WaitSpan, TRACE_JSON_ENV};
