pub mod catch_panic;
pub mod fallback;
pub mod trace_exchange;
