//! State module for tracking fetch progress
//!
//! # Components
//!
//! - `FetchState`: States of a single logical fetch (policy check, attempts, terminal)
//! - `FetchMachine`: Transition function driving a `FetchState` from classified attempts
//! - `Session`: Per-session shared state (proxy pool, failed proxies, robots.txt cache)

mod fetch_state;
mod machine;
mod session;

// Re-export main types
pub use fetch_state::FetchState;
pub use machine::FetchMachine;
pub use session::Session;
