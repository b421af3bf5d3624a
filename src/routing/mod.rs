//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request path
//!     → router.rs (route lookup, most specific first)
//!     → matcher.rs (segment-aware prefix check)
//!     → Return: matched GatewayRoute or no match (404)
//!
//! Route Compilation (at startup):
//!     RouteConfig[]
//!     → Compile header rules
//!     → Sort by prefix length
//!     → Freeze as immutable RouteTable
//! ```

pub mod matcher;
pub mod router;

pub use router::{GatewayRoute, RouteTable};
