//! Routers split by access level. Each one is mounted by `create_router`
//! behind the gate that matches it.

/// Routes open to anonymous clients: health, sign-up and login.
pub mod public;

/// Routes behind the bearer-token gate.
pub mod authenticated;

/// Routes behind the bearer-token gate plus the admin role check.
pub mod admin;
