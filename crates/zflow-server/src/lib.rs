// HTTP façade for the zflow service
// Routes are grouped per resource with their own AppState, the way the
// binary composes them in main.rs.

pub mod config;
pub mod flows;
pub mod templates;
