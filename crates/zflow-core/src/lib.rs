// Public contracts for the zflow service
// This crate defines ids, flow values, schemas, dynamic values, and the
// poll-outcome wire encoding shared by storage, engine, and server.

pub mod error;
pub mod flow;
pub mod ids;
pub mod outcome;
pub mod schema;
pub mod value;

pub use error::*;
pub use flow::*;
pub use ids::*;
pub use outcome::*;
pub use schema::*;
pub use value::*;
