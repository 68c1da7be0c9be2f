//! Safe SQL builder: identifiers from the registry and record shapes only, values as parameters.

mod builder;
pub mod params;
pub use builder::*;
pub use params::*;
