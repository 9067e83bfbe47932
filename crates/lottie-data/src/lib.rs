pub mod load;
pub mod model;

pub use load::{parse, ParseError};
