pub mod table;
pub mod value;

pub use table::*;
pub use value::*;
