pub mod expected;
pub mod options;
pub mod verdict;

pub use expected::*;
pub use options::*;
pub use verdict::*;
