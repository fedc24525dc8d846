pub mod fs;
pub mod memory;

pub use fs::*;
pub use memory::*;
