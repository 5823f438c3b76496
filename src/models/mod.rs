pub mod medication;
pub mod medicine;
pub mod recognition;

pub use medication::*;
pub use medicine::*;
pub use recognition::*;
