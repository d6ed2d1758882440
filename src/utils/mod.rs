pub mod math;
pub mod fault_tolerance;

pub use math::*;
pub use fault_tolerance::*;
