pub mod price_observation;

pub use price_observation::*;
