pub mod series;

#[allow(unused_imports)]
pub use series::*;
