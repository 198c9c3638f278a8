pub mod report;
pub mod repository;
pub mod unit_of_work;

pub use report::*;
pub use repository::*;
pub use unit_of_work::*;
