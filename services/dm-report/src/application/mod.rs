pub mod factories;
pub mod handlers;
pub mod mappers;
pub mod query_handlers;
pub mod requests;
pub mod service;

pub use factories::*;
pub use handlers::*;
pub use mappers::*;
pub use query_handlers::*;
pub use requests::*;
pub use service::*;
