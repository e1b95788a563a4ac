pub mod ai;
pub mod config;
pub mod error;
pub mod filter;
pub mod model;
pub mod repository;
pub mod storage;

pub use ai::{Gateway, ParsedTask};
pub use error::AppError;
pub use filter::{TagFilterMode, TaskFilter, filter};
pub use repository::TaskRepository;
