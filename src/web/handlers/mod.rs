//! Web 路由处理器

pub mod translate;
pub mod upload;

pub use translate::translate;
pub use upload::upload;
