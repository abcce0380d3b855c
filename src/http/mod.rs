//! HTTP layer: routing, handlers and page rendering.

mod handlers;
mod page;
mod server;

pub use handlers::{AppError, AppState};
pub use page::{PageSource, PageTemplate};
pub use server::{router, HttpServer};
