//! HTTP handlers

pub mod attendance;
pub mod auth;
pub mod catalog;
pub mod dashboard;
pub(crate) mod form;
pub mod health;
pub mod items;
pub mod stock;
pub mod users;

pub use attendance::*;
pub use auth::*;
pub use catalog::*;
pub use dashboard::*;
pub use health::*;
pub use items::*;
pub use stock::*;
pub use users::*;
