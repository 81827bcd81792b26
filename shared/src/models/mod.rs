//! Domain models for Stokku

mod attendance;
mod catalog;
mod item;
mod stock;
mod user;

pub use attendance::*;
pub use catalog::*;
pub use item::*;
pub use stock::*;
pub use user::*;
