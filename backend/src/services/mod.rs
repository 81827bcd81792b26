//! Business logic services for Stokku

pub mod attendance;
pub mod auth;
pub mod catalog;
pub mod dashboard;
pub mod item;
pub mod reporting;
pub mod stock;
pub mod user;

pub use attendance::AttendanceService;
pub use auth::AuthService;
pub use catalog::CatalogService;
pub use dashboard::DashboardService;
pub use item::ItemService;
pub use reporting::ReportingService;
pub use stock::StockService;
pub use user::UserService;
