mod ai_monitor;
mod analytics;
mod dashboard;
mod list_page;
mod pages;

pub use ai_monitor::AiMonitorView;
pub use analytics::AnalyticsView;
pub use dashboard::DashboardView;
pub use list_page::{ListPageView, PageRows};
