pub mod footer;
pub mod header;
pub mod pagination;
pub mod utils;

pub use footer::draw_footer;
pub use header::{draw_header, extract_domain};
pub use pagination::pagination_line;
pub use utils::{
  action_color, confidence_color, money, order_status_color, relative_age, risk_color,
  stock_status_color, truncate,
};
