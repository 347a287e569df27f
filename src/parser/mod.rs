pub mod section;
pub mod table;
pub mod text;

pub use section::extract_active_section;
pub use table::{parse_section, JobRecord};
