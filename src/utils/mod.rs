//! Utility functions and helpers.

pub mod http;
pub mod log;
pub mod salary;
pub mod text;
pub mod url;

pub use salary::parse_salary;
pub use text::{normalize_company, normalize_phrase, normalize_whitespace, parse_posted_date};
pub use url::{build_search_url, canonicalize, extract_posting_id, get_domain};
