//! Small helpers shared by the library and the command-line front end.
//!
//! - **URL validation**: checks the configured API endpoint before any credentials
//!   are sent to it
//! - **Text**: making server-provided titles safe and width-bounded for a terminal
//!
//! # Examples
//!
//! ```
//! use ttrss_core::util::{clean_title, fit_to_width, validate_api_url};
//!
//! let url = validate_api_url("https://rss.example.com/api/").unwrap();
//! assert_eq!(url.host_str(), Some("rss.example.com"));
//!
//! assert_eq!(clean_title("Tom &amp; Jerry"), "Tom & Jerry");
//! assert_eq!(fit_to_width("A long headline", 8), "A lon...");
//! ```

mod text;
mod url_validator;

pub use text::{clean_title, fit_to_width};
pub use url_validator::{validate_api_url, UrlValidationError};
