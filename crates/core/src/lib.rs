pub mod config;
pub mod descriptor;
pub mod doc_types;
pub mod error;
pub mod record;
pub mod selector;

pub use config::Config;
pub use descriptor::*;
pub use doc_types::*;
pub use error::*;
pub use record::*;
pub use selector::{xpath_to_css, DEFAULT_SELECTOR};
