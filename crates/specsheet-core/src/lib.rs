pub mod config;
pub mod drive;
pub mod error;
#[cfg(any(test, feature = "test-support"))]
pub mod fakes;
pub mod identity;
pub mod index;
pub mod mail;
pub mod oauth;
pub mod prompt;
pub mod records;
pub mod search;
pub mod store;
pub mod sync;
pub mod types;

pub use error::{Result, SpecsheetError};
