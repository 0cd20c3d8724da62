//! Configuration resolved from environment variables.
//!
//! Call `dotenvy::dotenv()` before [`StackConfig::resolve`] to pick up a local
//! `.env` file.

mod helpers;
mod stack;

pub use stack::StackConfig;
