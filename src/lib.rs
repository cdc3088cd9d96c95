//! Heroic datasource: turns dashboard panel queries into one Heroic
//! `/query/batch` request and turns the response back into named series.
//!
//! ```text
//! QueryRequest -> QueryCompiler -> QueryBatch -> Transport -> decode -> ResultSet
//! ```

pub mod compiler;
pub mod config;
pub mod decoder;
pub mod executor;
pub mod heroic;
pub mod model;

mod error;
mod stats;

pub use compiler::QueryCompiler;
pub use config::Config;
pub use decoder::{decode, format_name, Point, ResultSet, Series};
pub use error::{Error, Result, Stage};
pub use executor::{HeroicExecutor, HttpTransport, RawResponse, Transport};
pub use heroic::QueryBatch;
pub use model::{QueryModel, QueryRequest, TimeRange};
