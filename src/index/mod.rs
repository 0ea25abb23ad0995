//! Feature, class and label-tuple indices

mod builder;
mod dictionary;
mod label;

pub use self::builder::{IndexBuilder, IndexOptions, Indices};
pub use self::dictionary::Index;
pub use self::label::LabelTuple;
