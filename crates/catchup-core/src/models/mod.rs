//! Data models for the Catchup Feed API

mod article;
mod source;

pub use article::{Article, ArticleId};
pub use source::{CreateSourceInput, Source, SourceId, UpdateSourceInput};
