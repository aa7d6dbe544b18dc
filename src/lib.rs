pub mod config;
pub mod context;
pub mod convert;
pub mod dispatch;
pub mod document;
pub mod ead;
pub mod error;
pub mod normalize;
pub mod path;
pub mod record;

pub use config::{ConversionConfig, NoteConfig, NoteShape, Profile};
pub use convert::{Converter, Owner, Session};
pub use dispatch::{Outcome, RuleRegistry};
pub use document::{parse, parse_fragment, Element, Node};
pub use error::{ConversionError, Result};
pub use normalize::normalize;
pub use record::{DanglingReference, RecordGraph, RecordKind, ReferenceKind};

pub const VERSION: &'static str = env!("CARGO_PKG_VERSION");
