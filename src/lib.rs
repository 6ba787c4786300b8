//! objcdoc: extract a documentation model from C-family sources.
//!
//! A [`Tokenizer`] walks one translation unit and yields entities with their
//! raw documentation comments. A [`SourceParser`] drives one tokenizer per
//! file, resolves nesting and merges duplicates into a shared [`Store`].
//!
//! ```
//! use objcdoc::{EntityKind, Settings, SourceParser, Store};
//!
//! let parser = SourceParser::new(Settings::default());
//! let mut store = Store::new();
//! parser.parse("@interface Foo @end", "Foo.h", &mut store).unwrap();
//! parser.parse("@interface Foo (Bar) - (void)baz; @end", "Foo+Bar.m", &mut store).unwrap();
//! parser.finish(&mut store);
//!
//! let foo = store.root(EntityKind::Interface, "Foo").unwrap();
//! assert!(foo.child(EntityKind::Category, "Bar").is_some());
//! ```

pub mod comment;
pub mod error;
pub mod frontend;
pub mod lexer;
pub mod model;
pub mod parser;
pub mod render;
pub mod settings;
pub mod store;
pub mod tokenizer;

pub use error::{Diagnostic, Error, Result, Severity};
pub use model::{Entity, EntityKind, Node, NodeKey};
pub use parser::{ParseSummary, SourceParser};
pub use settings::Settings;
pub use store::Store;
pub use tokenizer::Tokenizer;
