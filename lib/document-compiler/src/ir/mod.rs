//! Schema-bound, typed representation of documents.
//!
//! Nodes are immutable once built. Passes produce new trees and share
//! untouched subtrees through `Arc`.

mod definitions;
mod location;
mod program;
mod selection;
mod storage_key;
mod transform;
mod value;

pub use self::definitions::*;
pub use self::location::{Location, SourceId};
pub use self::program::{for_each_spread, Program};
pub use self::selection::*;
pub use self::storage_key::storage_key;
pub use self::transform::{transform_list, Transformed, TransformedValue, Transformer};
pub use self::value::{ConstantValue, IrValue, Variable};
