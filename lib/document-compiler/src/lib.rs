//! Schema-aware compilation of GraphQL documents.
//!
//! Text is parsed by `graphql-syntax`, bound against a [`schema::SchemaModel`]
//! into typed IR, rewritten by configurable pass pipelines and finally
//! printed as canonical text, runtime records and type declarations.

pub mod build;
pub mod codegen;
pub mod compiler;
pub mod diagnostics;
pub mod ir;
pub mod printer;
pub mod schema;
pub mod transforms;
pub mod typegen;
pub mod utils;

#[cfg(test)]
mod tests;

pub use crate::compiler::{
    compile, compile_batch, Artifact, ArtifactKind, BatchOutput, CompilerError, DocumentSource,
};
pub use crate::diagnostics::{Diagnostic, DocumentDiagnostics, SchemaDiagnostics, Severity};
pub use crate::schema::{load_schema, SchemaModel};
pub use crate::utils::cancellation::CancellationToken;
