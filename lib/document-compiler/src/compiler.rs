//! Batch compilation of a set of documents against one schema.
//!
//! Documents are parsed and bound in parallel. Fragment cycle detection is
//! the single point where the whole batch has to be visible; after it the
//! pipelines run over one program holding every bound definition. A document
//! that fails at any stage yields no artifact while its siblings compile.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use graphql_syntax::query::{Definition, Document};
use graphql_syntax::template::{assemble, TemplateError};
use graphql_syntax::parse_query_with_limit;
use hive_compiler_config::{artifacts::FragmentCycleSeverity, pipelines::PassId, CompilerConfig};
use indexmap::IndexMap;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, instrument, warn};
use xxhash_rust::xxh3::xxh3_64;

use crate::build::{
    bind, collect_signatures, unused_variable_warnings, BindOptions, BoundDocument,
    FragmentGraph, FragmentSignatures,
};
use crate::codegen::{generate_fragment, generate_request, generate_text};
use crate::diagnostics::{
    Diagnostic, DiagnosticKind, DocumentDiagnostics, SchemaDiagnostics, Severity,
};
use crate::ir::{for_each_spread, Location, Program, SourceId};
use crate::schema::{load_schema, SchemaModel};
use crate::transforms::{transform, PassContext};
use crate::typegen::{non_null_paths, TypeGenerator};
use crate::utils::cancellation::{CancellationError, CancellationToken};

/// Upper bound on tokens per document.
const TOKEN_LIMIT: usize = 100_000;

/// A document to compile: an identifier used in diagnostics and its text.
#[derive(Debug, Clone)]
pub struct DocumentSource {
    pub id: SourceId,
    pub text: String,
}

impl DocumentSource {
    pub fn new(id: impl Into<Arc<str>>, text: impl Into<String>) -> Self {
        Self {
            id: SourceId::new(id),
            text: text.into(),
        }
    }

    /// A document embedded in a template literal, `${Name}` markers resolved
    /// to fragment spreads.
    pub fn from_template(id: impl Into<Arc<str>>, template: &str) -> Result<Self, TemplateError> {
        Ok(Self::new(id, assemble(template)?))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CompilerError {
    #[error(transparent)]
    Schema(#[from] SchemaDiagnostics),
    #[error("Compilation aborted: {0}")]
    Cancelled(#[from] CancellationError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Request,
    Fragment,
}

/// Compiled output of one operation or fragment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Artifact {
    pub name: String,
    pub kind: ArtifactKind,
    pub source: SourceId,
    /// Hex xxh3 digest of the source document text.
    pub hash: String,
    /// Runtime record, see [`crate::codegen`].
    pub runtime: serde_json::Value,
    /// Network text of operations.
    pub text: Option<String>,
    pub types: Option<String>,
    /// Non-null response paths, when extra validation is enabled.
    pub validation: Option<Vec<String>>,
}

#[derive(Debug, Default)]
pub struct BatchOutput {
    /// Artifacts by definition name, in source order.
    pub artifacts: IndexMap<String, Artifact>,
    /// Diagnostics of every document that reported any, in source order.
    pub diagnostics: Vec<DocumentDiagnostics>,
}

impl BatchOutput {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(DocumentDiagnostics::has_errors)
    }

    pub fn artifact(&self, name: &str) -> Option<&Artifact> {
        self.artifacts.get(name)
    }
}

#[derive(Debug)]
enum DocumentState {
    Unbound,
    Bound(BoundDocument),
    Failed,
}

#[derive(Debug)]
struct DocumentUnit {
    source: SourceId,
    hash: String,
    document: Option<Document>,
    state: DocumentState,
    diagnostics: Vec<Diagnostic>,
}

impl DocumentUnit {
    fn fail(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.diagnostics.extend(diagnostics);
        self.state = DocumentState::Failed;
    }

    fn is_failed(&self) -> bool {
        matches!(self.state, DocumentState::Failed)
    }

    fn bound(&self) -> Option<&BoundDocument> {
        match &self.state {
            DocumentState::Bound(bound) => Some(bound),
            _ => None,
        }
    }
}

struct PipelineOutputs {
    reader: Program,
    normalization: Program,
    network: Program,
}

/// Loads `schema_sdl` and compiles `sources` against it.
pub fn compile(
    schema_sdl: &str,
    sources: &[DocumentSource],
    config: &CompilerConfig,
    token: &CancellationToken,
) -> Result<BatchOutput, CompilerError> {
    let schema = load_schema(schema_sdl)?;
    compile_batch(Arc::new(schema), sources, config, token)
}

#[instrument(level = "debug", skip_all, fields(documents = sources.len()))]
pub fn compile_batch(
    schema: Arc<SchemaModel>,
    sources: &[DocumentSource],
    config: &CompilerConfig,
    token: &CancellationToken,
) -> Result<BatchOutput, CompilerError> {
    let mut units = parse_documents(sources, token);
    checkpoint(token, "parse")?;

    let (signatures, owners) = collect_batch_signatures(&mut units, &schema);
    checkpoint(token, "signatures")?;

    bind_documents(&mut units, &schema, &signatures, config, token);
    checkpoint(token, "bind")?;

    detect_cycles(&mut units, &signatures, &owners, config.fragment_cycle_severity);
    checkpoint(token, "cycles")?;

    let (program, outputs) = run_pipelines(&mut units, &schema, config);
    checkpoint(token, "transform")?;

    for unit in units.iter_mut() {
        let Some(bound) = unit.bound() else {
            continue;
        };
        let warnings: Vec<Diagnostic> = bound
            .operations
            .iter()
            .filter_map(|operation| program.operation(&operation.name))
            .flat_map(|operation| unused_variable_warnings(operation, &program))
            .collect();
        unit.diagnostics.extend(warnings);
    }

    let artifacts = generate_artifacts(&mut units, &schema, &outputs, config, token);
    checkpoint(token, "codegen")?;

    let diagnostics: Vec<DocumentDiagnostics> = units
        .into_iter()
        .filter(|unit| !unit.diagnostics.is_empty())
        .map(|unit| DocumentDiagnostics {
            source: unit.source,
            diagnostics: unit.diagnostics,
        })
        .collect();

    debug!(
        artifacts = artifacts.len(),
        documents_with_diagnostics = diagnostics.len(),
        "batch compiled"
    );

    Ok(BatchOutput {
        artifacts,
        diagnostics,
    })
}

fn checkpoint(token: &CancellationToken, stage: &str) -> Result<(), CancellationError> {
    token.bail_if_cancelled().inspect_err(|error| {
        warn!(stage, %error, "compilation aborted");
    })
}

fn content_hash(text: &str) -> String {
    format!("{:016x}", xxh3_64(text.as_bytes()))
}

#[instrument(level = "debug", skip_all)]
fn parse_documents(sources: &[DocumentSource], token: &CancellationToken) -> Vec<DocumentUnit> {
    let units: Vec<DocumentUnit> = sources
        .par_iter()
        .map(|source| {
            let mut unit = DocumentUnit {
                source: source.id.clone(),
                hash: content_hash(&source.text),
                document: None,
                state: DocumentState::Unbound,
                diagnostics: vec![],
            };
            if token.is_cancelled() {
                return unit;
            }
            match parse_query_with_limit(&source.text, TOKEN_LIMIT) {
                Ok(document) => unit.document = Some(document),
                Err(error) => unit.fail([Diagnostic::syntax(&source.id, &error)]),
            }
            unit
        })
        .collect();

    debug!(
        parsed = units.iter().filter(|unit| unit.document.is_some()).count(),
        "parsed documents"
    );
    units
}

/// Fragment signatures of the batch and the document defining each fragment.
/// Later definitions of a taken name fail their document.
#[instrument(level = "debug", skip_all)]
fn collect_batch_signatures(
    units: &mut [DocumentUnit],
    schema: &SchemaModel,
) -> (FragmentSignatures, HashMap<String, usize>) {
    let mut signatures = FragmentSignatures::default();
    let mut owners = HashMap::new();
    let mut operations: HashMap<String, Location> = HashMap::new();

    for (index, unit) in units.iter_mut().enumerate() {
        let Some(document) = &unit.document else {
            continue;
        };
        let mut errors = vec![];

        for definition in &document.definitions {
            let Definition::Operation(operation) = definition else {
                continue;
            };
            let (Some(name), Some(span)) = (&operation.name, operation.name_span) else {
                continue;
            };
            let location = Location::new(unit.source.clone(), span);
            match operations.get(name) {
                Some(existing) => errors.push(
                    Diagnostic::error(
                        DiagnosticKind::Binding,
                        format!("Duplicate definition of operation `{}`", name),
                        location,
                    )
                    .with_related(existing.clone()),
                ),
                None => {
                    operations.insert(name.clone(), location);
                }
            }
        }

        let (collected, diagnostics) = collect_signatures(&unit.source, document, schema);
        errors.extend(diagnostics);
        for signature in collected {
            let name = signature.name.clone();
            match signatures.insert(signature) {
                Ok(()) => {
                    owners.insert(name, index);
                }
                Err(diagnostic) => errors.push(diagnostic),
            }
        }

        if !errors.is_empty() {
            unit.fail(errors);
        }
    }

    debug!(fragments = signatures.len(), "collected fragment signatures");
    (signatures, owners)
}

#[instrument(level = "debug", skip_all)]
fn bind_documents(
    units: &mut [DocumentUnit],
    schema: &SchemaModel,
    signatures: &FragmentSignatures,
    config: &CompilerConfig,
    token: &CancellationToken,
) {
    let options = BindOptions {
        max_diagnostics: config.max_diagnostics,
    };

    units.par_iter_mut().for_each(|unit| {
        if unit.is_failed() || token.is_cancelled() {
            return;
        }
        let Some(document) = &unit.document else {
            return;
        };
        match bind(&unit.source, document, schema, signatures, options) {
            Ok(mut bound) => {
                unit.diagnostics.append(&mut bound.warnings);
                unit.state = DocumentState::Bound(bound);
            }
            Err(diagnostics) => unit.fail(diagnostics),
        }
    });

    debug!(
        bound = units.iter().filter(|unit| unit.bound().is_some()).count(),
        "bound documents"
    );
}

/// Reports every circular fragment reference on the documents defining the
/// fragments involved.
#[instrument(level = "debug", skip_all)]
fn detect_cycles(
    units: &mut [DocumentUnit],
    signatures: &FragmentSignatures,
    owners: &HashMap<String, usize>,
    severity: FragmentCycleSeverity,
) {
    let mut graph = FragmentGraph::new();
    for unit in units.iter() {
        if let Some(document) = &unit.document {
            graph.add_document(document);
        }
    }

    let cycles = graph.find_cycles();
    let mut reported = HashSet::new();
    for cycle in &cycles {
        let fragment = cycle.fragment();
        let (Some(&owner), Some(signature)) = (owners.get(fragment), signatures.get(fragment))
        else {
            continue;
        };
        // one diagnostic per document and component
        if !reported.insert((cycle.component, owner)) {
            continue;
        }

        let diagnostic = Diagnostic::error(
            DiagnosticKind::Binding,
            cycle.message(),
            signature.location.clone(),
        );
        let unit = &mut units[owner];
        match severity {
            FragmentCycleSeverity::Error => unit.fail([diagnostic]),
            FragmentCycleSeverity::Warning => unit
                .diagnostics
                .push(diagnostic.with_severity(Severity::Warning)),
        }
    }

    debug!(fragments = cycles.len(), "checked fragment cycles");
}

/// Fails bound documents spreading fragments that are no longer available,
/// until no more documents fail.
fn fail_dependents(units: &mut [DocumentUnit]) {
    loop {
        let available: HashSet<String> = units
            .iter()
            .filter_map(DocumentUnit::bound)
            .flat_map(|bound| bound.fragments.iter().map(|fragment| fragment.name.clone()))
            .collect();

        let mut changed = false;
        for unit in units.iter_mut() {
            let mut missing = vec![];
            if let Some(bound) = unit.bound() {
                let selections = bound
                    .operations
                    .iter()
                    .map(|operation| &operation.selections)
                    .chain(bound.fragments.iter().map(|fragment| &fragment.selections));
                for selections in selections {
                    for_each_spread(selections, &mut |spread| {
                        if !available.contains(&spread.fragment_name) {
                            missing.push(Diagnostic::error(
                                DiagnosticKind::Binding,
                                format!("Fragment `{}` failed to compile", spread.fragment_name),
                                spread.location.clone(),
                            ));
                        }
                    });
                }
            }
            if !missing.is_empty() {
                unit.fail(missing);
                changed = true;
            }
        }

        if !changed {
            return;
        }
    }
}

fn build_program(schema: &Arc<SchemaModel>, units: &[DocumentUnit]) -> Program {
    let mut program = Program::new(schema.clone());
    for bound in units.iter().filter_map(DocumentUnit::bound) {
        for operation in &bound.operations {
            program.insert_operation(Arc::new(operation.clone()));
        }
        for fragment in &bound.fragments {
            program.insert_fragment(Arc::new(fragment.clone()));
        }
    }
    program
}

fn run_pipeline(
    program: &Program,
    passes: &[PassId],
    config: &CompilerConfig,
) -> Result<Program, Vec<Diagnostic>> {
    transform(program, passes, &PassContext::from_config(config))
}

/// Runs the three pipelines over every bound definition.
///
/// When a pipeline fails, the documents its diagnostics point at are failed
/// and the pipelines run again over the remaining documents.
#[instrument(level = "debug", skip_all)]
fn run_pipelines(
    units: &mut [DocumentUnit],
    schema: &Arc<SchemaModel>,
    config: &CompilerConfig,
) -> (Program, PipelineOutputs) {
    let mut round = 0;
    loop {
        round += 1;
        fail_dependents(units);
        let program = build_program(schema, units);

        let pipelines = &config.pipelines;
        let (reader, (normalization, network)) = rayon::join(
            || run_pipeline(&program, &pipelines.reader, config),
            || {
                rayon::join(
                    || run_pipeline(&program, &pipelines.normalization, config),
                    || run_pipeline(&program, &pipelines.network, config),
                )
            },
        );

        let mut errors: Vec<Diagnostic> = vec![];
        let (reader, normalization, network) = match (reader, normalization, network) {
            (Ok(reader), Ok(normalization), Ok(network)) => (reader, normalization, network),
            (reader, normalization, network) => {
                for diagnostics in [reader.err(), normalization.err(), network.err()]
                    .into_iter()
                    .flatten()
                {
                    for diagnostic in diagnostics {
                        if !errors.contains(&diagnostic) {
                            errors.push(diagnostic);
                        }
                    }
                }
                debug!(round, errors = errors.len(), "pipelines failed, isolating documents");
                attribute_failures(units, errors);
                continue;
            }
        };

        debug!(
            round,
            operations = program.operation_count(),
            fragments = program.fragment_count(),
            "pipelines completed"
        );
        return (
            program,
            PipelineOutputs {
                reader,
                normalization,
                network,
            },
        );
    }
}

fn attribute_failures(units: &mut [DocumentUnit], errors: Vec<Diagnostic>) {
    let mut by_source: HashMap<SourceId, Vec<Diagnostic>> = HashMap::new();
    let mut unattributed = vec![];
    for diagnostic in errors {
        let source = diagnostic.location.as_ref().map(|location| location.source.clone());
        match source {
            Some(source)
                if units
                    .iter()
                    .any(|unit| unit.source == source && unit.bound().is_some()) =>
            {
                by_source.entry(source).or_default().push(diagnostic)
            }
            _ => unattributed.push(diagnostic),
        }
    }

    // every failing round has to fail at least one document
    if by_source.is_empty() {
        for unit in units.iter_mut().filter(|unit| unit.bound().is_some()) {
            unit.fail(unattributed.iter().cloned());
        }
        return;
    }

    for unit in units.iter_mut() {
        if let Some(diagnostics) = by_source.remove(&unit.source) {
            if unit.bound().is_some() {
                unit.fail(diagnostics);
            }
        }
    }
}

#[instrument(level = "debug", skip_all)]
fn generate_artifacts(
    units: &mut [DocumentUnit],
    schema: &SchemaModel,
    outputs: &PipelineOutputs,
    config: &CompilerConfig,
    token: &CancellationToken,
) -> IndexMap<String, Artifact> {
    let types = TypeGenerator::new(schema, config);

    let results: Vec<Option<Result<Vec<Artifact>, Diagnostic>>> = units
        .par_iter()
        .map(|unit| {
            if token.is_cancelled() {
                return None;
            }
            let bound = unit.bound()?;
            Some(unit_artifacts(unit, bound, outputs, &types, config))
        })
        .collect();

    let mut artifacts = IndexMap::new();
    for (unit, result) in units.iter_mut().zip(results) {
        match result {
            Some(Ok(unit_artifacts)) => {
                for artifact in unit_artifacts {
                    artifacts.insert(artifact.name.clone(), artifact);
                }
            }
            Some(Err(diagnostic)) => unit.fail([diagnostic]),
            None => {}
        }
    }
    artifacts
}

fn missing_output(name: &str, pipeline: &str) -> Diagnostic {
    Diagnostic::internal(
        format!("`{}` is missing from the output of the {} pipeline", name, pipeline),
        None,
    )
}

/// Every artifact of one document, or nothing.
fn unit_artifacts(
    unit: &DocumentUnit,
    bound: &BoundDocument,
    outputs: &PipelineOutputs,
    types: &TypeGenerator,
    config: &CompilerConfig,
) -> Result<Vec<Artifact>, Diagnostic> {
    let mut artifacts = vec![];

    for operation in &bound.operations {
        let name = &operation.name;
        let reader = outputs
            .reader
            .operation(name)
            .ok_or_else(|| missing_output(name, "reader"))?;
        let normalization = outputs
            .normalization
            .operation(name)
            .ok_or_else(|| missing_output(name, "normalization"))?;
        let network = outputs
            .network
            .operation(name)
            .ok_or_else(|| missing_output(name, "network"))?;

        let text = generate_text(&outputs.network, network)?;
        let request = generate_request(reader, normalization, text.clone())?;
        artifacts.push(Artifact {
            name: name.clone(),
            kind: ArtifactKind::Request,
            source: unit.source.clone(),
            hash: unit.hash.clone(),
            runtime: to_json(&request, &operation.location)?,
            text: Some(text),
            types: types.operation_types(reader),
            validation: config
                .generate_extra_validation
                .then(|| non_null_paths(&normalization.selections)),
        });
    }

    for fragment in &bound.fragments {
        let reader = outputs
            .reader
            .fragment(&fragment.name)
            .ok_or_else(|| missing_output(&fragment.name, "reader"))?;
        let record = generate_fragment(reader)?;
        artifacts.push(Artifact {
            name: fragment.name.clone(),
            kind: ArtifactKind::Fragment,
            source: unit.source.clone(),
            hash: unit.hash.clone(),
            runtime: to_json(&record, &fragment.location)?,
            text: None,
            types: types.fragment_types(reader),
            validation: config
                .generate_extra_validation
                .then(|| non_null_paths(&reader.selections)),
        });
    }

    Ok(artifacts)
}

fn to_json(value: &impl Serialize, location: &Location) -> Result<serde_json::Value, Diagnostic> {
    serde_json::to_value(value).map_err(|error| {
        Diagnostic::internal(
            format!("Failed to serialize a runtime record: {}", error),
            Some(location.clone()),
        )
    })
}
