use std::env;
use std::process;
use std::sync::Arc;

use graphql_syntax::parse_query;
use hive_compiler_config::{load_config, log::LogFormat, CompilerConfig};
use hive_document_compiler::build::{bind, collect_signatures, BindOptions, FragmentSignatures};
use hive_document_compiler::ir::{Program, SourceId};
use hive_document_compiler::printer::print_program;
use hive_document_compiler::transforms::{transform, PassContext};
use hive_document_compiler::{
    compile_batch, load_schema, CancellationToken, Diagnostic, DocumentSource, SchemaModel,
};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

fn configure_logging(config: &CompilerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log.env_filter_str()));

    let layer = match config.log.format {
        LogFormat::PrettyTree => tracing_tree::HierarchicalLayer::new(2)
            .with_bracketed_fields(true)
            .with_deferred_spans(false)
            .with_wraparound(25)
            .with_indent_lines(true)
            .with_timer(tracing_tree::time::Uptime::default())
            .with_thread_names(false)
            .with_thread_ids(false)
            .with_targets(false)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Json => fmt::Layer::<Registry>::default()
            .json()
            .with_writer(std::io::stderr)
            .with_span_events(FmtSpan::CLOSE)
            .boxed(),
        LogFormat::PrettyCompact => fmt::Layer::<Registry>::default()
            .compact()
            .with_writer(std::io::stderr)
            .with_span_events(FmtSpan::CLOSE)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();
}

fn main() {
    let mut args: Vec<String> = env::args().collect();
    let config_path = take_flag_value(&mut args, "--config");
    let config = load_config(config_path).unwrap_or_else(|error| {
        eprintln!("{}", error);
        process::exit(1);
    });
    configure_logging(&config);

    if args.len() < 3 {
        eprintln!("Usage: compiler-dev-cli <command> <path> [...] [--config <path>]");
        process::exit(1);
    }

    match args[1].as_str() {
        "parse" => {
            let text = read_file(&args[2]);
            match parse_query(&text) {
                Ok(document) => println!("{}", document),
                Err(error) => fail(format!("{}: {}", args[2], error)),
            }
        }
        "schema" => {
            let schema = get_schema(&args[2]);
            for definition in schema.types() {
                println!("{} {}", definition.kind_name(), definition.name());
            }
        }
        "compile" => {
            let schema = get_schema(&args[2]);
            let documents: Vec<DocumentSource> = args[3..]
                .iter()
                .filter(|arg| !arg.starts_with("--"))
                .map(|path| DocumentSource::new(path.as_str(), read_file(path)))
                .collect();
            let output = compile_batch(schema, &documents, &config, &CancellationToken::new())
                .unwrap_or_else(|error| fail(error.to_string()));

            for report in &output.diagnostics {
                for diagnostic in &report.diagnostics {
                    eprintln!("{}", diagnostic);
                }
            }

            if args.contains(&"--json".into()) {
                let artifacts: Vec<_> = output.artifacts.values().collect();
                match serde_json::to_string_pretty(&artifacts) {
                    Ok(json) => println!("{}", json),
                    Err(error) => fail(error.to_string()),
                }
            } else {
                for artifact in output.artifacts.values() {
                    println!("# {} ({:?}, {})", artifact.name, artifact.kind, artifact.hash);
                    if let Some(text) = &artifact.text {
                        println!("{}", text);
                    }
                    if let Some(types) = &artifact.types {
                        println!("{}", types);
                    }
                }
            }

            if output.has_errors() {
                process::exit(1);
            }
        }
        "print" => {
            if args.len() < 5 {
                fail("Usage: compiler-dev-cli print <schema_path> <document_path> <reader|normalization|network>".to_string());
            }
            let schema = get_schema(&args[2]);
            let program = get_program(&schema, &args[3], &config);
            let passes = match args[4].as_str() {
                "reader" => &config.pipelines.reader,
                "normalization" => &config.pipelines.normalization,
                "network" => &config.pipelines.network,
                other => fail(format!("Unknown pipeline `{}`", other)),
            };
            match transform(&program, passes, &PassContext::from_config(&config)) {
                Ok(program) => println!("{}", print_program(&program)),
                Err(diagnostics) => report_and_exit(diagnostics),
            }
        }
        _ => {
            eprintln!("Unknown command. Available commands: parse, schema, compile, print");
            process::exit(1);
        }
    };
}

fn take_flag_value(args: &mut Vec<String>, flag: &str) -> Option<String> {
    let index = args.iter().position(|arg| arg == flag)?;
    if index + 1 >= args.len() {
        return None;
    }
    let value = args.remove(index + 1);
    args.remove(index);
    Some(value)
}

fn fail(message: String) -> ! {
    eprintln!("{}", message);
    process::exit(1);
}

fn report_and_exit(diagnostics: impl IntoIterator<Item = Diagnostic>) -> ! {
    for diagnostic in diagnostics {
        eprintln!("{}", diagnostic);
    }
    process::exit(1);
}

fn read_file(path: &str) -> String {
    std::fs::read_to_string(path)
        .unwrap_or_else(|error| fail(format!("Unable to read {}: {}", path, error)))
}

fn get_schema(path: &str) -> Arc<SchemaModel> {
    let sdl = read_file(path);
    match load_schema(&sdl) {
        Ok(schema) => Arc::new(schema),
        Err(error) => report_and_exit(error.diagnostics),
    }
}

fn get_program(schema: &Arc<SchemaModel>, path: &str, config: &CompilerConfig) -> Program {
    let text = read_file(path);
    let source = SourceId::new(path);
    let document =
        parse_query(&text).unwrap_or_else(|error| fail(format!("{}: {}", path, error)));

    let (collected, mut errors) = collect_signatures(&source, &document, schema);
    let mut signatures = FragmentSignatures::default();
    for signature in collected {
        if let Err(error) = signatures.insert(signature) {
            errors.push(error);
        }
    }

    let options = BindOptions {
        max_diagnostics: config.max_diagnostics,
    };
    let bound = match bind(&source, &document, schema, &signatures, options) {
        Ok(bound) if errors.is_empty() => bound,
        Ok(_) => report_and_exit(errors),
        Err(diagnostics) => report_and_exit(errors.into_iter().chain(diagnostics)),
    };

    let mut program = Program::new(schema.clone());
    for operation in bound.operations {
        program.insert_operation(Arc::new(operation));
    }
    for fragment in bound.fragments {
        program.insert_fragment(Arc::new(fragment));
    }
    program
}
