use std::process;

use hive_compiler_config::CompilerConfig;
use schemars::generate::SchemaSettings;

/// Prints the JSON schema of `compiler.config.*` files, or writes it to the
/// path given as the first argument.
fn generate() -> Result<Option<String>, String> {
    let generator = SchemaSettings::draft2020_12()
        .with(|settings| {
            settings.inline_subschemas = true;
        })
        .into_generator();
    let schema = generator.into_root_schema_for::<CompilerConfig>();
    let schema_str = serde_json::to_string_pretty(&schema)
        .map_err(|error| format!("Failed to serialize the schema: {}", error))?;

    match std::env::args().nth(1) {
        Some(output_file) => {
            std::fs::write(&output_file, schema_str)
                .map_err(|error| format!("Failed to write {}: {}", output_file, error))?;
            Ok(Some(output_file))
        }
        None => {
            println!("{}", schema_str);
            Ok(None)
        }
    }
}

pub fn main() {
    match generate() {
        Ok(Some(output_file)) => println!("JSON Schema written to {}", output_file),
        Ok(None) => {}
        Err(message) => {
            eprintln!("{}", message);
            process::exit(1);
        }
    }
}
