use crate::ir::{Argument, IrValue};

/// Deterministic identity of a field read: `[alias:]name[(arg:value,...)]`.
///
/// Arguments are sorted by name and `null` arguments are left out, so
/// equivalent reads agree on the key regardless of how they were written.
pub fn storage_key(alias: Option<&str>, name: &str, arguments: &[Argument]) -> String {
    let mut key = String::with_capacity(name.len() + 8);

    if let Some(alias) = alias.filter(|alias| *alias != name) {
        key.push_str(alias);
        key.push(':');
    }
    key.push_str(name);

    let mut arguments: Vec<&Argument> = arguments
        .iter()
        .filter(|arg| !matches!(&arg.value, IrValue::Constant(value) if value.is_null()))
        .collect();

    if arguments.is_empty() {
        return key;
    }
    arguments.sort_by(|a, b| a.name.cmp(&b.name));

    key.push('(');
    for (i, argument) in arguments.iter().enumerate() {
        if i > 0 {
            key.push(',');
        }
        key.push_str(&argument.name);
        key.push(':');
        key.push_str(&argument.value.canonical());
    }
    key.push(')');
    key
}
