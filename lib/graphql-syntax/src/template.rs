//! Assembly of documents embedded in host-language template literals.
//!
//! A host source may interpolate fragment references as `${Name}`; each
//! marker is replaced by a `...Name` spread before parsing.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Unknown interpolation `{0}`, expected a fragment reference")]
    UnknownInterpolation(String),
    #[error("Unterminated interpolation starting at byte {0}")]
    Unterminated(usize),
}

/// Replaces every `${Name}` marker with `...Name`.
///
/// The output has the same byte length as the input (markers are padded
/// with spaces), so spans reported on the assembled text also point into
/// the template. Markers whose content is not a single GraphQL name are
/// rejected.
pub fn assemble(template: &str) -> Result<String, TemplateError> {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;
    let mut consumed = 0;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            return Err(TemplateError::Unterminated(consumed + start));
        };

        let marker = after[..end].trim();
        if !is_name(marker) {
            return Err(TemplateError::UnknownInterpolation(marker.to_string()));
        }

        let advance = start + 2 + end + 1;
        output.push_str("...");
        output.push_str(marker);
        for _ in (start + 3 + marker.len())..advance {
            output.push(' ');
        }

        consumed += advance;
        rest = &rest[advance..];
    }

    output.push_str(rest);
    Ok(output)
}

fn is_name(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}
