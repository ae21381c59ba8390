use optrace_eval::{parse_reference, reference::looks_like_reference};

use crate::OutputFormat;

pub(crate) fn cmd_classify(reference: &str, output: OutputFormat) {
    let parsed = parse_reference(reference);
    match output {
        OutputFormat::Text => {
            println!("{} {}", parsed.kind, parsed.id);
        }
        OutputFormat::Json => {
            let json = serde_json::json!({
                "kind": parsed.kind,
                "id": parsed.id,
                "explicit": parsed.explicit,
                "option": parsed.option,
                "formulaReference": looks_like_reference(reference),
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&json).unwrap_or_default()
            );
        }
    }
}
