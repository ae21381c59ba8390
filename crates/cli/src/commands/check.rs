use std::path::Path;
use std::process;

use optrace_eval::check_rule_base;

use crate::{load_document, OutputFormat};

pub(crate) fn cmd_check(rulebase: &Path, output: OutputFormat, quiet: bool) {
    let doc = load_document(rulebase, output, quiet);
    let issues = check_rule_base(&doc);
    let checked = doc.formulas.len() + doc.conditions.len() + doc.tables.len();

    if issues.is_empty() {
        if !quiet {
            match output {
                OutputFormat::Text => println!("valid ({} entities checked)", checked),
                OutputFormat::Json => {
                    println!("{}", serde_json::json!({ "valid": true, "checked": checked }))
                }
            }
        }
        return;
    }

    match output {
        OutputFormat::Text => {
            if !quiet {
                eprintln!("{} invalid of {} checked", issues.len(), checked);
                for issue in &issues {
                    eprintln!("  - {}", issue);
                }
            }
        }
        OutputFormat::Json => {
            let json = serde_json::json!({
                "valid": false,
                "checked": checked,
                "issues": issues,
            });
            eprintln!(
                "{}",
                serde_json::to_string_pretty(&json).unwrap_or_default()
            );
        }
    }
    process::exit(1);
}
