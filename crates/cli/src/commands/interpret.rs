use std::path::Path;

use optrace_eval::{EvalOptions, TraceDetails};

use crate::{block_on, fail, load_overrides, load_store, OutputFormat};

pub(crate) fn cmd_interpret(
    rulebase: &Path,
    reference: &str,
    submission: &str,
    overrides_path: Option<&Path>,
    options: EvalOptions,
    output: OutputFormat,
    quiet: bool,
) {
    let store = load_store(rulebase, output, quiet);
    let overrides = load_overrides(overrides_path, output, quiet);

    let result = block_on(
        optrace_eval::interpret_reference(&store, reference, submission, overrides, options),
        output,
        quiet,
    );
    let result = match result {
        Ok(r) => r,
        Err(e) => fail(&format!("error: {}", e), output, quiet),
    };

    match output {
        OutputFormat::Json => match serde_json::to_string_pretty(&result) {
            Ok(json) => println!("{}", json),
            Err(e) => fail(&format!("serialization error: {}", e), output, quiet),
        },
        OutputFormat::Text => {
            println!("{}", result.result);
            if !quiet {
                println!("{}", result.human_text);
                if let TraceDetails::Failure { category, .. } = &result.details {
                    println!("failure: {:?}", category);
                }
            }
        }
    }
}
