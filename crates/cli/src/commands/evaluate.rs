use std::path::Path;

use optrace_eval::{EvalOptions, VariableEvaluation};

use crate::{block_on, fail, load_overrides, load_store, OutputFormat};

pub(crate) fn cmd_evaluate(
    rulebase: &Path,
    variable: &str,
    submission: &str,
    overrides_path: Option<&Path>,
    options: EvalOptions,
    output: OutputFormat,
    quiet: bool,
) {
    let store = load_store(rulebase, output, quiet);
    let overrides = load_overrides(overrides_path, output, quiet);

    let evaluation = block_on(
        optrace_eval::evaluate(&store, variable, submission, overrides, options),
        output,
        quiet,
    );
    let evaluation = match evaluation {
        Ok(e) => e,
        Err(e) => fail(&format!("error: {}", e), output, quiet),
    };

    match output {
        OutputFormat::Json => match serde_json::to_string_pretty(&evaluation) {
            Ok(json) => println!("{}", json),
            Err(e) => fail(&format!("serialization error: {}", e), output, quiet),
        },
        OutputFormat::Text => print_text(&evaluation, quiet),
    }
}

fn print_text(evaluation: &VariableEvaluation, quiet: bool) {
    println!("{}", evaluation.value);
    if quiet {
        return;
    }
    match &evaluation.source_ref {
        Some(reference) => println!("source: {} ({})", evaluation.source_kind, reference),
        None => println!("source: {}", evaluation.source_kind),
    }
    println!("{}", evaluation.explanation);
    let log = &evaluation.resolution_log;
    println!(
        "resolved {} reference(s), {} memo hit(s)",
        log.resolved.len(),
        log.memo_hits
    );
}
