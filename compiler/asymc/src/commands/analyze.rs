//! `asym analyze <ast.json>`

use std::path::PathBuf;

use asym_analysis::{analyze_with_options, AnalysisOptions, AnalysisResult, AvgModelConfig, Method, Mode};

use super::read_file;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnalyzeOptions {
    pub mode: Mode,
    /// JSON file holding an [`AvgModelConfig`] (--avg-model=<file>)
    pub avg_model: Option<PathBuf>,
    /// `None` lets the analyzer choose (--method=<method>)
    pub method: Option<Method>,
    /// Indent the printed JSON (--pretty)
    pub pretty: bool,
}

/// Parse the options following the input path. Unknown values warn and
/// keep the default.
pub fn parse_analyze_options(args: &[String]) -> AnalyzeOptions {
    let mut options = AnalyzeOptions::default();

    for arg in args {
        if let Some(mode) = arg.strip_prefix("--mode=") {
            if let Some(m) = Mode::parse(mode) {
                options.mode = m;
            } else {
                eprintln!("warning: unknown mode '{mode}', options: worst, best, avg, all");
            }
        } else if let Some(path) = arg.strip_prefix("--avg-model=") {
            options.avg_model = Some(PathBuf::from(path));
        } else if let Some(method) = arg.strip_prefix("--method=") {
            if let Some(m) = Method::parse(method) {
                options.method = Some(m);
            } else {
                eprintln!("warning: unknown method '{method}', choosing automatically");
            }
        } else if arg == "--pretty" {
            options.pretty = true;
        } else {
            eprintln!("warning: unknown option '{arg}'");
        }
    }

    options
}

/// Analyse AST JSON text.
pub fn analyze_source(
    source: &str,
    mode: Mode,
    avg_model: Option<AvgModelConfig>,
    method: Option<Method>,
) -> Result<AnalysisResult, serde_json::Error> {
    let ast: serde_json::Value = serde_json::from_str(source)?;
    let options = AnalysisOptions {
        mode,
        avg_model,
        preferred_method: method,
    };
    Ok(analyze_with_options(&ast, &options))
}

/// Run the analysis on `path` and print the result. Returns whether the
/// analysis reported no errors.
pub fn analyze_file(path: &str, options: &AnalyzeOptions) -> bool {
    let source = read_file(path);
    let avg_model = options.avg_model.as_deref().and_then(load_avg_model);

    let result = match analyze_source(&source, options.mode, avg_model, options.method) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("'{path}' is not valid JSON: {e}");
            return false;
        }
    };
    tracing::debug!(path, ok = result.ok, rows = result.by_line.len(), "analyzed");

    let json = result.to_json();
    let printed = if options.pretty {
        serde_json::to_string_pretty(&json)
    } else {
        serde_json::to_string(&json)
    };
    match printed {
        Ok(text) => println!("{text}"),
        Err(e) => {
            eprintln!("error: cannot print result: {e}");
            return false;
        }
    }
    for err in &result.errors {
        eprintln!("error: {err}");
    }
    result.ok
}

/// The probability model at `path`; warns and falls back to uniform when it
/// cannot be read.
fn load_avg_model(path: &std::path::Path) -> Option<AvgModelConfig> {
    let display = path.display().to_string();
    let text = read_file(&display);
    match serde_json::from_str(&text) {
        Ok(config) => Some(config),
        Err(e) => {
            eprintln!("warning: ignoring average-case model '{display}': {e}");
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests;
