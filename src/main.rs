//! `statlink` command line front end.
//!
//! Submits one CSV file to the analysis service and prints the projected
//! result. Status lines and logs go to stderr; stdout carries only the result.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use statlink::config::{self, Settings};
use statlink::view_model::{self, ResultView};
use statlink::{ANALYZE_TIMEOUT, HEALTH_TIMEOUT, SelectedFile, SubmissionController, SubmissionState, logging};

const SETTLE_MARGIN: Duration = Duration::from_secs(5);

#[derive(Debug)]
struct CliArgs {
    file: PathBuf,
    api_url: Option<String>,
    json: bool,
}

fn main() -> ExitCode {
    match try_main() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn try_main() -> Result<ExitCode, String> {
    let args = parse_args(std::env::args().skip(1).collect())?;
    if let Err(err) = logging::init() {
        eprintln!("Logging disabled: {err}");
    }
    let settings = load_settings(args.api_url)?;
    let base = settings.base_url().map_err(|err| err.to_string())?;
    let file = SelectedFile::from_path(&args.file)
        .map_err(|err| format!("Failed to read {}: {err}", args.file.display()))?;

    let mut controller = SubmissionController::from_settings(&settings).map_err(|err| err.to_string())?;
    controller.subscribe(|state| match state {
        SubmissionState::Succeeded(_) | SubmissionState::Failed(_) => {}
        _ => eprintln!("{}", view_model::status_text(state)),
    });
    controller.select(Some(file));
    if !settings.auto_submit {
        controller.submit();
    }

    let state = controller.wait_until_settled(HEALTH_TIMEOUT + ANALYZE_TIMEOUT + SETTLE_MARGIN);
    match state {
        SubmissionState::Succeeded(result) => {
            if args.json {
                let text = serde_json::to_string_pretty(result).map_err(|err| err.to_string())?;
                println!("{text}");
            } else {
                let view = ResultView::new(result, &base, None);
                print!("{view}");
            }
            Ok(ExitCode::SUCCESS)
        }
        SubmissionState::Failed(err) => {
            if args.json {
                let text = serde_json::to_string_pretty(err).map_err(|err| err.to_string())?;
                println!("{text}");
            }
            eprintln!("{}", view_model::status_text(state));
            Ok(ExitCode::FAILURE)
        }
        other => {
            eprintln!("Gave up waiting for the analysis ({})", view_model::status_text(other));
            Ok(ExitCode::FAILURE)
        }
    }
}

fn load_settings(api_url: Option<String>) -> Result<Settings, String> {
    let mut settings = config::load_or_default().map_err(|err| err.to_string())?;
    if let Some(url) = api_url {
        settings.base_url = url;
    }
    Ok(settings)
}

fn parse_args(args: Vec<String>) -> Result<CliArgs, String> {
    if args.iter().any(|a| a == "-h" || a == "--help") {
        return Err(help_text());
    }
    let mut file: Option<PathBuf> = None;
    let mut api_url = None;
    let mut json = false;

    let mut i = 0;
    while i < args.len() {
        let arg = &args[i];
        match arg.as_str() {
            "--api-url" => {
                api_url = Some(next_value(&args, &mut i, "--api-url")?);
            }
            "--json" => {
                json = true;
            }
            unknown if unknown.starts_with('-') => {
                return Err(format!("Unknown argument '{unknown}'\n\n{}", help_text()));
            }
            path => {
                if file.replace(PathBuf::from(path)).is_some() {
                    return Err(format!("Only one file can be submitted\n\n{}", help_text()));
                }
            }
        }
        i += 1;
    }

    let file = file.ok_or_else(|| format!("Missing <FILE>\n\n{}", help_text()))?;
    Ok(CliArgs { file, api_url, json })
}

fn next_value(args: &[String], i: &mut usize, name: &str) -> Result<String, String> {
    let next = args.get(*i + 1).ok_or_else(|| format!("Missing value for {name}"))?;
    *i += 1;
    Ok(next.clone())
}

fn help_text() -> String {
    format!(
        "Usage: statlink [options] <FILE>\n\n\
Submit a CSV file to the analysis service and print the result.\n\n\
Options:\n\
  --api-url <URL>   Service base URL (default: ${}, config, or {})\n\
  --json            Print the result as JSON\n\
  -h, --help        Show help\n",
        config::API_URL_ENV,
        config::DEFAULT_BASE_URL
    )
}
