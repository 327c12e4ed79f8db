//! Command-line interface for rcscript
//! Parses Windows resource scripts and runs the selective preprocessor over them.
//!
//! Usage:
//!   rcscript expr `<text>`                  - Parse one expression
//!   rcscript directives `<file>`            - Split a file into directives and text blocks
//!   rcscript parse `<file>`                 - Parse already-preprocessed resource statements
//!   rcscript precompile `<rc>` [options]    - Print the selectively preprocessed text
//!   rcscript resources `<rc>` [options]     - Precompile, then parse the resource statements
//!   rcscript symbols `<rc>` [options]       - Resolve dialog control ids through project headers
//!
//! Settings come from the built-in defaults, then `rcscript.toml` in the working
//! directory (or `--config`), then flags.

mod output;

use std::collections::BTreeMap;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Arg, ArgAction, ArgMatches, Command};
use rc_config::{Loader, OutputFormat, RcConfig};
use rc_parser::{parse_directives, resolve_dialogs, DialogSymbols};
use rc_preprocess::paths::absolutize;
use rc_preprocess::{
    parse_precompiled, CancelToken, EncodingDetector, Precompiled, PrecompiledParseError,
};
use serde::Serialize;
use tracing::Level;

const DEFAULT_CONFIG_FILE: &str = "rcscript.toml";

/// Exit status for a run stopped through its cancel token.
const EXIT_CANCELLED: i32 = 130;

fn main() {
    let matches = cli().get_matches();
    init_logging(matches.get_count("verbose"));

    match matches.subcommand() {
        Some(("expr", sub)) => handle_expr_command(sub),
        Some(("directives", sub)) => handle_directives_command(sub),
        Some(("parse", sub)) => handle_parse_command(sub),
        Some(("precompile", sub)) => handle_precompile_command(sub),
        Some(("resources", sub)) => handle_resources_command(sub),
        Some(("symbols", sub)) => handle_symbols_command(sub),
        _ => unreachable!("clap requires a subcommand"),
    }
}

fn cli() -> Command {
    Command::new("rcscript")
        .version(env!("CARGO_PKG_VERSION"))
        .about("A tool for parsing and precompiling Windows resource scripts")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .value_parser(clap::value_parser!(PathBuf))
                .help("Configuration file layered over the defaults (default: ./rcscript.toml if present)"),
        )
        .arg(
            Arg::new("format")
                .long("format")
                .short('f')
                .global(true)
                .value_parser(["json", "yaml", "debug"])
                .help("Output format for parsed structures"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::Count)
                .help("Log pipeline progress to stderr (-v debug, -vv trace)"),
        )
        .subcommand(
            Command::new("expr")
                .about("Parse a single expression")
                .arg(Arg::new("text").help("Expression text, e.g. 'WS_CHILD | WS_VISIBLE'").required(true)),
        )
        .subcommand(
            Command::new("directives")
                .about("Split a file into #define, #include, other directives and text blocks")
                .arg(path_arg("file", "Header or resource script")),
        )
        .subcommand(
            Command::new("parse")
                .about("Parse resource statements from text that has no directives left")
                .arg(path_arg("file", "Preprocessed resource script")),
        )
        .subcommand(
            Command::new("precompile")
                .about("Print the resource script with includes resolved and project symbols kept")
                .arg(path_arg("rc", "Resource script"))
                .args(pipeline_args()),
        )
        .subcommand(
            Command::new("resources")
                .about("Precompile a resource script and parse its resource statements")
                .arg(path_arg("rc", "Resource script"))
                .args(pipeline_args()),
        )
        .subcommand(
            Command::new("symbols")
                .about("Resolve dialog control ids to the numbers the project headers define")
                .arg(path_arg("rc", "Resource script"))
                .args(pipeline_args()),
        )
}

fn path_arg(id: &'static str, help: &'static str) -> Arg {
    Arg::new(id)
        .help(help)
        .required(true)
        .value_parser(clap::value_parser!(PathBuf))
}

fn pipeline_args() -> Vec<Arg> {
    vec![
        Arg::new("project-dir")
            .long("project-dir")
            .short('p')
            .value_parser(clap::value_parser!(PathBuf))
            .help("Directory whose files count as project files"),
        Arg::new("include")
            .short('I')
            .long("include")
            .action(ArgAction::Append)
            .value_parser(clap::value_parser!(PathBuf))
            .help("Additional include directory"),
        Arg::new("define")
            .short('D')
            .long("define")
            .action(ArgAction::Append)
            .help("Additional preprocessor define, NAME or NAME=VALUE"),
        Arg::new("flavor")
            .long("flavor")
            .value_parser(["msvc", "gcc"])
            .help("Preprocessor command-line convention"),
        Arg::new("command")
            .long("command")
            .help("Program to run instead of the flavor's default (cl or gcc)"),
        Arg::new("expand-external")
            .long("expand-external")
            .action(ArgAction::SetTrue)
            .help("Let macros defined outside the project expand in project text"),
        Arg::new("dump-on-error")
            .long("dump-on-error")
            .value_parser(clap::value_parser!(PathBuf))
            .help("Write the precompiled text here when it fails to parse"),
    ]
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

/// Defaults, then the config file, then the flags every subcommand accepts.
fn base_loader(matches: &ArgMatches) -> Loader {
    let loader = match matches.get_one::<PathBuf>("config") {
        Some(path) => Loader::new().with_file(path),
        None => Loader::new().with_optional_file(DEFAULT_CONFIG_FILE),
    };
    match matches.get_one::<String>("format") {
        Some(format) => loader
            .set_override("output.format", format.as_str())
            .unwrap_or_else(|e| exit_with("Configuration error", &e)),
        None => loader,
    }
}

fn load_config(matches: &ArgMatches) -> RcConfig {
    base_loader(matches)
        .build()
        .unwrap_or_else(|e| exit_with("Configuration error", &e))
}

/// Configuration for the pipeline subcommands. Paths given on the command line are
/// relative to the working directory.
fn load_pipeline_config(matches: &ArgMatches) -> RcConfig {
    let cwd = std::env::current_dir().unwrap_or_else(|e| exit_with("Cannot read working directory", &e));
    let rc = matches
        .get_one::<PathBuf>("rc")
        .expect("rc is a required argument");

    let mut overrides: Vec<(&str, String)> = vec![("project.rc_file", display(&absolutize(&cwd, rc)))];
    if let Some(dir) = matches.get_one::<PathBuf>("project-dir") {
        overrides.push(("project.root", display(&absolutize(&cwd, dir))));
    }
    if let Some(flavor) = matches.get_one::<String>("flavor") {
        overrides.push(("preprocessor.flavor", flavor.clone()));
    }
    if let Some(command) = matches.get_one::<String>("command") {
        overrides.push(("preprocessor.command", command.clone()));
    }
    if matches.get_flag("expand-external") {
        overrides.push(("preprocessor.macro_policy", "expand-external".to_string()));
    }
    if let Some(path) = matches.get_one::<PathBuf>("dump-on-error") {
        overrides.push(("output.dump_on_error", display(path)));
    }

    let mut loader = base_loader(matches);
    for (key, value) in overrides {
        loader = loader
            .set_override(key, value)
            .unwrap_or_else(|e| exit_with("Configuration error", &e));
    }
    let mut config = loader
        .build()
        .unwrap_or_else(|e| exit_with("Configuration error", &e));

    if let Some(paths) = matches.get_many::<PathBuf>("include") {
        config
            .project
            .include_paths
            .extend(paths.map(|path| absolutize(&cwd, path)));
    }
    if let Some(defines) = matches.get_many::<String>("define") {
        config.project.defines.extend(defines.cloned());
    }
    config
}

fn handle_expr_command(matches: &ArgMatches) {
    let config = load_config(matches);
    let text = matches
        .get_one::<String>("text")
        .expect("text is a required argument");
    let expression = rc_parser::parse_expression(text).unwrap_or_else(|e| exit_with("Parse error", &e));
    emit(&expression, config.output.format);
}

fn handle_directives_command(matches: &ArgMatches) {
    let config = load_config(matches);
    let text = read_text(&config, required_path(matches, "file"));
    let directives = parse_directives(&text).unwrap_or_else(|e| exit_with("Parse error", &e));
    emit(&directives, config.output.format);
}

fn handle_parse_command(matches: &ArgMatches) {
    let config = load_config(matches);
    let text = read_text(&config, required_path(matches, "file"));
    let resources = rc_parser::parse_resources(&text).unwrap_or_else(|e| exit_with("Parse error", &e));
    emit(&resources, config.output.format);
}

fn handle_precompile_command(matches: &ArgMatches) {
    let config = load_pipeline_config(matches);
    let precompiled = precompile(&config);
    print!("{}", precompiled.text);
}

fn handle_resources_command(matches: &ArgMatches) {
    let config = load_pipeline_config(matches);
    let precompiled = precompile(&config);
    let resources = parse_precompiled(&precompiled).unwrap_or_else(|e| parse_failure(&config, e));
    emit(&resources, config.output.format);
}

#[derive(Debug, Serialize)]
struct SymbolReport {
    defines: BTreeMap<String, i32>,
    dialogs: Vec<DialogSymbols>,
}

fn handle_symbols_command(matches: &ArgMatches) {
    let config = load_pipeline_config(matches);
    let precompiled = precompile(&config);
    let resources = parse_precompiled(&precompiled).unwrap_or_else(|e| parse_failure(&config, e));

    let defines = precompiled
        .define_table()
        .unwrap_or_else(|e| exit_with("Parse error in project sources", &e));
    let dialogs = resolve_dialogs(&resources, &defines);
    emit(&SymbolReport { defines, dialogs }, config.output.format);
}

fn precompile(config: &RcConfig) -> Precompiled {
    let project = config
        .project_info()
        .expect("pipeline config always names the resource script");
    let cancel = CancelToken::new();
    let on_interrupt = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || on_interrupt.cancel()) {
        tracing::warn!(error = %e, "Ctrl-C will not stop the preprocessor cleanly");
    }
    config
        .precompiler()
        .unwrap_or_else(|e| exit_with("Configuration error", &e))
        .precompile(&project, &cancel)
        .unwrap_or_else(|e| {
            if e.is_cancelled() {
                std::process::exit(EXIT_CANCELLED);
            }
            exit_with("Preprocessing error", &e)
        })
}

fn parse_failure(config: &RcConfig, err: PrecompiledParseError) -> ! {
    if let Some(path) = &config.output.dump_on_error {
        match fs::write(path, &err.precompiled_text) {
            Ok(()) => eprintln!("Precompiled text dumped to '{}'", path.display()),
            Err(e) => eprintln!("Could not dump precompiled text to '{}': {}", path.display(), e),
        }
    }
    exit_with("Parse error in precompiled text", &err.error)
}

fn required_path<'a>(matches: &'a ArgMatches, id: &str) -> &'a Path {
    matches
        .get_one::<PathBuf>(id)
        .expect("path is a required argument")
}

/// Read a file as text: byte-order mark, then UTF-8, then the configured fallback code page.
fn read_text(config: &RcConfig, path: &Path) -> String {
    let bytes = fs::read(path).unwrap_or_else(|e| exit_with(&format!("Cannot read '{}'", path.display()), &e));
    config
        .detector()
        .unwrap_or_else(|e| exit_with("Configuration error", &e))
        .decode(&bytes)
        .map(|decoded| decoded.text)
        .unwrap_or_else(|e| exit_with(&format!("Cannot decode '{}'", path.display()), &e))
}

fn emit<T: Serialize + std::fmt::Debug>(value: &T, format: OutputFormat) {
    let rendered = output::render(value, format).unwrap_or_else(|e| {
        eprintln!("Error formatting output: {}", e);
        std::process::exit(1);
    });
    print!("{}", rendered);
}

fn display(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn exit_with(context: &str, err: &dyn Error) -> ! {
    eprintln!("{}: {}", context, err);
    let mut source = err.source();
    while let Some(cause) = source {
        eprintln!("  caused by: {}", cause);
        source = cause.source();
    }
    std::process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_definition_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn pipeline_flags_reach_subcommand_matches() {
        let matches = cli()
            .try_get_matches_from([
                "rcscript",
                "symbols",
                "app.rc",
                "-I",
                "inc",
                "-I",
                "../sdk",
                "-D",
                "_UNICODE",
                "--expand-external",
                "--format",
                "yaml",
            ])
            .expect("arguments to parse");
        let (name, sub) = matches.subcommand().expect("subcommand");
        assert_eq!(name, "symbols");
        let includes: Vec<&PathBuf> = sub.get_many::<PathBuf>("include").expect("includes").collect();
        assert_eq!(includes, [&PathBuf::from("inc"), &PathBuf::from("../sdk")]);
        assert!(sub.get_flag("expand-external"));
        assert_eq!(sub.get_one::<String>("format").map(String::as_str), Some("yaml"));
    }

    #[test]
    fn parse_subcommand_rejects_pipeline_flags() {
        let result = cli().try_get_matches_from(["rcscript", "parse", "app.rc", "--expand-external"]);
        assert!(result.is_err());
    }
}
