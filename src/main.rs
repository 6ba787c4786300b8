//! objcdoc: dump the documentation model of C, C++ and Objective-C sources.
//!
//! - **file mode**: `objcdoc -f outline include/ src/*.m`
//! - **stdin mode**: `objcdoc --stdin-filename Foo.h < Foo.h`

use anyhow::{Context, Result};
use clap::Parser;
use objcdoc::comment::PlainParser;
use objcdoc::frontend::{self, SUPPORTED_EXTENSIONS};
use objcdoc::render;
use objcdoc::{Diagnostic, EntityKind, Settings, SourceParser, Store};
use std::fmt::Display;
use std::fs;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "objcdoc",
    version,
    about = "Extract a documentation model from C, C++ and Objective-C sources"
)]
struct Cli {
    /// Input files, directories or glob patterns. If omitted, reads from stdin.
    files: Vec<String>,

    /// Write the dump to this file instead of stdout
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Output format: json (default) or outline
    #[arg(short = 'f', long, default_value = "json")]
    format: String,

    /// Argument passed to the compiler front-end (-I, -D, -std=...).
    /// Can be specified multiple times.
    #[arg(short = 'X', long = "clang-arg", allow_hyphen_values = true)]
    clang_args: Vec<String>,

    /// Skip files whose path matches this glob or contains this component
    #[arg(long)]
    ignore: Vec<String>,

    /// Drop entities of this kind, e.g. macro or enum-value
    #[arg(long = "ignore-kind")]
    ignore_kinds: Vec<String>,

    /// Remove classes, functions and other objects without documentation
    #[arg(long)]
    skip_undocumented_objects: bool,

    /// Remove methods, properties and enum values without documentation
    #[arg(long)]
    skip_undocumented_members: bool,

    /// Warn about every undocumented node
    #[arg(long)]
    warn_undocumented: bool,

    /// Compiler front-end: auto (libclang when installed, else scan),
    /// libclang or scan
    #[arg(long, default_value = "auto")]
    frontend: String,

    /// Keep comment text as written instead of reading @param, @return, ...
    #[arg(long)]
    plain_comments: bool,

    /// File name used for stdin input (selects the language)
    #[arg(long, default_value = "stdin.h")]
    stdin_filename: String,

    /// Increase log verbosity (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = build_settings(&cli)?;
    let mut parser =
        SourceParser::new(settings).with_frontend(frontend::create_frontend(&cli.frontend)?);
    if cli.plain_comments {
        parser = parser.with_comment_parser(Box::new(PlainParser));
    }
    let renderer = render::create_renderer(&cli.format)?;

    let mut store = Store::new();
    if cli.files.is_empty() {
        stdin_mode(&cli, &parser, &mut store)?;
    } else {
        file_mode(&cli, &parser, &mut store)?;
    }

    let unresolved = parser.finish(&mut store);
    tracing::info!(
        "{} root nodes, {} unresolved categories, {} diagnostics",
        store.roots().count(),
        unresolved,
        store.diagnostics().len()
    );

    let output = renderer.render(&store)?;
    match &cli.output {
        Some(path) => fs::write(path, &output)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => print!("{}", output),
    }
    Ok(())
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_target(false)
        .without_time()
        .init();
}

fn build_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = Settings {
        clang_arguments: cli.clang_args.clone(),
        keep_undocumented_objects: !cli.skip_undocumented_objects,
        keep_undocumented_members: !cli.skip_undocumented_members,
        warn_undocumented: cli.warn_undocumented,
        ..Settings::default()
    };
    for pattern in &cli.ignore {
        settings
            .ignore_path(pattern)
            .with_context(|| format!("invalid ignore pattern: {}", pattern))?;
    }
    for name in &cli.ignore_kinds {
        let kind = EntityKind::from_name(name).with_context(|| format!("unknown kind: {}", name))?;
        settings.ignore_kind(kind);
    }
    Ok(settings)
}

/// stdin mode: one translation unit named by --stdin-filename.
fn stdin_mode(cli: &Cli, parser: &SourceParser, store: &mut Store) -> Result<()> {
    let mut input = String::new();
    io::stdin()
        .read_to_string(&mut input)
        .context("failed to read stdin")?;
    parser
        .parse(&input, &cli.stdin_filename, store)
        .with_context(|| format!("failed to parse {}", cli.stdin_filename))?;
    Ok(())
}

/// file mode: every input file into one store. A file that cannot be read
/// or parsed is reported and skipped.
fn file_mode(cli: &Cli, parser: &SourceParser, store: &mut Store) -> Result<()> {
    let input_files = expand_globs(&cli.files)?;
    for path in &input_files {
        let name = path.to_string_lossy();
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                skip_file(store, &name, e);
                continue;
            }
        };
        if let Err(e) = parser.parse(&content, &name, store) {
            skip_file(store, &name, e);
        }
    }
    Ok(())
}

fn skip_file(store: &mut Store, name: &str, error: impl Display) {
    let diagnostic = Diagnostic::error(None, format!("skipping {}: {}", name, error));
    tracing::error!("{}", diagnostic.message);
    store.report(diagnostic);
}

/// Expand glob patterns into a list of real file paths.
/// Also handles bare directory paths by scanning for supported file types.
fn expand_globs(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for pattern in patterns {
        let path = Path::new(pattern);
        if path.is_file() {
            files.push(path.to_path_buf());
            continue;
        }
        // directories are scanned non-recursively
        if path.is_dir() {
            let entries = fs::read_dir(path)
                .with_context(|| format!("failed to read directory: {}", path.display()))?;
            for entry in entries.flatten() {
                let p = entry.path();
                let supported = p
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext));
                if p.is_file() && supported {
                    files.push(p);
                }
            }
            continue;
        }
        let matches: Vec<_> = glob::glob(pattern)
            .with_context(|| format!("invalid glob pattern: {}", pattern))?
            .filter_map(|r| r.ok())
            .filter(|p| p.is_file())
            .collect();
        if matches.is_empty() {
            tracing::warn!("no files matched: {}", pattern);
        }
        files.extend(matches);
    }
    // sorted for deterministic output
    files.sort();
    files.dedup();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("objcdoc").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn settings_from_flags() {
        let cli = cli(&[
            "-X",
            "-DDEBUG=1",
            "--clang-arg",
            "-Iinclude",
            "--ignore",
            "Pods",
            "--ignore-kind",
            "macro",
            "--skip-undocumented-members",
            "Foo.h",
        ]);
        let settings = build_settings(&cli).unwrap();
        assert_eq!(settings.clang_arguments, vec!["-DDEBUG=1", "-Iinclude"]);
        assert!(!settings.includes_path("Pods/x.h"));
        assert!(!settings.includes_kind(EntityKind::Macro));
        assert!(settings.keep_undocumented_objects);
        assert!(!settings.keep_undocumented_members);
        assert_eq!(cli.files, vec!["Foo.h"]);
    }

    #[test]
    fn libclang_is_preferred_by_default() {
        let cli = cli(&["Foo.h"]);
        assert_eq!(cli.frontend, "auto");
        assert!(!cli.plain_comments);
    }

    #[test]
    fn unknown_kind_is_an_error() {
        assert!(build_settings(&cli(&["--ignore-kind", "klass"])).is_err());
    }

    #[test]
    fn directories_expand_to_sources() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("B.m"), "").unwrap();
        fs::write(dir.path().join("A.h"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();
        let files = expand_globs(&[dir.path().to_string_lossy().to_string()]).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["A.h", "B.m"]);
    }

    #[test]
    fn globs_are_sorted_and_deduplicated() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Foo.h"), "").unwrap();
        let pattern = dir.path().join("*.h").to_string_lossy().to_string();
        let files = expand_globs(&[pattern.clone(), pattern]).unwrap();
        assert_eq!(files.len(), 1);
    }
}
