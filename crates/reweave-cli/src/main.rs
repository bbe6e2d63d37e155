use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use similar::TextDiff;
use tracing::{info, warn};

use reweave_core::config::{MergeGranularity, Settings};
use reweave_core::document::DocRole;
use reweave_core::engine::MergeEngine;
use reweave_core::generator::{HandlebarsGenerator, TemplateExpander};
use reweave_core::history::{GitHistory, HistoryResolver};
use reweave_core::location::LineIndex;
use reweave_core::logging::init_logging;
use reweave_core::parser::Language;
use reweave_core::reconcile::Reconciliation;

#[derive(Parser)]
#[command(
    name = "reweave",
    about = "Merges regenerated code fragments into hand-edited files"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a settings file; command-line flags override its values
    #[arg(long, default_value = "reweave.json")]
    settings: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Regenerate a fragment and merge it into its target file
    Merge {
        #[command(flatten)]
        args: MergeArgs,

        /// Rewrite the target file in place
        #[arg(long)]
        write: bool,

        /// Print the merged result without touching the file (default)
        #[arg(long, conflicts_with = "write")]
        dry_run: bool,
    },
    /// Show the edits a merge would make, without applying them
    Preview {
        #[command(flatten)]
        args: MergeArgs,
    },
    /// List the matchable units of one document
    Inspect {
        /// Document to inspect
        #[arg(long)]
        file: PathBuf,

        /// Unit granularity (file, line, declaration)
        #[arg(long)]
        granularity: Option<MergeGranularity>,

        /// Source language; inferred from the file extension when omitted
        #[arg(long)]
        language: Option<Language>,
    },
}

#[derive(Args)]
struct MergeArgs {
    /// Target file the fragment merges into
    #[arg(long)]
    file: PathBuf,

    /// Handlebars template that produces the fragment
    #[arg(long)]
    template: PathBuf,

    /// JSON input model fed to the template
    #[arg(long)]
    input: PathBuf,

    /// Revision the previous template and input are read from
    #[arg(long)]
    revision: Option<String>,

    /// Unit granularity (file, line, declaration)
    #[arg(long)]
    granularity: Option<MergeGranularity>,

    /// Source language; inferred from the target extension when omitted
    #[arg(long)]
    language: Option<Language>,

    /// Repository root for history lookups
    #[arg(long)]
    repo: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    init_logging()?;
    let cli = Cli::parse();

    match &cli.command {
        Commands::Merge { args, write, .. } => cmd_merge(&cli, args, *write),
        Commands::Preview { args } => cmd_preview(&cli, args),
        Commands::Inspect {
            file,
            granularity,
            language,
        } => cmd_inspect(&cli, file, *granularity, *language),
    }
}

/// Everything a merge needs, gathered from disk and history.
struct MergeInputs {
    settings: Settings,
    current: String,
    new_fragment: String,
    previous_template: Option<String>,
    previous_input: Option<String>,
}

fn prepare(cli: &Cli, args: &MergeArgs) -> anyhow::Result<MergeInputs> {
    let settings = effective_settings(cli, args)?;
    let current = read_or_empty(&args.file)?;
    let template = std::fs::read_to_string(&args.template)?;
    let input = std::fs::read_to_string(&args.input)?;

    let generator = HandlebarsGenerator::new();
    let new_fragment = generator.generate(&template, &input)?;

    let root = settings
        .history
        .repo_root
        .clone()
        .unwrap_or_else(|| PathBuf::from("."));
    let history = GitHistory::new(root);
    let revision = settings.history.revision.clone();
    let previous_template = history.fetch(&revision, &args.template)?;
    let previous_input = history.fetch(&revision, &args.input)?;
    if previous_template.is_none() || previous_input.is_none() {
        warn!(
            revision = %revision,
            "no previous generation in history; the merge will only add"
        );
    }

    Ok(MergeInputs {
        settings,
        current,
        new_fragment,
        previous_template,
        previous_input,
    })
}

fn cmd_merge(cli: &Cli, args: &MergeArgs, write: bool) -> anyhow::Result<()> {
    let inputs = prepare(cli, args)?;
    let engine = MergeEngine::new(inputs.settings);
    let merged = engine.merge(
        &inputs.current,
        &inputs.new_fragment,
        inputs.previous_template.as_deref(),
        inputs.previous_input.as_deref(),
    )?;

    if write {
        write_atomic(&args.file, &merged)?;
        info!(file = %args.file.display(), "merged");
    } else {
        print!("{merged}");
    }
    Ok(())
}

fn cmd_preview(cli: &Cli, args: &MergeArgs) -> anyhow::Result<()> {
    let inputs = prepare(cli, args)?;
    let engine = MergeEngine::new(inputs.settings);
    let previous = engine.reconstruct_previous(
        inputs.previous_template.as_deref(),
        inputs.previous_input.as_deref(),
    )?;
    let reconciliation =
        engine.preview_texts(&inputs.current, &inputs.new_fragment, previous.as_deref())?;
    if reconciliation.is_empty() {
        println!("nothing to change");
        return Ok(());
    }
    print_edits(&reconciliation, &inputs.current, &inputs.new_fragment);

    let merged =
        engine.merge_texts(&inputs.current, &inputs.new_fragment, previous.as_deref())?;
    let diff = TextDiff::from_lines(inputs.current.as_str(), merged.as_str());
    println!();
    print!(
        "{}",
        diff.unified_diff()
            .context_radius(3)
            .header("current", "merged")
    );
    Ok(())
}

fn cmd_inspect(
    cli: &Cli,
    file: &Path,
    granularity: Option<MergeGranularity>,
    language: Option<Language>,
) -> anyhow::Result<()> {
    let mut settings = load_settings(&cli.settings)?;
    if let Some(g) = granularity {
        settings.granularity = g;
    }
    if let Some(l) = language {
        settings.language = Some(l);
    }
    if settings.language.is_none() {
        settings.language = Language::from_path(file);
    }

    let text = std::fs::read_to_string(file)?;
    let engine = MergeEngine::new(settings);
    let doc = engine.parse_document(&text, DocRole::Current)?;
    let units = doc.descendants(0);
    if units.is_empty() {
        println!("no matchable units");
        return Ok(());
    }
    for id in units {
        let node = doc.node(id);
        let mut depth = 0usize;
        let mut cursor = node.parent;
        while let Some(p) = cursor {
            depth += 1;
            cursor = doc.node(p).parent;
        }
        println!(
            "{:indent$}{} [{}]  {}",
            "",
            node.kind,
            node.location,
            node.signature,
            indent = (depth - 1) * 2
        );
    }
    Ok(())
}

fn print_edits(reconciliation: &Reconciliation, current: &str, fragment: &str) {
    let current_index = LineIndex::new(current);
    let fragment_index = LineIndex::new(fragment);
    for (_, e) in &reconciliation.insertions {
        println!(
            "insert   at {}  +{}b",
            e.to,
            fragment_index.byte_range(&e.from).len()
        );
    }
    for (_, e) in &reconciliation.deletions {
        println!(
            "delete   {}  -{}b",
            e.to,
            current_index.byte_range(&e.to).len()
        );
    }
    for (_, e) in &reconciliation.replacements {
        println!(
            "replace  {}  -{}b +{}b",
            e.to,
            current_index.byte_range(&e.to).len(),
            fragment_index.byte_range(&e.from).len()
        );
    }
}

fn load_settings(path: &Path) -> anyhow::Result<Settings> {
    if path.exists() {
        Settings::load(path)
    } else {
        Ok(Settings::default())
    }
}

fn effective_settings(cli: &Cli, args: &MergeArgs) -> anyhow::Result<Settings> {
    let mut settings = load_settings(&cli.settings)?;
    if let Some(g) = args.granularity {
        settings.granularity = g;
    }
    if let Some(l) = args.language {
        settings.language = Some(l);
    }
    if settings.language.is_none() {
        settings.language = Language::from_path(&args.file);
    }
    if let Some(revision) = &args.revision {
        settings.history.revision = revision.clone();
    }
    if let Some(repo) = &args.repo {
        settings.history.repo_root = Some(repo.clone());
    }
    Ok(settings)
}

/// The target file may not exist yet on a first generation.
fn read_or_empty(path: &Path) -> anyhow::Result<String> {
    if path.exists() {
        Ok(std::fs::read_to_string(path)?)
    } else {
        Ok(String::new())
    }
}

/// Write through a temporary file in the same directory, so the target
/// is never left half-written.
fn write_atomic(path: &Path, content: &str) -> anyhow::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.persist(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn merge_args(cli: &Cli) -> &MergeArgs {
        match &cli.command {
            Commands::Merge { args, .. } => args,
            _ => panic!("expected a merge command"),
        }
    }

    #[test]
    fn flags_override_settings_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut on_disk = Settings::default();
        on_disk.history.revision = "HEAD~3".into();
        on_disk.save(&path).unwrap();

        let cli = Cli::parse_from([
            "reweave",
            "--settings",
            path.to_str().unwrap(),
            "merge",
            "--file",
            "Person.java",
            "--template",
            "person.hbs",
            "--input",
            "person.json",
            "--revision",
            "HEAD~1",
            "--granularity",
            "line",
        ]);
        let settings = effective_settings(&cli, merge_args(&cli)).unwrap();
        assert_eq!(settings.history.revision, "HEAD~1");
        assert_eq!(settings.granularity, MergeGranularity::Line);
    }

    #[test]
    fn language_is_inferred_from_the_target_extension() {
        let cli = Cli::parse_from([
            "reweave", "merge", "--file", "Person.java", "--template", "t.hbs", "--input",
            "m.json",
        ]);
        let settings = effective_settings(&cli, merge_args(&cli)).unwrap();
        assert_eq!(settings.language, Some(Language::Java));
    }

    #[test]
    fn missing_settings_file_falls_back_to_defaults() {
        let cli = Cli::parse_from([
            "reweave",
            "--settings",
            "/nonexistent/reweave.json",
            "merge",
            "--file",
            "a.txt",
            "--template",
            "t.hbs",
            "--input",
            "m.json",
        ]);
        let settings = effective_settings(&cli, merge_args(&cli)).unwrap();
        assert_eq!(settings.granularity, MergeGranularity::Declaration);
        assert_eq!(settings.history.revision, "HEAD");
    }

    #[test]
    fn atomic_write_replaces_the_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.java");
        std::fs::write(&target, "old").unwrap();
        write_atomic(&target, "new content").unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "new content");
    }

    #[test]
    fn a_missing_target_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let absent = dir.path().join("not-there.java");
        assert_eq!(read_or_empty(&absent).unwrap(), "");
    }
}
