//! CLI tool for bulk font replacement and gradient fills in PowerPoint files.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use restyle_core::store::{
    load_rule_set_or_default, load_scheme_table_or_default, save_rule_set, save_scheme_table,
    DEFAULT_RULE_STORE, DEFAULT_SCHEME_STORE,
};
use restyle_core::units::canonical_size_key;
use restyle_core::{FontRule, GradientScheme, GradientStop, RunFontInfo};
use restyle_pptx::{inspect_fonts, Processor, SingleScheme, TransformOptions};
use std::path::{Path, PathBuf};

/// Replace fonts and sizes and add gradient text fills in .pptx files.
#[derive(Parser, Debug)]
#[command(name = "pptx-restyle")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply font rules and gradient schemes to presentations
    Transform(TransformArgs),
    /// List the fonts used by every text run of a presentation
    Inspect {
        /// Input .pptx file
        input: PathBuf,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Manage the font rule store
    Rules {
        /// Rule store file
        #[arg(long, default_value = DEFAULT_RULE_STORE)]
        store: PathBuf,

        #[command(subcommand)]
        action: RuleAction,
    },
    /// Manage the gradient scheme store
    Schemes {
        /// Scheme store file
        #[arg(long, default_value = DEFAULT_SCHEME_STORE)]
        store: PathBuf,

        #[command(subcommand)]
        action: SchemeAction,
    },
}

#[derive(Args, Debug)]
struct TransformArgs {
    /// Input PowerPoint file(s) (.pptx)
    #[arg(required = true)]
    input: Vec<PathBuf>,

    /// Output directory (default: same as input file)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Appended to the input file stem to name the output
    #[arg(long, default_value = "_restyled")]
    suffix: String,

    /// Font rule store
    #[arg(long, default_value = DEFAULT_RULE_STORE)]
    rules: PathBuf,

    /// Gradient scheme store; when it has entries the options below are ignored
    #[arg(long, default_value = DEFAULT_SCHEME_STORE)]
    schemes: PathBuf,

    /// Font size of the explicit gradient scheme
    #[arg(long)]
    font_size: Option<String>,

    /// Font name of the explicit gradient scheme
    #[arg(long)]
    font_name: Option<String>,

    /// Gradient stop of the explicit scheme as position:color (repeatable)
    #[arg(long = "stop", value_name = "POS:COLOR")]
    stops: Vec<String>,

    /// Also fill paragraph-end properties of gradient runs
    #[arg(long)]
    end_para: bool,
}

#[derive(Subcommand, Debug)]
enum RuleAction {
    /// List rules in evaluation order
    List,
    /// Add a rule, replacing one with the same label
    Add {
        /// Only match runs using this typeface
        #[arg(long)]
        old_font: Option<String>,

        /// Only match runs of this size in points
        #[arg(long)]
        old_size: Option<String>,

        /// Replacement typeface
        #[arg(long)]
        new_font: Option<String>,

        /// Replacement size in points
        #[arg(long)]
        new_size: Option<String>,

        /// Script slots the new typeface is written to
        #[arg(long, value_enum, value_delimiter = ',', default_values = ["latin", "ea", "cs"])]
        scripts: Vec<ScriptArg>,
    },
    /// Remove a rule by label
    Remove { label: String },
}

#[derive(Subcommand, Debug)]
enum SchemeAction {
    /// List schemes
    List,
    /// Add or replace the scheme for a font size
    Add {
        /// Font size in points
        #[arg(long)]
        font_size: String,

        /// Typeface a run must use
        #[arg(long)]
        font_name: String,

        /// Gradient stop as position:color (at least two)
        #[arg(long = "stop", value_name = "POS:COLOR", required = true)]
        stops: Vec<String>,
    },
    /// Remove the scheme for a font size
    Remove { font_size: String },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ScriptArg {
    Latin,
    Ea,
    Cs,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    match cli.command {
        Command::Transform(args) => transform(&args),
        Command::Inspect { input, json } => inspect(&input, json),
        Command::Rules { store, action } => rules(&store, action),
        Command::Schemes { store, action } => schemes(&store, action),
    }
}

/// Transform every input on its own thread.
fn transform(args: &TransformArgs) -> Result<()> {
    let single = single_scheme(args)?;
    let options = TransformOptions {
        scheme_store: Some(args.schemes.clone()),
        gradient_end_paragraph: args.end_para,
        ..Default::default()
    };
    let processor = Processor::from_rule_store(&args.rules, options);
    log::debug!("Transforming {} files", args.input.len());

    let jobs = args
        .input
        .iter()
        .map(|input| Ok((input.as_path(), output_path(input, args.output_dir.as_deref(), &args.suffix)?)))
        .collect::<Result<Vec<_>>>()?;

    let failures = std::thread::scope(|scope| {
        let handles: Vec<_> = jobs
            .iter()
            .map(|(input, output)| {
                let processor = &processor;
                let single = single.as_ref();
                scope.spawn(move || {
                    let name = file_label(input);
                    let sink = |message: &str| eprintln!("[{}] {}", name, message);
                    let ok = processor.process(input, output, single, &sink);
                    if ok {
                        log::info!("Wrote {}", output.display());
                    } else {
                        log::warn!("Skipped {}: transform failed", input.display());
                    }
                    ok
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| handle.join().unwrap_or(false))
            .filter(|ok| !ok)
            .count()
    });

    if failures > 0 {
        bail!("{} of {} files failed", failures, jobs.len());
    }
    Ok(())
}

/// The explicit gradient scheme, if any of its options was given.
fn single_scheme(args: &TransformArgs) -> Result<Option<SingleScheme>> {
    if args.font_size.is_none() && args.font_name.is_none() && args.stops.is_empty() {
        return Ok(None);
    }
    let stops = parse_stops(&args.stops)?;
    Ok(Some(SingleScheme::new(
        stops,
        args.font_size.clone().unwrap_or_default(),
        args.font_name.clone().unwrap_or_default(),
    )))
}

fn parse_stops(stops: &[String]) -> Result<Vec<GradientStop>> {
    stops
        .iter()
        .map(|s| GradientStop::parse_shorthand(s).with_context(|| format!("Invalid --stop {}", s)))
        .collect()
}

fn inspect(input: &Path, json: bool) -> Result<()> {
    let report = inspect_fonts(input)
        .with_context(|| format!("Failed to inspect {}", input.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("=== Fonts in {} ===", input.display());
    for info in &report {
        println!("{}", format_font_info(info));
    }
    Ok(())
}

fn format_font_info(info: &RunFontInfo) -> String {
    let size = info
        .size
        .map(|s| format!("{}pt", s))
        .unwrap_or_else(|| "-".to_string());
    let preview: String = info.text.chars().take(20).collect();
    format!(
        "slide {}: '{}' size {} latin '{}' ea '{}' cs '{}' fill {:?}",
        info.slide, preview, size, info.latin, info.ea, info.cs, info.fill
    )
}

fn rules(store: &Path, action: RuleAction) -> Result<()> {
    let mut rules = load_rule_set_or_default(store)
        .with_context(|| format!("Failed to load {}", store.display()))?;

    match action {
        RuleAction::List => {
            for rule in rules.iter() {
                println!("{}", rule.id);
            }
            return Ok(());
        }
        RuleAction::Add {
            old_font,
            old_size,
            new_font,
            new_size,
            scripts,
        } => {
            let mut rule = FontRule {
                old_font,
                old_size,
                new_font,
                new_size,
                apply_latin: scripts.contains(&ScriptArg::Latin),
                apply_ea: scripts.contains(&ScriptArg::Ea),
                apply_cs: scripts.contains(&ScriptArg::Cs),
                ..Default::default()
            };
            rule.id = rule.derive_label();
            rule.validate()?;
            println!("Added rule {}", rule.id);
            rules.insert(rule);
        }
        RuleAction::Remove { label } => {
            if rules.remove(&label).is_none() {
                bail!("No rule labelled '{}'", label);
            }
            println!("Removed rule {}", label);
        }
    }

    save_rule_set(&rules, store).with_context(|| format!("Failed to save {}", store.display()))
}

fn schemes(store: &Path, action: SchemeAction) -> Result<()> {
    let mut table = load_scheme_table_or_default(store)
        .with_context(|| format!("Failed to load {}", store.display()))?;

    match action {
        SchemeAction::List => {
            for (size, scheme) in table.iter() {
                let stops: Vec<String> = scheme
                    .sorted_stops()
                    .iter()
                    .map(|s| format!("{}:{}", s.position, s.color))
                    .collect();
                println!("{}pt {} [{}]", size, scheme.font_name, stops.join(", "));
            }
            return Ok(());
        }
        SchemeAction::Add {
            font_size,
            font_name,
            stops,
        } => {
            let scheme = GradientScheme::new(parse_stops(&stops)?, font_name);
            scheme.validate()?;
            table.insert(&font_size, scheme);
            println!("Saved scheme for {}pt", canonical_size_key(&font_size));
        }
        SchemeAction::Remove { font_size } => {
            if table.remove(&font_size).is_none() {
                bail!("No scheme for font size {}", font_size);
            }
            println!("Removed scheme for {}pt", canonical_size_key(&font_size));
        }
    }

    save_scheme_table(&table, store).with_context(|| format!("Failed to save {}", store.display()))
}

/// Determine the output path for a processed file.
fn output_path(input: &Path, output_dir: Option<&Path>, suffix: &str) -> Result<PathBuf> {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let filename = format!("{}{}.pptx", stem, suffix);

    let path = match output_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
            dir.join(filename)
        }
        None => match input.parent() {
            Some(parent) => parent.join(filename),
            None => PathBuf::from(filename),
        },
    };

    if path == input {
        bail!("Output would overwrite input {}", input.display());
    }
    Ok(path)
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
