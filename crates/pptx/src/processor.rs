//! Transform orchestration.
//!
//! A transform runs the font pass on the input, writing a working copy,
//! then the gradient pass on that copy, and finally repacks the result to
//! the output path:
//!
//! ```text
//! Idle -> FontPass -> GradientPass -> Repack -> Done
//!            (any step) -> Failed
//! ```
//!
//! A failing font pass only costs the font changes: the input is copied as
//! the working file and the gradient pass still runs. Everything after that
//! is fatal. Temporary directories are removed on every path.

use crate::archive::{scratch_dir, ExtractedPackage};
use crate::fonts::{FontPassReport, FontRuleEngine};
use crate::gradient::{resolve_schemes, GradientEngine, GradientPassReport, SingleScheme};
use restyle_core::store::load_rule_set;
use restyle_core::{Error, Result, RuleSet, SchemeTable, StatusSink};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the intermediate file between the two passes.
const WORKING_FILE: &str = "working.pptx";

/// Options that stay fixed across the transforms of one [`Processor`].
#[derive(Debug, Clone, Default)]
pub struct TransformOptions {
    /// Gradient scheme store, re-read for every transform.
    pub scheme_store: Option<PathBuf>,
    /// Give paragraph-end properties the gradient of their runs.
    pub gradient_end_paragraph: bool,
    /// Where temporary directories are created; the system temp dir if unset.
    pub scratch_dir: Option<PathBuf>,
}

impl TransformOptions {
    fn scratch_parent(&self) -> PathBuf {
        self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransformState {
    Idle,
    FontPass,
    GradientPass,
    Repack,
    Done,
    Failed,
}

impl TransformState {
    fn advance(&mut self, next: TransformState) {
        log::debug!("Transform state {:?} -> {:?}", self, next);
        *self = next;
    }
}

/// What a successful transform did.
#[derive(Debug, Clone, Serialize)]
pub struct TransformReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub state: TransformState,
    /// `None` when the font pass was skipped or failed.
    pub font: Option<FontPassReport>,
    /// The font pass failed and the input was used unchanged.
    pub font_fallback: bool,
    /// `None` when no gradient scheme was available.
    pub gradient: Option<GradientPassReport>,
}

/// Runs font and gradient passes over presentations.
///
/// The font rules are fixed when the processor is built; gradient schemes
/// are resolved again for every transform.
#[derive(Debug, Clone)]
pub struct Processor {
    fonts: FontRuleEngine,
    options: TransformOptions,
}

impl Processor {
    pub fn new(rules: RuleSet, options: TransformOptions) -> Self {
        Self {
            fonts: FontRuleEngine::new(rules),
            options,
        }
    }

    /// Build a processor from the font rule store at `path`. A missing or
    /// unreadable store yields a processor without font rules.
    pub fn from_rule_store(path: &Path, options: TransformOptions) -> Self {
        let rules = load_rule_set(path).unwrap_or_else(|e| {
            log::warn!("No font rules loaded from {}: {}", path.display(), e);
            RuleSet::new()
        });
        log::info!("Loaded {} font rules", rules.len());
        Self::new(rules, options)
    }

    pub fn options(&self) -> &TransformOptions {
        &self.options
    }

    pub fn font_engine(&self) -> &FontRuleEngine {
        &self.fonts
    }

    /// Transform `input` into `output`, reporting progress to `sink`.
    ///
    /// Returns whether the transform succeeded; details of a failure go to
    /// the log only.
    pub fn process(
        &self,
        input: &Path,
        output: &Path,
        single: Option<&SingleScheme>,
        sink: &dyn StatusSink,
    ) -> bool {
        match self.run(input, output, single, sink) {
            Ok(report) => {
                log::debug!("Transform report: {:?}", report);
                true
            }
            Err(e) => {
                log::error!("Transform of {} failed: {:?}", input.display(), e);
                false
            }
        }
    }

    /// Transform `input` into `output` and report what was done.
    pub fn run(
        &self,
        input: &Path,
        output: &Path,
        single: Option<&SingleScheme>,
        sink: &dyn StatusSink,
    ) -> Result<TransformReport> {
        let mut state = TransformState::Idle;
        let result = self.run_steps(input, output, single, sink, &mut state);
        match &result {
            Ok(_) => sink.status(&format!("Done: {}", output.display())),
            Err(e) => {
                state.advance(TransformState::Failed);
                sink.status(&format!("Failed: {}", e));
            }
        }
        result
    }

    fn run_steps(
        &self,
        input: &Path,
        output: &Path,
        single: Option<&SingleScheme>,
        sink: &dyn StatusSink,
        state: &mut TransformState,
    ) -> Result<TransformReport> {
        if !input.is_file() {
            return Err(Error::NotFound(input.to_path_buf()));
        }

        let parent = self.options.scratch_parent();
        let scratch = scratch_dir(&parent)?;
        let working = scratch.path().join(WORKING_FILE);

        state.advance(TransformState::FontPass);
        sink.status("Replacing fonts and sizes...");
        let (font, font_fallback) = match self.font_pass(input, &working) {
            Ok(report) => (report, false),
            Err(e) => {
                log::error!("Font pass failed for {}: {:?}", input.display(), e);
                sink.status(&format!("Font replacement failed, keeping original fonts: {}", e));
                fs::copy(input, &working)?;
                (None, true)
            }
        };

        state.advance(TransformState::GradientPass);
        sink.status("Applying gradient fills...");
        let schemes = resolve_schemes(self.options.scheme_store.as_deref(), single);
        let mut package = ExtractedPackage::unpack_in(&working, &parent)?;
        let result = self.gradient_pass(schemes, &package, output, sink, state);
        if let Err(e) = package.cleanup() {
            log::warn!("Could not remove {}: {}", package.path().display(), e);
        }
        let gradient = result?;

        scratch.close()?;
        state.advance(TransformState::Done);
        Ok(TransformReport {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            state: *state,
            font,
            font_fallback,
            gradient,
        })
    }

    /// Font pass from `input` to `working`. `Ok(None)` means there were no
    /// rules and the input was copied unchanged. On error the caller falls
    /// back to the input, so a failed save never leaves a broken file.
    fn font_pass(&self, input: &Path, working: &Path) -> Result<Option<FontPassReport>> {
        if self.fonts.is_empty() {
            log::warn!("No usable font rules, skipping font replacement");
            fs::copy(input, working)?;
            return Ok(None);
        }

        let mut package = ExtractedPackage::unpack_in(input, &self.options.scratch_parent())?;
        let result = self
            .fonts
            .apply_to_package(package.path())
            .and_then(|report| {
                package.repack(working)?;
                Ok(report)
            });
        package.cleanup()?;
        result.map(Some)
    }

    /// Gradient pass on the extracted working copy, then repack to `output`.
    fn gradient_pass(
        &self,
        schemes: Option<SchemeTable>,
        package: &ExtractedPackage,
        output: &Path,
        sink: &dyn StatusSink,
        state: &mut TransformState,
    ) -> Result<Option<GradientPassReport>> {
        let report = match schemes {
            Some(schemes) => {
                let engine = GradientEngine::new(schemes)
                    .with_end_paragraph(self.options.gradient_end_paragraph);
                let report = engine.apply_to_package(package.path(), sink)?;
                sink.status(&format!(
                    "Gradient pass complete, updated {} slides",
                    report.slides.len()
                ));
                Some(report)
            }
            None => {
                sink.status("No gradient scheme available, skipping gradients");
                None
            }
        };

        state.advance(TransformState::Repack);
        package.repack(output)?;
        Ok(report)
    }
}
