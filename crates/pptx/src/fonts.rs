//! Font and size substitution across slides.
//!
//! Every run with visible text is matched against the rule set in order.
//! All matching rules are applied, so a later rule can override what an
//! earlier one did to the same run. Matching always looks at the values the
//! run had before the first rule touched it.

use crate::archive::list_slide_parts;
use crate::run::{Script, TextRun};
use crate::slide::{shape_label, text_bodies_mut, ShapeKind, SlidePart};
use crate::xml::{XmlElement, DRAWINGML_NS};
use restyle_core::units::parse_points;
use restyle_core::{FontRule, LanguageTag, Result, RuleSet};
use serde::Serialize;
use std::ops::{Deref, DerefMut};
use std::path::Path;

/// Two sizes closer than this (in points) are considered equal.
const SIZE_TOLERANCE: f64 = 0.1;

/// What applying the rule set did to one run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunChange {
    pub size_changed: bool,
    pub font_changed: bool,
}

impl RunChange {
    pub fn any(&self) -> bool {
        self.size_changed || self.font_changed
    }
}

/// Counters for one font pass.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct FontPassReport {
    pub slides: usize,
    pub runs_seen: usize,
    pub runs_changed: usize,
    /// Runs skipped because they could not be processed.
    pub runs_failed: usize,
}

/// Values of a run before any rule was applied.
struct RunSnapshot {
    latin: String,
    ea: String,
    cs: String,
    size: f64,
}

impl RunSnapshot {
    fn take<R: Deref<Target = XmlElement>>(run: &TextRun<R>) -> Result<Self> {
        let name = |script| run.typeface(script).unwrap_or_default().to_string();
        Ok(Self {
            latin: name(Script::Latin),
            ea: name(Script::EastAsian),
            cs: name(Script::ComplexScript),
            size: run.size_points()?.unwrap_or(0.0),
        })
    }

    fn name(&self, script: Script) -> &str {
        match script {
            Script::Latin => &self.latin,
            Script::EastAsian => &self.ea,
            Script::ComplexScript => &self.cs,
        }
    }
}

/// Applies an immutable snapshot of font rules to slides.
#[derive(Debug, Clone)]
pub struct FontRuleEngine {
    rules: Vec<FontRule>,
}

impl FontRuleEngine {
    /// Build an engine from `rules`. Rules that set neither a new font nor a
    /// new size are dropped with a warning.
    pub fn new(rules: RuleSet) -> Self {
        let rules = rules
            .iter()
            .filter(|rule| {
                if !rule.is_effective() {
                    log::warn!("Ignoring font rule '{}': no new font or size", rule.id);
                }
                rule.is_effective()
            })
            .cloned()
            .collect();
        Self { rules }
    }

    pub fn rules(&self) -> &[FontRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Apply every matching rule to `run`.
    ///
    /// Runs without visible text are left alone. After any change the run is
    /// tagged `zh-CN` if its text contains CJK ideographs and `en-US`
    /// otherwise.
    pub fn apply_to_run<R: DerefMut<Target = XmlElement>>(
        &self,
        run: &mut TextRun<R>,
    ) -> Result<RunChange> {
        let text = run.text();
        let mut change = RunChange::default();
        if text.trim().is_empty() {
            return Ok(change);
        }

        let before = RunSnapshot::take(run)?;
        for rule in self.rules.iter().filter(|rule| rule_matches(rule, &before)) {
            if let Some(new_size) = &rule.new_size {
                match parse_points(new_size) {
                    Some(points) => {
                        run.set_size_points(points);
                        change.size_changed = true;
                    }
                    None => log::warn!(
                        "Rule '{}': new size '{}' is not a number, size left unchanged",
                        rule.id,
                        new_size
                    ),
                }
            }

            if let Some(new_font) = &rule.new_font {
                for script in enabled_scripts(rule) {
                    let slot_matches = rule
                        .old_font
                        .as_deref()
                        .map_or(true, |old| before.name(script) == old);
                    if slot_matches {
                        run.set_typeface(script, new_font);
                        change.font_changed = true;
                    }
                }
            }
        }

        if change.any() {
            let tag = LanguageTag::infer(&text);
            run.set_language(tag);
            log::debug!("Restyled run '{}' ({})", text, tag);
        }
        Ok(change)
    }

    /// Apply the rules to every run of a paragraph.
    ///
    /// A run that fails is logged and skipped. When the last run changed,
    /// an `endParaRPr` that already carries a `lang` gets the run's tag.
    pub fn apply_to_paragraph(
        &self,
        paragraph: &mut XmlElement,
        context: &str,
        report: &mut FontPassReport,
    ) {
        let run_indices = paragraph.child_indices(DRAWINGML_NS, "r");
        let Some(&last) = run_indices.last() else {
            return;
        };

        let mut trailing_lang = None;
        for idx in run_indices {
            let Some(el) = paragraph.element_at_mut(idx) else {
                continue;
            };
            let mut run = TextRun::new(el);
            if run.text().trim().is_empty() {
                continue;
            }
            report.runs_seen += 1;

            match self.apply_to_run(&mut run) {
                Ok(change) if change.any() => {
                    report.runs_changed += 1;
                    if idx == last {
                        trailing_lang = run.language().map(str::to_string);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    report.runs_failed += 1;
                    log::warn!("{}: skipping run '{}': {}", context, run.text(), e);
                }
            }
        }

        if let Some(lang) = trailing_lang {
            if let Some(end) = paragraph.find_mut(DRAWINGML_NS, "endParaRPr") {
                if end.has_attr("lang") {
                    end.set_attr("lang", lang);
                }
            }
        }
    }

    /// Apply the rules to every text shape and table on a slide, descending
    /// into groups.
    pub fn apply_to_slide(&self, slide: &mut SlidePart, report: &mut FontPassReport) {
        let name = slide.name();
        report.slides += 1;
        match slide.shape_tree_mut() {
            Some(tree) => self.apply_to_shapes(tree, &name, report),
            None => log::debug!("{}: no shape tree", name),
        }
    }

    /// Run the font pass over an extracted package.
    ///
    /// All slides are parsed before any is modified; a slide that cannot be
    /// parsed fails the whole pass and nothing is written.
    pub fn apply_to_package(&self, dir: &Path) -> Result<FontPassReport> {
        let mut slides = list_slide_parts(dir)?
            .iter()
            .map(|path| SlidePart::load(path))
            .collect::<Result<Vec<_>>>()?;

        let mut report = FontPassReport::default();
        for slide in &mut slides {
            self.apply_to_slide(slide, &mut report);
        }
        for slide in &slides {
            slide.save()?;
        }

        log::info!(
            "Font pass: {} of {} runs changed on {} slides ({} skipped)",
            report.runs_changed,
            report.runs_seen,
            report.slides,
            report.runs_failed
        );
        Ok(report)
    }

    fn apply_to_shapes(&self, tree: &mut XmlElement, slide: &str, report: &mut FontPassReport) {
        for shape in tree.elements_mut() {
            if ShapeKind::of(shape) == ShapeKind::Group {
                self.apply_to_shapes(shape, slide, report);
                continue;
            }

            let context = format!("{} / {}", slide, shape_label(shape));
            for body in text_bodies_mut(shape) {
                for paragraph in body.elements_mut().filter(|e| e.is(DRAWINGML_NS, "p")) {
                    self.apply_to_paragraph(paragraph, &context, report);
                }
            }
        }
    }
}

fn rule_matches(rule: &FontRule, run: &RunSnapshot) -> bool {
    let font_match = rule.old_font.as_deref().map_or(true, |old| {
        Script::ALL.iter().any(|script| run.name(*script) == old)
    });

    let size_match = match rule.old_size.as_deref() {
        None => true,
        Some(old) => match parse_points(old) {
            Some(old) => (old - run.size).abs() < SIZE_TOLERANCE,
            None => {
                log::warn!("Rule '{}': old size '{}' is not a number", rule.id, old);
                false
            }
        },
    };

    font_match && size_match
}

fn enabled_scripts(rule: &FontRule) -> impl Iterator<Item = Script> + '_ {
    Script::ALL.into_iter().filter(move |script| match script {
        Script::Latin => rule.apply_latin,
        Script::EastAsian => rule.apply_ea,
        Script::ComplexScript => rule.apply_cs,
    })
}
