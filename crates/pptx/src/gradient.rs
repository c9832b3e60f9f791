//! Gradient fills for runs selected by size and typeface.
//!
//! A run qualifies when its size, rendered in points without trailing
//! zeros, is a key of the scheme table and one of its typefaces is the
//! scheme's font. Qualifying runs get the scheme's stops as a linear
//! gradient, replacing any fill they had.

use crate::archive::list_slide_parts;
use crate::run::{apply_gradient_to_end_para, apply_gradient_to_run, TextRun};
use crate::slide::SlidePart;
use crate::xml::{XmlDocument, XmlElement, DRAWINGML_NS};
use restyle_core::store::load_scheme_table;
use restyle_core::units::format_hundredths;
use restyle_core::{Error, GradientScheme, GradientStop, Result, SchemeTable, StatusSink};
use serde::Serialize;
use std::path::Path;

/// A gradient scheme given directly by the caller rather than read from
/// the scheme store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SingleScheme {
    pub gradient_config: Vec<GradientStop>,
    pub font_size: String,
    pub font_name: String,
}

impl SingleScheme {
    pub fn new(
        gradient_config: Vec<GradientStop>,
        font_size: impl Into<String>,
        font_name: impl Into<String>,
    ) -> Self {
        Self {
            gradient_config,
            font_size: font_size.into(),
            font_name: font_name.into(),
        }
    }

    /// One-entry scheme table for this scheme.
    pub fn to_table(&self) -> Result<SchemeTable> {
        if self.font_size.trim().is_empty() || self.font_name.trim().is_empty() {
            return Err(Error::ConfigInvalid(
                "gradient scheme needs both a font size and a font name".to_string(),
            ));
        }
        SchemeTable::single(&self.font_size, self.gradient_config.clone(), &self.font_name)
    }
}

/// Pick the schemes for one document transform.
///
/// A scheme store with at least one usable entry is the only source; the
/// explicit scheme is then ignored. Otherwise the explicit scheme is used
/// if it is complete. `None` means the gradient pass should be skipped.
pub fn resolve_schemes(store: Option<&Path>, single: Option<&SingleScheme>) -> Option<SchemeTable> {
    if let Some(path) = store {
        match load_scheme_table(path) {
            Ok(table) if !table.is_empty() => {
                log::info!("Loaded {} gradient schemes from {}", table.len(), path.display());
                if single.is_some() {
                    log::info!("Scheme store takes precedence over the explicit gradient scheme");
                }
                return Some(table);
            }
            Ok(_) => log::warn!("Scheme store {} has no usable entries", path.display()),
            Err(Error::ConfigMissing(_)) => {
                log::warn!("Scheme store {} not found", path.display())
            }
            Err(e) => log::warn!("Ignoring scheme store {}: {}", path.display(), e),
        }
    }

    match single.map(SingleScheme::to_table) {
        Some(Ok(table)) => {
            log::info!("Using explicit gradient scheme");
            Some(table)
        }
        Some(Err(e)) => {
            log::warn!("Explicit gradient scheme rejected, skipping gradients: {}", e);
            None
        }
        None => {
            log::warn!("No gradient scheme configured, skipping gradients");
            None
        }
    }
}

/// Outcome of the gradient pass on one slide.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SlideGradientReport {
    pub slide: String,
    /// Runs that received a gradient.
    pub applied: usize,
    /// Sized runs whose size has no scheme.
    pub size_misses: usize,
    /// Runs whose size has a scheme but whose typefaces do not include the
    /// scheme's font.
    pub font_mismatches: usize,
    /// Runs with an unreadable size.
    pub runs_failed: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct GradientPassReport {
    pub slides: Vec<SlideGradientReport>,
}

impl GradientPassReport {
    pub fn total_applied(&self) -> usize {
        self.slides.iter().map(|s| s.applied).sum()
    }
}

/// Applies an immutable snapshot of gradient schemes to slides.
#[derive(Debug, Clone)]
pub struct GradientEngine {
    schemes: SchemeTable,
    end_paragraph: bool,
}

impl GradientEngine {
    pub fn new(schemes: SchemeTable) -> Self {
        Self {
            schemes,
            end_paragraph: false,
        }
    }

    /// Also fill the `endParaRPr` of paragraphs whose runs got a gradient.
    pub fn with_end_paragraph(mut self, enabled: bool) -> Self {
        self.end_paragraph = enabled;
        self
    }

    pub fn schemes(&self) -> &SchemeTable {
        &self.schemes
    }

    /// Apply the schemes to every run of a parsed slide.
    pub fn apply_to_document(&self, doc: &mut XmlDocument, slide: &str) -> SlideGradientReport {
        let mut report = SlideGradientReport {
            slide: slide.to_string(),
            ..Default::default()
        };
        doc.root_mut()
            .for_each_descendant_mut(DRAWINGML_NS, "p", &mut |paragraph: &mut XmlElement| {
                self.apply_to_paragraph(paragraph, &mut report)
            });
        report
    }

    pub fn apply_to_slide(&self, slide: &mut SlidePart) -> SlideGradientReport {
        let name = slide.name();
        self.apply_to_document(slide.document_mut(), &name)
    }

    /// Run the gradient pass over an extracted package, saving every slide
    /// and reporting each slide's count to `sink`.
    pub fn apply_to_package(&self, dir: &Path, sink: &dyn StatusSink) -> Result<GradientPassReport> {
        let paths = list_slide_parts(dir)?;
        log::info!("Gradient pass over {} slides", paths.len());

        let mut report = GradientPassReport::default();
        for path in paths {
            let mut slide = SlidePart::load(&path)?;
            let slide_report = self.apply_to_slide(&mut slide);
            slide.save()?;

            sink.status(&format!(
                "{}: gradient applied to {} runs",
                slide_report.slide, slide_report.applied
            ));
            report.slides.push(slide_report);
        }
        Ok(report)
    }

    fn apply_to_paragraph(&self, paragraph: &mut XmlElement, report: &mut SlideGradientReport) {
        let mut last_applied = None;
        for idx in paragraph.child_indices(DRAWINGML_NS, "r") {
            if let Some(run) = paragraph.element_at_mut(idx) {
                if let Some(applied) = self.apply_to_run(run, report) {
                    last_applied = Some(applied);
                }
            }
        }

        if self.end_paragraph {
            if let Some((scheme, size)) = last_applied {
                apply_gradient_to_end_para(paragraph, &scheme.gradient_config, Some(size));
            }
        }
    }

    fn apply_to_run(
        &self,
        run: &mut XmlElement,
        report: &mut SlideGradientReport,
    ) -> Option<(&GradientScheme, u32)> {
        let view = TextRun::new(&*run);
        let size = match view.size_hundredths() {
            Ok(Some(size)) if size > 0 => size,
            Ok(_) => return None,
            Err(e) => {
                report.runs_failed += 1;
                log::warn!("{}: skipping run '{}': {}", report.slide, view.text(), e);
                return None;
            }
        };

        let key = format_hundredths(size);
        let Some(scheme) = self.schemes.get(&key) else {
            report.size_misses += 1;
            log::debug!("{}: no gradient scheme for size {}", report.slide, key);
            return None;
        };

        let fonts = view.typefaces();
        if !fonts.contains(&scheme.font_name) {
            report.font_mismatches += 1;
            log::warn!(
                "{}: font mismatch at size {}: run uses {:?}, scheme wants '{}'",
                report.slide,
                key,
                fonts,
                scheme.font_name
            );
            return None;
        }

        apply_gradient_to_run(run, &scheme.gradient_config, size, Some(&scheme.font_name));
        report.applied += 1;
        Some((scheme, size))
    }
}
