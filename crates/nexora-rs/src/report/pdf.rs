use printpdf::{
    BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference,
};

use crate::errors::{EngineError, Result};
use crate::models::{OutcomeStatus, ScanRun};

use super::{sorted_findings, summarize};

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN_LEFT: f32 = 20.0;
const MARGIN_TOP: f32 = 20.0;
const MARGIN_BOTTOM: f32 = 20.0;
const WRAP_COLUMNS: usize = 96;

/// Cursor-based page writer: text flows top to bottom and a fresh page is
/// started whenever the cursor would cross the bottom margin.
struct PdfWriter {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    font: IndirectFontRef,
    bold: IndirectFontRef,
    y: f32,
}

impl PdfWriter {
    fn new(title: &str) -> Result<Self> {
        let (doc, page, layer) = PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "page");
        let font = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| EngineError::Report(e.to_string()))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| EngineError::Report(e.to_string()))?;
        let layer = doc.get_page(page).get_layer(layer);
        Ok(Self {
            doc,
            layer,
            font,
            bold,
            y: PAGE_HEIGHT - MARGIN_TOP,
        })
    }

    fn new_page(&mut self) {
        let (page, layer) = self
            .doc
            .add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "page");
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y = PAGE_HEIGHT - MARGIN_TOP;
    }

    fn ensure_space(&mut self, needed: f32) {
        if self.y - needed < MARGIN_BOTTOM {
            self.new_page();
        }
    }

    fn line(&mut self, text: &str, size: f32, bold: bool, indent: f32) {
        let step = size * 0.5;
        // Font handles are cheap clones; ensure_space below needs &mut self.
        let font = if bold {
            self.bold.clone()
        } else {
            self.font.clone()
        };
        for chunk in wrap(text, WRAP_COLUMNS) {
            self.ensure_space(step);
            self.layer
                .use_text(chunk, size, Mm(MARGIN_LEFT + indent), Mm(self.y), &font);
            self.y -= step;
        }
    }

    fn heading(&mut self, text: &str) {
        self.gap(6.0);
        self.line(text, 14.0, true, 0.0);
        self.gap(2.0);
    }

    fn gap(&mut self, mm: f32) {
        self.y -= mm;
    }

    fn finish(self) -> Result<Vec<u8>> {
        self.doc
            .save_to_bytes()
            .map_err(|e| EngineError::Report(e.to_string()))
    }
}

fn wrap(text: &str, columns: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        // Unbroken tokens (long URLs in evidence) are hard-split so no
        // piece can overrun the right margin.
        let mut chars = word.chars().peekable();
        while chars.peek().is_some() {
            let piece: String = chars.by_ref().take(columns).collect();
            if !current.is_empty() && current.chars().count() + piece.chars().count() + 1 > columns
            {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(&piece);
        }
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

/// Renders the run as a structured PDF: title/metadata page, table of
/// contents, executive summary, then one section per tool outcome with its
/// findings in severity-descending, title-ascending order.
pub fn to_pdf(run: &ScanRun) -> Result<Vec<u8>> {
    let mut w = PdfWriter::new(&format!("Nexora scan report {}", run.id))?;
    let summary = summarize(run);

    // Title and metadata
    w.line("NEXORA VULNERABILITY SCAN REPORT", 20.0, true, 0.0);
    w.gap(8.0);
    w.line(&format!("Target: {} ({})", run.target.raw, run.target.kind), 11.0, false, 0.0);
    w.line(&format!("Scan mode: {}", run.mode), 11.0, false, 0.0);
    w.line(&format!("Run id: {}", run.id), 11.0, false, 0.0);
    w.line(&format!("Created: {}", run.created_at.to_rfc3339()), 11.0, false, 0.0);
    w.line(&format!("Status: {}", run.status), 11.0, false, 0.0);
    let selection = run
        .selection
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    w.line(&format!("Selected tools: {selection}"), 11.0, false, 0.0);

    // Table of contents
    w.heading("Table of Contents");
    w.line("1. Executive Summary", 11.0, false, 5.0);
    for (i, outcome) in run.outcomes.iter().enumerate() {
        w.line(
            &format!("{}. {} results", i + 2, outcome.tool),
            11.0,
            false,
            5.0,
        );
    }

    // Executive summary
    w.heading("1. Executive Summary");
    w.line(&format!("Overall run status: {}", run.status), 11.0, false, 0.0);
    w.line(
        &format!("Total findings: {}", summary.total_findings),
        11.0,
        false,
        0.0,
    );
    for (severity, count) in &summary.by_severity {
        w.line(
            &format!("{}: {count}", severity.to_string().to_uppercase()),
            10.0,
            false,
            5.0,
        );
    }
    w.gap(2.0);
    w.line("Findings per tool:", 11.0, false, 0.0);
    for (tool, count) in &summary.by_tool {
        w.line(&format!("{tool}: {count}"), 10.0, false, 5.0);
    }
    if summary.total_findings == 0 {
        w.gap(2.0);
        w.line(
            "No findings were recorded. Per-tool reasons:",
            11.0,
            false,
            0.0,
        );
        if run.outcomes.is_empty() {
            w.line(
                "The execution plan was empty for this mode and tool selection.",
                10.0,
                false,
                5.0,
            );
        }
        for outcome in &run.outcomes {
            let reason = outcome
                .error_detail
                .as_deref()
                .unwrap_or("tool ran without reporting findings");
            w.line(
                &format!("{} ({}): {reason}", outcome.tool, outcome.status),
                10.0,
                false,
                5.0,
            );
        }
    }

    // Per-tool sections
    for (i, outcome) in run.outcomes.iter().enumerate() {
        w.heading(&format!(
            "{}. {} results — {}",
            i + 2,
            outcome.tool,
            outcome.status
        ));
        w.line(
            &format!(
                "Started {} / finished {}",
                outcome.started_at.to_rfc3339(),
                outcome.finished_at.to_rfc3339()
            ),
            9.0,
            false,
            0.0,
        );
        if let Some(detail) = &outcome.error_detail {
            w.line(&format!("Detail: {detail}"), 10.0, false, 0.0);
        }
        if outcome.status == OutcomeStatus::Simulated {
            w.line(
                "Dry-run outcome: findings below are placeholders, not authoritative.",
                10.0,
                false,
                0.0,
            );
        }
        if outcome.findings.is_empty() {
            w.line("No findings.", 10.0, false, 0.0);
            continue;
        }
        for finding in sorted_findings(outcome) {
            w.gap(2.0);
            w.line(
                &format!(
                    "[{}] {}",
                    finding.severity.to_string().to_uppercase(),
                    finding.title
                ),
                11.0,
                true,
                0.0,
            );
            w.line(&finding.description, 10.0, false, 5.0);
            if let (Some(port), service) = (finding.port, finding.service.as_deref()) {
                w.line(
                    &format!("Port {port} ({})", service.unwrap_or("unknown service")),
                    9.0,
                    false,
                    5.0,
                );
            }
            if let Some(evidence) = &finding.evidence {
                w.line(&format!("Evidence: {evidence}"), 9.0, false, 5.0);
            }
        }
    }

    w.finish()
}
