//! Inspect report types and terminal formatting.

use std::fmt;

use serde::Serialize;

/// Inner width of the report boxes, in characters.
const BOX_WIDTH: usize = 59;

/// The result of inspecting a package.
#[derive(Clone, Debug, Serialize)]
pub struct InspectReport {
    /// File the package was read from, if any.
    pub path: Option<String>,
    pub summary: SummarySection,
    /// One row per view, in iteration order.
    pub views: Vec<ViewRow>,
    /// Views not listed because of [`InspectOptions::max_views`](super::InspectOptions::max_views).
    pub views_omitted: usize,
    /// Subjects packed into the file.
    pub subjects: Vec<PackedSubject>,
}

/// Summary counts for the package.
#[derive(Clone, Debug, Default, Serialize)]
pub struct SummarySection {
    pub views: usize,
    /// Distinct brain data, each stored once.
    pub unique_data: usize,
    /// Data references across all views. Larger than `unique_data` when
    /// views share data.
    pub data_refs: usize,
    /// Entries skipped on load for missing metadata.
    pub skipped_entries: usize,
    pub packed_subjects: usize,
}

/// One view in the view table.
#[derive(Clone, Debug, Serialize)]
pub struct ViewRow {
    pub name: String,
    /// Type tag, e.g. `rgb_volume`.
    pub kind: String,
    pub priority: i64,
    pub subject: String,
    pub xfmname: Option<String>,
    /// Shape of the first channel.
    pub shape: Vec<usize>,
    pub dtype: String,
    /// `named:<mask>`, `inline`, or absent.
    pub mask: Option<String>,
}

/// Resources packed for one subject.
#[derive(Clone, Debug, Default, Serialize)]
pub struct PackedSubject {
    pub name: String,
    pub has_overlay: bool,
    pub surfaces: Vec<String>,
    pub transforms: Vec<PackedTransform>,
}

/// A packed transform and the masks packed with it.
#[derive(Clone, Debug, Default, Serialize)]
pub struct PackedTransform {
    pub name: String,
    pub masks: Vec<String>,
}

impl fmt::Display for InspectReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        writeln!(f, "╭─────────────────────────────────────────────────────────────╮")?;
        writeln!(f, "│                  Package Inspection Report                  │")?;
        writeln!(f, "╰─────────────────────────────────────────────────────────────╯")?;
        writeln!(f)?;

        self.fmt_summary(f)?;
        writeln!(f)?;
        self.fmt_views(f)?;
        writeln!(f)?;
        self.fmt_subjects(f)?;

        Ok(())
    }
}

impl InspectReport {
    fn fmt_summary(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.summary;

        box_top(f, "Summary")?;
        if let Some(path) = &self.path {
            box_line(f, &format!("File:            {}", truncate_label(path, 40)))?;
        }
        box_line(f, &format!("Views:           {:>8}", format_number(s.views)))?;
        box_line(f, &format!("Unique data:     {:>8}", format_number(s.unique_data)))?;
        box_line(
            f,
            &format!(
                "Data references: {:>8}  ({} shared)",
                format_number(s.data_refs),
                format_number(s.data_refs.saturating_sub(s.unique_data))
            ),
        )?;
        if s.skipped_entries > 0 {
            box_line(
                f,
                &format!("Skipped entries: {:>8}", format_number(s.skipped_entries)),
            )?;
        }
        box_line(f, &format!("Packed subjects: {:>8}", format_number(s.packed_subjects)))?;
        box_bottom(f)
    }

    fn fmt_views(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        box_top(f, &format!("Views ({})", self.views.len() + self.views_omitted))?;
        if self.views.is_empty() && self.views_omitted == 0 {
            box_line(f, "No views found.")?;
        }
        for row in &self.views {
            let space = match (&row.xfmname, &row.mask) {
                (Some(xfm), Some(mask)) => format!("{} [{}]", xfm, mask),
                (Some(xfm), None) => xfm.clone(),
                (None, _) => "surface".to_string(),
            };
            box_line(
                f,
                &format!(
                    "{:<16} {:<10} {:>5}  {}",
                    truncate_label(&row.name, 16),
                    row.kind,
                    row.priority,
                    truncate_label(&row.subject, 12)
                ),
            )?;
            box_line(
                f,
                &format!(
                    "  {} {:?} in {}",
                    row.dtype,
                    row.shape,
                    truncate_label(&space, 30)
                ),
            )?;
        }
        if self.views_omitted > 0 {
            box_line(f, &format!("... and {} more", format_number(self.views_omitted)))?;
        }
        box_bottom(f)
    }

    fn fmt_subjects(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        box_top(f, "Packed Subjects")?;
        if self.subjects.is_empty() {
            box_line(f, "Nothing packed; resources come from a subject database.")?;
        }
        for subject in &self.subjects {
            let overlay = if subject.has_overlay { "rois" } else { "no overlay" };
            box_line(f, &format!("{} ({})", truncate_label(&subject.name, 30), overlay))?;
            if !subject.surfaces.is_empty() {
                box_line(f, &format!("  surfaces:   {}", subject.surfaces.join(", ")))?;
            }
            for xfm in &subject.transforms {
                if xfm.masks.is_empty() {
                    box_line(f, &format!("  transform:  {}", xfm.name))?;
                } else {
                    box_line(
                        f,
                        &format!("  transform:  {} (masks: {})", xfm.name, xfm.masks.join(", ")),
                    )?;
                }
            }
        }
        box_bottom(f)
    }
}

fn box_top(f: &mut fmt::Formatter<'_>, title: &str) -> fmt::Result {
    let fill = (BOX_WIDTH - 2).saturating_sub(title.chars().count());
    writeln!(f, "┌─ {} {}┐", title, "─".repeat(fill))?;
    writeln!(f, "│{}│", " ".repeat(BOX_WIDTH))
}

fn box_line(f: &mut fmt::Formatter<'_>, content: &str) -> fmt::Result {
    let content = truncate_label(content, BOX_WIDTH - 4);
    let padding = (BOX_WIDTH - 3).saturating_sub(content.chars().count());
    writeln!(f, "│   {}{}│", content, " ".repeat(padding))
}

fn box_bottom(f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "│{}│", " ".repeat(BOX_WIDTH))?;
    writeln!(f, "└{}┘", "─".repeat(BOX_WIDTH))
}

/// Format a number with thousands separators.
fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Truncate a label to at most `max_len` characters.
fn truncate_label(label: &str, max_len: usize) -> String {
    if label.chars().count() <= max_len {
        label.to_string()
    } else {
        let kept: String = label.chars().take(max_len.saturating_sub(1)).collect();
        format!("{}…", kept)
    }
}
