//! Table output formatting using the `tabled` crate.

use colored::Colorize;
use tabled::{builder::Builder, settings::Style};
use uuid::Uuid;

use chronik_core::{Event, Gap, OverlapPair, TimelineNode};
use chronik_daemon::storage::{JobSnapshot, JobStatus};

fn fmt_time(time: &chrono::DateTime<chrono::Utc>) -> String {
    time.format("%Y-%m-%d %H:%M").to_string()
}

/// Format events as a table.
pub fn event_table(events: &[Event]) -> String {
    if events.is_empty() {
        return "(no events)".to_string();
    }

    let mut builder = Builder::default();
    builder.push_record(["ID", "Name", "Start", "End", "Minutes", "Parent"]);
    for event in events {
        builder.push_record([
            event.event_id.to_string(),
            event.event_name.clone(),
            fmt_time(&event.start_date),
            fmt_time(&event.end_date),
            event.duration_minutes().to_string(),
            event
                .parent_event_id
                .map(|p| p.to_string())
                .unwrap_or_else(|| "-".to_string()),
        ]);
    }

    let mut table = builder.build();
    table.with(Style::rounded());
    table.to_string()
}

/// Format overlapping pairs as a table, longest overlap first.
pub fn overlap_table(pairs: &[OverlapPair]) -> String {
    if pairs.is_empty() {
        return "(no overlapping events)".to_string();
    }

    let mut builder = Builder::default();
    builder.push_record(["First", "Second", "Overlap start", "Overlap end", "Minutes"]);
    for pair in pairs {
        builder.push_record([
            pair.first_name.clone(),
            pair.second_name.clone(),
            fmt_time(&pair.overlap_start),
            fmt_time(&pair.overlap_end),
            format!("{:.1}", pair.overlap_minutes),
        ]);
    }

    let mut table = builder.build();
    table.with(Style::rounded());
    table.to_string()
}

/// Human-readable job progress summary.
pub fn job_summary(job: &JobSnapshot) -> String {
    let status = match job.status {
        JobStatus::Processing => "processing".yellow().bold(),
        JobStatus::Completed => "completed".green().bold(),
        JobStatus::Failed => "failed".red().bold(),
    };

    let mut lines = vec![
        format!("Job:       {}", job.job_id),
        format!("File:      {}", job.file_path),
        format!("Status:    {}", status),
        format!(
            "Progress:  {}/{} lines, {} errors",
            job.processed_lines, job.total_lines, job.error_lines
        ),
        format!("Started:   {}", fmt_time(&job.start_time)),
    ];
    if let Some(end) = &job.end_time {
        lines.push(format!("Finished:  {}", fmt_time(end)));
    }

    if !job.errors.is_empty() {
        lines.push(String::new());
        lines.push(format!("{}", "Errors:".bold()));
        for error in &job.errors {
            match error.line_number {
                Some(line) => lines.push(format!("  line {}: {}", line, error.message)),
                None => lines.push(format!("  {}", error.message)),
            }
        }
    }

    lines.join("\n")
}

/// Human-readable gap summary.
pub fn gap_summary(gap: &Gap) -> String {
    format!(
        "Largest gap: {:.1} minutes\n  after  {} (ends {})\n  before {} (starts {})",
        gap.duration_minutes,
        gap.before_name,
        fmt_time(&gap.gap_start),
        gap.after_name,
        fmt_time(&gap.gap_end),
    )
}

/// Human-readable influence path summary.
pub fn path_summary(path: &[Uuid], total_minutes: i64) -> String {
    let chain = path
        .iter()
        .map(Uuid::to_string)
        .collect::<Vec<_>>()
        .join("\n  -> ");
    format!("Path ({} minutes total):\n  {}", total_minutes, chain)
}

/// Render a timeline tree with indentation.
pub fn timeline_tree(node: &TimelineNode) -> String {
    let mut out = String::new();
    render_node(node, 0, &mut out);
    out
}

fn render_node(node: &TimelineNode, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    out.push_str(&format!(
        "{}{} ({} - {}, {} min)\n",
        indent,
        if depth == 0 {
            node.event.event_name.bold().to_string()
        } else {
            node.event.event_name.clone()
        },
        fmt_time(&node.event.start_date),
        fmt_time(&node.event.end_date),
        node.event.duration_minutes(),
    ));
    for child in &node.children {
        render_node(child, depth + 1, out);
    }
}
