use gqlprobe_core::report::{CaseOutcome, CaseStatus, RunReport};
use console::{Style, StyledObject};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Pass,
    Fail,
    Skip,
    Header,
    Footer,
}

pub fn style_text<D>(text: D, style: MessageType) -> StyledObject<D> {
    let style_obj = match style {
        MessageType::Pass => Style::new().green().bold(),
        MessageType::Fail => Style::new().red().bold(),
        MessageType::Skip => Style::new().yellow().bold(),
        MessageType::Header => Style::new().blue().bold(),
        MessageType::Footer => Style::new().white().dim(),
    };
    style_obj.apply_to(text)
}

/// One line per case, followed by the failure or skip detail when present.
pub fn format_outcome(outcome: &CaseOutcome) -> String {
    let seconds = outcome.elapsed.as_secs_f64();
    match &outcome.status {
        CaseStatus::Passed => format!(
            "{} {} {}",
            style_text("PASS", MessageType::Pass),
            outcome.name,
            style_text(format!("({seconds:.2}s)"), MessageType::Footer)
        ),
        CaseStatus::Failed { kind, message } => format!(
            "{} {} {}\n     {kind}: {message}",
            style_text("FAIL", MessageType::Fail),
            outcome.name,
            style_text(format!("({seconds:.2}s)"), MessageType::Footer)
        ),
        CaseStatus::Skipped { reason } => format!(
            "{} {}\n     {reason}",
            style_text("SKIP", MessageType::Skip),
            outcome.name
        ),
    }
}

pub fn format_summary(report: &RunReport) -> String {
    let mut lines = vec![
        style_text("=== GraphQL API Test Summary ===", MessageType::Header).to_string(),
        format!(
            "Total Execution Time: {:.2}s",
            report.total_time.as_secs_f64()
        ),
        format!(
            "Average Response Time: {:.2}s",
            report.average_response_time().as_secs_f64()
        ),
        format!("Total Queries: {}", report.total()),
        format!("Passed: {}", report.passed()),
        format!("Failed Queries: {}", report.failed()),
        format!("Skipped: {}", report.skipped()),
    ];

    let kinds = report.error_kinds();
    if !kinds.is_empty() {
        lines.push(String::new());
        lines.push("Error Types:".to_string());
        for (kind, count) in kinds {
            lines.push(format!("  {kind}: {count}"));
        }
    }

    let verdict = if report.is_success() {
        style_text("◼ All queries passed.", MessageType::Pass)
    } else {
        style_text("◼ Some queries failed.", MessageType::Fail)
    };
    lines.push(verdict.to_string());
    lines.join("\n")
}
