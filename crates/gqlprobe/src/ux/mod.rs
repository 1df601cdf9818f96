mod presenter;

pub use presenter::{MessageType, format_outcome, format_summary, style_text};

use console::style;

pub fn present_error(error: anyhow::Error) {
    let error_text = style("ERROR:").red().bold();
    eprintln!("\n{error_text} {error:#}");
}
