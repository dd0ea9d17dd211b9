//! Markdown summary generation
//!
//! Renders a human-readable report of one run: job status, counters, depth
//! breakdown, language mix, and the failed pages.

use crate::output::{CrawlResult, EdgeKind};
use crate::state::JobStatusSnapshot;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Writes the markdown summary for a run to `output_path`
pub fn generate_markdown_summary(
    snapshot: &JobStatusSnapshot,
    result: &CrawlResult,
    output_path: &Path,
) -> std::io::Result<()> {
    let markdown = format_markdown_summary(snapshot, result);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats the summary for a run as markdown
pub fn format_markdown_summary(snapshot: &JobStatusSnapshot, result: &CrawlResult) -> String {
    let mut md = String::new();

    md.push_str("# Crawl Summary\n\n");

    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Status**: {}\n", snapshot.status));
    md.push_str(&format!("- **Started**: {}\n", result.started_at.to_rfc3339()));
    md.push_str(&format!("- **Finished**: {}\n", result.finished_at.to_rfc3339()));
    if let Some(duration) = snapshot.duration_seconds {
        md.push_str(&format!("- **Duration**: {:.1} seconds\n", duration));
    }
    md.push_str(&format!("- **Stopped Because**: {:?}\n", result.termination));
    if let Some(message) = &snapshot.error_message {
        md.push_str(&format!("- **Error**: {}\n", message));
    }
    md.push('\n');

    md.push_str("## Overall Statistics\n\n");
    md.push_str(&format!("- **Pages Discovered**: {}\n", result.total_discovered));
    md.push_str(&format!("- **Pages Crawled**: {}\n", result.total_crawled));
    md.push_str(&format!("- **Pages Failed**: {}\n", result.total_failed));
    md.push_str(&format!("- **Links Found**: {}\n", result.links_found()));

    let edges = result.link_edges();
    let count_kind = |kind: EdgeKind| edges.iter().filter(|e| e.kind == kind).count();
    md.push_str(&format!(
        "- **Link Edges**: {} internal, {} external, {} unresolved\n\n",
        count_kind(EdgeKind::Internal),
        count_kind(EdgeKind::External),
        count_kind(EdgeKind::Unresolved)
    ));

    if !result.pages.is_empty() {
        let mut depths: BTreeMap<u32, usize> = BTreeMap::new();
        let mut languages: BTreeMap<&str, usize> = BTreeMap::new();
        for page in &result.pages {
            *depths.entry(page.depth).or_default() += 1;
            *languages.entry(page.language.as_str()).or_default() += 1;
        }

        md.push_str("## Depth Breakdown\n\n");
        md.push_str("| Depth | Pages |\n");
        md.push_str("|-------|-------|\n");
        for (depth, count) in &depths {
            md.push_str(&format!("| {} | {} |\n", depth, count));
        }
        md.push('\n');

        md.push_str("## Languages\n\n");
        md.push_str("| Language | Pages |\n");
        md.push_str("|----------|-------|\n");
        for (language, count) in &languages {
            md.push_str(&format!("| {} | {} |\n", language, count));
        }
        md.push('\n');

        let missing_titles = result.pages.iter().filter(|p| p.title.is_none()).count();
        let missing_descriptions = result
            .pages
            .iter()
            .filter(|p| p.meta_description.is_none())
            .count();
        md.push_str("## On-Page Gaps\n\n");
        md.push_str(&format!("- **Missing Title**: {}\n", missing_titles));
        md.push_str(&format!(
            "- **Missing Meta Description**: {}\n\n",
            missing_descriptions
        ));
    }

    if !result.errors.is_empty() {
        md.push_str("## Failed Pages\n\n");
        md.push_str("| URL | Depth | Class | Attempts | Message |\n");
        md.push_str("|-----|-------|-------|----------|---------|\n");
        for error in &result.errors {
            md.push_str(&format!(
                "| {} | {} | {} | {} | {} |\n",
                error.url,
                error.depth,
                error.class,
                error.attempts,
                error.message.replace('|', "\\|")
            ));
        }
        md.push('\n');
    }

    md
}
