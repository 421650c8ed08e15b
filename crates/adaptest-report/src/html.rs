//! HTML simulation report.
//!
//! Produces a self-contained HTML file with all CSS/JS inlined.

use anyhow::{Context, Result};
use std::path::Path;

use adaptest_sim::{RunResult, SimulationReport};

/// Escape a string for safe HTML insertion.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

fn fmt_se(se: f64) -> String {
    if se.is_finite() {
        format!("{se:.3}")
    } else {
        "-".to_string()
    }
}

/// Generate an HTML report from a simulation report.
pub fn generate_html(report: &SimulationReport) -> String {
    let mut html = String::new();
    let summary = &report.summary;

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str(&format!(
        "<title>adaptest simulation: {}</title>\n",
        html_escape(&report.bank)
    ));
    html.push_str("<style>\n");
    html.push_str(CSS);
    html.push_str("</style>\n");
    html.push_str("</head>\n<body>\n");

    // Header
    html.push_str("<header>\n");
    html.push_str("<h1>adaptest simulation</h1>\n");
    html.push_str(&format!(
        "<p class=\"meta\">Bank: <strong>{}</strong> | {} examinees | {} failed | items {}..{} | target SE {:.2} | {} | {:.1}s</p>\n",
        html_escape(&report.bank),
        report.config.examinees,
        report.failed,
        report.config.min_items,
        report.config.max_items,
        report.engine.target_se,
        report.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
        report.duration_ms as f64 / 1000.0
    ));
    html.push_str("</header>\n");

    // Summary
    html.push_str("<section class=\"dashboard\">\n");
    html.push_str("<h2>Summary</h2>\n");
    html.push_str("<table class=\"summary\">\n");
    html.push_str("<thead><tr><th>Metric</th><th>Value</th></tr></thead>\n<tbody>\n");
    let rows = [
        ("Runs", summary.runs.to_string()),
        (
            "Items (mean / min / max)",
            format!(
                "{:.1} / {} / {}",
                summary.mean_items, summary.min_items, summary.max_items
            ),
        ),
        ("Bias", format!("{:+.4}", summary.bias)),
        ("RMSE", format!("{:.4}", summary.rmse)),
        ("Mean SE", fmt_se(summary.mean_se)),
        ("2·SE coverage", format!("{:.1}%", summary.coverage_rate * 100.0)),
        ("Pass rate", format!("{:.1}%", summary.pass_rate * 100.0)),
        (
            "Classification accuracy",
            format!("{:.1}%", summary.classification_accuracy * 100.0),
        ),
        ("Ended early", summary.ended_early.to_string()),
    ];
    for (label, value) in rows {
        html.push_str(&format!("<tr><td>{label}</td><td>{value}</td></tr>\n"));
    }
    for (reason, count) in &summary.stop_reasons {
        html.push_str(&format!(
            "<tr><td>Stopped by {}</td><td>{count}</td></tr>\n",
            html_escape(reason)
        ));
    }
    html.push_str("</tbody></table>\n");

    if !report.runs.is_empty() {
        html.push_str("<h2>Theta recovery</h2>\n");
        html.push_str(&generate_recovery_plot(&report.runs));
    }
    html.push_str("</section>\n");

    // Per-run results
    html.push_str("<section class=\"results\">\n");
    html.push_str("<h2>Runs</h2>\n");
    html.push_str("<table class=\"results-table\" id=\"results\">\n");
    html.push_str("<thead><tr>");
    for (col, name) in [
        "Examinee",
        "True θ",
        "θ̂",
        "SE",
        "Error",
        "Items",
        "Correct",
        "Score",
        "Decision",
        "Stop",
    ]
    .iter()
    .enumerate()
    {
        html.push_str(&format!("<th onclick=\"sortTable({col})\">{name}</th>"));
    }
    html.push_str("</tr></thead>\n<tbody>\n");

    for run in &report.runs {
        let class = if run.passed == run.true_pass {
            "pass"
        } else {
            "fail"
        };
        let decision = if run.passed { "PASS" } else { "FAIL" };
        let stop = run
            .stop_reason
            .map(|reason| reason.to_string())
            .unwrap_or_else(|| "-".to_string());
        html.push_str(&format!(
            "<tr class=\"{class}\"><td>{}</td><td>{:.3}</td><td>{:.3}</td><td>{}</td><td>{:+.3}</td><td>{}</td><td>{}</td><td>{}</td><td>{decision}</td><td>{}</td></tr>\n",
            run.examinee,
            run.true_theta,
            run.theta,
            fmt_se(run.se),
            run.error(),
            run.items,
            run.correct,
            run.scaled_score,
            html_escape(&stop)
        ));
    }

    html.push_str("</tbody></table>\n");
    html.push_str("</section>\n");

    // Raw JSON
    html.push_str("<section class=\"raw-data\">\n");
    html.push_str("<details>\n<summary>Raw JSON Data</summary>\n");
    html.push_str("<pre><code>");
    html.push_str(
        &serde_json::to_string_pretty(report)
            .unwrap_or_default()
            .replace('<', "&lt;")
            .replace('>', "&gt;"),
    );
    html.push_str("</code></pre>\n");
    html.push_str("</details>\n</section>\n");

    html.push_str("<script>\n");
    html.push_str(JS);
    html.push_str("</script>\n");

    html.push_str("</body>\n</html>");
    html
}

/// Write an HTML report to a file.
pub fn write_html_report(report: &SimulationReport, path: &Path) -> Result<()> {
    let html = generate_html(report);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, html)
        .with_context(|| format!("failed to write HTML report to {}", path.display()))?;
    Ok(())
}

/// Scatter plot of estimated against true theta, with the identity line.
fn generate_recovery_plot(runs: &[RunResult]) -> String {
    let size = 360.0;
    let margin = 40.0;
    let lo = -4.0;
    let hi = 4.0;
    let scale = |theta: f64| (theta.clamp(lo, hi) - lo) / (hi - lo) * size;
    let x = |theta: f64| margin + scale(theta);
    let y = |theta: f64| margin + size - scale(theta);

    let mut svg = format!(
        "<svg width=\"{}\" height=\"{}\" xmlns=\"http://www.w3.org/2000/svg\">\n",
        size + 2.0 * margin,
        size + 2.0 * margin
    );
    svg.push_str(&format!(
        "  <rect x=\"{margin}\" y=\"{margin}\" width=\"{size}\" height=\"{size}\" fill=\"none\" stroke=\"currentColor\" stroke-opacity=\"0.3\"/>\n"
    ));
    svg.push_str(&format!(
        "  <line x1=\"{}\" y1=\"{}\" x2=\"{}\" y2=\"{}\" stroke=\"#6b7280\" stroke-dasharray=\"4 4\"/>\n",
        x(lo),
        y(lo),
        x(hi),
        y(hi)
    ));

    for tick in [-4.0, -2.0, 0.0, 2.0, 4.0] {
        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" font-size=\"11\" fill=\"currentColor\" text-anchor=\"middle\">{tick}</text>\n",
            x(tick),
            margin + size + 16.0
        ));
        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" font-size=\"11\" fill=\"currentColor\" text-anchor=\"end\" dominant-baseline=\"middle\">{tick}</text>\n",
            margin - 6.0,
            y(tick)
        ));
    }

    for run in runs {
        let color = if run.covered() { "#22c55e" } else { "#ef4444" };
        svg.push_str(&format!(
            "  <circle cx=\"{:.1}\" cy=\"{:.1}\" r=\"3\" fill=\"{color}\" fill-opacity=\"0.7\"><title>#{} true {:.2} est {:.2}</title></circle>\n",
            x(run.true_theta),
            y(run.theta),
            run.examinee,
            run.true_theta,
            run.theta
        ));
    }

    svg.push_str("</svg>\n");
    svg
}

const CSS: &str = r#"
:root { --bg: #fff; --fg: #1a1a1a; --border: #e5e7eb; --pass: #dcfce7; --fail: #fde2e2; }
@media (prefers-color-scheme: dark) {
  :root { --bg: #111827; --fg: #f9fafb; --border: #374151; --pass: #064e3b; --fail: #7f1d1d; }
}
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif; margin: 0; padding: 2rem; background: var(--bg); color: var(--fg); }
h1, h2 { margin-top: 2rem; }
.meta { color: #6b7280; }
table { border-collapse: collapse; margin: 1rem 0; }
table.results-table { width: 100%; }
th, td { border: 1px solid var(--border); padding: 0.4rem 0.8rem; text-align: left; }
th { background: var(--border); cursor: pointer; }
.pass { background: var(--pass); }
.fail { background: var(--fail); }
pre { overflow-x: auto; padding: 1rem; background: var(--border); border-radius: 8px; }
code { font-family: 'JetBrains Mono', 'Fira Code', monospace; font-size: 0.85rem; }
details { margin: 1rem 0; }
summary { cursor: pointer; font-weight: bold; }
svg { margin: 1rem 0; }
"#;

const JS: &str = r#"
function sortTable(col) {
  const table = document.getElementById('results');
  const tbody = table.querySelector('tbody');
  const rows = Array.from(tbody.querySelectorAll('tr'));
  const asc = table.dataset.sortCol == col && table.dataset.sortDir == 'asc' ? false : true;
  rows.sort((a, b) => {
    const va = a.cells[col].textContent;
    const vb = b.cells[col].textContent;
    const na = parseFloat(va), nb = parseFloat(vb);
    const cmp = !isNaN(na) && !isNaN(nb) ? na - nb : va.localeCompare(vb);
    return asc ? cmp : -cmp;
  });
  table.dataset.sortCol = col;
  table.dataset.sortDir = asc ? 'asc' : 'desc';
  rows.forEach(r => tbody.appendChild(r));
}
"#;
