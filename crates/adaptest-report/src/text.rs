//! Plain-text session report.

use adaptest_core::scoring::{pass_probability, precision_percentage};
use adaptest_core::{CatSession, ScoreReport};

/// Render one session for the terminal.
///
/// `score` overrides the session's stored score report; in-progress
/// sessions without either show the running estimate instead.
pub fn session_report(session: &CatSession, score: Option<&ScoreReport>) -> String {
    let mut out = String::new();
    let estimate = session.estimate();

    out.push_str(&format!("Session {}\n", session.id()));
    out.push_str(&format!("Status:     {}\n", session.status()));
    out.push_str(&format!(
        "Items:      {} administered ({}..{}), {} correct\n",
        session.item_count(),
        session.min_items(),
        session.max_items(),
        session.correct_count()
    ));
    out.push_str(&format!(
        "Theta:      {:.3} (SE {})\n",
        estimate.theta,
        format_se(estimate.se)
    ));
    out.push_str(&format!(
        "Precision:  {:.0}%\n",
        precision_percentage(estimate.se)
    ));

    match score.or(session.score()) {
        Some(score) => {
            out.push_str(&format!(
                "Score:      {} ({})\n",
                score.scaled_score,
                if score.passed { "PASS" } else { "FAIL" }
            ));
            out.push_str(&format!(
                "P(pass):    {:.1}%\n",
                score.pass_probability * 100.0
            ));
        }
        None => {
            out.push_str(&format!(
                "P(pass):    {:.1}% (provisional)\n",
                pass_probability(estimate.theta, estimate.se) * 100.0
            ));
        }
    }

    if let Some(reason) = session.stop_reason() {
        let note = if session.ended_early() {
            " (ended early)"
        } else {
            ""
        };
        out.push_str(&format!("Stopped:    {reason}{note}\n"));
    }

    out.push_str("\nCoverage:\n");
    for (area, coverage) in session.coverage() {
        out.push_str(&format!(
            "  {:<26} {:>3}/{:<3} {}\n",
            area.as_str(),
            coverage.administered,
            coverage.minimum,
            if coverage.is_met() { "ok" } else { "short" }
        ));
    }

    out
}

fn format_se(se: f64) -> String {
    if se.is_finite() {
        format!("{se:.3}")
    } else {
        "n/a".to_string()
    }
}
