//! Markdown rendering of run and narrative reports.

use std::fmt::Write;

use bookend_models::{AbComparison, NarrativeRun, RunReport, SampleResult, Winner};

fn score(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.1}")).unwrap_or_else(|| "-".to_string())
}

fn notes(sample: &SampleResult) -> String {
    let problems: Vec<&str> = sample.problems().map(|r| r.check.as_str()).collect();
    if problems.is_empty() {
        String::new()
    } else {
        problems.join(", ")
    }
}

fn sample_table(out: &mut String, samples: &[SampleResult]) {
    out.push_str("| Sample | Verdict | Start | End | Avg | VLM | Notes |\n");
    out.push_str("|---|---|---|---|---|---|---|\n");
    for s in samples {
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} | {} | {} | {} |",
            s.sample_id,
            s.verdict.label(),
            score(s.frames.map(|f| f.start_similarity)),
            score(s.frames.map(|f| f.end_similarity)),
            score(s.frames.map(|f| f.average)),
            score(s.vlm.as_ref().map(|v| v.overall)),
            notes(s),
        );
    }
}

fn problem_list(out: &mut String, samples: &[SampleResult]) {
    let mut any = false;
    for s in samples {
        for reason in s.problems() {
            if !any {
                out.push_str("\n## Issues\n\n");
                any = true;
            }
            let _ = writeln!(
                out,
                "- **{}** [{}] {}: {}",
                s.sample_id,
                reason.verdict.label(),
                reason.check,
                reason.message
            );
        }
    }
}

pub fn render_run_markdown(report: &RunReport) -> String {
    let mut out = String::new();
    let s = &report.summary;
    let _ = writeln!(out, "# Bookend QA run {}\n", report.run_id);
    let _ = writeln!(out, "- Manifest: {}", report.manifest);
    let _ = writeln!(out, "- Backend: {}", report.backend);
    let _ = writeln!(out, "- Started: {}", report.started_at.to_rfc3339());
    let _ = writeln!(out, "- Verdict: **{}**\n", s.verdict.label());
    let _ = writeln!(
        out,
        "{} samples: {} pass, {} warn, {} fail. Mean similarity {}, mean VLM {}.\n",
        s.total,
        s.passed,
        s.warned,
        s.failed,
        score(s.mean_similarity),
        score(s.mean_vlm)
    );
    sample_table(&mut out, &report.samples);
    problem_list(&mut out, &report.samples);
    out
}

pub fn render_narrative_markdown(run: &NarrativeRun) -> String {
    let mut out = String::new();
    let s = &run.summary;
    let _ = writeln!(out, "# Narrative run {}: {}\n", run.run_id, run.title);
    let _ = writeln!(out, "- Script: {}", run.script_id);
    let _ = writeln!(out, "- Backend: {}", run.backend);
    let _ = writeln!(out, "- Verdict: **{}**\n", s.verdict.label());
    let _ = writeln!(
        out,
        "{} shots: {} pass, {} warn, {} fail. {} continuity failures.\n",
        s.total_shots, s.passed, s.warned, s.failed, s.continuity_failures
    );
    sample_table(&mut out, &run.shots);

    if !run.continuity.is_empty() {
        out.push_str("\n## Continuity\n\n");
        out.push_str("| From | To | Similarity | Verdict |\n");
        out.push_str("|---|---|---|---|\n");
        for c in &run.continuity {
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} |",
                c.from_shot,
                c.to_shot,
                score(c.similarity),
                c.verdict.label()
            );
        }
    }
    problem_list(&mut out, &run.shots);
    out
}

/// Plain-text A/B table for the terminal.
pub fn render_comparison(cmp: &AbComparison) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "A: {}  B: {}", cmp.run_a, cmp.run_b);
    let _ = writeln!(out, "{:<24} {:>8} {:>8} {:>8}  winner", "sample", "A", "B", "delta");
    for s in &cmp.samples {
        let winner = match s.winner {
            Winner::A => "A",
            Winner::B => "B",
            Winner::Tie => "tie",
            Winner::Missing => "missing",
        };
        let _ = writeln!(
            out,
            "{:<24} {:>8} {:>8} {:>8}  {}",
            s.sample_id,
            score(s.a_score),
            score(s.b_score),
            s.delta.map(|d| format!("{d:+.1}")).unwrap_or_else(|| "-".to_string()),
            winner
        );
    }
    let _ = writeln!(out, "A wins {}, B wins {}, ties {}", cmp.a_wins, cmp.b_wins, cmp.ties);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookend_models::{
        ContinuityCheck, FrameScores, NarrativeSummary, QualityThresholds, RunSummary, Verdict,
        VerdictReason,
    };
    use chrono::Utc;

    fn sample(id: &str, verdict: Verdict) -> SampleResult {
        let mut s = SampleResult::new(id, "prompt");
        s.frames = Some(FrameScores::new(82.0, 74.0));
        s.verdict = verdict;
        if verdict != Verdict::Pass {
            s.reasons
                .push(VerdictReason::new("end_similarity", verdict, "end_similarity 74.0 low"));
        }
        s
    }

    #[test]
    fn test_run_markdown() {
        let samples = vec![sample("s1", Verdict::Pass), sample("s2", Verdict::Warn)];
        let report = RunReport {
            run_id: "20250101-000000-abcd1234".to_string(),
            manifest: "smoke".to_string(),
            backend: "comfyui".to_string(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            thresholds: QualityThresholds::default(),
            summary: RunSummary::from_results(&samples),
            samples,
        };

        let md = render_run_markdown(&report);
        assert!(md.starts_with("# Bookend QA run 20250101-000000-abcd1234"));
        assert!(md.contains("| Sample | Verdict | Start | End | Avg | VLM | Notes |"));
        assert!(md.contains("| s1 | PASS | 82.0 | 74.0 | 78.0 | - |  |"));
        assert!(md.contains("| s2 | WARN | 82.0 | 74.0 | 78.0 | - | end_similarity |"));
        assert!(md.contains("## Issues"));
        assert!(md.contains("Verdict: **WARN**"));
    }

    #[test]
    fn test_narrative_markdown_has_continuity() {
        let shots = vec![sample("a", Verdict::Pass), sample("b", Verdict::Pass)];
        let continuity = vec![ContinuityCheck {
            from_shot: "a".to_string(),
            to_shot: "b".to_string(),
            similarity: Some(71.25),
            verdict: Verdict::Pass,
            message: String::new(),
        }];
        let run = NarrativeRun {
            run_id: "r".to_string(),
            script_id: "story".to_string(),
            title: "Story".to_string(),
            backend: "fake".to_string(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            summary: NarrativeSummary::from_parts(&shots, &continuity),
            shots,
            continuity,
        };

        let md = render_narrative_markdown(&run);
        assert!(md.contains("## Continuity"));
        assert!(md.contains("| a | b | 71.2 | PASS |") || md.contains("| a | b | 71.3 | PASS |"));
        assert!(!md.contains("## Issues"));
    }
}
