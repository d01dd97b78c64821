//! A/B comparison of two regression runs.

use std::collections::BTreeSet;

use bookend_models::{AbComparison, RunReport, SampleComparison, SampleResult, Winner};

/// Score differences smaller than this are a tie.
pub const TIE_MARGIN: f64 = 1.0;

/// Headline score for a sample: average frame similarity, blended 50/50 with
/// the VLM overall score when one exists.
pub fn sample_score(result: &SampleResult) -> Option<f64> {
    let average = result.frames.map(|f| f.average)?;
    Some(match &result.vlm {
        Some(vlm) => (average + vlm.overall) / 2.0,
        None => average,
    })
}

/// Compare every sample present in either run, ordered by sample id.
pub fn compare_reports(a: &RunReport, b: &RunReport) -> AbComparison {
    let ids: BTreeSet<&str> = a
        .samples
        .iter()
        .chain(&b.samples)
        .map(|s| s.sample_id.as_str())
        .collect();

    let samples: Vec<SampleComparison> = ids
        .into_iter()
        .map(|id| {
            let a_score = a.sample(id).and_then(sample_score);
            let b_score = b.sample(id).and_then(sample_score);
            let (delta, winner) = match (a_score, b_score) {
                (Some(sa), Some(sb)) => {
                    let delta = sb - sa;
                    let winner = if delta.abs() < TIE_MARGIN {
                        Winner::Tie
                    } else if delta > 0.0 {
                        Winner::B
                    } else {
                        Winner::A
                    };
                    (Some(delta), winner)
                }
                _ => (None, Winner::Missing),
            };
            SampleComparison {
                sample_id: id.to_string(),
                a_score,
                b_score,
                delta,
                winner,
            }
        })
        .collect();

    let count = |w: Winner| samples.iter().filter(|s| s.winner == w).count();
    AbComparison {
        run_a: a.run_id.clone(),
        run_b: b.run_id.clone(),
        a_wins: count(Winner::A),
        b_wins: count(Winner::B),
        ties: count(Winner::Tie),
        samples,
    }
}
