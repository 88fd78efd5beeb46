// Headline scoring with the VADER compound score

use vader_sentiment::SentimentIntensityAnalyzer;

/// Maximum number of headlines folded into one aggregate score
pub const MAX_HEADLINES: usize = 10;

fn compound(analyzer: &SentimentIntensityAnalyzer, text: &str) -> f64 {
    if text.trim().is_empty() {
        return 0.0;
    }
    let score = analyzer
        .polarity_scores(text)
        .get("compound")
        .copied()
        .unwrap_or(0.0);
    if score.is_finite() {
        score.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// Compound score of one text in [-1, 1]; 0.0 for empty or neutral text
pub fn score_text(text: &str) -> f64 {
    compound(&SentimentIntensityAnalyzer::new(), text)
}

/// Mean compound score over at most [`MAX_HEADLINES`] headlines
pub fn aggregate_headlines(headlines: &[String]) -> f64 {
    let analyzer = SentimentIntensityAnalyzer::new();
    let scores: Vec<f64> = headlines
        .iter()
        .take(MAX_HEADLINES)
        .map(|h| compound(&analyzer, h))
        .collect();

    if scores.is_empty() {
        return 0.0;
    }
    scores.iter().sum::<f64>() / scores.len() as f64
}
