// News sentiment module
pub mod vader;

use crate::api::HeadlineSource;
use anyhow::Result;
use async_trait::async_trait;
use vader::{aggregate_headlines, MAX_HEADLINES};
use std::sync::Arc;

/// Provides a compound sentiment score in [-1, 1] for a plain symbol
#[async_trait]
pub trait SentimentSource: Send + Sync {
    async fn score(&self, symbol: &str) -> Result<f64>;
}

/// Scores the latest news headlines of a symbol with VADER
pub struct HeadlineSentiment {
    headlines: Arc<dyn HeadlineSource>,
}

impl HeadlineSentiment {
    pub fn new(headlines: Arc<dyn HeadlineSource>) -> Self {
        Self { headlines }
    }
}

#[async_trait]
impl SentimentSource for HeadlineSentiment {
    async fn score(&self, symbol: &str) -> Result<f64> {
        let headlines = self.headlines.headlines(symbol, MAX_HEADLINES).await?;
        tracing::debug!(symbol, count = headlines.len(), "Scoring headlines");
        Ok(aggregate_headlines(&headlines))
    }
}

/// Constant score, for running without a news provider
pub struct FixedSentiment(pub f64);

#[async_trait]
impl SentimentSource for FixedSentiment {
    async fn score(&self, _symbol: &str) -> Result<f64> {
        Ok(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticHeadlines(Vec<String>);

    #[async_trait]
    impl HeadlineSource for StaticHeadlines {
        async fn headlines(&self, _symbol: &str, limit: usize) -> Result<Vec<String>> {
            Ok(self.0.iter().take(limit).cloned().collect())
        }
    }

    struct FailingHeadlines;

    #[async_trait]
    impl HeadlineSource for FailingHeadlines {
        async fn headlines(&self, _symbol: &str, _limit: usize) -> Result<Vec<String>> {
            anyhow::bail!("search endpoint unavailable")
        }
    }

    #[tokio::test]
    async fn test_headline_sentiment_scores() {
        let source = HeadlineSentiment::new(Arc::new(StaticHeadlines(vec![
            "Great quarter for Infosys".to_string(),
            "Infosys posts a good win".to_string(),
        ])));
        assert!(source.score("INFY").await.unwrap() > 0.0);
    }

    #[tokio::test]
    async fn test_no_headlines_is_neutral() {
        let source = HeadlineSentiment::new(Arc::new(StaticHeadlines(Vec::new())));
        assert_eq!(source.score("INFY").await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_provider_failure_propagates() {
        let source = HeadlineSentiment::new(Arc::new(FailingHeadlines));
        assert!(source.score("INFY").await.is_err());
    }

    #[test]
    fn test_fixed_sentiment() {
        let score = tokio_test::block_on(FixedSentiment(-0.25).score("TCS")).unwrap();
        assert_eq!(score, -0.25);
    }
}
