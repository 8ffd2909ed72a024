//! The meme generation pipeline.
//!
//! Every "AI" stage here is a mock: trending topics are a static list that gets
//! randomly subsampled, captions come from fixed templates interpolating the
//! product name, and virality scores are random draws with a small keyword
//! boost. The artificial delays simulate calls to external model services.

use std::time::Duration;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info};

/// A trending topic as the (mock) scraper reports it. Never persisted.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct TrendingTopic {
    pub topic: String,
    pub popularity: u32,
    pub category: String,
}

/// A meme as produced by the pipeline, before it is persisted.
/// Serialized camelCase because it goes straight into the generate response.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedMeme {
    pub caption: String,
    pub image_url: String,
    pub virality_score: u8,
    pub is_safe: bool,
    pub safety_flags: Vec<String>,
}

/// Everything a single pipeline run produces.
#[derive(Debug)]
pub struct PipelineOutput {
    pub memes: Vec<GeneratedMeme>,
    pub trending_topics: Vec<TrendingTopic>,
}

const MOCK_TRENDING_TOPICS: &[(&str, u32, &str)] = &[
    ("AI taking over", 95, "technology"),
    ("Work from home life", 88, "lifestyle"),
    ("Gen Z humor", 92, "culture"),
    ("Sustainable living", 76, "environment"),
    ("Crypto confusion", 84, "finance"),
    ("Social media addiction", 89, "social"),
    ("Productivity hacks", 78, "lifestyle"),
    ("Streaming wars", 82, "entertainment"),
];

const TRENDING_SAMPLE_SIZE: usize = 5;
const MEME_SAMPLE_SIZE: usize = 3;

/// Keywords that give a caption a virality boost.
const VIRAL_KEYWORDS: [&str; 5] = ["pov", "me:", "when", "vs", "actually"];

/// Static blocklist backing the appropriateness filter.
const INAPPROPRIATE_KEYWORDS: [&str; 5] =
    ["hate", "violence", "explicit", "offensive", "discriminatory"];

/// Orchestrates the mocked pipeline stages. The delays are configurable so
/// tests can run the pipeline without waiting on simulated latency.
#[derive(Debug, Clone)]
pub struct MemePipeline {
    pub scrape_delay: Duration,
    pub generate_delay: Duration,
}

impl Default for MemePipeline {
    fn default() -> Self {
        Self {
            scrape_delay: Duration::from_secs(1),
            generate_delay: Duration::from_secs(2),
        }
    }
}

impl MemePipeline {
    /// A pipeline with zero simulated latency.
    pub fn instant() -> Self {
        Self {
            scrape_delay: Duration::ZERO,
            generate_delay: Duration::ZERO,
        }
    }

    /// Runs the full pipeline for one product submission.
    pub async fn run(&self, product_name: &str, product_description: &str) -> PipelineOutput {
        info!(%product_name, "Starting meme generation pipeline");

        debug!("Scraping trending topics");
        let trending_topics = self.scrape_trending_topics().await;

        debug!("Generating meme prompts");
        let prompts = generate_meme_prompts(product_name, product_description, &trending_topics);

        debug!(prompt_count = prompts.len(), "Generating memes");
        let mut memes = self.generate_memes(&prompts, product_name).await;

        debug!(meme_count = memes.len(), "Scoring and filtering memes");
        for meme in &mut memes {
            meme.virality_score = predict_virality(&meme.caption);
            let (is_safe, safety_flags) = check_appropriateness(&meme.caption);
            meme.is_safe = is_safe;
            meme.safety_flags = safety_flags;
        }

        info!(meme_count = memes.len(), "Pipeline complete");
        PipelineOutput {
            memes,
            trending_topics,
        }
    }

    /// Mock scraper stage: returns a random subsample of the static topics.
    pub async fn scrape_trending_topics(&self) -> Vec<TrendingTopic> {
        tokio::time::sleep(self.scrape_delay).await;

        let mut topics: Vec<TrendingTopic> = MOCK_TRENDING_TOPICS
            .iter()
            .map(|&(topic, popularity, category)| TrendingTopic {
                topic: topic.to_string(),
                popularity,
                category: category.to_string(),
            })
            .collect();
        topics.shuffle(&mut rand::thread_rng());
        topics.truncate(TRENDING_SAMPLE_SIZE);
        topics
    }

    /// Mock generation stage: interpolates the product name into fixed caption
    /// templates and returns a random subsample. The base scores rolled here
    /// are overwritten by `predict_virality` in the orchestrator.
    pub async fn generate_memes(
        &self,
        _prompts: &[String],
        product_name: &str,
    ) -> Vec<GeneratedMeme> {
        tokio::time::sleep(self.generate_delay).await;

        let mut rng = rand::thread_rng();
        let mut variations = vec![
            GeneratedMeme {
                caption: format!("When you realize {product_name} actually works as advertised"),
                image_url: "/surprised-pikachu-meme.png".to_string(),
                virality_score: rng.gen_range(70..100),
                is_safe: true,
                safety_flags: Vec::new(),
            },
            GeneratedMeme {
                caption: format!(
                    "Me: I don't need {product_name}\nAlso me: *buys {product_name}*"
                ),
                image_url: "/drake-pointing-meme.jpg".to_string(),
                virality_score: rng.gen_range(65..90),
                is_safe: true,
                safety_flags: Vec::new(),
            },
            GeneratedMeme {
                caption: format!(
                    "POV: You're explaining why {product_name} is worth the investment"
                ),
                image_url: "/charlie-conspiracy-meme.jpg".to_string(),
                virality_score: rng.gen_range(60..95),
                is_safe: true,
                safety_flags: Vec::new(),
            },
            GeneratedMeme {
                caption: format!("{product_name} users vs everyone else"),
                image_url: "/chad-vs-virgin-meme.jpg".to_string(),
                virality_score: rng.gen_range(55..95),
                is_safe: true,
                safety_flags: Vec::new(),
            },
            GeneratedMeme {
                caption: format!("When {product_name} goes on sale"),
                image_url: "/running-crowd-meme.jpg".to_string(),
                virality_score: rng.gen_range(75..95),
                is_safe: true,
                safety_flags: Vec::new(),
            },
        ];
        variations.shuffle(&mut rng);
        variations.truncate(MEME_SAMPLE_SIZE);
        variations
    }
}

/// Prompt generator stage: combines product info with trending topics.
/// Prompts missing the product name are filtered out; by construction every
/// template includes it, so this only drops entries when fewer than five
/// topics are available.
pub fn generate_meme_prompts(
    product_name: &str,
    _product_description: &str,
    trending_topics: &[TrendingTopic],
) -> Vec<String> {
    let topic = |i: usize| {
        trending_topics
            .get(i)
            .map(|t| t.topic.as_str())
            .unwrap_or_default()
    };

    let prompts = vec![
        format!(
            "Create a funny meme about {product_name} using the trending topic: {}",
            topic(0)
        ),
        format!(
            "Make a relatable meme connecting {product_name} to {}",
            topic(1)
        ),
        format!(
            "Generate a humorous caption for {product_name} that references {}",
            topic(2)
        ),
        format!(
            "Create a witty meme about how {product_name} solves problems related to {}",
            topic(3)
        ),
        format!(
            "Make a funny comparison meme featuring {product_name} and {}",
            topic(4)
        ),
    ];

    prompts
        .into_iter()
        .filter(|prompt| prompt.contains(product_name))
        .collect()
}

/// Virality prediction stage: random base score plus a boost for captions
/// containing viral keywords or landing in the sweet-spot length, capped at 100.
pub fn predict_virality(caption: &str) -> u8 {
    let mut score: u32 = rand::thread_rng().gen_range(50..90);

    let lowered = caption.to_lowercase();
    if VIRAL_KEYWORDS.iter().any(|kw| lowered.contains(kw)) {
        score += 10;
    }
    if caption.len() > 50 && caption.len() < 100 {
        score += 5;
    }

    score.min(100) as u8
}

/// Appropriateness filter stage: flags captions containing blocklisted
/// keywords. A caption is safe iff it produced no flags.
pub fn check_appropriateness(caption: &str) -> (bool, Vec<String>) {
    let lowered = caption.to_lowercase();
    let safety_flags: Vec<String> = INAPPROPRIATE_KEYWORDS
        .iter()
        .filter(|kw| lowered.contains(*kw))
        .map(|kw| format!("Contains potentially {kw} content"))
        .collect();

    (safety_flags.is_empty(), safety_flags)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scrape_returns_a_five_topic_subsample() {
        let pipeline = MemePipeline::instant();
        let topics = pipeline.scrape_trending_topics().await;
        assert_eq!(topics.len(), TRENDING_SAMPLE_SIZE);
        for topic in &topics {
            assert!(
                MOCK_TRENDING_TOPICS
                    .iter()
                    .any(|&(name, pop, cat)| name == topic.topic
                        && pop == topic.popularity
                        && cat == topic.category),
                "unexpected topic: {topic:?}"
            );
        }
    }

    #[test]
    fn prompts_all_mention_the_product() {
        let topics: Vec<TrendingTopic> = MOCK_TRENDING_TOPICS[..5]
            .iter()
            .map(|&(topic, popularity, category)| TrendingTopic {
                topic: topic.to_string(),
                popularity,
                category: category.to_string(),
            })
            .collect();

        let prompts = generate_meme_prompts("RoboMop", "a robot mop", &topics);
        assert_eq!(prompts.len(), 5);
        assert!(prompts.iter().all(|p| p.contains("RoboMop")));
        assert!(prompts[0].contains(&topics[0].topic));
    }

    #[tokio::test]
    async fn generation_returns_three_captioned_memes() {
        let pipeline = MemePipeline::instant();
        let memes = pipeline.generate_memes(&[], "RoboMop").await;
        assert_eq!(memes.len(), MEME_SAMPLE_SIZE);
        for meme in &memes {
            assert!(meme.caption.contains("RoboMop"));
            assert!(meme.image_url.starts_with('/'));
        }
    }

    #[test]
    fn virality_scores_stay_within_bounds() {
        for _ in 0..200 {
            let plain = predict_virality("hello world");
            assert!((50..90).contains(&(plain as u32)));

            // Keyword + sweet-spot length caption can collect every boost.
            let boosted =
                predict_virality("POV: You're explaining why RoboMop is worth the investment");
            assert!((60..=100).contains(&(boosted as u32)));
        }
    }

    #[test]
    fn blocklisted_caption_is_flagged() {
        let (is_safe, flags) = check_appropriateness("this caption is full of hate and violence");
        assert!(!is_safe);
        assert_eq!(
            flags,
            vec![
                "Contains potentially hate content".to_string(),
                "Contains potentially violence content".to_string(),
            ]
        );
    }

    #[test]
    fn clean_caption_is_safe() {
        let (is_safe, flags) = check_appropriateness("When RoboMop goes on sale");
        assert!(is_safe);
        assert!(flags.is_empty());
    }

    #[tokio::test]
    async fn run_rescores_and_filters_every_meme() {
        let pipeline = MemePipeline::instant();
        let output = pipeline.run("RoboMop", "a robot mop").await;

        assert_eq!(output.memes.len(), MEME_SAMPLE_SIZE);
        assert_eq!(output.trending_topics.len(), TRENDING_SAMPLE_SIZE);
        for meme in &output.memes {
            assert!(meme.virality_score <= 100);
            // Templates contain no blocklisted keywords.
            assert!(meme.is_safe);
            assert!(meme.safety_flags.is_empty());
        }
    }
}
