use super::AnalysisResult;
use rand::Rng;
use std::ops::RangeInclusive;

/// Learner level, as chosen for the scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    /// Case-insensitive; anything unrecognized counts as intermediate
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "beginner" => Difficulty::Beginner,
            "advanced" => Difficulty::Advanced,
            _ => Difficulty::Intermediate,
        }
    }

    /// Bounds for fallback metrics
    pub fn score_range(self) -> RangeInclusive<u8> {
        match self {
            Difficulty::Beginner => 60..=75,
            Difficulty::Intermediate => 70..=85,
            Difficulty::Advanced => 80..=95,
        }
    }
}

/// Pseudo-random scorecard within the difficulty's bounds
pub fn fallback_scorecard<R: Rng + ?Sized>(difficulty: Difficulty, rng: &mut R) -> AnalysisResult {
    let range = difficulty.score_range();
    let mut score = || rng.gen_range(range.clone());

    AnalysisResult {
        fluency: score(),
        confidence: score(),
        grammar: score(),
        vocabulary: score(),
        pronunciation: score(),
        overall_score: score(),
        suggestions: vec![
            "Continue practicing regularly to build confidence".to_string(),
            "Focus on speaking in complete sentences".to_string(),
            "Try to expand your vocabulary in this topic".to_string(),
        ],
        strengths: vec![
            "Good effort in maintaining the conversation".to_string(),
            "Basic communication skills demonstrated".to_string(),
        ],
        weaknesses: vec![
            "Need more practice with this topic".to_string(),
            "Work on fluency and natural speech patterns".to_string(),
        ],
        hesitations: Vec::new(),
        detailed_feedback: Some(
            "This is a fallback analysis as AI analysis was unavailable. Continue practicing!"
                .to_string(),
        ),
        improvement_areas: Vec::new(),
        next_steps: Vec::new(),
        is_fallback: true,
    }
}
