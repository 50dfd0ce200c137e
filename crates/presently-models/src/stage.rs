//! Fixed pipeline stage table.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One step of the generation pipeline.
///
/// The order, checkpoints and messages are fixed; stages always run in
/// [`Stage::ALL`] order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Extract content from the source URL
    Extract,
    /// Generate presentation structure with the LLM
    Generate,
    /// Render the slide document
    Document,
    /// Pick background music
    Music,
    /// Synthesize narration audio
    Narration,
    /// Rasterize slides and assemble the video
    Video,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Extract,
        Stage::Generate,
        Stage::Document,
        Stage::Music,
        Stage::Narration,
        Stage::Video,
    ];

    /// 1-based stage index reported to clients as `step`.
    pub fn index(&self) -> u8 {
        match self {
            Stage::Extract => 1,
            Stage::Generate => 2,
            Stage::Document => 3,
            Stage::Music => 4,
            Stage::Narration => 5,
            Stage::Video => 6,
        }
    }

    /// Progress percentage recorded when the stage starts.
    pub fn checkpoint(&self) -> u8 {
        match self {
            Stage::Extract => 10,
            Stage::Generate => 30,
            Stage::Document => 45,
            Stage::Music => 55,
            Stage::Narration => 65,
            Stage::Video => 85,
        }
    }

    /// Status message shown while the stage runs.
    pub fn message(&self) -> &'static str {
        match self {
            Stage::Extract => "Extracting content from webpage...",
            Stage::Generate => "Generating presentation structure with AI...",
            Stage::Document => "Creating PowerPoint presentation...",
            Stage::Music => "Selecting background music...",
            Stage::Narration => "Generating AI narration...",
            Stage::Video => "Finalizing presentation and video...",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Extract => "extract",
            Stage::Generate => "generate",
            Stage::Document => "document",
            Stage::Music => "music",
            Stage::Narration => "narration",
            Stage::Video => "video",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkpoints_increase_in_stage_order() {
        let checkpoints: Vec<u8> = Stage::ALL.iter().map(|s| s.checkpoint()).collect();
        assert!(checkpoints.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(checkpoints.first(), Some(&10));
        assert_eq!(checkpoints.last(), Some(&85));
    }

    #[test]
    fn test_indices_are_one_based_and_contiguous() {
        for (i, stage) in Stage::ALL.iter().enumerate() {
            assert_eq!(stage.index() as usize, i + 1);
        }
    }
}
