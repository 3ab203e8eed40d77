//! Room constraint composition
//!
//! Turns a client-supplied room type and optional layout analysis into the
//! instruction string for the generation call:
//!
//! ```text
//! room type -> normalize -> classify profile -> select strict block
//!           -> [guardrails, strict block, forbidden list] -> prompt
//! ```

mod profile;
mod prompts;
mod room_type;
mod rooms;

pub use profile::{KeywordProfileClassifier, Profile, ProfileAssessment, ProfileClassifier};
pub use prompts::{build_staging_prompt, forbidden_items, GLOBAL_FORBIDDEN, GLOBAL_GUARDRAILS};
pub use room_type::{normalize_room_type, RoomType};
pub use rooms::{room_spec, OptionalItem, RoomSpec, SizeTier, StagingTier};

use sha2::{Digest, Sha256};

use crate::ai::LayoutConstraints;

/// A composed prompt plus the decisions that shaped it
#[derive(Debug, Clone)]
pub struct StagingPrompt {
    pub room_type: RoomType,
    pub assessment: ProfileAssessment,
    pub prompt: String,
}

impl StagingPrompt {
    /// First 16 hex chars of the prompt's SHA-256
    pub fn prompt_hash(&self) -> String {
        let digest = Sha256::digest(self.prompt.as_bytes());
        hex::encode(&digest[..8])
    }
}

/// Composer with a pluggable profile classifier
pub struct RoomConstraintComposer<C: ProfileClassifier = KeywordProfileClassifier> {
    classifier: C,
}

impl Default for RoomConstraintComposer {
    fn default() -> Self {
        Self::new(KeywordProfileClassifier)
    }
}

impl<C: ProfileClassifier> RoomConstraintComposer<C> {
    pub fn new(classifier: C) -> Self {
        Self { classifier }
    }

    pub fn compose(&self, raw_room_type: &str, constraints: &LayoutConstraints) -> StagingPrompt {
        let room_type = normalize_room_type(raw_room_type);
        let spec = room_spec(room_type);
        let assessment = self.classifier.classify(spec, constraints);
        let prompt = build_staging_prompt(spec, &assessment, constraints);

        StagingPrompt {
            room_type,
            assessment,
            prompt,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_is_deterministic() {
        let composer = RoomConstraintComposer::default();
        let constraints = LayoutConstraints {
            notes: vec!["spacious corner with a bay window".into()],
            ..Default::default()
        };
        let first = composer.compose("living_room", &constraints);
        let second = composer.compose("Living Room", &constraints);
        assert_eq!(first.prompt, second.prompt);
        assert_eq!(first.prompt_hash(), second.prompt_hash());
        assert_eq!(first.prompt_hash().len(), 16);
        assert_eq!(first.assessment.tier(), StagingTier::Large);
    }

    #[test]
    fn test_bathroom_profiles_end_to_end() {
        let composer = RoomConstraintComposer::default();

        let walk_in = LayoutConstraints {
            notes: vec!["walk-in shower along the back wall".into()],
            ..Default::default()
        };
        let large = composer.compose("bathroom", &walk_in);
        assert_eq!(large.assessment.profile, Profile::Large);
        assert!(large.prompt.contains("BATHROOM (large profile)"));

        let powder = LayoutConstraints {
            notes: vec!["powder room, limited space".into()],
            ..Default::default()
        };
        let small = composer.compose("bathroom", &powder);
        assert_eq!(small.assessment.profile, Profile::Standard);
        assert!(small.assessment.is_constrained);
        assert!(small.prompt.contains("BATHROOM (constrained profile)"));
    }

    #[test]
    fn test_missing_analysis_still_yields_valid_prompt() {
        let staged = RoomConstraintComposer::default().compose("kitchen", &LayoutConstraints::default());
        assert_eq!(staged.room_type, RoomType::Kitchen);
        assert!(staged.prompt.starts_with(GLOBAL_GUARDRAILS));
        assert!(staged.prompt.contains("FORBIDDEN (never add):"));
    }

    struct AlwaysConstrained;

    impl ProfileClassifier for AlwaysConstrained {
        fn classify(&self, _: &RoomSpec, _: &LayoutConstraints) -> ProfileAssessment {
            ProfileAssessment {
                is_constrained: true,
                ..ProfileAssessment::standard()
            }
        }
    }

    #[test]
    fn test_classifier_is_pluggable() {
        let staged = RoomConstraintComposer::new(AlwaysConstrained).compose("bedroom", &LayoutConstraints::default());
        assert_eq!(staged.assessment.tier(), StagingTier::Constrained);
        assert!(staged.prompt.contains("BEDROOM (constrained profile)"));
    }
}
