//! Layout profile classification
//!
//! Decides how much furniture a room can take from the analyzer's free-text
//! notes and placements. Constrained signals always win over large ones: when
//! the cues conflict we under-furnish.

use once_cell::sync::Lazy;
use regex::{RegexSet, RegexSetBuilder};
use serde::Serialize;
use tracing::warn;

use super::rooms::{RoomSpec, StagingTier};
use crate::ai::LayoutConstraints;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    Standard,
    Large,
}

/// Classification result with the evidence behind it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileAssessment {
    pub profile: Profile,
    pub is_constrained: bool,
    pub large_cues: usize,
    pub constrained_cues: usize,
    pub secondary_zones: Vec<&'static str>,
}

impl ProfileAssessment {
    /// Baseline used when there is nothing to classify
    pub fn standard() -> Self {
        Self {
            profile: Profile::Standard,
            is_constrained: false,
            large_cues: 0,
            constrained_cues: 0,
            secondary_zones: Vec::new(),
        }
    }

    pub fn tier(&self) -> StagingTier {
        match (self.is_constrained, self.profile) {
            (true, _) => StagingTier::Constrained,
            (false, Profile::Large) => StagingTier::Large,
            (false, Profile::Standard) => StagingTier::Standard,
        }
    }
}

/// Seam for swapping the keyword heuristic for a structured classifier
pub trait ProfileClassifier: Send + Sync {
    fn classify(&self, room: &RoomSpec, constraints: &LayoutConstraints) -> ProfileAssessment;
}

static LARGE_CUES: Lazy<RegexSet> = Lazy::new(|| {
    cue_set(&[
        r"\blarge\b",
        r"\bspacious\b",
        r"\bopen[ -]?(plan|concept)\b",
        r"\bexpansive\b",
        r"\boversized\b",
        r"\bgenerous\b",
        r"\bample (floor )?space\b",
        r"\b(vaulted|double[ -]height) ceilings?\b",
    ])
});

static CONSTRAINED_CUES: Lazy<RegexSet> = Lazy::new(|| {
    cue_set(&[
        r"\bsmall\b",
        r"\bnarrow\b",
        r"\bcompact\b",
        r"\blimited (floor )?space\b",
        r"\btight\b",
        r"\bcramped\b",
        r"\btiny\b",
        r"\bpowder room\b",
        r"\bgalley\b",
    ])
});

fn cue_set(patterns: &[&str]) -> RegexSet {
    RegexSetBuilder::new(patterns)
        .case_insensitive(true)
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "Profile cue patterns failed to compile, keyword classification disabled");
            RegexSet::empty()
        })
}

/// Keyword heuristic over notes and preferred placements
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordProfileClassifier;

impl ProfileClassifier for KeywordProfileClassifier {
    fn classify(&self, room: &RoomSpec, constraints: &LayoutConstraints) -> ProfileAssessment {
        let text = constraints
            .notes
            .iter()
            .chain(constraints.preferred_placements.iter())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n");
        if text.trim().is_empty() {
            return ProfileAssessment::standard();
        }

        let large_cues = LARGE_CUES.matches(&text).iter().count();
        let constrained_cues = CONSTRAINED_CUES.matches(&text).iter().count();
        let lowered = text.to_lowercase();
        let secondary_zones: Vec<&'static str> = room
            .secondary_zones
            .iter()
            .copied()
            .filter(|zone| lowered.contains(zone))
            .collect();

        let is_constrained = constrained_cues > 0;
        let profile = if !is_constrained && (large_cues > 0 || !secondary_zones.is_empty()) {
            Profile::Large
        } else {
            Profile::Standard
        };

        ProfileAssessment {
            profile,
            is_constrained,
            large_cues,
            constrained_cues,
            secondary_zones,
        }
    }
}
