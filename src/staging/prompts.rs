//! Staging prompt assembly
//!
//! Output is a pure function of the room type and layout constraints:
//! global guardrails, then the room's strict block, then the forbidden list.

use super::profile::ProfileAssessment;
use super::rooms::{RoomSpec, StagingTier};
use crate::ai::LayoutConstraints;

/// Rules that apply to every room
pub const GLOBAL_GUARDRAILS: &str = r#"VIRTUAL STAGING RULES:
1. Preserve the room exactly as photographed: walls, floors, ceilings, windows, doors, trim, built-ins, fixtures, outlets and light sources stay unchanged.
2. Keep the original camera angle, perspective, framing, exposure and natural light direction.
3. Only add movable furniture and decor. Never remodel, repaint, or change any surface material.
4. Every added piece must be at realistic scale, rest on the floor or a surface, and cast shadows consistent with the existing light.
5. Keep doorways, windows and walkways unobstructed.
6. The result must read as a professional, photorealistic real-estate photograph."#;

/// Never added in any room
pub const GLOBAL_FORBIDDEN: &[&str] = &[
    "people",
    "pets",
    "text, logos or watermarks",
    "new windows, doors or openings",
    "structural or architectural changes",
    "changes to flooring, wall color or ceiling",
];

/// Render the room-specific block for the chosen tier
pub fn render_strict_block(
    room: &RoomSpec,
    assessment: &ProfileAssessment,
    constraints: &LayoutConstraints,
) -> String {
    let tier = assessment.tier();
    let limits = room.tier(tier);
    let mut block = format!(
        "ROOM RULES: {} ({} profile)",
        room.room_type.label().to_uppercase(),
        tier.label()
    );

    if room.required.is_empty() {
        block.push_str("\nREQUIRED ITEMS: none");
    } else {
        block.push_str("\nREQUIRED ITEMS (include each exactly once):");
        for item in room.required {
            block.push_str(&format!("\n- {}", item));
        }
    }

    if limits.max_optional == 0 || room.optional.is_empty() {
        block.push_str("\nOPTIONAL ITEMS: none allowed");
    } else {
        block.push_str(&format!(
            "\nOPTIONAL ITEMS (only where space clearly allows; at most {} different items):",
            limits.max_optional
        ));
        for item in room.optional {
            block.push_str(&format!("\n- {} (max {})", item.name, item.max));
        }
    }

    block.push_str(&format!(
        "\nMAXIMUM NEW PIECES: {}\nSIZE GUIDANCE: {}",
        limits.max_new_pieces, limits.guidance
    ));

    if tier == StagingTier::Large && !assessment.secondary_zones.is_empty() {
        block.push_str(&format!(
            "\nSECONDARY ZONES: {}. Style each with at most one accent and add no fixtures.",
            assessment.secondary_zones.join(", ")
        ));
    }
    if tier == StagingTier::Constrained {
        block.push_str("\nSPACE IS LIMITED: when in doubt, leave it out.");
    }

    block.push_str(&render_layout(constraints));
    block
}

fn render_layout(constraints: &LayoutConstraints) -> String {
    if constraints.is_empty() {
        return "\nLAYOUT: no analysis available; keep every doorway, window and walkway clear."
            .to_string();
    }

    let mut layout = String::from("\nLAYOUT:");
    for zone in &constraints.no_furniture_zones {
        layout.push_str(&format!("\n- Keep clear: {}", zone.trim()));
    }
    for placement in &constraints.preferred_placements {
        layout.push_str(&format!("\n- Preferred placement: {}", placement.trim()));
    }
    for note in &constraints.notes {
        layout.push_str(&format!("\n- Note: {}", note.trim()));
    }
    layout
}

/// Global plus room-specific forbidden items, without duplicates
pub fn forbidden_items(room: &RoomSpec) -> Vec<&'static str> {
    let mut items: Vec<&'static str> = Vec::new();
    for item in GLOBAL_FORBIDDEN.iter().chain(room.forbidden.iter()) {
        if !items.contains(item) {
            items.push(item);
        }
    }
    items
}

pub fn render_forbidden(room: &RoomSpec) -> String {
    let mut section = String::from("FORBIDDEN (never add):");
    for item in forbidden_items(room) {
        section.push_str(&format!("\n- {}", item));
    }
    section
}

/// Concatenate the three sections into the final instruction string
pub fn build_staging_prompt(
    room: &RoomSpec,
    assessment: &ProfileAssessment,
    constraints: &LayoutConstraints,
) -> String {
    [
        GLOBAL_GUARDRAILS.to_string(),
        render_strict_block(room, assessment, constraints),
        render_forbidden(room),
    ]
    .join("\n\n")
}
