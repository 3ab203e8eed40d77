//! Per-room staging modules
//!
//! Each room declares its required items, optional items with count ceilings,
//! forbidden items, the secondary zones that signal a larger layout, and the
//! limits for each size tier. The composer only dispatches on room type.

use super::room_type::RoomType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionalItem {
    pub name: &'static str,
    pub max: u8,
}

const fn opt(name: &'static str, max: u8) -> OptionalItem {
    OptionalItem { name, max }
}

/// Limits for one size tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeTier {
    /// Distinct optional items allowed
    pub max_optional: u8,
    /// Ceiling on all newly added pieces, required included
    pub max_new_pieces: u8,
    pub guidance: &'static str,
}

/// Resolved strictness tier for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagingTier {
    Standard,
    Large,
    Constrained,
}

impl StagingTier {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Large => "large",
            Self::Constrained => "constrained",
        }
    }
}

#[derive(Debug)]
pub struct RoomSpec {
    pub room_type: RoomType,
    pub required: &'static [&'static str],
    pub optional: &'static [OptionalItem],
    pub forbidden: &'static [&'static str],
    pub secondary_zones: &'static [&'static str],
    pub standard: SizeTier,
    pub large: SizeTier,
    pub constrained: SizeTier,
}

impl RoomSpec {
    pub fn tier(&self, tier: StagingTier) -> &SizeTier {
        match tier {
            StagingTier::Standard => &self.standard,
            StagingTier::Large => &self.large,
            StagingTier::Constrained => &self.constrained,
        }
    }
}

static LIVING_ROOM: RoomSpec = RoomSpec {
    room_type: RoomType::LivingRoom,
    required: &["sofa", "coffee table", "area rug"],
    optional: &[
        opt("armchair", 2),
        opt("side table", 2),
        opt("floor lamp", 1),
        opt("console table", 1),
        opt("bookshelf", 1),
        opt("potted plant", 2),
        opt("framed wall art", 2),
    ],
    forbidden: &["bed", "dining table", "office desk", "wall-mounted television"],
    secondary_zones: &["reading nook", "dining area", "bay window", "fireplace", "bar area"],
    standard: SizeTier {
        max_optional: 4,
        max_new_pieces: 8,
        guidance: "One main seating group scaled to the room, facing the focal wall or window.",
    },
    large: SizeTier {
        max_optional: 6,
        max_new_pieces: 12,
        guidance: "Anchor one main seating group; a detected secondary zone may get its own small grouping. Keep clear paths between zones.",
    },
    constrained: SizeTier {
        max_optional: 2,
        max_new_pieces: 5,
        guidance: "Apartment-scale pieces only: a loveseat or compact sofa, a small coffee table and at most two extras.",
    },
};

static BEDROOM: RoomSpec = RoomSpec {
    room_type: RoomType::Bedroom,
    required: &["bed with bedding", "nightstand"],
    optional: &[
        opt("second nightstand", 1),
        opt("dresser", 1),
        opt("table lamp", 2),
        opt("area rug", 1),
        opt("bench at the foot of the bed", 1),
        opt("accent chair", 1),
        opt("framed wall art", 2),
        opt("potted plant", 1),
    ],
    forbidden: &["sofa", "dining table", "second bed", "crib", "television"],
    secondary_zones: &["sitting area", "reading nook", "bay window", "walk-in closet"],
    standard: SizeTier {
        max_optional: 4,
        max_new_pieces: 7,
        guidance: "Queen bed centred on the main wall with clearance on both sides.",
    },
    large: SizeTier {
        max_optional: 6,
        max_new_pieces: 10,
        guidance: "King or queen bed on the main wall; a detected sitting area may get one chair and side table.",
    },
    constrained: SizeTier {
        max_optional: 1,
        max_new_pieces: 3,
        guidance: "Full or queen bed at most, one nightstand, nothing that narrows the walkway.",
    },
};

static KITCHEN: RoomSpec = RoomSpec {
    room_type: RoomType::Kitchen,
    required: &["simple countertop styling (fruit bowl or small plant)"],
    optional: &[
        opt("bar stool", 3),
        opt("small bistro table", 1),
        opt("bistro chair", 2),
        opt("potted herbs", 2),
        opt("runner rug", 1),
        opt("cutting board and cookbook vignette", 1),
    ],
    forbidden: &[
        "new cabinets",
        "new appliances",
        "countertop or backsplash changes",
        "sofa",
        "bed",
        "cluttered countertops",
    ],
    secondary_zones: &["kitchen island", "breakfast nook", "eat-in area", "peninsula"],
    standard: SizeTier {
        max_optional: 2,
        max_new_pieces: 4,
        guidance: "Light touch styling; countertops stay mostly clear.",
    },
    large: SizeTier {
        max_optional: 4,
        max_new_pieces: 8,
        guidance: "Stools only at an existing island or peninsula; a breakfast nook may get a small table with chairs.",
    },
    constrained: SizeTier {
        max_optional: 1,
        max_new_pieces: 2,
        guidance: "Galley scale: countertop styling only, nothing on the floor.",
    },
};

static DINING_ROOM: RoomSpec = RoomSpec {
    room_type: RoomType::DiningRoom,
    required: &["dining table", "dining chairs sized to the table"],
    optional: &[
        opt("sideboard", 1),
        opt("area rug under the table", 1),
        opt("table centerpiece", 1),
        opt("framed wall art", 2),
        opt("potted plant", 1),
        opt("bar cart", 1),
    ],
    forbidden: &["sofa", "bed", "office desk", "television"],
    secondary_zones: &["bar area", "bay window", "built-in buffet", "butler's pantry"],
    standard: SizeTier {
        max_optional: 3,
        max_new_pieces: 9,
        guidance: "Table for four to six centred under the light fixture.",
    },
    large: SizeTier {
        max_optional: 5,
        max_new_pieces: 13,
        guidance: "Table for six to eight centred under the light fixture with a sideboard along the long wall.",
    },
    constrained: SizeTier {
        max_optional: 1,
        max_new_pieces: 5,
        guidance: "Round or small table for two to four; keep chairs tucked in.",
    },
};

static BATHROOM: RoomSpec = RoomSpec {
    room_type: RoomType::Bathroom,
    required: &["folded towels", "bath mat"],
    optional: &[
        opt("small potted plant", 1),
        opt("vanity accessory set", 1),
        opt("small stool", 1),
        opt("framed wall art", 1),
        opt("rolled towels in a basket", 1),
        opt("candles", 2),
    ],
    forbidden: &[
        "furniture larger than a stool",
        "rugs covering the shower or tub",
        "toiletry clutter",
        "bed",
        "sofa",
    ],
    secondary_zones: &[
        "walk-in shower",
        "double vanity",
        "soaking tub",
        "freestanding tub",
        "separate tub",
    ],
    standard: SizeTier {
        max_optional: 2,
        max_new_pieces: 4,
        guidance: "Spa-like accents only; fixtures stay exactly as they are.",
    },
    large: SizeTier {
        max_optional: 4,
        max_new_pieces: 6,
        guidance: "Style the vanity and tub or shower area; a detected secondary zone may get one accent.",
    },
    constrained: SizeTier {
        max_optional: 1,
        max_new_pieces: 2,
        guidance: "Powder-room scale: towels, a mat and at most one small accent.",
    },
};

static HOME_OFFICE: RoomSpec = RoomSpec {
    room_type: RoomType::HomeOffice,
    required: &["desk", "desk chair"],
    optional: &[
        opt("bookshelf", 1),
        opt("desk lamp", 1),
        opt("floor lamp", 1),
        opt("accent chair", 1),
        opt("area rug", 1),
        opt("potted plant", 2),
        opt("framed wall art", 2),
        opt("filing cabinet", 1),
    ],
    forbidden: &["bed", "sectional sofa", "dining table", "second desk"],
    secondary_zones: &["reading nook", "built-in shelving", "bay window", "window seat"],
    standard: SizeTier {
        max_optional: 4,
        max_new_pieces: 7,
        guidance: "Desk facing into the room or toward the window, chair with clearance behind it.",
    },
    large: SizeTier {
        max_optional: 6,
        max_new_pieces: 10,
        guidance: "Desk zone plus an optional reading corner with one chair and a lamp.",
    },
    constrained: SizeTier {
        max_optional: 1,
        max_new_pieces: 3,
        guidance: "Compact writing desk against a wall, slim chair, nothing else on the floor.",
    },
};

static KIDS_ROOM: RoomSpec = RoomSpec {
    room_type: RoomType::KidsRoom,
    required: &["twin bed with bedding"],
    optional: &[
        opt("nightstand", 1),
        opt("toy storage", 1),
        opt("small desk", 1),
        opt("child-size chair", 1),
        opt("play rug", 1),
        opt("low bookshelf", 1),
        opt("framed wall art", 2),
        opt("soft toys", 3),
    ],
    forbidden: &[
        "king or queen bed",
        "office furniture",
        "sofa",
        "items with visible text or logos",
    ],
    secondary_zones: &["play area", "reading nook", "window seat", "closet nook"],
    standard: SizeTier {
        max_optional: 4,
        max_new_pieces: 7,
        guidance: "Bed against a wall, open floor left for play.",
    },
    large: SizeTier {
        max_optional: 6,
        max_new_pieces: 10,
        guidance: "Bed zone plus a defined play or reading zone on a rug.",
    },
    constrained: SizeTier {
        max_optional: 2,
        max_new_pieces: 4,
        guidance: "Twin bed and one storage piece; keep the floor open.",
    },
};

static GENERIC_ROOM: RoomSpec = RoomSpec {
    room_type: RoomType::Generic,
    required: &[],
    optional: &[
        opt("accent chair", 1),
        opt("side table", 1),
        opt("area rug", 1),
        opt("potted plant", 1),
        opt("framed wall art", 1),
    ],
    forbidden: &["bed", "dining table", "large furniture that blocks circulation"],
    secondary_zones: &[],
    standard: SizeTier {
        max_optional: 3,
        max_new_pieces: 3,
        guidance: "Neutral, minimal staging that suits the visible purpose of the space.",
    },
    large: SizeTier {
        max_optional: 4,
        max_new_pieces: 4,
        guidance: "Neutral, minimal staging; leave most of the floor open.",
    },
    constrained: SizeTier {
        max_optional: 1,
        max_new_pieces: 1,
        guidance: "A single small accent at most.",
    },
};

/// Dispatch to the staging module for a room type
pub fn room_spec(room_type: RoomType) -> &'static RoomSpec {
    match room_type {
        RoomType::LivingRoom => &LIVING_ROOM,
        RoomType::Bedroom => &BEDROOM,
        RoomType::Kitchen => &KITCHEN,
        RoomType::DiningRoom => &DINING_ROOM,
        RoomType::Bathroom => &BATHROOM,
        RoomType::HomeOffice => &HOME_OFFICE,
        RoomType::KidsRoom => &KIDS_ROOM,
        RoomType::Generic => &GENERIC_ROOM,
    }
}
