//! Room type normalization

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomType {
    LivingRoom,
    Bedroom,
    Kitchen,
    DiningRoom,
    Bathroom,
    HomeOffice,
    KidsRoom,
    /// Anything not recognised; staged conservatively
    Generic,
}

impl RoomType {
    pub fn label(&self) -> &'static str {
        match self {
            Self::LivingRoom => "living room",
            Self::Bedroom => "bedroom",
            Self::Kitchen => "kitchen",
            Self::DiningRoom => "dining room",
            Self::Bathroom => "bathroom",
            Self::HomeOffice => "home office",
            Self::KidsRoom => "kids room",
            Self::Generic => "room",
        }
    }
}

impl std::fmt::Display for RoomType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Map free-form client input onto a known room type
///
/// Lowercases, drops apostrophes, treats `_` and `-` as spaces and collapses
/// whitespace before alias lookup.
pub fn normalize_room_type(raw: &str) -> RoomType {
    let cleaned: String = raw
        .to_lowercase()
        .chars()
        .filter(|c| *c != '\'')
        .map(|c| if c == '_' || c == '-' { ' ' } else { c })
        .collect();
    let key = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");

    match key.as_str() {
        "living room" | "living" | "livingroom" | "lounge" | "family room" | "den"
        | "great room" | "sitting room" => RoomType::LivingRoom,
        "bedroom" | "master bedroom" | "primary bedroom" | "guest bedroom" | "guest room" => {
            RoomType::Bedroom
        }
        "kitchen" | "eat in kitchen" => RoomType::Kitchen,
        "dining room" | "dining" | "dining area" | "diningroom" => RoomType::DiningRoom,
        "bathroom" | "bath" | "ensuite" | "en suite" | "powder room" | "restroom"
        | "washroom" => RoomType::Bathroom,
        "home office" | "office" | "study" | "workspace" => RoomType::HomeOffice,
        "kids room" | "kids bedroom" | "childrens room" | "nursery" | "playroom" => {
            RoomType::KidsRoom
        }
        _ => RoomType::Generic,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases() {
        assert_eq!(normalize_room_type("Living Room"), RoomType::LivingRoom);
        assert_eq!(normalize_room_type("living_room"), RoomType::LivingRoom);
        assert_eq!(normalize_room_type("  lounge "), RoomType::LivingRoom);
        assert_eq!(normalize_room_type("master-bedroom"), RoomType::Bedroom);
        assert_eq!(normalize_room_type("Powder Room"), RoomType::Bathroom);
        assert_eq!(normalize_room_type("study"), RoomType::HomeOffice);
        assert_eq!(normalize_room_type("Kid's Room"), RoomType::KidsRoom);
        assert_eq!(normalize_room_type("children's room"), RoomType::KidsRoom);
    }

    #[test]
    fn test_unknown_is_generic() {
        assert_eq!(normalize_room_type("garage"), RoomType::Generic);
        assert_eq!(normalize_room_type(""), RoomType::Generic);
    }
}
