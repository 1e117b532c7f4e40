use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::OffsetDateTime;
use uuid::Uuid;

/// A player's profile as returned by the ranking api.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub uuid: Uuid,
    pub name: String,
    /// Game mode key to ranking, in the order the api listed them.
    #[serde(with = "ordered")]
    pub rankings: Vec<(String, Ranking)>,
    #[serde(default)]
    pub region: Region,
    pub points: u32,
    pub overall: u32,
    #[serde(default)]
    pub badges: Vec<Badge>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ranking {
    pub tier: u32,
    pub pos: u32,
    #[serde(default)]
    pub peak_tier: Option<u32>,
    #[serde(default)]
    pub peak_pos: Option<u32>,
    #[serde(with = "time::serde::timestamp")]
    pub attained: OffsetDateTime,
    #[serde(default)]
    pub retired: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Badge {
    pub title: String,
    pub desc: String,
}

impl PlayerInfo {
    pub fn ranking(&self, mode: &str) -> Option<&Ranking> {
        self.rankings
            .iter()
            .find_map(|(key, ranking)| (key == mode).then_some(ranking))
    }

    /// Rankings with active ones first, then by tier and position.
    ///
    /// The sort is stable, so equal rankings keep the api's order.
    pub fn sorted_rankings(&self) -> Vec<(&str, &Ranking)> {
        let mut list = self
            .rankings
            .iter()
            .map(|(mode, ranking)| (&**mode, ranking))
            .collect::<Vec<_>>();
        list.sort_by_key(|(_, r)| (r.retired, r.tier, r.pos));
        list
    }

    pub fn point_tier(&self) -> PointTier {
        PointTier::classify(self.points, self.rankings.iter().map(|(_, r)| r))
    }
}

impl Ranking {
    /// The label to show for this ranking, or `None` when it should be hidden.
    ///
    /// A retired ranking with a recorded peak is shown by its peak, unless
    /// `show_retired` is off.
    pub fn classify(&self, show_retired: bool) -> Option<TierLabel> {
        match (self.retired, self.peak_tier, self.peak_pos) {
            (true, Some(tier), Some(pos)) => show_retired.then_some(TierLabel {
                retired: true,
                high: pos == 0,
                tier,
            }),
            _ => Some(TierLabel {
                retired: false,
                high: self.pos == 0,
                tier: self.tier,
            }),
        }
    }

    fn is_top_two(&self) -> bool {
        self.tier <= 2 || self.peak_tier.is_some_and(|peak| peak <= 2)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TierLabel {
    pub retired: bool,
    pub high: bool,
    pub tier: u32,
}

impl TierLabel {
    pub const fn color(&self) -> u32 {
        match (self.retired, self.high, self.tier) {
            (false, true, 1) => 0xCC0000,
            (false, false, 1) => 0xFF4B4B,
            (false, true, 2) => 0x0FB5C7,
            (false, false, 2) => 0xA3F6FF,
            (false, true, 3) => 0xFFBD47,
            (false, false, 3) => 0xFFE197,
            (false, true, 4) => 0x6AA343,
            (false, false, 4) => 0xA9D08E,
            (false, true, 5) => 0x595959,
            (false, false, 5) => 0x868282,
            (true, true, 1) => 0x893B8B,
            (true, false, 1) => 0xAE55B7,
            (true, true, 2) => 0x4C3AB8,
            (true, false, 2) => 0x6E5FDB,
            _ => 0xD3D3D3,
        }
    }
}

impl fmt::Display for TierLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.retired {
            f.write_str("R")?;
        }
        let half = if self.high { "H" } else { "L" };
        write!(f, "{half}T{}", self.tier)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PointTier {
    CombatMaster,
    CombatAce,
    CombatSpecialist,
    CombatCadet,
    CombatNovice,
    Rookie,
    Unranked,
}

impl PointTier {
    pub fn classify<'a>(points: u32, mut rankings: impl Iterator<Item = &'a Ranking>) -> Self {
        match points {
            235.. if rankings.all(Ranking::is_top_two) => Self::CombatMaster,
            100.. => Self::CombatAce,
            50.. => Self::CombatSpecialist,
            20.. => Self::CombatCadet,
            10.. => Self::CombatNovice,
            1.. => Self::Rookie,
            0 => Self::Unranked,
        }
    }

    pub const fn title(&self) -> &'static str {
        match self {
            Self::CombatMaster => "Combat Master",
            Self::CombatAce => "Combat Ace",
            Self::CombatSpecialist => "Combat Specialist",
            Self::CombatCadet => "Combat Cadet",
            Self::CombatNovice => "Combat Novice",
            Self::Rookie => "Rookie",
            Self::Unranked => "Unranked",
        }
    }

    pub const fn color(&self) -> u32 {
        match self {
            Self::CombatMaster => 0xFBB03B,
            Self::CombatAce => 0xCD285C,
            Self::CombatSpecialist => 0xAD78D8,
            Self::CombatCadet | Self::CombatNovice => 0x9291D9,
            Self::Rookie => 0x6C7178,
            Self::Unranked => 0xFFFFFF,
        }
    }

    pub const fn accent_color(&self) -> u32 {
        match self {
            Self::CombatMaster => 0xFFD13A,
            Self::CombatAce => 0xD65474,
            Self::CombatSpecialist => 0xC7A3E8,
            Self::CombatCadet => 0xADACE2,
            Self::CombatNovice | Self::Unranked => 0xFFFFFF,
            Self::Rookie => 0x8B979C,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Region {
    NA,
    EU,
    SA,
    AU,
    ME,
    AS,
    AF,
    #[default]
    Unknown,
}

impl Region {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NA => "NA",
            Self::EU => "EU",
            Self::SA => "SA",
            Self::AU => "AU",
            Self::ME => "ME",
            Self::AS => "AS",
            Self::AF => "AF",
            Self::Unknown => "??",
        }
    }

    pub const fn color(&self) -> u32 {
        match self {
            Self::NA => 0xFF6A6E,
            Self::EU => 0x6AFF6E,
            Self::SA => 0xFF9900,
            Self::AU => 0xF6B26B,
            Self::ME => 0xFFD966,
            Self::AS => 0xC27BA0,
            Self::AF => 0x674EA7,
            Self::Unknown => 0xD3D3D3,
        }
    }

    pub fn parse(code: &str) -> Self {
        match &*code.trim().to_ascii_uppercase() {
            "NA" => Self::NA,
            "EU" => Self::EU,
            "SA" => Self::SA,
            "AU" => Self::AU,
            "ME" => Self::ME,
            "AS" => Self::AS,
            "AF" => Self::AF,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Region {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Unknown => serializer.serialize_none(),
            region => serializer.serialize_str(region.as_str()),
        }
    }
}

impl<'de> Deserialize<'de> for Region {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = Option::<String>::deserialize(deserializer)?;
        Ok(code.as_deref().map(Self::parse).unwrap_or_default())
    }
}

// json objects decode into a list so the api's ordering survives
mod ordered {
    use std::fmt;

    use serde::{de::MapAccess, ser::SerializeMap, Deserializer, Serializer};

    use super::Ranking;

    pub fn serialize<S>(list: &[(String, Ranking)], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(list.len()))?;
        for (mode, ranking) in list {
            map.serialize_entry(mode, ranking)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<(String, Ranking)>, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct Visitor;

        impl<'de> serde::de::Visitor<'de> for Visitor {
            type Value = Vec<(String, Ranking)>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of game modes to rankings")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut list: Self::Value = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((mode, ranking)) = access.next_entry::<String, Ranking>()? {
                    match list.iter_mut().find(|(key, _)| *key == mode) {
                        Some((_, slot)) => *slot = ranking,
                        None => list.push((mode, ranking)),
                    }
                }
                Ok(list)
            }
        }

        deserializer.deserialize_map(Visitor)
    }
}
