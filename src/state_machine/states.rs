use serde::{Deserialize, Serialize};
use std::fmt;

/// Production stages in growing order.
///
/// The catalog is closed: every tray is in exactly one of these stages, and the
/// declaration order here is the sort order. Failure and cancellation are not
/// stages, they are [`TrayStatus`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Seeds soaking before sowing
    Soaking,
    /// Sown trays germinating under weight
    Germination,
    /// Covered trays growing in the dark
    Blackout,
    /// Uncovered trays greening under light
    Light,
    /// Grown out and harvestable
    Ready,
    /// Cut and weighed; the only terminal stage
    Harvested,
}

/// Static metadata for one catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageInfo {
    pub slug: &'static str,
    pub name: &'static str,
    pub sort_order: u8,
    pub is_terminal: bool,
    pub can_harvest: bool,
    pub requires_light: bool,
    pub default_duration_days: Option<u32>,
}

impl Stage {
    /// Every stage, ordered by `sort_order`.
    pub const ALL: [Stage; 6] = [
        Stage::Soaking,
        Stage::Germination,
        Stage::Blackout,
        Stage::Light,
        Stage::Ready,
        Stage::Harvested,
    ];

    /// Stage every newly planted tray starts in
    pub fn first() -> Self {
        Self::ALL[0]
    }

    /// Highest sort order in the catalog; the denominator for progress
    pub fn max_sort_order() -> u8 {
        Self::ALL.len() as u8
    }

    pub fn slug(&self) -> &'static str {
        match self {
            Self::Soaking => "soaking",
            Self::Germination => "germination",
            Self::Blackout => "blackout",
            Self::Light => "light",
            Self::Ready => "ready",
            Self::Harvested => "harvested",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Soaking => "Soaking",
            Self::Germination => "Germination",
            Self::Blackout => "Blackout",
            Self::Light => "Light",
            Self::Ready => "Ready to Harvest",
            Self::Harvested => "Harvested",
        }
    }

    /// 1-based position in the catalog
    pub fn sort_order(&self) -> u8 {
        match self {
            Self::Soaking => 1,
            Self::Germination => 2,
            Self::Blackout => 3,
            Self::Light => 4,
            Self::Ready => 5,
            Self::Harvested => 6,
        }
    }

    /// Check if no stage follows this one
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Harvested)
    }

    /// Check if trays in this stage may be harvested
    pub fn can_harvest(&self) -> bool {
        matches!(self, Self::Ready)
    }

    pub fn requires_light(&self) -> bool {
        matches!(self, Self::Light | Self::Ready)
    }

    pub fn default_duration_days(&self) -> Option<u32> {
        match self {
            Self::Soaking => Some(1),
            Self::Germination => Some(2),
            Self::Blackout => Some(3),
            Self::Light => Some(4),
            Self::Ready | Self::Harvested => None,
        }
    }

    /// The next catalog entry, or `None` at the terminal stage
    pub fn next(&self) -> Option<Self> {
        Self::from_sort_order(self.sort_order() + 1)
    }

    pub fn from_sort_order(sort_order: u8) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|stage| stage.sort_order() == sort_order)
    }

    pub fn info(&self) -> StageInfo {
        StageInfo {
            slug: self.slug(),
            name: self.name(),
            sort_order: self.sort_order(),
            is_terminal: self.is_terminal(),
            can_harvest: self.can_harvest(),
            requires_light: self.requires_light(),
            default_duration_days: self.default_duration_days(),
        }
    }

    /// The full catalog in sort order, as handed to the presentation layer
    pub fn catalog() -> Vec<StageInfo> {
        Self::ALL.iter().map(Stage::info).collect()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl std::str::FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|stage| stage.slug() == s)
            .ok_or_else(|| format!("Invalid stage: {s}"))
    }
}

impl Default for Stage {
    fn default() -> Self {
        Self::first()
    }
}

/// Lifecycle flag on a tray, orthogonal to its stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrayStatus {
    /// Growing normally
    Active,
    /// Harvested
    Completed,
    /// Lost to mold, poor germination and the like
    Failed,
    /// Pulled from production on purpose
    Cancelled,
}

impl TrayStatus {
    pub const ALL: [TrayStatus; 4] = [
        TrayStatus::Active,
        TrayStatus::Completed,
        TrayStatus::Failed,
        TrayStatus::Cancelled,
    ];

    /// Check if this is a terminal status (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for TrayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TrayStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid tray status: {s}")),
        }
    }
}

impl Default for TrayStatus {
    fn default() -> Self {
        Self::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_orders_are_unique_and_contiguous() {
        let orders: Vec<u8> = Stage::ALL.iter().map(Stage::sort_order).collect();
        let expected: Vec<u8> = (1..=Stage::max_sort_order()).collect();
        assert_eq!(orders, expected);
    }

    #[test]
    fn test_exactly_one_terminal_stage() {
        let terminal: Vec<Stage> = Stage::ALL.into_iter().filter(Stage::is_terminal).collect();
        assert_eq!(terminal, vec![Stage::Harvested]);
        assert_eq!(Stage::Harvested.next(), None);
    }

    #[test]
    fn test_next_walks_the_catalog() {
        assert_eq!(Stage::first(), Stage::Soaking);
        assert_eq!(Stage::Soaking.next(), Some(Stage::Germination));
        assert_eq!(Stage::Light.next(), Some(Stage::Ready));
        assert_eq!(Stage::Ready.next(), Some(Stage::Harvested));
    }

    #[test]
    fn test_only_ready_can_harvest() {
        let harvestable: Vec<Stage> = Stage::ALL.into_iter().filter(Stage::can_harvest).collect();
        assert_eq!(harvestable, vec![Stage::Ready]);
    }

    #[test]
    fn test_state_string_conversion() {
        assert_eq!(Stage::Germination.to_string(), "germination");
        assert_eq!("blackout".parse::<Stage>().unwrap(), Stage::Blackout);
        assert!("failed".parse::<Stage>().is_err());

        assert_eq!(TrayStatus::Cancelled.to_string(), "cancelled");
        assert_eq!("completed".parse::<TrayStatus>().unwrap(), TrayStatus::Completed);
        assert!("harvested".parse::<TrayStatus>().is_err());
    }

    #[test]
    fn test_state_serde() {
        let json = serde_json::to_string(&Stage::Ready).unwrap();
        assert_eq!(json, "\"ready\"");
        let parsed: TrayStatus = serde_json::from_str("\"failed\"").unwrap();
        assert_eq!(parsed, TrayStatus::Failed);
    }

    #[test]
    fn test_status_terminal_check() {
        assert!(!TrayStatus::Active.is_terminal());
        assert!(TrayStatus::Completed.is_terminal());
        assert!(TrayStatus::Failed.is_terminal());
        assert!(TrayStatus::Cancelled.is_terminal());
    }
}
