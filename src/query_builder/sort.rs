//! Sortable fields shared by the batch and flat listing modes.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    /// Apply this direction to an ascending ordering
    pub fn apply(&self, ordering: std::cmp::Ordering) -> std::cmp::Ordering {
        match self {
            Self::Asc => ordering,
            Self::Desc => ordering.reverse(),
        }
    }
}

impl std::str::FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            _ => Err(format!("Invalid sort direction: {s}")),
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asc => f.write_str("asc"),
            Self::Desc => f.write_str("desc"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    BatchCode,
    Stage,
    Status,
    #[default]
    CreatedAt,
    Progress,
    /// Member count; only meaningful for grouped batches
    TotalTrays,
    PlantedAt,
}

impl SortField {
    pub const ALL: [SortField; 7] = [
        SortField::BatchCode,
        SortField::Stage,
        SortField::Status,
        SortField::CreatedAt,
        SortField::Progress,
        SortField::TotalTrays,
        SortField::PlantedAt,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BatchCode => "batch_code",
            Self::Stage => "stage",
            Self::Status => "status",
            Self::CreatedAt => "created_at",
            Self::Progress => "progress",
            Self::TotalTrays => "total_trays",
            Self::PlantedAt => "planted_at",
        }
    }

    pub fn is_batch_only(&self) -> bool {
        matches!(self, Self::TotalTrays)
    }
}

impl std::str::FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| format!("Invalid sort field: {s}"))
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraySort {
    pub field: SortField,
    pub direction: SortDirection,
}

impl TraySort {
    pub fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;

    #[test]
    fn test_default_sort_is_newest_first() {
        let sort = TraySort::default();
        assert_eq!(sort.field, SortField::CreatedAt);
        assert_eq!(sort.direction, SortDirection::Desc);
    }

    #[test]
    fn test_parse_fields_and_directions() {
        assert_eq!("total_trays".parse::<SortField>().unwrap(), SortField::TotalTrays);
        assert!("current_stage_id".parse::<SortField>().is_err());
        assert_eq!("ASC".parse::<SortDirection>().unwrap(), SortDirection::Asc);
    }

    #[test]
    fn test_direction_apply() {
        assert_eq!(SortDirection::Asc.apply(Ordering::Less), Ordering::Less);
        assert_eq!(SortDirection::Desc.apply(Ordering::Less), Ordering::Greater);
    }
}
