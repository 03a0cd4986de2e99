//! Fixed values for the OSM API surface and section bookkeeping.

use serde::Serialize;

/// Default base URL for the OSM API (also the OAuth token host).
pub const OSM_API_BASE: &str = "https://www.onlinescoutmanager.co.uk";

/// OAuth scopes requested at login.
pub const OAUTH_SCOPES: &str =
    "section:member:read section:quartermaster:write section:finance:read";

/// Group name shown when OSM does not report one.
pub const DEFAULT_GROUP_NAME: &str = "OSM Helper";

/// Display order for friendly section types.
pub const SECTION_TYPE_ORDER: [&str; 6] = [
    "Squirrels",
    "Beavers",
    "Cubs",
    "Scouts",
    "Explorers",
    "Adults / Leaders",
];

/// Map an OSM section type (e.g. `earlyyears`) to its display name.
pub fn friendly_section_type(section_type: &str) -> &'static str {
    match section_type {
        "earlyyears" => "Squirrels",
        "beavers" => "Beavers",
        "cubs" => "Cubs",
        "scouts" => "Scouts",
        "explorers" => "Explorers",
        "adults" => "Adults / Leaders",
        "waiting" => "Waiting List",
        _ => "Other",
    }
}

/// Default section capacity by OSM section type.
pub fn default_capacity(section_type: &str) -> Option<u32> {
    match section_type {
        "earlyyears" => Some(18),
        "beavers" => Some(24),
        "cubs" => Some(30),
        "scouts" => Some(36),
        _ => None,
    }
}

/// Age bands used for waiting-list placement, youngest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum AgeBand {
    Squirrels,
    Beavers,
    Cubs,
    Scouts,
    Explorers,
}

impl AgeBand {
    pub const ALL: [AgeBand; 5] = [
        AgeBand::Squirrels,
        AgeBand::Beavers,
        AgeBand::Cubs,
        AgeBand::Scouts,
        AgeBand::Explorers,
    ];

    /// Minimum age in fractional years for joining this band.
    pub fn default_cutoff(&self) -> f64 {
        match self {
            AgeBand::Squirrels => 4.0,
            AgeBand::Beavers => 5.75,
            AgeBand::Cubs => 7.5,
            AgeBand::Scouts => 10.0,
            AgeBand::Explorers => 13.5,
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            AgeBand::Squirrels => "squirrels",
            AgeBand::Beavers => "beavers",
            AgeBand::Cubs => "cubs",
            AgeBand::Scouts => "scouts",
            AgeBand::Explorers => "explorers",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            AgeBand::Squirrels => "Squirrels",
            AgeBand::Beavers => "Beavers",
            AgeBand::Cubs => "Cubs",
            AgeBand::Scouts => "Scouts",
            AgeBand::Explorers => "Explorers",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|band| band.key() == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_friendly_section_type() {
        assert_eq!(friendly_section_type("earlyyears"), "Squirrels");
        assert_eq!(friendly_section_type("adults"), "Adults / Leaders");
        assert_eq!(friendly_section_type("something"), "Other");
    }

    #[test]
    fn test_default_capacity() {
        assert_eq!(default_capacity("cubs"), Some(30));
        assert_eq!(default_capacity("explorers"), None);
    }

    #[test]
    fn test_age_band_from_key() {
        assert_eq!(AgeBand::from_key("cubs"), Some(AgeBand::Cubs));
        assert_eq!(AgeBand::from_key("leaders"), None);
    }
}
