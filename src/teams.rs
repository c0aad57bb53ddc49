//! Team-name canonicalization.
//!
//! The stats source and the upgrade disclosures use different vocabularies
//! for the same constructors. Both are corrected to a single reporting
//! vocabulary before joining; names missing from a map pass through
//! unchanged.

/// Corrections applied to team names coming from the stats source.
pub const STATS_TEAM_MAPPING: [(&str, &str); 3] = [
    ("RB", "Racing Bulls"),
    ("AlphaTauri", "Racing Bulls"),
    ("Alfa Romeo", "Kick Sauber"),
];

/// Corrections applied to team names coming from the upgrade disclosures.
pub const UPGRADE_TEAM_MAPPING: [(&str, &str); 9] = [
    ("Aston Martin Aramco F1 Team", "Aston Martin"),
    ("ATLASSIAN WILLIAMS RACING", "Williams"),
    ("BWT Alpine F1 Team", "Alpine"),
    ("McLaren Formula 1 Team", "McLaren"),
    ("Mercedes-AMG PETRONAS F1 Team", "Mercedes"),
    ("MONEYGRAM HAAS F1 TEAM", "Haas F1 Team"),
    ("SCUDERIA FERRARI HP", "Ferrari"),
    ("Stake F1 Team KICK Sauber", "Kick Sauber"),
    ("Visa Cash App Racing Bulls", "Racing Bulls"),
];

fn map_name(mapping: &[(&str, &str)], name: &str) -> String {
    mapping
        .iter()
        .find(|(from, _)| *from == name)
        .map(|(_, to)| (*to).to_string())
        .unwrap_or_else(|| name.to_string())
}

/// Canonicalize a team name from the stats source.
pub fn map_stats_team(name: &str) -> String {
    map_name(&STATS_TEAM_MAPPING, name)
}

/// Canonicalize a team name from the upgrade disclosures.
pub fn map_upgrade_team(name: &str) -> String {
    map_name(&UPGRADE_TEAM_MAPPING, name)
}

/// Last whitespace-separated word of a driver's full name.
pub fn driver_surname(full_name: &str) -> Option<String> {
    full_name.split_whitespace().last().map(|s| s.to_string())
}
