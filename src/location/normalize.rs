//! Place-name normalization against a static alias table.
//!
//! Lookup is an exact dictionary match on the trimmed, lowercased name.
//! No fuzzy matching: every rewrite traces back to one row of [`ALIASES`].

use super::types::CanonicalName;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Sentinel for missing or blank names.
pub const UNKNOWN: &str = "Unknown";

struct Alias {
    canonical: &'static str,
    variants: &'static [&'static str], // lowercase; the canonical spelling is implied
}

const ALIASES: &[Alias] = &[
    // ── States / union territories ──
    Alias {
        canonical: "Andaman and Nicobar Islands",
        variants: &["andaman & nicobar islands", "andaman & nicobar"],
    },
    Alias {
        canonical: "Arunachal Pradesh",
        variants: &["arunanchal pradesh"],
    },
    Alias {
        canonical: "Dadra and Nagar Haveli and Daman and Diu",
        variants: &["dadra & nagar haveli and daman & diu"],
    },
    Alias {
        canonical: "Delhi",
        variants: &["nct of delhi"],
    },
    // Boundary data still uses the old spelling.
    Alias {
        canonical: "Orissa",
        variants: &["odisha"],
    },
    Alias {
        canonical: "Telangana",
        variants: &["telengana"],
    },
    Alias {
        canonical: "Jammu and Kashmir",
        variants: &["jammu & kashmir"],
    },
    Alias {
        canonical: "Puducherry",
        variants: &["pondicherry"],
    },
    Alias {
        canonical: "Uttarakhand",
        variants: &["uttaranchal"],
    },
    // ── Renamed cities ──
    Alias {
        canonical: "Mumbai",
        variants: &["bombay"],
    },
    Alias {
        canonical: "Chennai",
        variants: &["madras"],
    },
    Alias {
        canonical: "Kolkata",
        variants: &["calcutta"],
    },
    Alias {
        canonical: "Bengaluru",
        variants: &["bangalore"],
    },
    Alias {
        canonical: "Gurugram",
        variants: &["gurgaon"],
    },
    Alias {
        canonical: "Prayagraj",
        variants: &["allahabad"],
    },
    Alias {
        canonical: "Thiruvananthapuram",
        variants: &["trivandrum"],
    },
    Alias {
        canonical: UNKNOWN,
        variants: &[],
    },
];

fn alias_index() -> &'static HashMap<String, &'static str> {
    static INDEX: OnceLock<HashMap<String, &'static str>> = OnceLock::new();
    INDEX.get_or_init(|| {
        let mut index = HashMap::new();
        for alias in ALIASES {
            index.insert(alias.canonical.to_lowercase(), alias.canonical);
            for variant in alias.variants {
                index.insert((*variant).to_string(), alias.canonical);
            }
        }
        index
    })
}

/// Canonicalize a raw place name. Total and idempotent.
pub fn normalize(raw: &str) -> CanonicalName {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return CanonicalName::from_normalized(UNKNOWN.to_string());
    }

    let name = match alias_index().get(trimmed.to_lowercase().as_str()) {
        Some(canonical) => (*canonical).to_string(),
        None => trimmed.to_string(),
    };
    CanonicalName::from_normalized(name)
}

/// Like [`normalize`], for columns where the value may be missing.
pub fn normalize_opt(raw: Option<&str>) -> CanonicalName {
    normalize(raw.unwrap_or(""))
}

/// One row of the alias table, for auditing.
#[derive(Debug, Clone, Serialize)]
pub struct AliasInfo {
    pub canonical: &'static str,
    pub variants: Vec<&'static str>,
}

/// The full alias table in declaration order.
pub fn alias_table() -> Vec<AliasInfo> {
    ALIASES
        .iter()
        .map(|a| AliasInfo {
            canonical: a.canonical,
            variants: a.variants.to_vec(),
        })
        .collect()
}
