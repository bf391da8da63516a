//! Closed enumerations accepted on the request surface.
//!
//! Every enum parses from its wire tag and rejects anything else with
//! [`UnknownTag`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::UnknownTag;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scenario {
    School,
    Office,
    Family,
    Friends,
    #[serde(rename = "Social Event")]
    SocialEvent,
    Late,
}

impl Scenario {
    pub const ALL: [Scenario; 6] = [
        Scenario::School,
        Scenario::Office,
        Scenario::Family,
        Scenario::Friends,
        Scenario::SocialEvent,
        Scenario::Late,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Scenario::School => "School",
            Scenario::Office => "Office",
            Scenario::Family => "Family",
            Scenario::Friends => "Friends",
            Scenario::SocialEvent => "Social Event",
            Scenario::Late => "Late",
        }
    }
}

impl FromStr for Scenario {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scenario::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| UnknownTag::new("scenario", s))
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Criticality {
    Low,
    Medium,
    High,
}

impl Criticality {
    pub const ALL: [Criticality; 3] = [Criticality::Low, Criticality::Medium, Criticality::High];

    pub fn as_str(self) -> &'static str {
        match self {
            Criticality::Low => "Low",
            Criticality::Medium => "Medium",
            Criticality::High => "High",
        }
    }
}

impl FromStr for Criticality {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Criticality::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| UnknownTag::new("criticality", s))
    }
}

impl fmt::Display for Criticality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of fabricated proof. `Medical` and `Document` are laid out as a PDF
/// certificate; every other kind becomes a PNG receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProofKind {
    Medical,
    Document,
    Casual,
    Receipt,
}

impl ProofKind {
    pub const ALL: [ProofKind; 4] = [
        ProofKind::Medical,
        ProofKind::Document,
        ProofKind::Casual,
        ProofKind::Receipt,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProofKind::Medical => "medical",
            ProofKind::Document => "document",
            ProofKind::Casual => "casual",
            ProofKind::Receipt => "receipt",
        }
    }

    /// Capitalized form used in rendered titles ("Medical Report").
    pub fn label(self) -> &'static str {
        match self {
            ProofKind::Medical => "Medical",
            ProofKind::Document => "Document",
            ProofKind::Casual => "Casual",
            ProofKind::Receipt => "Receipt",
        }
    }

    pub fn is_document(self) -> bool {
        matches!(self, ProofKind::Medical | ProofKind::Document)
    }
}

impl FromStr for ProofKind {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProofKind::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| UnknownTag::new("proof type", s))
    }
}

impl fmt::Display for ProofKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
