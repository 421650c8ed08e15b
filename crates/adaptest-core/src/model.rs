//! Core data model types for adaptest.
//!
//! Calibrated items, response records and ability estimates are the values
//! every other module in the engine passes around.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Exam content areas (the closed ENAMED domain set).
///
/// Serialized through its string form so it also works as a map key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ContentArea {
    ClinicaMedica,
    Cirurgia,
    GinecologiaObstetricia,
    Pediatria,
    SaudeColetiva,
}

impl ContentArea {
    /// Every area, in canonical order.
    pub const ALL: [ContentArea; 5] = [
        ContentArea::ClinicaMedica,
        ContentArea::Cirurgia,
        ContentArea::GinecologiaObstetricia,
        ContentArea::Pediatria,
        ContentArea::SaudeColetiva,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentArea::ClinicaMedica => "clinica_medica",
            ContentArea::Cirurgia => "cirurgia",
            ContentArea::GinecologiaObstetricia => "ginecologia_obstetricia",
            ContentArea::Pediatria => "pediatria",
            ContentArea::SaudeColetiva => "saude_coletiva",
        }
    }
}

impl fmt::Display for ContentArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentArea {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "clinica_medica" => Ok(ContentArea::ClinicaMedica),
            "cirurgia" => Ok(ContentArea::Cirurgia),
            "ginecologia_obstetricia" | "go" | "gineco" => Ok(ContentArea::GinecologiaObstetricia),
            "pediatria" => Ok(ContentArea::Pediatria),
            "saude_coletiva" => Ok(ContentArea::SaudeColetiva),
            other => Err(format!("unknown content area: {other}")),
        }
    }
}

impl TryFrom<String> for ContentArea {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ContentArea> for String {
    fn from(area: ContentArea) -> Self {
        area.as_str().to_string()
    }
}

/// Three-parameter logistic item parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IrtParams {
    /// Discrimination, strictly positive.
    pub a: f64,
    /// Difficulty on the theta scale.
    pub b: f64,
    /// Pseudo-guessing lower asymptote, in `[0, 1)`.
    pub c: f64,
}

impl IrtParams {
    pub fn new(a: f64, b: f64, c: f64) -> Self {
        Self { a, b, c }
    }

    /// Check the hard constraints of the 3PL model.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.a.is_finite() && self.b.is_finite() && self.c.is_finite()) {
            return Err("parameters must be finite".into());
        }
        if self.a <= 0.0 {
            return Err(format!("discrimination must be > 0, got {}", self.a));
        }
        if !(0.0..1.0).contains(&self.c) {
            return Err(format!("guessing must be in [0, 1), got {}", self.c));
        }
        Ok(())
    }
}

/// A pre-calibrated exam item. Immutable once calibrated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibratedItem {
    /// Unique item identifier.
    pub id: String,
    /// Content area the item belongs to.
    pub area: ContentArea,
    /// IRT parameters.
    pub params: IrtParams,
}

impl CalibratedItem {
    pub fn new(id: impl Into<String>, area: ContentArea, params: IrtParams) -> Self {
        Self {
            id: id.into(),
            area,
            params,
        }
    }
}

/// One answered item within an attempt. Append-only.
///
/// The item parameters are captured at answer time so the full record list
/// is enough to re-estimate ability without going back to the bank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub item_id: String,
    pub area: ContentArea,
    pub params: IrtParams,
    pub correct: bool,
    /// 1-based position within the attempt.
    pub position: u32,
}

/// Point estimate of latent ability with its standard error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AbilityEstimate {
    pub theta: f64,
    /// Posterior standard deviation; `f64::INFINITY` before any response.
    #[serde(with = "serde_se")]
    pub se: f64,
}

impl AbilityEstimate {
    /// The estimate before any response: prior mean, undefined SE.
    pub fn prior() -> Self {
        Self {
            theta: 0.0,
            se: f64::INFINITY,
        }
    }

    /// Whether the standard error is defined (at least one response).
    pub fn has_se(&self) -> bool {
        self.se.is_finite()
    }
}

impl Default for AbilityEstimate {
    fn default() -> Self {
        Self::prior()
    }
}

/// Estimate snapshot recorded after each response.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThetaPoint {
    pub item_number: u32,
    pub theta: f64,
    #[serde(with = "serde_se")]
    pub se: f64,
}

/// Lifecycle of a session. Ordered: a session only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Initializing,
    InProgress,
    Complete,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Initializing => write!(f, "initializing"),
            SessionStatus::InProgress => write!(f, "in_progress"),
            SessionStatus::Complete => write!(f, "complete"),
        }
    }
}

/// Why a session terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Standard error reached the target after the item floor.
    SeThreshold,
    /// Hard item ceiling reached.
    MaxItems,
    /// No eligible item left in the bank.
    BankExhausted,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::SeThreshold => write!(f, "se_threshold"),
            StopReason::MaxItems => write!(f, "max_items"),
            StopReason::BankExhausted => write!(f, "bank_exhausted"),
        }
    }
}

/// Serde helper for standard errors: JSON has no infinity, so an undefined
/// SE is written as `null` and read back as `f64::INFINITY`.
pub mod serde_se {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(se: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if se.is_finite() {
            serializer.serialize_some(se)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::INFINITY))
    }
}
