use regex::Regex;
use serde::{Deserialize, Serialize};

use domain::{FrameRejected, WeightReading};

/// Wire formats in priority order. Declaration order is the order they are tried in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FrameFormatKind {
    /// `+000085.9 G S`: sign, 6.1 digits, unit G/K, status S/I
    Fixed,
    /// `12.500 k`: any signed decimal with optional g/k unit, kilograms by default
    LooseFallback,
    /// `0085900`: seven bare digits of grams, used by older client variants
    LegacySevenDigit,
}

// --- Formats ---

#[derive(Debug)]
pub enum FrameFormat {
    Fixed(Regex),
    LooseFallback(Regex),
    LegacySevenDigit(Regex),
}

impl FrameFormat {
    pub fn fixed() -> Self {
        Self::Fixed(
            Regex::new(r"^\s*([+-]?)\s*(\d{6}\.\d)\s+([GKgk])\s+([SIsi])").expect("Invalid regex"),
        )
    }

    pub fn loose_fallback() -> Self {
        // Searched anywhere in the frame so vendor prefixes (ST,GS,...) are skipped
        Self::LooseFallback(
            Regex::new(r"([+-]?\d+\.\d+)\s*([A-Za-z]+)?").expect("Invalid regex"),
        )
    }

    pub fn legacy_seven_digit() -> Self {
        Self::LegacySevenDigit(Regex::new(r"(?:^|[^\d.])(\d{7})(?:[^\d.]|$)").expect("Invalid regex"))
    }

    pub fn from_kind(kind: FrameFormatKind) -> Self {
        match kind {
            FrameFormatKind::Fixed => Self::fixed(),
            FrameFormatKind::LooseFallback => Self::loose_fallback(),
            FrameFormatKind::LegacySevenDigit => Self::legacy_seven_digit(),
        }
    }

    pub fn kind(&self) -> FrameFormatKind {
        match self {
            Self::Fixed(_) => FrameFormatKind::Fixed,
            Self::LooseFallback(_) => FrameFormatKind::LooseFallback,
            Self::LegacySevenDigit(_) => FrameFormatKind::LegacySevenDigit,
        }
    }

    /// Returns a reading when `line` is in this format, `None` otherwise.
    pub fn try_parse(&self, line: &str) -> Option<WeightReading> {
        match self {
            Self::Fixed(regex) => {
                let caps = regex.captures(line)?;
                let magnitude: f64 = caps[2].parse().ok()?;
                let signed = if &caps[1] == "-" { -magnitude } else { magnitude };
                let kg = if caps[3].eq_ignore_ascii_case("G") {
                    signed / 1000.0
                } else {
                    signed
                };
                let stable = caps[4].eq_ignore_ascii_case("S");
                Some(WeightReading::new(kg, line).with_reported_stability(stable))
            }
            Self::LooseFallback(regex) => {
                let caps = regex.captures(line)?;
                let value: f64 = caps[1].parse().ok()?;
                let kg = match caps.get(2).map(|m| m.as_str().to_ascii_lowercase()) {
                    None => value,
                    Some(unit) => match unit.as_str() {
                        "g" => value / 1000.0,
                        "k" | "kg" => value,
                        _ => return None,
                    },
                };
                Some(WeightReading::new(kg, line))
            }
            Self::LegacySevenDigit(regex) => {
                let caps = regex.captures(line)?;
                let grams: u32 = caps[1].parse().ok()?;
                Some(WeightReading::new(f64::from(grams) / 1000.0, line))
            }
        }
    }
}

// --- Parser ---

/// Tries each configured format in priority order; the first match wins.
#[derive(Debug)]
pub struct WeightFrameParser {
    formats: Vec<FrameFormat>,
}

impl Default for WeightFrameParser {
    fn default() -> Self {
        Self::new()
    }
}

impl WeightFrameParser {
    /// Fixed format with the loose decimal fallback.
    pub fn new() -> Self {
        Self::with_formats(&[FrameFormatKind::Fixed, FrameFormatKind::LooseFallback])
    }

    /// Builds a parser from `kinds`, deduplicated and sorted into priority order so a
    /// less specific format can never shadow a more specific one.
    pub fn with_formats(kinds: &[FrameFormatKind]) -> Self {
        let mut kinds = kinds.to_vec();
        kinds.sort();
        kinds.dedup();
        Self {
            formats: kinds.into_iter().map(FrameFormat::from_kind).collect(),
        }
    }

    pub fn kinds(&self) -> Vec<FrameFormatKind> {
        self.formats.iter().map(FrameFormat::kind).collect()
    }

    pub fn parse(&self, frame: &str) -> Result<WeightReading, FrameRejected> {
        let line = frame.trim();
        if line.is_empty() {
            return Err(FrameRejected(frame.to_string()));
        }
        self.formats
            .iter()
            .find_map(|format| format.try_parse(line))
            .ok_or_else(|| FrameRejected(line.to_string()))
    }
}
