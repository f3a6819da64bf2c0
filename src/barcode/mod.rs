pub mod lines;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Barcode encoding scheme for a line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Symbology {
    #[default]
    #[serde(rename = "QR")]
    Qr,
    #[serde(rename = "Code128")]
    Code128,
}

impl Symbology {
    /// Every symbology offered in the type selectors, in menu order
    pub const ALL: [Symbology; 2] = [Symbology::Qr, Symbology::Code128];

    /// Used for new lines when no user preference applies
    pub const FALLBACK: Symbology = Symbology::Qr;

    pub fn as_str(&self) -> &'static str {
        match self {
            Symbology::Qr => "QR",
            Symbology::Code128 => "Code128",
        }
    }

    /// Next entry in menu order, wrapping around
    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|s| *s == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }
}

impl fmt::Display for Symbology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown barcode type: {0}")]
pub struct UnknownSymbology(pub String);

impl FromStr for Symbology {
    type Err = UnknownSymbology;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|sym| sym.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownSymbology(s.to_string()))
    }
}

/// Line identifier, derived from the creation time in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineId(pub u64);

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

static LAST_ID: AtomicU64 = AtomicU64::new(0);

impl LineId {
    /// Timestamp-based id, bumped past the previous one so ids created in
    /// the same millisecond stay distinct
    pub fn generate() -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self::next_after(now)
    }

    /// Keep future ids above an id that came from elsewhere (e.g. a loaded file)
    pub fn observe(id: LineId) {
        LAST_ID.fetch_max(id.0, Ordering::Relaxed);
    }

    fn next_after(now: u64) -> Self {
        let mut last = LAST_ID.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(last + 1);
            match LAST_ID.compare_exchange_weak(last, candidate, Ordering::Relaxed, Ordering::Relaxed) {
                Ok(_) => return LineId(candidate),
                Err(actual) => last = actual,
            }
        }
    }
}

/// One editable row: text to encode, its symbology and a prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarcodeLine {
    pub id: LineId,
    pub text: String,
    #[serde(rename = "type")]
    pub symbology: Symbology,
    pub prefix: String,
}

impl BarcodeLine {
    /// Empty line of the given type
    pub fn blank(id: LineId, symbology: Symbology) -> Self {
        Self {
            id,
            text: String::new(),
            symbology,
            prefix: String::new(),
        }
    }

    /// What actually gets encoded: prefix followed by text
    pub fn payload(&self) -> String {
        format!("{}{}", self.prefix, self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbology_names() {
        assert_eq!(Symbology::Qr.to_string(), "QR");
        assert_eq!(Symbology::Code128.to_string(), "Code128");
        assert_eq!("code128".parse::<Symbology>(), Ok(Symbology::Code128));
        assert_eq!(" QR ".parse::<Symbology>(), Ok(Symbology::Qr));
        assert!("EAN13".parse::<Symbology>().is_err());
    }

    #[test]
    fn test_symbology_cycles() {
        assert_eq!(Symbology::Qr.next(), Symbology::Code128);
        assert_eq!(Symbology::Code128.next(), Symbology::Qr);
    }

    #[test]
    fn test_line_json_shape() {
        let line = BarcodeLine {
            id: LineId(1),
            text: "A".to_string(),
            symbology: Symbology::Qr,
            prefix: String::new(),
        };
        let json = serde_json::to_value(&line).unwrap();
        assert_eq!(json, serde_json::json!({"id": 1, "text": "A", "type": "QR", "prefix": ""}));
    }

    #[test]
    fn test_payload_prepends_prefix() {
        let mut line = BarcodeLine::blank(LineId(7), Symbology::Code128);
        line.prefix = "SKU-".to_string();
        line.text = "0042".to_string();
        assert_eq!(line.payload(), "SKU-0042");
    }

    #[test]
    fn test_ids_unique_within_same_millisecond() {
        let a = LineId::next_after(5_000);
        let b = LineId::next_after(5_000);
        let c = LineId::generate();
        assert!(b > a);
        assert!(c > b);
    }

    #[test]
    fn test_generated_ids_skip_observed_ids() {
        let far_ahead = LineId::generate().0 + 60_000;
        LineId::observe(LineId(far_ahead));
        assert!(LineId::generate().0 > far_ahead);

        // Observing an older id never moves the generator back
        LineId::observe(LineId(1));
        assert!(LineId::generate().0 > far_ahead);
    }
}
