//! Viseme categories - articulation classes and transition timing

/// Articulation class of a viseme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VisemeCategory {
    /// Lips together (B, P, M)
    Bilabial,
    /// Teeth on lip (F, V)
    Labiodental,
    /// Tongue between teeth (TH)
    Dental,
    /// Tongue on ridge (D, T, N, L, S, Z)
    Alveolar,
    /// CH, SH, ZH
    Postalveolar,
    /// Back of tongue (K, G)
    Velar,
    /// H
    Glottal,
    /// U, O, W
    Rounded,
    /// EE, I
    Spread,
    /// AA, A
    Open,
    /// E, ER
    Mid,
    /// Closed mouth
    Closed,
}

impl VisemeCategory {
    /// Category of a viseme morph name
    pub fn of(viseme: &str) -> Option<Self> {
        use VisemeCategory::*;
        let category = match viseme {
            "V_Explosive" | "V_M" => Bilabial,
            "V_FF" | "V_V" => Labiodental,
            "V_TH" | "V_Dental_Lip" => Dental,
            "V_DD" | "V_NN" | "V_L" | "V_SS" => Alveolar,
            "V_CH" | "V_SH" => Postalveolar,
            "V_KK" | "V_G" => Velar,
            "V_H" => Glottal,
            "V_U" | "V_OH" | "V_Narrow" => Rounded,
            "V_EE" | "V_Wide" => Spread,
            "V_AA" | "V_Open" => Open,
            "V_EH" | "V_ER" | "V_IH" => Mid,
            "V_None" | "V_Tight" => Closed,
            _ => return None,
        };
        Some(category)
    }

    pub fn as_str(self) -> &'static str {
        use VisemeCategory::*;
        match self {
            Bilabial => "bilabial",
            Labiodental => "labiodental",
            Dental => "dental",
            Alveolar => "alveolar",
            Postalveolar => "postalveolar",
            Velar => "velar",
            Glottal => "glottal",
            Rounded => "rounded",
            Spread => "spread",
            Open => "open",
            Mid => "mid",
            Closed => "closed",
        }
    }
}

fn pair_timing(from: VisemeCategory, to: VisemeCategory) -> Option<f64> {
    use VisemeCategory::*;
    match (from, to) {
        (Bilabial, Bilabial) => Some(0.7),
        (Alveolar, Alveolar) => Some(0.8),
        (Rounded, Rounded) => Some(0.85),
        (Spread, Rounded) | (Rounded, Spread) => Some(1.3),
        (Open, Closed) => Some(1.2),
        (Closed, Open) => Some(1.1),
        (Bilabial, Open) => Some(0.9),
        (Alveolar, Rounded) => Some(1.1),
        _ => None,
    }
}

/// Timing modifier for a transition between two categories.
///
/// Lookup order: the exact pair, then the reversed pair. A dental next to
/// an uncategorized viseme gets 1.2 in either direction. Everything else
/// gets 1.0.
pub fn timing_modifier(from: Option<VisemeCategory>, to: Option<VisemeCategory>) -> f64 {
    use VisemeCategory::Dental;
    match (from, to) {
        (Some(from), Some(to)) => pair_timing(from, to)
            .or_else(|| pair_timing(to, from))
            .unwrap_or(1.0),
        (Some(Dental), None) | (None, Some(Dental)) => 1.2,
        _ => 1.0,
    }
}
