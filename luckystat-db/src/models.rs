use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const NUMBER_MIN: u8 = 1;
pub const NUMBER_MAX: u8 = 45;
pub const POOL_SIZE: usize = 45;
pub const MAIN_COUNT: usize = 6;

/// Nombre d'occurrences observées pour un numéro.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatEntry {
    pub num: u8,
    pub count: u32,
}

/// Table complète des fréquences : exactement une entrée par numéro 1..=45,
/// triée par numéro.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatisticsTable {
    entries: Vec<StatEntry>,
}

impl StatisticsTable {
    pub fn from_entries(entries: &[StatEntry]) -> Result<Self> {
        let mut seen = [false; POOL_SIZE];
        for e in entries {
            if e.num < NUMBER_MIN || e.num > NUMBER_MAX {
                bail!("Numéro {} hors limites ({}-{})", e.num, NUMBER_MIN, NUMBER_MAX);
            }
            let idx = (e.num - 1) as usize;
            if seen[idx] {
                bail!("Numéro en double dans la table : {}", e.num);
            }
            seen[idx] = true;
        }
        if let Some(missing) = seen.iter().position(|&s| !s) {
            bail!("Table incomplète : numéro {} absent", missing + 1);
        }

        let mut entries = entries.to_vec();
        entries.sort_by_key(|e| e.num);
        Ok(Self { entries })
    }

    /// Table où chaque numéro a le même poids.
    pub fn uniform(count: u32) -> Self {
        Self {
            entries: (NUMBER_MIN..=NUMBER_MAX)
                .map(|num| StatEntry { num, count })
                .collect(),
        }
    }

    pub fn count(&self, num: u8) -> u32 {
        if num < NUMBER_MIN || num > NUMBER_MAX {
            return 0;
        }
        self.entries[(num - 1) as usize].count
    }

    pub fn entries(&self) -> &[StatEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &StatEntry> {
        self.entries.iter()
    }

    pub fn total(&self) -> u64 {
        self.entries.iter().map(|e| e.count as u64).sum()
    }
}

/// Identifiant stable d'une stratégie de génération (clé de stockage et d'export).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Strategy {
    PureRandom,
    WeightedRandom,
    ConsecutiveRandom,
    WeightedWithConsecutive,
    WeightedExcludeBottom10,
    ColorPreference,
}

impl Strategy {
    pub const ALL: [Strategy; 6] = [
        Strategy::PureRandom,
        Strategy::WeightedRandom,
        Strategy::ConsecutiveRandom,
        Strategy::WeightedWithConsecutive,
        Strategy::WeightedExcludeBottom10,
        Strategy::ColorPreference,
    ];

    /// Stratégies du panneau automatique, dans l'ordre d'affichage.
    pub const AUTO: [Strategy; 5] = [
        Strategy::PureRandom,
        Strategy::WeightedRandom,
        Strategy::ConsecutiveRandom,
        Strategy::WeightedWithConsecutive,
        Strategy::WeightedExcludeBottom10,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Strategy::PureRandom => "pureRandom",
            Strategy::WeightedRandom => "weightedRandom",
            Strategy::ConsecutiveRandom => "consecutiveRandom",
            Strategy::WeightedWithConsecutive => "weightedWithConsecutive",
            Strategy::WeightedExcludeBottom10 => "weightedExcludeBottom10",
            Strategy::ColorPreference => "colorPreference",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Strategy::PureRandom => "Aléatoire pur",
            Strategy::WeightedRandom => "Pondéré par les statistiques",
            Strategy::ConsecutiveRandom => "1 à 2 paires consécutives",
            Strategy::WeightedWithConsecutive => "Pondéré + paires consécutives",
            Strategy::WeightedExcludeBottom10 => "Pondéré sans les 10 plus rares",
            Strategy::ColorPreference => "Couleurs préférées",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl FromStr for Strategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Strategy::ALL
            .into_iter()
            .find(|st| st.id().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| anyhow::anyhow!("Stratégie inconnue : '{}'", wanted))
    }
}

/// Une grille : 6 numéros principaux triés, bonus optionnel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Combination {
    pub main: Vec<u8>,
    pub bonus: Option<u8>,
}

impl Combination {
    pub fn new(mut main: Vec<u8>) -> Self {
        main.sort_unstable();
        Self { main, bonus: None }
    }

    /// Faux pour un tirage pondéré à court de candidats.
    pub fn is_complete(&self) -> bool {
        self.main.len() == MAIN_COUNT
    }
}

impl fmt::Display for Combination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let main = self
            .main
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        match self.bonus {
            Some(b) => write!(f, "{} + {}", main, b),
            None => write!(f, "{}", main),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedCombination {
    pub strategy: Strategy,
    /// Index de répétition, à partir de 1.
    pub index: usize,
    pub combination: Combination,
}

impl TaggedCombination {
    pub fn id(&self) -> String {
        format!("{}-{}", self.strategy.id(), self.index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoState {
    pub combinations: Vec<TaggedCombination>,
    pub generated_at: DateTime<Utc>,
    pub next_refresh: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyRange {
    pub range: String,
    pub percent: f64,
    pub count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissedNumbers {
    #[serde(rename = "1-10", default)]
    pub band_1_10: Vec<u8>,
    #[serde(rename = "11-20", default)]
    pub band_11_20: Vec<u8>,
    #[serde(rename = "21-30", default)]
    pub band_21_30: Vec<u8>,
    #[serde(rename = "31-40", default)]
    pub band_31_40: Vec<u8>,
    #[serde(rename = "41-45", default)]
    pub band_41_45: Vec<u8>,
}

impl MissedNumbers {
    pub const LABELS: [&'static str; 5] = ["1-10", "11-20", "21-30", "31-40", "41-45"];

    pub fn get(&self, label: &str) -> Option<&[u8]> {
        match label {
            "1-10" => Some(&self.band_1_10),
            "11-20" => Some(&self.band_11_20),
            "21-30" => Some(&self.band_21_30),
            "31-40" => Some(&self.band_31_40),
            "41-45" => Some(&self.band_41_45),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, label: &str) -> Option<&mut Vec<u8>> {
        match label {
            "1-10" => Some(&mut self.band_1_10),
            "11-20" => Some(&mut self.band_11_20),
            "21-30" => Some(&mut self.band_21_30),
            "31-40" => Some(&mut self.band_31_40),
            "41-45" => Some(&mut self.band_41_45),
            _ => None,
        }
    }
}

/// Enregistrement des statistiques saisies par l'utilisateur.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSettings {
    #[serde(default)]
    pub weekly_ranges: Vec<WeeklyRange>,
    #[serde(default)]
    pub missed_numbers: MissedNumbers,
    pub total_stats: Vec<StatEntry>,
    /// Horodatage epoch en millisecondes.
    #[serde(rename = "__updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl StatsSettings {
    pub fn table(&self) -> Result<StatisticsTable> {
        StatisticsTable::from_entries(&self.total_stats)
    }
}

pub fn validate_combination(main: &[u8], bonus: Option<u8>) -> Result<()> {
    if main.len() != MAIN_COUNT {
        bail!("Une grille contient {} numéros, pas {}", main.len(), MAIN_COUNT);
    }
    for &n in main {
        if n < NUMBER_MIN || n > NUMBER_MAX {
            bail!("Numéro {} hors limites ({}-{})", n, NUMBER_MIN, NUMBER_MAX);
        }
    }
    for i in 0..main.len() {
        for j in (i + 1)..main.len() {
            if main[i] == main[j] {
                bail!("Numéro en double : {}", main[i]);
            }
        }
    }
    if let Some(b) = bonus {
        if b < NUMBER_MIN || b > NUMBER_MAX {
            bail!("Bonus {} hors limites ({}-{})", b, NUMBER_MIN, NUMBER_MAX);
        }
        if main.contains(&b) {
            bail!("Le bonus {} fait déjà partie de la grille", b);
        }
    }
    Ok(())
}
