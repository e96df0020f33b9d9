use crate::models::{MissedNumbers, StatEntry, StatisticsTable, StatsSettings, WeeklyRange, NUMBER_MAX, NUMBER_MIN};

/// Comptes connus du jeu de démonstration ; les autres numéros reçoivent `DEFAULT_COUNT`.
const KNOWN_COUNTS: [(u8, u32); 8] = [
    (34, 204),
    (27, 202),
    (12, 202),
    (7, 200),
    (3, 198),
    (1, 194),
    (2, 184),
    (9, 156),
];

const DEFAULT_COUNT: u32 = 160;

const WEEKLY: [(&str, f64, u32); 9] = [
    ("1-5", 92.0, 12),
    ("6-10", 85.0, 11),
    ("11-15", 100.0, 13),
    ("16-20", 100.0, 13),
    ("21-25", 100.0, 13),
    ("26-30", 100.0, 13),
    ("31-35", 92.0, 12),
    ("36-40", 100.0, 13),
    ("41-45", 38.0, 5),
];

pub fn sample_entries() -> Vec<StatEntry> {
    (NUMBER_MIN..=NUMBER_MAX)
        .map(|num| {
            let count = KNOWN_COUNTS
                .iter()
                .find(|(n, _)| *n == num)
                .map(|(_, c)| *c)
                .unwrap_or(DEFAULT_COUNT);
            StatEntry { num, count }
        })
        .collect()
}

/// Statistiques embarquées, utilisées au premier lancement ou quand les données sont incomplètes.
pub fn sample_settings() -> StatsSettings {
    StatsSettings {
        weekly_ranges: WEEKLY
            .iter()
            .map(|&(range, percent, count)| WeeklyRange {
                range: range.to_string(),
                percent,
                count,
            })
            .collect(),
        missed_numbers: MissedNumbers {
            band_1_10: vec![],
            band_11_20: vec![18],
            band_21_30: vec![30],
            band_31_40: vec![],
            band_41_45: vec![43, 44],
        },
        total_stats: sample_entries(),
        updated_at: None,
    }
}

pub fn sample_table() -> StatisticsTable {
    // sample_entries couvre 1..=45 par construction
    StatisticsTable::from_entries(&sample_entries()).unwrap_or_else(|_| StatisticsTable::uniform(DEFAULT_COUNT))
}
