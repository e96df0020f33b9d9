use anyhow::{bail, Context, Result};
use std::path::Path;

use luckystat_db::db::{load_settings, save_settings, KeyValueStore};
use luckystat_db::models::{MissedNumbers, StatEntry, StatisticsTable, StatsSettings, WeeklyRange};

fn is_range_label(s: &str) -> bool {
    match s.split_once('-') {
        Some((a, b)) => {
            !a.is_empty()
                && !b.is_empty()
                && a.chars().all(|c| c.is_ascii_digit())
                && b.chars().all(|c| c.is_ascii_digit())
        }
        None => false,
    }
}

fn non_empty_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines().map(str::trim).filter(|l| !l.is_empty())
}

/// Lignes `tranche<TAB ou ,>pourcentage<TAB ou ,>occurrences`.
pub fn parse_weekly_ranges(text: &str) -> Result<Vec<WeeklyRange>> {
    let mut out = Vec::new();
    for (i, row) in non_empty_lines(text).enumerate() {
        let parts: Vec<&str> = row.split(&[',', '\t'][..]).map(str::trim).collect();
        if parts.len() < 3 {
            bail!("Tranches hebdomadaires, ligne {} : format attendu 'tranche,%,nombre'", i + 1);
        }
        if !is_range_label(parts[0]) {
            bail!("Tranche invalide : '{}'", parts[0]);
        }
        let percent = parts[1]
            .parse::<f64>()
            .with_context(|| format!("Pourcentage invalide : '{}'", parts[1]))?;
        let count = parts[2]
            .parse::<u32>()
            .with_context(|| format!("Nombre invalide : '{}'", parts[2]))?;
        out.push(WeeklyRange {
            range: parts[0].to_string(),
            percent,
            count,
        });
    }
    Ok(out)
}

/// Lignes `1-10: 3,7`, une par tranche connue.
pub fn parse_missed_numbers(text: &str) -> Result<MissedNumbers> {
    let mut out = MissedNumbers::default();
    for line in non_empty_lines(text) {
        let Some((label, rest)) = line.split_once(':') else {
            bail!("Numéros manqués : ligne invalide '{}'", line);
        };
        let label = label.trim();
        if !is_range_label(label) {
            bail!("Numéros manqués : ligne invalide '{}'", line);
        }
        let nums = rest
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<u8>().with_context(|| format!("Numéro invalide : '{}'", s)))
            .collect::<Result<Vec<u8>>>()?;
        match out.get_mut(label) {
            Some(slot) => *slot = nums,
            None => bail!("Tranche inconnue : {}", label),
        }
    }
    Ok(out)
}

/// CSV `num,count` couvrant les 45 numéros ; renvoyé trié par numéro.
pub fn parse_total_stats(text: &str) -> Result<Vec<StatEntry>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader.headers().context("En-tête CSV illisible")?.clone();
    let header_ok = headers.len() == 2
        && headers[0].eq_ignore_ascii_case("num")
        && headers[1].eq_ignore_ascii_case("count");
    if !header_ok {
        bail!("En-tête requis : num,count");
    }

    let mut items = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Ligne {} illisible", i + 2))?;
        if record.len() < 2 {
            bail!("Ligne {} : deux colonnes attendues", i + 2);
        }
        let num = record[0]
            .parse::<u8>()
            .with_context(|| format!("Numéro invalide : '{}'", &record[0]))?;
        let count = record[1]
            .parse::<u32>()
            .with_context(|| format!("Occurrences invalides : '{}'", &record[1]))?;
        items.push(StatEntry { num, count });
    }

    let table = StatisticsTable::from_entries(&items)?;
    Ok(table.entries().to_vec())
}

pub fn validate_settings(settings: &StatsSettings) -> Result<()> {
    settings.table().context("total_stats incomplet")?;
    for label in MissedNumbers::LABELS {
        if let Some(nums) = settings.missed_numbers.get(label) {
            if let Some(n) = nums.iter().find(|&&n| n < 1 || n > 45) {
                bail!("Numéro manqué {} hors limites", n);
            }
        }
    }
    Ok(())
}

pub struct ImportResult {
    pub weekly_rows: usize,
    pub missed_numbers: usize,
    pub total_entries: usize,
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Impossible de lire {:?}", path))
}

/// Importe les trois fichiers texte de statistiques et enregistre le résultat.
/// Un fichier omis conserve la valeur déjà enregistrée.
pub fn import_text_files<S: KeyValueStore + ?Sized>(
    store: &S,
    weekly: Option<&Path>,
    missed: Option<&Path>,
    total: &Path,
) -> Result<ImportResult> {
    let current = load_settings(store)?.settings;

    let weekly_ranges = match weekly {
        Some(p) => parse_weekly_ranges(&read(p)?)?,
        None => current.weekly_ranges,
    };
    let missed_numbers = match missed {
        Some(p) => parse_missed_numbers(&read(p)?)?,
        None => current.missed_numbers,
    };
    let total_stats = parse_total_stats(&read(total)?)?;

    let settings = StatsSettings {
        weekly_ranges,
        missed_numbers,
        total_stats,
        updated_at: Some(chrono::Utc::now().timestamp_millis()),
    };
    store_settings(store, settings)
}

/// Importe un export JSON complet (voir `export-data`).
pub fn import_json<S: KeyValueStore + ?Sized>(store: &S, path: &Path) -> Result<ImportResult> {
    let mut settings: StatsSettings = serde_json::from_str(&read(path)?)
        .with_context(|| format!("JSON invalide dans {:?}", path))?;
    settings.total_stats = settings.table()?.entries().to_vec();
    settings.updated_at = Some(chrono::Utc::now().timestamp_millis());
    store_settings(store, settings)
}

fn store_settings<S: KeyValueStore + ?Sized>(store: &S, settings: StatsSettings) -> Result<ImportResult> {
    validate_settings(&settings)?;
    save_settings(store, &settings)?;
    let missed = MissedNumbers::LABELS
        .iter()
        .filter_map(|l| settings.missed_numbers.get(l))
        .map(|v| v.len())
        .sum();
    Ok(ImportResult {
        weekly_rows: settings.weekly_ranges.len(),
        missed_numbers: missed,
        total_entries: settings.total_stats.len(),
    })
}

pub fn export_json<S: KeyValueStore + ?Sized>(store: &S) -> Result<String> {
    let loaded = load_settings(store)?;
    serde_json::to_string_pretty(&loaded.settings).context("Échec de la sérialisation des statistiques")
}

#[cfg(test)]
mod tests {
    use super::*;
    use luckystat_db::db::migrate;
    use luckystat_db::rusqlite::Connection;

    fn total_csv(skip: Option<u8>) -> String {
        let mut s = String::from("num,count\n");
        for n in (1..=45u8).rev() {
            if Some(n) != skip {
                s.push_str(&format!("{}, {}\n", n, 100 + n as u32));
            }
        }
        s
    }

    #[test]
    fn test_parse_weekly_ranges() {
        let rows = parse_weekly_ranges("1-5\t92\t12\n\n 6-10 , 85.5 , 11 \n").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].range, "1-5");
        assert_eq!(rows[0].count, 12);
        assert!((rows[1].percent - 85.5).abs() < 1e-9);
    }

    #[test]
    fn test_parse_weekly_ranges_errors() {
        assert!(parse_weekly_ranges("1-5,92").is_err());
        assert!(parse_weekly_ranges("a-b,92,12").is_err());
        assert!(parse_weekly_ranges("1-5,x,12").is_err());
    }

    #[test]
    fn test_parse_missed_numbers() {
        let missed = parse_missed_numbers("1-10:\n11-20: 18\n41-45: 43, 44\n").unwrap();
        assert!(missed.band_1_10.is_empty());
        assert_eq!(missed.band_11_20, vec![18]);
        assert_eq!(missed.band_41_45, vec![43, 44]);
    }

    #[test]
    fn test_parse_missed_numbers_errors() {
        assert!(parse_missed_numbers("46-50: 47").is_err());
        assert!(parse_missed_numbers("sans deux points").is_err());
        assert!(parse_missed_numbers("1-10: x").is_err());
    }

    #[test]
    fn test_parse_total_stats_sorted() {
        let entries = parse_total_stats(&total_csv(None)).unwrap();
        assert_eq!(entries.len(), 45);
        assert_eq!(entries[0], StatEntry { num: 1, count: 101 });
        assert_eq!(entries[44], StatEntry { num: 45, count: 145 });
    }

    #[test]
    fn test_parse_total_stats_header_case_insensitive() {
        let text = total_csv(None).replacen("num,count", "NUM , Count", 1);
        assert!(parse_total_stats(&text).is_ok());
    }

    #[test]
    fn test_parse_total_stats_errors() {
        assert!(parse_total_stats(&total_csv(Some(30))).is_err());
        assert!(parse_total_stats(&total_csv(None).replacen("num,count", "n,c", 1)).is_err());
        assert!(parse_total_stats(&format!("{}46,1\n", total_csv(None))).is_err());
        assert!(parse_total_stats(&total_csv(None).replacen("7, 107", "7, -1", 1)).is_err());
    }

    #[test]
    fn test_import_text_files_saves() {
        let dir = std::env::temp_dir().join(format!("luckystat-import-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let total = dir.join("total.csv");
        let missed = dir.join("missed.txt");
        std::fs::write(&total, total_csv(None)).unwrap();
        std::fs::write(&missed, "21-30: 30\n").unwrap();

        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        let result = import_text_files(&conn, None, Some(&missed), &total).unwrap();
        assert_eq!(result.total_entries, 45);
        assert_eq!(result.missed_numbers, 1);
        // tranches hebdomadaires reprises des données de démonstration
        assert_eq!(result.weekly_rows, 9);

        let loaded = load_settings(&conn).unwrap();
        assert!(!loaded.is_sample);
        assert_eq!(loaded.table.count(45), 145);
        assert!(loaded.settings.updated_at.is_some());

        let json = export_json(&conn).unwrap();
        assert!(json.contains("\"__updatedAt\""));

        std::fs::remove_dir_all(&dir).ok();
    }
}
