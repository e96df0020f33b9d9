use chrono::{DateTime, Local, Utc};
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};

use luckystat_db::models::{AutoState, Combination, StatsSettings, MAIN_COUNT};

use crate::color::ColorBand;
use crate::strategy::Batch;

fn band_color(n: u8) -> Color {
    match ColorBand::of(n) {
        ColorBand::Blue => Color::Blue,
        ColorBand::Green => Color::Green,
        ColorBand::Orange => Color::DarkYellow,
        ColorBand::Red => Color::Red,
        ColorBand::Purple => Color::Magenta,
    }
}

fn number_cells(combo: &Combination) -> Vec<Cell> {
    let mut cells: Vec<Cell> = combo
        .main
        .iter()
        .map(|&n| Cell::new(format!("{:2}", n)).fg(band_color(n)))
        .collect();
    // tirage partiel
    while cells.len() < MAIN_COUNT {
        cells.push(Cell::new("—"));
    }
    if let Some(b) = combo.bonus {
        cells.push(Cell::new(format!("+ {:2}", b)));
    }
    cells
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

/// Date courte du renouvellement, heure locale (aa-mm-jj).
pub fn format_refresh_date(dt: &DateTime<Utc>) -> String {
    dt.with_timezone(&Local).format("%y-%m-%d").to_string()
}

pub fn display_batches(batches: &[Batch]) {
    if batches.is_empty() {
        println!("Aucune grille à afficher.");
        return;
    }

    for batch in batches {
        println!("\n── {} ──", batch.label);
        let mut table = new_table(vec!["#", "N1", "N2", "N3", "N4", "N5", "N6"]);
        for (i, combo) in batch.combinations.iter().enumerate() {
            let mut row = vec![Cell::new(i + 1)];
            row.extend(number_cells(combo));
            table.add_row(row);
        }
        println!("{table}");
    }
}

pub fn display_auto(state: &AutoState) {
    println!("\n🎲 Grilles de la semaine (renouvellement : {})\n", format_refresh_date(&state.next_refresh));

    let mut table = new_table(vec!["Stratégie", "#", "N1", "N2", "N3", "N4", "N5", "N6"]);
    for tagged in &state.combinations {
        let mut row = vec![Cell::new(tagged.strategy.label()), Cell::new(tagged.index)];
        row.extend(number_cells(&tagged.combination));
        table.add_row(row);
    }
    println!("{table}");
}

pub fn display_stats(settings: &StatsSettings, is_sample: bool) {
    if is_sample {
        println!("\n📊 Statistiques (données de démonstration)\n");
    } else {
        let updated = settings
            .updated_at
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .map(|dt| dt.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("\n📊 Statistiques (dernière mise à jour : {})\n", updated);
    }

    let mut table = new_table(vec!["Numéro", "Occurrences"]);
    let mut sorted = settings.total_stats.clone();
    sorted.sort_by(|a, b| b.count.cmp(&a.count).then(a.num.cmp(&b.num)));
    for entry in &sorted {
        table.add_row(vec![
            Cell::new(format!("{:2}", entry.num)).fg(band_color(entry.num)),
            Cell::new(entry.count),
        ]);
    }
    println!("{table}");
    if let Ok(stats) = settings.table() {
        println!("Total : {} occurrences", stats.total());
    }

    if !settings.weekly_ranges.is_empty() {
        println!("\n── Tranches hebdomadaires ──");
        let mut table = new_table(vec!["Tranche", "%", "Occurrences"]);
        for r in &settings.weekly_ranges {
            table.add_row(vec![Cell::new(&r.range), Cell::new(r.percent), Cell::new(r.count)]);
        }
        println!("{table}");
    }

    println!("\n── Numéros manqués ──");
    for label in luckystat_db::models::MissedNumbers::LABELS {
        let nums = settings
            .missed_numbers
            .get(label)
            .map(|v| v.iter().map(|n| n.to_string()).collect::<Vec<_>>().join(","))
            .unwrap_or_default();
        println!("  {:>5} : {}", label, nums);
    }
}
