use std::io::Write;

use anyhow::{bail, Context, Result};
use rand::Rng;

use luckystat_db::models::{AutoState, Combination, StatisticsTable, Strategy, MAIN_COUNT};

use crate::error::GenerationError;
use crate::strategy::{Batch, GenerationRequest, StrategyEngine};

const CSV_HEADER: [&str; 8] = ["condition", "index", "n1", "n2", "n3", "n4", "n5", "n6"];

/// Contexte d'une exécution : statistiques courantes et derniers lots générés,
/// réutilisés par l'export et la copie.
pub struct Session {
    table: StatisticsTable,
    is_sample: bool,
    last_batches: Vec<Batch>,
}

impl Session {
    pub fn new(table: StatisticsTable, is_sample: bool) -> Self {
        Self {
            table,
            is_sample,
            last_batches: Vec::new(),
        }
    }

    pub fn is_sample(&self) -> bool {
        self.is_sample
    }

    pub fn set_table(&mut self, table: StatisticsTable, is_sample: bool) {
        self.table = table;
        self.is_sample = is_sample;
    }

    pub fn last_batches(&self) -> &[Batch] {
        &self.last_batches
    }

    /// Génère et mémorise les lots. En cas d'erreur de saisie, les lots précédents sont conservés.
    pub fn generate<R: Rng + ?Sized>(
        &mut self,
        requests: &[GenerationRequest],
        rng: &mut R,
    ) -> Result<&[Batch], GenerationError> {
        let batches = StrategyEngine::new(&self.table).generate_batches(requests, rng)?;
        self.last_batches = batches;
        Ok(&self.last_batches)
    }

    /// Une ligne par grille, au format « a, b, c, d, e, f ».
    pub fn lines(&self) -> Vec<String> {
        self.last_batches
            .iter()
            .flat_map(|b| b.combinations.iter().map(|c| c.to_string()))
            .collect()
    }

    pub fn export_csv<W: Write>(&self, writer: W) -> Result<()> {
        if self.last_batches.is_empty() {
            bail!("Générez d'abord des grilles avant d'exporter");
        }
        let rows = self.last_batches.iter().flat_map(|b| {
            b.combinations
                .iter()
                .enumerate()
                .map(move |(i, c)| (b.strategy, i + 1, c))
        });
        write_csv(writer, rows)
    }
}

pub fn export_auto_csv<W: Write>(state: &AutoState, writer: W) -> Result<()> {
    let rows = state
        .combinations
        .iter()
        .map(|t| (t.strategy, t.index, &t.combination));
    write_csv(writer, rows)
}

fn write_csv<'c, W, I>(writer: W, rows: I) -> Result<()>
where
    W: Write,
    I: Iterator<Item = (Strategy, usize, &'c Combination)>,
{
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(CSV_HEADER).context("Échec de l'écriture de l'en-tête CSV")?;
    for (strategy, index, combo) in rows {
        let mut record = vec![strategy.id().to_string(), index.to_string()];
        for i in 0..MAIN_COUNT {
            // un tirage partiel laisse des colonnes vides
            record.push(combo.main.get(i).map(|n| n.to_string()).unwrap_or_default());
        }
        wtr.write_record(&record).context("Échec de l'écriture CSV")?;
    }
    wtr.flush().context("Échec de l'écriture CSV")?;
    Ok(())
}
