use rand::Rng;
use serde::{Deserialize, Serialize};

use luckystat_db::models::MAIN_COUNT;

use crate::error::GenerationError;

const GUARD: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ColorBand {
    Blue,
    Green,
    Orange,
    Red,
    Purple,
}

impl ColorBand {
    pub const ALL: [ColorBand; 5] = [
        ColorBand::Blue,
        ColorBand::Green,
        ColorBand::Orange,
        ColorBand::Red,
        ColorBand::Purple,
    ];

    /// Bornes incluses de la tranche.
    pub fn range(&self) -> (u8, u8) {
        match self {
            ColorBand::Blue => (1, 10),
            ColorBand::Green => (11, 20),
            ColorBand::Orange => (21, 30),
            ColorBand::Red => (31, 40),
            ColorBand::Purple => (41, 45),
        }
    }

    pub fn numbers(&self) -> Vec<u8> {
        let (lo, hi) = self.range();
        (lo..=hi).collect()
    }

    pub fn span(&self) -> usize {
        let (lo, hi) = self.range();
        (hi - lo) as usize + 1
    }

    /// Tranche de couleur d'un numéro ; tout ce qui dépasse 40 est violet.
    pub fn of(n: u8) -> ColorBand {
        match n {
            1..=10 => ColorBand::Blue,
            11..=20 => ColorBand::Green,
            21..=30 => ColorBand::Orange,
            31..=40 => ColorBand::Red,
            _ => ColorBand::Purple,
        }
    }
}

/// Dédoublonne en gardant l'ordre de sélection, puis vérifie qu'on peut former une grille.
pub fn validate_bands(bands: &[ColorBand]) -> Result<Vec<ColorBand>, GenerationError> {
    let mut unique: Vec<ColorBand> = Vec::with_capacity(bands.len());
    for &b in bands {
        if !unique.contains(&b) {
            unique.push(b);
        }
    }
    if unique.is_empty() {
        return Err(GenerationError::NoColorSelected);
    }
    let available: usize = unique.iter().map(|b| b.span()).sum();
    if available < MAIN_COUNT {
        return Err(GenerationError::InsufficientColorSpan { available });
    }
    Ok(unique)
}

fn pick_from<R: Rng + ?Sized>(rng: &mut R, candidates: &[u8]) -> Option<u8> {
    if candidates.is_empty() {
        return None;
    }
    Some(candidates[rng.random_range(0..candidates.len())])
}

/// Grille restreinte aux tranches choisies : un numéro par couleur d'abord,
/// puis des couleurs tirées au hasard jusqu'à 6 numéros.
pub fn color_preference<R: Rng + ?Sized>(
    rng: &mut R,
    bands: &[ColorBand],
) -> Result<Vec<u8>, GenerationError> {
    let bands = validate_bands(bands)?;
    let mut picked: Vec<u8> = Vec::with_capacity(MAIN_COUNT);

    for band in &bands {
        if picked.len() >= MAIN_COUNT {
            break;
        }
        let candidates: Vec<u8> = band.numbers().into_iter().filter(|n| !picked.contains(n)).collect();
        if let Some(n) = pick_from(rng, &candidates) {
            picked.push(n);
        }
    }

    let mut guard = 0;
    while picked.len() < MAIN_COUNT && guard < GUARD {
        guard += 1;
        let band = bands[rng.random_range(0..bands.len())];
        let candidates: Vec<u8> = band.numbers().into_iter().filter(|n| !picked.contains(n)).collect();
        let pick = match pick_from(rng, &candidates) {
            Some(n) => n,
            None => {
                // couleur épuisée : n'importe quel numéro restant des couleurs choisies
                let any: Vec<u8> = bands
                    .iter()
                    .flat_map(|b| b.numbers())
                    .filter(|n| !picked.contains(n))
                    .collect();
                match pick_from(rng, &any) {
                    Some(n) => n,
                    None => break,
                }
            }
        };
        picked.push(pick);
    }

    if picked.len() < MAIN_COUNT {
        return Err(GenerationError::InsufficientColorSpan { available: picked.len() });
    }
    picked.sort_unstable();
    Ok(picked)
}
