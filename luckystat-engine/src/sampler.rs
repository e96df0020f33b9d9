use rand::seq::SliceRandom;
use rand::Rng;

use luckystat_db::models::{StatisticsTable, POOL_SIZE};

use crate::error::GenerationError;

/// Tire `k` numéros distincts de `[min, max]` sans remise (Fisher-Yates), triés.
pub fn uniform_sample<R: Rng + ?Sized>(
    rng: &mut R,
    min: u8,
    max: u8,
    k: usize,
) -> Result<Vec<u8>, GenerationError> {
    let span = if max >= min { (max - min) as usize + 1 } else { 0 };
    if k > span {
        return Err(GenerationError::SampleTooLarge { k, span });
    }

    let mut pool: Vec<u8> = (min..=max).collect();
    pool.shuffle(rng);
    pool.truncate(k);
    pool.sort_unstable();
    Ok(pool)
}

/// Tirage pondéré sans remise par inversion des poids cumulés.
///
/// À chaque tirage, la probabilité d'un candidat est proportionnelle à son
/// compte parmi les numéros ni déjà tirés ni exclus. Si le poids restant tombe
/// à zéro avant `k` tirages, le résultat est plus court que `k` : c'est à
/// l'appelant de le vérifier.
pub fn weighted_sample<R: Rng + ?Sized>(
    rng: &mut R,
    table: &StatisticsTable,
    k: usize,
    exclude: &[u8],
) -> Vec<u8> {
    let mut blocked = [false; POOL_SIZE + 1];
    for &n in exclude {
        if let Some(slot) = blocked.get_mut(n as usize) {
            *slot = true;
        }
    }

    let mut picked = Vec::with_capacity(k);

    for _ in 0..k {
        let total: u64 = table
            .iter()
            .filter(|e| !blocked[e.num as usize])
            .map(|e| e.count as u64)
            .sum();
        if total == 0 {
            break;
        }

        let r = rng.random_range(0..total);
        let mut acc = 0u64;
        let mut chosen = None;
        for e in table.iter() {
            if blocked[e.num as usize] {
                continue;
            }
            acc += e.count as u64;
            if r < acc {
                chosen = Some(e.num);
                break;
            }
        }

        let Some(num) = chosen else { break };
        blocked[num as usize] = true;
        picked.push(num);
    }

    picked.sort_unstable();
    picked
}

/// Nombre de voisins directs (écart de 1) dans la suite triée.
pub fn count_adjacent_pairs(numbers: &[u8]) -> usize {
    let mut sorted = numbers.to_vec();
    sorted.sort_unstable();
    sorted.windows(2).filter(|w| w[1] == w[0] + 1).count()
}

pub fn has_consecutive_run(numbers: &[u8]) -> bool {
    (1..=2).contains(&count_adjacent_pairs(numbers))
}
