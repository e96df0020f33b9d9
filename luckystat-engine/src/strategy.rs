use rand::Rng;

use luckystat_db::models::{
    Combination, StatisticsTable, Strategy, TaggedCombination, MAIN_COUNT, NUMBER_MAX, NUMBER_MIN,
};

use crate::color::{color_preference, validate_bands, ColorBand};
use crate::error::GenerationError;
use crate::sampler::{count_adjacent_pairs, has_consecutive_run, uniform_sample, weighted_sample};

pub const MAX_ATTEMPTS: usize = 200;
pub const MAX_REPEAT: usize = 10;
const BOTTOM_EXCLUDED: usize = 10;

pub fn pure_random<R: Rng + ?Sized>(rng: &mut R) -> Result<Vec<u8>, GenerationError> {
    uniform_sample(rng, NUMBER_MIN, NUMBER_MAX, MAIN_COUNT)
}

pub fn weighted_random<R: Rng + ?Sized>(rng: &mut R, table: &StatisticsTable) -> Vec<u8> {
    weighted_sample(rng, table, MAIN_COUNT, &[])
}

/// Tirage uniforme contenant 1 à 2 paires consécutives.
///
/// Après `MAX_ATTEMPTS` échecs, les deux plus grands numéros sont forcés
/// consécutifs. Le dédoublonnage qui suit peut en théorie raccourcir la grille ;
/// ce comportement est conservé tel quel.
pub fn consecutive_random<R: Rng + ?Sized>(rng: &mut R) -> Result<Vec<u8>, GenerationError> {
    for _ in 0..MAX_ATTEMPTS {
        let nums = pure_random(rng)?;
        if has_consecutive_run(&nums) {
            return Ok(nums);
        }
    }

    log::debug!("consecutiveRandom: {MAX_ATTEMPTS} essais sans succès, ajustement forcé");
    Ok(force_last_pair(pure_random(rng)?))
}

/// Rend les deux plus grands numéros consécutifs, puis trie et dédoublonne.
/// Une grille incomplète est seulement triée et dédoublonnée.
fn force_last_pair(mut nums: Vec<u8>) -> Vec<u8> {
    nums.sort_unstable();
    if nums.len() == MAIN_COUNT {
        nums[5] = NUMBER_MAX.min(nums[4] + 1);
    }
    nums.sort_unstable();
    nums.dedup();
    nums.truncate(MAIN_COUNT);
    nums
}

/// Remplace le plus petit numéro par un voisin absent d'un des numéros tirés,
/// et garde la première variante qui contient 1 à 2 paires consécutives.
fn repair_with_neighbor(nums: &[u8]) -> Option<Vec<u8>> {
    if nums.is_empty() {
        return None;
    }
    for &n in nums {
        for d in [-1i16, 1] {
            let m = n as i16 + d;
            if m < NUMBER_MIN as i16 || m > NUMBER_MAX as i16 {
                continue;
            }
            let m = m as u8;
            if nums.contains(&m) {
                continue;
            }
            let mut replaced = nums.to_vec();
            replaced[0] = m;
            replaced.sort_unstable();
            if has_consecutive_run(&replaced) {
                return Some(replaced);
            }
        }
    }
    None
}

pub fn weighted_with_consecutive<R: Rng + ?Sized>(rng: &mut R, table: &StatisticsTable) -> Vec<u8> {
    for attempt in 0..MAX_ATTEMPTS {
        let nums = weighted_random(rng, table);
        if has_consecutive_run(&nums) {
            return nums;
        }
        if let Some(repaired) = repair_with_neighbor(&nums) {
            log::debug!(
                "weightedWithConsecutive: {:?} réparé en {:?} (essai {}, {} paires)",
                nums,
                repaired,
                attempt + 1,
                count_adjacent_pairs(&repaired)
            );
            return repaired;
        }
    }

    log::debug!("weightedWithConsecutive: {MAX_ATTEMPTS} essais sans succès, tirage pondéré simple");
    weighted_random(rng, table)
}

/// Les 10 numéros les moins fréquents. Tri stable par compte croissant sur la
/// table ordonnée par numéro : à égalité, le plus petit numéro est exclu en premier.
pub fn bottom10(table: &StatisticsTable) -> Vec<u8> {
    let mut sorted = table.entries().to_vec();
    sorted.sort_by_key(|e| e.count);
    sorted.iter().take(BOTTOM_EXCLUDED).map(|e| e.num).collect()
}

pub fn weighted_exclude_bottom10<R: Rng + ?Sized>(rng: &mut R, table: &StatisticsTable) -> Vec<u8> {
    let excluded = bottom10(table);
    weighted_sample(rng, table, MAIN_COUNT, &excluded)
}

/// Une demande de génération : stratégie, nombre de grilles et couleurs éventuelles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub strategy: Strategy,
    pub repeat: usize,
    pub colors: Vec<ColorBand>,
}

impl GenerationRequest {
    /// `repeat` est ramené dans 1..=10.
    pub fn new(strategy: Strategy, repeat: usize) -> Self {
        Self {
            strategy,
            repeat: repeat.clamp(1, MAX_REPEAT),
            colors: Vec::new(),
        }
    }

    pub fn with_colors(mut self, colors: &[ColorBand]) -> Self {
        self.colors = colors.to_vec();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub strategy: Strategy,
    pub label: String,
    pub combinations: Vec<Combination>,
}

pub struct StrategyEngine<'a> {
    table: &'a StatisticsTable,
}

impl<'a> StrategyEngine<'a> {
    pub fn new(table: &'a StatisticsTable) -> Self {
        Self { table }
    }

    pub fn generate<R: Rng + ?Sized>(
        &self,
        strategy: Strategy,
        colors: &[ColorBand],
        rng: &mut R,
    ) -> Result<Combination, GenerationError> {
        let main = match strategy {
            Strategy::PureRandom => pure_random(rng)?,
            Strategy::WeightedRandom => weighted_random(rng, self.table),
            Strategy::ConsecutiveRandom => consecutive_random(rng)?,
            Strategy::WeightedWithConsecutive => weighted_with_consecutive(rng, self.table),
            Strategy::WeightedExcludeBottom10 => weighted_exclude_bottom10(rng, self.table),
            Strategy::ColorPreference => color_preference(rng, colors)?,
        };
        if main.len() < MAIN_COUNT {
            log::warn!("{}: tirage partiel de {} numéros", strategy.id(), main.len());
        }
        Ok(Combination::new(main))
    }

    /// Génère un lot par demande. Les couleurs sont validées avant tout tirage :
    /// une erreur de saisie annule l'appel entier.
    pub fn generate_batches<R: Rng + ?Sized>(
        &self,
        requests: &[GenerationRequest],
        rng: &mut R,
    ) -> Result<Vec<Batch>, GenerationError> {
        for req in requests {
            if req.strategy == Strategy::ColorPreference {
                validate_bands(&req.colors)?;
            }
        }

        let mut batches = Vec::with_capacity(requests.len());
        for req in requests {
            let mut combinations = Vec::with_capacity(req.repeat);
            for _ in 0..req.repeat {
                combinations.push(self.generate(req.strategy, &req.colors, rng)?);
            }
            batches.push(Batch {
                strategy: req.strategy,
                label: req.strategy.label().to_string(),
                combinations,
            });
        }
        Ok(batches)
    }

    /// Panneau automatique : `per_strategy` grilles pour chacune des 5 stratégies sans préférence.
    pub fn auto_batch<R: Rng + ?Sized>(
        &self,
        per_strategy: usize,
        rng: &mut R,
    ) -> Result<Vec<TaggedCombination>, GenerationError> {
        let mut out = Vec::with_capacity(per_strategy * Strategy::AUTO.len());
        for strategy in Strategy::AUTO {
            for index in 1..=per_strategy {
                out.push(TaggedCombination {
                    strategy,
                    index,
                    combination: self.generate(strategy, &[], rng)?,
                });
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use luckystat_db::models::StatEntry;
    use luckystat_db::sample::sample_table;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn table_with(counts: impl Fn(u8) -> u32) -> StatisticsTable {
        let entries: Vec<StatEntry> = (1..=45).map(|num| StatEntry { num, count: counts(num) }).collect();
        StatisticsTable::from_entries(&entries).unwrap()
    }

    #[test]
    fn test_pure_random_valid() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let nums = pure_random(&mut rng).unwrap();
            assert_eq!(nums.len(), 6);
            assert!(nums.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_consecutive_random_mostly_in_range() {
        let mut rng = StdRng::seed_from_u64(42);
        let ok = (0..1000)
            .filter(|_| has_consecutive_run(&consecutive_random(&mut rng).unwrap()))
            .count();
        assert!(ok >= 995, "seulement {ok}/1000 grilles avec 1 à 2 paires");
    }

    #[test]
    fn test_weighted_with_consecutive_mostly_in_range() {
        let mut rng = StdRng::seed_from_u64(42);
        let table = sample_table();
        let mut ok = 0;
        for _ in 0..1000 {
            let nums = weighted_with_consecutive(&mut rng, &table);
            assert_eq!(nums.len(), 6);
            let mut dedup = nums.clone();
            dedup.dedup();
            assert_eq!(dedup.len(), 6, "doublon: {nums:?}");
            if has_consecutive_run(&nums) {
                ok += 1;
            }
        }
        assert!(ok >= 995, "seulement {ok}/1000 grilles avec 1 à 2 paires");
    }

    #[test]
    fn test_force_last_pair() {
        assert_eq!(force_last_pair(vec![3, 9, 17, 25, 30, 41]), vec![3, 9, 17, 25, 30, 31]);
        assert_eq!(force_last_pair(vec![41, 3, 30, 9, 25, 17]), vec![3, 9, 17, 25, 30, 31]);
        // déjà consécutifs : inchangé
        assert_eq!(force_last_pair(vec![1, 5, 9, 13, 44, 45]), vec![1, 5, 9, 13, 44, 45]);
        assert!(has_consecutive_run(&force_last_pair(vec![2, 4, 6, 8, 10, 12])));
    }

    #[test]
    fn test_force_last_pair_short_and_duplicate_input() {
        assert_eq!(force_last_pair(vec![7, 2]), vec![2, 7]);
        // un doublon en entrée raccourcit la grille
        assert_eq!(force_last_pair(vec![4, 4, 10, 20, 30, 40]), vec![4, 10, 20, 30, 31]);
        assert!(force_last_pair(vec![]).is_empty());
    }

    #[test]
    fn test_weighted_with_consecutive_falls_back_to_plain_draw() {
        // seuls 1..=6 ont un poids : chaque tirage a 5 paires et aucune réparation n'aboutit
        let table = table_with(|n| if n <= 6 { 10 } else { 0 });
        assert!(repair_with_neighbor(&[1, 2, 3, 4, 5, 6]).is_none());

        let mut rng = StdRng::seed_from_u64(42);
        let nums = weighted_with_consecutive(&mut rng, &table);
        assert_eq!(nums, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(count_adjacent_pairs(&nums), 5);
        assert!(!has_consecutive_run(&nums));
    }

    #[test]
    fn test_repair_replaces_smallest() {
        // 5 n'est voisin de rien : remplacer 5 par 9 crée la paire 9-10
        let repaired = repair_with_neighbor(&[5, 10, 20, 30, 40, 44]).unwrap();
        assert_eq!(repaired, vec![9, 10, 20, 30, 40, 44]);
        assert!(repair_with_neighbor(&[]).is_none());
    }

    #[test]
    fn test_repair_never_introduces_duplicates() {
        let repaired = repair_with_neighbor(&[1, 3, 5, 7, 9, 11]).unwrap();
        let mut dedup = repaired.clone();
        dedup.dedup();
        assert_eq!(dedup.len(), repaired.len());
        assert!(has_consecutive_run(&repaired));
    }

    #[test]
    fn test_bottom10_lowest_counts() {
        let table = table_with(|n| if n <= 10 { n as u32 } else { 100 + n as u32 });
        let mut bottom = bottom10(&table);
        bottom.sort_unstable();
        assert_eq!(bottom, (1..=10).collect::<Vec<u8>>());
    }

    #[test]
    fn test_bottom10_tie_break_lower_number_first() {
        // 12 numéros à égalité au plus bas : 3, 6, ..., 36 ; seuls les 10 premiers sont exclus
        let table = table_with(|n| if n % 3 == 0 && n <= 36 { 5 } else { 50 });
        assert_eq!(bottom10(&table), vec![3, 6, 9, 12, 15, 18, 21, 24, 27, 30]);
    }

    #[test]
    fn test_exclude_bottom10_never_picks_excluded() {
        let mut rng = StdRng::seed_from_u64(9);
        let table = table_with(|n| if n <= 10 { 1 } else { 50 + n as u32 });
        for _ in 0..500 {
            let nums = weighted_exclude_bottom10(&mut rng, &table);
            assert_eq!(nums.len(), 6);
            assert!(nums.iter().all(|&n| n > 10), "{nums:?}");
        }
    }

    #[test]
    fn test_engine_never_sets_bonus() {
        let table = sample_table();
        let engine = StrategyEngine::new(&table);
        let mut rng = StdRng::seed_from_u64(3);
        for st in Strategy::ALL {
            let combo = engine.generate(st, &[ColorBand::Blue, ColorBand::Red], &mut rng).unwrap();
            assert!(combo.bonus.is_none());
            assert!(combo.is_complete(), "{st}: {combo}");
        }
    }

    #[test]
    fn test_generate_batches_shapes() {
        let table = sample_table();
        let engine = StrategyEngine::new(&table);
        let mut rng = StdRng::seed_from_u64(5);
        let requests = vec![
            GenerationRequest::new(Strategy::PureRandom, 3),
            GenerationRequest::new(Strategy::ColorPreference, 2).with_colors(&[ColorBand::Green]),
        ];
        let batches = engine.generate_batches(&requests, &mut rng).unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].combinations.len(), 3);
        assert_eq!(batches[0].label, Strategy::PureRandom.label());
        assert!(batches[1]
            .combinations
            .iter()
            .all(|c| c.main.iter().all(|n| (11..=20).contains(n))));
    }

    #[test]
    fn test_generate_batches_color_error_aborts() {
        let table = sample_table();
        let engine = StrategyEngine::new(&table);
        let mut rng = StdRng::seed_from_u64(5);
        let requests = vec![
            GenerationRequest::new(Strategy::PureRandom, 1),
            GenerationRequest::new(Strategy::ColorPreference, 1),
        ];
        assert_eq!(
            engine.generate_batches(&requests, &mut rng),
            Err(GenerationError::NoColorSelected)
        );
    }

    #[test]
    fn test_request_repeat_clamped() {
        assert_eq!(GenerationRequest::new(Strategy::PureRandom, 0).repeat, 1);
        assert_eq!(GenerationRequest::new(Strategy::PureRandom, 50).repeat, 10);
    }

    #[test]
    fn test_auto_batch_layout() {
        let table = sample_table();
        let engine = StrategyEngine::new(&table);
        let mut rng = StdRng::seed_from_u64(5);
        let auto = engine.auto_batch(2, &mut rng).unwrap();
        assert_eq!(auto.len(), 10);
        let ids: Vec<String> = auto.iter().map(|t| t.id()).collect();
        assert_eq!(ids[0], "pureRandom-1");
        assert_eq!(ids[1], "pureRandom-2");
        assert_eq!(ids[9], "weightedExcludeBottom10-2");
        assert!(auto.iter().all(|t| t.strategy != Strategy::ColorPreference));
    }

    #[test]
    fn test_seed_determinism() {
        let table = sample_table();
        let engine = StrategyEngine::new(&table);
        let a = engine.auto_batch(2, &mut StdRng::seed_from_u64(123)).unwrap();
        let b = engine.auto_batch(2, &mut StdRng::seed_from_u64(123)).unwrap();
        assert_eq!(a, b);
    }
}
