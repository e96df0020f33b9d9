use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;

use luckystat_db::db::{load_auto_state_raw, load_settings, save_auto_state, KeyValueStore};
use luckystat_db::models::{validate_combination, AutoState};

use crate::schedule::{is_due, next_weekly_instant, Clock, RefreshAt, Sleeper};
use crate::strategy::StrategyEngine;

pub const DEFAULT_PER_STRATEGY: usize = 2;

/// Minuterie unique : réarmer remplace l'échéance précédente.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTimer {
    pub due: DateTime<Utc>,
}

/// Grilles complètes d'un état relu : chacune doit rester une grille valide.
fn check_restored(state: &AutoState) -> Result<()> {
    for tagged in &state.combinations {
        let combo = &tagged.combination;
        if combo.is_complete() {
            validate_combination(&combo.main, combo.bonus)
                .with_context(|| format!("grille {} invalide", tagged.id()))?;
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    Regenerated,
    Restored,
}

/// Propriétaire du panneau automatique : décide au chargement et à chaque
/// échéance s'il faut régénérer, persiste l'état et réarme la minuterie.
pub struct AutoRefreshController<'a, S: KeyValueStore + ?Sized, C: Clock> {
    store: &'a S,
    clock: C,
    refresh_at: RefreshAt,
    per_strategy: usize,
    rng: StdRng,
    state: Option<AutoState>,
    pending: Option<PendingTimer>,
}

impl<'a, S: KeyValueStore + ?Sized, C: Clock> AutoRefreshController<'a, S, C> {
    pub fn new(store: &'a S, clock: C) -> Self {
        Self {
            store,
            clock,
            refresh_at: RefreshAt::default(),
            per_strategy: DEFAULT_PER_STRATEGY,
            rng: StdRng::from_rng(&mut rand::rng()),
            state: None,
            pending: None,
        }
    }

    pub fn with_refresh_at(mut self, refresh_at: RefreshAt) -> Self {
        self.refresh_at = refresh_at;
        self
    }

    pub fn with_per_strategy(mut self, per_strategy: usize) -> Self {
        self.per_strategy = per_strategy.max(1);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn state(&self) -> Option<&AutoState> {
        self.state.as_ref()
    }

    pub fn pending(&self) -> Option<PendingTimer> {
        self.pending
    }

    fn now_utc(&self) -> DateTime<Utc> {
        self.clock.now().with_timezone(&Utc)
    }

    /// Lit l'état persisté ; absent, illisible ou échu déclenche une régénération.
    pub fn init(&mut self) -> Result<InitOutcome> {
        let now = self.now_utc();
        let stored = match load_auto_state_raw(self.store)? {
            Some(raw) => match serde_json::from_str::<AutoState>(&raw)
                .map_err(anyhow::Error::from)
                .and_then(|state| check_restored(&state).map(|_| state))
            {
                Ok(state) => Some(state),
                Err(e) => {
                    log::warn!("Panneau automatique illisible, régénération: {e}");
                    None
                }
            },
            None => None,
        };

        match stored {
            Some(state) if !is_due(&now, &state.next_refresh) => {
                log::debug!("Panneau automatique valide jusqu'au {}", state.next_refresh);
                self.state = Some(state);
                self.arm();
                Ok(InitOutcome::Restored)
            }
            _ => {
                self.regenerate()?;
                Ok(InitOutcome::Regenerated)
            }
        }
    }

    /// Comme `init`, mais `force` régénère aussi un panneau encore valide.
    /// Une seule régénération au plus.
    pub fn init_forced(&mut self, force: bool) -> Result<InitOutcome> {
        match self.init()? {
            InitOutcome::Restored if force => {
                self.regenerate()?;
                Ok(InitOutcome::Regenerated)
            }
            outcome => Ok(outcome),
        }
    }

    pub fn regenerate(&mut self) -> Result<&AutoState> {
        let now = self.clock.now();
        let loaded = load_settings(self.store)?;
        let engine = StrategyEngine::new(&loaded.table);
        let combinations = engine
            .auto_batch(self.per_strategy, &mut self.rng)
            .context("Échec de la génération du panneau automatique")?;

        let next_refresh = next_weekly_instant(&now, &self.refresh_at).with_timezone(&Utc);
        let state = AutoState {
            combinations,
            generated_at: now.with_timezone(&Utc),
            next_refresh,
        };
        save_auto_state(self.store, &state)?;
        log::info!(
            "Panneau automatique régénéré ({} grilles{}), prochain renouvellement {}",
            state.combinations.len(),
            if loaded.is_sample { ", données de démonstration" } else { "" },
            next_refresh
        );

        self.state = Some(state);
        self.arm();
        self.state.as_ref().context("état absent après régénération")
    }

    /// Arme la minuterie sur l'échéance de l'état courant, en annulant la précédente.
    pub fn arm(&mut self) {
        let Some(state) = &self.state else {
            self.pending = None;
            return;
        };
        let timer = PendingTimer { due: state.next_refresh };
        if let Some(previous) = self.pending.replace(timer) {
            if previous != timer {
                log::debug!("Minuterie {} annulée", previous.due);
            }
        }
    }

    pub fn cancel(&mut self) -> Option<PendingTimer> {
        self.pending.take()
    }

    pub fn delay_until_due(&self) -> Option<std::time::Duration> {
        let pending = self.pending?;
        let remaining = pending.due - self.now_utc();
        Some(remaining.to_std().unwrap_or(std::time::Duration::ZERO))
    }

    /// Échéance atteinte : régénère et réarme.
    pub fn fire(&mut self) -> Result<&AutoState> {
        self.pending = None;
        self.regenerate()
    }

    /// Déclenche la minuterie si elle est échue. Renvoie vrai si le panneau a été régénéré.
    pub fn poll(&mut self) -> Result<bool> {
        match self.pending {
            Some(timer) if is_due(&self.now_utc(), &timer.due) => {
                self.fire()?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Boucle coopérative : dort jusqu'à l'échéance, régénère, recommence.
    /// `max_fires` borne le nombre de régénérations (aucune borne si `None`).
    pub fn run<Sl, F>(&mut self, sleeper: &mut Sl, max_fires: Option<usize>, mut on_refresh: F) -> Result<()>
    where
        Sl: Sleeper,
        F: FnMut(&AutoState),
    {
        let mut fired = 0usize;
        while self.pending.is_some() {
            if max_fires.is_some_and(|max| fired >= max) {
                break;
            }
            if self.poll()? {
                fired += 1;
                if let Some(state) = &self.state {
                    on_refresh(state);
                }
                continue;
            }
            if let Some(delay) = self.delay_until_due() {
                log::debug!("Prochain renouvellement dans {}s", delay.as_secs());
                sleeper.sleep(delay);
            }
        }
        Ok(())
    }
}
