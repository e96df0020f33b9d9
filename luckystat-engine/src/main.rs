mod import;
mod interactive;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;

use luckystat_db::db::{db_path, load_settings, migrate, open_db};
use luckystat_db::models::Strategy;
use luckystat_db::rusqlite::Connection;
use luckystat_engine::auto_refresh::AutoRefreshController;
use luckystat_engine::color::ColorBand;
use luckystat_engine::config::AppConfig;
use luckystat_engine::display::{display_auto, display_batches, display_stats, format_refresh_date};
use luckystat_engine::schedule::{SystemClock, ThreadSleeper};
use luckystat_engine::session::{export_auto_csv, Session};
use luckystat_engine::strategy::GenerationRequest;

#[derive(Parser)]
#[command(name = "luckystat", about = "Générateur de grilles 6/45 guidé par les statistiques")]
struct Cli {
    /// Fichier de configuration JSON (défaut : luckystat.json s'il existe)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Chemin de la base SQLite
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Générer des grilles avec une ou plusieurs stratégies
    Generate {
        /// Stratégies (séparées par des virgules), ex: pureRandom,weightedRandom
        #[arg(short, long, value_delimiter = ',', value_parser = parse_strategy, default_value = "pureRandom")]
        strategies: Vec<Strategy>,

        /// Nombre de grilles par stratégie (1-10)
        #[arg(short, long)]
        count: Option<usize>,

        /// Couleurs pour colorPreference (blue, green, orange, red, purple)
        #[arg(long, value_delimiter = ',')]
        colors: Vec<ColorBand>,

        /// Seed pour la reproductibilité
        #[arg(long)]
        seed: Option<u64>,

        /// Exporter les grilles en CSV
        #[arg(short, long)]
        export: Option<PathBuf>,
    },

    /// Afficher le panneau automatique de la semaine (régénéré si échu)
    Auto {
        /// Régénérer même si le panneau est encore valide
        #[arg(long)]
        force: bool,

        /// Exporter le panneau en CSV
        #[arg(short, long)]
        export: Option<PathBuf>,
    },

    /// Rester actif et régénérer le panneau à chaque échéance
    Watch,

    /// Afficher les statistiques utilisées
    Stats,

    /// Importer les statistiques
    Import {
        /// CSV num,count des 45 numéros
        #[arg(long, conflicts_with = "json")]
        total: Option<PathBuf>,

        /// Tranches hebdomadaires (tranche,%,nombre)
        #[arg(long, requires = "total")]
        weekly: Option<PathBuf>,

        /// Numéros manqués (1-10: 3,7)
        #[arg(long, requires = "total")]
        missed: Option<PathBuf>,

        /// Export JSON complet
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// Exporter les statistiques en JSON
    ExportData {
        /// Fichier de sortie (défaut : sortie standard)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Afficher le chemin de la base de données
    DbPath,

    /// Mode interactif
    Interactive,
}

fn parse_strategy(s: &str) -> Result<Strategy, String> {
    s.parse::<Strategy>().map_err(|e| e.to_string())
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;

    let path = cli
        .db
        .clone()
        .or_else(|| config.db_path.clone())
        .unwrap_or_else(db_path);
    let conn = open_db(&path)?;
    migrate(&conn)?;

    match cli.command {
        Command::Generate {
            strategies,
            count,
            colors,
            seed,
            export,
        } => cmd_generate(&conn, &config, &strategies, count, &colors, seed, export.as_deref()),
        Command::Auto { force, export } => cmd_auto(&conn, &config, force, export.as_deref()),
        Command::Watch => cmd_watch(&conn, &config),
        Command::Stats => cmd_stats(&conn),
        Command::Import {
            total,
            weekly,
            missed,
            json,
        } => cmd_import(&conn, total.as_deref(), weekly.as_deref(), missed.as_deref(), json.as_deref()),
        Command::ExportData { output } => cmd_export_data(&conn, output.as_deref()),
        Command::DbPath => {
            println!("{}", path.display());
            Ok(())
        }
        Command::Interactive => interactive::run_interactive(&conn, &config),
    }
}

pub(crate) fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_rng(&mut rand::rng()),
    }
}

pub(crate) fn open_session(conn: &Connection) -> Result<Session> {
    let loaded = load_settings(conn)?;
    if loaded.is_sample {
        println!("(Statistiques de démonstration : importez les vôtres avec `luckystat import`)");
    }
    Ok(Session::new(loaded.table, loaded.is_sample))
}

fn cmd_generate(
    conn: &Connection,
    config: &AppConfig,
    strategies: &[Strategy],
    count: Option<usize>,
    colors: &[ColorBand],
    seed: Option<u64>,
    export: Option<&Path>,
) -> Result<()> {
    let mut session = open_session(conn)?;
    let mut rng = make_rng(seed);
    let repeat = count.unwrap_or(config.default_repeat);

    let requests: Vec<GenerationRequest> = strategies
        .iter()
        .map(|&st| GenerationRequest::new(st, repeat).with_colors(colors))
        .collect();

    let batches = session.generate(&requests, &mut rng)?;
    display_batches(batches);

    if let Some(path) = export {
        let file = std::fs::File::create(path)
            .with_context(|| format!("Impossible de créer {:?}", path))?;
        session.export_csv(file)?;
        println!("\nGrilles exportées dans {}", path.display());
    }
    Ok(())
}

fn cmd_auto(conn: &Connection, config: &AppConfig, force: bool, export: Option<&Path>) -> Result<()> {
    let mut controller = AutoRefreshController::new(conn, SystemClock)
        .with_refresh_at(config.refresh)
        .with_per_strategy(config.auto_per_strategy);
    controller.init_forced(force)?;

    let Some(state) = controller.state() else {
        bail!("Panneau automatique indisponible");
    };
    display_auto(state);

    if let Some(path) = export {
        let file = std::fs::File::create(path)
            .with_context(|| format!("Impossible de créer {:?}", path))?;
        export_auto_csv(state, file)?;
        println!("\nPanneau exporté dans {}", path.display());
    }
    Ok(())
}

fn cmd_watch(conn: &Connection, config: &AppConfig) -> Result<()> {
    let mut controller = AutoRefreshController::new(conn, SystemClock)
        .with_refresh_at(config.refresh)
        .with_per_strategy(config.auto_per_strategy);
    controller.init()?;
    if let Some(state) = controller.state() {
        display_auto(state);
        println!("En attente du prochain renouvellement ({})...", format_refresh_date(&state.next_refresh));
    }

    controller.run(&mut ThreadSleeper, None, |state| {
        display_auto(state);
    })
}

fn cmd_stats(conn: &Connection) -> Result<()> {
    let loaded = load_settings(conn)?;
    display_stats(&loaded.settings, loaded.is_sample);
    Ok(())
}

fn cmd_import(
    conn: &Connection,
    total: Option<&Path>,
    weekly: Option<&Path>,
    missed: Option<&Path>,
    json: Option<&Path>,
) -> Result<()> {
    let result = match (json, total) {
        (Some(json), _) => import::import_json(conn, json)?,
        (None, Some(total)) => import::import_text_files(conn, weekly, missed, total)?,
        (None, None) => bail!("Indiquez --total <csv> ou --json <fichier>"),
    };

    println!("Import terminé :");
    println!("  Numéros           : {}", result.total_entries);
    println!("  Tranches hebdo    : {}", result.weekly_rows);
    println!("  Numéros manqués   : {}", result.missed_numbers);
    Ok(())
}

fn cmd_export_data(conn: &Connection, output: Option<&Path>) -> Result<()> {
    let json = import::export_json(conn)?;
    match output {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("Impossible d'écrire {:?}", path))?;
            println!("Statistiques exportées dans {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}
