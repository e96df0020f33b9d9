use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::ValueEnum;

use luckystat_db::db::load_settings;
use luckystat_db::models::Strategy;
use luckystat_db::rusqlite::Connection;
use luckystat_engine::auto_refresh::AutoRefreshController;
use luckystat_engine::color::ColorBand;
use luckystat_engine::config::AppConfig;
use luckystat_engine::display::{display_auto, display_batches, display_stats};
use luckystat_engine::schedule::SystemClock;
use luckystat_engine::session::Session;
use luckystat_engine::strategy::GenerationRequest;

use crate::{make_rng, open_session};

#[derive(Debug, PartialEq)]
enum InteractiveCommand {
    Generate,
    Auto,
    Export,
    Copy,
    Stats,
    Quit,
}

fn parse_command(input: &str) -> Option<InteractiveCommand> {
    match input.trim().to_lowercase().as_str() {
        "1" | "generer" | "générer" | "generate" | "gen" => Some(InteractiveCommand::Generate),
        "2" | "auto" => Some(InteractiveCommand::Auto),
        "3" | "exporter" | "export" => Some(InteractiveCommand::Export),
        "4" | "copier" | "copy" => Some(InteractiveCommand::Copy),
        "5" | "stats" | "statistiques" => Some(InteractiveCommand::Stats),
        "6" | "quitter" | "quit" | "q" | "exit" => Some(InteractiveCommand::Quit),
        _ => None,
    }
}

fn display_menu() {
    println!();
    println!("── Mode interactif ──");
    println!("  1. generer    Générer des grilles");
    println!("  2. auto       Panneau de la semaine");
    println!("  3. exporter   Exporter les dernières grilles (CSV)");
    println!("  4. copier     Afficher les dernières grilles en texte");
    println!("  5. stats      Statistiques utilisées");
    println!("  6. quitter    Quitter");
    println!();
}

/// Une ligne sans espaces de bord ; `None` en fin d'entrée.
fn read_input<R: BufRead>(reader: &mut R) -> Result<Option<String>> {
    let mut input = String::new();
    let read = reader.read_line(&mut input).context("Erreur de lecture")?;
    if read == 0 {
        return Ok(None);
    }
    Ok(Some(input.trim().to_string()))
}

fn prompt_line(msg: &str) -> Result<Option<String>> {
    print!("{}", msg);
    io::stdout().flush()?;
    read_input(&mut io::stdin().lock())
}

fn prompt(msg: &str) -> Result<String> {
    prompt_line(msg)?.context("Fin de l'entrée")
}

fn prompt_with_default(msg: &str, default: &str) -> Result<String> {
    let input = prompt(&format!("{} [{}] : ", msg, default))?;
    if input.is_empty() {
        Ok(default.to_string())
    } else {
        Ok(input)
    }
}

/// Liste de stratégies par identifiant ou par numéro (1 à 6).
fn parse_strategies(input: &str) -> Option<Vec<Strategy>> {
    let mut out = Vec::new();
    for token in input.split(&[',', ' '][..]).map(str::trim).filter(|t| !t.is_empty()) {
        let st = match token.parse::<usize>() {
            Ok(i) if (1..=Strategy::ALL.len()).contains(&i) => Strategy::ALL[i - 1],
            Ok(_) => return None,
            Err(_) => token.parse::<Strategy>().ok()?,
        };
        if !out.contains(&st) {
            out.push(st);
        }
    }
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

fn color_names() -> String {
    ColorBand::ALL
        .iter()
        .filter_map(|b| b.to_possible_value())
        .map(|v| v.get_name().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn parse_colors(input: &str) -> Option<Vec<ColorBand>> {
    input
        .split(&[',', ' '][..])
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| ColorBand::from_str(t, true).ok())
        .collect()
}

fn interactive_generate(session: &mut Session, config: &AppConfig) -> Result<()> {
    println!();
    for (i, st) in Strategy::ALL.iter().enumerate() {
        println!("  {}. {:<26} {}", i + 1, st.id(), st.label());
    }
    let strategies = loop {
        let input = prompt_with_default("Stratégies", "1")?;
        match parse_strategies(&input) {
            Some(s) => break s,
            None => println!("Stratégie inconnue. Réessayez."),
        }
    };

    let default_repeat = config.default_repeat.to_string();
    let repeat: usize = prompt_with_default("Grilles par stratégie (1-10)", &default_repeat)?
        .parse()
        .unwrap_or(config.default_repeat);

    let colors = if strategies.contains(&Strategy::ColorPreference) {
        loop {
            let input = prompt(&format!("Couleurs ({}) : ", color_names()))?;
            match parse_colors(&input) {
                Some(c) => break c,
                None => println!("Couleur inconnue. Réessayez."),
            }
        }
    } else {
        Vec::new()
    };

    let requests: Vec<GenerationRequest> = strategies
        .iter()
        .map(|&st| GenerationRequest::new(st, repeat).with_colors(&colors))
        .collect();

    if session.is_sample() {
        println!("(statistiques de démonstration)");
    }
    let mut rng = make_rng(None);
    match session.generate(&requests, &mut rng) {
        Ok(batches) => display_batches(batches),
        Err(e) => println!("⚠ {e}"),
    }
    Ok(())
}

fn interactive_export(session: &Session) -> Result<()> {
    if session.last_batches().is_empty() {
        println!("Générez d'abord des grilles.");
        return Ok(());
    }
    let path = PathBuf::from(prompt_with_default("Fichier CSV", "custom_numbers.csv")?);
    let file = std::fs::File::create(&path)
        .with_context(|| format!("Impossible de créer {:?}", path))?;
    session.export_csv(file)?;
    println!("Grilles exportées dans {}", path.display());
    Ok(())
}

pub fn run_interactive(conn: &Connection, config: &AppConfig) -> Result<()> {
    let mut session = open_session(conn)?;

    loop {
        display_menu();
        let Some(input) = prompt_line("Commande : ")? else {
            println!();
            return Ok(());
        };
        let Some(command) = parse_command(&input) else {
            println!("Commande inconnue : '{}'", input);
            continue;
        };

        let result = match command {
            InteractiveCommand::Generate => interactive_generate(&mut session, config),
            InteractiveCommand::Auto => {
                let mut controller = AutoRefreshController::new(conn, SystemClock)
                    .with_refresh_at(config.refresh)
                    .with_per_strategy(config.auto_per_strategy);
                controller.init().map(|_| {
                    if let Some(state) = controller.state() {
                        display_auto(state);
                    }
                })
            }
            InteractiveCommand::Export => interactive_export(&session),
            InteractiveCommand::Copy => {
                let lines = session.lines();
                if lines.is_empty() {
                    println!("Générez d'abord des grilles.");
                } else {
                    println!("{}", lines.join("\n"));
                }
                Ok(())
            }
            InteractiveCommand::Stats => load_settings(conn).map(|loaded| {
                display_stats(&loaded.settings, loaded.is_sample);
                // les statistiques ont pu être importées depuis le lancement
                session.set_table(loaded.table, loaded.is_sample);
            }),
            InteractiveCommand::Quit => {
                println!("Au revoir !");
                return Ok(());
            }
        };

        if let Err(e) = result {
            println!("Erreur : {e:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("1"), Some(InteractiveCommand::Generate));
        assert_eq!(parse_command(" Générer "), Some(InteractiveCommand::Generate));
        assert_eq!(parse_command("auto"), Some(InteractiveCommand::Auto));
        assert_eq!(parse_command("q"), Some(InteractiveCommand::Quit));
        assert_eq!(parse_command("???"), None);
    }

    #[test]
    fn test_read_input_end_of_input() {
        let mut reader = io::Cursor::new("  auto \n\nq");
        assert_eq!(read_input(&mut reader).unwrap().as_deref(), Some("auto"));
        assert_eq!(read_input(&mut reader).unwrap().as_deref(), Some(""));
        assert_eq!(read_input(&mut reader).unwrap().as_deref(), Some("q"));
        assert_eq!(read_input(&mut reader).unwrap(), None);

        let mut empty = io::Cursor::new("");
        assert_eq!(read_input(&mut empty).unwrap(), None);
    }

    #[test]
    fn test_color_names_parse_back() {
        assert_eq!(color_names(), "blue, green, orange, red, purple");
        assert_eq!(parse_colors(&color_names()).unwrap(), ColorBand::ALL.to_vec());
    }

    #[test]
    fn test_parse_strategies() {
        assert_eq!(
            parse_strategies("1, weightedRandom 1"),
            Some(vec![Strategy::PureRandom, Strategy::WeightedRandom])
        );
        assert_eq!(parse_strategies("6"), Some(vec![Strategy::ColorPreference]));
        assert_eq!(parse_strategies("7"), None);
        assert_eq!(parse_strategies("inconnue"), None);
        assert_eq!(parse_strategies(""), None);
    }

    #[test]
    fn test_parse_colors() {
        assert_eq!(parse_colors("blue, Red"), Some(vec![ColorBand::Blue, ColorBand::Red]));
        assert_eq!(parse_colors("jaune"), None);
        assert_eq!(parse_colors(""), Some(vec![]));
    }
}
