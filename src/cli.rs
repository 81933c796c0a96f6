use std::cmp;
use std::error::Error;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use atlasquiz_rs::intent::Summary;
use atlasquiz_rs::{Game, Intent, NameIndex, QuizConfig, RevealStyle, SessionState};
use atty::Stream;
use clap::{Parser, Subcommand};
use serde_json::json;
use termimad::{FmtText, MadSkin, terminal_size};
use tracing::debug;

const TERMINAL_WIDTH_PX: u32 = 1280;

#[derive(Parser, Debug)]
#[command(name = "atlasquiz-rs", about = "Name the countries of the world", version)]
pub struct Cli {
    /// Emit JSON instead of human-readable tables.
    #[arg(long, global = true)]
    json: bool,

    /// GeoJSON feature collection to play with instead of the bundled sample.
    #[arg(long, global = true, value_name = "PATH")]
    data: Option<PathBuf>,

    /// JSON file overriding gameplay settings.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve typed names (canonical or alias) to countries.
    Lookup {
        /// One or more names to resolve.
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// List countries whose name starts with the provided prefix.
    Suggest {
        /// Prefix to complete.
        prefix: String,
        /// Maximum number of suggestions to return.
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Show per-continent totals and name collisions in the dataset.
    Stats,
    /// Play a timed round in the terminal.
    Play,
    /// Serve the quiz over HTTP.
    #[cfg(feature = "web")]
    Serve {
        /// Address to bind.
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: std::net::SocketAddr,
        /// Public base URL used in rendered pages.
        #[arg(long)]
        base_url: Option<String>,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    pub fn is_serve(&self) -> bool {
        #[cfg(feature = "web")]
        if matches!(self.command, Command::Serve { .. }) {
            return true;
        }
        false
    }
}

pub fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = load_config(cli.config.as_ref())?;
    match cli.command {
        Command::Lookup { names } => handle_lookup(&*load_index(cli.data)?, names, cli.json),
        Command::Suggest { prefix, limit } => {
            let limit = limit.unwrap_or(config.suggestion_limit);
            handle_suggest(load_index(cli.data)?, &config, prefix, limit, cli.json)
        }
        Command::Stats => handle_stats(&*load_index(cli.data)?, cli.json),
        Command::Play => handle_play(load_index(cli.data)?, config, cli.json),
        #[cfg(feature = "web")]
        Command::Serve { addr, base_url } => handle_serve(cli.data, config, addr, base_url),
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<QuizConfig, Box<dyn Error>> {
    let Some(path) = path else {
        return Ok(QuizConfig::default());
    };
    let payload = std::fs::read_to_string(path)
        .map_err(|err| format!("Failed to read config {}: {err}", path.display()))?;
    let config = serde_json::from_str(&payload)
        .map_err(|err| format!("Invalid config {}: {err}", path.display()))?;
    Ok(config)
}

fn load_index(path: Option<PathBuf>) -> Result<Arc<NameIndex>, Box<dyn Error>> {
    match path {
        None => Ok(NameIndex::bundled()),
        Some(path) => {
            let index = NameIndex::from_path(&path)
                .map_err(|err| format!("Failed to load {}: {err}", path.display()))?;
            Ok(Arc::new(index))
        }
    }
}

fn handle_lookup(
    index: &NameIndex,
    names: Vec<String>,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let results: Vec<(String, Option<(String, String)>)> = names
        .into_iter()
        .map(|name| {
            let hit = index
                .resolve(&name)
                .map(|entity| (entity.name.clone(), entity.continent.clone()));
            (name, hit)
        })
        .collect();

    if as_json {
        let payload: Vec<_> = results
            .iter()
            .map(|(input, hit)| {
                json!({
                    "input": input,
                    "country": hit.as_ref().map(|(name, _)| name),
                    "continent": hit.as_ref().map(|(_, continent)| continent),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        print_lookup_table(&results);
    }
    Ok(())
}

fn handle_suggest(
    index: Arc<NameIndex>,
    config: &QuizConfig,
    prefix: String,
    limit: usize,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let limit = cmp::max(1, limit);
    let mut game = Game::with_index(config.clone(), index, TERMINAL_WIDTH_PX);
    let matches = game.suggest_with_limit(&prefix, limit);

    if as_json {
        let payload = json!({
            "prefix": prefix,
            "limit": limit,
            "results": matches,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        let rows: Vec<&str> = matches.iter().map(|item| item.name.as_str()).collect();
        print_name_list(&format!("Countries starting with \"{prefix}\":"), &rows);
    }
    Ok(())
}

fn handle_stats(index: &NameIndex, as_json: bool) -> Result<(), Box<dyn Error>> {
    if as_json {
        let payload = json!({
            "entities": index.len(),
            "keys": index.key_count(),
            "continents": index.continent_totals(),
            "collisions": index.collisions(),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    let rows: Vec<(String, usize)> = index
        .continent_totals()
        .iter()
        .map(|(label, total)| (label.clone(), *total))
        .collect();
    println!(
        "{} countries, {} accepted names",
        index.len(),
        index.key_count()
    );
    print_count_table(&rows);
    if !index.collisions().is_empty() {
        println!("\nName collisions:");
        for collision in index.collisions() {
            println!(
                "- \"{}\" kept for {}, ignored for {}",
                collision.key, collision.kept, collision.ignored
            );
        }
    }
    Ok(())
}

fn handle_play(
    index: Arc<NameIndex>,
    config: QuizConfig,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let end_delay = Duration::from_millis(config.end_delay_ms);
    let mut game = Game::with_index(config, index, TERMINAL_WIDTH_PX);
    let mut clock = Instant::now();
    emit(&game.start(), as_json)?;
    println!("Type country names. `?prefix` suggests, `!give-up` ends the round, `!quit` exits.");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    while game.state() == SessionState::Running {
        print!("[{}] {} > ", game.timer_text(), game.snapshot().label());
        io::stdout().flush()?;
        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        emit(&tick(&mut game, &mut clock), as_json)?;

        let input = line.trim();
        match input {
            "" => continue,
            "!quit" => return Ok(()),
            "!give-up" => emit(&game.abandon(), as_json)?,
            _ if input.starts_with('?') => {
                let names: Vec<String> = game
                    .suggest(&input[1..])
                    .into_iter()
                    .map(|item| {
                        if item.revealed {
                            format!("{} (found)", item.name)
                        } else {
                            item.name
                        }
                    })
                    .collect();
                let rows: Vec<&str> = names.iter().map(String::as_str).collect();
                print_name_list("Suggestions:", &rows);
            }
            _ => {
                let outcome = game.try_reveal(input);
                if !outcome.is_reveal() {
                    debug!(input, "no new match");
                    println!("No new match for \"{input}\".");
                }
                emit(&outcome.intents, as_json)?;
                if game.reveal_state().len() == game.snapshot().total {
                    std::thread::sleep(end_delay);
                    emit(&tick(&mut game, &mut clock), as_json)?;
                }
            }
        }
    }
    if game.state() == SessionState::Running {
        emit(&game.abandon(), as_json)?;
    }
    Ok(())
}

fn tick(game: &mut Game, clock: &mut Instant) -> Vec<Intent> {
    let now = Instant::now();
    let intents = game.advance(now.saturating_duration_since(*clock));
    *clock = now;
    intents
}

fn emit(intents: &[Intent], as_json: bool) -> Result<(), Box<dyn Error>> {
    for intent in intents {
        if as_json {
            println!("{}", serde_json::to_string(intent)?);
            continue;
        }
        match intent {
            Intent::Notice { message } => println!("{message}"),
            Intent::ShowEntity {
                name,
                style: RevealStyle::Revealed,
                ..
            } => println!("Found {name}!"),
            Intent::ShowSummary(summary) => render_summary(summary),
            _ => {}
        }
    }
    Ok(())
}

#[cfg(feature = "web")]
fn handle_serve(
    data: Option<PathBuf>,
    quiz: QuizConfig,
    addr: std::net::SocketAddr,
    base_url: Option<String>,
) -> Result<(), Box<dyn Error>> {
    use atlasquiz_rs::web::{DataSource, WebConfig, serve};

    let config = WebConfig {
        addr,
        data: data.map(DataSource::Path).unwrap_or_default(),
        base_url: base_url.unwrap_or_else(|| format!("http://{addr}")),
        quiz,
    };
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(serve(config))?;
    Ok(())
}

fn print_lookup_table(rows: &[(String, Option<(String, String)>)]) {
    if rows.is_empty() {
        println!("No names provided.");
        return;
    }
    let width = rows
        .iter()
        .map(|(input, _)| input.chars().count())
        .max()
        .unwrap_or(5)
        .max("INPUT".len());
    println!("{:<width$}  {}", "INPUT", "COUNTRY", width = width);
    println!("{:-<width$}  {}", "", "-------", width = width);
    for (input, hit) in rows {
        let value = hit
            .as_ref()
            .map(|(name, continent)| format!("{name} ({continent})"))
            .unwrap_or_else(|| "<no match>".to_string());
        println!("{:<width$}  {}", input, value, width = width);
    }
}

fn print_name_list(title: &str, rows: &[&str]) {
    if rows.is_empty() {
        println!("No matches.");
        return;
    }
    println!("{title}");
    for name in rows {
        println!("  {name}");
    }
}

fn print_count_table(rows: &[(String, usize)]) {
    let width = rows
        .iter()
        .map(|(label, _)| label.len())
        .max()
        .unwrap_or(9)
        .max("CONTINENT".len());
    println!("{:<width$}  {}", "CONTINENT", "COUNT", width = width);
    println!("{:-<width$}  {}", "", "-----", width = width);
    for (label, total) in rows {
        println!("{:<width$}  {}", label, total, width = width);
    }
}

fn summary_markdown(summary: &Summary) -> String {
    let mut text = format!(
        "## Round over\n\n* **Time:** {}\n* **Guessed:** {}\n* **Missed:** {}\n* **Accuracy:** {}%\n\n|Continent|Guessed|\n|-|-:|\n",
        summary.time, summary.guessed, summary.missed, summary.accuracy
    );
    for line in &summary.continents {
        text.push_str(&format!(
            "|{}|{}/{}|\n",
            line.label, line.guessed, line.total
        ));
    }
    text
}

fn stdout_is_tty() -> bool {
    atty::is(Stream::Stdout)
}

fn markdown_width() -> usize {
    let (width, _) = terminal_size();
    width.max(60) as usize
}

fn render_summary(summary: &Summary) {
    let body = summary_markdown(summary);
    println!();
    if stdout_is_tty() {
        let skin = MadSkin::default();
        let formatted = FmtText::from(&skin, &body, Some(markdown_width()));
        println!("{formatted}");
    } else {
        println!("{body}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atlasquiz_rs::intent::ContinentLine;

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["atlasquiz-rs", "lookup", "France", "--json"]).unwrap();
        assert!(cli.json);
        assert!(!cli.is_serve());
        assert!(matches!(cli.command, Command::Lookup { ref names } if names == &["France"]));
    }

    #[test]
    fn lookup_requires_a_name() {
        assert!(Cli::try_parse_from(["atlasquiz-rs", "lookup"]).is_err());
    }

    #[test]
    fn handlers_run_on_bundled_index() {
        let index = NameIndex::bundled();
        handle_lookup(&index, vec!["Deutschland".into(), "Atlantis".into()], true).unwrap();
        handle_lookup(&index, vec!["usa".into()], false).unwrap();
        handle_stats(&index, true).unwrap();
        handle_stats(&index, false).unwrap();
        handle_suggest(index, &QuizConfig::default(), "a".into(), 0, false).unwrap();
    }

    #[test]
    fn run_lookup_and_stats_with_default_data() {
        let cli = Cli::try_parse_from(["atlasquiz-rs", "--json", "lookup", "japan"]).unwrap();
        run(cli).unwrap();
        let cli = Cli::try_parse_from(["atlasquiz-rs", "stats"]).unwrap();
        run(cli).unwrap();
    }

    #[test]
    fn missing_files_are_reported() {
        let Err(err) = load_index(Some(PathBuf::from("/nonexistent/world.geojson"))) else {
            panic!("missing dataset should not load");
        };
        assert!(err.to_string().contains("/nonexistent/world.geojson"));
        let err = load_config(Some(&PathBuf::from("/nonexistent/quiz.json"))).unwrap_err();
        assert!(err.to_string().starts_with("Failed to read config"));
        assert_eq!(load_config(None).unwrap().suggestion_limit, 8);
    }

    #[test]
    fn summary_markdown_lists_continents() {
        let summary = Summary {
            time: "01:05".to_string(),
            guessed: 3,
            missed: 1,
            accuracy: 75,
            continents: vec![ContinentLine {
                label: "Europe".to_string(),
                guessed: 3,
                total: 4,
            }],
        };
        let text = summary_markdown(&summary);
        assert!(text.contains("**Time:** 01:05"));
        assert!(text.contains("**Accuracy:** 75%"));
        assert!(text.contains("|Europe|3/4|"));
    }
}
