use crate::config::{Config, StoreBackend, expand_home};
use crate::engine::streak::StreakRule;
use crate::models::{MAX_ENERGY, MIN_ENERGY};
use crate::store::{self, Query, Table};
use anyhow::{Context, Result};
use dialoguer::{Input, Password, Select, theme::ColorfulTheme};
use url::Url;

pub fn run_onboarding() -> Result<Config> {
    println!("──────────────────────────────────────────");
    println!("  Welcome to TaskPulse onboarding.");
    println!("──────────────────────────────────────────");

    let theme = ColorfulTheme::default();
    let defaults = Config::load().unwrap_or_default();
    let mut config = defaults.clone();

    println!("\n[1/5] Storage backend");
    let backends = [StoreBackend::Remote, StoreBackend::Sqlite];
    let labels = [
        "remote (hosted tables over HTTP)",
        "sqlite (local file, works offline)",
    ];
    let selected = Select::with_theme(&theme)
        .with_prompt("  Where should tasks be stored?")
        .default(backends.iter().position(|b| *b == defaults.store).unwrap_or(0))
        .items(&labels)
        .interact()
        .context("Failed to select storage backend")?;
    config.store = backends.get(selected).copied().unwrap_or(StoreBackend::Remote);

    println!("\n[2/5] Connection");
    match config.store {
        StoreBackend::Remote => {
            let base_url: String = Input::with_theme(&theme)
                .with_prompt("  Hosted table API base URL")
                .default(defaults.remote_base_url.clone())
                .validate_with(|input: &String| -> std::result::Result<(), &str> {
                    Url::parse(input.trim())
                        .map(|_| ())
                        .map_err(|_| "Enter a full URL, e.g. https://project.example.com/rest/v1")
                })
                .interact_text()
                .context("Failed to read base URL")?;
            config.remote_base_url = base_url.trim().trim_end_matches('/').to_string();

            let api_key = Password::with_theme(&theme)
                .with_prompt("  API key (leave empty to use TASKPULSE_API_KEY)")
                .allow_empty_password(true)
                .interact()
                .context("Failed to read API key")?;
            if !api_key.trim().is_empty() {
                config.remote_api_key = Some(api_key.trim().to_string());
            }
        }
        StoreBackend::Sqlite => {
            let db_path: String = Input::with_theme(&theme)
                .with_prompt("  SQLite database file")
                .default(defaults.db_path.display().to_string())
                .interact_text()
                .context("Failed to read database path")?;
            config.db_path = expand_home(db_path.trim());
        }
    }
    println!("  ✓ Using {} store", config.store.as_str());

    println!("\n[3/5] User");
    let user_id: String = Input::with_theme(&theme)
        .with_prompt("  User id that owns your records")
        .default(defaults.user_id.clone())
        .validate_with(|input: &String| -> std::result::Result<(), &str> {
            if input.trim().is_empty() {
                Err("User id cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()
        .context("Failed to read user id")?;
    config.user_id = user_id.trim().to_string();

    println!("\n[4/5] Defaults");
    let default_energy: u8 = Input::with_theme(&theme)
        .with_prompt(format!(
            "  Typical energy level ({MIN_ENERGY}-{MAX_ENERGY}) for the dashboard"
        ))
        .default(defaults.default_energy)
        .validate_with(|level: &u8| -> std::result::Result<(), &str> {
            if (MIN_ENERGY..=MAX_ENERGY).contains(level) {
                Ok(())
            } else {
                Err("Energy level must be between 1 and 5")
            }
        })
        .interact_text()
        .context("Failed to read default energy")?;
    config.default_energy = default_energy;

    let rules = [StreakRule::Calendar, StreakRule::DayOfMonth];
    let rule_labels = [
        "calendar (consecutive calendar days)",
        "day-of-month (legacy day-number comparison)",
    ];
    let selected_rule = Select::with_theme(&theme)
        .with_prompt("  How should streak days be counted?")
        .default(rules.iter().position(|r| *r == defaults.streak_rule).unwrap_or(0))
        .items(&rule_labels)
        .interact()
        .context("Failed to select streak rule")?;
    config.streak_rule = rules.get(selected_rule).copied().unwrap_or_default();

    println!("\n[5/5] Local API");
    let api_port: u16 = Input::with_theme(&theme)
        .with_prompt("  Port for `taskpulse serve`")
        .default(defaults.api_port)
        .interact_text()
        .context("Failed to read API port")?;
    config.api_port = api_port;

    config.save()?;
    println!("  ✓ Saved {}", Config::config_path()?.display());

    let probe = Query::new().eq("userId", config.user_id.as_str());
    match store::open(&config).and_then(|store| store.select(Table::Tasks, &probe)) {
        Ok(rows) => println!("  ✓ Store reachable ({} task(s) for {})", rows.len(), config.user_id),
        Err(error) => println!("  ! Store check failed: {error}. Run `taskpulse doctor` later."),
    }

    println!("\n──────────────────────────────────────────");
    println!("  Onboarding complete!");
    println!("  Try `taskpulse task add \"First task\"` or `taskpulse serve`.");
    println!("──────────────────────────────────────────");

    Ok(config)
}
