pub mod create_lbs;
pub mod delete_lbs;
pub mod destroy;
pub mod env_id;
pub mod lbs;
pub mod plan;
pub mod up;
pub mod version;

use bootloader_core::{Config, CoreError, EnvPhase, StateLock, UpOptions};
use bootloader_schema::State;
use bootloader_store::StateStore;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_VALIDATION_ERROR: u8 = 2;
pub const EXIT_STORE_ERROR: u8 = 3;

pub fn exit_code(err: &CoreError) -> u8 {
    if err.is_persistence() || matches!(err, CoreError::Locked(_)) {
        EXIT_STORE_ERROR
    } else if err.is_validation() {
        EXIT_VALIDATION_ERROR
    } else {
        EXIT_FAILURE
    }
}

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, CoreError> {
    Ok(serde_json::to_string_pretty(value)?)
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
    pb.set_style(style);
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn finish(pb: &ProgressBar, msg: String) {
    if let Ok(style) = ProgressStyle::with_template("{msg}") {
        pb.set_style(style);
    }
    pb.finish_with_message(msg);
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    finish(pb, format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    finish(pb, format!("✗ {msg}"));
}

pub fn colorize_phase(phase: EnvPhase) -> String {
    use console::Style;
    let label = phase.as_str();
    match phase {
        EnvPhase::DirectorInstalled => Style::new().green().apply_to(label).to_string(),
        EnvPhase::NetworkingOnly => Style::new().cyan().apply_to(label).to_string(),
        EnvPhase::Absent => Style::new().dim().apply_to(label).to_string(),
    }
}

/// Take the state directory lock and make sure its working directories exist.
pub fn lock(store: &StateStore) -> Result<StateLock, CoreError> {
    let lock = StateLock::acquire(&store.layout().lock_file())?;
    store.layout().initialize()?;
    Ok(lock)
}

pub fn up_options(
    config: &Config,
    no_director: bool,
    ops_file: Option<&Path>,
) -> Result<UpOptions, CoreError> {
    let ops_file = match ops_file {
        Some(path) => Some(std::fs::read_to_string(path).map_err(|source| {
            CoreError::ReadInput {
                what: "ops file",
                path: path.to_path_buf(),
                source,
            }
        })?),
        None => None,
    };
    Ok(UpOptions {
        iaas: config.iaas,
        no_director,
        ops_file,
    })
}

/// Summary printed after every lifecycle command.
pub fn print_environment(state: &State, json: bool) -> Result<(), CoreError> {
    let phase = EnvPhase::of(state);
    if json {
        let payload = serde_json::json!({
            "env_id": state.env_id,
            "iaas": state.iaas,
            "phase": phase.as_str(),
            "no_director": state.no_director,
            "director_address": state.bosh.director_address,
            "lb_type": state.lb.lb_type,
        });
        println!("{}", json_pretty(&payload)?);
        return Ok(());
    }

    println!("env id:   {}", state.env_id);
    if let Some(iaas) = state.iaas {
        println!("iaas:     {iaas}");
    }
    println!("phase:    {}", colorize_phase(phase));
    if !state.bosh.director_address.is_empty() {
        println!("director: {}", state.bosh.director_address);
    }
    if state.lb.is_attached() {
        println!("lb:       {}", state.lb.lb_type);
    }
    Ok(())
}
