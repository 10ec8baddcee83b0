use super::{lock, print_environment, EXIT_SUCCESS};
use bootloader_core::{Config, CoreError, Engine, UpOptions};
use bootloader_store::StateStore;
use console::style;

pub fn run(
    engine: &Engine,
    store: &StateStore,
    config: &Config,
    opts: &UpOptions,
    json: bool,
) -> Result<u8, CoreError> {
    let _lock = lock(store)?;
    let mut state = store.get()?;
    config.apply_credentials(&mut state)?;

    if !json {
        eprintln!("{}", style("bringing environment up").bold());
    }
    let state = engine.up(&state, opts)?;
    print_environment(&state, json)?;
    Ok(EXIT_SUCCESS)
}
