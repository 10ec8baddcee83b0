use super::{lock, print_environment, EXIT_SUCCESS};
use bootloader_core::{CoreError, Engine};
use bootloader_store::StateStore;

pub fn run(engine: &Engine, store: &StateStore, json: bool) -> Result<u8, CoreError> {
    let _lock = lock(store)?;
    let state = store.get()?;
    let state = engine.delete_lbs(&state)?;
    print_environment(&state, json)?;
    Ok(EXIT_SUCCESS)
}
