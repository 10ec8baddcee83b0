use super::{lock, EXIT_SUCCESS};
use bootloader_core::{Config, CoreError, Engine, UpOptions};
use bootloader_store::StateStore;

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

    let state = engine.plan(&state, opts)?;
    let root = store.layout().root();
    if json {
        let payload = serde_json::json!({
            "env_id": state.env_id,
            "state_dir": root,
            "status": "planned",
        });
        println!("{}", super::json_pretty(&payload)?);
    } else {
        println!("planned environment {}", state.env_id);
        println!("edit the generated files under {} and run `bootloader up`", root.display());
    }
    Ok(EXIT_SUCCESS)
}
