use super::{json_pretty, EXIT_SUCCESS};
use bootloader_core::CoreError;
use bootloader_store::StateStore;

pub fn run(store: &StateStore, json: bool) -> Result<u8, CoreError> {
    let state = store.get()?;
    if state.env_id.is_empty() {
        return Err(CoreError::EnvNotFound);
    }
    if json {
        println!(
            "{}",
            json_pretty(&serde_json::json!({ "env_id": state.env_id }))?
        );
    } else {
        println!("{}", state.env_id);
    }
    Ok(EXIT_SUCCESS)
}
