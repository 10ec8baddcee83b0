use super::{json_pretty, lock, EXIT_FAILURE, EXIT_SUCCESS};
use bootloader_core::{CoreError, Engine};
use bootloader_store::StateStore;
use dialoguer::Confirm;

pub fn run(
    engine: &Engine,
    store: &StateStore,
    no_confirm: bool,
    json: bool,
) -> Result<u8, CoreError> {
    let _lock = lock(store)?;
    let state = store.get()?;
    if state.env_id.is_empty() || state.is_empty() {
        return Err(CoreError::EnvNotFound);
    }

    if !no_confirm {
        if json || !console::user_attended() {
            return Err(CoreError::Validation(
                "destroy needs --no-confirm when not run from a terminal".to_owned(),
            ));
        }
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Destroy environment {} and everything it runs?",
                state.env_id
            ))
            .default(false)
            .interact()
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        if !confirmed {
            eprintln!("destroy cancelled");
            return Ok(EXIT_FAILURE);
        }
    }

    let residual = engine.destroy(&state)?;
    if json {
        let payload = serde_json::json!({
            "env_id": residual.env_id,
            "status": "destroyed",
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("destroyed environment {}", residual.env_id);
    }
    Ok(EXIT_SUCCESS)
}
