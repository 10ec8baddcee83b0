use super::{lock, print_environment, EXIT_SUCCESS};
use bootloader_core::{CoreError, CreateLbsOptions, Engine};
use bootloader_store::StateStore;
use console::style;

pub fn run(
    engine: &Engine,
    store: &StateStore,
    opts: &CreateLbsOptions,
    json: bool,
) -> Result<u8, CoreError> {
    let _lock = lock(store)?;
    let state = store.get()?;

    if !json {
        eprintln!(
            "{}",
            style(format!("attaching {} load balancer", opts.lb_type)).bold()
        );
    }
    let state = engine.create_lbs(&state, opts)?;
    print_environment(&state, json)?;
    Ok(EXIT_SUCCESS)
}
