use super::{json_pretty, EXIT_SUCCESS};
use bootloader_core::{CoreError, Engine};
use bootloader_store::StateStore;

pub fn run(engine: &Engine, store: &StateStore, json: bool) -> Result<u8, CoreError> {
    let state = store.get()?;
    let report = engine.lbs(&state)?;

    if json {
        println!("{}", json_pretty(&report)?);
        return Ok(EXIT_SUCCESS);
    }

    if !state.lb.is_attached() {
        println!("no load balancer attached");
        return Ok(EXIT_SUCCESS);
    }
    println!("{} load balancer", report.lb_type);
    if !report.domain.is_empty() {
        println!("  domain: {}", report.domain);
    }
    for (name, value) in &report.outputs {
        match value.as_str() {
            Some(s) => println!("  {name}: {s}"),
            None => println!("  {name}: {value}"),
        }
    }
    Ok(EXIT_SUCCESS)
}
