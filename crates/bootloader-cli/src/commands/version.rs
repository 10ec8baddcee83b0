use super::{json_pretty, spin_fail, spin_ok, spinner, EXIT_SUCCESS};
use bootloader_core::{CoreError, Engine};

pub fn run(engine: &Engine, json: bool) -> Result<u8, CoreError> {
    let version = env!("CARGO_PKG_VERSION");
    let pb = if json {
        None
    } else {
        Some(spinner("checking tool versions..."))
    };

    let tools = match engine.versions() {
        Ok(v) => {
            if let Some(ref pb) = pb {
                spin_ok(pb, "tool versions");
            }
            v
        }
        Err(e) => {
            if let Some(ref pb) = pb {
                spin_fail(pb, "could not determine tool versions");
            }
            return Err(e);
        }
    };

    if json {
        let payload = serde_json::json!({
            "bootloader": version,
            "terraform": tools.terraform,
            "bosh": tools.bosh,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("bootloader {version}");
        println!("terraform  {}", tools.terraform);
        println!("bosh       {}", tools.bosh);
    }
    Ok(EXIT_SUCCESS)
}
