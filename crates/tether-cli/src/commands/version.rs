use miette::Result;
use tether_core::version::{version_string, SCHEMA_VERSION, VERSION};

pub fn run(json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::json!({
                "ok": true,
                "version": VERSION,
                "schema_version": SCHEMA_VERSION
            })
        );
    } else {
        println!("{}", version_string());
    }
    Ok(())
}
