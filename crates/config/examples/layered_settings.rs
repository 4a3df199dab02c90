//! Layer environment overrides on top of defaults, then expand variables.
//!
//! Run with: `cargo run --example layered_settings`

use strata_config::prelude::*;

fn main() -> ConfigResult<()> {
    let defaults = Source::from_text(
        Ini::new(),
        "[Global]\n\
         Environment=prod\n\
         \n\
         [Server]\n\
         host=localhost\n\
         port=8080\n\
         endpoint=http://${host}:${port}/\n",
    )?;

    let overrides = Source::from_text(Ini::new(), "[Server]\nhost=config.example.com\n")?;

    let merged = Source::in_memory();
    merged.merge(&[defaults, overrides])?;
    merged.expand_key_values();

    let server = merged.section("Server")?;
    let port: u16 = server.get_or("port", 80)?;
    println!("environment : {}", merged.section("Global")?.get::<String>("Environment")?);
    println!("port        : {port}");
    println!("endpoint    : {}", server.get::<String>("endpoint")?);

    Ok(())
}
