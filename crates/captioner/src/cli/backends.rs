//! The `captioner backends` command.

use captioner_core::{Captioner, Config};

/// List registered backends in registration order.
pub fn execute(config: Config) -> anyhow::Result<()> {
    let default = config.generation.default_backend.clone();
    let captioner = Captioner::new(config)?;
    let registry = captioner.registry();

    if registry.is_empty() {
        eprintln!("No backends configured. Add [backends.<name>] entries to your config file.");
        return Ok(());
    }

    println!("{:<20} {:<10} {:<28} STATUS", "NAME", "TYPE", "MODEL");
    for name in registry.list() {
        let backend = registry.get(&name)?;
        let status = if backend.is_available() {
            "ready"
        } else {
            "missing credential"
        };
        let marker = if default.as_deref() == Some(name.as_str()) {
            " (default)"
        } else {
            ""
        };
        println!(
            "{:<20} {:<10} {:<28} {status}{marker}",
            name,
            backend.kind(),
            backend.model()
        );
    }

    Ok(())
}
