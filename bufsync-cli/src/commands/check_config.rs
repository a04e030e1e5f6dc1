//! Validate and print the configuration.

use std::path::Path;

use bufsync_daemon::Config;

/// Run the check-config command.
///
/// The configuration was already loaded and validated by `main`; this only
/// reports what is in effect.
pub fn run(config: &Config, path: Option<&Path>) {
    match path {
        Some(path) => println!("Configuration: {} (valid)", path.display()),
        None => println!("Configuration: built-in defaults"),
    }
    println!();
    println!("[processor]");
    println!(
        "  max_file_size_bytes = {}",
        config.processor.max_file_size_bytes
    );
    println!(
        "  supported_extensions = {}",
        config.processor.supported_extensions.join(", ")
    );
    println!(
        "  response_ttl_secs = {}",
        config.processor.response_ttl_secs
    );
    println!(
        "  max_edit_distance = {}",
        config.processor.max_edit_distance
    );
    println!("[cache]");
    println!("  capacity = {}", config.cache.capacity);
    println!("[session]");
    println!("  event_timeout_ms = {}", config.session.event_timeout_ms);
    println!(
        "  elide_text_on_diff = {}",
        config.session.elide_text_on_diff
    );
    println!("[logging]");
    println!("  filter = {}", config.logging.filter);
}
