// Main entry point for the terminal jukebox
// This is where the application starts

use anyhow::Context;
use tracing::info;

use jukebox::config::Config;
use jukebox::logging;
use jukebox::ui::JukeboxApp;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Suppress ALSA error messages that pollute TUI
    // These are non-critical audio buffer warnings from the audio system
    std::env::set_var("ALSA_PCM_NO_MMAP", "1");

    let config = Config::from_env();
    config
        .ensure_dirs()
        .with_context(|| format!("creating data directory {:?}", config.data_dir))?;

    // The TUI owns the terminal, so logs go to a file
    logging::init_file(&config.log_file())
        .with_context(|| format!("opening log file {:?}", config.log_file()))?;
    info!("Starting jukebox with data in {:?}", config.data_dir);

    let mut app = JukeboxApp::new(config);

    // Run the TUI event loop
    app.run().await?;

    Ok(())
}
