// Adds a track to the jukebox library from the command line.
// The running jukebox picks the change up through its file watcher.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use jukebox::config::Config;
use jukebox::library::Library;
use jukebox::logging;

#[derive(Parser, Debug)]
#[command(name = "add-track", version, about = "Add a track to the jukebox library")]
struct Args {
    /// Track ID (padded to 2 digits)
    track_id: String,

    /// Track name
    name: String,

    /// Artist name
    artist: String,

    /// Initial rating (0-5)
    #[arg(long, default_value_t = 0)]
    rating: u8,

    /// Initial play count
    #[arg(long, default_value_t = 0)]
    play_count: u32,

    /// Audio file to copy into the tracks directory (MP3 or WAV)
    #[arg(long)]
    file: Option<PathBuf>,
}

fn main() -> anyhow::Result<ExitCode> {
    logging::init_stderr();
    let args = Args::parse();

    let config = Config::from_env();
    config.ensure_dirs()?;
    let mut library = Library::from_config(&config);

    let added = match &args.file {
        Some(file) => library.add_track_with_audio(
            &args.track_id,
            &args.name,
            &args.artist,
            args.rating,
            args.play_count,
            file,
        ),
        None => library.add_track(
            &args.track_id,
            &args.name,
            &args.artist,
            args.rating,
            args.play_count,
        ),
    };

    if added {
        println!("Track added successfully!");
        Ok(ExitCode::SUCCESS)
    } else {
        println!("Failed to add track");
        Ok(ExitCode::FAILURE)
    }
}
