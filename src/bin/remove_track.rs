// Removes a track (and its audio file) from the jukebox library after a
// typed confirmation.

use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use clap::Parser;

use jukebox::config::Config;
use jukebox::library::track::normalize_id;
use jukebox::library::Library;
use jukebox::logging;

#[derive(Parser, Debug)]
#[command(name = "remove-track", version, about = "Remove a track from the jukebox library")]
struct Args {
    /// Track ID to remove
    track_id: String,

    /// Skip the confirmation prompt
    #[arg(long)]
    yes: bool,
}

fn confirm() -> io::Result<bool> {
    print!("Type 'yes' to confirm: ");
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("yes"))
}

fn main() -> anyhow::Result<ExitCode> {
    logging::init_stderr();
    let args = Args::parse();

    let config = Config::from_env();
    let mut library = Library::from_config(&config);

    let track_id = normalize_id(&args.track_id);
    let (Some(name), Some(artist)) = (library.get_name(&track_id), library.get_artist(&track_id))
    else {
        println!("Track {} not found", track_id);
        return Ok(ExitCode::FAILURE);
    };

    println!("Are you sure you want to remove track {}?", track_id);
    println!("Title: {}", name);
    println!("Artist: {}", artist);

    if !args.yes && !confirm()? {
        println!("Operation cancelled");
        return Ok(ExitCode::SUCCESS);
    }

    if library.remove_track(&track_id) {
        println!("Track removed successfully!");
        Ok(ExitCode::SUCCESS)
    } else {
        println!("Failed to remove track");
        Ok(ExitCode::FAILURE)
    }
}
