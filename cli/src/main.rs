mod config;
mod telemetry;

use std::fs::File;

use anyhow::Context;
use canvas::{CanvasManager, SnapshotOutcome};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use store::FileStore;
use structures::PlacementRecord;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Place a single pixel as the given user
    Place {
        x: i64,
        y: i64,
        color: String,
        user_id: String,
        username: String,
    },
    /// Show whether a user may place right now
    Status { user_id: String },
    /// Print canvas and history statistics
    Stats,
    /// Render the live canvas to an image
    Render { out_file: String },
    /// Re-render the canvas from the placement log
    Replay {
        out_file: String,
        #[clap(short, long, default_value = "0")]
        /// if 0, replay all history
        up_to_seconds: i64,
    },
    /// Capture the weekly snapshot (cron entry point; only runs on Sundays)
    Snapshot,
    /// Write the newest stored snapshot to a file
    Current { out_file: String },
    /// Export the placement log to CSV
    Export { out_file: String },
    /// Import placement records from a CSV export
    Import { in_file: String },
    /// Wipe every cell on the canvas
    Clear,
}

fn main() -> anyhow::Result<()> {
    telemetry::init();

    let cli = Cli::parse();
    let manager = CanvasManager::new(FileStore::new(config::data_dir()), config::canvas_config());
    manager.ensure_initialized()?;

    match cli.command {
        Commands::Place {
            x,
            y,
            color,
            user_id,
            username,
        } => {
            manager.place_pixel(x, y, &color, &user_id, &username)?;
            println!("Pixel placed successfully!");
        }
        Commands::Status { user_id } => {
            let status = manager.cooldown_status(&user_id)?;
            if status.can_place {
                println!("{} can place a pixel now", user_id);
            } else {
                println!(
                    "{} must wait {} more second(s) (~{} minute(s))",
                    user_id,
                    status.remaining_seconds.unwrap_or(0),
                    status.remaining_minutes.unwrap_or(0),
                );
            }
        }
        Commands::Stats => {
            let stats = manager.stats()?;
            let history = manager.history_stats()?;
            println!("Canvas: {}", stats.canvas_size);
            println!("Painted cells: {}", stats.total_pixels);
            println!("Users on canvas: {}", stats.unique_users);
            println!("Last updated: {}", stats.last_updated);
            println!("All-time placements: {}", history.total_placements);
            println!("All-time contributors: {}", history.unique_contributors);
        }
        Commands::Render { out_file } => {
            manager.render_image()?.save(&out_file)?;
            println!("Rendered canvas to {}", out_file);
        }
        Commands::Replay {
            out_file,
            up_to_seconds,
        } => {
            let cutoff = (up_to_seconds != 0).then_some(up_to_seconds);
            manager.replay_image(cutoff)?.save(&out_file)?;
            println!("Replayed history to {}", out_file);
        }
        Commands::Snapshot => match manager.capture_weekly_snapshot()? {
            SnapshotOutcome::Captured(meta) => {
                println!("Captured snapshot for week {}", meta.week);
            }
            SnapshotOutcome::Skipped { weekday } => {
                println!(
                    "Weekly snapshots only run on Sundays (today is {})",
                    weekday
                );
            }
        },
        Commands::Current { out_file } => match manager.current_snapshot()? {
            Some(snapshot) => {
                std::fs::write(&out_file, &snapshot.image)?;
                println!(
                    "Wrote snapshot {} ({}) to {}",
                    snapshot.week, snapshot.timestamp, out_file
                );
            }
            None => println!("No snapshot has been captured yet"),
        },
        Commands::Export { out_file } => {
            let records = manager.history()?;
            let mut writer = csv::Writer::from_writer(File::create(&out_file)?);
            writer.write_record(["timestamp", "user_id", "username", "color", "x", "y"])?;
            for record in &records {
                writer.write_record([
                    record.timestamp.to_rfc3339(),
                    record.user_id.clone(),
                    record.username.clone(),
                    record.color.clone(),
                    record.x.to_string(),
                    record.y.to_string(),
                ])?;
            }
            writer.flush()?;
            println!("Exported {} placement(s) to {}", records.len(), out_file);
        }
        Commands::Import { in_file } => {
            let mut reader = csv::Reader::from_reader(File::open(&in_file)?);
            let mut records = Vec::new();
            for result in reader.records() {
                records.push(parse_csv_record(&result?)?);
            }
            let imported = manager.import_placements(records)?;
            println!("Imported {} placement(s)", imported);
        }
        Commands::Clear => {
            manager.clear()?;
            println!("Canvas cleared");
        }
    }

    Ok(())
}

fn parse_csv_record(row: &csv::StringRecord) -> anyhow::Result<PlacementRecord> {
    let field = |i: usize, name: &str| {
        row.get(i)
            .map(str::to_string)
            .with_context(|| format!("missing {} column", name))
    };

    let timestamp: DateTime<Utc> = DateTime::parse_from_rfc3339(&field(0, "timestamp")?)
        .context("Could not parse timestamp")?
        .with_timezone(&Utc);

    Ok(PlacementRecord {
        timestamp,
        user_id: field(1, "user_id")?,
        username: field(2, "username")?,
        color: field(3, "color")?,
        x: field(4, "x")?
            .parse()
            .context("Could not parse x coordinate")?,
        y: field(5, "y")?
            .parse()
            .context("Could not parse y coordinate")?,
    })
}
