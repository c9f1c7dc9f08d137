pub use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "backup-filler")]
#[command(about = "Populate fileless Moodle course backups with file content")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: crate::Command,
}
