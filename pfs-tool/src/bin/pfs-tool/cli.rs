use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pfs::ScanWindow;

#[derive(Parser)]
#[command(version, about = "Read, write and format APA partitioned PFS disks")]
pub struct Cli {
    /// Raw disk device or image file
    #[arg(long, short, global = true)]
    pub device: Option<PathBuf>,

    /// Sectors scanned per block allocation, or `full`
    #[arg(long, global = true, default_value_t = ScanWindow::default())]
    pub scan_window: ScanWindow,

    /// Stop reading a directory block at its first empty entry
    #[arg(long, global = true)]
    pub stop_at_hole: bool,

    /// Log decoding steps
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List the APA partitions
    ListPartitions,

    /// List the files of a partition's root directory
    ListFiles {
        #[arg(long, short, default_value_t = 0)]
        partition: usize,
    },

    /// Copy files out of a partition
    Extract {
        #[arg(long, short, default_value_t = 0)]
        partition: usize,

        /// Output directory
        #[arg(long, short, default_value = ".")]
        output: PathBuf,

        /// Extract only this file
        #[arg(long, short)]
        name: Option<String>,
    },

    /// Show what the device's first sectors contain
    Diagnose,

    /// Write a host file of at most 3072 bytes (six sectors) into a
    /// partition's root directory
    Write {
        #[arg(long, short, default_value_t = 0)]
        partition: usize,

        /// Host file to copy
        #[arg(long, short)]
        file: PathBuf,

        /// Name on the disk, defaults to the host file name
        #[arg(long, short = 'o')]
        dest: Option<String>,
    },

    /// Delete a file from a partition's root directory
    Remove {
        #[arg(long, short, default_value_t = 0)]
        partition: usize,

        name: String,
    },

    /// Write a new partition table with one empty PFS partition
    Format {
        /// Partition name
        #[arg(long, short, default_value = "__mbr")]
        name: String,

        /// Sectors to format, defaults to the whole device
        #[arg(long)]
        sectors: Option<u64>,

        /// Create the device as an image file of this many MiB first
        #[arg(long, value_name = "MIB")]
        create: Option<u64>,

        /// Do not ask for confirmation
        #[arg(long, short)]
        yes: bool,
    },

    /// Check which of the given devices carry an APA partition table
    Probe {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}
