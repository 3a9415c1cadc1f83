mod cli;

use std::fs::{self, File};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use pfs::{Config, DirScan, Disk};
use pfs_tool::BlockFile;
use typed_bytesize::ByteSizeIec;

use self::cli::{Cli, Command};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            if err.is_unformatted() {
                eprintln!("hint: run `pfs-tool format` to create a filesystem");
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> pfs::Result<()> {
    let config = Config {
        scan_window: cli.scan_window,
        dir_scan: if cli.stop_at_hole {
            DirScan::StopAtHole
        } else {
            DirScan::Full
        },
    };

    if let Command::Probe { paths } = &cli.command {
        probe(paths);
        return Ok(());
    }

    let Some(device) = cli.device else {
        Cli::command()
            .error(
                ErrorKind::MissingRequiredArgument,
                "--device is required for this command",
            )
            .exit()
    };

    match cli.command {
        Command::ListPartitions => {
            let mut disk = open(&device, false, config)?;
            let partitions = disk.partitions()?;
            if partitions.is_empty() {
                println!("No APA partitions found on {}.", device.display());
            }
            for (i, part) in partitions.iter().enumerate() {
                println!(
                    "[{i}] {part} ({})",
                    ByteSizeIec(part.sector_count * pfs::SECTOR_SIZE as u64)
                );
            }
        }
        Command::ListFiles { partition } => {
            let mut disk = open(&device, false, config)?;
            let part = disk.partition(partition)?;
            let files = disk.list_directory(&part)?;
            println!("Files in {} ({} found):", part.name, files.len());
            for file in files {
                let kind = if file.inode.is_dir() { "d" } else { "-" };
                println!(
                    "  {kind} {:>10}  inode {:>2}  {}",
                    ByteSizeIec(file.inode.size.into()).to_string(),
                    file.ino,
                    file.name
                );
            }
        }
        Command::Extract {
            partition,
            output,
            name,
        } => {
            let mut disk = open(&device, false, config)?;
            let part = disk.partition(partition)?;
            let files = match name {
                Some(name) => vec![disk
                    .find(&part, &name)?
                    .ok_or(pfs::Error::NotFound(name))?],
                None => disk.list_directory(&part)?,
            };

            fs::create_dir_all(&output)?;
            for file in files.iter().filter(|f| !f.inode.is_dir()) {
                let Some(path) = pfs_tool::output_path(&output, &file.name) else {
                    log::warn!("skipping {:?}: not a plain file name", file.name);
                    continue;
                };
                let mut out = io::BufWriter::new(File::create(&path)?);
                let written = disk.extract(&part, &file.inode, &mut out)?;
                out.flush()?;
                log::info!("extracted {} ({written} bytes) to {}", file.name, path.display());
            }
        }
        Command::Diagnose => {
            let mut disk = open(&device, false, config)?;
            println!("Diagnosing device: {}", device.display());
            println!("{}", disk.diagnose()?);
        }
        Command::Write {
            partition,
            file,
            dest,
        } => {
            let data = fs::read(&file)?;
            let dest = match dest {
                Some(dest) => dest,
                None => file_name(&file),
            };

            let mut disk = open(&device, true, config)?;
            let staged = disk.stage_write(partition, &data, &dest)?;
            println!(
                "Writing {} ({} bytes, {} sectors) as {}",
                file.display(),
                data.len(),
                staged.blocks().len(),
                staged.name()
            );
            let ino = disk.commit(staged)?;
            println!("File written, inode {ino}");
        }
        Command::Remove { partition, name } => {
            let mut disk = open(&device, true, config)?;
            let ino = disk.remove_file(partition, &name)?;
            println!("Removed {name} (inode {ino})");
        }
        Command::Format {
            name,
            sectors,
            create,
            yes,
        } => {
            let dev = match create {
                Some(mib) => BlockFile::create(&device, ByteSizeIec::mib(mib).0)?,
                None => BlockFile::open(&device, true)?,
            };
            let mut disk = Disk::with_config(dev, config);
            let total = match sectors {
                Some(sectors) => sectors,
                None => disk.num_sectors()?,
            };

            println!(
                "Formatting {}: {total} sectors ({})",
                device.display(),
                ByteSizeIec(total * pfs::SECTOR_SIZE as u64)
            );
            if !yes && !confirm()? {
                println!("Aborted.");
                return Ok(());
            }
            let part = disk.format(total, &name)?;
            println!("Created partition {part}");
        }
        Command::Probe { .. } => {}
    }

    Ok(())
}

fn open(device: &Path, writable: bool, config: Config) -> pfs::Result<Disk<BlockFile>> {
    Ok(Disk::with_config(BlockFile::open(device, writable)?, config))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn confirm() -> io::Result<bool> {
    print!("This erases the partition table. Type YES to continue: ");
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(answer.trim() == "YES")
}

fn probe(paths: &[PathBuf]) {
    for path in paths {
        let found = BlockFile::open(path, false).and_then(|dev| {
            let mut disk = Disk::new(dev);
            let sectors = disk.num_sectors()?;
            Ok((disk.has_table()?, sectors))
        });
        match found {
            Ok((true, sectors)) => println!(
                "{}: APA partition table ({})",
                path.display(),
                ByteSizeIec(sectors * pfs::SECTOR_SIZE as u64)
            ),
            Ok((false, _)) => println!("{}: no APA partition table", path.display()),
            Err(err) => println!("{}: {err}", path.display()),
        }
    }
}
