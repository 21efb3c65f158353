// SPDX-License-Identifier: MIT

use std::fs::File;
use std::io::{self, BufWriter, Write};

use anyhow::Context;
use sdrbus::prelude::*;
use sdrfs::prelude::*;
use sdrio::prelude::*;

use crate::cli::Cli;
use crate::utils;

/// Ticks per `run` slice; the progress bar is sized between slices.
const SLICE_TICKS: u64 = 1 << 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub bytes: u64,
    pub reader: ReaderStatus,
    /// `None` with `--direct`.
    pub host: Option<HostStatus>,
}

pub fn run(cli: &Cli) -> anyhow::Result<Summary> {
    let config = ReaderConfig::new(&cli.file)
        .with_context(|| format!("Bad file name {:?}", cli.file))?
        .with_boot_search_limit(cli.boot_search);

    let mut image = File::open(&cli.image)
        .with_context(|| format!("Failed to open image {}", cli.image.display()))?;
    let size = image.metadata()?.len();
    crate::log_info!("Image {} ({})", cli.image.display(), utils::pretty_bytes(size));

    let mut out: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    let show_progress = cli.output.is_some() && utils::log_level() != utils::LogLevel::Quiet;

    let io = StdBlockIO::new(&mut image);
    let summary = if cli.direct {
        crate::log_verbose!("Direct sector reads, no bus model");
        let mut reader = FileReader::new(BlockSectorSource::new(io), config);
        let result = stream(&mut reader, &mut out, cli.max_ticks, show_progress);
        let status = reader.status();
        Summary {
            bytes: finish(cli, result, &status)?,
            reader: status,
            host: None,
        }
    } else {
        let host_config = cli.host_config();
        crate::log_verbose!(
            "Simulated {:?} card, {} at {} MHz",
            SimClass::from(cli.card),
            host_config.width,
            25u32 << host_config.clock as u32
        );
        let card = SimCard::new(io, SimProfile::new(cli.card.into()));
        let mut reader = FileReader::new(SdHost::new(card, host_config), config);
        let result = stream(&mut reader, &mut out, cli.max_ticks, show_progress);
        let status = reader.status();
        let host = reader.source().status();
        crate::log_verbose!(
            "Card {} ({:?}), {} reads, {} retried, {} ticks",
            host.class,
            host.state,
            host.reads,
            host.read_retries,
            host.ticks
        );
        Summary {
            bytes: finish(cli, result, &status)?,
            reader: status,
            host: Some(host),
        }
    };

    out.flush().context("Failed to flush output")?;
    Ok(summary)
}

fn finish(cli: &Cli, result: anyhow::Result<u64>, status: &ReaderStatus) -> anyhow::Result<u64> {
    crate::log_verbose!(
        "Walker {} ({}), filesystem {}, {} sectors",
        status.state,
        status.outcome,
        status.fs_type,
        status.sectors
    );
    result.with_context(|| format!("Failed to read {:?} from {}", cli.file, cli.image.display()))
}

/// Drives `reader` to completion, writing valid bytes to `out`.
fn stream<S: SectorSource>(
    reader: &mut FileReader<S>,
    out: &mut dyn Write,
    max_ticks: u64,
    show_progress: bool,
) -> anyhow::Result<u64> {
    let bar = utils::byte_progress(0, "reading", show_progress);
    let mut write_err: Option<io::Error> = None;
    let mut spent = 0u64;

    let result = loop {
        let budget = SLICE_TICKS.min(max_ticks - spent);
        let result = reader.run(
            |b| {
                if write_err.is_none() {
                    if let Err(e) = out.write_all(&[b]) {
                        write_err = Some(e);
                    }
                }
                bar.inc(1);
            },
            budget,
        );
        spent += budget;

        match result {
            Err(FsReadError::Stalled { .. }) if spent < max_ticks => {
                let status = reader.status();
                if status.found && bar.length() != Some(status.file_size as u64) {
                    bar.set_length(status.file_size as u64);
                }
            }
            Err(FsReadError::Stalled { .. }) => break Err(FsReadError::Stalled { ticks: spent }),
            other => break other,
        }
    };
    bar.finish_and_clear();

    if let Some(e) = write_err {
        return Err(e).context("Failed to write output");
    }
    Ok(result?)
}

pub fn print_summary(cli: &Cli, summary: &Summary) {
    let target = cli
        .output
        .as_ref()
        .map_or_else(|| "stdout".to_string(), |p| p.display().to_string());
    crate::log_info!(
        "{} -> {} ({})",
        cli.file,
        target,
        utils::pretty_bytes(summary.bytes)
    );
    crate::log_info!(
        "Filesystem {}, {} sectors read",
        summary.reader.fs_type,
        utils::sep_u64(summary.reader.sectors)
    );
    if let Some(host) = summary.host {
        crate::log_info!(
            "Card {}, rca {:#06x}, {} ticks, {} read retries",
            host.class,
            host.rca,
            utils::sep_u64(host.ticks),
            host.read_retries
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Cursor;
    use std::path::Path;

    fn write_image(dir: &Path) -> std::path::PathBuf {
        let mut disk = Cursor::new(vec![0u8; 16 * 1024 * 1024]);
        let options = fatfs::FormatVolumeOptions::new().fat_type(fatfs::FatType::Fat16);
        fatfs::format_volume(&mut disk, options).unwrap();
        {
            let fs = fatfs::FileSystem::new(&mut disk, fatfs::FsOptions::new()).unwrap();
            let mut f = fs.root_dir().create_file("Notes for the card.txt").unwrap();
            f.write_all(b"line one\nline two\n").unwrap();
            drop(f);
            fs.unmount().unwrap();
        }
        let path = dir.join("card.img");
        std::fs::write(&path, disk.into_inner()).unwrap();
        path
    }

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("sdrcat").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_cat_through_card() {
        let dir = tempfile::tempdir().unwrap();
        let img = write_image(dir.path());
        let out = dir.path().join("notes.txt");
        let cli = cli(&[
            img.to_str().unwrap(),
            "NOTES FOR THE CARD.TXT",
            "-o",
            out.to_str().unwrap(),
            "-q",
        ]);

        let summary = run(&cli).unwrap();
        assert_eq!(summary.bytes, 18);
        assert_eq!(summary.reader.fs_type, FsType::Fat16);
        assert_eq!(summary.host.unwrap().class, CardClass::V2HC);
        assert_eq!(std::fs::read(&out).unwrap(), b"line one\nline two\n");
    }

    #[test]
    fn test_cat_direct() {
        let dir = tempfile::tempdir().unwrap();
        let img = write_image(dir.path());
        let out = dir.path().join("notes.txt");
        let cli = cli(&[
            img.to_str().unwrap(),
            "notes for the card.txt",
            "--direct",
            "-o",
            out.to_str().unwrap(),
            "-q",
        ]);

        let summary = run(&cli).unwrap();
        assert!(summary.host.is_none());
        assert_eq!(std::fs::read(&out).unwrap(), b"line one\nline two\n");
    }

    #[test]
    fn test_cat_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let img = write_image(dir.path());
        let out = dir.path().join("none.txt");
        let cli = cli(&[img.to_str().unwrap(), "absent.txt", "--direct", "-o", out.to_str().unwrap(), "-q"]);

        let err = run(&cli).unwrap_err();
        assert_eq!(err.root_cause().to_string(), "File not found");
    }

    #[test]
    fn test_cat_tick_budget() {
        let dir = tempfile::tempdir().unwrap();
        let img = write_image(dir.path());
        let out = dir.path().join("slow.txt");
        let cli = cli(&[img.to_str().unwrap(), "notes for the card.txt", "--max-ticks", "1000", "-o", out.to_str().unwrap(), "-q"]);

        let err = run(&cli).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FsReadError>(),
            Some(FsReadError::Stalled { ticks: 1000 })
        ));
    }

    #[test]
    fn test_missing_image() {
        let cli = cli(&["/nonexistent/card.img", "a.txt", "-q"]);
        assert!(run(&cli).is_err());
    }
}
