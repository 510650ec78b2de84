use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod error;
mod image;
mod pretty;
mod progress;
mod sha1sum;
mod transfer;

use error::{Error, Result};

#[derive(Parser, Debug)]
#[command(version)]
/// Build a raw image from an Android transfer list and its new data
struct Arg {
    /// Path of the transfer list, e.g. system.transfer.list
    transfer_list: PathBuf,
    /// Path of the new data, e.g. system.new.dat
    data: PathBuf,
    /// Path of the image to write, created if missing, never truncated
    image: PathBuf,

    #[arg(short = 't', long)]
    /// Print erase and new ranges as a table before building
    table: bool,

    #[arg(short = 'y', long)]
    /// Print the parsed transfer list as YAML and exit without building
    yaml: bool,

    #[arg(short = 's', long)]
    /// Print SHA-1 of the image after building
    sha1sum: bool,

    #[arg(short = 'q', long)]
    /// Do not draw progress bars
    no_progress: bool,
}

fn setup_tracing() {
    let env_filter = EnvFilter::builder().parse_lossy(
        std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or("info".to_string()));
    tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter)
        .init();
}

fn check_input(path: &Path) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        error!("Input file '{}' does not exist", path.display());
        Err(Error::MissingInput { path: path.into() })
    }
}

fn run(arg: &Arg) -> Result<()> {
    check_input(&arg.transfer_list)?;
    check_input(&arg.data)?;
    let transfer_list = transfer::TransferList::try_read(&arg.transfer_list)?;
    if arg.yaml {
        print!("{}", transfer_list.to_yaml()?);
        return Ok(())
    }
    info!("{}", transfer_list);
    if arg.table {
        transfer_list.print_table_stdout()?
    }
    let report = image::ImageBuilder::new(
        &transfer_list.erase_set, &transfer_list.new_set)
        .with_progress(! arg.no_progress)
        .try_build_files(&arg.data, &arg.image)?;
    info!("Built '{}': {}", arg.image.display(), report);
    if arg.sha1sum {
        let size = arg.image.metadata()?.len();
        let bar = progress::byte_progress_bar(
            ! arg.no_progress, size, "Hashing")?;
        let sha1sum = sha1sum::Sha1sum::try_from_file(&arg.image, &bar)?;
        println!("{}  {} ({})", sha1sum, arg.image.display(),
            pretty::HumanSize(size));
    }
    Ok(())
}

fn main() -> Result<()> {
    let arg = Arg::parse();
    setup_tracing();
    run(&arg)
}

#[cfg(test)]
mod tests {
    use std::fs::{read, write};

    use tempfile::TempDir;

    use super::*;
    use crate::image::BLOCK_SIZE;

    const BS: usize = BLOCK_SIZE as usize;

    fn blocks(fills: &[u8]) -> Vec<u8> {
        fills.iter().flat_map(|fill| [*fill; BS]).collect()
    }

    fn arg_in(dir: &TempDir, list: &str, data: &[u8], image: &str) -> Arg {
        let transfer_list = dir.path().join("system.transfer.list");
        let data_path = dir.path().join("system.new.dat");
        write(&transfer_list, list).unwrap();
        write(&data_path, data).unwrap();
        Arg {
            transfer_list,
            data: data_path,
            image: dir.path().join(image),
            table: false,
            yaml: false,
            sha1sum: false,
            no_progress: true,
        }
    }

    #[test]
    fn builds_example_image() {
        let dir = TempDir::new().unwrap();
        let mut arg = arg_in(&dir, "1\n4\nerase 2,0,1\nnew 4,1,2,3,4\n",
            &blocks(&[0xd0, 0xd1]), "system.img");
        arg.table = true;
        run(&arg).unwrap();
        assert_eq!(read(&arg.image).unwrap(), blocks(&[0, 0xd0, 0, 0xd1]));
    }

    #[test]
    fn tiling_new_ranges_reorder_data() {
        let dir = TempDir::new().unwrap();
        let arg = arg_in(&dir, "4\n5\nnew 8,3,5,0,1,1,3,5,5\n",
            &blocks(&[1, 2, 3, 4, 5]), "system.img");
        run(&arg).unwrap();
        assert_eq!(read(&arg.image).unwrap(), blocks(&[3, 4, 5, 1, 2]));
    }

    #[test]
    fn table_with_huge_range_fails_cleanly() {
        let dir = TempDir::new().unwrap();
        let mut arg = arg_in(&dir,
            &format!("1\n0\nerase 2,{},{}\n", u64::MAX / 2, u64::MAX),
            &[], "system.img");
        arg.table = true;
        assert!(matches!(run(&arg), Err(Error::BuildError(
            image::BuildError::RangeOverflow { .. }))));
    }

    #[test]
    fn rebuilding_is_identical() {
        let dir = TempDir::new().unwrap();
        let list = "4\n6\nerase 4,0,2,4,6\nzero 2,2,3\nnew 6,5,6,0,1,2,4\n";
        let data = blocks(&[1, 2, 3, 4]);
        let mut arg = arg_in(&dir, list, &data, "first.img");
        run(&arg).unwrap();
        arg.image = dir.path().join("second.img");
        arg.sha1sum = true;
        run(&arg).unwrap();
        let first = read(dir.path().join("first.img")).unwrap();
        assert_eq!(first, read(&arg.image).unwrap());
        assert_eq!(first, blocks(&[2, 0, 3, 4, 0, 1]));
    }

    #[test]
    fn existing_image_is_not_truncated() {
        let dir = TempDir::new().unwrap();
        let arg = arg_in(&dir, "1\n3\nerase 2,1,2\nnew 0\n", &[], "system.img");
        write(&arg.image, blocks(&[7, 7, 7])).unwrap();
        run(&arg).unwrap();
        assert_eq!(read(&arg.image).unwrap(), blocks(&[7, 0, 7]));
    }

    #[test]
    fn missing_input_aborts_before_output() {
        let dir = TempDir::new().unwrap();
        let mut arg = arg_in(&dir, "1\n1\nnew 2,0,1\n", &blocks(&[1]), "system.img");
        arg.data = dir.path().join("missing.new.dat");
        match run(&arg) {
            Err(Error::MissingInput { path }) => assert_eq!(path, arg.data),
            other => panic!("Expected missing input, got {:?}", other),
        }
        assert!(! arg.image.exists());
    }

    #[test]
    fn malformed_list_aborts_before_output() {
        let dir = TempDir::new().unwrap();
        let arg = arg_in(&dir, "1\n1\nnew 3,0,1\n", &blocks(&[1]), "system.img");
        assert!(matches!(run(&arg), Err(Error::TransferListError(_))));
        assert!(! arg.image.exists());
    }

    #[test]
    fn short_data_fails() {
        let dir = TempDir::new().unwrap();
        let arg = arg_in(&dir, "1\n2\nnew 2,0,2\n", &blocks(&[1]), "system.img");
        assert!(matches!(run(&arg), Err(Error::BuildError(
            image::BuildError::ShortRead { .. }))));
    }

    #[test]
    fn yaml_dump_skips_build() {
        let dir = TempDir::new().unwrap();
        let mut arg = arg_in(&dir, "1\n1\nnew 2,0,1\n", &blocks(&[1]), "system.img");
        arg.yaml = true;
        run(&arg).unwrap();
        assert!(! arg.image.exists());
    }

    #[test]
    fn cli_takes_three_paths() {
        let arg = Arg::try_parse_from(
            ["sdatimg", "-t", "a.list", "b.dat", "c.img"]).unwrap();
        assert!(arg.table);
        assert_eq!(arg.image, PathBuf::from("c.img"));
        assert!(Arg::try_parse_from(["sdatimg", "a.list", "b.dat"]).is_err());
        assert!(Arg::try_parse_from(
            ["sdatimg", "a.list", "b.dat", "c.img", "d"]).is_err());
    }
}
