use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create an empty filesystem image
    Format {
        /// Image file, created or overwritten
        image: PathBuf,

        /// Image size in MiB
        #[arg(long, short, default_value_t = 16)]
        size: u64,

        /// Filesystem name
        #[arg(long, short, default_value = "efs")]
        name: String,

        /// Filesystem UUID as 32 hex digits, dashes allowed
        #[arg(long, short, value_parser = parse_uuid)]
        uuid: Option<[u8; 16]>,
    },

    /// Copy host files into the image
    Pack {
        /// Image file
        image: PathBuf,

        /// Host files to copy
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Target directory, created under the root when missing
        #[arg(long, short)]
        dir: Option<String>,
    },

    /// List the image contents
    Ls {
        /// Image file
        image: PathBuf,
    },
}

fn parse_uuid(s: &str) -> Result<[u8; 16], String> {
    let digits: Vec<u8> = s.bytes().filter(|&c| c != b'-').collect();
    if digits.len() != 32 {
        return Err(format!("expected 32 hex digits, got {}", digits.len()));
    }

    let mut uuid = [0; 16];
    for (byte, pair) in uuid.iter_mut().zip(digits.chunks(2)) {
        let pair = std::str::from_utf8(pair).map_err(|e| e.to_string())?;
        *byte = u8::from_str_radix(pair, 16).map_err(|e| e.to_string())?;
    }
    Ok(uuid)
}
