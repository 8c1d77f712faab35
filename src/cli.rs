// Command line interface module
// Handles parsing of command line arguments and stdin input

use anyhow::Result;
use clap::Parser;
use std::io::{self, Read};
use std::path::PathBuf;

/// imeji - A minimal single-image viewer for Wayland
#[derive(Parser, Debug)]
#[command(name = "imeji")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the image file (can also be provided via stdin pipe)
    #[arg(value_name = "IMAGE")]
    pub image_path: Option<PathBuf>,

    /// Disable GPU rendering and use CPU rendering only
    #[arg(long, default_value = "false")]
    pub cpu: bool,

    /// Directory holding the persisted window state
    #[arg(long, value_name = "DIR")]
    pub config_dir: Option<PathBuf>,
}

/// Parsed arguments with resolved image source
#[derive(Debug, Default)]
pub struct ParsedArgs {
    pub image_path: Option<PathBuf>,
    pub image_data: Option<Vec<u8>>,
    /// Use GPU rendering (default true, set to false with --cpu)
    pub use_gpu: bool,
    pub config_dir: Option<PathBuf>,
}

impl ParsedArgs {
    /// Combine parsed flags with whatever arrived on stdin. Piped bytes win
    /// over the path; an empty pipe counts as no data.
    pub fn resolve(args: Args, stdin_data: Option<Vec<u8>>) -> Self {
        let image_data = stdin_data.filter(|data| !data.is_empty());
        let image_path = if image_data.is_some() {
            None
        } else {
            args.image_path
        };

        Self {
            image_path,
            image_data,
            use_gpu: !args.cpu,
            config_dir: args.config_dir,
        }
    }
}

/// Check if stdin has data available (is a pipe)
fn stdin_has_data() -> bool {
    !atty::is(atty::Stream::Stdin)
}

/// Read image data from stdin
fn read_stdin() -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    io::stdin().read_to_end(&mut buffer)?;
    Ok(buffer)
}

/// Parse command line arguments and handle stdin input
pub fn parse_args() -> Result<ParsedArgs> {
    let args = Args::parse();

    let stdin_data = if stdin_has_data() {
        Some(read_stdin()?)
    } else {
        None
    };

    Ok(ParsedArgs::resolve(args, stdin_data))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn no_image_opens_empty_viewer() {
        let parsed = ParsedArgs::resolve(parse(&["imeji"]), None);
        assert!(parsed.image_path.is_none());
        assert!(parsed.image_data.is_none());
        assert!(parsed.use_gpu);
    }

    #[test]
    fn path_and_flags() {
        let parsed = ParsedArgs::resolve(
            parse(&["imeji", "--cpu", "--config-dir", "/tmp/cfg", "pic.jpg"]),
            None,
        );
        assert_eq!(parsed.image_path, Some(PathBuf::from("pic.jpg")));
        assert!(!parsed.use_gpu);
        assert_eq!(parsed.config_dir, Some(PathBuf::from("/tmp/cfg")));
    }

    #[test]
    fn piped_bytes_take_priority() {
        let parsed = ParsedArgs::resolve(parse(&["imeji", "pic.jpg"]), Some(vec![1, 2, 3]));
        assert_eq!(parsed.image_data, Some(vec![1, 2, 3]));
        assert!(parsed.image_path.is_none());
    }

    #[test]
    fn empty_pipe_is_ignored() {
        let parsed = ParsedArgs::resolve(parse(&["imeji", "pic.jpg"]), Some(Vec::new()));
        assert!(parsed.image_data.is_none());
        assert_eq!(parsed.image_path, Some(PathBuf::from("pic.jpg")));
    }

    #[test]
    fn unknown_flag_is_rejected() {
        assert!(Args::try_parse_from(["imeji", "--opacity", "0.5"]).is_err());
    }
}
