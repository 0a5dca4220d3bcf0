use clap::Parser;
use std::path::PathBuf;

use tarcap::humanize::ByteSize;

#[derive(Parser, Debug)]
#[command(name = "tarcap")]
#[command(about = "Build a tar archive under a hard size limit", long_about = None)]
pub struct Cli {
    /// List of files and directories to archive, one per line. Reads from
    /// STDIN by default.
    #[arg(short = 'i', long, value_name = "PATH")]
    pub filelist_in: Option<PathBuf>,

    /// File to which to write the paths that did not fit within the size
    /// limit or failed. Defaults to stderr.
    #[arg(short = 'l', long, value_name = "PATH")]
    pub filelist_out: Option<PathBuf>,

    /// Tar file output. Outputs to STDOUT by default.
    #[arg(short = 'o', long, value_name = "PATH")]
    pub tar_out: Option<PathBuf>,

    /// Size of the destination storage, e.g. "4.7G" or "700MiB".
    #[arg(short = 's', long, value_name = "SIZE")]
    pub size: Option<ByteSize>,

    /// Halt when the write queue underruns and hand the remaining paths
    /// back via the rejection list.
    #[arg(short = 'u', long)]
    pub prevent_underrun: bool,

    /// Read and write NUL (\0) delimited file lists.
    #[arg(short = '0', long)]
    pub null_delimiter: bool,

    /// Configuration file (defaults to config/tarcap.toml).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}
