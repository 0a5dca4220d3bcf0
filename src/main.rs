mod cli;

use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cli::Cli;
use tarcap::config::Config;
use tarcap::filelist::{PathReader, RejectSink};
use tarcap::session::TarSession;

fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    // Logs must stay off stdout; the tar stream may be going there.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from_path(path.clone())?,
        None => Config::load()?,
    };
    if let Some(size) = cli.size {
        config.archive.size_limit = Some(size);
    }
    if cli.prevent_underrun {
        config.feed.halt_on_underrun = true;
    }
    let delimiter = if cli.null_delimiter { b'\0' } else { b'\n' };

    let sink: Box<dyn Write + Send> = match &cli.tar_out {
        Some(path) => Box::new(File::create(path)?),
        None => Box::new(io::stdout()),
    };
    let reader: Box<dyn BufRead> = match &cli.filelist_in {
        Some(path) => Box::new(BufReader::new(File::open(path)?)),
        None => Box::new(BufReader::new(io::stdin())),
    };
    let mut rejects = match cli.filelist_out.clone() {
        Some(path) => RejectSink::file(path),
        None => RejectSink::stderr(),
    };

    let session = TarSession::spawn(sink, &config.archive);
    let paths = PathReader::new(reader, delimiter).filter_map(|record| match record {
        Ok(path) => Some(path),
        Err(e) => {
            warn!(error = %e, "failed to read filelist record");
            None
        }
    });

    for rejection in session.add_paths(paths, config.feed.clone()) {
        rejects.write_path(&rejection.path, delimiter)?;
    }
    session.stop();
    rejects.finish()?;

    let snapshot = session.metrics().snapshot();
    info!(
        predicted_size = session.size(),
        admitted = snapshot.paths_admitted,
        rejected = snapshot.paths_rejected,
        "filelist drained"
    );

    let written = session.close()?;
    info!(bytes = written, "archive written");
    Ok(())
}
