use std::{
    io::IsTerminal,
    path::PathBuf,
};

use futures::TryStreamExt;
use structopt::StructOpt;
use tokio::{
    fs::File,
    io::{
        AsyncBufReadExt,
        AsyncRead,
        AsyncWrite,
        AsyncWriteExt,
        BufReader,
        BufWriter,
    },
};
use tokio_stream::wrappers::LinesStream;

use crate::{
    dedup::Dedup,
    normalize::{
        Mode,
        DEFAULT_COLLAPSE_DEPTH,
    },
    utils::filter_has_query,
    Error,
};

const BANNER: &str = r"
               _                  __
  __  ______  (_)___ ___  _______/ /____
 / / / / __ \/ / __ `/ / / / ___/ / ___/
/ /_/ / / / / / /_/ / /_/ / /  / (__  )
\__,_/_/ /_/_/\__, /\__,_/_/  /_/____/
                /_/
        uniqurls - URL deduplicator
";

/// Deduplicate URLs efficiently with parallel processing.
#[derive(Debug, StructOpt)]
#[structopt(name = "uniqurls")]
pub struct Args {
    /// File containing list of URLs. Reads from stdin if not given.
    #[structopt(short, long)]
    pub list: Option<PathBuf>,

    /// Save results to file instead of stdout.
    #[structopt(short, long)]
    pub output: Option<PathBuf>,

    /// Number of parallel workers. Values below 1 are treated as 1.
    #[structopt(short, long, default_value = "4", allow_hyphen_values = true)]
    pub workers: i64,

    /// Only show URLs that have query parameters.
    #[structopt(short = "p", long)]
    pub only_params: bool,

    #[structopt(flatten)]
    pub mode: ModeArgs,
}

impl Args {
    pub async fn run(self) -> Result<(), Error> {
        // stderr, so piping stdout stays clean
        if std::io::stdout().is_terminal() {
            eprintln!("{BANNER}");
        }

        let urls = match &self.list {
            Some(path) => {
                tracing::debug!(list = %path.display(), "reading urls");
                read_lines(File::open(path).await?).await?
            }
            None => read_lines(tokio::io::stdin()).await?,
        };

        let results = self
            .dedup()
            .progress(std::io::stderr().is_terminal())
            .run(&urls)
            .await;

        let results = if self.only_params {
            filter_has_query(results).collect()
        }
        else {
            results
        };

        match &self.output {
            Some(path) => {
                tracing::debug!(output = %path.display(), "writing urls");
                let mut writer = BufWriter::new(File::create(path).await?);
                write_lines(&mut writer, &results).await?;
            }
            None => {
                let mut writer = BufWriter::new(tokio::io::stdout());
                write_lines(&mut writer, &results).await?;
            }
        }

        Ok(())
    }

    /// Worker count for the engine. Anything below 1 becomes 1.
    pub fn workers(&self) -> usize {
        match usize::try_from(self.workers) {
            Ok(workers) if workers > 0 => workers,
            _ => {
                tracing::debug!(workers = self.workers, "worker count below 1, using 1");
                1
            }
        }
    }

    pub fn dedup(&self) -> Dedup {
        Dedup::new(self.mode.build()).workers(self.workers())
    }
}

#[derive(Debug, StructOpt)]
pub struct ModeArgs {
    /// Deduplicate similar endpoints & deep paths.
    #[structopt(short, long)]
    pub similar: bool,

    /// Number of path segments to keep when collapsing similar paths.
    #[structopt(long, default_value = "2")]
    pub depth: usize,

    /// Don't collapse deep paths in similar mode.
    #[structopt(long)]
    pub no_collapse: bool,

    /// Compare query parameter values too, not only their names.
    #[structopt(long)]
    pub keep_values: bool,
}

impl ModeArgs {
    pub fn build(&self) -> Mode {
        if self.similar {
            let depth = if self.depth == 0 {
                tracing::warn!("depth must be at least 1, using 1");
                1
            }
            else {
                self.depth
            };
            if depth != DEFAULT_COLLAPSE_DEPTH {
                tracing::debug!(depth, "collapsing to custom depth");
            }
            Mode::Similar {
                collapse_depth: (!self.no_collapse).then_some(depth),
            }
        }
        else {
            Mode::Exact {
                ignore_values: !self.keep_values,
            }
        }
    }
}

/// Reads all lines from `reader`. Blank lines are kept, the engine drops them.
async fn read_lines(reader: impl AsyncRead + Unpin) -> Result<Vec<String>, Error> {
    let lines = LinesStream::new(BufReader::new(reader).lines())
        .try_collect::<Vec<_>>()
        .await?;
    tracing::debug!(num_lines = lines.len(), "read input");
    Ok(lines)
}

async fn write_lines<W>(writer: &mut W, urls: &[String]) -> Result<(), Error>
where
    W: AsyncWrite + Unpin,
{
    for url in urls {
        writer.write_all(url.trim().as_bytes()).await?;
        writer.write_all(b"\n").await?;
    }
    writer.flush().await?;
    Ok(())
}
