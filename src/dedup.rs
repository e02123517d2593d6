use std::{
    collections::HashSet,
    panic::{
        self,
        AssertUnwindSafe,
    },
};

use futures::StreamExt;
use indicatif::{
    ProgressBar,
    ProgressStyle,
};

use crate::normalize::Mode;

pub const DEFAULT_WORKERS: usize = 4;

/// Number of URLs handed to a worker at once.
const BATCH_SIZE: usize = 1024;

#[derive(Clone, Debug)]
pub struct Dedup {
    mode: Mode,
    workers: usize,
    progress: bool,
}

impl Default for Dedup {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            workers: DEFAULT_WORKERS,
            progress: false,
        }
    }
}

impl Dedup {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    /// Sets the number of normalization workers. Values below 1 are clamped to 1.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Show a progress bar on stderr while keys are computed.
    pub fn progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Removes blank lines and duplicates from `urls`.
    ///
    /// Returns the trimmed URLs whose key was seen first, in input order.
    #[tracing::instrument(skip_all, fields(mode = ?self.mode, workers = self.workers))]
    pub async fn run<I, S>(&self, urls: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let urls = urls
            .into_iter()
            .filter_map(|line| {
                let line = line.as_ref().trim();
                (!line.is_empty()).then(|| line.to_owned())
            })
            .collect::<Vec<_>>();

        tracing::debug!(num_urls = urls.len(), "computing keys");

        let keys = self.compute_keys(&urls).await;

        let mut seen = HashSet::with_capacity(urls.len());
        let results = urls
            .into_iter()
            .zip(keys)
            .filter_map(|(url, key)| seen.insert(key).then_some(url))
            .collect::<Vec<_>>();

        tracing::info!(unique = results.len(), "deduplicated");
        results
    }

    /// Computes the key for every URL, indexed like `urls`.
    async fn compute_keys(&self, urls: &[String]) -> Vec<String> {
        let progress_bar = if self.progress {
            let progress_bar = ProgressBar::new(urls.len() as u64);
            if let Ok(style) = ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] {wide_bar:.cyan/blue} {pos}/{len} ({per_sec}, {eta})",
            ) {
                progress_bar.set_style(style.progress_chars("#>-"));
            }
            progress_bar
        }
        else {
            ProgressBar::hidden()
        };

        let mut keys: Vec<Option<String>> = vec![None; urls.len()];

        let mut results = futures::stream::iter(urls.chunks(BATCH_SIZE).enumerate())
            .map(|(i, chunk)| {
                let mode = self.mode;
                let offset = i * BATCH_SIZE;
                let batch = chunk
                    .iter()
                    .enumerate()
                    .map(|(j, url)| (offset + j, url.clone()))
                    .collect::<Vec<_>>();
                async move {
                    let num_urls = batch.len();
                    let task = tokio::task::spawn_blocking(move || {
                        normalize_batch(|url| mode.key(url), batch)
                    });
                    match task.await {
                        Ok(keyed) => keyed,
                        Err(error) => {
                            // keys of this batch stay unset and fall back to the url
                            tracing::warn!(num_urls, "normalization worker failed: {error}");
                            vec![]
                        }
                    }
                }
            })
            .buffer_unordered(self.workers);

        while let Some(keyed) = results.next().await {
            progress_bar.inc(keyed.len() as u64);
            for (index, key) in keyed {
                keys[index] = Some(key);
            }
        }

        progress_bar.finish_and_clear();

        fill_missing_keys(keys, urls)
    }
}

/// Uses the url itself as key wherever no key was computed. The urls are
/// already trimmed.
fn fill_missing_keys(keys: Vec<Option<String>>, urls: &[String]) -> Vec<String> {
    keys.into_iter()
        .zip(urls)
        .map(|(key, url)| key.unwrap_or_else(|| url.clone()))
        .collect()
}

fn normalize_batch<F>(key: F, batch: Vec<(usize, String)>) -> Vec<(usize, String)>
where
    F: Fn(&str) -> String,
{
    batch
        .into_iter()
        .map(|(index, url)| {
            let key = panic::catch_unwind(AssertUnwindSafe(|| key(&url))).unwrap_or_else(|_| {
                tracing::warn!(url = %url, "normalization panicked, using url as key");
                url.trim().to_owned()
            });
            (index, key)
        })
        .collect()
}
