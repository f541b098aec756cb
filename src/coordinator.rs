use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::CrawlConfig;
use crate::crawl::{discover_makes, discover_models, process_make};
use crate::fetch::Fetch;
use crate::parser::makes::Make;
use crate::record::SpecRecord;

pub type MakeModels = BTreeMap<String, Vec<String>>;
pub type MakeRecords = BTreeMap<String, Vec<SpecRecord>>;

fn progress(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    pb
}

/// Await every task; returns the makes whose task panicked or was cancelled.
async fn reap(handles: Vec<(String, JoinHandle<()>)>) -> Vec<String> {
    let mut failed = Vec::new();
    for (make, handle) in handles {
        if let Err(e) = handle.await {
            warn!("Task for {} failed: {}", make, e);
            failed.push(make);
        }
    }
    failed
}

/// Phase 1: model discovery for every make, `discovery_workers` at a time.
///
/// Makes whose page fails or lists no models are left out of the result.
pub async fn discover_all_models<F: Fetch>(
    fetcher: Arc<F>,
    cfg: Arc<CrawlConfig>,
    makes: Vec<Make>,
) -> MakeModels {
    let semaphore = Arc::new(Semaphore::new(cfg.discovery_workers.max(1)));
    let (tx, mut rx) = mpsc::channel::<(String, Result<Vec<String>>)>(cfg.discovery_workers.max(1) * 2);
    let pb = progress(makes.len());
    let mut handles = Vec::with_capacity(makes.len());

    for make in makes {
        let fetcher = Arc::clone(&fetcher);
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();
        let name = make.name.clone();

        let handle = tokio::spawn(async move {
            let Ok(_permit) = sem.acquire().await else {
                return;
            };
            let result = discover_models(fetcher.as_ref(), &make).await;
            let _ = tx.send((make.name, result)).await;
        });
        handles.push((name, handle));
    }

    // rx closes once every task has dropped its sender
    drop(tx);

    let mut make_models = MakeModels::new();
    while let Some((make, result)) = rx.recv().await {
        match result {
            Ok(models) if models.is_empty() => warn!("No models found for {}", make),
            Ok(models) => {
                info!("Found {} models for {}", models.len(), make);
                make_models.insert(make, models);
            }
            Err(e) => warn!("Failed to process {}: {:#}", make, e),
        }
        pb.inc(1);
        tokio::time::sleep(cfg.discovery_delay).await;
    }

    pb.finish_and_clear();
    let failed = reap(handles).await;
    info!(
        "Model discovery done: {} makes with models, {} tasks failed",
        make_models.len(),
        failed.len()
    );
    make_models
}

/// Phase 2: spec collection, one task per make, `collection_workers` at a time.
///
/// Makes that yield no records are left out of the result.
pub async fn collect_all_specs<F: Fetch>(
    fetcher: Arc<F>,
    cfg: Arc<CrawlConfig>,
    make_models: MakeModels,
) -> MakeRecords {
    let semaphore = Arc::new(Semaphore::new(cfg.collection_workers.max(1)));
    let (tx, mut rx) = mpsc::channel::<(String, Vec<SpecRecord>)>(cfg.collection_workers.max(1) * 2);
    let pb = progress(make_models.len());
    let mut handles = Vec::with_capacity(make_models.len());

    for (make, models) in make_models {
        if models.is_empty() {
            pb.inc(1);
            continue;
        }
        let fetcher = Arc::clone(&fetcher);
        let cfg = Arc::clone(&cfg);
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();
        let name = make.clone();

        let handle = tokio::spawn(async move {
            let Ok(_permit) = sem.acquire().await else {
                return;
            };
            info!("Processing brand: {}", make);
            let records = process_make(fetcher.as_ref(), &cfg, &make, &models).await;
            let _ = tx.send((make, records)).await;
        });
        handles.push((name, handle));
    }

    drop(tx);

    let mut by_make = MakeRecords::new();
    while let Some((make, records)) = rx.recv().await {
        pb.set_message(make.clone());
        pb.inc(1);
        if !records.is_empty() {
            by_make.insert(make, records);
        }
    }

    pb.finish_and_clear();
    let failed = reap(handles).await;
    let rows: usize = by_make.values().map(Vec::len).sum();
    info!(
        "Spec collection done: {} rows across {} makes, {} tasks failed",
        rows,
        by_make.len(),
        failed.len()
    );
    by_make
}

/// Both phases back to back.
pub async fn crawl<F: Fetch>(fetcher: Arc<F>, cfg: Arc<CrawlConfig>) -> MakeRecords {
    let makes = discover_makes(fetcher.as_ref(), &cfg).await;
    let make_models = discover_all_models(Arc::clone(&fetcher), Arc::clone(&cfg), makes).await;
    collect_all_specs(fetcher, cfg, make_models).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawl::tests::{site, test_config, BASE};
    use crate::fetch::stub::StubFetcher;
    use crate::record::MAKE;

    /// The stub site, except one URL makes the fetching task panic.
    struct PanicsOn {
        site: StubFetcher,
        url: String,
    }

    impl Fetch for PanicsOn {
        async fn get(&self, url: &str) -> Result<String> {
            if url == self.url {
                panic!("unexpected markup at {}", url);
            }
            self.site.get(url).await
        }
    }

    #[tokio::test]
    async fn reap_names_failed_tasks() {
        let handles: Vec<(String, JoinHandle<()>)> = vec![
            ("Nissan".to_string(), tokio::spawn(async {})),
            ("Tesla".to_string(), tokio::spawn(async { panic!("boom") })),
        ];
        assert_eq!(reap(handles).await, vec!["Tesla"]);
    }

    #[tokio::test]
    async fn panicking_make_does_not_stall_the_crawl() {
        let fetcher = Arc::new(PanicsOn {
            site: site(),
            url: format!("{}/en/makes/tesla/", BASE),
        });
        let by_make = crawl(fetcher, Arc::new(test_config())).await;
        assert_eq!(by_make.keys().collect::<Vec<_>>(), vec!["Nissan"]);
        assert_eq!(by_make["Nissan"].len(), 2);
    }

    #[tokio::test]
    async fn phase_one_drops_empty_and_failing_makes() {
        let fetcher = Arc::new(site());
        let makes = discover_makes(fetcher.as_ref(), &test_config()).await;
        let mm = discover_all_models(Arc::clone(&fetcher), Arc::new(test_config()), makes).await;

        // Land Rover has no make page, Yugo lists nothing
        assert_eq!(mm.keys().collect::<Vec<_>>(), vec!["Nissan", "Tesla"]);
        assert_eq!(mm["Nissan"], vec!["350Z", "Leaf", "Rogue", "Sentra"]);
    }

    #[tokio::test]
    async fn full_crawl_over_stub_site() {
        let fetcher = Arc::new(site());
        let cfg = Arc::new(CrawlConfig {
            discovery_workers: 2,
            collection_workers: 1,
            ..test_config()
        });
        let by_make = crawl(Arc::clone(&fetcher), cfg).await;

        assert_eq!(by_make.keys().collect::<Vec<_>>(), vec!["Nissan"]);
        assert_eq!(by_make["Nissan"].len(), 2);
        assert!(by_make["Nissan"].iter().all(|r| r.text(MAKE) == Some("Nissan")));
        // Yugo never reaches phase 2: its make page is the only Yugo URL hit
        let yugo = format!("{}/en/makes/yugo/", BASE);
        let requests = fetcher.requests.lock().unwrap();
        assert!(requests.iter().any(|u| *u == yugo));
        assert!(requests.iter().filter(|u| u.starts_with(&yugo)).all(|u| *u == yugo));
    }

    #[tokio::test]
    async fn zero_workers_still_progress() {
        let cfg = Arc::new(CrawlConfig {
            discovery_workers: 0,
            collection_workers: 0,
            makes: vec!["tesla".into()],
            ..test_config()
        });
        let by_make = crawl(Arc::new(site()), cfg).await;
        assert!(by_make.is_empty());
    }
}
