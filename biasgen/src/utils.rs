use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use hytra::TrAdder;
use indicatif::{ProgressBar, ProgressFinish, ProgressStyle};

const REFRESH: Duration = Duration::from_millis(50);

/// Run `f` and, if `config` allows it and `f` is still running after `config.progress_min_time`,
/// show a bar over `total` units. `f` reports progress through the counter it receives.
pub(crate) fn with_progress<F, T>(f: F, total: u64, msg: &'static str, config: &crate::Config) -> T
where
    F: FnOnce(&TrAdder<u64>) -> T + Send,
    T: Send,
{
    let done: TrAdder<u64> = TrAdder::new();
    let finished = AtomicBool::new(false);
    thread::scope(|s| {
        let bar = config.show_progress.then(|| {
            let (done, finished) = (&done, &finished);
            s.spawn(move || progress_bar(done, finished, total, msg, config.progress_min_time))
        });
        let res = f(&done);
        finished.store(true, Ordering::Release);
        // unpark leaves a token even if the bar thread is not parked yet
        if let Some(handle) = bar {
            handle.thread().unpark();
        }
        res
    })
}

fn progress_bar(
    done: &TrAdder<u64>,
    finished: &AtomicBool,
    total: u64,
    msg: &'static str,
    min_time: Duration,
) {
    let start = Instant::now();
    while let Some(left) = min_time.checked_sub(start.elapsed()) {
        thread::park_timeout(left);
        if finished.load(Ordering::Acquire) {
            return;
        }
    }
    tracing::trace!(msg, total, "showing progress bar");
    let style = ProgressStyle::default_bar()
        .template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} (ETA {eta})")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    let pb = ProgressBar::new(total)
        .with_style(style)
        .with_finish(ProgressFinish::AndClear)
        .with_message(msg)
        .with_position(done.get());
    while !finished.load(Ordering::Acquire) {
        pb.set_position(done.get());
        thread::park_timeout(REFRESH);
    }
    pb.finish_and_clear();
}
