use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use indicatif::{HumanBytes, HumanDuration, MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

pub struct Progress {
    enabled: bool,
    start: Instant,

    // UI
    mp: Option<MultiProgress>,
    stage: ProgressBar,
    requests: ProgressBar,

    // Counters
    http_in_flight: AtomicU64,
    http_done: AtomicU64,
    http_failed: AtomicU64,
    http_bytes: AtomicU64,
    last_http_label: Mutex<String>,
}

impl Progress {
    pub fn new(enabled: bool) -> Arc<Self> {
        let start = Instant::now();

        if !enabled {
            return Arc::new(Self {
                enabled: false,
                start,
                mp: None,
                stage: ProgressBar::hidden(),
                requests: ProgressBar::hidden(),
                http_in_flight: AtomicU64::new(0),
                http_done: AtomicU64::new(0),
                http_failed: AtomicU64::new(0),
                http_bytes: AtomicU64::new(0),
                last_http_label: Mutex::new(String::new()),
            });
        }

        let mp = MultiProgress::with_draw_target(ProgressDrawTarget::stderr());

        let stage = mp.add(ProgressBar::new_spinner());
        if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}  [{elapsed_precise}]") {
            stage.set_style(style);
        }
        stage.enable_steady_tick(Duration::from_millis(80));
        stage.set_message("starting");

        let requests = mp.add(ProgressBar::new_spinner());
        if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
            requests.set_style(style);
        }
        requests.enable_steady_tick(Duration::from_millis(120));

        Arc::new(Self {
            enabled: true,
            start,
            mp: Some(mp),
            stage,
            requests,
            http_in_flight: AtomicU64::new(0),
            http_done: AtomicU64::new(0),
            http_failed: AtomicU64::new(0),
            http_bytes: AtomicU64::new(0),
            last_http_label: Mutex::new(String::new()),
        })
    }

    pub fn set_stage(&self, msg: impl Into<String>) {
        let msg = msg.into();
        tracing::debug!(stage = %msg, "stage");
        if !self.enabled {
            return;
        }
        self.stage.set_message(msg);
    }

    pub fn http_start(&self, label: &str) {
        self.http_in_flight.fetch_add(1, Ordering::Relaxed);
        if self.enabled {
            self.set_last(label.to_string());
            self.refresh();
        }
    }

    pub fn http_throttled(&self, label: &str, status: u16, wait: Duration) {
        self.http_in_flight.fetch_sub(1, Ordering::Relaxed);
        if !self.enabled {
            return;
        }
        self.set_last(format!("{label} throttled {status} wait {}ms", wait.as_millis()));
        self.refresh();
    }

    pub fn http_ok(&self, label: &str, bytes: usize) {
        self.http_in_flight.fetch_sub(1, Ordering::Relaxed);
        self.http_done.fetch_add(1, Ordering::Relaxed);
        self.http_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
        if self.enabled {
            self.set_last(format!("{label} ok {bytes}B"));
            self.refresh();
        }
    }

    pub fn http_err(&self, label: &str) {
        self.http_in_flight.fetch_sub(1, Ordering::Relaxed);
        self.http_failed.fetch_add(1, Ordering::Relaxed);
        if self.enabled {
            self.set_last(format!("{label} failed"));
            self.refresh();
        }
    }

    pub fn finish(&self) {
        if !self.enabled {
            return;
        }
        self.refresh();
        self.stage.finish_with_message("done");
        self.requests.finish_and_clear();
        if let Some(mp) = &self.mp {
            let _ = mp.println(format!("Done in {}", HumanDuration(self.start.elapsed())));
        }
    }

    fn set_last(&self, label: String) {
        if let Ok(mut last) = self.last_http_label.lock() {
            *last = label;
        }
    }

    fn refresh(&self) {
        let in_flight = self.http_in_flight.load(Ordering::Relaxed);
        let done = self.http_done.load(Ordering::Relaxed);
        let failed = self.http_failed.load(Ordering::Relaxed);
        let bytes = self.http_bytes.load(Ordering::Relaxed);
        let last = self
            .last_http_label
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default();
        self.requests.set_message(format!(
            "HTTP: done {done} | failed {failed} | in-flight {in_flight} | {bytes} | {last}",
            bytes = HumanBytes(bytes),
        ));
    }
}
