use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;

const STOP_CHECK: Duration = Duration::from_millis(50);

/// Periodic background trigger. `on_tick` returning false ends the thread.
pub struct Ticker {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    pub fn spawn<F>(interval: Duration, mut on_tick: F) -> Self
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = thread::spawn(move || loop {
            let mut waited = Duration::ZERO;
            while waited < interval {
                if flag.load(Ordering::Relaxed) {
                    return;
                }
                let step = STOP_CHECK.min(interval - waited);
                thread::sleep(step);
                waited += step;
            }
            if flag.load(Ordering::Relaxed) || !on_tick() {
                return;
            }
        });
        Self {
            stop,
            handle: Some(handle),
        }
    }

    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop();
    }
}
