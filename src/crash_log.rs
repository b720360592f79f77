//! Crash logging infrastructure.
//!
//! A breadcrumb ring buffer records recent pipeline events (shape swaps,
//! mode toggles, swapchain recreation); a panic hook persists them together
//! with a backtrace so GPU-side failures can be reconstructed post-mortem.

use std::backtrace::Backtrace;
use std::collections::VecDeque;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

struct Breadcrumb {
    elapsed: Duration,
    message: String,
}

static START: OnceLock<Instant> = OnceLock::new();
static BREADCRUMBS: OnceLock<Mutex<VecDeque<Breadcrumb>>> = OnceLock::new();
static GPU_NAME: OnceLock<String> = OnceLock::new();

const MAX_BREADCRUMBS: usize = 32;

/// Initialize globals. Call once at the very start of `main()`.
pub fn init() {
    START.get_or_init(Instant::now);
    BREADCRUMBS.get_or_init(|| Mutex::new(VecDeque::with_capacity(MAX_BREADCRUMBS)));
}

/// Record a breadcrumb describing a pipeline event.
pub fn breadcrumb(message: String) {
    let Some(start) = START.get() else { return };
    let Some(crumbs) = BREADCRUMBS.get() else {
        return;
    };
    if let Ok(mut guard) = crumbs.lock() {
        if guard.len() >= MAX_BREADCRUMBS {
            guard.pop_front();
        }
        guard.push_back(Breadcrumb {
            elapsed: start.elapsed(),
            message,
        });
    }
}

/// Record the selected Vulkan device for inclusion in crash reports.
pub fn set_vulkan_device(name: &str) {
    let _ = GPU_NAME.set(name.to_string());
}

fn format_breadcrumbs() -> String {
    let Some(crumbs) = BREADCRUMBS.get() else {
        return String::new();
    };
    let Ok(guard) = crumbs.lock() else {
        return String::new();
    };
    let mut out = String::new();
    for b in guard.iter() {
        out.push_str(&format!("[{:8.3}s] {}\n", b.elapsed.as_secs_f64(), b.message));
    }
    out
}

fn crash_dir() -> PathBuf {
    if let Some(home) = std::env::var_os("HOME") {
        let mut p = PathBuf::from(home);
        p.push(".local");
        p.push("state");
        p.push("jumpflood");
        return p;
    }
    PathBuf::from("/tmp/jumpflood")
}

/// Install a panic hook that writes crash reports to disk.
/// Call once at startup, after `init()`.
pub fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        default_hook(info);

        let backtrace = Backtrace::force_capture();
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        let mut report = String::with_capacity(4096);
        report.push_str("=== jumpflood crash report ===\n");
        report.push_str(&format!("Version: {}\n", env!("CARGO_PKG_VERSION")));
        report.push_str(&format!("OS: {}\n", std::env::consts::OS));
        if let Some(gpu) = GPU_NAME.get() {
            report.push_str(&format!("GPU: {gpu}\n"));
        }

        report.push_str("\n--- Panic ---\n");
        let message = if let Some(s) = info.payload().downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        report.push_str(&format!("Message: {message}\n"));
        if let Some(loc) = info.location() {
            report.push_str(&format!(
                "Location: {}:{}:{}\n",
                loc.file(),
                loc.line(),
                loc.column()
            ));
        }

        let crumbs = format_breadcrumbs();
        if !crumbs.is_empty() {
            report.push_str("\n--- Breadcrumbs ---\n");
            report.push_str(&crumbs);
        }

        report.push_str("\n--- Backtrace ---\n");
        report.push_str(&format!("{backtrace}"));

        let dir = crash_dir();
        if fs::create_dir_all(&dir).is_ok() {
            let path = dir.join(format!("crash-{now}.log"));
            if let Ok(mut f) = fs::File::create(&path) {
                let _ = f.write_all(report.as_bytes());
            }
        }
    }));
}
