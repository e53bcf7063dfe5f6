use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use framelink::prelude::*;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

/// Flags edits to the settings file so the main loop can reload it. The
/// parent directory is watched because editors often replace the file.
pub struct SettingsWatch {
    changed: Arc<AtomicBool>,
    _watcher: RecommendedWatcher,
}

impl SettingsWatch {
    pub fn start(path: PathBuf) -> Result<Self, notify::Error> {
        let changed = Arc::new(AtomicBool::new(false));
        let changed_flag = changed.clone();
        let mut last_hash = content_hash(&path).ok();
        let settings_path = path.clone();
        let watch_dir = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        info!(
            "watching settings '{}' via directory '{}'",
            settings_path.display(),
            watch_dir.display()
        );

        let mut watcher = notify::recommended_watcher(move |result| {
            let event: Event = match result {
                Ok(event) => event,
                Err(err) => {
                    warn!("settings watcher failed: {}", err);
                    return;
                }
            };

            if !settings_changed(&event, &settings_path) {
                return;
            }

            let Ok(hash) = content_hash(&settings_path) else {
                trace!("settings file not readable yet");
                return;
            };

            if last_hash == Some(hash) {
                trace!("settings content unchanged");
                return;
            }
            last_hash = Some(hash);

            changed_flag.store(true, Ordering::SeqCst);
            debug!("settings file changed: {}", settings_path.display());
        })?;

        watcher.watch(&watch_dir, RecursiveMode::NonRecursive)?;

        Ok(Self {
            changed,
            _watcher: watcher,
        })
    }

    pub fn take_changed(&self) -> bool {
        self.changed.swap(false, Ordering::SeqCst)
    }
}

fn content_hash(path: &Path) -> Result<u64, std::io::Error> {
    let bytes = fs::read(path)?;
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    Ok(hasher.finish())
}

fn settings_changed(event: &Event, target: &Path) -> bool {
    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
        return false;
    }

    event.paths.is_empty()
        || event.paths.iter().any(|path| {
            path == target || path.file_name() == target.file_name()
        })
}
