use log::LevelFilter;

#[cfg(target_arch = "wasm32")]
mod console {
    use log::{Level, Log, Metadata, Record};

    /// `log` backend that writes to the browser console.
    pub(super) struct ConsoleLogger;

    pub(super) static LOGGER: ConsoleLogger = ConsoleLogger;

    impl Log for ConsoleLogger {
        fn enabled(&self, metadata: &Metadata<'_>) -> bool {
            metadata.level() <= log::max_level()
        }

        fn log(&self, record: &Record<'_>) {
            if !self.enabled(record.metadata()) {
                return;
            }
            let line = format!("[{}] {}: {}", record.level(), record.target(), record.args());
            let line = wasm_bindgen::JsValue::from_str(&line);
            match record.level() {
                Level::Error => web_sys::console::error_1(&line),
                Level::Warn => web_sys::console::warn_1(&line),
                Level::Info => web_sys::console::info_1(&line),
                Level::Debug | Level::Trace => web_sys::console::debug_1(&line),
            }
        }

        fn flush(&self) {}
    }
}

/// Set the log level. On wasm this also installs the console logger; later
/// calls only change the level. Native builds keep whatever logger the
/// embedding program installed.
pub fn init(level: LevelFilter) {
    #[cfg(target_arch = "wasm32")]
    {
        // Err means already installed.
        let _ = log::set_logger(&console::LOGGER);
    }
    log::set_max_level(level);
}

pub fn parse_level(level: Option<&str>) -> LevelFilter {
    level
        .and_then(|l| l.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Info)
}
