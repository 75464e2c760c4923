use std::path::PathBuf;
use std::sync::Once;

pub mod prelude {
    pub use crate::{Builder, LogLevel};
    pub use indoc::indoc;
    pub use similar_asserts::assert_eq as sim_assert_eq;
}

/// Returns the workspace root directory via the `CARGO_WORKSPACE_DIR` env var
/// set in `.cargo/config.toml`.
///
/// # Panics
///
/// Panics if `CARGO_WORKSPACE_DIR` is not set.
#[must_use]
pub fn workspace_root() -> PathBuf {
    PathBuf::from(
        std::env::var("CARGO_WORKSPACE_DIR")
            .expect("CARGO_WORKSPACE_DIR must be set in .cargo/config.toml"),
    )
}

/// Returns the path to the workspace `testdata/` directory.
#[must_use]
pub fn workspace_testdata() -> PathBuf {
    workspace_root().join("testdata")
}

/// Reads a file relative to the workspace `testdata/` directory.
///
/// # Panics
///
/// Panics if the file cannot be read.
#[must_use]
pub fn read_testdata(relative_path: &str) -> String {
    let path = workspace_testdata().join(relative_path);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("read {}: {e}", path.display()))
}

pub type LogLevel = tracing::metadata::Level;

static INIT_EYRE: Once = Once::new();

#[derive(Default)]
pub struct TestGuard {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Builder {
    setup_tracing: bool,
    install_eyre: bool,
    env_filter: Option<String>,
    log_level: LogLevel,
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            setup_tracing: true,
            install_eyre: true,
            env_filter: None,
            log_level: LogLevel::DEBUG,
        }
    }
}

impl Builder {
    /// Initialize a test: install `color_eyre` once per process and, when
    /// enabled, a per-test tracing subscriber so failures come with logs.
    ///
    /// # Panics
    ///
    /// Panics if `color_eyre` installation fails.
    pub fn build(self) -> TestGuard {
        if self.install_eyre {
            INIT_EYRE.call_once(|| {
                color_eyre::install().expect("failed to install eyre");
            });
        }
        if self.setup_tracing {
            let directive = self
                .env_filter
                .unwrap_or_else(|| self.log_level.to_string().to_ascii_lowercase());
            let subscriber = tracing_subscriber::fmt()
                .compact()
                .without_time()
                .with_env_filter(directive)
                .with_test_writer()
                .finish();
            // Another test may have installed a subscriber already.
            let _ = tracing::subscriber::set_global_default(subscriber);
        }
        TestGuard::default()
    }

    /// Toggle setting up tracing inside the test.
    #[must_use]
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.setup_tracing = enabled;
        self
    }

    /// Toggle log level for tracing inside the test.
    #[must_use]
    pub fn with_log_level(mut self, log_level: impl Into<LogLevel>) -> Self {
        self.log_level = log_level.into();
        self
    }

    /// Toggle installation of `color_eyre`.
    #[must_use]
    pub fn with_eyre(mut self, enabled: bool) -> Self {
        self.install_eyre = enabled;
        self
    }

    /// Configure the tracing subscriber's env filter.
    ///
    /// Requires tracing to be enabled with `Self::with_tracing`.
    #[must_use]
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }
}

/// Create a new builder.
#[must_use]
pub fn builder() -> Builder {
    Builder::default()
}
