//! Locating and loading the spinapi shared library.
//!
//! SpinCore ships one prebuilt library per OS and pointer width. [`Platform`] maps the host
//! to the matching file name and refuses combinations with no build, before anything is
//! loaded. [`LoaderConfig`] lets the caller point at a specific file or directory, mostly
//! through environment variables:
//!
//! | variable              | effect                                                    |
//! |-----------------------|-----------------------------------------------------------|
//! | `SPINAPI_LIBRARY`     | full path of the library, bypasses the platform table     |
//! | `SPINAPI_LIBRARY_DIR` | directory searched for the platform's library file        |
//! | `SPINAPI_DEBUG`       | `1`/`0` (or `true`/`false`, `on`/`off`): `pb_set_debug` after load |
//!
//! Without a path the bare file name is handed to the system loader, which searches the
//! usual library paths.

use std::env;
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::error::{Result, SpinError};
use crate::spinapi::{NativeLibrary, SpinApi};

pub const LIBRARY_ENV: &str = "SPINAPI_LIBRARY";
pub const LIBRARY_DIR_ENV: &str = "SPINAPI_LIBRARY_DIR";
pub const DEBUG_ENV: &str = "SPINAPI_DEBUG";

/// Host operating system and pointer width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub os: String,
    pub pointer_width: u32,
}

impl Platform {
    pub fn new(os: &str, pointer_width: u32) -> Self {
        Self {
            os: os.to_string(),
            pointer_width,
        }
    }

    pub fn host() -> Self {
        Self::new(env::consts::OS, usize::BITS)
    }

    /// File name of the spinapi build for this platform.
    ///
    /// ```
    /// use pbctrl_backend::loader::Platform;
    ///
    /// assert_eq!(Platform::new("windows", 64).library_file_name().unwrap(), "spinapi64.dll");
    /// assert!(Platform::new("freebsd", 64).library_file_name().is_err());
    /// ```
    pub fn library_file_name(&self) -> Result<&'static str> {
        match (self.os.as_str(), self.pointer_width) {
            ("windows", 64) => Ok("spinapi64.dll"),
            ("windows", 32) => Ok("spinapi.dll"),
            ("linux", 64) => Ok("libspinapi64.so"),
            ("linux", 32) => Ok("libspinapi.so"),
            ("macos", 64) => Ok("libspinapi.dylib"),
            _ => Err(SpinError::UnsupportedPlatform {
                os: self.os.clone(),
                pointer_width: self.pointer_width,
            }),
        }
    }
}

/// Where to find the library and how to configure it once loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoaderConfig {
    pub library_path: Option<PathBuf>,
    pub library_dir: Option<PathBuf>,
    /// When set, `pb_set_debug` is called with this value right after loading.
    pub debug: Option<bool>,
}

impl LoaderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the `SPINAPI_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Same as [`LoaderConfig::from_env`] with a custom variable lookup.
    pub fn from_vars<F: Fn(&str) -> Option<String>>(lookup: F) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        Self {
            library_path: non_empty(LIBRARY_ENV).map(PathBuf::from),
            library_dir: non_empty(LIBRARY_DIR_ENV).map(PathBuf::from),
            debug: non_empty(DEBUG_ENV).and_then(|value| {
                let parsed = parse_switch(&value);
                if parsed.is_none() {
                    warn!(value = %value, "ignoring unrecognized {}", DEBUG_ENV);
                }
                parsed
            }),
        }
    }

    pub fn with_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.library_path = Some(path.into());
        self
    }

    pub fn with_library_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.library_dir = Some(dir.into());
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = Some(debug);
        self
    }

    /// Resolves the library to open on `platform`.
    ///
    /// An explicit `library_path` is used as is. Otherwise the platform's file name is
    /// looked up, failing with [`SpinError::UnsupportedPlatform`] when there is none.
    pub fn resolve(&self, platform: &Platform) -> Result<PathBuf> {
        if let Some(path) = &self.library_path {
            return Ok(path.clone());
        }
        let file_name = platform.library_file_name()?;
        Ok(match &self.library_dir {
            Some(dir) => dir.join(file_name),
            None => PathBuf::from(file_name),
        })
    }
}

fn parse_switch(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}

/// Produces a [`SpinApi`] implementation on demand.
///
/// The board handle calls [`Loader::load`] at most once, on its first native call.
pub trait Loader {
    fn load(&self) -> Result<Box<dyn SpinApi + Send>>;

    /// Debug mode to set right after a successful load, if any.
    fn debug_on_load(&self) -> Option<bool> {
        None
    }
}

/// Loads the vendor library from disk.
#[derive(Debug, Clone)]
pub struct NativeLoader {
    config: LoaderConfig,
    platform: Platform,
}

impl NativeLoader {
    pub fn new(config: LoaderConfig) -> Self {
        Self::for_platform(config, Platform::host())
    }

    pub fn for_platform(config: LoaderConfig, platform: Platform) -> Self {
        Self { config, platform }
    }

    pub fn from_env() -> Self {
        Self::new(LoaderConfig::from_env())
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }
}

impl Default for NativeLoader {
    fn default() -> Self {
        Self::from_env()
    }
}

impl Loader for NativeLoader {
    fn load(&self) -> Result<Box<dyn SpinApi + Send>> {
        let path = self.config.resolve(&self.platform)?;
        debug!(
            os = %self.platform.os,
            pointer_width = self.platform.pointer_width,
            path = %path.display(),
            "loading spinapi"
        );
        Ok(Box::new(NativeLibrary::open(&path)?))
    }

    fn debug_on_load(&self) -> Option<bool> {
        self.config.debug
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::HashMap;
    use std::path::Path;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn platform_table() {
        let cases = [
            ("windows", 64, "spinapi64.dll"),
            ("windows", 32, "spinapi.dll"),
            ("linux", 64, "libspinapi64.so"),
            ("linux", 32, "libspinapi.so"),
            ("macos", 64, "libspinapi.dylib"),
        ];
        for (os, width, file) in cases {
            assert_eq!(Platform::new(os, width).library_file_name().unwrap(), file);
        }
    }

    #[test]
    fn unsupported_platforms() {
        for (os, width) in [("macos", 32), ("linux", 16), ("freebsd", 64), ("windows", 128)] {
            let err = Platform::new(os, width).library_file_name().unwrap_err();
            assert!(err.is_unsupported_platform(), "{} {}", os, width);
        }
    }

    #[test]
    fn explicit_path_wins() {
        let config = LoaderConfig::new()
            .with_library_dir("/opt/spincore")
            .with_library_path("/tmp/custom.so");
        let path = config.resolve(&Platform::new("freebsd", 64)).unwrap();
        assert_eq!(path, Path::new("/tmp/custom.so"));
    }

    #[test]
    fn directory_is_joined_with_platform_file() {
        let config = LoaderConfig::new().with_library_dir("/opt/spincore");
        let path = config.resolve(&Platform::new("linux", 64)).unwrap();
        assert_eq!(path, Path::new("/opt/spincore/libspinapi64.so"));

        let bare = LoaderConfig::new().resolve(&Platform::new("windows", 32)).unwrap();
        assert_eq!(bare, Path::new("spinapi.dll"));
    }

    #[test]
    fn unsupported_platform_fails_before_loading() {
        let loader = NativeLoader::for_platform(LoaderConfig::new(), Platform::new("plan9", 64));
        match loader.load() {
            Err(err) => assert!(err.is_unsupported_platform()),
            Ok(_) => panic!("loaded a library for an unsupported platform"),
        }
    }

    #[test]
    fn config_from_vars() {
        let config = LoaderConfig::from_vars(vars(&[
            (LIBRARY_DIR_ENV, "/opt/spincore"),
            (DEBUG_ENV, "On"),
        ]));
        assert_eq!(config.library_path, None);
        assert_eq!(config.library_dir, Some(PathBuf::from("/opt/spincore")));
        assert_eq!(config.debug, Some(true));

        let config = LoaderConfig::from_vars(vars(&[(LIBRARY_ENV, "  "), (DEBUG_ENV, "0")]));
        assert_eq!(config.library_path, None);
        assert_eq!(config.debug, Some(false));

        let config = LoaderConfig::from_vars(vars(&[(DEBUG_ENV, "maybe")]));
        assert_eq!(config.debug, None);
    }
}
