use std::env;
use std::ffi::OsString;
use std::io;
use std::iter;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, info};

use crate::invoke::Invocation;

/// Where a Node.js distribution keeps its pieces on a given platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeLayout {
    pub node: &'static str,
    pub bin_dir: &'static str,
    pub launcher: &'static str,
    pub launcher_script: &'static str,
    /// Appended to command names found on `PATH` (`.cmd` shims on Windows).
    pub shim_suffix: &'static str,
}

pub const UNIX_LAYOUT: RuntimeLayout = RuntimeLayout {
    node: "bin/node",
    bin_dir: "bin",
    launcher: "bin/npx",
    launcher_script: "lib/node_modules/npm/bin/npx-cli.js",
    shim_suffix: "",
};

pub const WINDOWS_LAYOUT: RuntimeLayout = RuntimeLayout {
    node: "node.exe",
    bin_dir: "",
    launcher: "npx.cmd",
    launcher_script: "node_modules/npm/bin/npx-cli.js",
    shim_suffix: ".cmd",
};

/// A private Node.js runtime plus the scratch directory it uses for one run.
///
/// The scratch directory serves as the npm cache and is removed when the
/// guard is dropped, on every exit path of the run that acquired it.
#[derive(Debug)]
pub struct BundledRuntime {
    root: PathBuf,
    node: PathBuf,
    bin_dir: PathBuf,
    launcher: PathBuf,
    launcher_script: PathBuf,
    scratch: TempDir,
}

impl BundledRuntime {
    /// Returns `Ok(None)` when `root` holds no node executable.
    pub fn acquire(root: &Path, layout: &RuntimeLayout) -> io::Result<Option<Self>> {
        let node = root.join(layout.node);
        if !node.is_file() {
            debug!(
                op = "runtime::acquire",
                root = %root.display(),
                "no node executable in bundled runtime"
            );
            return Ok(None);
        }

        let scratch = tempfile::Builder::new()
            .prefix("mermaid_nodejs_")
            .tempdir()?;

        info!(
            op = "runtime::acquire",
            root = %root.display(),
            scratch = %scratch.path().display(),
            "using bundled Node.js runtime"
        );

        Ok(Some(Self {
            root: root.to_path_buf(),
            node,
            bin_dir: root.join(layout.bin_dir),
            launcher: root.join(layout.launcher),
            launcher_script: root.join(layout.launcher_script),
            scratch,
        }))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn node(&self) -> &Path {
        &self.node
    }

    pub fn launcher(&self) -> &Path {
        &self.launcher
    }

    pub fn launcher_script(&self) -> &Path {
        &self.launcher_script
    }

    pub fn scratch_dir(&self) -> &Path {
        self.scratch.path()
    }

    /// Points the invocation at this runtime's binaries and npm cache.
    pub fn configure(&self, invocation: Invocation) -> Invocation {
        let inherited = env::var_os("PATH").unwrap_or_default();
        let search_path = env::join_paths(
            iter::once(self.bin_dir.clone()).chain(env::split_paths(&inherited)),
        )
        .unwrap_or_else(|_| OsString::from(self.bin_dir.as_os_str()));

        invocation
            .env("PATH", search_path)
            .env("npm_config_cache", self.scratch.path().join("npm-cache"))
            .env("npm_config_update_notifier", "false")
    }
}
