//! Locating the renderer executable.
//!
//! Each supported platform gets its own [`PlatformResolver`]; the one for the
//! running target is chosen once by [`current`]. Call sites only ever see the
//! resulting [`Launcher`].

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use mermaid_render_config::{RenderSettings, RuntimeSettings};
use tracing::{info, warn};

use crate::error::RenderError;
use crate::invoke::Invocation;
use crate::runtime::{BundledRuntime, RuntimeLayout, UNIX_LAYOUT, WINDOWS_LAYOUT};

const BUNDLED_DIR_NAME: &str = "nodejs";
const TOOL_RUNNER: &str = "npx";

pub trait PlatformResolver {
    fn locate_renderer(&self, runtime: &RuntimeSettings) -> Result<Launcher, RenderError>;
}

/// Process facts captured once at startup.
#[derive(Debug, Clone, Default)]
pub struct HostEnvironment {
    pub search_path: Option<OsString>,
    pub exe_dir: Option<PathBuf>,
}

impl HostEnvironment {
    pub fn capture() -> Self {
        Self {
            search_path: env::var_os("PATH"),
            exe_dir: env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(Path::to_path_buf)),
        }
    }

    fn find_on_path(&self, name: &str) -> Option<PathBuf> {
        let search_path = self.search_path.as_ref()?;
        env::split_paths(search_path)
            .map(|dir| dir.join(name))
            .find(|candidate| candidate.is_file())
    }
}

#[derive(Debug, Clone)]
pub struct UnixResolver {
    host: HostEnvironment,
}

impl UnixResolver {
    pub fn new(host: HostEnvironment) -> Self {
        Self { host }
    }
}

impl PlatformResolver for UnixResolver {
    fn locate_renderer(&self, runtime: &RuntimeSettings) -> Result<Launcher, RenderError> {
        locate_with(&UNIX_LAYOUT, &self.host, runtime)
    }
}

#[derive(Debug, Clone)]
pub struct WindowsResolver {
    host: HostEnvironment,
}

impl WindowsResolver {
    pub fn new(host: HostEnvironment) -> Self {
        Self { host }
    }
}

impl PlatformResolver for WindowsResolver {
    fn locate_renderer(&self, runtime: &RuntimeSettings) -> Result<Launcher, RenderError> {
        locate_with(&WINDOWS_LAYOUT, &self.host, runtime)
    }
}

/// The resolver for the platform this binary was built for.
pub fn current() -> Box<dyn PlatformResolver> {
    let host = HostEnvironment::capture();
    if cfg!(windows) {
        Box::new(WindowsResolver::new(host))
    } else {
        Box::new(UnixResolver::new(host))
    }
}

/// How the renderer gets launched for the rest of the run.
#[derive(Debug)]
pub enum Launcher {
    /// A renderer executable invoked directly.
    Direct { program: PathBuf },
    /// The system tool runner fetching and running the renderer package.
    ToolRunner { program: PathBuf },
    /// The tool runner shipped with a private runtime.
    Bundled(BundledRuntime),
}

impl Launcher {
    pub fn describe(&self) -> String {
        match self {
            Launcher::Direct { program } => format!("renderer {}", program.display()),
            Launcher::ToolRunner { program } => format!("tool runner {}", program.display()),
            Launcher::Bundled(runtime) => {
                format!("bundled runtime {}", runtime.root().display())
            }
        }
    }

    /// Invocations to attempt in order; later entries are used only if earlier
    /// ones fail to spawn.
    pub fn invocations(
        &self,
        runtime: &RuntimeSettings,
        render: &RenderSettings,
        input: &Path,
        output: &Path,
    ) -> Vec<Invocation> {
        let finish = |invocation: Invocation| {
            invocation.render_args(input, output, &render.theme, &render.background)
        };

        match self {
            Launcher::Direct { program } => vec![finish(Invocation::new("renderer", program))],
            Launcher::ToolRunner { program } => vec![finish(
                Invocation::new("tool-runner", program)
                    .arg("-p")
                    .arg(&runtime.package)
                    .arg(&runtime.command),
            )],
            Launcher::Bundled(bundled) => {
                let launcher = Invocation::new("bundled-launcher", bundled.launcher())
                    .arg("-p")
                    .arg(&runtime.package)
                    .arg(&runtime.command);
                let script = Invocation::new("bundled-script", bundled.node())
                    .arg(bundled.launcher_script())
                    .arg("-p")
                    .arg(&runtime.package)
                    .arg(&runtime.command);
                vec![
                    bundled.configure(finish(launcher)),
                    bundled.configure(finish(script)),
                ]
            }
        }
    }
}

fn locate_with(
    layout: &RuntimeLayout,
    host: &HostEnvironment,
    runtime: &RuntimeSettings,
) -> Result<Launcher, RenderError> {
    if let Some(renderer) = &runtime.renderer {
        if renderer.is_file() {
            info!(op = "platform::locate", renderer = %renderer.display(), "using configured renderer");
            return Ok(Launcher::Direct {
                program: renderer.clone(),
            });
        }
        warn!(
            op = "platform::locate",
            renderer = %renderer.display(),
            "configured renderer does not exist; searching elsewhere"
        );
    }

    let bundled_root = runtime.bundled_dir.clone().or_else(|| {
        host.exe_dir
            .as_ref()
            .map(|dir| dir.join(BUNDLED_DIR_NAME))
            .filter(|dir| dir.is_dir())
    });
    if let Some(root) = bundled_root {
        if let Some(bundled) = BundledRuntime::acquire(&root, layout)? {
            return Ok(Launcher::Bundled(bundled));
        }
    }

    let installed = format!("{}{}", runtime.command, layout.shim_suffix);
    if let Some(program) = host.find_on_path(&installed) {
        info!(op = "platform::locate", renderer = %program.display(), "using installed renderer");
        return Ok(Launcher::Direct { program });
    }

    let tool_runner = format!("{TOOL_RUNNER}{}", layout.shim_suffix);
    if let Some(program) = host.find_on_path(&tool_runner) {
        info!(op = "platform::locate", tool_runner = %program.display(), "using tool runner");
        return Ok(Launcher::ToolRunner { program });
    }

    warn!(op = "platform::locate", "no renderer, bundled runtime or tool runner found");
    Err(RenderError::runtime_unavailable())
}
