pub mod convert;
pub mod dispatch;
pub mod error;
pub mod fallback;
pub mod fs;
pub mod invoke;
pub mod platform;
pub mod runtime;

pub use convert::{convert_document, output_dir_for, validate_input, ConvertRequest};
pub use dispatch::{
    BlockOutcome, BlockReport, ConversionReport, Dispatcher, NoProgress, Progress,
};
pub use error::{ConvertError, ExitCode, RenderError, UsageError, INSTALL_HINT};
pub use invoke::{Invocation, RunOutput};
pub use mermaid_extract::{DiagramBlock, Document, Encoding};
pub use mermaid_render_config::Config;
pub use platform::{HostEnvironment, Launcher, PlatformResolver, UnixResolver, WindowsResolver};
pub use runtime::BundledRuntime;
