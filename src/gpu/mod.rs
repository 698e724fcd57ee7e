//! GPU plumbing shared by every pass
//!
//! Device setup, bind group construction, frames in flight, one-shot uploads
//! and timestamp queries.

pub mod binding;
pub mod context;
pub mod frame;
pub mod layouts;
pub mod timing;
pub mod upload;

pub use binding::{BindGroupBuilder, BindingResourceDesc, ResourceKind};
pub use context::GpuContext;
pub use frame::{FrameRing, FrameSlot};
pub use layouts::BindLayout;
pub use timing::{GpuTimer, PerfCounters, TimedStage};
pub use upload::TextureImage;
