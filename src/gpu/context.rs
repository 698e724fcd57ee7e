use std::sync::Arc;

use winit::window::Window;

use crate::constants::workgroups;
use crate::error::{RendererError, Result};

/// Features without which indirect culling cannot work
pub const REQUIRED_FEATURES: wgpu::Features =
    wgpu::Features::MULTI_DRAW_INDIRECT.union(wgpu::Features::INDIRECT_FIRST_INSTANCE);

/// Device, queue and the configured window surface
pub struct GpuContext {
    pub surface: wgpu::Surface<'static>,
    pub adapter: wgpu::Adapter,
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    pub config: wgpu::SurfaceConfiguration,
    pub features: wgpu::Features,
}

impl GpuContext {
    pub async fn new(window: Arc<Window>, vsync: bool) -> Result<Self> {
        log::info!("[GpuContext::new] Starting GPU initialization");
        let size = window.inner_size();

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance.create_surface(window).map_err(|e| {
            log::error!("[GpuContext::new] Failed to create surface: {}", e);
            RendererError::SurfaceCreation(e)
        })?;

        let adapter = request_adapter(&instance, &surface).await?;
        let info = adapter.get_info();
        log::info!("[GpuContext::new] Adapter: {} ({:?})", info.name, info.device_type);
        log::info!("[GpuContext::new] Backend: {:?}", info.backend);

        let features = select_features(adapter.features())?;
        let limits = select_limits(&adapter.limits())?;
        log::info!("[GpuContext::new] Enabled features: {:?}", features);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Swarm Renderer Device"),
                    required_features: features,
                    required_limits: limits,
                },
                None,
            )
            .await
            .map_err(|e| {
                log::error!("[GpuContext::new] Failed to create GPU device: {}", e);
                RendererError::DeviceRequest(e)
            })?;

        device.on_uncaptured_error(Box::new(|error| {
            log::error!("[GPU] Uncaptured device error: {:?}", error);
        }));

        let surface_caps = surface.get_capabilities(&adapter);
        if surface_caps.formats.is_empty() {
            log::error!("[GpuContext::new] No surface formats available!");
            return Err(RendererError::NoSurfaceFormat);
        }

        let format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .unwrap_or_else(|| {
                log::warn!("[GpuContext::new] No sRGB format found, using {:?}", surface_caps.formats[0]);
                surface_caps.formats[0]
            });

        let present_mode = if vsync {
            wgpu::PresentMode::AutoVsync
        } else {
            wgpu::PresentMode::AutoNoVsync
        };

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        let device = Arc::new(device);
        surface.configure(&device, &config);
        log::info!(
            "[GpuContext::new] Surface configured: {}x{} {:?} {:?}",
            config.width,
            config.height,
            config.format,
            config.present_mode
        );

        Ok(Self {
            surface,
            adapter,
            device,
            queue: Arc::new(queue),
            config,
            features,
        })
    }

    /// Reconfigure the surface; callers skip zero sizes (minimised window)
    pub fn resize(&mut self, width: u32, height: u32) {
        self.config.width = width.max(1);
        self.config.height = height.max(1);
        self.surface.configure(&self.device, &self.config);
        log::debug!("[GpuContext::resize] Surface reconfigured to {}x{}", width, height);
    }

    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    pub fn supports_timestamps(&self) -> bool {
        self.features.contains(wgpu::Features::TIMESTAMP_QUERY)
    }

    /// Block until the device has finished every submission
    pub fn wait_idle(&self) {
        self.device.poll(wgpu::Maintain::Wait);
    }
}

/// High-performance first, then low-power, then the software fallback
async fn request_adapter(instance: &wgpu::Instance, surface: &wgpu::Surface<'_>) -> Result<wgpu::Adapter> {
    let attempts = [
        (wgpu::PowerPreference::HighPerformance, false),
        (wgpu::PowerPreference::LowPower, false),
        (wgpu::PowerPreference::default(), true),
    ];

    for (power_preference, force_fallback_adapter) in attempts {
        log::info!(
            "[GpuContext::new] Requesting adapter ({:?}, fallback: {})",
            power_preference,
            force_fallback_adapter
        );
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference,
                compatible_surface: Some(surface),
                force_fallback_adapter,
            })
            .await;
        if let Some(adapter) = adapter {
            return Ok(adapter);
        }
        log::warn!("[GpuContext::new] No adapter for {:?}", power_preference);
    }

    log::error!("[GpuContext::new] No suitable GPU adapter found!");
    Err(RendererError::NoAdapter)
}

/// Required features plus whichever optional ones the adapter offers
pub fn select_features(available: wgpu::Features) -> Result<wgpu::Features> {
    if !available.contains(REQUIRED_FEATURES) {
        let missing = REQUIRED_FEATURES - available;
        log::error!("[GpuContext::new] Adapter lacks required features: {:?}", missing);
        return Err(RendererError::MissingFeature(missing));
    }

    let mut features = REQUIRED_FEATURES;
    if available.contains(wgpu::Features::TIMESTAMP_QUERY) {
        features |= wgpu::Features::TIMESTAMP_QUERY;
    } else {
        log::warn!("[GpuContext::new] TIMESTAMP_QUERY unavailable, GPU timings disabled");
    }
    Ok(features)
}

/// Default limits raised to what the pyramid's 32x32 workgroups need
pub fn select_limits(available: &wgpu::Limits) -> Result<wgpu::Limits> {
    let tile = workgroups::PYRAMID_TILE;
    let checks = [
        (
            "max_compute_invocations_per_workgroup",
            available.max_compute_invocations_per_workgroup,
            tile * tile,
        ),
        ("max_compute_workgroup_size_x", available.max_compute_workgroup_size_x, tile),
        ("max_compute_workgroup_size_y", available.max_compute_workgroup_size_y, tile),
    ];
    for (name, available, required) in checks {
        if available < required {
            log::error!("[GpuContext::new] {} is {} (need {})", name, available, required);
            return Err(RendererError::MissingLimit {
                name,
                available,
                required,
            });
        }
    }

    Ok(wgpu::Limits {
        max_compute_invocations_per_workgroup: tile * tile,
        max_compute_workgroup_size_x: wgpu::Limits::default().max_compute_workgroup_size_x.max(tile),
        max_compute_workgroup_size_y: wgpu::Limits::default().max_compute_workgroup_size_y.max(tile),
        ..wgpu::Limits::default().using_resolution(available.clone())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_indirect_features_are_fatal() {
        let err = select_features(wgpu::Features::MULTI_DRAW_INDIRECT).unwrap_err();
        match err {
            RendererError::MissingFeature(missing) => {
                assert_eq!(missing, wgpu::Features::INDIRECT_FIRST_INSTANCE)
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn timestamps_are_optional() {
        let features = select_features(REQUIRED_FEATURES).unwrap();
        assert_eq!(features, REQUIRED_FEATURES);

        let features = select_features(REQUIRED_FEATURES | wgpu::Features::TIMESTAMP_QUERY).unwrap();
        assert!(features.contains(wgpu::Features::TIMESTAMP_QUERY));
    }

    #[test]
    fn small_workgroup_limit_is_rejected() {
        let limits = wgpu::Limits::default();
        assert!(matches!(
            select_limits(&limits),
            Err(RendererError::MissingLimit { required: 1024, .. })
        ));

        let limits = wgpu::Limits {
            max_compute_invocations_per_workgroup: 1024,
            ..wgpu::Limits::default()
        };
        let selected = select_limits(&limits).unwrap();
        assert_eq!(selected.max_compute_invocations_per_workgroup, 1024);
    }
}
