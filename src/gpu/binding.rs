//! Bind group builder over a tagged resource description
//!
//! Passes describe their bindings as `(binding, resource)` pairs; the builder
//! checks each resource against the layout entry it targets and emits the
//! wgpu bind group in one call.

use std::num::NonZeroU64;

use wgpu::{BindGroup, BindGroupEntry, BindingResource, BindingType, Device};

use super::layouts::BindLayout;

/// What kind of resource a binding slot accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Buffer,
    Texture,
    Sampler,
}

impl ResourceKind {
    pub fn of(ty: &BindingType) -> Self {
        match ty {
            BindingType::Buffer { .. } => ResourceKind::Buffer,
            BindingType::Texture { .. } | BindingType::StorageTexture { .. } => ResourceKind::Texture,
            BindingType::Sampler(_) => ResourceKind::Sampler,
            #[allow(unreachable_patterns)]
            _ => ResourceKind::Buffer,
        }
    }
}

/// One resource bound to a slot
#[derive(Debug, Clone, Copy)]
pub enum BindingResourceDesc<'a> {
    Buffer {
        buffer: &'a wgpu::Buffer,
        offset: wgpu::BufferAddress,
        /// `None` binds to the end of the buffer
        size: Option<wgpu::BufferAddress>,
    },
    Texture {
        view: &'a wgpu::TextureView,
    },
    Sampler {
        sampler: &'a wgpu::Sampler,
    },
}

impl<'a> BindingResourceDesc<'a> {
    pub fn kind(&self) -> ResourceKind {
        match self {
            BindingResourceDesc::Buffer { .. } => ResourceKind::Buffer,
            BindingResourceDesc::Texture { .. } => ResourceKind::Texture,
            BindingResourceDesc::Sampler { .. } => ResourceKind::Sampler,
        }
    }

    fn to_wgpu(self) -> BindingResource<'a> {
        match self {
            BindingResourceDesc::Buffer { buffer, offset, size } => BindingResource::Buffer(wgpu::BufferBinding {
                buffer,
                offset,
                size: size.and_then(NonZeroU64::new),
            }),
            BindingResourceDesc::Texture { view } => BindingResource::TextureView(view),
            BindingResourceDesc::Sampler { sampler } => BindingResource::Sampler(sampler),
        }
    }
}

/// Builder for bind groups checked against their [`BindLayout`]
pub struct BindGroupBuilder<'a> {
    device: &'a Device,
    layout: &'a BindLayout,
    resources: Vec<(u32, BindingResourceDesc<'a>)>,
    label: Option<&'a str>,
}

impl<'a> BindGroupBuilder<'a> {
    pub fn new(device: &'a Device, layout: &'a BindLayout) -> Self {
        Self {
            device,
            layout,
            resources: Vec::with_capacity(layout.entries.len()),
            label: None,
        }
    }

    pub fn label(mut self, label: &'a str) -> Self {
        self.label = Some(label);
        self
    }

    pub fn resource(mut self, binding: u32, resource: BindingResourceDesc<'a>) -> Self {
        let expected = self
            .layout
            .entry(binding)
            .map(|entry| ResourceKind::of(&entry.ty))
            .unwrap_or_else(|| panic!("binding {binding} is not part of the layout"));
        assert_eq!(
            expected,
            resource.kind(),
            "binding {binding} expects a {expected:?}, got a {:?}",
            resource.kind()
        );
        self.resources.push((binding, resource));
        self
    }

    /// Whole-buffer binding
    pub fn buffer(self, binding: u32, buffer: &'a wgpu::Buffer) -> Self {
        self.resource(binding, BindingResourceDesc::Buffer { buffer, offset: 0, size: None })
    }

    pub fn texture(self, binding: u32, view: &'a wgpu::TextureView) -> Self {
        self.resource(binding, BindingResourceDesc::Texture { view })
    }

    pub fn sampler(self, binding: u32, sampler: &'a wgpu::Sampler) -> Self {
        self.resource(binding, BindingResourceDesc::Sampler { sampler })
    }

    pub fn build(self) -> BindGroup {
        assert_eq!(
            self.resources.len(),
            self.layout.entries.len(),
            "bind group {:?} leaves layout slots unbound",
            self.label
        );

        let entries: Vec<BindGroupEntry> = self
            .resources
            .into_iter()
            .map(|(binding, resource)| BindGroupEntry {
                binding,
                resource: resource.to_wgpu(),
            })
            .collect();

        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: self.label,
            layout: &self.layout.layout,
            entries: &entries,
        })
    }
}
