//! Per-frame stage plan
//!
//! The frame is a fixed sequence of stages, each declaring the resources it
//! reads and writes. wgpu inserts the barriers between passes; the plan makes
//! the dependencies explicit and is validated once when the renderer starts.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameStage {
    AcquireImage,
    EarlyCull,
    ShadowPass,
    EarlyGeometryPass,
    DepthPyramidBuild,
    LateCull,
    LateGeometryPass,
    Present,
}

impl FrameStage {
    /// Execution order of every frame
    pub const ORDER: [FrameStage; 8] = [
        FrameStage::AcquireImage,
        FrameStage::EarlyCull,
        FrameStage::ShadowPass,
        FrameStage::EarlyGeometryPass,
        FrameStage::DepthPyramidBuild,
        FrameStage::LateCull,
        FrameStage::LateGeometryPass,
        FrameStage::Present,
    ];
}

impl fmt::Display for FrameStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameResource {
    SurfaceImage,
    MeshBuffers,
    InstanceTransforms,
    Visibility,
    EarlyIndirect,
    LateIndirect,
    ShadowMap,
    GBuffer,
    SceneDepth,
    DepthPyramid,
}

impl FrameResource {
    /// Uploaded outside the frame and only read inside it
    pub fn is_persistent(self) -> bool {
        matches!(self, FrameResource::MeshBuffers | FrameResource::InstanceTransforms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read(FrameResource),
    Write(FrameResource),
    /// Reads the value the previous frame left behind
    ReadPrevious(FrameResource),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageDecl {
    pub stage: FrameStage,
    pub accesses: Vec<Access>,
}

impl StageDecl {
    pub fn new(stage: FrameStage, accesses: Vec<Access>) -> Self {
        Self { stage, accesses }
    }

    /// What each stage touches in the standard two-phase frame
    pub fn standard(stage: FrameStage) -> Self {
        use Access::*;
        use FrameResource::*;

        let accesses = match stage {
            FrameStage::AcquireImage => vec![Write(SurfaceImage)],
            FrameStage::EarlyCull => vec![
                Read(InstanceTransforms),
                ReadPrevious(Visibility),
                ReadPrevious(DepthPyramid),
                Write(EarlyIndirect),
                Write(Visibility),
            ],
            FrameStage::ShadowPass => vec![
                Read(MeshBuffers),
                Read(InstanceTransforms),
                Read(EarlyIndirect),
                Write(ShadowMap),
            ],
            FrameStage::EarlyGeometryPass => vec![
                Read(MeshBuffers),
                Read(InstanceTransforms),
                Read(EarlyIndirect),
                Write(GBuffer),
                Write(SceneDepth),
                Read(ShadowMap),
                Read(GBuffer),
                Write(SurfaceImage),
            ],
            FrameStage::DepthPyramidBuild => vec![Read(SceneDepth), Write(DepthPyramid)],
            FrameStage::LateCull => vec![
                Read(InstanceTransforms),
                Read(Visibility),
                Read(DepthPyramid),
                Write(LateIndirect),
                Write(Visibility),
            ],
            FrameStage::LateGeometryPass => vec![
                Read(MeshBuffers),
                Read(InstanceTransforms),
                Read(LateIndirect),
                Read(GBuffer),
                Read(SceneDepth),
                Write(GBuffer),
                Write(SceneDepth),
                Read(ShadowMap),
                Write(SurfaceImage),
            ],
            FrameStage::Present => vec![Read(SurfaceImage)],
        };
        Self::new(stage, accesses)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("stage {position} is {found}, expected {expected}")]
    WrongOrder {
        position: usize,
        expected: FrameStage,
        found: FrameStage,
    },

    #[error("plan has {0} stages, expected {1}")]
    StageCount(usize, usize),

    #[error("{stage} reads {resource:?} before any stage of the frame writes it")]
    ReadBeforeWrite { stage: FrameStage, resource: FrameResource },

    #[error("{stage} expects last frame's {resource:?}, but it was already overwritten this frame")]
    StaleRead { stage: FrameStage, resource: FrameResource },

    #[error("{resource:?} is read from the previous frame but never written")]
    NeverWritten { resource: FrameResource },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramePlan {
    stages: Vec<StageDecl>,
}

impl FramePlan {
    pub fn new(stages: Vec<StageDecl>) -> Self {
        Self { stages }
    }

    pub fn standard() -> Self {
        Self::new(FrameStage::ORDER.iter().map(|&s| StageDecl::standard(s)).collect())
    }

    pub fn stages(&self) -> impl Iterator<Item = FrameStage> + '_ {
        self.stages.iter().map(|decl| decl.stage)
    }

    pub fn validate(&self) -> Result<(), PlanError> {
        if self.stages.len() != FrameStage::ORDER.len() {
            return Err(PlanError::StageCount(self.stages.len(), FrameStage::ORDER.len()));
        }
        for (position, (decl, &expected)) in self.stages.iter().zip(FrameStage::ORDER.iter()).enumerate() {
            if decl.stage != expected {
                return Err(PlanError::WrongOrder {
                    position,
                    expected,
                    found: decl.stage,
                });
            }
        }

        let mut written = rustc_hash::FxHashSet::default();
        let mut carried = Vec::new();
        for decl in &self.stages {
            for access in &decl.accesses {
                match *access {
                    Access::Read(resource) => {
                        if !resource.is_persistent() && !written.contains(&resource) {
                            return Err(PlanError::ReadBeforeWrite {
                                stage: decl.stage,
                                resource,
                            });
                        }
                    }
                    Access::ReadPrevious(resource) => {
                        if written.contains(&resource) {
                            return Err(PlanError::StaleRead {
                                stage: decl.stage,
                                resource,
                            });
                        }
                        carried.push(resource);
                    }
                    Access::Write(resource) => {
                        written.insert(resource);
                    }
                }
            }
        }

        match carried.into_iter().find(|r| !written.contains(r)) {
            Some(resource) => Err(PlanError::NeverWritten { resource }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_plan_is_valid() {
        let plan = FramePlan::standard();
        assert_eq!(plan.validate(), Ok(()));
        assert_eq!(plan.stages().collect::<Vec<_>>(), FrameStage::ORDER.to_vec());
    }

    #[test]
    fn late_cull_before_pyramid_is_rejected() {
        let mut order = FrameStage::ORDER.to_vec();
        order.swap(4, 5);
        let plan = FramePlan::new(order.into_iter().map(StageDecl::standard).collect());
        assert!(matches!(plan.validate(), Err(PlanError::WrongOrder { position: 4, .. })));
    }

    #[test]
    fn reading_pyramid_this_frame_in_early_cull_is_a_hazard() {
        let mut stages: Vec<StageDecl> = FrameStage::ORDER.iter().map(|&s| StageDecl::standard(s)).collect();
        stages[1].accesses = vec![Access::Read(FrameResource::DepthPyramid)];
        assert_eq!(
            FramePlan::new(stages).validate(),
            Err(PlanError::ReadBeforeWrite {
                stage: FrameStage::EarlyCull,
                resource: FrameResource::DepthPyramid,
            })
        );
    }

    #[test]
    fn previous_frame_read_needs_a_writer() {
        let mut stages: Vec<StageDecl> = FrameStage::ORDER.iter().map(|&s| StageDecl::standard(s)).collect();
        stages[4].accesses = vec![Access::Read(FrameResource::SceneDepth)];
        stages[5].accesses.retain(|a| *a != Access::Read(FrameResource::DepthPyramid));
        assert_eq!(
            FramePlan::new(stages).validate(),
            Err(PlanError::NeverWritten {
                resource: FrameResource::DepthPyramid
            })
        );
    }
}
