//! Per-stage GPU timings
//!
//! Timestamps are written at pass boundaries and read back once the frame
//! slot's submission has completed, so collecting never stalls the GPU.

use std::collections::VecDeque;

/// Stages with their own timing history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimedStage {
    EarlyCull,
    EarlyRender,
    DepthPyramid,
    LateCull,
    LateRender,
}

impl TimedStage {
    pub const ALL: [TimedStage; 5] = [
        TimedStage::EarlyCull,
        TimedStage::EarlyRender,
        TimedStage::DepthPyramid,
        TimedStage::LateCull,
        TimedStage::LateRender,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            TimedStage::EarlyCull => "early cull",
            TimedStage::EarlyRender => "early render",
            TimedStage::DepthPyramid => "depth pyramid",
            TimedStage::LateCull => "late cull",
            TimedStage::LateRender => "late render",
        }
    }

    fn begin_query(self) -> u32 {
        self.index() as u32 * 2
    }

    fn end_query(self) -> u32 {
        self.begin_query() + 1
    }
}

const QUERY_COUNT: u32 = TimedStage::ALL.len() as u32 * 2;

/// Rolling millisecond history per stage
#[derive(Debug, Clone)]
pub struct PerfCounters {
    histories: [VecDeque<f32>; 5],
    capacity: usize,
}

impl PerfCounters {
    pub fn new(capacity: usize) -> Self {
        Self {
            histories: std::array::from_fn(|_| VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
        }
    }

    pub fn record(&mut self, stage: TimedStage, milliseconds: f32) {
        let history = &mut self.histories[stage.index()];
        if history.len() == self.capacity {
            history.pop_front();
        }
        history.push_back(milliseconds);
    }

    pub fn history(&self, stage: TimedStage) -> &VecDeque<f32> {
        &self.histories[stage.index()]
    }

    pub fn latest(&self, stage: TimedStage) -> Option<f32> {
        self.history(stage).back().copied()
    }

    pub fn average(&self, stage: TimedStage) -> Option<f32> {
        let history = self.history(stage);
        if history.is_empty() {
            return None;
        }
        Some(history.iter().sum::<f32>() / history.len() as f32)
    }

    pub fn is_empty(&self) -> bool {
        self.histories.iter().all(VecDeque::is_empty)
    }
}

type MapResult = Result<(), wgpu::BufferAsyncError>;

/// Timestamp queries of one frame slot
pub struct GpuTimer {
    query_set: wgpu::QuerySet,
    resolve: wgpu::Buffer,
    readback: wgpu::Buffer,
    /// Nanoseconds per tick
    period: f32,
    resolved: bool,
    mapping: Option<futures::channel::oneshot::Receiver<MapResult>>,
}

impl GpuTimer {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let size = QUERY_COUNT as u64 * std::mem::size_of::<u64>() as u64;
        let query_set = device.create_query_set(&wgpu::QuerySetDescriptor {
            label: Some("Stage Timestamp Queries"),
            ty: wgpu::QueryType::Timestamp,
            count: QUERY_COUNT,
        });
        let resolve = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Timestamp Resolve Buffer"),
            size,
            usage: wgpu::BufferUsages::QUERY_RESOLVE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Timestamp Readback Buffer"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            query_set,
            resolve,
            readback,
            period: queue.get_timestamp_period(),
            resolved: false,
            mapping: None,
        }
    }

    pub fn compute_writes(&self, stage: TimedStage) -> wgpu::ComputePassTimestampWrites<'_> {
        self.compute_writes_partial(stage, true, true)
    }

    /// Stages spanning several passes stamp the beginning of the first and the end of the last
    pub fn compute_writes_partial(&self, stage: TimedStage, begin: bool, end: bool) -> wgpu::ComputePassTimestampWrites<'_> {
        wgpu::ComputePassTimestampWrites {
            query_set: &self.query_set,
            beginning_of_pass_write_index: begin.then(|| stage.begin_query()),
            end_of_pass_write_index: end.then(|| stage.end_query()),
        }
    }

    pub fn render_writes(&self, stage: TimedStage, begin: bool, end: bool) -> wgpu::RenderPassTimestampWrites<'_> {
        wgpu::RenderPassTimestampWrites {
            query_set: &self.query_set,
            beginning_of_pass_write_index: begin.then(|| stage.begin_query()),
            end_of_pass_write_index: end.then(|| stage.end_query()),
        }
    }

    /// Record the query resolve; skipped while the previous readback is still mapped
    pub fn resolve(&mut self, encoder: &mut wgpu::CommandEncoder) {
        if self.mapping.is_some() {
            return;
        }
        encoder.resolve_query_set(&self.query_set, 0..QUERY_COUNT, &self.resolve, 0);
        encoder.copy_buffer_to_buffer(&self.resolve, 0, &self.readback, 0, self.resolve.size());
        self.resolved = true;
    }

    /// Request the readback mapping; call right after the frame is submitted
    pub fn begin_readback(&mut self) {
        if !self.resolved {
            return;
        }
        self.resolved = false;

        let (sender, receiver) = futures::channel::oneshot::channel();
        self.readback.slice(..).map_async(wgpu::MapMode::Read, move |result| {
            sender.send(result).ok();
        });
        self.mapping = Some(receiver);
    }

    /// Harvest a finished readback; call after the slot's submission has been waited on
    pub fn collect(&mut self, counters: &mut PerfCounters) {
        let Some(receiver) = self.mapping.as_mut() else {
            return;
        };

        match receiver.try_recv() {
            Ok(None) => return,
            Ok(Some(Ok(()))) => {
                {
                    let data = self.readback.slice(..).get_mapped_range();
                    let ticks: &[u64] = bytemuck::cast_slice(&data);
                    for stage in TimedStage::ALL {
                        let begin = ticks[stage.begin_query() as usize];
                        let end = ticks[stage.end_query() as usize];
                        if let Some(ms) = ticks_to_ms(begin, end, self.period) {
                            counters.record(stage, ms);
                        }
                    }
                }
                self.readback.unmap();
            }
            Ok(Some(Err(e))) => log::warn!("[GpuTimer::collect] Timestamp readback failed: {}", e),
            Err(_) => {}
        }
        self.mapping = None;
    }
}

/// Elapsed milliseconds, or `None` for unwritten or wrapped timestamps
pub fn ticks_to_ms(begin: u64, end: u64, period_ns: f32) -> Option<f32> {
    if begin == 0 || end <= begin {
        return None;
    }
    Some(((end - begin) as f64 * period_ns as f64 / 1_000_000.0) as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_is_bounded() {
        let mut counters = PerfCounters::new(3);
        for ms in [1.0, 2.0, 3.0, 4.0] {
            counters.record(TimedStage::LateCull, ms);
        }
        let history: Vec<f32> = counters.history(TimedStage::LateCull).iter().copied().collect();
        assert_eq!(history, vec![2.0, 3.0, 4.0]);
        assert_eq!(counters.latest(TimedStage::LateCull), Some(4.0));
        assert_eq!(counters.average(TimedStage::LateCull), Some(3.0));
        assert_eq!(counters.average(TimedStage::EarlyCull), None);
    }

    #[test]
    fn queries_do_not_overlap() {
        let mut seen = std::collections::HashSet::new();
        for stage in TimedStage::ALL {
            assert!(seen.insert(stage.begin_query()));
            assert!(seen.insert(stage.end_query()));
        }
        assert_eq!(seen.len() as u32, QUERY_COUNT);
    }

    #[test]
    fn tick_conversion() {
        let ms = ticks_to_ms(1_000, 3_001_000, 1.0).unwrap();
        assert!((ms - 3.0).abs() < 1e-6);
        assert_eq!(ticks_to_ms(0, 5, 1.0), None);
        assert_eq!(ticks_to_ms(10, 5, 1.0), None);
    }
}
