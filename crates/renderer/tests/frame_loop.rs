//! Long-running frame loop scenarios through the public scheduler API.

use ash::vk;
use vkpipe_platform::SurfaceSource;
use vkpipe_renderer::{FrameBackend, FrameOutcome, FrameScheduler, MAX_FRAMES_IN_FLIGHT, SlotState};
use vkpipe_rhi::RhiResult;
use vkpipe_rhi::swapchain::{AcquireOutcome, PresentOutcome};

/// Backend that tracks fence state per slot and rejects protocol violations.
struct FenceTracker {
    signaled: Vec<bool>,
    waited: Vec<bool>,
    image_count: u32,
    next_image: u32,
    tick: usize,
    out_of_date_ticks: Vec<usize>,
    rebuilds: Vec<vk::Extent2D>,
    recorded_slots: Vec<usize>,
    in_flight: Vec<usize>,
}

impl FenceTracker {
    fn new(slots: usize, image_count: u32) -> Self {
        Self {
            signaled: vec![true; slots],
            waited: vec![false; slots],
            image_count,
            next_image: 0,
            tick: 0,
            out_of_date_ticks: Vec::new(),
            rebuilds: Vec::new(),
            recorded_slots: Vec::new(),
            in_flight: Vec::new(),
        }
    }

    /// Completes GPU work one submission at a time, oldest first.
    fn retire_oldest(&mut self) {
        if !self.in_flight.is_empty() {
            let slot = self.in_flight.remove(0);
            self.signaled[slot] = true;
        }
    }
}

impl FrameBackend for FenceTracker {
    fn wait_slot(&mut self, slot: usize) -> RhiResult<()> {
        while !self.signaled[slot] {
            self.retire_oldest();
        }
        self.waited[slot] = true;
        Ok(())
    }

    fn acquire(&mut self, _slot: usize) -> RhiResult<AcquireOutcome> {
        self.tick += 1;
        if self.out_of_date_ticks.contains(&self.tick) {
            return Ok(AcquireOutcome::OutOfDate);
        }
        let image_index = self.next_image;
        self.next_image = (self.next_image + 1) % self.image_count;
        Ok(AcquireOutcome::Acquired {
            image_index,
            suboptimal: false,
        })
    }

    fn reset_slot(&mut self, slot: usize) -> RhiResult<()> {
        assert!(self.signaled[slot], "reset of an unsignaled fence");
        self.signaled[slot] = false;
        Ok(())
    }

    fn record(&mut self, slot: usize, _image_index: u32) -> RhiResult<()> {
        assert!(self.waited[slot], "slot {slot} recorded before its fence wait");
        assert!(!self.in_flight.contains(&slot), "slot {slot} still in flight");
        self.waited[slot] = false;
        self.recorded_slots.push(slot);
        Ok(())
    }

    fn submit(&mut self, slot: usize) -> RhiResult<()> {
        self.in_flight.push(slot);
        assert!(self.in_flight.len() <= MAX_FRAMES_IN_FLIGHT);
        Ok(())
    }

    fn present(&mut self, _slot: usize, _image_index: u32) -> RhiResult<PresentOutcome> {
        Ok(PresentOutcome::Presented)
    }

    fn rebuild(&mut self, extent: vk::Extent2D) -> RhiResult<()> {
        // Rebuilds wait for the device to go idle.
        while !self.in_flight.is_empty() {
            self.retire_oldest();
        }
        self.rebuilds.push(extent);
        Ok(())
    }
}

struct StaticSurface(u32, u32);

impl SurfaceSource for StaticSurface {
    fn framebuffer_size(&self) -> (u32, u32) {
        (self.0, self.1)
    }

    fn take_resized(&mut self) -> bool {
        false
    }
}

#[test]
fn test_steady_state_never_exceeds_frames_in_flight() {
    let mut backend = FenceTracker::new(MAX_FRAMES_IN_FLIGHT, 3);
    let mut surface = StaticSurface(1280, 720);
    let mut scheduler = FrameScheduler::new(MAX_FRAMES_IN_FLIGHT);

    for _ in 0..50 {
        let outcome = scheduler.draw(&mut backend, &mut surface).unwrap();
        assert!(matches!(outcome, FrameOutcome::Presented { rebuilt: false, .. }));
    }

    assert_eq!(backend.recorded_slots.len(), 50);
    for pair in backend.recorded_slots.windows(2) {
        assert_ne!(pair[0], pair[1], "slot repeated consecutively");
    }
    assert_eq!(scheduler.stats().presented, 50);
}

#[test]
fn test_out_of_date_on_fifth_frame_recovers() {
    let mut backend = FenceTracker::new(MAX_FRAMES_IN_FLIGHT, 3);
    backend.out_of_date_ticks = vec![5];
    let mut surface = StaticSurface(1280, 720);
    let mut scheduler = FrameScheduler::new(MAX_FRAMES_IN_FLIGHT);

    let mut outcomes = Vec::new();
    for _ in 0..6 {
        let slot_before = scheduler.current_slot();
        let outcome = scheduler.draw(&mut backend, &mut surface).unwrap();
        if outcome == FrameOutcome::Rebuilt {
            assert_eq!(scheduler.current_slot(), slot_before);
        }
        outcomes.push(outcome);
    }

    assert_eq!(outcomes[4], FrameOutcome::Rebuilt);
    assert!(matches!(outcomes[5], FrameOutcome::Presented { slot: 0, .. }));
    assert_eq!(
        backend.rebuilds,
        vec![vk::Extent2D {
            width: 1280,
            height: 720
        }]
    );
    assert_eq!(scheduler.stats().rebuilds, 1);
    assert_eq!(scheduler.slot_state(0), Some(SlotState::Presented));
}

#[test]
fn test_repeated_out_of_date_keeps_fences_consistent() {
    let mut backend = FenceTracker::new(MAX_FRAMES_IN_FLIGHT, 2);
    backend.out_of_date_ticks = vec![2, 3, 4, 9];
    let mut surface = StaticSurface(640, 480);
    let mut scheduler = FrameScheduler::new(MAX_FRAMES_IN_FLIGHT);

    let presented = (0..20)
        .filter(|_| {
            matches!(
                scheduler.draw(&mut backend, &mut surface).unwrap(),
                FrameOutcome::Presented { .. }
            )
        })
        .count();

    assert_eq!(presented, 16);
    assert_eq!(backend.rebuilds.len(), 4);
}
