use crate::error::Result;

pub const BACK_BUFFER_COUNT: u32 = 2;

pub const CLEAR_COLOR: [f32; 4] = [0.0, 0.2, 0.4, 1.0];

/// Present synchronized to the display refresh.
pub const SYNC_INTERVAL: u32 = 1;

pub const INITIAL_FENCE_VALUE: u64 = 1;

/// The GPU side of a fence: a value the queue signals once all previously
/// submitted work has completed.
pub trait FenceTimeline {
    /// Enqueue a signal of `value` behind all submitted work.
    fn signal(&mut self, value: u64) -> Result<()>;

    fn completed_value(&self) -> u64;

    /// Block the calling thread until `completed_value() >= value`.
    fn wait_until(&mut self, value: u64) -> Result<()>;
}

/// Command recording, submission and presentation for one frame.
pub trait FrameBackend {
    /// Reset the command resources and record the commands that clear
    /// `back_buffer` to `clear_color`. The list is closed on return.
    fn record_frame(&mut self, back_buffer: u32, clear_color: [f32; 4]) -> Result<()>;

    fn execute(&mut self) -> Result<()>;

    fn present(&mut self, sync_interval: u32) -> Result<()>;

    /// The buffer the presentation engine hands out next.
    fn current_back_buffer_index(&self) -> u32;
}

/// Anything the render loop can ask for a frame.
pub trait Renderer {
    fn render(&mut self) -> Result<()>;
}

pub struct FrameFence<T> {
    timeline: T,
    next_value: u64,
}

impl<T: FenceTimeline> FrameFence<T> {
    pub fn new(timeline: T) -> Self {
        Self {
            timeline,
            next_value: INITIAL_FENCE_VALUE,
        }
    }

    /// The value the next call to [`Self::wait_for_previous_frame`] signals.
    pub fn next_value(&self) -> u64 {
        self.next_value
    }

    #[cfg(test)]
    pub(crate) fn timeline(&self) -> &T {
        &self.timeline
    }

    pub fn wait_for_previous_frame(&mut self) -> Result<()> {
        let current_value = self.next_value;
        self.timeline.signal(current_value)?;

        self.next_value += 1;

        if self.timeline.completed_value() < current_value {
            self.timeline.wait_until(current_value)?;
        }

        Ok(())
    }
}

// One frame in flight: render() returns only after the GPU drained it.
pub struct GraphicsSystem<B: FrameBackend, T: FenceTimeline> {
    backend: B,
    fence: FrameFence<T>,
    back_buffer_index: u32,
}

impl<B: FrameBackend, T: FenceTimeline> GraphicsSystem<B, T> {
    pub fn new(backend: B, timeline: T) -> Self {
        let back_buffer_index = backend.current_back_buffer_index();
        debug_assert!(back_buffer_index < BACK_BUFFER_COUNT);

        Self {
            backend,
            fence: FrameFence::new(timeline),
            back_buffer_index,
        }
    }

    #[cfg(test)]
    pub(crate) fn fence(&self) -> &FrameFence<T> {
        &self.fence
    }

    pub fn back_buffer_index(&self) -> u32 {
        self.back_buffer_index
    }

    pub fn wait_for_previous_frame(&mut self) -> Result<()> {
        self.fence.wait_for_previous_frame()?;

        self.back_buffer_index = self.backend.current_back_buffer_index();
        debug_assert!(self.back_buffer_index < BACK_BUFFER_COUNT);

        Ok(())
    }
}

impl<B: FrameBackend, T: FenceTimeline> Renderer for GraphicsSystem<B, T> {
    fn render(&mut self) -> Result<()> {
        self.backend
            .record_frame(self.back_buffer_index, CLEAR_COLOR)?;
        self.backend.execute()?;
        self.backend.present(SYNC_INTERVAL)?;

        self.wait_for_previous_frame()
    }
}

impl<B: FrameBackend, T: FenceTimeline> Drop for GraphicsSystem<B, T> {
    fn drop(&mut self) {
        // The GPU may still reference the back buffers.
        if let Err(e) = self.wait_for_previous_frame() {
            log::error!("failed to drain the GPU before teardown: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::error::Error;

    #[derive(Default)]
    struct TimelineState {
        signaled: Vec<u64>,
        completed: u64,
        waits: Vec<u64>,
        complete_on_signal: bool,
    }

    #[derive(Clone, Default)]
    struct FakeTimeline(Rc<RefCell<TimelineState>>);

    impl FenceTimeline for FakeTimeline {
        fn signal(&mut self, value: u64) -> Result<()> {
            let mut state = self.0.borrow_mut();
            state.signaled.push(value);
            if state.complete_on_signal {
                state.completed = value;
            }
            Ok(())
        }

        fn completed_value(&self) -> u64 {
            self.0.borrow().completed
        }

        fn wait_until(&mut self, value: u64) -> Result<()> {
            let mut state = self.0.borrow_mut();
            state.waits.push(value);
            state.completed = value;
            Ok(())
        }
    }

    #[derive(Default)]
    struct BackendState {
        current: u32,
        recorded: Vec<u32>,
        executed: u32,
        presented: Vec<u32>,
        fail_present: bool,
    }

    /// Flip-model chain: presenting hands out the other buffer next.
    #[derive(Clone, Default)]
    struct FakeBackend(Rc<RefCell<BackendState>>);

    impl FakeBackend {
        fn starting_at(index: u32) -> Self {
            let backend = Self::default();
            backend.0.borrow_mut().current = index;
            backend
        }
    }

    impl FrameBackend for FakeBackend {
        fn record_frame(&mut self, back_buffer: u32, clear_color: [f32; 4]) -> Result<()> {
            assert_eq!(clear_color, CLEAR_COLOR);
            self.0.borrow_mut().recorded.push(back_buffer);
            Ok(())
        }

        fn execute(&mut self) -> Result<()> {
            self.0.borrow_mut().executed += 1;
            Ok(())
        }

        fn present(&mut self, sync_interval: u32) -> Result<()> {
            let mut state = self.0.borrow_mut();
            if state.fail_present {
                return Err(Error::native(0x887A0005_u32 as i32, "device removed"));
            }
            state.presented.push(sync_interval);
            state.current = (state.current + 1) % BACK_BUFFER_COUNT;
            Ok(())
        }

        fn current_back_buffer_index(&self) -> u32 {
            self.0.borrow().current
        }
    }

    #[test]
    fn fence_starts_at_one() {
        let fence = FrameFence::new(FakeTimeline::default());
        assert_eq!(fence.next_value(), 1);
        assert_eq!(fence.timeline().completed_value(), 0);
    }

    #[test]
    fn fence_blocks_while_gpu_is_behind() {
        let timeline = FakeTimeline::default();
        let mut fence = FrameFence::new(timeline.clone());

        fence.wait_for_previous_frame().unwrap();
        fence.wait_for_previous_frame().unwrap();

        let state = timeline.0.borrow();
        assert_eq!(state.signaled, vec![1, 2]);
        assert_eq!(state.waits, vec![1, 2]);
        assert_eq!(fence.next_value(), 3);
    }

    #[test]
    fn fence_skips_wait_when_gpu_caught_up() {
        let timeline = FakeTimeline::default();
        timeline.0.borrow_mut().complete_on_signal = true;
        let mut fence = FrameFence::new(timeline.clone());

        fence.wait_for_previous_frame().unwrap();

        assert!(timeline.0.borrow().waits.is_empty());
        assert_eq!(fence.next_value(), 2);
    }

    #[test]
    fn hundred_frames_advance_fence_and_alternate_buffers() {
        let backend = FakeBackend::starting_at(1);
        let timeline = FakeTimeline::default();
        let mut graphics = GraphicsSystem::new(backend.clone(), timeline.clone());

        for frame in 0..100u64 {
            assert_eq!(graphics.fence().next_value(), frame + 1);
            graphics.render().unwrap();
            assert!(graphics.back_buffer_index() < BACK_BUFFER_COUNT);
        }

        assert_eq!(graphics.fence().next_value(), 101);

        let state = backend.0.borrow();
        assert_eq!(state.executed, 100);
        assert!(state.presented.iter().all(|&interval| interval == SYNC_INTERVAL));
        for (frame, &index) in state.recorded.iter().enumerate() {
            assert_eq!(index, (1 + frame as u32) % 2);
        }

        let signaled = &timeline.0.borrow().signaled;
        assert_eq!(*signaled, (1..=100).collect::<Vec<_>>());
    }

    #[test]
    fn failed_present_does_not_advance_fence() {
        let backend = FakeBackend::default();
        backend.0.borrow_mut().fail_present = true;
        let mut graphics = GraphicsSystem::new(backend.clone(), FakeTimeline::default());

        let err = graphics.render().unwrap_err();

        assert_eq!(err.code(), Some(0x887A0005_u32 as i32));
        assert_eq!(graphics.fence().next_value(), 1);
        assert_eq!(graphics.back_buffer_index(), 0);
    }

    #[test]
    fn dropping_drains_the_gpu() {
        let timeline = FakeTimeline::default();
        let mut graphics = GraphicsSystem::new(FakeBackend::default(), timeline.clone());
        graphics.render().unwrap();

        drop(graphics);

        let state = timeline.0.borrow();
        assert_eq!(state.signaled, vec![1, 2]);
        assert_eq!(state.completed, 2);
    }
}
