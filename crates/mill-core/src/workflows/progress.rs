/// Events emitted by long-running workflows.
#[derive(Debug, Clone)]
pub enum Progress {
    PhaseStart { name: &'static str },
    PhaseFinish,

    /// A pass over `total_frames` frames begins.
    TaskStart { total_frames: u64 },
    FrameDone,
    TaskFinish,

    Message(String),
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

/// Forwards [`Progress`] events to an optional callback; without one, events
/// are dropped.
#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }

    /// Starts a frame loop: `TaskStart` now, `FrameDone` on every
    /// [`FrameTask::tick`] and `TaskFinish` from [`FrameTask::finish`].
    pub fn frames(&self, total_frames: usize) -> FrameTask<'_, 'a> {
        self.report(Progress::TaskStart {
            total_frames: total_frames as u64,
        });
        FrameTask { reporter: self }
    }
}

pub struct FrameTask<'r, 'a> {
    reporter: &'r ProgressReporter<'a>,
}

impl FrameTask<'_, '_> {
    #[inline]
    pub fn tick(&self) {
        self.reporter.report(Progress::FrameDone);
    }

    pub fn finish(self) {
        self.reporter.report(Progress::TaskFinish);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn frame_task_reports_start_ticks_and_finish() {
        let events = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            events.lock().unwrap().push(format!("{:?}", event));
        }));
        let task = reporter.frames(2);
        task.tick();
        task.tick();
        task.finish();
        drop(reporter);
        assert_eq!(
            events.into_inner().unwrap(),
            [
                "TaskStart { total_frames: 2 }",
                "FrameDone",
                "FrameDone",
                "TaskFinish"
            ]
        );
    }

    #[test]
    fn reporter_without_callback_is_silent() {
        ProgressReporter::new().report(Progress::Message("ignored".into()));
    }
}
