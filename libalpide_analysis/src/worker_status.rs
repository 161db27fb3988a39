/// The part of a run a worker is busy with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Stage {
    #[default]
    Decoding,
    Caching,
    Summarizing,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Decoding => "decoding",
            Self::Caching => "caching",
            Self::Summarizing => "summarizing",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WorkerStatus {
    pub progress: f32,
    pub run_number: i32,
    pub worker_id: usize,
    pub stage: Stage,
}

impl WorkerStatus {
    pub fn new(progress: f32, run_number: i32, worker_id: usize, stage: Stage) -> Self {
        Self {
            progress,
            run_number,
            worker_id,
            stage,
        }
    }
}
