//! 后台服务 - 周期任务调度

pub mod scheduler;

pub use scheduler::{
    AlwaysOnline, ConnectivityProbe, ExistingJobPolicy, JobConstraints, PeriodicJob,
    PeriodicScheduler, PeriodicWork, RegisterOutcome, TcpProbe, TokioScheduler, WorkOutcome,
};
