pub mod log_store;
pub mod paths;
pub mod persona_repository;
pub mod report_store;

pub use log_store::LogStore;
pub use paths::ScenaPaths;
pub use persona_repository::DirPersonaRepository;
pub use report_store::ReportStore;
