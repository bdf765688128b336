use std::path::PathBuf;

use qs_core::ServiceError;

/// Opaque handles for the host services a default environment is built
/// over. The wrapper never looks inside them; they exist so root
/// construction can fail the way the real services do and so clones of
/// one root keep sharing a single set.
#[derive(Debug, Default)]
pub struct ExecutionQueue;

#[derive(Debug, Default)]
pub struct Profiler;

#[derive(Debug, Default)]
pub struct PersistenceNetwork;

#[derive(Debug, Default)]
pub struct TaskManager;

#[derive(Debug, Default)]
pub struct ProfileSet {
    pub names: Vec<String>,
}

#[derive(Debug)]
pub struct EngineServices {
    pub execution_queue: ExecutionQueue,
    pub profiler: Profiler,
    pub persistence: PersistenceNetwork,
    pub config_dir: PathBuf,
    pub profiles: ProfileSet,
    pub task_manager: TaskManager,
}

impl Default for EngineServices {
    fn default() -> Self {
        Self {
            execution_queue: ExecutionQueue,
            profiler: Profiler,
            persistence: PersistenceNetwork,
            config_dir: PathBuf::from("."),
            profiles: ProfileSet::default(),
            task_manager: TaskManager,
        }
    }
}

/// Supplies the service set the factory builds root environments from.
pub trait ServiceProvider: Send + Sync {
    fn services(&self) -> Result<EngineServices, ServiceError>;
}

/// Always succeeds with stub services.
#[derive(Debug, Default)]
pub struct DefaultServiceProvider;

impl ServiceProvider for DefaultServiceProvider {
    fn services(&self) -> Result<EngineServices, ServiceError> {
        Ok(EngineServices::default())
    }
}
